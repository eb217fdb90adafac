//! AI tagging: ask the completion model to categorize a documentary from its
//! synopsis, then validate every returned name against the taxonomy tables
//! by exact match. Non-matching names are dropped, never fuzzy-corrected:
//! hallucinated tags must not leak into the vocabulary.

use anyhow::Result;
use serde_json::Value;
use tracing::warn;

use crate::catalog::store::CatalogStore;
use crate::catalog::{NeedsCriterion, TaxonomyEntry, TaxonomyKind};
use crate::sources::claude::ClaudeClient;
use crate::util::json_repair::parse_lenient;

#[derive(Debug, Clone, Default)]
pub struct AiTagOptions {
    pub dry_run: bool,
    pub limit: usize,
    pub force: bool,
    pub unpublished_only: bool,
}

#[derive(Debug, Default)]
pub struct AiTagStats {
    pub tagged: usize,
    pub sports_added: usize,
    pub themes_added: usize,
    pub regions_added: usize,
    pub errors: usize,
}

#[derive(Debug, Default, PartialEq)]
pub(crate) struct MatchedTags {
    pub sports: Vec<i64>,
    pub themes: Vec<i64>,
    pub regions: Vec<i64>,
}

fn match_names(value: Option<&Value>, taxonomy: &[TaxonomyEntry]) -> Vec<i64> {
    let Some(names) = value.and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    names
        .iter()
        .filter_map(|n| n.as_str())
        .filter_map(|name| taxonomy.iter().find(|e| e.name == name).map(|e| e.id))
        .collect()
}

/// Repair and parse a model response, then keep only tag names that exist in
/// the taxonomy. `None` means the response was unusable (counted as an error
/// by the caller).
pub(crate) fn process_response(
    raw: &str,
    sports: &[TaxonomyEntry],
    themes: &[TaxonomyEntry],
    regions: &[TaxonomyEntry],
) -> Option<(MatchedTags, Option<String>)> {
    let parsed = parse_lenient(raw)?;
    let tags = MatchedTags {
        sports: match_names(parsed.get("sports"), sports),
        themes: match_names(parsed.get("themes"), themes),
        regions: match_names(parsed.get("regions"), regions),
    };
    let reasoning = parsed
        .get("reasoning")
        .and_then(|r| r.as_str())
        .map(|s| s.to_string());
    Some((tags, reasoning))
}

fn names_for(ids: &[i64], taxonomy: &[TaxonomyEntry]) -> Vec<String> {
    taxonomy
        .iter()
        .filter(|e| ids.contains(&e.id))
        .map(|e| e.name.clone())
        .collect()
}

pub async fn run(
    store: &dyn CatalogStore,
    claude: &ClaudeClient,
    opts: &AiTagOptions,
) -> Result<AiTagStats> {
    let mut stats = AiTagStats::default();

    if opts.dry_run {
        println!("DRY RUN - No changes will be made\n");
    }

    let ids = store
        .find_needing(
            NeedsCriterion::UntaggedWithSynopsis {
                unpublished_only: opts.unpublished_only,
            },
            opts.limit,
            opts.force,
        )
        .await?;
    let total = ids.len();
    if total == 0 {
        println!("No documentaries need AI tagging!");
        return Ok(stats);
    }
    println!("Processing {total} documentaries with Claude...\n");

    let sports = store.list_taxonomy(TaxonomyKind::Sport).await?;
    let themes = store.list_taxonomy(TaxonomyKind::Theme).await?;
    let regions = store.list_taxonomy(TaxonomyKind::Region).await?;

    for (i, id) in ids.into_iter().enumerate() {
        let doc = store.load(id).await?;
        println!("\n[{}/{total}] {} ({})", i + 1, doc.title, doc.year);

        let raw = match claude
            .analyze_tags(&doc.title, doc.year, &doc.synopsis, &doc.directors)
            .await
        {
            Ok(raw) => raw,
            Err(err) => {
                println!("  API Error: {err:#}");
                warn!(documentary = %doc.slug, error = %err, "tag analysis failed");
                stats.errors += 1;
                continue;
            }
        };

        let Some((tags, reasoning)) = process_response(&raw, &sports, &themes, &regions) else {
            let head: String = raw.chars().take(100).collect();
            println!("  Failed to parse JSON: {head}");
            stats.errors += 1;
            continue;
        };

        println!("  Sports: {:?}", names_for(&tags.sports, &sports));
        println!("  Themes: {:?}", names_for(&tags.themes, &themes));
        println!("  Regions: {:?}", names_for(&tags.regions, &regions));
        if let Some(reasoning) = reasoning {
            let head: String = reasoning.chars().take(80).collect();
            println!("  Reason: {head}...");
        }

        if !opts.dry_run {
            if !tags.sports.is_empty() {
                stats.sports_added += store
                    .attach_tags(id, TaxonomyKind::Sport, &tags.sports)
                    .await?;
            }
            if !tags.themes.is_empty() {
                stats.themes_added += store
                    .attach_tags(id, TaxonomyKind::Theme, &tags.themes)
                    .await?;
            }
            if !tags.regions.is_empty() {
                stats.regions_added += store
                    .attach_tags(id, TaxonomyKind::Region, &tags.regions)
                    .await?;
            }
            println!("  ✓ Tags saved");
        }

        stats.tagged += 1;
    }

    println!("\n{}", "=".repeat(50));
    println!("AI tagging complete:");
    println!("  - Documentaries tagged: {}", stats.tagged);
    println!("  - Sports added: {}", stats.sports_added);
    println!("  - Themes added: {}", stats.themes_added);
    println!("  - Regions added: {}", stats.regions_added);
    println!("  - Errors: {}", stats.errors);

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::memory::MemStore;
    use crate::catalog::slugify;

    fn taxonomy(names: &[&str]) -> Vec<TaxonomyEntry> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| TaxonomyEntry {
                id: (i + 1) as i64,
                name: (*name).to_string(),
                slug: slugify(name),
            })
            .collect()
    }

    #[test]
    fn truncated_fenced_response_is_repaired_and_validated() {
        let sports = taxonomy(&["Climbing", "Skiing"]);
        let themes = taxonomy(&["Adventure", "Survival"]);
        let regions = taxonomy(&["Alps"]);

        // Cut off mid-word: "Advent" is repaired into valid JSON but then
        // fails the exact-name check against "Adventure" and is dropped.
        let raw = "```json\n{\"sports\":[\"Climbing\"],\"themes\":[\"Advent";
        let (tags, _) = process_response(raw, &sports, &themes, &regions).unwrap();
        assert_eq!(tags.sports, vec![1]);
        assert!(tags.themes.is_empty());
        assert!(tags.regions.is_empty());
    }

    #[test]
    fn names_are_matched_exactly_never_fuzzily() {
        let sports = taxonomy(&["Climbing"]);
        let raw = r#"{"sports":["climbing","Climb","Climbing"],"themes":[],"regions":[]}"#;
        let (tags, _) = process_response(raw, &sports, &[], &[]).unwrap();
        // Only the exact-case exact-name entry survives.
        assert_eq!(tags.sports, vec![1]);
    }

    #[test]
    fn unusable_response_is_none() {
        assert!(process_response("I cannot categorize this.", &[], &[], &[]).is_none());
    }

    #[tokio::test]
    async fn taxonomy_closure_no_new_tags_from_attachment() {
        // Attaching ids that exist works; the store refuses unknown ids, so
        // tagging can never grow the vocabulary as a side effect.
        let store = MemStore::default();
        store.set_taxonomy(TaxonomyKind::Sport, &["Climbing"]);
        let before = store.list_taxonomy(TaxonomyKind::Sport).await.unwrap().len();

        store.attach_tags(3, TaxonomyKind::Sport, &[1]).await.unwrap();
        assert!(store.attach_tags(3, TaxonomyKind::Sport, &[99]).await.is_err());

        let after = store.list_taxonomy(TaxonomyKind::Sport).await.unwrap().len();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn attach_is_additive_and_idempotent() {
        let store = MemStore::default();
        store.set_taxonomy(TaxonomyKind::Theme, &["Adventure", "Survival"]);
        let added = store.attach_tags(3, TaxonomyKind::Theme, &[1, 2]).await.unwrap();
        assert_eq!(added, 2);
        let added = store.attach_tags(3, TaxonomyKind::Theme, &[1, 2]).await.unwrap();
        assert_eq!(added, 0);
    }
}
