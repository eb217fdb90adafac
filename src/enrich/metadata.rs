//! Structured-metadata enrichment: search the source, fetch details, merge
//! into the catalog entity, commit atomically.
//!
//! The external id doubles as the idempotency marker: the default driver
//! filter selects entities whose id field is still empty, so a second run
//! over unchanged data selects nothing and writes nothing.

use anyhow::Result;
use serde_json::Value;
use tracing::warn;

use crate::catalog::store::CatalogStore;
use crate::catalog::{AssetWrites, DocPatch, Documentary, NeedsCriterion};
use crate::sources::tmdb::{
    extract_imdb_id, extract_overview, extract_runtime, extract_trailer_url, extract_vote_average,
};
use crate::sources::{Candidate, MetadataSource};

#[derive(Debug, Clone, Default)]
pub struct MetadataOptions {
    pub dry_run: bool,
    pub limit: usize,
    pub force: bool,
    pub download_images: bool,
}

#[derive(Debug, Default)]
pub struct MetadataStats {
    pub enriched: usize,
    pub not_found: usize,
    pub errors: usize,
}

enum Outcome {
    Enriched { source_id: String },
    DryRun { title: String, source_id: String, runtime: Option<i32> },
    NotFound,
}

/// Merge policy for one source pass. Scalar fields are written only when the
/// source has a value and the current value is empty; the synopsis
/// additionally accepts a strictly longer text. The external id is recorded
/// whenever it differs, which is what marks the entity as enriched.
pub(crate) fn build_patch(doc: &Documentary, candidate: &Candidate, details: &Value) -> DocPatch {
    let mut patch = DocPatch::default();

    if doc.tmdb_id != candidate.source_id {
        patch.tmdb_id = Some(candidate.source_id.clone());
    }

    if let Some(overview) = extract_overview(details) {
        if overview.len() > doc.synopsis.len() {
            patch.synopsis = Some(overview.to_string());
        }
    }

    if doc.duration_minutes.is_none() {
        patch.duration_minutes = extract_runtime(details);
    }

    if doc.imdb_id.is_empty() {
        patch.imdb_id = extract_imdb_id(details).map(|s| s.to_string());
    }

    if doc.imdb_rating.is_none() {
        patch.imdb_rating = extract_vote_average(details);
    }

    if doc.trailer_url.is_empty() {
        patch.trailer_url = extract_trailer_url(details);
    }

    patch
}

async fn enrich_one(
    store: &dyn CatalogStore,
    source: &dyn MetadataSource,
    doc: &Documentary,
    opts: &MetadataOptions,
) -> Result<Outcome> {
    let Some(candidate) = source.search(&doc.title, Some(doc.year)).await? else {
        return Ok(Outcome::NotFound);
    };

    let details = source.details(&candidate).await?;

    if opts.dry_run {
        return Ok(Outcome::DryRun {
            title: details
                .get("title")
                .and_then(|t| t.as_str())
                .unwrap_or(&candidate.title)
                .to_string(),
            source_id: candidate.source_id,
            runtime: extract_runtime(&details),
        });
    }

    let patch = build_patch(doc, &candidate, &details);

    let mut assets = AssetWrites::default();
    if opts.download_images {
        if doc.poster.is_empty() {
            if let Some(path) = &candidate.poster_ref {
                assets.poster = source.download_asset(path, "w500").await;
            }
        }
        if doc.backdrop.is_empty() {
            if let Some(path) = &candidate.backdrop_ref {
                assets.backdrop = source.download_asset(path, "w1280").await;
            }
        }
    }

    if !patch.is_empty() || !assets.is_empty() {
        store.commit_patch(doc.id, &patch, &assets).await?;
    }

    Ok(Outcome::Enriched {
        source_id: candidate.source_id,
    })
}

pub async fn run(
    store: &dyn CatalogStore,
    source: &dyn MetadataSource,
    opts: &MetadataOptions,
) -> Result<MetadataStats> {
    let mut stats = MetadataStats::default();

    if opts.dry_run {
        println!("DRY RUN - No changes will be made\n");
    }

    let ids = store
        .find_needing(NeedsCriterion::MissingExternalId, opts.limit, opts.force)
        .await?;
    let total = ids.len();
    if total == 0 {
        println!("No documentaries need enrichment!");
        return Ok(stats);
    }
    println!("Processing {total} documentaries...\n");

    for (i, id) in ids.into_iter().enumerate() {
        let doc = store.load(id).await?;
        print!("[{}/{total}] {} ({})...", i + 1, doc.title, doc.year);

        match enrich_one(store, source, &doc, opts).await {
            Ok(Outcome::Enriched { source_id }) => {
                println!(" ENRICHED (TMDB: {source_id})");
                stats.enriched += 1;
            }
            Ok(Outcome::DryRun {
                title,
                source_id,
                runtime,
            }) => {
                let runtime = runtime.map(|r| r.to_string()).unwrap_or_else(|| "?".into());
                println!(" FOUND: {title} (TMDB ID: {source_id}, Runtime: {runtime}min)");
                stats.enriched += 1;
            }
            Ok(Outcome::NotFound) => {
                println!(" NOT FOUND");
                stats.not_found += 1;
            }
            Err(err) => {
                println!(" ERROR: {err:#}");
                warn!(documentary = %doc.slug, error = %err, "enrichment failed");
                stats.errors += 1;
            }
        }
    }

    println!();
    println!("Enrichment complete:");
    println!("  - Enriched: {}", stats.enriched);
    println!("  - Not found: {}", stats.not_found);
    println!("  - Errors: {}", stats.errors);
    if stats.not_found > 0 {
        println!();
        println!(
            "Tip: {} documentaries weren't found. These are likely niche festival \
             films; add their metadata manually.",
            stats.not_found
        );
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::memory::MemStore;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn arktika() -> Documentary {
        Documentary {
            id: 1,
            title: "Arktika".into(),
            slug: "arktika-2004".into(),
            year: 2004,
            synopsis: "Winner of Grand Prix du Festival".into(),
            ..Default::default()
        }
    }

    fn arktika_details() -> Value {
        json!({
            "title": "Arktika",
            "overview": "A 200-char arctic expedition synopsis following a small team hauling \
                         sledges across drifting pack ice toward the pole, shot over two short \
                         polar summers and one deliberately endless winter night.",
            "runtime": 95,
            "imdb_id": "tt0410050",
            "vote_average": 7.2,
            "videos": {"results": [{"site": "YouTube", "type": "Trailer", "key": "trailer1"}]}
        })
    }

    struct ScriptedSource {
        candidate: Option<Candidate>,
        details: Value,
        searches: AtomicUsize,
        fail_search: bool,
    }

    impl ScriptedSource {
        fn found() -> Self {
            Self {
                candidate: Some(Candidate {
                    source_id: "555".into(),
                    title: "Arktika".into(),
                    year: Some(2004),
                    poster_ref: None,
                    backdrop_ref: None,
                }),
                details: arktika_details(),
                searches: AtomicUsize::new(0),
                fail_search: false,
            }
        }
    }

    #[async_trait]
    impl MetadataSource for ScriptedSource {
        async fn search(&self, _title: &str, _year: Option<i32>) -> Result<Option<Candidate>> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            if self.fail_search {
                return Err(anyhow!("connection reset"));
            }
            Ok(self.candidate.clone())
        }

        async fn details(&self, _candidate: &Candidate) -> Result<Value> {
            Ok(self.details.clone())
        }

        async fn download_asset(&self, _asset_ref: &str, _size_hint: &str) -> Option<Vec<u8>> {
            Some(vec![0xff, 0xd8])
        }
    }

    #[tokio::test]
    async fn full_pipeline_enriches_and_is_idempotent() {
        let store = MemStore::with_docs(vec![arktika()]);
        let source = ScriptedSource::found();
        let opts = MetadataOptions::default();

        let stats = run(&store, &source, &opts).await.unwrap();
        assert_eq!(stats.enriched, 1);

        let doc = store.doc(1);
        assert_eq!(doc.tmdb_id, "555");
        assert_eq!(doc.duration_minutes, Some(95));
        assert!(doc.synopsis.starts_with("A 200-char arctic expedition"));
        assert_eq!(doc.imdb_id, "tt0410050");
        assert_eq!(
            doc.trailer_url,
            "https://www.youtube.com/watch?v=trailer1"
        );
        assert_eq!(store.commit_count(), 1);

        // Second run: the external id marker filters the entity out, so the
        // source is never queried again and nothing is written.
        let stats = run(&store, &source, &opts).await.unwrap();
        assert_eq!(stats.enriched, 0);
        assert_eq!(store.commit_count(), 1);
        assert_eq!(source.searches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn forced_rerun_with_same_data_writes_nothing() {
        let store = MemStore::with_docs(vec![arktika()]);
        let source = ScriptedSource::found();
        let opts = MetadataOptions::default();
        run(&store, &source, &opts).await.unwrap();
        let before = store.doc(1);

        let forced = MetadataOptions {
            force: true,
            ..Default::default()
        };
        run(&store, &source, &forced).await.unwrap();
        assert_eq!(store.commit_count(), 1);

        let after = store.doc(1);
        assert_eq!(before.synopsis, after.synopsis);
        assert_eq!(before.tmdb_id, after.tmdb_id);
    }

    #[tokio::test]
    async fn merge_never_downgrades_existing_values() {
        let long_synopsis = "x".repeat(400);
        let doc = Documentary {
            id: 2,
            title: "Arktika".into(),
            slug: "arktika-2004".into(),
            year: 2004,
            synopsis: long_synopsis.clone(),
            duration_minutes: Some(120),
            imdb_id: "tt9999999".into(),
            imdb_rating: Some(8.8),
            trailer_url: "https://example.com/t".into(),
            ..Default::default()
        };
        let patch = build_patch(
            &doc,
            &Candidate {
                source_id: "555".into(),
                title: "Arktika".into(),
                year: Some(2004),
                poster_ref: None,
                backdrop_ref: None,
            },
            &arktika_details(),
        );
        assert_eq!(patch.tmdb_id.as_deref(), Some("555"));
        assert!(patch.synopsis.is_none());
        assert!(patch.duration_minutes.is_none());
        assert!(patch.imdb_id.is_none());
        assert!(patch.imdb_rating.is_none());
        assert!(patch.trailer_url.is_none());
    }

    #[tokio::test]
    async fn transport_failures_are_counted_not_fatal() {
        let store = MemStore::with_docs(vec![arktika()]);
        let source = ScriptedSource {
            fail_search: true,
            ..ScriptedSource::found()
        };
        let stats = run(&store, &source, &MetadataOptions::default())
            .await
            .unwrap();
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.enriched, 0);
        assert_eq!(store.commit_count(), 0);
    }

    #[tokio::test]
    async fn not_found_is_tallied() {
        let store = MemStore::with_docs(vec![arktika()]);
        let source = ScriptedSource {
            candidate: None,
            ..ScriptedSource::found()
        };
        let stats = run(&store, &source, &MetadataOptions::default())
            .await
            .unwrap();
        assert_eq!(stats.not_found, 1);
        assert_eq!(store.commit_count(), 0);
    }

    #[tokio::test]
    async fn dry_run_never_touches_the_store() {
        let store = MemStore::with_docs(vec![arktika()]);
        let source = ScriptedSource::found();
        let opts = MetadataOptions {
            dry_run: true,
            download_images: true,
            ..Default::default()
        };
        let stats = run(&store, &source, &opts).await.unwrap();
        assert_eq!(stats.enriched, 1);
        assert_eq!(store.commit_count(), 0);
        assert_eq!(store.doc(1).tmdb_id, "");
    }
}
