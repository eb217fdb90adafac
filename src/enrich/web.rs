//! Web enrichment for films the structured catalogs don't know: search
//! YouTube first, fall back to Vimeo, and fill poster/synopsis/trailer gaps
//! from whichever video page survives the title match.

use anyhow::Result;
use tracing::warn;

use crate::catalog::store::CatalogStore;
use crate::catalog::{AssetWrites, DocPatch, Documentary, NeedsCriterion};
use crate::sources::vimeo::VimeoScraper;
use crate::sources::youtube::{VideoHit, YouTubeScraper};

#[derive(Debug, Clone)]
pub struct WebOptions {
    pub dry_run: bool,
    pub limit: usize,
    pub force: bool,
    pub unpublished_only: bool,
    pub skip_youtube: bool,
    pub skip_vimeo: bool,
}

impl Default for WebOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            limit: 0,
            force: false,
            unpublished_only: true,
            skip_youtube: false,
            skip_vimeo: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct WebStats {
    pub enriched: usize,
    pub poster_added: usize,
    pub synopsis_added: usize,
    pub trailer_added: usize,
    pub not_found: usize,
    pub errors: usize,
}

/// Field merges a video hit proposes for an entity. The placeholder rule is
/// the one web-specific twist: festival-import boilerplate loses to any
/// scraped description, while a real synopsis is only replaced by a longer
/// text of substance (> 50 chars).
pub(crate) fn video_patch(doc: &Documentary, hit: &VideoHit) -> (DocPatch, bool) {
    let mut patch = DocPatch::default();

    if let Some(desc) = &hit.description {
        let replaceable =
            doc.has_placeholder_synopsis() || (desc.len() > doc.synopsis.len() && desc.len() > 50);
        if replaceable && *desc != doc.synopsis {
            patch.synopsis = Some(desc.clone());
        }
    }

    if doc.trailer_url.is_empty() {
        patch.trailer_url = Some(hit.video_url.clone());
    }

    let wants_poster = doc.poster.is_empty() && !hit.thumbnail_url.is_empty();
    (patch, wants_poster)
}

async fn apply_hit(
    store: &dyn CatalogStore,
    doc: &Documentary,
    hit: &VideoHit,
    poster: Option<Vec<u8>>,
    source: &str,
    stats: &mut WebStats,
) -> Result<bool> {
    let (patch, _) = video_patch(doc, hit);
    let assets = AssetWrites {
        poster,
        backdrop: None,
    };
    if patch.is_empty() && assets.is_empty() {
        return Ok(false);
    }

    store.commit_patch(doc.id, &patch, &assets).await?;

    if assets.poster.is_some() {
        stats.poster_added += 1;
        println!("    ✓ Poster saved from {source}");
    }
    if patch.synopsis.is_some() {
        stats.synopsis_added += 1;
        println!("    ✓ Synopsis updated");
    }
    if let Some(url) = &patch.trailer_url {
        stats.trailer_added += 1;
        println!("    ✓ Trailer set: {url}");
    }
    Ok(true)
}

fn show_dry_run(hit: &VideoHit) {
    if !hit.thumbnail_url.is_empty() {
        println!("    Would download poster from: {}", hit.thumbnail_url);
    }
    if let Some(desc) = &hit.description {
        let head: String = desc.chars().take(60).collect();
        println!("    Would add synopsis: {head}...");
    }
    println!("    Would set trailer: {}", hit.video_url);
}

pub async fn run(
    store: &dyn CatalogStore,
    youtube: &YouTubeScraper,
    vimeo: &VimeoScraper,
    opts: &WebOptions,
) -> Result<WebStats> {
    let mut stats = WebStats::default();

    if opts.dry_run {
        println!("DRY RUN - No changes will be made\n");
    }

    let ids = store
        .find_needing(
            NeedsCriterion::MissingPoster {
                unpublished_only: opts.unpublished_only,
            },
            opts.limit,
            opts.force,
        )
        .await?;
    let total = ids.len();
    if total == 0 {
        println!("No documentaries need web enrichment!");
        return Ok(stats);
    }
    println!("Processing {total} documentaries...\n");

    for (i, id) in ids.into_iter().enumerate() {
        let doc = store.load(id).await?;
        println!("\n[{}/{total}] {} ({})", i + 1, doc.title, doc.year);

        let mut enriched = false;

        if !opts.skip_youtube {
            println!("  Searching YouTube...");
            match youtube.search(&doc.title, Some(doc.year)).await {
                Some(hit) => {
                    let head: String = hit.title.chars().take(50).collect();
                    println!("    Found: {head}");
                    if opts.dry_run {
                        show_dry_run(&hit);
                        enriched = true;
                    } else {
                        let (_, wants_poster) = video_patch(&doc, &hit);
                        let poster = if wants_poster {
                            youtube.download_image(&hit.thumbnail_url).await
                        } else {
                            None
                        };
                        match apply_hit(store, &doc, &hit, poster, "youtube", &mut stats).await {
                            Ok(changed) => enriched = changed,
                            Err(err) => {
                                println!("  Error: {err:#}");
                                warn!(documentary = %doc.slug, error = %err, "web enrichment failed");
                                stats.errors += 1;
                                continue;
                            }
                        }
                    }
                }
                None => println!("    Not found on YouTube"),
            }
        }

        if !opts.skip_vimeo && !enriched {
            println!("  Searching Vimeo...");
            match vimeo.search(&doc.title, Some(doc.year)).await {
                Some(hit) => {
                    let head: String = hit.title.chars().take(50).collect();
                    println!("    Found: {head}");
                    if opts.dry_run {
                        show_dry_run(&hit);
                        enriched = true;
                    } else {
                        let (_, wants_poster) = video_patch(&doc, &hit);
                        let poster = if wants_poster {
                            vimeo.download_image(&hit.thumbnail_url).await
                        } else {
                            None
                        };
                        match apply_hit(store, &doc, &hit, poster, "vimeo", &mut stats).await {
                            Ok(changed) => enriched = changed,
                            Err(err) => {
                                println!("  Error: {err:#}");
                                warn!(documentary = %doc.slug, error = %err, "web enrichment failed");
                                stats.errors += 1;
                                continue;
                            }
                        }
                    }
                }
                None => println!("    Not found on Vimeo"),
            }
        }

        if enriched {
            stats.enriched += 1;
        } else {
            stats.not_found += 1;
        }
    }

    println!();
    println!("{}", "=".repeat(50));
    println!("Web enrichment complete:");
    println!("  - Enriched: {}", stats.enriched);
    println!("  - Posters added: {}", stats.poster_added);
    println!("  - Synopses added: {}", stats.synopsis_added);
    println!("  - Trailers added: {}", stats.trailer_added);
    println!("  - Not found: {}", stats.not_found);
    println!("  - Errors: {}", stats.errors);

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(description: Option<&str>) -> VideoHit {
        VideoHit {
            video_id: "abc123def45".into(),
            video_url: "https://www.youtube.com/watch?v=abc123def45".into(),
            title: "Wild Waters".into(),
            description: description.map(|s| s.to_string()),
            thumbnail_url: "https://i.ytimg.com/vi/abc123def45/maxresdefault.jpg".into(),
        }
    }

    #[test]
    fn placeholder_synopsis_is_replaced_even_by_shorter_text() {
        let doc = Documentary {
            synopsis: "Winner of Grand Prix du Festival at FIFAV 2022 plus extra padding text"
                .into(),
            ..Default::default()
        };
        let (patch, _) = video_patch(&doc, &hit(Some("A short but real description.")));
        assert_eq!(
            patch.synopsis.as_deref(),
            Some("A short but real description.")
        );
    }

    #[test]
    fn real_synopsis_only_loses_to_longer_substantial_text() {
        let doc = Documentary {
            synopsis: "An existing, carefully written synopsis of this river documentary.".into(),
            ..Default::default()
        };
        // Shorter scrape: rejected.
        let (patch, _) = video_patch(&doc, &hit(Some("Shorter text.")));
        assert!(patch.synopsis.is_none());
        // Longer but still > 50 chars: accepted.
        let longer = "An existing, carefully written synopsis of this river documentary, \
                      now with the full festival cut description attached.";
        let (patch, _) = video_patch(&doc, &hit(Some(longer)));
        assert_eq!(patch.synopsis.as_deref(), Some(longer));
    }

    #[test]
    fn trailer_and_poster_fill_only_empty_slots() {
        let doc = Documentary {
            trailer_url: "https://vimeo.com/1".into(),
            poster: "posters/x.jpg".into(),
            ..Default::default()
        };
        let (patch, wants_poster) = video_patch(&doc, &hit(None));
        assert!(patch.trailer_url.is_none());
        assert!(!wants_poster);

        let empty_doc = Documentary::default();
        let (patch, wants_poster) = video_patch(&empty_doc, &hit(None));
        assert_eq!(
            patch.trailer_url.as_deref(),
            Some("https://www.youtube.com/watch?v=abc123def45")
        );
        assert!(wants_poster);
    }
}
