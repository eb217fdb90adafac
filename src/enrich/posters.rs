//! Poster/backdrop backfill for entities that already carry an external id
//! but were enriched before image download was enabled.

use anyhow::Result;
use serde_json::Value;
use tracing::warn;

use crate::catalog::store::CatalogStore;
use crate::catalog::{AssetWrites, DocPatch, NeedsCriterion};
use crate::sources::tmdb::TmdbClient;

#[derive(Debug, Clone, Default)]
pub struct PosterOptions {
    pub limit: usize,
}

#[derive(Debug, Default)]
pub struct PosterStats {
    pub downloaded: usize,
    pub errors: usize,
}

pub async fn run(
    store: &dyn CatalogStore,
    tmdb: &TmdbClient,
    opts: &PosterOptions,
) -> Result<PosterStats> {
    let mut stats = PosterStats::default();

    let ids = store
        .find_needing(NeedsCriterion::ExternalIdMissingPoster, opts.limit, false)
        .await?;
    let total = ids.len();
    if total == 0 {
        println!("All documentaries already have posters!");
        return Ok(stats);
    }
    println!("Downloading posters for {total} documentaries...\n");

    for (i, id) in ids.into_iter().enumerate() {
        let doc = store.load(id).await?;
        print!("[{}/{total}] {}...", i + 1, doc.title);

        let movie_id: i64 = match doc.tmdb_id.parse() {
            Ok(v) => v,
            Err(_) => {
                println!(" SKIP (bad tmdb id {:?})", doc.tmdb_id);
                stats.errors += 1;
                continue;
            }
        };
        let details: Value = match tmdb.movie_details(movie_id).await {
            Ok(d) => d,
            Err(err) => {
                println!(" ERROR: {err:#}");
                warn!(documentary = %doc.slug, error = %err, "poster detail fetch failed");
                stats.errors += 1;
                continue;
            }
        };

        let mut assets = AssetWrites::default();
        if doc.poster.is_empty() {
            if let Some(path) = details.get("poster_path").and_then(|p| p.as_str()) {
                assets.poster = tmdb.download_image(path, "w500").await;
            }
        }
        if doc.backdrop.is_empty() {
            if let Some(path) = details.get("backdrop_path").and_then(|p| p.as_str()) {
                assets.backdrop = tmdb.download_image(path, "w1280").await;
            }
        }

        if assets.is_empty() {
            println!(" nothing to download");
            continue;
        }

        match store.commit_patch(id, &DocPatch::default(), &assets).await {
            Ok(()) => {
                println!(" OK");
                stats.downloaded += 1;
            }
            Err(err) => {
                println!(" ERROR: {err:#}");
                stats.errors += 1;
            }
        }
    }

    println!();
    println!("Downloaded: {}", stats.downloaded);
    if stats.errors > 0 {
        println!("Errors: {}", stats.errors);
    }

    Ok(stats)
}
