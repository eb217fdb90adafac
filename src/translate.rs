//! Synopsis translation between the catalog's two languages, driven by the
//! completion model. Only the missing side is ever filled in; the source text
//! is never touched.

use anyhow::Result;
use std::time::Duration;
use tracing::warn;

use crate::catalog::store::CatalogStore;
use crate::catalog::{AssetWrites, DocPatch, NeedsCriterion, TranslateDirection};
use crate::sources::claude::ClaudeClient;

#[derive(Debug, Clone)]
pub struct TranslateOptions {
    pub dry_run: bool,
    pub batch_size: usize,
    pub direction: TranslateDirection,
    pub delay_secs: f64,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            batch_size: 10,
            direction: TranslateDirection::EnToFr,
            delay_secs: 1.0,
        }
    }
}

#[derive(Debug, Default)]
pub struct TranslateStats {
    pub translated: usize,
    pub skipped: usize,
    pub errors: usize,
}

pub async fn run(
    store: &dyn CatalogStore,
    claude: &ClaudeClient,
    opts: &TranslateOptions,
) -> Result<TranslateStats> {
    let mut stats = TranslateStats::default();

    let (source_lang, target_lang) = match opts.direction {
        TranslateDirection::EnToFr => ("English", "French"),
        TranslateDirection::FrToEn => ("French", "English"),
    };

    let ids = store
        .find_needing(
            NeedsCriterion::MissingTranslation(opts.direction),
            opts.batch_size,
            false,
        )
        .await?;
    if ids.is_empty() {
        println!("No documentaries need {source_lang} → {target_lang} translation!");
        return Ok(stats);
    }
    println!(
        "Found {} documentaries to translate ({source_lang} → {target_lang})",
        ids.len()
    );

    if opts.dry_run {
        println!("DRY RUN - No changes will be made");
        for id in ids {
            let doc = store.load(id).await?;
            let source = match opts.direction {
                TranslateDirection::EnToFr => &doc.synopsis_en,
                TranslateDirection::FrToEn => &doc.synopsis,
            };
            let head: String = source.chars().take(100).collect();
            println!("\n{} ({})", doc.title, doc.year);
            println!("   Source: {head}...");
        }
        return Ok(stats);
    }

    for id in ids {
        let doc = store.load(id).await?;
        let source_text = match opts.direction {
            TranslateDirection::EnToFr => doc.synopsis_en.clone(),
            TranslateDirection::FrToEn => doc.synopsis.clone(),
        };
        if source_text.trim().len() < 20 {
            println!("Skipping {} - synopsis too short", doc.title);
            stats.skipped += 1;
            continue;
        }

        println!("Translating: {} ({})...", doc.title, doc.year);

        match claude.translate(&source_text, source_lang, target_lang).await {
            Ok(translated) => {
                let patch = match opts.direction {
                    TranslateDirection::EnToFr => DocPatch {
                        synopsis: Some(translated.clone()),
                        ..Default::default()
                    },
                    TranslateDirection::FrToEn => DocPatch {
                        synopsis_en: Some(translated.clone()),
                        ..Default::default()
                    },
                };
                store
                    .commit_patch(id, &patch, &AssetWrites::default())
                    .await?;
                stats.translated += 1;
                println!("   ✓ Translated ({} chars)", translated.len());
            }
            Err(err) => {
                println!("   ✗ Error: {err:#}");
                warn!(documentary = %doc.slug, error = %err, "translation failed");
                stats.errors += 1;
            }
        }

        tokio::time::sleep(Duration::from_secs_f64(opts.delay_secs)).await;
    }

    println!();
    println!(
        "Translation complete: {} translated, {} errors",
        stats.translated, stats.errors
    );

    Ok(stats)
}
