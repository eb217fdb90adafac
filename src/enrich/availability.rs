//! Availability reconciliation: who streams what, where.
//!
//! Two drivers share the same persistence path. The provider mode asks the
//! structured metadata source's watch-provider endpoint (needs a confirmed
//! external id); the web mode probes JustWatch and direct YouTube/Vimeo
//! search. Everything funnels through the platform identifier maps (only
//! platforms an operator has mapped are ever persisted) and through the
//! (documentary, platform) upsert key.

use anyhow::Result;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, warn};

use crate::catalog::store::CatalogStore;
use crate::catalog::{AvailabilityFields, DocId, NeedsCriterion, TaxonomyKind, Upserted};
use crate::normalization::platform::{
    justwatch_package_slug, monetization_is_free, tmdb_provider_slug,
};
use crate::normalization::title::similarity;
use crate::sources::justwatch::JustWatchClient;
use crate::sources::tmdb::TmdbClient;
use crate::sources::vimeo::VimeoScraper;
use crate::sources::youtube::YouTubeScraper;
use crate::sources::{OfferSource, WatchOffer};

#[derive(Debug, Clone)]
pub struct AvailabilityOptions {
    pub dry_run: bool,
    pub limit: usize,
    pub force: bool,
    pub country: String,
    pub min_similarity: f64,
}

impl Default for AvailabilityOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            limit: 0,
            force: false,
            country: "FR".into(),
            min_similarity: 0.7,
        }
    }
}

/// Which web sources to probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebSourceFilter {
    All,
    JustWatch,
    YouTube,
    Vimeo,
}

impl WebSourceFilter {
    fn includes(&self, source: WebSourceFilter) -> bool {
        *self == WebSourceFilter::All || *self == source
    }
}

#[derive(Debug, Default)]
pub struct AvailabilityStats {
    pub found: usize,
    pub no_offers: usize,
    pub created: usize,
    pub updated: usize,
    pub errors: usize,
    pub unmapped_dropped: usize,
}

/// Deduplicate offers by platform: the highest-priority source wins, not the
/// last writer by arrival order.
pub(crate) fn resolve_offers(offers: Vec<WatchOffer>) -> Vec<WatchOffer> {
    let mut by_platform: BTreeMap<String, WatchOffer> = BTreeMap::new();
    for offer in offers {
        match by_platform.get(&offer.platform_slug) {
            Some(existing) if existing.source <= offer.source => {}
            _ => {
                by_platform.insert(offer.platform_slug.clone(), offer);
            }
        }
    }
    by_platform.into_values().collect()
}

/// Map one country block of a watch-providers payload into offers. Returns
/// the offers plus the number of provider ids that had no mapping.
pub(crate) fn extract_provider_offers(country_data: &Value) -> (Vec<WatchOffer>, usize) {
    let link = country_data
        .get("link")
        .and_then(|l| l.as_str())
        .unwrap_or_default();
    let mut offers = Vec::new();
    let mut unmapped = 0usize;

    for category in ["flatrate", "free", "ads"] {
        let Some(providers) = country_data.get(category).and_then(|c| c.as_array()) else {
            continue;
        };
        for provider in providers {
            let Some(provider_id) = provider.get("provider_id").and_then(|v| v.as_u64()) else {
                continue;
            };
            match tmdb_provider_slug(provider_id as u32) {
                Some(slug) => offers.push(WatchOffer {
                    platform_slug: slug.to_string(),
                    url: link.to_string(),
                    is_free: monetization_is_free(category),
                    monetization: category.to_ascii_uppercase(),
                    source: OfferSource::Tmdb,
                }),
                None => unmapped += 1,
            }
        }
    }
    (offers, unmapped)
}

/// Upsert resolved offers for one entity. Unmapped platform slugs are dropped
/// and counted, never inserted.
pub(crate) async fn persist_offers(
    store: &dyn CatalogStore,
    documentary_id: DocId,
    offers: &[WatchOffer],
    platforms: &HashMap<String, i64>,
    country: &str,
    dry_run: bool,
    stats: &mut AvailabilityStats,
) -> Result<()> {
    for offer in offers {
        let Some(platform_id) = platforms.get(&offer.platform_slug) else {
            stats.unmapped_dropped += 1;
            continue;
        };
        let head: String = offer.url.chars().take(60).collect();
        println!(
            "  ✓ {}: {head} ({})",
            offer.platform_slug, offer.monetization
        );
        if dry_run {
            continue;
        }
        let fields = AvailabilityFields {
            url: offer.url.clone(),
            is_free: offer.is_free,
            country_codes: vec![country.to_string()],
        };
        match store
            .upsert_availability(documentary_id, *platform_id, &fields)
            .await?
        {
            Upserted::Created => stats.created += 1,
            Upserted::Updated => stats.updated += 1,
        }
    }
    Ok(())
}

async fn load_platform_map(store: &dyn CatalogStore) -> Result<HashMap<String, i64>> {
    let platforms = store.list_taxonomy(TaxonomyKind::Platform).await?;
    println!("Loaded {} platforms\n", platforms.len());
    Ok(platforms.into_iter().map(|p| (p.slug, p.id)).collect())
}

fn print_summary(stats: &AvailabilityStats, dry_run: bool) {
    println!();
    println!("Scraping complete:");
    println!("  - Docs with offers: {}", stats.found);
    println!("  - Docs without offers: {}", stats.no_offers);
    if !dry_run {
        println!(
            "  - Availabilities: {} created, {} updated",
            stats.created, stats.updated
        );
    }
    if stats.unmapped_dropped > 0 {
        println!(
            "  - Unmapped provider ids dropped: {}",
            stats.unmapped_dropped
        );
    }
    if stats.errors > 0 {
        println!("  - Errors: {}", stats.errors);
    }
}

/// Provider-endpoint mode: entities with a confirmed external id.
pub async fn run_providers(
    store: &dyn CatalogStore,
    tmdb: &TmdbClient,
    opts: &AvailabilityOptions,
) -> Result<AvailabilityStats> {
    let mut stats = AvailabilityStats::default();

    if opts.dry_run {
        println!("DRY RUN - No changes will be made\n");
    }

    let platforms = load_platform_map(store).await?;
    let ids = store
        .find_needing(
            NeedsCriterion::ExternalIdNoAvailability,
            opts.limit,
            opts.force,
        )
        .await?;
    let total = ids.len();
    if total == 0 {
        println!("No documentaries to check!");
        return Ok(stats);
    }
    println!(
        "Checking {total} documentaries for {} availability...\n",
        opts.country
    );

    for (i, id) in ids.into_iter().enumerate() {
        let doc = store.load(id).await?;
        println!("[{}/{total}] {}...", i + 1, doc.title);

        let payload = match tmdb.watch_providers(&doc.tmdb_id).await {
            Ok(p) => p,
            Err(err) => {
                println!("  ERROR: {err:#}");
                warn!(documentary = %doc.slug, error = %err, "watch provider fetch failed");
                stats.errors += 1;
                continue;
            }
        };

        let Some(country_data) = payload
            .pointer(&format!("/results/{}", opts.country))
            .filter(|c| !c.is_null())
        else {
            println!("  No {} providers", opts.country);
            stats.no_offers += 1;
            continue;
        };

        let (offers, unmapped) = extract_provider_offers(country_data);
        stats.unmapped_dropped += unmapped;
        if unmapped > 0 {
            debug!(documentary = %doc.slug, unmapped, "dropped unmapped provider ids");
        }
        let offers = resolve_offers(offers);
        if offers.is_empty() {
            println!("  No mapped providers");
            stats.no_offers += 1;
            continue;
        }

        stats.found += 1;
        persist_offers(
            store,
            id,
            &offers,
            &platforms,
            &opts.country,
            opts.dry_run,
            &mut stats,
        )
        .await?;
    }

    print_summary(&stats, opts.dry_run);
    Ok(stats)
}

async fn justwatch_offers(
    jw: &JustWatchClient,
    title: &str,
    year: i32,
    country: &str,
    min_similarity: f64,
) -> Vec<WatchOffer> {
    let results = match jw.search(title, country, "fr", 5).await {
        Ok(r) => r,
        Err(err) => {
            println!("  JustWatch error: {err:#}");
            return Vec::new();
        }
    };

    // Best candidate by title similarity with a year bonus; candidates under
    // the similarity floor never qualify.
    let mut best: Option<(f64, String)> = None;
    for result in results {
        let title_sim = similarity(title, &result.title);
        if title_sim < min_similarity {
            continue;
        }
        let year_factor = if result.release_year == Some(year) {
            1.0
        } else {
            0.8
        };
        let score = title_sim * year_factor;
        if best.as_ref().map_or(true, |(s, _)| score > *s) {
            best = Some((score, result.entry_id));
        }
    }
    let Some((_, entry_id)) = best else {
        return Vec::new();
    };

    let offers = match jw.offers(&entry_id, country).await {
        Ok(o) => o,
        Err(err) => {
            println!("  JustWatch error: {err:#}");
            return Vec::new();
        }
    };

    offers
        .into_iter()
        .filter_map(|offer| {
            let slug = justwatch_package_slug(&offer.technical_name)?;
            Some(WatchOffer {
                platform_slug: slug.to_string(),
                url: offer.url,
                is_free: monetization_is_free(&offer.monetization_type),
                monetization: offer.monetization_type,
                source: OfferSource::JustWatch,
            })
        })
        .collect()
}

/// Web mode: JustWatch plus direct YouTube/Vimeo probes, for entities with no
/// availability regardless of external ids.
pub async fn run_web(
    store: &dyn CatalogStore,
    jw: &JustWatchClient,
    youtube: &YouTubeScraper,
    vimeo: &VimeoScraper,
    filter: WebSourceFilter,
    opts: &AvailabilityOptions,
) -> Result<AvailabilityStats> {
    let mut stats = AvailabilityStats::default();

    if opts.dry_run {
        println!("DRY RUN - No changes will be made\n");
    }

    let platforms = load_platform_map(store).await?;
    let ids = store
        .find_needing(NeedsCriterion::NoAvailability, opts.limit, opts.force)
        .await?;
    let total = ids.len();
    if total == 0 {
        println!("No documentaries to check!");
        return Ok(stats);
    }
    println!("Processing {total} documentaries...\n");

    for (i, id) in ids.into_iter().enumerate() {
        let doc = store.load(id).await?;
        println!("\n[{}/{total}] {} ({})", i + 1, doc.title, doc.year);

        let mut offers: Vec<WatchOffer> = Vec::new();
        if filter.includes(WebSourceFilter::JustWatch) {
            offers.extend(
                justwatch_offers(jw, &doc.title, doc.year, &opts.country, opts.min_similarity)
                    .await,
            );
        }
        if filter.includes(WebSourceFilter::YouTube) {
            offers.extend(
                youtube
                    .search_free_offers(&doc.title, doc.year, opts.min_similarity)
                    .await,
            );
        }
        if filter.includes(WebSourceFilter::Vimeo) {
            offers.extend(
                vimeo
                    .search_offers(&doc.title, doc.year, opts.min_similarity)
                    .await,
            );
        }

        let offers = resolve_offers(offers);
        if offers.is_empty() {
            println!("  No offers found");
            stats.no_offers += 1;
        } else {
            stats.found += 1;
            persist_offers(
                store,
                id,
                &offers,
                &platforms,
                &opts.country,
                opts.dry_run,
                &mut stats,
            )
            .await?;
        }

        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    print_summary(&stats, opts.dry_run);
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::memory::MemStore;
    use serde_json::json;

    fn offer(slug: &str, is_free: bool, source: OfferSource) -> WatchOffer {
        WatchOffer {
            platform_slug: slug.into(),
            url: format!("https://example.com/{slug}"),
            is_free,
            monetization: if is_free { "FREE" } else { "FLATRATE" }.into(),
            source,
        }
    }

    #[test]
    fn priority_beats_arrival_order() {
        // The web-search claim arrives first; the structured source still wins.
        let resolved = resolve_offers(vec![
            offer("netflix", true, OfferSource::WebSearch),
            offer("netflix", false, OfferSource::JustWatch),
            offer("netflix", false, OfferSource::Tmdb),
        ]);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].source, OfferSource::Tmdb);
        assert!(!resolved[0].is_free);
    }

    #[test]
    fn distinct_platforms_all_survive() {
        let resolved = resolve_offers(vec![
            offer("netflix", false, OfferSource::Tmdb),
            offer("youtube", true, OfferSource::WebSearch),
        ]);
        assert_eq!(resolved.len(), 2);
    }

    #[test]
    fn provider_payload_maps_categories_and_drops_unknown_ids() {
        let country_data = json!({
            "link": "https://www.themoviedb.org/movie/555/watch?locale=FR",
            "flatrate": [{"provider_id": 8, "provider_name": "Netflix"}],
            "ads": [{"provider_id": 1796, "provider_name": "Netflix with Ads"}],
            "free": [{"provider_id": 424242, "provider_name": "Longtail TV"}],
        });
        let (offers, unmapped) = extract_provider_offers(&country_data);
        assert_eq!(unmapped, 1);
        assert_eq!(offers.len(), 2);
        let flatrate = offers.iter().find(|o| o.monetization == "FLATRATE").unwrap();
        assert!(!flatrate.is_free);
        let ads = offers.iter().find(|o| o.monetization == "ADS").unwrap();
        assert!(ads.is_free);
    }

    #[tokio::test]
    async fn upsert_keeps_one_row_per_platform_across_runs() {
        let store = MemStore::default();
        store.set_taxonomy(TaxonomyKind::Platform, &["Netflix", "YouTube"]);
        let platforms: HashMap<String, i64> =
            [("netflix".to_string(), 1i64), ("youtube".to_string(), 2i64)].into();

        let offers = vec![offer("netflix", false, OfferSource::Tmdb)];
        let mut stats = AvailabilityStats::default();
        persist_offers(&store, 7, &offers, &platforms, "FR", false, &mut stats)
            .await
            .unwrap();
        assert_eq!(stats.created, 1);

        // Re-resolution updates in place.
        let offers = vec![offer("netflix", true, OfferSource::Tmdb)];
        persist_offers(&store, 7, &offers, &platforms, "FR", false, &mut stats)
            .await
            .unwrap();
        assert_eq!(stats.updated, 1);
        let map = store.availabilities.lock().unwrap();
        assert_eq!(map.len(), 1);
        assert!(map.get(&(7, 1)).unwrap().is_free);
    }

    #[tokio::test]
    async fn unmapped_slugs_are_dropped_not_inserted() {
        let store = MemStore::default();
        let platforms: HashMap<String, i64> = HashMap::new();
        let offers = vec![offer("netflix", false, OfferSource::Tmdb)];
        let mut stats = AvailabilityStats::default();
        persist_offers(&store, 7, &offers, &platforms, "FR", false, &mut stats)
            .await
            .unwrap();
        assert_eq!(stats.unmapped_dropped, 1);
        assert!(store.availabilities.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn dry_run_persists_nothing() {
        let store = MemStore::default();
        let platforms: HashMap<String, i64> = [("netflix".to_string(), 1i64)].into();
        let offers = vec![offer("netflix", false, OfferSource::Tmdb)];
        let mut stats = AvailabilityStats::default();
        persist_offers(&store, 7, &offers, &platforms, "FR", true, &mut stats)
            .await
            .unwrap();
        assert_eq!(stats.created, 0);
        assert!(store.availabilities.lock().unwrap().is_empty());
    }
}
