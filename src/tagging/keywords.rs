//! Keyword tagging: map the structured source's keyword and genre vocabulary
//! onto the sport/theme taxonomy through static lookup tables. Cheaper than
//! the AI path but only as good as the source's keyword coverage.

use anyhow::Result;
use std::collections::BTreeSet;
use tracing::warn;

use crate::catalog::store::CatalogStore;
use crate::catalog::{NeedsCriterion, TaxonomyEntry, TaxonomyKind};
use crate::sources::tmdb::TmdbClient;

/// Lowercase source keyword → sport name.
const KEYWORD_TO_SPORT: &[(&str, &str)] = &[
    // Climbing
    ("rock climbing", "Climbing"),
    ("climbing", "Climbing"),
    ("free climbing", "Climbing"),
    ("bouldering", "Climbing"),
    ("alpinism", "Mountaineering"),
    ("mountaineering", "Mountaineering"),
    ("mountain climbing", "Mountaineering"),
    ("everest", "Mountaineering"),
    ("mount everest", "Mountaineering"),
    ("k2", "Mountaineering"),
    ("himalaya", "Mountaineering"),
    // Snow sports
    ("skiing", "Skiing"),
    ("ski", "Skiing"),
    ("backcountry skiing", "Skiing"),
    ("freeride", "Skiing"),
    ("snowboarding", "Snowboarding"),
    ("snowboard", "Snowboarding"),
    // Water sports
    ("surfing", "Surfing"),
    ("surf", "Surfing"),
    ("big wave surfing", "Surfing"),
    ("kayak", "Kayaking"),
    ("kayaking", "Kayaking"),
    ("whitewater", "Kayaking"),
    ("canoeing", "Kayaking"),
    ("sailing", "Sailing"),
    ("yacht", "Sailing"),
    ("scuba diving", "Diving"),
    ("diving", "Diving"),
    ("freediving", "Diving"),
    ("underwater", "Diving"),
    // Air sports
    ("paragliding", "Paragliding"),
    ("base jumping", "Base Jumping"),
    ("skydiving", "Base Jumping"),
    ("wingsuit", "Base Jumping"),
    // Running & Cycling
    ("trail running", "Trail Running"),
    ("ultramarathon", "Trail Running"),
    ("marathon", "Trail Running"),
    ("cycling", "Cycling"),
    ("mountain biking", "Cycling"),
    ("bicycle", "Cycling"),
    // Other adventure
    ("expedition", "Expedition"),
    ("exploration", "Expedition"),
    ("adventure", "Expedition"),
    ("polar expedition", "Polar Exploration"),
    ("arctic", "Polar Exploration"),
    ("antarctic", "Polar Exploration"),
    ("antarctica", "Polar Exploration"),
    ("cave", "Caving"),
    ("caving", "Caving"),
    ("spelunking", "Caving"),
    ("trekking", "Trekking"),
    ("hiking", "Trekking"),
    ("backpacking", "Trekking"),
    ("swimming", "Swimming"),
    ("open water", "Swimming"),
    ("rowing", "Rowing"),
    ("skateboard", "Skateboarding"),
    ("skateboarding", "Skateboarding"),
    // Wildlife
    ("wildlife", "Wildlife"),
    ("nature", "Wildlife"),
    ("animal", "Wildlife"),
    ("bird", "Wildlife"),
    ("shark", "Wildlife"),
    ("whale", "Wildlife"),
    ("bear", "Wildlife"),
    ("lion", "Wildlife"),
    ("elephant", "Wildlife"),
];

/// Lowercase source keyword → theme name.
const KEYWORD_TO_THEME: &[(&str, &str)] = &[
    ("adventure", "Adventure"),
    ("portrait", "Portrait"),
    ("biography", "Portrait"),
    ("biographical", "Portrait"),
    ("environment", "Environment"),
    ("environmental", "Environment"),
    ("climate change", "Environment"),
    ("global warming", "Environment"),
    ("conservation", "Conservation"),
    ("endangered species", "Conservation"),
    ("wildlife conservation", "Conservation"),
    ("first ascent", "First Ascent"),
    ("expedition", "Expedition"),
    ("competition", "Competition"),
    ("championship", "Competition"),
    ("olympics", "Competition"),
    ("world cup", "Competition"),
    ("survival", "Survival"),
    ("rescue", "Survival"),
    ("disaster", "Survival"),
    ("culture", "Culture"),
    ("indigenous", "Culture"),
    ("tradition", "Culture"),
    ("history", "History"),
    ("historical", "History"),
    ("science", "Science"),
    ("scientific", "Science"),
    ("research", "Science"),
    ("mountain", "Mountain"),
    ("mountains", "Mountain"),
    ("alps", "Mountain"),
    ("himalayas", "Mountain"),
    ("ocean", "Ocean"),
    ("sea", "Ocean"),
    ("marine", "Ocean"),
    ("desert", "Desert"),
    ("sahara", "Desert"),
    ("polar", "Polar"),
    ("arctic", "Polar"),
    ("antarctic", "Polar"),
    ("forest", "Forest"),
    ("jungle", "Forest"),
    ("rainforest", "Forest"),
    ("amazon", "Forest"),
];

/// Genre fallback; "documentary" itself is too generic to map.
const GENRE_TO_THEME: &[(&str, &str)] = &[("adventure", "Adventure"), ("history", "History")];

fn lookup(map: &[(&'static str, &'static str)], key: &str) -> Option<&'static str> {
    map.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

/// Distinct sport/theme names proposed by a keyword + genre list.
pub(crate) fn map_keywords(
    keywords: &[String],
    genres: &[String],
) -> (BTreeSet<&'static str>, BTreeSet<&'static str>) {
    let mut sports = BTreeSet::new();
    let mut themes = BTreeSet::new();
    for kw in keywords {
        if let Some(name) = lookup(KEYWORD_TO_SPORT, kw) {
            sports.insert(name);
        }
        if let Some(name) = lookup(KEYWORD_TO_THEME, kw) {
            themes.insert(name);
        }
    }
    for genre in genres {
        if let Some(name) = lookup(GENRE_TO_THEME, genre) {
            themes.insert(name);
        }
    }
    (sports, themes)
}

fn ids_for(names: &BTreeSet<&'static str>, taxonomy: &[TaxonomyEntry]) -> Vec<i64> {
    taxonomy
        .iter()
        .filter(|e| names.contains(e.name.as_str()))
        .map(|e| e.id)
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct KeywordTagOptions {
    pub dry_run: bool,
    pub limit: usize,
    pub force: bool,
}

#[derive(Debug, Default)]
pub struct KeywordTagStats {
    pub tagged: usize,
    pub no_matches: usize,
}

pub async fn run(
    store: &dyn CatalogStore,
    tmdb: &TmdbClient,
    opts: &KeywordTagOptions,
) -> Result<KeywordTagStats> {
    let mut stats = KeywordTagStats::default();

    if opts.dry_run {
        println!("DRY RUN - No changes will be made\n");
    }

    let ids = store
        .find_needing(NeedsCriterion::ExternalIdUntagged, opts.limit, opts.force)
        .await?;
    let total = ids.len();
    if total == 0 {
        println!("No documentaries need tagging!");
        return Ok(stats);
    }
    println!("Processing {total} documentaries...\n");

    let sports_taxonomy = store.list_taxonomy(TaxonomyKind::Sport).await?;
    let themes_taxonomy = store.list_taxonomy(TaxonomyKind::Theme).await?;

    for (i, id) in ids.into_iter().enumerate() {
        let doc = store.load(id).await?;
        print!("[{}/{total}] {}...", i + 1, doc.title);

        let keywords = tmdb.keywords(&doc.tmdb_id).await;
        let genres = tmdb.genres(&doc.tmdb_id).await;
        let (sport_names, theme_names) = map_keywords(&keywords, &genres);

        let sport_ids = ids_for(&sport_names, &sports_taxonomy);
        let theme_ids = ids_for(&theme_names, &themes_taxonomy);

        if sport_ids.is_empty() && theme_ids.is_empty() {
            println!(" no matches");
            stats.no_matches += 1;
            continue;
        }

        if opts.dry_run {
            println!(" Sports: {sport_names:?}, Themes: {theme_names:?}");
        } else {
            if !sport_ids.is_empty() {
                if let Err(err) = store.attach_tags(id, TaxonomyKind::Sport, &sport_ids).await {
                    warn!(documentary = %doc.slug, error = %err, "sport attach failed");
                }
            }
            if !theme_ids.is_empty() {
                if let Err(err) = store.attach_tags(id, TaxonomyKind::Theme, &theme_ids).await {
                    warn!(documentary = %doc.slug, error = %err, "theme attach failed");
                }
            }
            println!(" +{} sports, +{} themes", sport_ids.len(), theme_ids.len());
        }

        stats.tagged += 1;
    }

    println!();
    println!("Auto-tagging complete:");
    println!("  - Tagged: {}", stats.tagged);
    println!("  - No matches: {}", stats.no_matches);

    Ok(stats)
}
