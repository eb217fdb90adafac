//! Seed the curated taxonomy vocabulary. This is the only code path that
//! creates taxonomy rows; the pipelines just read them. Idempotent: existing
//! slugs are left untouched.

use anyhow::Result;

use crate::catalog::store::CatalogStore;
use crate::catalog::{TaxonomyKind, TaxonomySeed, Upserted};

const fn tag(name: &'static str) -> TaxonomySeed {
    TaxonomySeed {
        name,
        icon: None,
        website: None,
        is_free: false,
    }
}

const fn sport(name: &'static str, icon: &'static str) -> TaxonomySeed {
    TaxonomySeed {
        name,
        icon: Some(icon),
        website: None,
        is_free: false,
    }
}

const fn platform(name: &'static str, website: &'static str, is_free: bool) -> TaxonomySeed {
    TaxonomySeed {
        name,
        icon: None,
        website: Some(website),
        is_free,
    }
}

/// Sports/activities with Lucide icon names.
const SPORTS: &[TaxonomySeed] = &[
    sport("Climbing", "mountain"),
    sport("Mountaineering", "mountain-snow"),
    sport("Skiing", "snowflake"),
    sport("Snowboarding", "snowflake"),
    sport("Surfing", "waves"),
    sport("Kayaking", "ship"),
    sport("Trail Running", "footprints"),
    sport("Cycling", "bike"),
    sport("Sailing", "sailboat"),
    sport("Diving", "fish"),
    sport("Paragliding", "wind"),
    sport("Base Jumping", "plane"),
    sport("Expedition", "compass"),
    sport("Polar Exploration", "thermometer-snowflake"),
    sport("Caving", "lamp"),
    sport("Wildlife", "bird"),
    sport("Trekking", "footprints"),
    sport("Swimming", "waves"),
    sport("Rowing", "anchor"),
    sport("Skateboarding", "circle-dot"),
];

const THEMES: &[TaxonomySeed] = &[
    tag("Adventure"),
    tag("Portrait"),
    tag("Environment"),
    tag("Conservation"),
    tag("First Ascent"),
    tag("Expedition"),
    tag("Competition"),
    tag("Survival"),
    tag("Culture"),
    tag("History"),
    tag("Science"),
    tag("Festival Winner"),
    tag("Audience Favorite"),
    tag("Mountain"),
    tag("Ocean"),
    tag("Desert"),
    tag("Polar"),
    tag("Forest"),
];

const REGIONS: &[TaxonomySeed] = &[
    // Mountain ranges
    tag("Alps"),
    tag("Himalayas"),
    tag("Andes"),
    tag("Rockies"),
    tag("Karakoram"),
    tag("Dolomites"),
    tag("Pyrenees"),
    tag("Patagonia"),
    tag("Alaska Range"),
    // Countries/areas known for adventure
    tag("Nepal"),
    tag("New Zealand"),
    tag("Iceland"),
    tag("Norway"),
    tag("Canada"),
    tag("USA"),
    tag("France"),
    tag("Switzerland"),
    tag("Italy"),
    tag("Spain"),
    tag("Morocco"),
    tag("South Africa"),
    tag("Australia"),
    tag("Japan"),
    tag("Mongolia"),
    tag("Greenland"),
    tag("Antarctica"),
    tag("Arctic"),
    // Water/ocean regions
    tag("Pacific Ocean"),
    tag("Atlantic Ocean"),
    tag("Mediterranean"),
    tag("Caribbean"),
    tag("Indonesia"),
    tag("Hawaii"),
    tag("Tahiti"),
    tag("Maldives"),
    // Special areas
    tag("Amazon"),
    tag("Sahara"),
    tag("Yosemite"),
    tag("Torres del Paine"),
];

const PLATFORMS: &[TaxonomySeed] = &[
    platform("Netflix", "https://netflix.com", false),
    platform("Amazon Prime Video", "https://primevideo.com", false),
    platform("Disney+", "https://disneyplus.com", false),
    platform("Arte", "https://arte.tv", true),
    platform("YouTube", "https://youtube.com", true),
    platform("Vimeo", "https://vimeo.com", false),
    platform("Red Bull TV", "https://redbull.com/tv", true),
    platform("Curiosity Stream", "https://curiositystream.com", false),
    platform("Apple TV+", "https://tv.apple.com", false),
    platform("Ushuaïa TV", "https://ushuaiatv.fr", false),
    platform("Outside TV", "https://watch.outsideonline.com", false),
    platform("Mubi", "https://mubi.com", false),
    platform("Paramount+", "https://paramountplus.com", false),
    platform("Plex", "https://plex.tv", true),
];

#[derive(Debug, Default)]
pub struct SeedStats {
    pub created: usize,
    pub existing: usize,
}

pub async fn run(store: &dyn CatalogStore, dry_run: bool) -> Result<SeedStats> {
    let mut stats = SeedStats::default();

    let groups: [(TaxonomyKind, &[TaxonomySeed]); 4] = [
        (TaxonomyKind::Sport, SPORTS),
        (TaxonomyKind::Theme, THEMES),
        (TaxonomyKind::Region, REGIONS),
        (TaxonomyKind::Platform, PLATFORMS),
    ];

    for (kind, seeds) in groups {
        println!("Seeding {}s...", kind.as_str());
        for seed in seeds {
            if dry_run {
                println!("  would ensure: {}", seed.name);
                continue;
            }
            match store.ensure_taxonomy_entry(kind, seed).await? {
                Upserted::Created => {
                    println!("  + {}", seed.name);
                    stats.created += 1;
                }
                Upserted::Updated => stats.existing += 1,
            }
        }
    }

    println!();
    println!(
        "Seeding complete: {} created, {} already present",
        stats.created, stats.existing
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::memory::MemStore;

    #[tokio::test]
    async fn seeding_twice_creates_nothing_new() {
        let store = MemStore::default();
        let first = run(&store, false).await.unwrap();
        assert!(first.created > 0);
        assert_eq!(first.existing, 0);

        let second = run(&store, false).await.unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.existing, first.created);
    }

    #[tokio::test]
    async fn mapped_platform_slugs_are_all_seeded() {
        // Every slug the provider maps can produce must exist after seeding,
        // otherwise reconciled offers would be dropped as unmapped.
        let store = MemStore::default();
        run(&store, false).await.unwrap();
        let platforms = store
            .list_taxonomy(TaxonomyKind::Platform)
            .await
            .unwrap();
        let slugs: Vec<String> = platforms.into_iter().map(|p| p.slug).collect();
        for needed in [
            "netflix",
            "amazon-prime-video",
            "disney",
            "arte",
            "youtube",
            "vimeo",
            "curiosity-stream",
            "apple-tv",
            "mubi",
            "paramount",
            "plex",
            "red-bull-tv",
        ] {
            assert!(slugs.contains(&needed.to_string()), "missing {needed}");
        }
    }
}
