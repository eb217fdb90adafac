use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use peakdocs::catalog::pg::PgStore;
use peakdocs::catalog::TranslateDirection;
use peakdocs::enrich::availability::{AvailabilityOptions, WebSourceFilter};
use peakdocs::enrich::metadata::MetadataOptions;
use peakdocs::enrich::posters::PosterOptions;
use peakdocs::enrich::web::WebOptions;
use peakdocs::enrich::{availability, metadata, posters, web};
use peakdocs::logging::init_tracing;
use peakdocs::normalization::title::{TitleMatcher, DEFAULT_MIN_SIMILARITY};
use peakdocs::seed;
use peakdocs::sources::claude::ClaudeClient;
use peakdocs::sources::justwatch::JustWatchClient;
use peakdocs::sources::tmdb::TmdbClient;
use peakdocs::sources::vimeo::VimeoScraper;
use peakdocs::sources::youtube::YouTubeScraper;
use peakdocs::tagging::ai::AiTagOptions;
use peakdocs::tagging::keywords::KeywordTagOptions;
use peakdocs::tagging::{ai, keywords};
use peakdocs::translate::{self, TranslateOptions};
use peakdocs::util::db::Db;
use peakdocs::util::env::{db_url, env_parse, env_req, init_env, preflight_check};

#[derive(Parser, Debug)]
#[command(name = "pd", version, about = "PeakDocs catalog admin CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum WebSourceArg {
    All,
    Justwatch,
    Youtube,
    Vimeo,
}

impl From<WebSourceArg> for WebSourceFilter {
    fn from(value: WebSourceArg) -> Self {
        match value {
            WebSourceArg::All => WebSourceFilter::All,
            WebSourceArg::Justwatch => WebSourceFilter::JustWatch,
            WebSourceArg::Youtube => WebSourceFilter::YouTube,
            WebSourceArg::Vimeo => WebSourceFilter::Vimeo,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum DirectionArg {
    EnToFr,
    FrToEn,
}

impl From<DirectionArg> for TranslateDirection {
    fn from(value: DirectionArg) -> Self {
        match value {
            DirectionArg::EnToFr => TranslateDirection::EnToFr,
            DirectionArg::FrToEn => TranslateDirection::FrToEn,
        }
    }
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Enrich documentaries with structured metadata (synopsis, runtime, ids)
    EnrichMetadata {
        /// Show what would be enriched without making changes
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        /// Limit number of documentaries to process (0 = all)
        #[arg(long, default_value_t = 0)]
        limit: usize,
        /// Re-enrich documentaries that already have TMDB data
        #[arg(long, default_value_t = false)]
        force: bool,
        /// Download and save poster/backdrop images locally
        #[arg(long, default_value_t = false)]
        download_images: bool,
    },
    /// Enrich documentaries via web scraping (YouTube, Vimeo)
    EnrichWeb {
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        #[arg(long, default_value_t = 0)]
        limit: usize,
        /// Re-enrich documentaries that already have data
        #[arg(long, default_value_t = false)]
        force: bool,
        /// Also process already-published documentaries
        #[arg(long, default_value_t = false)]
        include_published: bool,
        /// Skip the YouTube search
        #[arg(long, default_value_t = false)]
        skip_youtube: bool,
        /// Skip the Vimeo search
        #[arg(long, default_value_t = false)]
        skip_vimeo: bool,
    },
    /// Reconcile watch availability from the metadata source's providers
    Availability {
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        #[arg(long, default_value_t = 0)]
        limit: usize,
        /// Re-check documentaries that already have availabilities
        #[arg(long, default_value_t = false)]
        force: bool,
        /// Country code for watch providers
        #[arg(long, default_value = "FR")]
        country: String,
    },
    /// Reconcile watch availability from web sources
    AvailabilityWeb {
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        #[arg(long, default_value_t = 0)]
        limit: usize,
        #[arg(long, default_value_t = false)]
        force: bool,
        /// Which source to probe
        #[arg(long, value_enum, default_value = "all")]
        source: WebSourceArg,
        #[arg(long, default_value = "FR")]
        country: String,
        /// Minimum title similarity to accept a match (0-1)
        #[arg(long, default_value_t = 0.7)]
        min_similarity: f64,
    },
    /// Auto-tag documentaries from an AI analysis of their synopses
    AutotagAi {
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        #[arg(long, default_value_t = 0)]
        limit: usize,
        /// Re-tag documentaries that already have tags
        #[arg(long, default_value_t = false)]
        force: bool,
        /// Only process unpublished documentaries
        #[arg(long, default_value_t = false)]
        unpublished_only: bool,
    },
    /// Auto-tag documentaries from the metadata source's keywords
    AutotagKeywords {
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        #[arg(long, default_value_t = 0)]
        limit: usize,
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Download posters/backdrops for documentaries with a confirmed id
    Posters {
        #[arg(long, default_value_t = 0)]
        limit: usize,
    },
    /// Translate synopses between English and French
    Translate {
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        /// Number of documentaries to translate in one run
        #[arg(long, default_value_t = 10)]
        batch_size: usize,
        #[arg(long, value_enum, default_value = "en-to-fr")]
        direction: DirectionArg,
        /// Delay between API calls in seconds
        #[arg(long, default_value_t = 1.0)]
        delay: f64,
    },
    /// Seed the taxonomy vocabulary (sports, themes, regions, platforms)
    SeedTaxonomies {
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
}

async fn open_store() -> Result<PgStore> {
    let database_url = db_url()?;
    let max_connections: u32 = env_parse("DB_MAX_CONNECTIONS", 5u32);
    let db = Db::connect(&database_url, max_connections).await?;
    Ok(PgStore::new(db))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_env();
    init_tracing("info")?;

    let cli = Cli::parse();

    match cli.command {
        Commands::EnrichMetadata {
            dry_run,
            limit,
            force,
            download_images,
        } => {
            preflight_check("enrich-metadata", &["TMDB_API_KEY"], &["DATABASE_URL"])?;
            let store = open_store().await?;
            let tmdb = TmdbClient::new(env_req("TMDB_API_KEY")?)?;
            let opts = MetadataOptions {
                dry_run,
                limit,
                force,
                download_images,
            };
            metadata::run(&store, &tmdb, &opts).await?;
        }
        Commands::EnrichWeb {
            dry_run,
            limit,
            force,
            include_published,
            skip_youtube,
            skip_vimeo,
        } => {
            let store = open_store().await?;
            let matcher = TitleMatcher::new(DEFAULT_MIN_SIMILARITY);
            let youtube = YouTubeScraper::new(matcher)?;
            let vimeo = VimeoScraper::new(matcher)?;
            let opts = WebOptions {
                dry_run,
                limit,
                force,
                unpublished_only: !include_published,
                skip_youtube,
                skip_vimeo,
            };
            web::run(&store, &youtube, &vimeo, &opts).await?;
        }
        Commands::Availability {
            dry_run,
            limit,
            force,
            country,
        } => {
            preflight_check("availability", &["TMDB_API_KEY"], &["DATABASE_URL"])?;
            let store = open_store().await?;
            let tmdb = TmdbClient::new(env_req("TMDB_API_KEY")?)?;
            let opts = AvailabilityOptions {
                dry_run,
                limit,
                force,
                country: country.to_uppercase(),
                ..Default::default()
            };
            availability::run_providers(&store, &tmdb, &opts).await?;
        }
        Commands::AvailabilityWeb {
            dry_run,
            limit,
            force,
            source,
            country,
            min_similarity,
        } => {
            let store = open_store().await?;
            let matcher = TitleMatcher::new(min_similarity);
            let jw = JustWatchClient::new()?;
            let youtube = YouTubeScraper::new(matcher)?;
            let vimeo = VimeoScraper::new(matcher)?;
            let opts = AvailabilityOptions {
                dry_run,
                limit,
                force,
                country: country.to_uppercase(),
                min_similarity,
            };
            availability::run_web(&store, &jw, &youtube, &vimeo, source.into(), &opts).await?;
        }
        Commands::AutotagAi {
            dry_run,
            limit,
            force,
            unpublished_only,
        } => {
            preflight_check("autotag-ai", &["ANTHROPIC_API_KEY"], &["DATABASE_URL"])?;
            let store = open_store().await?;
            let claude = ClaudeClient::new(env_req("ANTHROPIC_API_KEY")?)?;
            let opts = AiTagOptions {
                dry_run,
                limit,
                force,
                unpublished_only,
            };
            ai::run(&store, &claude, &opts).await?;
        }
        Commands::AutotagKeywords {
            dry_run,
            limit,
            force,
        } => {
            preflight_check("autotag-keywords", &["TMDB_API_KEY"], &["DATABASE_URL"])?;
            let store = open_store().await?;
            let tmdb = TmdbClient::new(env_req("TMDB_API_KEY")?)?;
            let opts = KeywordTagOptions {
                dry_run,
                limit,
                force,
            };
            keywords::run(&store, &tmdb, &opts).await?;
        }
        Commands::Posters { limit } => {
            preflight_check("posters", &["TMDB_API_KEY"], &["DATABASE_URL"])?;
            let store = open_store().await?;
            let tmdb = TmdbClient::new(env_req("TMDB_API_KEY")?)?;
            posters::run(&store, &tmdb, &PosterOptions { limit }).await?;
        }
        Commands::Translate {
            dry_run,
            batch_size,
            direction,
            delay,
        } => {
            preflight_check("translate", &["ANTHROPIC_API_KEY"], &["DATABASE_URL"])?;
            let store = open_store().await?;
            let claude = ClaudeClient::new(env_req("ANTHROPIC_API_KEY")?)?;
            let opts = TranslateOptions {
                dry_run,
                batch_size,
                direction: direction.into(),
                delay_secs: delay,
            };
            translate::run(&store, &claude, &opts).await?;
        }
        Commands::SeedTaxonomies { dry_run } => {
            let store = open_store().await?;
            seed::run(&store, dry_run).await?;
        }
    }

    Ok(())
}
