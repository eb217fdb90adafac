use anyhow::Result;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions, PgSslMode},
    PgPool,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, instrument};

use crate::util::env::env_flag;

#[derive(Clone)]
pub struct Db {
    pub pool: PgPool,
}

/// Idempotent schema bootstrap. Gated behind AUTO_MIGRATE so the CLI can also
/// run against a database managed elsewhere.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS sports (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        slug TEXT NOT NULL UNIQUE,
        icon TEXT NOT NULL DEFAULT ''
    )",
    "CREATE TABLE IF NOT EXISTS themes (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        slug TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS regions (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        slug TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS platforms (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        slug TEXT NOT NULL UNIQUE,
        website TEXT NOT NULL DEFAULT '',
        is_free BOOLEAN NOT NULL DEFAULT FALSE
    )",
    "CREATE TABLE IF NOT EXISTS people (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        slug TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS documentaries (
        id BIGSERIAL PRIMARY KEY,
        title TEXT NOT NULL,
        original_title TEXT NOT NULL DEFAULT '',
        slug TEXT NOT NULL UNIQUE,
        year INT NOT NULL,
        duration_minutes INT,
        synopsis TEXT NOT NULL DEFAULT '',
        synopsis_en TEXT NOT NULL DEFAULT '',
        poster TEXT NOT NULL DEFAULT '',
        backdrop TEXT NOT NULL DEFAULT '',
        trailer_url TEXT NOT NULL DEFAULT '',
        imdb_id TEXT NOT NULL DEFAULT '',
        imdb_rating DOUBLE PRECISION,
        tmdb_id TEXT NOT NULL DEFAULT '',
        is_published BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS documentary_directors (
        documentary_id BIGINT NOT NULL REFERENCES documentaries(id) ON DELETE CASCADE,
        person_id BIGINT NOT NULL REFERENCES people(id) ON DELETE CASCADE,
        PRIMARY KEY (documentary_id, person_id)
    )",
    "CREATE TABLE IF NOT EXISTS documentary_sports (
        documentary_id BIGINT NOT NULL REFERENCES documentaries(id) ON DELETE CASCADE,
        sport_id BIGINT NOT NULL REFERENCES sports(id) ON DELETE CASCADE,
        PRIMARY KEY (documentary_id, sport_id)
    )",
    "CREATE TABLE IF NOT EXISTS documentary_themes (
        documentary_id BIGINT NOT NULL REFERENCES documentaries(id) ON DELETE CASCADE,
        theme_id BIGINT NOT NULL REFERENCES themes(id) ON DELETE CASCADE,
        PRIMARY KEY (documentary_id, theme_id)
    )",
    "CREATE TABLE IF NOT EXISTS documentary_regions (
        documentary_id BIGINT NOT NULL REFERENCES documentaries(id) ON DELETE CASCADE,
        region_id BIGINT NOT NULL REFERENCES regions(id) ON DELETE CASCADE,
        PRIMARY KEY (documentary_id, region_id)
    )",
    "CREATE TABLE IF NOT EXISTS availabilities (
        id BIGSERIAL PRIMARY KEY,
        documentary_id BIGINT NOT NULL REFERENCES documentaries(id) ON DELETE CASCADE,
        platform_id BIGINT NOT NULL REFERENCES platforms(id) ON DELETE CASCADE,
        url TEXT NOT NULL,
        is_free BOOLEAN NOT NULL DEFAULT FALSE,
        available_from DATE,
        available_until DATE,
        country_codes JSONB NOT NULL DEFAULT '[]',
        last_checked TIMESTAMPTZ NOT NULL DEFAULT now(),
        UNIQUE (documentary_id, platform_id)
    )",
];

impl Db {
    // SECURITY: never include raw DSNs in tracing spans (they may contain credentials).
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let mut connect_options = PgConnectOptions::from_str(database_url)?;
        if database_url.contains("sslmode=require") {
            connect_options = connect_options.ssl_mode(PgSslMode::Require);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .connect_with(connect_options)
            .await?;
        info!("connected to db");

        if env_flag("AUTO_MIGRATE", false) {
            info!("running migrations (AUTO_MIGRATE=on)");
            Self::run_migrations(&pool).await?;
        }
        Ok(Self { pool })
    }

    async fn run_migrations(pool: &PgPool) -> Result<()> {
        for stmt in SCHEMA {
            sqlx::query(stmt).execute(pool).await?;
        }
        Ok(())
    }
}
