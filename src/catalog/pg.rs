//! Postgres-backed store. Ensure helpers follow the select-then-insert shape
//! so the pipelines stay safe against legacy rows, and every availability
//! write goes through the (documentary, platform) uniqueness key.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::path::PathBuf;
use tracing::debug;

use crate::util::db::Db;
use crate::util::env::env_opt;

use super::store::CatalogStore;
use super::{
    slugify, AssetWrites, AvailabilityFields, DocId, DocPatch, Documentary, NeedsCriterion,
    TaxonomyEntry, TaxonomyKind, TaxonomySeed, TranslateDirection, Upserted,
};

pub struct PgStore {
    db: Db,
    media_root: PathBuf,
}

impl PgStore {
    pub fn new(db: Db) -> Self {
        let media_root = env_opt("MEDIA_ROOT").unwrap_or_else(|| "media".into());
        Self {
            db,
            media_root: PathBuf::from(media_root),
        }
    }

    fn write_asset(&self, subdir: &str, slug: &str, role: &str, bytes: &[u8]) -> Result<String> {
        let dir = self.media_root.join(subdir);
        std::fs::create_dir_all(&dir)?;
        let filename = format!("{slug}-{role}.jpg");
        std::fs::write(dir.join(&filename), bytes)?;
        Ok(format!("{subdir}/{filename}"))
    }

    fn taxonomy_table(kind: TaxonomyKind) -> &'static str {
        match kind {
            TaxonomyKind::Sport => "sports",
            TaxonomyKind::Theme => "themes",
            TaxonomyKind::Region => "regions",
            TaxonomyKind::Platform => "platforms",
        }
    }
}

fn no_tag_clause(table: &str) -> String {
    format!("NOT EXISTS (SELECT 1 FROM {table} t WHERE t.documentary_id = d.id)")
}

fn no_availability_clause() -> &'static str {
    "NOT EXISTS (SELECT 1 FROM availabilities a WHERE a.documentary_id = d.id)"
}

/// (scope, needs) WHERE fragments for a criterion. `scope` always applies;
/// `needs` is dropped by --force.
fn criterion_clauses(criterion: NeedsCriterion) -> (Vec<String>, Vec<String>) {
    let mut scope: Vec<String> = Vec::new();
    let mut needs: Vec<String> = Vec::new();
    match criterion {
        NeedsCriterion::MissingExternalId => {
            needs.push("d.tmdb_id = ''".into());
        }
        NeedsCriterion::MissingPoster { unpublished_only } => {
            if unpublished_only {
                scope.push("d.is_published = FALSE".into());
            }
            needs.push("d.poster = ''".into());
        }
        NeedsCriterion::ExternalIdMissingPoster => {
            scope.push("d.tmdb_id <> ''".into());
            needs.push("d.poster = ''".into());
        }
        NeedsCriterion::ExternalIdNoAvailability => {
            scope.push("d.tmdb_id <> ''".into());
            needs.push(no_availability_clause().into());
        }
        NeedsCriterion::NoAvailability => {
            needs.push(no_availability_clause().into());
        }
        NeedsCriterion::ExternalIdUntagged => {
            scope.push("d.tmdb_id <> ''".into());
            needs.push(no_tag_clause("documentary_sports"));
            needs.push(no_tag_clause("documentary_themes"));
        }
        NeedsCriterion::UntaggedWithSynopsis { unpublished_only } => {
            scope.push("d.synopsis <> ''".into());
            scope.push(format!(
                "d.synopsis NOT LIKE '{}%'",
                super::PLACEHOLDER_SYNOPSIS_PREFIX
            ));
            if unpublished_only {
                scope.push("d.is_published = FALSE".into());
            }
            needs.push(no_tag_clause("documentary_sports"));
            needs.push(no_tag_clause("documentary_themes"));
            needs.push(no_tag_clause("documentary_regions"));
        }
        NeedsCriterion::MissingTranslation(direction) => match direction {
            TranslateDirection::EnToFr => {
                scope.push("d.synopsis_en <> ''".into());
                needs.push("d.synopsis = ''".into());
            }
            TranslateDirection::FrToEn => {
                scope.push("d.synopsis <> ''".into());
                needs.push("d.synopsis_en = ''".into());
            }
        },
    }
    (scope, needs)
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn find_needing(
        &self,
        criterion: NeedsCriterion,
        limit: usize,
        force: bool,
    ) -> Result<Vec<DocId>> {
        let (scope, needs) = criterion_clauses(criterion);
        let mut parts = scope;
        if !force {
            parts.extend(needs);
        }
        let where_clause = if parts.is_empty() {
            "TRUE".to_string()
        } else {
            parts.join(" AND ")
        };
        let order = match criterion {
            NeedsCriterion::MissingTranslation(_) => "d.id",
            _ => "d.year DESC, d.title",
        };
        let mut sql =
            format!("SELECT d.id FROM documentaries d WHERE {where_clause} ORDER BY {order}");
        if limit > 0 {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        let ids: Vec<i64> = sqlx::query_scalar(&sql)
            .persistent(false)
            .fetch_all(&self.db.pool)
            .await?;
        debug!(criterion = ?criterion, count = ids.len(), "selected entities");
        Ok(ids)
    }

    async fn load(&self, id: DocId) -> Result<Documentary> {
        let row = sqlx::query(
            "SELECT id, title, original_title, slug, year, duration_minutes, synopsis, \
             synopsis_en, poster, backdrop, trailer_url, imdb_id, imdb_rating, tmdb_id, \
             is_published FROM documentaries WHERE id = $1",
        )
        .persistent(false)
        .bind(id)
        .fetch_one(&self.db.pool)
        .await?;

        let directors: Vec<String> = sqlx::query_scalar(
            "SELECT p.name FROM people p \
             JOIN documentary_directors dd ON dd.person_id = p.id \
             WHERE dd.documentary_id = $1 ORDER BY p.name",
        )
        .persistent(false)
        .bind(id)
        .fetch_all(&self.db.pool)
        .await?;

        Ok(Documentary {
            id: row.get("id"),
            title: row.get("title"),
            original_title: row.get("original_title"),
            slug: row.get("slug"),
            year: row.get("year"),
            duration_minutes: row.get("duration_minutes"),
            synopsis: row.get("synopsis"),
            synopsis_en: row.get("synopsis_en"),
            poster: row.get("poster"),
            backdrop: row.get("backdrop"),
            trailer_url: row.get("trailer_url"),
            imdb_id: row.get("imdb_id"),
            imdb_rating: row.get("imdb_rating"),
            tmdb_id: row.get("tmdb_id"),
            is_published: row.get("is_published"),
            directors,
        })
    }

    async fn commit_patch(&self, id: DocId, patch: &DocPatch, assets: &AssetWrites) -> Result<()> {
        let mut tx = self.db.pool.begin().await?;

        let slug: String = sqlx::query_scalar("SELECT slug FROM documentaries WHERE id = $1")
            .persistent(false)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        let poster_path = match &assets.poster {
            Some(bytes) => Some(self.write_asset("posters", &slug, "poster", bytes)?),
            None => None,
        };
        let backdrop_path = match &assets.backdrop {
            Some(bytes) => Some(self.write_asset("backdrops", &slug, "backdrop", bytes)?),
            None => None,
        };

        sqlx::query(
            "UPDATE documentaries SET \
                 tmdb_id = COALESCE($2, tmdb_id), \
                 imdb_id = COALESCE($3, imdb_id), \
                 imdb_rating = COALESCE($4, imdb_rating), \
                 synopsis = COALESCE($5, synopsis), \
                 synopsis_en = COALESCE($6, synopsis_en), \
                 duration_minutes = COALESCE($7, duration_minutes), \
                 trailer_url = COALESCE($8, trailer_url), \
                 poster = COALESCE($9, poster), \
                 backdrop = COALESCE($10, backdrop), \
                 updated_at = now() \
             WHERE id = $1",
        )
        .persistent(false)
        .bind(id)
        .bind(patch.tmdb_id.as_deref())
        .bind(patch.imdb_id.as_deref())
        .bind(patch.imdb_rating)
        .bind(patch.synopsis.as_deref())
        .bind(patch.synopsis_en.as_deref())
        .bind(patch.duration_minutes)
        .bind(patch.trailer_url.as_deref())
        .bind(poster_path.as_deref())
        .bind(backdrop_path.as_deref())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn upsert_availability(
        &self,
        documentary_id: DocId,
        platform_id: i64,
        fields: &AvailabilityFields,
    ) -> Result<Upserted> {
        let countries = serde_json::json!(fields.country_codes);
        let checked_at = Utc::now();
        if let Some(row) = sqlx::query(
            "SELECT id FROM availabilities WHERE documentary_id = $1 AND platform_id = $2",
        )
        .persistent(false)
        .bind(documentary_id)
        .bind(platform_id)
        .fetch_optional(&self.db.pool)
        .await?
        {
            let existing_id: i64 = row.get("id");
            sqlx::query(
                "UPDATE availabilities SET url = $1, is_free = $2, country_codes = $3, \
                 last_checked = $4 WHERE id = $5",
            )
            .persistent(false)
            .bind(&fields.url)
            .bind(fields.is_free)
            .bind(&countries)
            .bind(checked_at)
            .bind(existing_id)
            .execute(&self.db.pool)
            .await?;
            return Ok(Upserted::Updated);
        }

        sqlx::query(
            "INSERT INTO availabilities (documentary_id, platform_id, url, is_free, country_codes, last_checked) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (documentary_id, platform_id) DO UPDATE SET \
                 url = EXCLUDED.url, is_free = EXCLUDED.is_free, \
                 country_codes = EXCLUDED.country_codes, last_checked = EXCLUDED.last_checked",
        )
        .persistent(false)
        .bind(documentary_id)
        .bind(platform_id)
        .bind(&fields.url)
        .bind(fields.is_free)
        .bind(&countries)
        .bind(checked_at)
        .execute(&self.db.pool)
        .await?;
        Ok(Upserted::Created)
    }

    async fn list_taxonomy(&self, kind: TaxonomyKind) -> Result<Vec<TaxonomyEntry>> {
        let table = Self::taxonomy_table(kind);
        let rows = sqlx::query(&format!("SELECT id, name, slug FROM {table} ORDER BY name"))
            .persistent(false)
            .fetch_all(&self.db.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| TaxonomyEntry {
                id: r.get("id"),
                name: r.get("name"),
                slug: r.get("slug"),
            })
            .collect())
    }

    async fn attach_tags(
        &self,
        documentary_id: DocId,
        kind: TaxonomyKind,
        tag_ids: &[i64],
    ) -> Result<usize> {
        let (join_table, column) = match kind {
            TaxonomyKind::Sport => ("documentary_sports", "sport_id"),
            TaxonomyKind::Theme => ("documentary_themes", "theme_id"),
            TaxonomyKind::Region => ("documentary_regions", "region_id"),
            TaxonomyKind::Platform => bail!("platforms are linked via availabilities, not tags"),
        };
        let sql = format!(
            "INSERT INTO {join_table} (documentary_id, {column}) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING"
        );
        let mut added = 0usize;
        for tag_id in tag_ids {
            let result = sqlx::query(&sql)
                .persistent(false)
                .bind(documentary_id)
                .bind(tag_id)
                .execute(&self.db.pool)
                .await?;
            added += result.rows_affected() as usize;
        }
        Ok(added)
    }

    async fn ensure_taxonomy_entry(
        &self,
        kind: TaxonomyKind,
        seed: &TaxonomySeed,
    ) -> Result<Upserted> {
        let table = Self::taxonomy_table(kind);
        let slug = slugify(seed.name);
        let existing = sqlx::query(&format!("SELECT id FROM {table} WHERE slug = $1"))
            .persistent(false)
            .bind(&slug)
            .fetch_optional(&self.db.pool)
            .await?;
        if existing.is_some() {
            return Ok(Upserted::Updated);
        }

        match kind {
            TaxonomyKind::Sport => {
                sqlx::query("INSERT INTO sports (name, slug, icon) VALUES ($1, $2, $3)")
                    .persistent(false)
                    .bind(seed.name)
                    .bind(&slug)
                    .bind(seed.icon.unwrap_or(""))
                    .execute(&self.db.pool)
                    .await?;
            }
            TaxonomyKind::Theme | TaxonomyKind::Region => {
                sqlx::query(&format!("INSERT INTO {table} (name, slug) VALUES ($1, $2)"))
                    .persistent(false)
                    .bind(seed.name)
                    .bind(&slug)
                    .execute(&self.db.pool)
                    .await?;
            }
            TaxonomyKind::Platform => {
                sqlx::query(
                    "INSERT INTO platforms (name, slug, website, is_free) VALUES ($1, $2, $3, $4)",
                )
                .persistent(false)
                .bind(seed.name)
                .bind(&slug)
                .bind(seed.website.unwrap_or(""))
                .bind(seed.is_free)
                .execute(&self.db.pool)
                .await?;
            }
        }
        Ok(Upserted::Created)
    }
}
