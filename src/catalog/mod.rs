//! Catalog domain types and the persistence contract consumed by the
//! enrichment pipelines. Nothing here knows about HTTP routing or the admin
//! surface; the pipelines read and write through [`store::CatalogStore`].

pub mod store;

pub mod pg;

#[cfg(test)]
pub mod memory;

use serde::{Deserialize, Serialize};

pub type DocId = i64;

/// Synopses seeded from festival palmarès imports all start with this prefix
/// ("Winner of <award> at <festival> <year>"). They are placeholders: web
/// enrichment may replace them regardless of length, and AI tagging skips
/// entities that still carry one.
pub const PLACEHOLDER_SYNOPSIS_PREFIX: &str = "Winner of";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Documentary {
    pub id: DocId,
    pub title: String,
    pub original_title: String,
    pub slug: String,
    pub year: i32,
    pub duration_minutes: Option<i32>,
    pub synopsis: String,
    pub synopsis_en: String,
    pub poster: String,
    pub backdrop: String,
    pub trailer_url: String,
    pub imdb_id: String,
    pub imdb_rating: Option<f64>,
    pub tmdb_id: String,
    pub is_published: bool,
    pub directors: Vec<String>,
}

impl Documentary {
    pub fn has_placeholder_synopsis(&self) -> bool {
        self.synopsis.starts_with(PLACEHOLDER_SYNOPSIS_PREFIX)
    }

    /// Stable slug derived from title and year at creation; immutable after.
    pub fn slug_for(title: &str, year: i32) -> String {
        format!("{}-{year}", slugify(title))
    }
}

/// Lowercase ASCII-alphanumeric slug with dash separators.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut last_dash = false;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash && !slug.is_empty() {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_matches('-').to_string()
}

/// Sparse patch over scalar documentary fields. `None` means "leave as is";
/// precedence decisions are made by the pipeline before the patch is built,
/// so a non-empty patch is always safe to apply verbatim.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocPatch {
    pub tmdb_id: Option<String>,
    pub imdb_id: Option<String>,
    pub imdb_rating: Option<f64>,
    pub synopsis: Option<String>,
    pub synopsis_en: Option<String>,
    pub duration_minutes: Option<i32>,
    pub trailer_url: Option<String>,
}

impl DocPatch {
    pub fn is_empty(&self) -> bool {
        self.tmdb_id.is_none()
            && self.imdb_id.is_none()
            && self.imdb_rating.is_none()
            && self.synopsis.is_none()
            && self.synopsis_en.is_none()
            && self.duration_minutes.is_none()
            && self.trailer_url.is_none()
    }
}

/// Raw asset bytes to persist alongside a patch, only for slots that are
/// currently empty.
#[derive(Debug, Clone, Default)]
pub struct AssetWrites {
    pub poster: Option<Vec<u8>>,
    pub backdrop: Option<Vec<u8>>,
}

impl AssetWrites {
    pub fn is_empty(&self) -> bool {
        self.poster.is_none() && self.backdrop.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AvailabilityFields {
    pub url: String,
    pub is_free: bool,
    pub country_codes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    Created,
    Updated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaxonomyKind {
    Sport,
    Theme,
    Region,
    Platform,
}

impl TaxonomyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxonomyKind::Sport => "sport",
            TaxonomyKind::Theme => "theme",
            TaxonomyKind::Region => "region",
            TaxonomyKind::Platform => "platform",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaxonomyEntry {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

/// Seed row for the operator-curated vocabulary.
#[derive(Debug, Clone)]
pub struct TaxonomySeed {
    pub name: &'static str,
    pub icon: Option<&'static str>,
    pub website: Option<&'static str>,
    pub is_free: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslateDirection {
    EnToFr,
    FrToEn,
}

/// Driver filters: which entities a batch run should visit. The store keeps
/// the ordering fixed (newest first, then title) so re-running a batch
/// revisits the same entities in the same order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeedsCriterion {
    /// No TMDB id yet (metadata enrichment default filter).
    MissingExternalId,
    /// No poster; optionally restricted to unpublished entries (web enrichment).
    MissingPoster { unpublished_only: bool },
    /// Confirmed TMDB id but no poster (poster backfill).
    ExternalIdMissingPoster,
    /// Confirmed TMDB id and no availability rows (provider reconciliation).
    ExternalIdNoAvailability,
    /// No availability rows at all (web availability probes).
    NoAvailability,
    /// Confirmed TMDB id, no sport/theme tags (keyword tagging).
    ExternalIdUntagged,
    /// Real synopsis present, no tags at all (AI tagging).
    UntaggedWithSynopsis { unpublished_only: bool },
    /// One synopsis language present, the other missing.
    MissingTranslation(TranslateDirection),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_is_title_plus_year() {
        assert_eq!(Documentary::slug_for("The Dawn Wall", 2018), "the-dawn-wall-2018");
        assert_eq!(Documentary::slug_for("Naïs au pays des loups", 2022), "na-s-au-pays-des-loups-2022");
    }

    #[test]
    fn placeholder_synopsis_detection() {
        let doc = Documentary {
            synopsis: "Winner of Grand Prix du Festival at FIFAV 2023".into(),
            ..Default::default()
        };
        assert!(doc.has_placeholder_synopsis());
    }

    #[test]
    fn empty_patch_is_empty() {
        assert!(DocPatch::default().is_empty());
        let p = DocPatch {
            tmdb_id: Some("555".into()),
            ..Default::default()
        };
        assert!(!p.is_empty());
    }
}
