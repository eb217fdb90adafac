//! One module per external source. Every client owns its own
//! [`crate::ratelimit::RequestWindow`] (quotas are per remote service) and
//! degrades to `None`/empty on transport failure so a flaky source never
//! aborts a batch.

pub mod claude;
pub mod justwatch;
pub mod tmdb;
pub mod vimeo;
pub mod youtube;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Unconfirmed search result from a source, pending title-match validation.
/// Never persisted; the orchestrator consumes it and throws it away.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// The source's native identifier (numeric id, video id, ...).
    pub source_id: String,
    pub title: String,
    pub year: Option<i32>,
    pub poster_ref: Option<String>,
    pub backdrop_ref: Option<String>,
}

/// Capability set of a structured metadata source. The orchestrator depends
/// only on this trait, so tests substitute a scripted double.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn search(&self, title: &str, year: Option<i32>) -> Result<Option<Candidate>>;
    async fn details(&self, candidate: &Candidate) -> Result<Value>;
    async fn download_asset(&self, asset_ref: &str, size_hint: &str) -> Option<Vec<u8>>;
}

/// Where a watch offer came from. Ordering is the conflict-resolution
/// priority: when sources disagree about a platform within one run, the
/// highest-priority source wins regardless of arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OfferSource {
    /// Structured metadata watch-provider endpoint.
    Tmdb,
    /// Unofficial aggregator.
    JustWatch,
    /// Direct web search (YouTube/Vimeo result pages).
    WebSearch,
}

/// A candidate "watchable on platform X" record, already normalized to an
/// internal platform slug. Ephemeral: consumed by the reconciler.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchOffer {
    pub platform_slug: String,
    pub url: String,
    pub is_free: bool,
    pub monetization: String,
    pub source: OfferSource,
}

/// Minimal entity decoding for text pulled out of HTML attributes.
pub(crate) fn decode_entities(raw: &str) -> String {
    raw.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_priority_order() {
        assert!(OfferSource::Tmdb < OfferSource::JustWatch);
        assert!(OfferSource::JustWatch < OfferSource::WebSearch);
    }

    #[test]
    fn decodes_common_entities() {
        assert_eq!(decode_entities("Fire &amp; Ice"), "Fire & Ice");
    }
}
