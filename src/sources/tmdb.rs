//! TMDB client: structured metadata search/details, watch providers,
//! keywords, and image download.
//!
//! Public API (base): https://api.themoviedb.org/3
//!
//! Key endpoints:
//! - GET /search/movie?query=...&year=... - Search for a movie/documentary
//! - GET /movie/{id}?append_to_response=credits,watch/providers,videos
//! - GET /movie/{id}/watch/providers - Per-country watch offers
//! - GET /movie/{id}/keywords - Keyword tags
//! - Image CDN: https://image.tmdb.org/t/p/{size}{path}

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::ratelimit::RequestWindow;
use crate::sources::{Candidate, MetadataSource};
use crate::util::env::env_parse;
use crate::util::json_repair::parse_lenient;

const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p/";

fn truncate_for_log(mut s: String, max_len: usize) -> String {
    if s.len() > max_len {
        s.truncate(max_len);
        s.push('…');
    }
    s
}

#[derive(Debug)]
pub struct TmdbClient {
    base_url: String,
    image_base: String,
    http: Client,
    api_key: String,
    limiter: RequestWindow,
}

impl TmdbClient {
    pub fn new(api_key: String) -> Result<Self> {
        let timeout_secs: u64 = env_parse("TMDB_TIMEOUT_SECS", 30u64);
        let http = Client::builder()
            .user_agent("peakdocs/0.1")
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        // TMDB allows ~40 requests per 10 seconds; stay under it.
        Ok(Self {
            base_url: TMDB_BASE_URL.to_string(),
            image_base: TMDB_IMAGE_BASE.to_string(),
            http,
            api_key,
            limiter: RequestWindow::new(35, Duration::from_secs(10)),
        })
    }

    async fn get_json(&self, url: &str, params: &[(&str, String)]) -> Result<Value> {
        self.limiter.acquire().await;
        let mut query: Vec<(&str, String)> = vec![("api_key", self.api_key.clone())];
        query.extend_from_slice(params);
        let resp = self.http.get(url).query(&query).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = truncate_for_log(resp.text().await.unwrap_or_default(), 2000);
            return Err(anyhow!("tmdb request failed: {status} url={url} body={body}"));
        }

        let text = resp.text().await?;
        match serde_json::from_str(&text) {
            Ok(v) => Ok(v),
            Err(err) => {
                // Truncated bodies do show up on flaky links; try the
                // brace-balancing repair before giving up on the entity.
                if let Some(v) = parse_lenient(&text) {
                    tracing::warn!(url, "repaired malformed response body");
                    return Ok(v);
                }
                Err(anyhow!("tmdb response parse failed: {err} url={url}"))
            }
        }
    }

    /// Search for a movie/documentary. When the year-constrained search comes
    /// back empty the search is retried without the year, since source years
    /// are sometimes off-by-one versus the catalog.
    pub async fn search_movie(
        &self,
        title: &str,
        year: Option<i32>,
    ) -> Result<Option<Candidate>> {
        let url = format!("{}/search/movie", self.base_url);
        let mut params: Vec<(&str, String)> = vec![
            ("query", title.to_string()),
            ("include_adult", "false".to_string()),
        ];
        if let Some(y) = year {
            params.push(("year", y.to_string()));
            params.push(("primary_release_year", y.to_string()));
        }

        let body = self.get_json(&url, &params).await?;
        let mut results = body
            .get("results")
            .and_then(|r| r.as_array())
            .cloned()
            .unwrap_or_default();

        if results.is_empty() && year.is_some() {
            let relaxed: Vec<(&str, String)> = vec![
                ("query", title.to_string()),
                ("include_adult", "false".to_string()),
            ];
            let body = self.get_json(&url, &relaxed).await?;
            results = body
                .get("results")
                .and_then(|r| r.as_array())
                .cloned()
                .unwrap_or_default();
        }

        Ok(results.first().and_then(candidate_from_result))
    }

    /// Full movie details including credits, watch providers, and videos.
    pub async fn movie_details(&self, movie_id: i64) -> Result<Value> {
        let url = format!("{}/movie/{movie_id}", self.base_url);
        self.get_json(
            &url,
            &[(
                "append_to_response",
                "credits,watch/providers,videos".to_string(),
            )],
        )
        .await
    }

    /// Watch providers keyed by country code.
    pub async fn watch_providers(&self, tmdb_id: &str) -> Result<Value> {
        let url = format!("{}/movie/{tmdb_id}/watch/providers", self.base_url);
        self.get_json(&url, &[]).await
    }

    /// Lowercased keyword names; empty on any failure.
    pub async fn keywords(&self, tmdb_id: &str) -> Vec<String> {
        let url = format!("{}/movie/{tmdb_id}/keywords", self.base_url);
        match self.get_json(&url, &[]).await {
            Ok(body) => body
                .get("keywords")
                .and_then(|k| k.as_array())
                .map(|arr| {
                    arr.iter()
                        .filter_map(|kw| kw.get("name").and_then(|n| n.as_str()))
                        .map(|s| s.to_lowercase())
                        .collect()
                })
                .unwrap_or_default(),
            Err(err) => {
                tracing::debug!(tmdb_id, error = %err, "keyword fetch failed");
                Vec::new()
            }
        }
    }

    /// Lowercased genre names; empty on any failure.
    pub async fn genres(&self, tmdb_id: &str) -> Vec<String> {
        let url = format!("{}/movie/{tmdb_id}", self.base_url);
        match self.get_json(&url, &[]).await {
            Ok(body) => body
                .get("genres")
                .and_then(|g| g.as_array())
                .map(|arr| {
                    arr.iter()
                        .filter_map(|g| g.get("name").and_then(|n| n.as_str()))
                        .map(|s| s.to_lowercase())
                        .collect()
                })
                .unwrap_or_default(),
            Err(err) => {
                tracing::debug!(tmdb_id, error = %err, "genre fetch failed");
                Vec::new()
            }
        }
    }

    /// Image bytes from the CDN; None on any failure.
    pub async fn download_image(&self, path: &str, size: &str) -> Option<Vec<u8>> {
        if path.is_empty() {
            return None;
        }
        self.limiter.acquire().await;
        let url = format!("{}{size}{path}", self.image_base);
        let resp = self.http.get(&url).send().await.ok()?;
        if !resp.status().is_success() {
            return None;
        }
        resp.bytes().await.ok().map(|b| b.to_vec())
    }
}

fn candidate_from_result(result: &Value) -> Option<Candidate> {
    let id = result.get("id").and_then(|v| v.as_i64())?;
    let title = result
        .get("title")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let year = result
        .get("release_date")
        .and_then(|v| v.as_str())
        .and_then(|d| d.get(0..4))
        .and_then(|y| y.parse::<i32>().ok());
    Some(Candidate {
        source_id: id.to_string(),
        title,
        year,
        poster_ref: result
            .get("poster_path")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        backdrop_ref: result
            .get("backdrop_path")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
    })
}

#[async_trait]
impl MetadataSource for TmdbClient {
    async fn search(&self, title: &str, year: Option<i32>) -> Result<Option<Candidate>> {
        self.search_movie(title, year).await
    }

    async fn details(&self, candidate: &Candidate) -> Result<Value> {
        let movie_id: i64 = candidate
            .source_id
            .parse()
            .map_err(|_| anyhow!("non-numeric tmdb id {:?}", candidate.source_id))?;
        self.movie_details(movie_id).await
    }

    async fn download_asset(&self, asset_ref: &str, size_hint: &str) -> Option<Vec<u8>> {
        self.download_image(asset_ref, size_hint).await
    }
}

/// Pull the scalar enrichment fields out of a details payload.
pub fn extract_overview(details: &Value) -> Option<&str> {
    details
        .get("overview")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
}

pub fn extract_runtime(details: &Value) -> Option<i32> {
    details
        .get("runtime")
        .and_then(|v| v.as_i64())
        .filter(|r| *r > 0)
        .map(|r| r as i32)
}

pub fn extract_imdb_id(details: &Value) -> Option<&str> {
    details
        .get("imdb_id")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
}

pub fn extract_vote_average(details: &Value) -> Option<f64> {
    details
        .get("vote_average")
        .and_then(|v| v.as_f64())
        .filter(|r| *r > 0.0)
}

/// First YouTube trailer from the appended videos list.
pub fn extract_trailer_url(details: &Value) -> Option<String> {
    let videos = details.get("videos")?.get("results")?.as_array()?;
    for video in videos {
        let site = video.get("site").and_then(|v| v.as_str());
        let kind = video.get("type").and_then(|v| v.as_str());
        if site == Some("YouTube") && kind == Some("Trailer") {
            if let Some(key) = video.get("key").and_then(|v| v.as_str()) {
                return Some(format!("https://www.youtube.com/watch?v={key}"));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn candidate_parses_year_from_release_date() {
        let c = candidate_from_result(&json!({
            "id": 555, "title": "Arktika", "release_date": "2004-06-01",
            "poster_path": "/p.jpg"
        }))
        .unwrap();
        assert_eq!(c.source_id, "555");
        assert_eq!(c.year, Some(2004));
        assert_eq!(c.poster_ref.as_deref(), Some("/p.jpg"));
    }

    #[test]
    fn trailer_prefers_youtube_trailer_type() {
        let details = json!({"videos": {"results": [
            {"site": "Vimeo", "type": "Trailer", "key": "nope"},
            {"site": "YouTube", "type": "Clip", "key": "clip1"},
            {"site": "YouTube", "type": "Trailer", "key": "abc123"},
        ]}});
        assert_eq!(
            extract_trailer_url(&details).as_deref(),
            Some("https://www.youtube.com/watch?v=abc123")
        );
    }

    #[test]
    fn scalar_extractors_ignore_empty_values() {
        let details = json!({"overview": "", "runtime": 0, "imdb_id": "", "vote_average": 0.0});
        assert!(extract_overview(&details).is_none());
        assert!(extract_runtime(&details).is_none());
        assert!(extract_imdb_id(&details).is_none());
        assert!(extract_vote_average(&details).is_none());
    }
}
