//! YouTube scraping: the most reliable source for niche and festival-only
//! documentaries that never reach the structured metadata catalogs.
//!
//! Search result pages and watch pages both embed machine-readable JSON
//! (`ytInitialData`, `ytInitialPlayerResponse`). Those blobs are preferred
//! over meta tags: the meta description is truncated to 160 chars while
//! `videoDetails.shortDescription` carries the full text.

use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::normalization::title::{similarity, TitleMatcher};
use crate::ratelimit::RequestWindow;
use crate::sources::{decode_entities, OfferSource, WatchOffer};
use crate::util::json_repair::extract_json_object;

#[derive(Debug, Clone)]
pub struct VideoHit {
    pub video_id: String,
    pub video_url: String,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: String,
}

pub struct YouTubeScraper {
    http: Client,
    limiter: RequestWindow,
    matcher: TitleMatcher,
    video_id_re: Regex,
    meta_title_re: Regex,
    meta_description_re: Regex,
}

impl YouTubeScraper {
    pub fn new(matcher: TitleMatcher) -> anyhow::Result<Self> {
        let http = Client::builder()
            .user_agent(
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            )
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            http,
            limiter: RequestWindow::new(5, Duration::from_secs(10)),
            matcher,
            video_id_re: Regex::new(r#""videoId":"([a-zA-Z0-9_-]{11})""#).expect("static regex"),
            meta_title_re: Regex::new(r#"<meta name="title" content="([^"]*)""#)
                .expect("static regex"),
            meta_description_re: Regex::new(r#"<meta name="description" content="([^"]*)""#)
                .expect("static regex"),
        })
    }

    async fn get_text(&self, url: &str) -> Option<String> {
        self.limiter.acquire().await;
        let resp = match self.http.get(url).send().await {
            Ok(r) => r,
            Err(err) => {
                debug!(url, error = %err, "youtube request failed");
                return None;
            }
        };
        if !resp.status().is_success() {
            debug!(url, status = %resp.status(), "youtube non-success status");
            return None;
        }
        resp.text().await.ok()
    }

    /// Search for a documentary; returns the first candidate whose watch-page
    /// title survives the fuzzy match. Free-text search returns plenty of
    /// false positives, so the match gate is mandatory.
    pub async fn search(&self, title: &str, year: Option<i32>) -> Option<VideoHit> {
        let mut query = format!("{title} documentaire");
        if let Some(y) = year {
            query.push_str(&format!(" {y}"));
        }
        let url = format!(
            "https://www.youtube.com/results?search_query={}",
            urlencoding::encode(&query)
        );
        let html = self.get_text(&url).await?;

        let mut seen = std::collections::HashSet::new();
        let mut unique_ids: Vec<String> = Vec::new();
        for cap in self.video_id_re.captures_iter(&html) {
            let vid = cap[1].to_string();
            if seen.insert(vid.clone()) {
                unique_ids.push(vid);
                if unique_ids.len() >= 5 {
                    break;
                }
            }
        }

        for video_id in unique_ids {
            if let Some(hit) = self.fetch_video(&video_id, title).await {
                return Some(hit);
            }
        }
        None
    }

    async fn fetch_video(&self, video_id: &str, expected_title: &str) -> Option<VideoHit> {
        let url = format!("https://www.youtube.com/watch?v={video_id}");
        let html = self.get_text(&url).await?;

        let title = self
            .meta_title_re
            .captures(&html)
            .map(|c| decode_entities(&c[1]))?;
        if !self.matcher.matches(&title, expected_title) {
            return None;
        }

        // Full description lives in the embedded player response; the meta
        // tag is a truncated fallback.
        let mut description = embedded_json(&html, "ytInitialPlayerResponse")
            .and_then(|data| {
                data.get("videoDetails")
                    .and_then(|d| d.get("shortDescription"))
                    .and_then(|s| s.as_str())
                    .map(|s| s.trim().to_string())
            })
            .filter(|s| !s.is_empty());
        if description.is_none() {
            description = self
                .meta_description_re
                .captures(&html)
                .map(|c| decode_entities(c[1].trim()))
                .filter(|s| !s.is_empty());
        }

        Some(VideoHit {
            video_id: video_id.to_string(),
            video_url: url,
            title,
            description,
            thumbnail_url: format!("https://i.ytimg.com/vi/{video_id}/maxresdefault.jpg"),
        })
    }

    /// Probe for a free full-length upload. Quoted query variants keep the
    /// result set tight; only similarity-checked, plausibly full-length
    /// videos produce an offer.
    pub async fn search_free_offers(
        &self,
        title: &str,
        year: i32,
        min_similarity: f64,
    ) -> Vec<WatchOffer> {
        let queries = [
            format!("\"{title}\" documentaire complet"),
            format!("\"{title}\" {year} film complet"),
            format!("\"{title}\" documentary"),
        ];

        for query in queries {
            let url = format!(
                "https://www.youtube.com/results?search_query={}",
                urlencoding::encode(&query)
            );
            let Some(html) = self.get_text(&url).await else {
                continue;
            };
            let Some(data) = embedded_json(&html, "var ytInitialData") else {
                continue;
            };
            for video in extract_search_videos(&data).into_iter().take(3) {
                if similarity(title, &video.title) >= min_similarity
                    && is_full_length(&video.duration)
                {
                    return vec![WatchOffer {
                        platform_slug: "youtube".into(),
                        url: format!("https://www.youtube.com/watch?v={}", video.id),
                        is_free: true,
                        monetization: "FREE".into(),
                        source: OfferSource::WebSearch,
                    }];
                }
            }
        }
        Vec::new()
    }

    /// Thumbnail download with the maxres → hq fallback (YouTube 404s
    /// maxresdefault for plenty of older uploads).
    pub async fn download_image(&self, url: &str) -> Option<Vec<u8>> {
        self.limiter.acquire().await;
        let mut resp = self.http.get(url).send().await.ok()?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND
            && url.contains("ytimg.com")
            && url.contains("maxresdefault")
        {
            let fallback = url.replace("maxresdefault", "hqdefault");
            resp = self.http.get(&fallback).send().await.ok()?;
        }
        if !resp.status().is_success() {
            return None;
        }
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !content_type.contains("image") {
            return None;
        }
        resp.bytes().await.ok().map(|b| b.to_vec())
    }
}

/// Locate `marker` in the page and parse the JSON object that follows it.
fn embedded_json(html: &str, marker: &str) -> Option<Value> {
    let pos = html.find(marker)?;
    let tail = &html[pos + marker.len()..];
    let candidate = extract_json_object(tail)?;
    serde_json::from_str(&candidate).ok()
}

#[derive(Debug, Clone)]
struct SearchVideo {
    id: String,
    title: String,
    duration: String,
}

/// Walk the search-results renderer tree for plain video entries.
fn extract_search_videos(data: &Value) -> Vec<SearchVideo> {
    let mut videos = Vec::new();
    let Some(sections) = data
        .pointer("/contents/twoColumnSearchResultsRenderer/primaryContents/sectionListRenderer/contents")
        .and_then(|c| c.as_array())
    else {
        return videos;
    };
    for section in sections {
        let Some(items) = section
            .pointer("/itemSectionRenderer/contents")
            .and_then(|c| c.as_array())
        else {
            continue;
        };
        for item in items {
            let Some(video) = item.get("videoRenderer") else {
                continue;
            };
            let id = video.get("videoId").and_then(|v| v.as_str());
            let title = video
                .pointer("/title/runs/0/text")
                .and_then(|v| v.as_str());
            let duration = video
                .pointer("/lengthText/simpleText")
                .and_then(|v| v.as_str())
                .unwrap_or("");
            if let (Some(id), Some(title)) = (id, title) {
                videos.push(SearchVideo {
                    id: id.to_string(),
                    title: title.to_string(),
                    duration: duration.to_string(),
                });
            }
        }
    }
    videos
}

/// Anything at least 20 minutes long plausibly is the full documentary
/// rather than a trailer. Unknown durations pass.
fn is_full_length(duration: &str) -> bool {
    if duration.is_empty() {
        return true;
    }
    let parts: Vec<&str> = duration.split(':').collect();
    match parts.len() {
        3 => true,
        2 => parts[0].parse::<u32>().map(|m| m >= 20).unwrap_or(true),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn embedded_json_is_preferred_over_meta() {
        let html = r#"<html><script>var ytInitialPlayerResponse = {"videoDetails":
            {"shortDescription":"Full arctic expedition synopsis, uncropped."}};</script>"#;
        let data = embedded_json(html, "ytInitialPlayerResponse").unwrap();
        assert_eq!(
            data.pointer("/videoDetails/shortDescription").unwrap(),
            "Full arctic expedition synopsis, uncropped."
        );
    }

    #[test]
    fn embedded_json_absent_yields_none() {
        assert!(embedded_json("<html></html>", "ytInitialPlayerResponse").is_none());
    }

    #[test]
    fn search_video_walker_reads_renderer_tree() {
        let data = json!({"contents": {"twoColumnSearchResultsRenderer": {"primaryContents":
            {"sectionListRenderer": {"contents": [{"itemSectionRenderer": {"contents": [
                {"videoRenderer": {"videoId": "abc123def45", "title": {"runs": [{"text": "Arktika"}]},
                 "lengthText": {"simpleText": "1:32:10"}}},
                {"shelfRenderer": {}}
            ]}}]}}}}});
        let videos = extract_search_videos(&data);
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].id, "abc123def45");
        assert_eq!(videos[0].duration, "1:32:10");
    }

    #[test]
    fn duration_gate_rejects_shorts() {
        assert!(is_full_length("1:23:45"));
        assert!(is_full_length("45:23"));
        assert!(!is_full_length("12:40"));
        assert!(is_full_length(""));
    }
}
