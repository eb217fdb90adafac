//! Vimeo scraping: fallback web source when YouTube has nothing. Search
//! results are plain HTML; video pages expose og: meta tags for
//! title/description/thumbnail.

use regex::Regex;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::normalization::title::{similarity, TitleMatcher};
use crate::ratelimit::RequestWindow;
use crate::sources::youtube::VideoHit;
use crate::sources::{decode_entities, OfferSource, WatchOffer};

pub struct VimeoScraper {
    http: Client,
    limiter: RequestWindow,
    matcher: TitleMatcher,
    video_id_re: Regex,
    result_link_re: Regex,
}

impl VimeoScraper {
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
            video_id_re: Regex::new(r#""/(\d{8,12})""#).expect("static regex"),
            result_link_re: Regex::new(r#"href="/(\d{6,12})"[^>]*>([^<]+)</a>"#)
                .expect("static regex"),
        })
    }

    async fn get_text(&self, url: &str) -> Option<String> {
        self.limiter.acquire().await;
        let resp = match self.http.get(url).send().await {
            Ok(r) => r,
            Err(err) => {
                debug!(url, error = %err, "vimeo request failed");
                return None;
            }
        };
        if !resp.status().is_success() {
            debug!(url, status = %resp.status(), "vimeo non-success status");
            return None;
        }
        resp.text().await.ok()
    }

    pub async fn search(&self, title: &str, year: Option<i32>) -> Option<VideoHit> {
        let mut query = format!("{title} documentaire");
        if let Some(y) = year {
            query.push_str(&format!(" {y}"));
        }
        let url = format!(
            "https://vimeo.com/search?q={}",
            urlencoding::encode(&query)
        );
        let html = self.get_text(&url).await?;

        let mut seen = std::collections::HashSet::new();
        let mut unique_ids: Vec<String> = Vec::new();
        for cap in self.video_id_re.captures_iter(&html) {
            let vid = cap[1].to_string();
            if seen.insert(vid.clone()) {
                unique_ids.push(vid);
                if unique_ids.len() >= 3 {
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
        let url = format!("https://vimeo.com/{video_id}");
        let html = self.get_text(&url).await?;

        let title = og_content(&html, "og:title")?;
        if !self.matcher.matches(&title, expected_title) {
            return None;
        }

        Some(VideoHit {
            video_id: video_id.to_string(),
            video_url: url,
            title,
            description: og_content(&html, "og:description").filter(|s| !s.is_empty()),
            thumbnail_url: og_content(&html, "og:image").unwrap_or_default(),
        })
    }

    /// Search-page probe for availability: accept the first result whose link
    /// text clears the similarity floor. Most directly hosted Vimeo films are
    /// free to watch.
    pub async fn search_offers(
        &self,
        title: &str,
        year: i32,
        min_similarity: f64,
    ) -> Vec<WatchOffer> {
        let query = format!("{title} {year}");
        let url = format!(
            "https://vimeo.com/search?q={}",
            urlencoding::encode(&query)
        );
        let Some(html) = self.get_text(&url).await else {
            return Vec::new();
        };

        for cap in self.result_link_re.captures_iter(&html).take(5) {
            let video_id = cap[1].to_string();
            let found_title = decode_entities(cap[2].trim());
            if similarity(title, &found_title) >= min_similarity {
                return vec![WatchOffer {
                    platform_slug: "vimeo".into(),
                    url: format!("https://vimeo.com/{video_id}"),
                    is_free: true,
                    monetization: "FREE".into(),
                    source: OfferSource::WebSearch,
                }];
            }
        }
        Vec::new()
    }

    pub async fn download_image(&self, url: &str) -> Option<Vec<u8>> {
        if url.is_empty() {
            return None;
        }
        self.limiter.acquire().await;
        let resp = self.http.get(url).send().await.ok()?;
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

fn og_content(html: &str, property: &str) -> Option<String> {
    let needle = format!(r#"<meta property="{property}" content=""#);
    let start = html.find(&needle)? + needle.len();
    let rest = &html[start..];
    let end = rest.find('"')?;
    Some(decode_entities(&rest[..end]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn og_tags_are_extracted() {
        let html = r#"<meta property="og:title" content="Wild Waters" />
                      <meta property="og:description" content="A kayak odyssey &amp; more" />"#;
        assert_eq!(og_content(html, "og:title").as_deref(), Some("Wild Waters"));
        assert_eq!(
            og_content(html, "og:description").as_deref(),
            Some("A kayak odyssey & more")
        );
        assert!(og_content(html, "og:image").is_none());
    }

    #[test]
    fn result_links_parse_id_and_title() {
        let re = Regex::new(r#"href="/(\d{6,12})"[^>]*>([^<]+)</a>"#).unwrap();
        let html = r#"<a href="/123456789" class="x">ORA</a>"#;
        let cap = re.captures(html).unwrap();
        assert_eq!(&cap[1], "123456789");
        assert_eq!(&cap[2], "ORA");
    }
}
