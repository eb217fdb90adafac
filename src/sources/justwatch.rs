//! JustWatch aggregator client (unofficial GraphQL endpoint).
//!
//! There is no supported API, so the whole client sits behind the
//! `justwatch` cargo feature. Builds without it still run the availability
//! pipeline: the client reports "no offers" and logs a single warning per
//! process instead of failing the batch.

/// Search hit pending similarity scoring by the reconciler.
#[derive(Debug, Clone)]
pub struct JwCandidate {
    pub entry_id: String,
    pub title: String,
    pub release_year: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct JwOffer {
    pub technical_name: String,
    pub monetization_type: String,
    pub url: String,
}

#[cfg(feature = "justwatch")]
mod client {
    use super::{JwCandidate, JwOffer};
    use anyhow::{anyhow, Result};
    use reqwest::Client;
    use serde_json::{json, Value};
    use std::time::Duration;

    use crate::ratelimit::RequestWindow;

    const GRAPHQL_URL: &str = "https://apis.justwatch.com/graphql";

    const SEARCH_QUERY: &str = r#"
        query SearchTitles($country: Country!, $language: Language!, $first: Int!, $filter: TitleFilter) {
            popularTitles(country: $country, first: $first, filter: $filter) {
                edges {
                    node {
                        id
                        content(country: $country, language: $language) {
                            title
                            originalReleaseYear
                        }
                    }
                }
            }
        }"#;

    const OFFERS_QUERY: &str = r#"
        query GetTitleOffers($nodeId: ID!, $country: Country!) {
            node(id: $nodeId) {
                ... on MovieOrShow {
                    offers(country: $country, platform: WEB) {
                        monetizationType
                        standardWebURL
                        package {
                            technicalName
                        }
                    }
                }
            }
        }"#;

    pub struct JustWatchClient {
        http: Client,
        limiter: RequestWindow,
    }

    impl JustWatchClient {
        pub fn new() -> Result<Self> {
            let http = Client::builder()
                .user_agent("peakdocs/0.1")
                .timeout(Duration::from_secs(15))
                .build()?;
            Ok(Self {
                http,
                limiter: RequestWindow::new(10, Duration::from_secs(10)),
            })
        }

        async fn graphql(&self, query: &str, variables: Value) -> Result<Value> {
            self.limiter.acquire().await;
            let resp = self
                .http
                .post(GRAPHQL_URL)
                .json(&json!({"query": query, "variables": variables}))
                .send()
                .await?;
            let status = resp.status();
            if !status.is_success() {
                return Err(anyhow!("justwatch request failed: {status}"));
            }
            Ok(resp.json().await?)
        }

        pub async fn search(
            &self,
            query: &str,
            country: &str,
            language: &str,
            count: u32,
        ) -> Result<Vec<JwCandidate>> {
            let body = self
                .graphql(
                    SEARCH_QUERY,
                    json!({
                        "country": country,
                        "language": language,
                        "first": count,
                        "filter": {"searchQuery": query},
                    }),
                )
                .await?;

            let mut hits = Vec::new();
            if let Some(edges) = body
                .pointer("/data/popularTitles/edges")
                .and_then(|e| e.as_array())
            {
                for edge in edges {
                    let Some(node) = edge.get("node") else {
                        continue;
                    };
                    let Some(id) = node.get("id").and_then(|v| v.as_str()) else {
                        continue;
                    };
                    let title = node
                        .pointer("/content/title")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default();
                    if title.is_empty() {
                        continue;
                    }
                    hits.push(JwCandidate {
                        entry_id: id.to_string(),
                        title: title.to_string(),
                        release_year: node
                            .pointer("/content/originalReleaseYear")
                            .and_then(|v| v.as_i64())
                            .map(|y| y as i32),
                    });
                }
            }
            Ok(hits)
        }

        pub async fn offers(&self, entry_id: &str, country: &str) -> Result<Vec<JwOffer>> {
            let body = self
                .graphql(
                    OFFERS_QUERY,
                    json!({
                        "nodeId": entry_id,
                        "country": country,
                    }),
                )
                .await?;

            let mut offers = Vec::new();
            if let Some(arr) = body.pointer("/data/node/offers").and_then(|o| o.as_array()) {
                for offer in arr {
                    let technical_name = offer
                        .pointer("/package/technicalName")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default();
                    let url = offer
                        .get("standardWebURL")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default();
                    let monetization_type = offer
                        .get("monetizationType")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default();
                    if technical_name.is_empty() || url.is_empty() {
                        continue;
                    }
                    offers.push(JwOffer {
                        technical_name: technical_name.to_string(),
                        monetization_type: monetization_type.to_string(),
                        url: url.to_string(),
                    });
                }
            }
            Ok(offers)
        }
    }
}

#[cfg(not(feature = "justwatch"))]
mod client {
    use super::{JwCandidate, JwOffer};
    use anyhow::Result;
    use std::sync::Once;
    use tracing::warn;

    static WARNED: Once = Once::new();

    pub struct JustWatchClient;

    impl JustWatchClient {
        pub fn new() -> Result<Self> {
            Ok(Self)
        }

        pub async fn search(
            &self,
            _query: &str,
            _country: &str,
            _language: &str,
            _count: u32,
        ) -> Result<Vec<JwCandidate>> {
            WARNED.call_once(|| {
                warn!("built without the justwatch feature; aggregator probe reports no offers");
            });
            Ok(Vec::new())
        }

        pub async fn offers(&self, _entry_id: &str, _country: &str) -> Result<Vec<JwOffer>> {
            Ok(Vec::new())
        }
    }
}

pub use client::JustWatchClient;
