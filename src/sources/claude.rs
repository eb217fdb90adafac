//! Claude completion client, used for taxonomy tagging and synopsis
//! translation. The taxonomy is enumerated verbatim in the system prompt so
//! the model can only pick from names that already exist; validation happens
//! again on our side before anything is attached.

use anyhow::{anyhow, Result};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use crate::ratelimit::RequestWindow;
use crate::util::env::env_opt;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-3-5-haiku-20241022";

pub const TAGGING_SYSTEM_PROMPT: &str = "You categorize adventure documentaries. Output ONLY valid JSON, nothing else.

Sports: Climbing, Mountaineering, Skiing, Snowboarding, Surfing, Kayaking, Trail Running, Cycling, Sailing, Diving, Paragliding, Base Jumping, Expedition, Polar Exploration, Caving, Wildlife, Trekking, Swimming, Rowing, Skateboarding

Themes: Adventure, Portrait, Environment, Conservation, First Ascent, Expedition, Competition, Survival, Culture, History, Science, Mountain, Ocean, Desert, Polar, Forest

Regions: Alps, Himalayas, Andes, Rockies, Patagonia, Nepal, New Zealand, Iceland, Norway, Canada, USA, France, Switzerland, Antarctica, Arctic, Amazon, Sahara, Morocco, Tanzania, Kenya, Madagascar, Indonesia, Philippines, Japan, China, Tibet, Pacific Islands, Caribbean, Mediterranean, Scandinavia, Greenland, Alaska, Mongolia, Central Asia, Middle East, Australia, South Africa, India

Output format (JSON only, no other text):
{\"sports\":[\"...\"],\"themes\":[\"...\"],\"regions\":[\"...\"],\"reasoning\":\"...\"}";

pub struct ClaudeClient {
    http: Client,
    api_key: String,
    model: String,
    limiter: RequestWindow,
}

impl ClaudeClient {
    pub fn new(api_key: String) -> Result<Self> {
        let http = Client::builder()
            .user_agent("peakdocs/0.1")
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            api_key,
            model: env_opt("ANTHROPIC_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            limiter: RequestWindow::new(30, Duration::from_secs(60)),
        })
    }

    /// One completion round-trip; returns the first text block.
    pub async fn complete(
        &self,
        system: Option<&str>,
        user: &str,
        max_tokens: u32,
    ) -> Result<String> {
        self.limiter.acquire().await;
        let mut body = json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "messages": [{"role": "user", "content": user}],
        });
        if let Some(system) = system {
            body["system"] = json!(system);
        }

        let resp = self
            .http
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let err_body: Value = resp.json().await.unwrap_or(Value::Null);
            let message = err_body
                .pointer("/error/message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error");
            return Err(anyhow!("claude request failed: {status} {message}"));
        }

        let payload: Value = resp.json().await?;
        payload
            .pointer("/content/0/text")
            .and_then(|t| t.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("claude response had no text content"))
    }

    /// Tag analysis for one documentary; returns the raw model text for the
    /// caller to repair/validate.
    pub async fn analyze_tags(
        &self,
        title: &str,
        year: i32,
        synopsis: &str,
        directors: &[String],
    ) -> Result<String> {
        let directors_line = if directors.is_empty() {
            "Unknown".to_string()
        } else {
            directors.join(", ")
        };
        let user = format!(
            "Documentary: {title} ({year})\n\nSynopsis: {synopsis}\n\n\
             Directors: {directors_line}\n\n\
             Analyze this documentary and provide appropriate tags."
        );
        self.complete(Some(TAGGING_SYSTEM_PROMPT), &user, 500).await
    }

    /// Translate a synopsis, keeping tone and style.
    pub async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String> {
        let user = format!(
            "Translate the following documentary synopsis from {source_lang} to {target_lang}.\n\
             Keep the same tone and style. Only output the translation, nothing else.\n\n\
             Synopsis:\n{text}"
        );
        let out = self.complete(None, &user, 1024).await?;
        Ok(out.trim().to_string())
    }
}
