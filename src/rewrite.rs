use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AppConfig;
use crate::types::{Error, Result, RewrittenArticle};

/// Maximum article characters submitted to the model, bounding payload size
/// and worst-case latency.
const MAX_PROMPT_CONTENT_BYTES: usize = 4000;

/// Turns a scraped article into a structured market-analysis brief.
///
/// Implementations are treated as unreliable external calls: a failure
/// drops the candidate for the current cycle only, and the candidate comes
/// back on the next cycle because nothing was persisted for it.
#[async_trait]
pub trait Rewriter: Send + Sync {
    async fn rewrite(&self, title: &str, content: &str, source: &str) -> Result<RewrittenArticle>;
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    format: String,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: String,
}

/// Rewrites articles through a local Ollama runtime.
pub struct OllamaRewriter {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaRewriter {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.rewrite_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.ollama_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    fn build_prompt(title: &str, content: &str, source: &str) -> String {
        let excerpt = truncate_on_char_boundary(content, MAX_PROMPT_CONTENT_BYTES);
        format!(
            r#"You are a senior market analyst at an Indonesian financial intelligence desk.
Rewrite the news below into actionable market intelligence for Indonesian traders and investors.

Requirements:
- Language: formal Bahasa Indonesia.
- Tone: analytical and data-driven, no sensationalism.
- Structure the analysis as markdown: a short lead on what happened, the market impact (stocks, forex, crypto, commodities), the key players involved, and what traders should watch next.
- Write a sharp headline and a two-sentence summary.
- Classify the story as exactly one of: STOCKS, CRYPTO, FOREX, COMMODITIES, GEOPOLITICS, MACRO.

Original title: {title}
Source: {source}

Article:
{excerpt}

Respond with JSON only, using exactly these fields:
{{"title": "...", "summary": "...", "content": "...", "category": "..."}}"#
        )
    }
}

#[async_trait]
impl Rewriter for OllamaRewriter {
    async fn rewrite(&self, title: &str, content: &str, source: &str) -> Result<RewrittenArticle> {
        debug!("rewriting with {}: {}", self.model, title);

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Self::build_prompt(title, content, source),
            }],
            stream: false,
            format: "json".to_string(),
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Rewrite(format!("model endpoint returned HTTP {}", status)));
        }

        let reply: ChatResponse = response.json().await?;
        serde_json::from_str(reply.message.content.trim())
            .map_err(|err| Error::Rewrite(format!("model reply is not the expected JSON: {}", err)))
    }
}

/// Truncates to at most `max` bytes without splitting a UTF-8 character.
fn truncate_on_char_boundary(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        // "é" is two bytes; cutting at 5 would land inside the third one.
        let text = "ééé";
        assert_eq!(truncate_on_char_boundary(text, 5), "éé");
        assert_eq!(truncate_on_char_boundary(text, 6), "ééé");
        assert_eq!(truncate_on_char_boundary("short", 4000), "short");
    }

    #[test]
    fn prompt_carries_title_source_and_truncated_body() {
        let long_body = "x".repeat(MAX_PROMPT_CONTENT_BYTES + 100);
        let prompt = OllamaRewriter::build_prompt("Fed holds rates", &long_body, "Reuters");

        assert!(prompt.contains("Fed holds rates"));
        assert!(prompt.contains("Reuters"));
        assert!(!prompt.contains(&long_body));
        assert!(prompt.contains(&long_body[..MAX_PROMPT_CONTENT_BYTES]));
    }

    #[test]
    fn model_reply_decodes_into_a_rewrite() {
        let reply = r###"{"title": "Judul", "summary": "Dua kalimat.", "content": "## Analisis", "category": "MACRO"}"###;
        let parsed: RewrittenArticle = serde_json::from_str(reply).unwrap();
        assert_eq!(parsed.title.as_deref(), Some("Judul"));
        assert_eq!(parsed.category.as_deref(), Some("MACRO"));
    }
}
