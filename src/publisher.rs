use std::time::Duration;

use serde::Serialize;
use tracing::info;

use crate::config::AppConfig;
use crate::types::{Article, Error, Result, SyncReceipt};

/// Pushes the full article collection to the remote store.
///
/// The remote side upserts idempotently keyed by article identity, so the
/// publisher sends everything on every call and does no diffing.
pub struct Publisher {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct SyncPayload<'a> {
    articles: &'a [Article],
}

impl Publisher {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: config.sync_url.trim_end_matches('/').to_string(),
            api_key: config.sync_api_key.clone(),
        })
    }

    /// Uploads every article in one bulk upsert call.
    ///
    /// Fails with `Error::MissingApiKey` before any network traffic when the
    /// shared secret is absent, so callers can tell "not configured" apart
    /// from "configured but failing".
    pub async fn publish(&self, articles: &[Article]) -> Result<SyncReceipt> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(Error::MissingApiKey)?;

        info!("uploading {} articles to {}", articles.len(), self.base_url);
        let response = self
            .client
            .post(format!("{}/api/sync", self.base_url))
            .header("X-API-Key", api_key)
            .json(&SyncPayload { articles })
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unreadable response body".to_string());
            return Err(Error::Sync {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let receipt: SyncReceipt = response.json().await?;
        info!(
            "sync accepted: {} inserted, {} updated, {} total",
            receipt.inserted, receipt.updated, receipt.total
        );
        Ok(receipt)
    }
}
