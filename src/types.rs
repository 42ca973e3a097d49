use serde::{Deserialize, Serialize};

/// A processed market-analysis article as persisted in the store file.
///
/// Records are append-only: once created they are never mutated, only
/// dropped by the retention sweep. `original_url` is the dedup key and is
/// unique across the live collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub content: String,
    pub original_url: String,
    pub image_url: String,
    pub source: String,
    /// Raw date string as the origin feed supplied it; may be empty.
    pub published_at: String,
    pub category: Category,
}

/// Market category assigned during the rewrite step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    Stocks,
    Crypto,
    Forex,
    Commodities,
    Geopolitics,
    Macro,
}

impl Category {
    /// Maps a model-supplied label onto the category taxonomy.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "STOCKS" => Some(Self::Stocks),
            "CRYPTO" => Some(Self::Crypto),
            "FOREX" => Some(Self::Forex),
            "COMMODITIES" => Some(Self::Commodities),
            "GEOPOLITICS" => Some(Self::Geopolitics),
            "MACRO" => Some(Self::Macro),
            _ => None,
        }
    }
}

/// A scraped feed entry that has not yet been rewritten or persisted.
#[derive(Debug, Clone)]
pub struct CandidateArticle {
    pub title: String,
    pub url: String,
    pub source: String,
    pub published_at: String,
    pub image_url: String,
    pub content: String,
}

/// Structured output of one rewrite call.
///
/// Every field is optional at the serde layer; the pipeline falls back to
/// the candidate's own title/content and the MACRO category when a field is
/// missing from the model's reply.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RewrittenArticle {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// One crypto quote row in the market snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoQuote {
    pub symbol: String,
    pub price: f64,
    pub change_24h: f64,
}

/// One equity quote row in the market snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockQuote {
    pub symbol: String,
    pub price: f64,
    pub change_pct: f64,
}

/// Live-quote snapshot, fully overwritten on every run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub updated_at: String,
    pub crypto: Vec<CryptoQuote>,
    pub stocks: Vec<StockQuote>,
}

/// Counters reported by one ingestion cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleSummary {
    /// Candidates scraped from all feeds this cycle.
    pub scraped: usize,
    /// Candidates left after filtering already-known URLs.
    pub new_candidates: usize,
    /// Candidates successfully rewritten and persisted.
    pub rewritten: usize,
    /// Candidates dropped because their rewrite failed.
    pub skipped: usize,
    /// Articles removed by the retention sweep.
    pub removed_by_retention: usize,
    /// Collection size after the final persist.
    pub total_persisted: usize,
}

/// Counts returned by the remote store after a bulk upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReceipt {
    pub inserted: u64,
    pub updated: u64,
    pub total: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed error: {0}")]
    Feed(String),

    #[error("Extraction error: {0}")]
    Extract(String),

    #[error("Rewrite error: {0}")]
    Rewrite(String),

    #[error("Quote error: {0}")]
    Quote(String),

    #[error("Sync API key not configured")]
    MissingApiKey,

    #[error("Sync rejected with HTTP {status}: {body}")]
    Sync { status: u16, body: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_labels_are_case_and_whitespace_tolerant() {
        assert_eq!(Category::from_label("CRYPTO"), Some(Category::Crypto));
        assert_eq!(Category::from_label(" stocks "), Some(Category::Stocks));
        assert_eq!(Category::from_label("Geopolitics"), Some(Category::Geopolitics));
        assert_eq!(Category::from_label("SPORTS"), None);
        assert_eq!(Category::from_label(""), None);
    }

    #[test]
    fn category_serializes_as_uppercase_strings() {
        let json = serde_json::to_string(&Category::Commodities).unwrap();
        assert_eq!(json, "\"COMMODITIES\"");
        let back: Category = serde_json::from_str("\"FOREX\"").unwrap();
        assert_eq!(back, Category::Forex);
    }

    #[test]
    fn rewrite_payload_tolerates_missing_fields() {
        let partial: RewrittenArticle = serde_json::from_str(r#"{"title": "Judul"}"#).unwrap();
        assert_eq!(partial.title.as_deref(), Some("Judul"));
        assert!(partial.summary.is_none());
        assert!(partial.category.is_none());
    }
}
