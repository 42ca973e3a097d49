use std::env;
use std::path::PathBuf;

/// Runtime configuration handed to each component at construction.
///
/// Defaults cover the production feed and symbol sets; individual knobs can
/// be overridden through the environment (a `.env` file is honored when the
/// binary loads it). Tests construct small configs directly.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Ordered RSS/Atom feed URLs to scrape each cycle.
    pub feeds: Vec<String>,
    /// Entries accepted per feed per cycle.
    pub limit_per_feed: usize,
    /// Minimum extracted body length; shorter pages are treated as stubs.
    pub min_content_chars: usize,
    /// Retention horizon in days for the article store.
    pub retention_days: i64,
    /// Directory holding the store and snapshot files.
    pub data_dir: PathBuf,
    /// Base URL of the local model runtime.
    pub ollama_url: String,
    /// Model identifier used for rewrites.
    pub model: String,
    /// Base URL of the remote store receiving bulk upserts.
    pub sync_url: String,
    /// Shared secret for the sync endpoint; `None` disables publishing.
    pub sync_api_key: Option<String>,
    /// Crypto assets as (provider id, display ticker) pairs.
    pub crypto_ids: Vec<(String, String)>,
    /// Equity ticker symbols.
    pub stock_symbols: Vec<String>,
    /// Seconds to sleep between scheduler cycles.
    pub interval_secs: u64,
    /// Per-request timeout for feed and article fetches.
    pub http_timeout_secs: u64,
    /// Per-request timeout for rewrite calls, which run much longer.
    pub rewrite_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            feeds: default_feeds(),
            limit_per_feed: 2,
            min_content_chars: 200,
            retention_days: 30,
            data_dir: PathBuf::from("data"),
            ollama_url: "http://localhost:11434".to_string(),
            model: "llama3.1".to_string(),
            sync_url: "http://localhost:3000".to_string(),
            sync_api_key: None,
            crypto_ids: vec![
                ("bitcoin".to_string(), "BTC".to_string()),
                ("ethereum".to_string(), "ETH".to_string()),
                ("solana".to_string(), "SOL".to_string()),
            ],
            stock_symbols: vec![
                "NVDA".to_string(),
                "TSLA".to_string(),
                "AAPL".to_string(),
                "MSFT".to_string(),
            ],
            interval_secs: 30,
            http_timeout_secs: 30,
            rewrite_timeout_secs: 120,
        }
    }
}

impl AppConfig {
    /// Builds the configuration from defaults plus environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = env::var("DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(url) = env::var("OLLAMA_URL") {
            config.ollama_url = url;
        }
        if let Ok(model) = env::var("REWRITE_MODEL") {
            config.model = model;
        }
        if let Ok(url) = env::var("SYNC_URL") {
            config.sync_url = url;
        }
        config.sync_api_key = env::var("SYNC_API_KEY").ok().filter(|key| !key.is_empty());

        if let Some(days) = parse_env("RETENTION_DAYS") {
            config.retention_days = days;
        }
        if let Some(secs) = parse_env("SCHEDULE_INTERVAL_SECS") {
            config.interval_secs = secs;
        }
        if let Some(limit) = parse_env("LIMIT_PER_FEED") {
            config.limit_per_feed = limit;
        }
        if let Some(secs) = parse_env("HTTP_TIMEOUT_SECS") {
            config.http_timeout_secs = secs;
        }

        config
    }

    /// Path of the persisted article collection.
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("news.json")
    }

    /// Path of the market snapshot file.
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join("market_movers.json")
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|value| value.parse().ok())
}

fn default_feeds() -> Vec<String> {
    [
        // Finance & markets
        "https://feeds.bloomberg.com/markets/news.rss",
        "https://feeds.content.dowjones.io/public/rss/mw_topstories",
        "https://www.cnbc.com/id/100003114/device/rss/rss.html",
        "https://feeds.finance.yahoo.com/rss/2.0/headline",
        // Crypto
        "https://www.coindesk.com/arc/outboundfeeds/rss/",
        "https://cointelegraph.com/rss",
        // World news
        "https://feeds.bbci.co.uk/news/world/rss.xml",
        "https://feeds.reuters.com/reuters/worldNews",
        "https://www.theguardian.com/world/rss",
        "https://rss.nytimes.com/services/xml/rss/nyt/World.xml",
        // Business & tech
        "https://feeds.bloomberg.com/technology/news.rss",
        "https://www.ft.com/?format=rss",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_the_production_feed_set() {
        let config = AppConfig::default();
        assert_eq!(config.feeds.len(), 12);
        assert_eq!(config.limit_per_feed, 2);
        assert_eq!(config.retention_days, 30);
        assert!(config.sync_api_key.is_none());
    }

    #[test]
    fn data_paths_live_under_the_data_dir() {
        let mut config = AppConfig::default();
        config.data_dir = PathBuf::from("/tmp/scratch");
        assert_eq!(config.store_path(), PathBuf::from("/tmp/scratch/news.json"));
        assert_eq!(
            config.snapshot_path(),
            PathBuf::from("/tmp/scratch/market_movers.json")
        );
    }
}
