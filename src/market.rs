use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::types::{CryptoQuote, Error, MarketSnapshot, Result, StockQuote};

const COINGECKO_PRICE_URL: &str = "https://api.coingecko.com/api/v3/simple/price";
const YAHOO_CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Fetches live crypto and equity quotes and writes the snapshot file.
///
/// The two asset classes are independent: a failure in one degrades to an
/// empty list for that class without blocking the other, and the snapshot
/// file is rewritten on every run regardless, so a file with a fresh
/// `updated_at` and empty lists means "fetch ran but found nothing".
pub struct MarketDataFetcher {
    client: reqwest::Client,
    crypto_ids: Vec<(String, String)>,
    stock_symbols: Vec<String>,
    snapshot_path: PathBuf,
}

impl MarketDataFetcher {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("Mozilla/5.0 (compatible; GlobalLens/1.0)")
            .build()?;

        Ok(Self {
            client,
            crypto_ids: config.crypto_ids.clone(),
            stock_symbols: config.stock_symbols.clone(),
            snapshot_path: config.snapshot_path(),
        })
    }

    /// Fetches both asset classes and overwrites the snapshot file.
    pub async fn run_once(&self) -> Result<MarketSnapshot> {
        let crypto = self.fetch_crypto().await;
        let stocks = self.fetch_stocks().await;
        info!("market snapshot: {} crypto, {} stock quotes", crypto.len(), stocks.len());

        let snapshot = MarketSnapshot {
            updated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            crypto,
            stocks,
        };
        self.write_snapshot(&snapshot)?;
        Ok(snapshot)
    }

    async fn fetch_crypto(&self) -> Vec<CryptoQuote> {
        if self.crypto_ids.is_empty() {
            return Vec::new();
        }
        match self.try_fetch_crypto().await {
            Ok(quotes) => quotes,
            Err(err) => {
                warn!("crypto fetch failed: {}", err);
                Vec::new()
            }
        }
    }

    /// One price-index call for all configured assets.
    async fn try_fetch_crypto(&self) -> Result<Vec<CryptoQuote>> {
        let ids = self
            .crypto_ids
            .iter()
            .map(|(id, _)| id.as_str())
            .collect::<Vec<_>>()
            .join(",");

        let response = self
            .client
            .get(COINGECKO_PRICE_URL)
            .query(&[
                ("ids", ids.as_str()),
                ("vs_currencies", "usd"),
                ("include_24hr_change", "true"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Quote(format!("price index returned HTTP {}", status)));
        }

        let data: Value = response.json().await?;
        Ok(decode_crypto(&data, &self.crypto_ids))
    }

    async fn fetch_stocks(&self) -> Vec<StockQuote> {
        let mut quotes = Vec::new();
        for symbol in &self.stock_symbols {
            match self.try_fetch_stock(symbol).await {
                Ok(quote) => quotes.push(quote),
                Err(err) => warn!("stock fetch failed for {}: {}", symbol, err),
            }
        }
        quotes
    }

    /// One chart call per symbol; two daily closes give the day-over-day move.
    async fn try_fetch_stock(&self, symbol: &str) -> Result<StockQuote> {
        let response = self
            .client
            .get(format!("{}/{}", YAHOO_CHART_URL, symbol))
            .query(&[("range", "2d"), ("interval", "1d")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Quote(format!("quote provider returned HTTP {} for {}", status, symbol)));
        }

        let data: Value = response.json().await?;
        decode_stock(&data, symbol)
            .ok_or_else(|| Error::Quote(format!("no close history for {}", symbol)))
    }

    fn write_snapshot(&self, snapshot: &MarketSnapshot) -> Result<()> {
        if let Some(parent) = self.snapshot_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.snapshot_path, serde_json::to_string_pretty(snapshot)?)?;
        Ok(())
    }
}

/// Decodes the simple-price payload into quote rows, keeping configured
/// order; assets missing from the response are dropped.
fn decode_crypto(data: &Value, ids: &[(String, String)]) -> Vec<CryptoQuote> {
    let mut quotes = Vec::new();
    for (id, ticker) in ids {
        let Some(asset) = data.get(id) else { continue };
        let price = asset.get("usd").and_then(Value::as_f64).unwrap_or(0.0);
        let change = asset
            .get("usd_24h_change")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        quotes.push(CryptoQuote {
            symbol: ticker.clone(),
            price,
            change_24h: round2(change),
        });
    }
    quotes
}

/// Derives price and percent change from the chart close series. A single
/// close (fresh listing, holiday gap) yields a zero change.
fn decode_stock(data: &Value, symbol: &str) -> Option<StockQuote> {
    let closes: Vec<f64> = data["chart"]["result"][0]["indicators"]["quote"][0]["close"]
        .as_array()?
        .iter()
        .filter_map(Value::as_f64)
        .collect();

    let current = *closes.last()?;
    let change_pct = if closes.len() >= 2 {
        let previous = closes[closes.len() - 2];
        if previous == 0.0 {
            0.0
        } else {
            (current - previous) / previous * 100.0
        }
    } else {
        0.0
    };

    Some(StockQuote {
        symbol: symbol.to_string(),
        price: round2(current),
        change_pct: round2(change_pct),
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn crypto_payload_decodes_in_configured_order() {
        let data = json!({
            "ethereum": {"usd": 3250.5, "usd_24h_change": -1.2345},
            "bitcoin": {"usd": 97000.0, "usd_24h_change": 2.789}
        });
        let ids = vec![
            ("bitcoin".to_string(), "BTC".to_string()),
            ("ethereum".to_string(), "ETH".to_string()),
            ("solana".to_string(), "SOL".to_string()),
        ];

        let quotes = decode_crypto(&data, &ids);
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].symbol, "BTC");
        assert_eq!(quotes[0].change_24h, 2.79);
        assert_eq!(quotes[1].symbol, "ETH");
        assert_eq!(quotes[1].change_24h, -1.23);
    }

    #[test]
    fn stock_payload_yields_day_over_day_change() {
        let data = json!({
            "chart": {"result": [{"indicators": {"quote": [{"close": [100.0, 110.0]}]}}]}
        });
        let quote = decode_stock(&data, "NVDA").unwrap();
        assert_eq!(quote.price, 110.0);
        assert_eq!(quote.change_pct, 10.0);
    }

    #[test]
    fn single_close_reports_zero_change() {
        let data = json!({
            "chart": {"result": [{"indicators": {"quote": [{"close": [250.25]}]}}]}
        });
        let quote = decode_stock(&data, "TSLA").unwrap();
        assert_eq!(quote.price, 250.25);
        assert_eq!(quote.change_pct, 0.0);
    }

    #[test]
    fn empty_close_series_is_rejected() {
        let data = json!({
            "chart": {"result": [{"indicators": {"quote": [{"close": []}]}}]}
        });
        assert!(decode_stock(&data, "AAPL").is_none());
    }

    #[tokio::test]
    async fn snapshot_is_written_even_when_both_classes_are_empty() {
        let dir = tempdir().unwrap();
        let mut config = AppConfig::default();
        config.data_dir = dir.path().to_path_buf();
        config.crypto_ids = Vec::new();
        config.stock_symbols = Vec::new();

        let fetcher = MarketDataFetcher::new(&config).unwrap();
        let snapshot = fetcher.run_once().await.unwrap();
        assert!(snapshot.crypto.is_empty());
        assert!(snapshot.stocks.is_empty());

        let raw = fs::read_to_string(config.snapshot_path()).unwrap();
        let reread: MarketSnapshot = serde_json::from_str(&raw).unwrap();
        assert_eq!(reread.updated_at, snapshot.updated_at);
        assert!(reread.crypto.is_empty());
        assert!(reread.stocks.is_empty());
    }
}
