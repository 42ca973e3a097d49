use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use crate::market::MarketDataFetcher;
use crate::pipeline::IngestionPipeline;
use crate::publisher::Publisher;
use crate::store::ArticleStore;
use crate::types::Error;

/// Per-step time budgets. A step that overruns is abandoned for this cycle
/// and retried naturally on the next one.
const GENERATION_TIMEOUT: Duration = Duration::from_secs(300);
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(60);
const MARKET_TIMEOUT: Duration = Duration::from_secs(60);

/// Runs the full cycle (ingest, publish, market snapshot) on a fixed
/// cadence, forever.
///
/// Steps execute sequentially in a fixed order; a step that fails or times
/// out is logged and treated as a no-op so the cycle always completes and
/// the loop never exits on its own. Termination is external interruption
/// only, handled at the binary boundary.
pub struct Scheduler {
    pipeline: IngestionPipeline,
    publisher: Publisher,
    market: MarketDataFetcher,
    store: ArticleStore,
    interval: Duration,
}

impl Scheduler {
    pub fn new(
        pipeline: IngestionPipeline,
        publisher: Publisher,
        market: MarketDataFetcher,
        store: ArticleStore,
        interval_secs: u64,
    ) -> Self {
        Self {
            pipeline,
            publisher,
            market,
            store,
            interval: Duration::from_secs(interval_secs),
        }
    }

    pub async fn run(&self) {
        let mut cycle: u64 = 0;
        loop {
            cycle += 1;
            info!("cycle {} started", cycle);
            self.run_steps().await;
            info!("cycle {} complete, next in {}s", cycle, self.interval.as_secs());
            sleep(self.interval).await;
        }
    }

    async fn run_steps(&self) {
        match timeout(GENERATION_TIMEOUT, self.pipeline.run_cycle()).await {
            Ok(Ok(summary)) => info!(
                "generation: {} new, {} skipped, {} removed by retention, {} stored",
                summary.rewritten, summary.skipped, summary.removed_by_retention, summary.total_persisted
            ),
            Ok(Err(err)) => warn!("generation failed: {}", err),
            Err(_) => warn!("generation timed out after {}s", GENERATION_TIMEOUT.as_secs()),
        }

        let articles = self.store.load();
        if articles.is_empty() {
            info!("publish: store is empty, nothing to upload");
        } else {
            match timeout(PUBLISH_TIMEOUT, self.publisher.publish(&articles)).await {
                Ok(Ok(receipt)) => info!(
                    "publish: {} inserted, {} updated, {} total",
                    receipt.inserted, receipt.updated, receipt.total
                ),
                // Not configured is a quiet skip, not an alarm.
                Ok(Err(Error::MissingApiKey)) => info!("publish skipped: sync API key not configured"),
                Ok(Err(err)) => warn!("publish failed: {}", err),
                Err(_) => warn!("publish timed out after {}s", PUBLISH_TIMEOUT.as_secs()),
            }
        }

        match timeout(MARKET_TIMEOUT, self.market.run_once()).await {
            Ok(Ok(snapshot)) => info!(
                "market data: {} crypto, {} stock quotes",
                snapshot.crypto.len(),
                snapshot.stocks.len()
            ),
            Ok(Err(err)) => warn!("market data failed: {}", err),
            Err(_) => warn!("market data timed out after {}s", MARKET_TIMEOUT.as_secs()),
        }
    }
}
