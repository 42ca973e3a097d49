use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use globallens::{
    AppConfig, ArticleStore, IngestionPipeline, MarketDataFetcher, NewsSource, OllamaRewriter,
    Publisher, Scheduler,
};

#[derive(Parser)]
#[command(name = "globallens", version, about = "Market intelligence news pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one ingestion cycle (scrape, rewrite, persist)
    Ingest,
    /// Upload the current article collection to the remote store
    Publish,
    /// Fetch live market quotes and write the snapshot file
    Market,
    /// Run all steps forever on a fixed interval
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = AppConfig::from_env();

    match cli.command {
        Command::Ingest => {
            let pipeline = build_pipeline(&config)?;
            let summary = pipeline.run_cycle().await?;
            info!(
                "ingestion done: {} new articles, {} skipped, {} total",
                summary.rewritten, summary.skipped, summary.total_persisted
            );
        }
        Command::Publish => {
            let store = ArticleStore::new(config.store_path());
            let articles = store.load();
            if articles.is_empty() {
                anyhow::bail!(
                    "no articles to publish in {}; run an ingestion cycle first",
                    store.path().display()
                );
            }
            let publisher = Publisher::new(&config)?;
            let receipt = publisher.publish(&articles).await?;
            info!(
                "published: {} inserted, {} updated, {} total",
                receipt.inserted, receipt.updated, receipt.total
            );
        }
        Command::Market => {
            let market = MarketDataFetcher::new(&config)?;
            let snapshot = market.run_once().await?;
            info!(
                "snapshot written: {} crypto, {} stock quotes",
                snapshot.crypto.len(),
                snapshot.stocks.len()
            );
        }
        Command::Run => {
            let scheduler = Scheduler::new(
                build_pipeline(&config)?,
                Publisher::new(&config)?,
                MarketDataFetcher::new(&config)?,
                ArticleStore::new(config.store_path()),
                config.interval_secs,
            );
            info!("scheduler starting, interval {}s", config.interval_secs);
            tokio::select! {
                _ = scheduler.run() => {}
                _ = tokio::signal::ctrl_c() => info!("interrupted, shutting down"),
            }
        }
    }

    Ok(())
}

fn build_pipeline(config: &AppConfig) -> Result<IngestionPipeline> {
    let store = ArticleStore::new(config.store_path());
    let source = NewsSource::new(config)?;
    let rewriter = OllamaRewriter::new(config)?;
    Ok(IngestionPipeline::new(
        store,
        Box::new(source),
        Box::new(rewriter),
        config,
    ))
}
