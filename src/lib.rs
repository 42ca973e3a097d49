pub mod config;
pub mod market;
pub mod pipeline;
pub mod publisher;
pub mod rewrite;
pub mod scheduler;
pub mod source;
pub mod store;
pub mod types;

pub use config::AppConfig;
pub use market::MarketDataFetcher;
pub use pipeline::IngestionPipeline;
pub use publisher::Publisher;
pub use rewrite::{OllamaRewriter, Rewriter};
pub use scheduler::Scheduler;
pub use source::{CandidateSource, NewsSource};
pub use store::ArticleStore;
pub use types::*;
