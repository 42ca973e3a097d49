use chrono::Utc;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::rewrite::Rewriter;
use crate::source::CandidateSource;
use crate::store::ArticleStore;
use crate::types::{Article, CandidateArticle, Category, CycleSummary, Result, RewrittenArticle};

/// Drives one ingestion cycle: load, sweep, fetch, dedup, rewrite, persist.
///
/// The pipeline owns the collection invariants: `original_url` uniqueness is
/// enforced here by filtering candidates against the store before any
/// rewrite call, and new articles are prepended so the collection stays
/// newest-first.
pub struct IngestionPipeline {
    store: ArticleStore,
    source: Box<dyn CandidateSource>,
    rewriter: Box<dyn Rewriter>,
    limit_per_feed: usize,
    retention_days: i64,
}

impl IngestionPipeline {
    pub fn new(
        store: ArticleStore,
        source: Box<dyn CandidateSource>,
        rewriter: Box<dyn Rewriter>,
        config: &AppConfig,
    ) -> Self {
        Self {
            store,
            source,
            rewriter,
            limit_per_feed: config.limit_per_feed,
            retention_days: config.retention_days,
        }
    }

    /// Runs one full cycle and reports its counters.
    ///
    /// The store is persisted exactly once per cycle, even when nothing new
    /// arrived, so retention sweeps stay durable. A failed rewrite skips
    /// that candidate only; it was never persisted, so the same URL comes
    /// back as a candidate on the next cycle.
    pub async fn run_cycle(&self) -> Result<CycleSummary> {
        let now = Utc::now();
        let (existing, removed) = self.store.sweep(self.store.load(), now, self.retention_days);

        let candidates = self.source.fetch_candidates(self.limit_per_feed).await;
        let scraped = candidates.len();

        let fresh: Vec<CandidateArticle> = {
            let known = ArticleStore::known_urls(&existing);
            candidates
                .into_iter()
                .filter(|candidate| !known.contains(candidate.url.as_str()))
                .collect()
        };
        info!("cycle: {} candidates scraped, {} new after dedup", scraped, fresh.len());

        if fresh.is_empty() {
            self.store.persist(&existing)?;
            return Ok(CycleSummary {
                scraped,
                removed_by_retention: removed,
                total_persisted: existing.len(),
                ..Default::default()
            });
        }

        let cycle_ts = now.timestamp();
        let new_candidates = fresh.len();
        let mut rewritten_articles = Vec::new();
        let mut skipped = 0;

        for (seq, candidate) in fresh.iter().enumerate() {
            info!("analyzing ({}/{}): {}", seq + 1, new_candidates, candidate.title);
            match self
                .rewriter
                .rewrite(&candidate.title, &candidate.content, &candidate.source)
                .await
            {
                Ok(rewrite) => {
                    rewritten_articles.push(assemble_article(cycle_ts, seq, candidate, rewrite));
                }
                Err(err) => {
                    warn!("rewrite failed for {} ({}): {}", candidate.title, candidate.url, err);
                    skipped += 1;
                }
            }
        }

        let rewritten = rewritten_articles.len();
        let all = ArticleStore::merge(rewritten_articles, existing);
        self.store.persist(&all)?;
        info!("cycle complete: {} added, {} skipped, {} total", rewritten, skipped, all.len());

        Ok(CycleSummary {
            scraped,
            new_candidates,
            rewritten,
            skipped,
            removed_by_retention: removed,
            total_persisted: all.len(),
        })
    }
}

/// Combines a candidate with its rewrite into a persisted article.
///
/// The id encodes the cycle's ingestion timestamp plus the candidate's
/// position, which doubles as the retention fallback for undated sources.
fn assemble_article(
    cycle_ts: i64,
    seq: usize,
    candidate: &CandidateArticle,
    rewrite: RewrittenArticle,
) -> Article {
    let category = rewrite
        .category
        .as_deref()
        .and_then(Category::from_label)
        .unwrap_or(Category::Macro);

    Article {
        id: format!("{}-{}", cycle_ts, seq),
        title: non_empty(rewrite.title).unwrap_or_else(|| candidate.title.clone()),
        summary: non_empty(rewrite.summary).unwrap_or_default(),
        content: non_empty(rewrite.content).unwrap_or_else(|| candidate.content.clone()),
        original_url: candidate.url.clone(),
        image_url: candidate.image_url.clone(),
        source: candidate.source.clone(),
        published_at: candidate.published_at.clone(),
        category,
    }
}

fn non_empty(field: Option<String>) -> Option<String> {
    field.filter(|value| !value.trim().is_empty())
}
