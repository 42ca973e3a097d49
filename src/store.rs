use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use tracing::{info, warn};

use crate::types::{Article, Result};

/// Durable on-disk representation of the article collection.
///
/// The collection is a single JSON array, newest-first, pretty-printed so it
/// stays inspectable by hand. The store file is the only state shared
/// between cycles; each cycle loads it fresh and writes it back whole.
#[derive(Debug, Clone)]
pub struct ArticleStore {
    path: PathBuf,
}

impl ArticleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the persisted collection.
    ///
    /// A missing file is a normal first run. An unreadable or malformed file
    /// degrades to an empty collection so ingestion keeps moving; the loss
    /// is logged.
    pub fn load(&self) -> Vec<Article> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                warn!("store file {} unreadable, starting empty: {}", self.path.display(), err);
                return Vec::new();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(articles) => articles,
            Err(err) => {
                warn!("store file {} is not valid JSON, starting empty: {}", self.path.display(), err);
                Vec::new()
            }
        }
    }

    /// Drops articles whose inferred publish date is older than the horizon.
    ///
    /// Returns the kept collection and the number removed. A record whose
    /// date cannot be determined at all is kept.
    pub fn sweep(
        &self,
        articles: Vec<Article>,
        now: DateTime<Utc>,
        horizon_days: i64,
    ) -> (Vec<Article>, usize) {
        let cutoff = now - Duration::days(horizon_days);
        let before = articles.len();

        let kept: Vec<Article> = articles
            .into_iter()
            .filter(|article| match effective_date(article) {
                Some(date) => date >= cutoff,
                None => true,
            })
            .collect();

        let removed = before - kept.len();
        if removed > 0 {
            info!("retention removed {} articles older than {} days", removed, horizon_days);
        }
        (kept, removed)
    }

    /// URLs already present in the collection, for candidate filtering.
    pub fn known_urls(articles: &[Article]) -> HashSet<&str> {
        articles.iter().map(|article| article.original_url.as_str()).collect()
    }

    /// Prepends `new` (already newest-first) before `existing`.
    ///
    /// Uniqueness of `original_url` is guaranteed upstream by the dedup
    /// filter and is not re-checked here.
    pub fn merge(new: Vec<Article>, existing: Vec<Article>) -> Vec<Article> {
        let mut all = new;
        all.extend(existing);
        all
    }

    /// Writes the full collection. An interrupted write can corrupt the
    /// file; `load` recovers from that by starting empty.
    pub fn persist(&self, articles: &[Article]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(articles)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

/// Date formats accepted for `published_at`, tried in order; the first
/// successful parse wins.
pub fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }

    None
}

/// Ingestion timestamp embedded in the id's leading segment.
///
/// Used as the retention fallback when the origin feed supplied no usable
/// date, which makes retention approximate for those sources.
fn id_timestamp(id: &str) -> Option<DateTime<Utc>> {
    let seconds: i64 = id.split('-').next()?.parse().ok()?;
    Utc.timestamp_opt(seconds, 0).single()
}

/// Best-effort publish date: the feed-supplied string first, then the id.
fn effective_date(article: &Article) -> Option<DateTime<Utc>> {
    parse_published(&article.published_at).or_else(|| id_timestamp(&article.id))
}
