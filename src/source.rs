use std::time::Duration;

use async_trait::async_trait;
use feed_rs::model::Feed;
use feed_rs::parser;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::AppConfig;
use crate::types::{CandidateArticle, Error, Result};

const USER_AGENT: &str = "GlobalLens/1.0 (+market intelligence aggregator)";

/// Anything that can produce candidate articles for an ingestion cycle.
///
/// Failures are absorbed at the smallest scope inside the source (one feed,
/// one entry); a source never aborts a cycle, it just yields fewer
/// candidates.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    async fn fetch_candidates(&self, limit_per_feed: usize) -> Vec<CandidateArticle>;
}

/// Scrapes the configured RSS/Atom feeds and extracts full article text for
/// up to `limit_per_feed` entries per feed.
pub struct NewsSource {
    client: reqwest::Client,
    feeds: Vec<String>,
    min_content_chars: usize,
    paragraph_in_article: Selector,
    paragraph: Selector,
    og_image: Selector,
}

impl NewsSource {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            feeds: config.feeds.clone(),
            min_content_chars: config.min_content_chars,
            paragraph_in_article: parse_selector("article p")?,
            paragraph: parse_selector("p")?,
            og_image: parse_selector(r#"meta[property="og:image"]"#)?,
        })
    }

    async fn fetch_feed(&self, feed_url: &str) -> Result<Feed> {
        let response = self.client.get(feed_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Feed(format!("HTTP {} fetching {}", status, feed_url)));
        }

        let body = response.bytes().await?;
        parser::parse(body.as_ref())
            .map_err(|err| Error::Feed(format!("unparseable feed {}: {}", feed_url, err)))
    }

    /// Downloads one article page and pulls out its body text and lead image.
    async fn extract_entry(&self, entry_url: &str) -> Result<(String, String)> {
        let response = self.client.get(entry_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Extract(format!("HTTP {} fetching {}", status, entry_url)));
        }

        let html = response.text().await?;
        Ok(self.extract_article(&html, entry_url))
    }

    /// Joins paragraph text into a plain-text body and resolves the
    /// `og:image` URL against the page URL. Prefers paragraphs inside an
    /// `<article>` element, falling back to the whole page.
    fn extract_article(&self, html: &str, page_url: &str) -> (String, String) {
        let document = Html::parse_document(html);

        let mut paragraphs = collect_paragraphs(&document, &self.paragraph_in_article);
        if paragraphs.is_empty() {
            paragraphs = collect_paragraphs(&document, &self.paragraph);
        }
        let text = paragraphs.join("\n\n");

        let image_url = document
            .select(&self.og_image)
            .next()
            .and_then(|meta| meta.value().attr("content"))
            .and_then(|content| resolve_url(page_url, content))
            .unwrap_or_default();

        (text, image_url)
    }
}

#[async_trait]
impl CandidateSource for NewsSource {
    async fn fetch_candidates(&self, limit_per_feed: usize) -> Vec<CandidateArticle> {
        let mut candidates = Vec::new();

        for feed_url in &self.feeds {
            debug!("fetching feed {}", feed_url);
            let feed = match self.fetch_feed(feed_url).await {
                Ok(feed) => feed,
                Err(err) => {
                    warn!("skipping feed {}: {}", feed_url, err);
                    continue;
                }
            };

            let source_name = feed
                .title
                .as_ref()
                .map(|title| title.content.clone())
                .unwrap_or_else(|| "Unknown Source".to_string());

            let mut accepted = 0;
            for entry in feed.entries {
                if accepted >= limit_per_feed {
                    break;
                }

                let Some(link) = entry.links.first().map(|link| link.href.clone()) else {
                    continue;
                };
                let title = entry
                    .title
                    .as_ref()
                    .map(|title| title.content.clone())
                    .unwrap_or_else(|| "Untitled".to_string());
                let published_at = entry
                    .published
                    .map(|date| date.to_rfc2822())
                    .unwrap_or_default();

                match self.extract_entry(&link).await {
                    Ok((content, _)) if content.len() < self.min_content_chars => {
                        debug!("skipping stub page ({} chars): {}", content.len(), link);
                    }
                    Ok((content, image_url)) => {
                        candidates.push(CandidateArticle {
                            title,
                            url: link,
                            source: source_name.clone(),
                            published_at,
                            image_url,
                            content,
                        });
                        accepted += 1;
                    }
                    Err(err) => {
                        warn!("extraction failed for {}: {}", link, err);
                    }
                }
            }

            info!("feed {} yielded {} candidates", feed_url, accepted);
        }

        candidates
    }
}

fn parse_selector(raw: &str) -> Result<Selector> {
    Selector::parse(raw).map_err(|err| Error::Extract(format!("invalid selector {}: {}", raw, err)))
}

fn collect_paragraphs(document: &Html, selector: &Selector) -> Vec<String> {
    document
        .select(selector)
        .map(|paragraph| paragraph.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
        .collect()
}

fn resolve_url(base: &str, candidate: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    base.join(candidate).ok().map(|url| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> NewsSource {
        NewsSource::new(&AppConfig::default()).unwrap()
    }

    #[test]
    fn extraction_prefers_article_paragraphs() {
        let html = r#"
            <html><head><meta property="og:image" content="/lead.jpg"></head>
            <body>
                <p>Navigation chrome that should not be picked up.</p>
                <article>
                    <p>First paragraph of the story.</p>
                    <p>Second paragraph of the story.</p>
                </article>
            </body></html>
        "#;

        let (text, image) = source().extract_article(html, "https://news.example.com/world/item");
        assert_eq!(text, "First paragraph of the story.\n\nSecond paragraph of the story.");
        assert_eq!(image, "https://news.example.com/lead.jpg");
    }

    #[test]
    fn extraction_falls_back_to_page_paragraphs() {
        let html = "<html><body><p>Standalone paragraph.</p></body></html>";
        let (text, image) = source().extract_article(html, "https://news.example.com/item");
        assert_eq!(text, "Standalone paragraph.");
        assert!(image.is_empty());
    }

    #[test]
    fn absolute_image_urls_pass_through_resolution() {
        assert_eq!(
            resolve_url("https://a.example.com/x", "https://cdn.example.com/pic.png").as_deref(),
            Some("https://cdn.example.com/pic.png")
        );
    }
}
