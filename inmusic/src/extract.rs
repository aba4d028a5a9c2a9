use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::fetcher::PageFetcher;
use crate::report::ErrorSink;
use crate::text::normalize;

/// Paragraphs with fewer normalized characters are captions or boilerplate.
pub const MIN_PARAGRAPH_CHARS: usize = 40;
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";
pub const G1_DEFAULT_AUTHOR: &str = "Redação G1";

static GENERIC_PARAGRAPHS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(
        r#"article p, div[class*="content"] p, div[class*="texto"] p, div[class*="body"] p, div[id*="content"] p"#,
    )
    .unwrap()
});
static G1_PARAGRAPHS: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"div[class*="mc-article-body"] p, article p"#).unwrap());
static G1_BYLINE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"span[class*="content-publication-data__from"]"#).unwrap());
static META_AUTHOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[name="author"][content]"#).unwrap());
static META_OG_IMAGE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:image"][content]"#).unwrap());
static ARTICLE_IMAGE: Lazy<Selector> = Lazy::new(|| Selector::parse("article img[src]").unwrap());
static ARTICLE_OR_FEATURED_IMAGE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"article img[src], img[class="featured"][src]"#).unwrap());

/// What an extractor returns for one article page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedArticle {
    pub body: String,
    pub author: String,
    pub image_url: Option<String>,
}

impl ExtractedArticle {
    /// The result used when the page could not be fetched or parsed.
    pub fn degraded(default_author: &str) -> Self {
        Self {
            body: String::new(),
            author: default_author.to_string(),
            image_url: None,
        }
    }
}

/// Fetches an article page and pulls out its text, author and image.
///
/// Implementations degrade to an empty body, their default author and no image
/// when anything goes wrong; a broken article never stops a crawl.
#[async_trait]
pub trait ArticleExtractor: Send + Sync {
    /// Never fails: faults are reported to the sink and a degraded result is returned.
    async fn extract(&self, url: &str) -> ExtractedArticle;
}

/// Keeps paragraphs of at least [`MIN_PARAGRAPH_CHARS`] characters and joins them
/// with a blank line, in document order.
pub fn collect_paragraphs(doc: &Html, selector: &Selector) -> String {
    doc.select(selector)
        .map(|p| normalize(&p.text().collect::<String>()))
        .filter(|t| t.chars().count() >= MIN_PARAGRAPH_CHARS)
        .collect::<Vec<_>>()
        .join(PARAGRAPH_SEPARATOR)
}

fn first_attr(doc: &Html, selector: &Selector, attr: &str) -> Option<String> {
    doc.select(selector)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(str::to_string)
}

fn meta_author(doc: &Html) -> Option<String> {
    first_attr(doc, &META_AUTHOR, "content")
        .map(|a| normalize(&a))
        .filter(|a| !a.is_empty())
}

/// Resolves an image reference against the page it came from. Empty values count as missing.
fn resolve_image(page_url: &str, src: Option<String>) -> Option<String> {
    let src = src?;
    let src = src.trim();
    if src.is_empty() {
        return None;
    }
    match Url::parse(page_url).and_then(|base| base.join(src)) {
        Ok(u) => Some(u.to_string()),
        Err(_) => Some(src.to_string()),
    }
}

/// Generic heuristic: `<article>` or content/body/text containers, meta author, og:image
/// then the first article or featured image.
pub fn extract_generic(doc: &Html, page_url: &str, default_author: &str) -> ExtractedArticle {
    let body = collect_paragraphs(doc, &GENERIC_PARAGRAPHS);
    let author = meta_author(doc).unwrap_or_else(|| default_author.to_string());
    let image_url = resolve_image(page_url, first_attr(doc, &META_OG_IMAGE, "content"))
        .or_else(|| resolve_image(page_url, first_attr(doc, &ARTICLE_OR_FEATURED_IMAGE, "src")));

    ExtractedArticle {
        body,
        author,
        image_url,
    }
}

/// G1 heuristic. Author order is meta tag, then the publication byline, then
/// [`G1_DEFAULT_AUTHOR`]; this order is observable behavior and must stay as is.
pub fn extract_g1(doc: &Html, page_url: &str) -> ExtractedArticle {
    let body = collect_paragraphs(doc, &G1_PARAGRAPHS);

    let author = meta_author(doc)
        .or_else(|| {
            // only the span's own text nodes, not nested markup
            let parts: Vec<String> = doc
                .select(&G1_BYLINE)
                .flat_map(|span| {
                    span.children()
                        .filter_map(|c| c.value().as_text().map(|t| t.to_string()))
                        .collect::<Vec<_>>()
                })
                .collect();
            let byline = normalize(&parts.join(" "));
            (!byline.is_empty()).then_some(byline)
        })
        .unwrap_or_else(|| G1_DEFAULT_AUTHOR.to_string());

    let image_url = resolve_image(page_url, first_attr(doc, &META_OG_IMAGE, "content"))
        .or_else(|| resolve_image(page_url, first_attr(doc, &ARTICLE_IMAGE, "src")));

    ExtractedArticle {
        body,
        author,
        image_url,
    }
}

/// Extractor shared by sources without bespoke markup.
pub struct GenericExtractor {
    fetcher: PageFetcher,
    source_name: String,
    default_author: String,
    sink: Arc<dyn ErrorSink>,
}

impl GenericExtractor {
    pub fn new(
        fetcher: PageFetcher,
        source_name: impl Into<String>,
        default_author: impl Into<String>,
        sink: Arc<dyn ErrorSink>,
    ) -> Self {
        Self {
            fetcher,
            source_name: source_name.into(),
            default_author: default_author.into(),
            sink,
        }
    }
}

#[async_trait]
impl ArticleExtractor for GenericExtractor {
    async fn extract(&self, url: &str) -> ExtractedArticle {
        match self.fetcher.fetch(url).await {
            Ok(doc) => {
                let extracted = extract_generic(&doc, url, &self.default_author);
                debug!(
                    "extract: {} body {} chars from {}",
                    self.source_name,
                    extracted.body.len(),
                    url
                );
                extracted
            }
            Err(e) => {
                self.sink
                    .report(&format!("{}:extract:generic", self.source_name), &e);
                ExtractedArticle::degraded(&self.default_author)
            }
        }
    }
}

/// Extractor for G1 article pages.
pub struct G1Extractor {
    fetcher: PageFetcher,
    source_name: String,
    sink: Arc<dyn ErrorSink>,
}

impl G1Extractor {
    pub fn new(fetcher: PageFetcher, source_name: impl Into<String>, sink: Arc<dyn ErrorSink>) -> Self {
        Self {
            fetcher,
            source_name: source_name.into(),
            sink,
        }
    }
}

#[async_trait]
impl ArticleExtractor for G1Extractor {
    async fn extract(&self, url: &str) -> ExtractedArticle {
        match self.fetcher.fetch(url).await {
            Ok(doc) => extract_g1(&doc, url),
            Err(e) => {
                self.sink
                    .report(&format!("{}:extract:g1", self.source_name), &e);
                ExtractedArticle::degraded(G1_DEFAULT_AUTHOR)
            }
        }
    }
}
