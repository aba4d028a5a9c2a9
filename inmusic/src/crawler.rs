use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use crate::error::{IngestError, Result};
use crate::extract::ArticleExtractor;
use crate::fetcher::PageFetcher;
use crate::models::NormalizedArticle;
use crate::report::ErrorSink;
use crate::text::{join_normalized, truncate_summary};

static G1_CARD: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"div[class*="feed-post-body"]"#).unwrap());
static ARTICLE_CARD: Lazy<Selector> = Lazy::new(|| Selector::parse("article").unwrap());
static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());
static ANCHOR_HREF: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static HEADING: Lazy<Selector> = Lazy::new(|| Selector::parse("h2").unwrap());
static IMAGE_SRC: Lazy<Selector> = Lazy::new(|| Selector::parse("img[src]").unwrap());
static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());

/// How page N of a listing is addressed. Page 1 is always the bare listing URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pagination {
    /// `<listing>?<name>=N`
    QueryParam(String),
    /// `<listing>page/N/`
    PathSegment,
}

impl Pagination {
    pub fn page_url(&self, listing_url: &str, page: u32) -> String {
        if page <= 1 {
            return listing_url.to_string();
        }
        match self {
            Self::QueryParam(name) => {
                let sep = if listing_url.contains('?') { '&' } else { '?' };
                format!("{}{}{}={}", listing_url, sep, name, page)
            }
            Self::PathSegment => {
                let base = listing_url.trim_end_matches('/');
                format!("{}/page/{}/", base, page)
            }
        }
    }
}

/// Which elements of a listing page are cards, and where a card keeps its title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardLayout {
    /// `div.feed-post-body` blocks titled by their link text (G1).
    FeedPost,
    /// `<article>` blocks titled by their `h2`, falling back to link text.
    ArticleHeading,
}

/// One listing entry before extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub title: String,
    pub link: String,
    pub thumbnail: Option<String>,
    /// Inline summary; empty when the card has no paragraph text.
    pub summary: String,
}

fn text_of<'a>(card: &ElementRef<'a>, selector: &Selector) -> Vec<&'a str> {
    card.select(selector).flat_map(|el| el.text()).collect()
}

impl CardLayout {
    fn selector(&self) -> &'static Selector {
        match self {
            Self::FeedPost => &G1_CARD,
            Self::ArticleHeading => &ARTICLE_CARD,
        }
    }

    /// Every card element on the page, parsed. `Ok(None)` is a card without a
    /// title or a link; it is skipped without being an error.
    pub fn cards(&self, doc: &Html, base: &Url) -> Vec<Result<Option<Card>>> {
        doc.select(self.selector())
            .map(|el| self.parse_card(el, base))
            .collect()
    }

    fn parse_card(&self, el: ElementRef<'_>, base: &Url) -> Result<Option<Card>> {
        let title = match self {
            Self::FeedPost => join_normalized(text_of(&el, &ANCHOR)),
            Self::ArticleHeading => {
                let heading = text_of(&el, &HEADING);
                if heading.is_empty() {
                    join_normalized(text_of(&el, &ANCHOR))
                } else {
                    join_normalized(heading)
                }
            }
        };

        let href = el
            .select(&ANCHOR_HREF)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(str::trim)
            .filter(|h| !h.is_empty());

        let (title, href) = match href {
            Some(href) if !title.is_empty() => (title, href),
            _ => return Ok(None),
        };

        let link = base
            .join(href)
            .map_err(|e| IngestError::extraction(format!("card link {:?}", href), e.to_string()))?
            .to_string();

        let thumbnail = el
            .select(&IMAGE_SRC)
            .next()
            .and_then(|img| img.value().attr("src"))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| base.join(s).map(|u| u.to_string()).unwrap_or_else(|_| s.to_string()));

        let summary = join_normalized(text_of(&el, &PARAGRAPH));

        Ok(Some(Card {
            title,
            link,
            thumbnail,
            summary,
        }))
    }
}

/// Static description of one source.
#[derive(Debug, Clone)]
pub struct SourceSpec {
    pub name: String,
    pub listing_url: String,
    pub pagination: Pagination,
    pub layout: CardLayout,
}

/// Walks one source's listing pages and turns each card into a [`NormalizedArticle`].
pub struct SourceCrawler {
    spec: SourceSpec,
    fetcher: PageFetcher,
    extractor: Arc<dyn ArticleExtractor>,
    sink: Arc<dyn ErrorSink>,
}

impl SourceCrawler {
    pub fn new(
        spec: SourceSpec,
        fetcher: PageFetcher,
        extractor: Arc<dyn ArticleExtractor>,
        sink: Arc<dyn ErrorSink>,
    ) -> Self {
        Self {
            spec,
            fetcher,
            extractor,
            sink,
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Crawls up to `max_pages` listing pages, stopping once `max_items` articles
    /// were assembled or a page has no cards.
    ///
    /// A listing page that cannot be fetched ends the crawl with what was
    /// collected so far. A card that cannot be parsed is reported and skipped.
    pub async fn crawl(&self, max_items: usize, max_pages: u32) -> Vec<NormalizedArticle> {
        let name = &self.spec.name;
        info!("crawler: {} starting (max {} items, {} pages)", name, max_items, max_pages);

        let mut results = Vec::new();
        let mut page = 1;

        while results.len() < max_items && page <= max_pages {
            let url = self.spec.pagination.page_url(&self.spec.listing_url, page);
            info!("crawler: {} page {} {}", name, page, url);

            let cards = match self.fetch_cards(&url).await {
                Ok(cards) => cards,
                Err(e) => {
                    self.sink.report(&format!("{}:listing", name), &e);
                    break;
                }
            };

            if cards.is_empty() {
                info!("crawler: {} page {} has no cards, stopping", name, page);
                break;
            }

            for card in cards {
                let card = match card {
                    Ok(Some(card)) => card,
                    Ok(None) => {
                        debug!("crawler: {} skipping card without title or link", name);
                        continue;
                    }
                    Err(e) => {
                        self.sink.report(&format!("{}:card", name), &e);
                        continue;
                    }
                };

                results.push(self.assemble(card).await);
                if results.len() >= max_items {
                    break;
                }
            }

            page += 1;
        }

        info!("crawler: {} collected {} articles", name, results.len());
        results
    }

    async fn fetch_cards(&self, url: &str) -> Result<Vec<Result<Option<Card>>>> {
        let base = Url::parse(url)
            .map_err(|e| IngestError::extraction(format!("listing url {:?}", url), e.to_string()))?;
        let doc = self.fetcher.fetch(url).await?;
        Ok(self.spec.layout.cards(&doc, &base))
    }

    async fn assemble(&self, card: Card) -> NormalizedArticle {
        let extracted = self.extractor.extract(&card.link).await;

        let image_url = extracted.image_url.or(card.thumbnail);
        let summary = if card.summary.is_empty() {
            extracted.body.clone()
        } else {
            card.summary
        };

        NormalizedArticle {
            title: card.title,
            image_url,
            summary: truncate_summary(&summary),
            body: extracted.body,
            source_url: card.link,
            author: Some(extracted.author),
            source_name: self.spec.name.clone(),
        }
    }
}
