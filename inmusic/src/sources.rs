use common::{SourceConfig, SourcesConfig};
use std::sync::Arc;

use crate::crawler::{CardLayout, Pagination, SourceCrawler, SourceSpec};
use crate::extract::{ArticleExtractor, G1Extractor, GenericExtractor};
use crate::fetcher::PageFetcher;
use crate::report::ErrorSink;

pub const G1_NAME: &str = "G1 Música";
pub const G1_URL: &str = "https://g1.globo.com/pop-arte/musica/";
pub const POPLINE_NAME: &str = "Portal POPline";
pub const POPLINE_URL: &str = "https://portalpopline.com.br/categoria/musica/";
pub const TRACKLIST_NAME: &str = "Tracklist";
pub const TRACKLIST_URL: &str = "https://tracklist.com.br/categoria/noticias/";

/// Which article extractor a source uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractorKind {
    G1,
    Generic { default_author: String },
}

/// A source with its budgets, ready to be turned into a crawler.
#[derive(Debug, Clone)]
pub struct SourceDefinition {
    pub spec: SourceSpec,
    pub extractor: ExtractorKind,
    pub max_items: usize,
    pub max_pages: u32,
}

impl SourceDefinition {
    pub fn build_crawler(&self, fetcher: &PageFetcher, sink: Arc<dyn ErrorSink>) -> SourceCrawler {
        let extractor: Arc<dyn ArticleExtractor> = match &self.extractor {
            ExtractorKind::G1 => Arc::new(G1Extractor::new(
                fetcher.clone(),
                self.spec.name.clone(),
                sink.clone(),
            )),
            ExtractorKind::Generic { default_author } => Arc::new(GenericExtractor::new(
                fetcher.clone(),
                self.spec.name.clone(),
                default_author.clone(),
                sink.clone(),
            )),
        };
        SourceCrawler::new(self.spec.clone(), fetcher.clone(), extractor, sink)
    }

    fn new(name: &str, url: &str, pagination: Pagination, layout: CardLayout, extractor: ExtractorKind) -> Self {
        SourceDefinition {
            spec: SourceSpec {
                name: name.to_string(),
                listing_url: url.to_string(),
                pagination,
                layout,
            },
            extractor,
            max_items: 120,
            max_pages: 5,
        }
    }

    fn max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Applies the `[sources.*]` config values that are set.
    fn with_overrides(mut self, overrides: &SourceConfig) -> Self {
        if let Some(url) = &overrides.url {
            self.spec.listing_url = url.clone();
        }
        self.max_items = overrides.max_items.unwrap_or(self.max_items);
        self.max_pages = overrides.max_pages.unwrap_or(self.max_pages);
        self
    }
}

fn generic(name: &str) -> ExtractorKind {
    ExtractorKind::Generic {
        default_author: name.to_string(),
    }
}

/// Enabled sources in crawl order, with config overrides applied.
pub fn catalogue(config: &SourcesConfig) -> Vec<SourceDefinition> {
    let mut sources = Vec::new();

    if config.g1.is_enabled() {
        let g1 = SourceDefinition::new(
            G1_NAME,
            G1_URL,
            Pagination::QueryParam("page".to_string()),
            CardLayout::FeedPost,
            ExtractorKind::G1,
        )
        .max_pages(8);
        sources.push(g1.with_overrides(&config.g1));
    }
    if config.popline.is_enabled() {
        let popline = SourceDefinition::new(
            POPLINE_NAME,
            POPLINE_URL,
            Pagination::PathSegment,
            CardLayout::ArticleHeading,
            generic(POPLINE_NAME),
        );
        sources.push(popline.with_overrides(&config.popline));
    }
    if config.tracklist.is_enabled() {
        let tracklist = SourceDefinition::new(
            TRACKLIST_NAME,
            TRACKLIST_URL,
            Pagination::PathSegment,
            CardLayout::ArticleHeading,
            generic(TRACKLIST_NAME),
        );
        sources.push(tracklist.with_overrides(&config.tracklist));
    }

    sources
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalogue_budgets() {
        let sources = catalogue(&SourcesConfig::default());
        let summary: Vec<_> = sources
            .iter()
            .map(|s| (s.spec.name.as_str(), s.max_items, s.max_pages))
            .collect();
        assert_eq!(
            summary,
            vec![(G1_NAME, 120, 8), (POPLINE_NAME, 120, 5), (TRACKLIST_NAME, 120, 5)]
        );
        assert_eq!(sources[0].extractor, ExtractorKind::G1);
        assert_eq!(sources[0].spec.layout, CardLayout::FeedPost);
        assert_eq!(sources[1].spec.pagination, Pagination::PathSegment);
    }

    #[test]
    fn overrides_and_disabled_sources() {
        let config = SourcesConfig {
            g1: SourceConfig {
                enabled: Some(false),
                ..Default::default()
            },
            popline: SourceConfig::default(),
            tracklist: SourceConfig {
                url: Some("http://localhost:9999/noticias/".into()),
                max_items: Some(3),
                max_pages: Some(1),
                enabled: None,
            },
        };
        let sources = catalogue(&config);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[1].spec.listing_url, "http://localhost:9999/noticias/");
        assert_eq!(sources[1].max_items, 3);
        assert_eq!(sources[1].max_pages, 1);
        assert_eq!(
            sources[1].extractor,
            ExtractorKind::Generic {
                default_author: TRACKLIST_NAME.to_string()
            }
        );
        // unset fields keep the built-in values
        assert_eq!(sources[0].spec.listing_url, POPLINE_URL);
        assert_eq!((sources[0].max_items, sources[0].max_pages), (120, 5));
    }
}
