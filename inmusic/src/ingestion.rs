use anyhow::{Context, Result};
use common::Config;
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::fetcher::PageFetcher;
use crate::models::{BatchOutcome, NormalizedArticle};
use crate::report::{ErrorSink, MemorySink, TeeSink};
use crate::sources::{catalogue, SourceDefinition};
use crate::storage::IngestionStore;

/// What one ingestion run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// `(source name, articles collected)` in crawl order.
    pub per_source: Vec<(String, usize)>,
    pub collected: usize,
    pub outcome: BatchOutcome,
    /// Faults reported to the sink during the run.
    pub faults: usize,
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, count) in &self.per_source {
            writeln!(f, "{}: {} collected", name, count)?;
        }
        write!(
            f,
            "total: {} collected, {} inserted, {} duplicates, {} rejected, {} faults",
            self.collected,
            self.outcome.inserted,
            self.outcome.duplicates,
            self.outcome.rejected,
            self.faults
        )
    }
}

/// Crawls the given sources one after another and concatenates their articles.
pub async fn collect_all(
    sources: &[SourceDefinition],
    fetcher: &PageFetcher,
    sink: Arc<dyn ErrorSink>,
) -> (Vec<NormalizedArticle>, Vec<(String, usize)>) {
    let mut articles = Vec::new();
    let mut per_source = Vec::with_capacity(sources.len());

    for source in sources {
        let crawler = source.build_crawler(fetcher, sink.clone());
        let batch = crawler.crawl(source.max_items, source.max_pages).await;
        per_source.push((crawler.name().to_string(), batch.len()));
        articles.extend(batch);
    }

    (articles, per_source)
}

/// Runs every enabled source and persists everything collected.
///
/// Only a broken setup (an HTTP client that cannot be built) fails the run; page,
/// card, extraction and record faults go to `sink` and the run continues.
pub async fn run_full_ingestion(
    config: &Config,
    store: &IngestionStore,
    sink: Arc<dyn ErrorSink>,
) -> Result<IngestReport> {
    let fetcher = PageFetcher::from_config(&config.fetch).context("failed to build HTTP client")?;

    let counter = Arc::new(MemorySink::new());
    let counter_sink: Arc<dyn ErrorSink> = counter.clone();
    let tee: Arc<dyn ErrorSink> = Arc::new(TeeSink::new(vec![sink, counter_sink]));

    let sources = catalogue(&config.sources);
    info!("ingestion: starting run over {} sources", sources.len());

    let (articles, per_source) = collect_all(&sources, &fetcher, tee.clone()).await;
    let outcome = store.save_batch(&articles, tee.as_ref()).await;

    let report = IngestReport {
        per_source,
        collected: articles.len(),
        outcome,
        faults: counter.len(),
    };
    info!(
        collected = report.collected,
        inserted = report.outcome.inserted,
        duplicates = report.outcome.duplicates,
        rejected = report.outcome.rejected,
        faults = report.faults,
        "ingestion: run finished"
    );
    Ok(report)
}
