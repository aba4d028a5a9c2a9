use thiserror::Error;

/// Faults raised inside the ingestion core.
///
/// Apart from [`IngestError::Client`], none of these abort a run: the crawler and
/// the store catch them, hand them to the [`ErrorSink`](crate::report::ErrorSink)
/// and carry on.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Network failure or timeout while fetching a page.
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The HTTP client could not be set up (bad user agent, TLS backend).
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The server answered with a non-2xx status.
    #[error("failed to fetch {url}: HTTP {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    /// The document or card did not have the expected shape.
    #[error("unexpected document shape ({context}): {reason}")]
    Extraction { context: String, reason: String },

    /// A record was refused before reaching the database.
    #[error("invalid record {source_url:?}: {reason}")]
    InvalidRecord { source_url: String, reason: String },

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl IngestError {
    pub fn extraction(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Extraction {
            context: context.into(),
            reason: reason.into(),
        }
    }

    /// True for the fetch family (network, timeout, non-2xx).
    pub fn is_fetch(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::HttpStatus { .. })
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
