use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A fully assembled article produced by a source crawler, ready for storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedArticle {
    pub title: String,
    pub image_url: Option<String>,
    /// Card summary, or the body when the card had none; already truncated.
    pub summary: String,
    /// Extracted paragraphs joined by a blank line. Empty when extraction failed.
    pub body: String,
    /// Dedup key.
    pub source_url: String,
    pub author: Option<String>,
    pub source_name: String,
}

/// A stored article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub id: i64,
    pub title: String,
    pub image_url: Option<String>,
    pub summary: String,
    pub body: String,
    pub source_url: String,
    pub author: Option<String>,
    pub source_name: String,
    pub category: String,
    pub view_count: i64,
    pub like_count: i64,
    pub liked: bool,
    pub collected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: i64,
    pub article_id: i64,
    pub author: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// A search result with `<mark>` highlighted copies of title and summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub article: ArticleRecord,
    pub title_highlight: String,
    pub summary_highlight: String,
}

/// Ordering applied to search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchOrder {
    /// `collected_at` descending, newest insert first on ties.
    #[default]
    Recent,
    /// `view_count` descending, then `collected_at` descending.
    MostViewed,
}

impl FromStr for SearchOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "recent" | "recentes" => Ok(Self::Recent),
            "views" | "most-viewed" | "mais_lidas" => Ok(Self::MostViewed),
            other => Err(format!("unknown search order '{}', expected 'recent' or 'views'", other)),
        }
    }
}

impl fmt::Display for SearchOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recent => f.write_str("recent"),
            Self::MostViewed => f.write_str("views"),
        }
    }
}

/// Counts produced by one `save_batch` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub inserted: usize,
    /// Records whose `source_url` was already stored.
    pub duplicates: usize,
    /// Records refused or failed individually.
    pub rejected: usize,
}
