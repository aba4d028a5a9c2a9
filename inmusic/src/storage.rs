use chrono::{DateTime, Utc};
use regex::{Captures, Regex};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::classify::classify;
use crate::error::{IngestError, Result};
use crate::models::{
    ArticleRecord, BatchOutcome, CommentRecord, NormalizedArticle, SearchHit, SearchOrder,
};
use crate::report::ErrorSink;

pub const ANONYMOUS_AUTHOR: &str = "Anonymous";
pub const MARK_OPEN: &str = "<mark>";
pub const MARK_CLOSE: &str = "</mark>";

const ARTICLE_COLUMNS: &str = "id, title, image_url, summary, body, source_url, author, \
     source_name, category, view_count, like_count, liked, collected_at";

const ORDER_RECENT: &str = "ORDER BY collected_at DESC, id DESC";
const ORDER_MOST_VIEWED: &str = "ORDER BY view_count DESC, collected_at DESC, id ASC";

/// Result of inserting a single article.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// `source_url` already stored; the existing row is left untouched.
    Duplicate,
}

/// Persists crawled articles and serves the read paths used by the front end.
///
/// All writes go through one lock so that batch inserts, view increments and like
/// toggles never interleave.
pub struct IngestionStore {
    pool: SqlitePool,
    write_lock: Mutex<()>,
}

fn to_micros(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_micros()
}

fn from_micros(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap_or_default()
}

fn article_from_row(row: &SqliteRow) -> ArticleRecord {
    ArticleRecord {
        id: row.get("id"),
        title: row.get("title"),
        image_url: row.get("image_url"),
        summary: row.get("summary"),
        body: row.get("body"),
        source_url: row.get("source_url"),
        author: row.get("author"),
        source_name: row.get("source_name"),
        category: row.get("category"),
        view_count: row.get("view_count"),
        like_count: row.get("like_count"),
        liked: row.get("liked"),
        collected_at: from_micros(row.get("collected_at")),
    }
}

fn comment_from_row(row: &SqliteRow) -> CommentRecord {
    CommentRecord {
        id: row.get("id"),
        article_id: row.get("article_id"),
        author: row.get("author"),
        text: row.get("text"),
        created_at: from_micros(row.get("created_at")),
    }
}

/// Case-insensitive (Unicode) literal matcher for a search term; `None` for an empty term.
fn term_matcher(term: &str) -> Option<Regex> {
    if term.is_empty() {
        return None;
    }
    Regex::new(&format!("(?i){}", regex::escape(term))).ok()
}

fn mark(re: &Regex, text: &str) -> String {
    re.replace_all(text, |caps: &Captures| {
        format!("{}{}{}", MARK_OPEN, &caps[0], MARK_CLOSE)
    })
    .into_owned()
}

/// Wraps every case-insensitive occurrence of `term` in `<mark>` tags, keeping the
/// original casing of the matched text.
pub fn highlight(text: &str, term: &str) -> String {
    match term_matcher(term) {
        Some(re) => mark(&re, text),
        None => text.to_string(),
    }
}

impl IngestionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Mutex::new(()),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Classifies and inserts every article, keyed on `source_url`.
    ///
    /// Known URLs are skipped silently. A record that is invalid or fails to
    /// insert is reported to `sink` and the batch continues.
    pub async fn save_batch(&self, articles: &[NormalizedArticle], sink: &dyn ErrorSink) -> BatchOutcome {
        let _guard = self.write_lock.lock().await;
        let now = Utc::now();
        let mut outcome = BatchOutcome::default();

        for article in articles {
            match self.insert_article(article, now).await {
                Ok(InsertOutcome::Inserted) => outcome.inserted += 1,
                Ok(InsertOutcome::Duplicate) => {
                    debug!("store: {} already stored", article.source_url);
                    outcome.duplicates += 1;
                }
                Err(e) => {
                    sink.report("store:save_batch", &e);
                    outcome.rejected += 1;
                }
            }
        }

        info!(
            "store: batch of {} -> {} inserted, {} duplicates, {} rejected",
            articles.len(),
            outcome.inserted,
            outcome.duplicates,
            outcome.rejected
        );
        outcome
    }

    async fn insert_article(&self, article: &NormalizedArticle, now: DateTime<Utc>) -> Result<InsertOutcome> {
        if article.title.trim().is_empty() {
            return Err(IngestError::InvalidRecord {
                source_url: article.source_url.clone(),
                reason: "empty title".to_string(),
            });
        }
        if article.source_url.trim().is_empty() {
            return Err(IngestError::InvalidRecord {
                source_url: article.source_url.clone(),
                reason: "empty source url".to_string(),
            });
        }

        let category = classify(&article.title, &article.summary);

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO articles
            (title, image_url, summary, body, source_url, author, source_name,
             category, view_count, like_count, liked, collected_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, 0, 0, ?)
            "#,
        )
        .bind(&article.title)
        .bind(&article.image_url)
        .bind(&article.summary)
        .bind(&article.body)
        .bind(&article.source_url)
        .bind(&article.author)
        .bind(&article.source_name)
        .bind(category.as_str())
        .bind(to_micros(now))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Ok(InsertOutcome::Duplicate)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    async fn fetch_articles(&self, sql: &str, binds: &[i64]) -> Result<Vec<ArticleRecord>> {
        let mut query = sqlx::query(sql);
        for value in binds {
            query = query.bind(*value);
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(article_from_row).collect())
    }

    /// Newest first; ties go to the most recent insert.
    pub async fn list_recent(&self, limit: i64, offset: i64) -> Result<Vec<ArticleRecord>> {
        let sql = format!(
            "SELECT {} FROM articles {} LIMIT ? OFFSET ?",
            ARTICLE_COLUMNS, ORDER_RECENT
        );
        self.fetch_articles(&sql, &[limit, offset]).await
    }

    pub async fn list_liked(&self, limit: i64) -> Result<Vec<ArticleRecord>> {
        let sql = format!(
            "SELECT {} FROM articles WHERE liked = 1 {} LIMIT ?",
            ARTICLE_COLUMNS, ORDER_RECENT
        );
        self.fetch_articles(&sql, &[limit]).await
    }

    /// Highest view count first, then newest; articles collected together keep insert order.
    pub async fn most_viewed(&self, limit: i64) -> Result<Vec<ArticleRecord>> {
        let sql = format!(
            "SELECT {} FROM articles {} LIMIT ?",
            ARTICLE_COLUMNS, ORDER_MOST_VIEWED
        );
        self.fetch_articles(&sql, &[limit]).await
    }

    /// Substring search over title, summary and body.
    ///
    /// SQLite's `LIKE` only folds ASCII case, so rows come back in the requested
    /// order and the term is matched here with the same matcher the highlighter uses.
    pub async fn search(&self, term: &str, limit: i64, order: SearchOrder) -> Result<Vec<SearchHit>> {
        let order_clause = match order {
            SearchOrder::Recent => ORDER_RECENT,
            SearchOrder::MostViewed => ORDER_MOST_VIEWED,
        };
        let matcher = term_matcher(term);
        if matcher.is_none() && !term.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!("SELECT {} FROM articles {}", ARTICLE_COLUMNS, order_clause);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        // negative limit means no limit, as in SQLite
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);

        let hits = rows
            .iter()
            .map(article_from_row)
            .filter(|a| match &matcher {
                Some(re) => re.is_match(&a.title) || re.is_match(&a.summary) || re.is_match(&a.body),
                None => true,
            })
            .take(limit)
            .map(|article| match &matcher {
                Some(re) => SearchHit {
                    title_highlight: mark(re, &article.title),
                    summary_highlight: mark(re, &article.summary),
                    article,
                },
                None => SearchHit {
                    title_highlight: article.title.clone(),
                    summary_highlight: article.summary.clone(),
                    article,
                },
            })
            .collect();
        Ok(hits)
    }

    pub async fn get(&self, id: i64) -> Result<Option<ArticleRecord>> {
        let sql = format!("SELECT {} FROM articles WHERE id = ?", ARTICLE_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(article_from_row))
    }

    pub async fn count(&self) -> Result<i64> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    /// Adds one view. Returns false when the id is unknown.
    pub async fn increment_view(&self, id: i64) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let result = sqlx::query("UPDATE articles SET view_count = view_count + 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Flips `liked` and moves `like_count` by one, never below zero.
    /// Returns false when the id is unknown.
    pub async fn toggle_like(&self, id: i64) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        // right-hand sides see the pre-update row
        let result = sqlx::query(
            r#"
            UPDATE articles SET
                like_count = CASE WHEN liked THEN MAX(like_count - 1, 0) ELSE like_count + 1 END,
                liked = NOT liked
            WHERE id = ?
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Stores a comment. Blank text is refused (`None`); a blank author becomes
    /// [`ANONYMOUS_AUTHOR`].
    pub async fn add_comment(&self, article_id: i64, author: &str, text: &str) -> Result<Option<i64>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let author = match author.trim() {
            "" => ANONYMOUS_AUTHOR,
            a => a,
        };

        let _guard = self.write_lock.lock().await;
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO comments (article_id, author, text, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(article_id)
        .bind(author)
        .bind(text)
        .bind(to_micros(Utc::now()))
        .fetch_one(&self.pool)
        .await?;
        Ok(Some(id))
    }

    /// Comments of one article, oldest first.
    pub async fn list_comments(&self, article_id: i64) -> Result<Vec<CommentRecord>> {
        let rows = sqlx::query(
            "SELECT id, article_id, author, text, created_at FROM comments WHERE article_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(article_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(comment_from_row).collect())
    }
}
