/*
inmusic - single-binary main.rs
Runs a full ingestion on demand and exposes the article store on the command line.
*/

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::{init_db_pool, run_migrations, Config};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use inmusic::ingestion::run_full_ingestion;
use inmusic::models::{ArticleRecord, SearchOrder};
use inmusic::report::{ErrorSink, LogFileSink, DEFAULT_TAIL_CHARS};
use inmusic::storage::IngestionStore;

#[derive(Parser, Debug)]
#[command(name = "inmusic", about = "InMusic news ingestion pipeline")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl every enabled source and store new articles
    Ingest {
        /// Delete the database file before ingesting
        #[arg(long)]
        reset: bool,
    },
    /// Most recently collected articles
    Recent {
        #[arg(long, default_value_t = 20)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
    /// Liked articles, newest first
    Liked {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Most viewed articles
    Top {
        #[arg(long, default_value_t = 5)]
        limit: i64,
    },
    /// Substring search over title, summary and body
    Search {
        term: String,
        #[arg(long, default_value_t = 20)]
        limit: i64,
        /// recent | views
        #[arg(long, default_value_t = SearchOrder::Recent)]
        order: SearchOrder,
    },
    /// One article with its comments
    Show { id: i64 },
    /// Toggle the like flag of an article
    Like { id: i64 },
    /// Add a comment to an article
    Comment {
        id: i64,
        text: String,
        #[arg(long, default_value = "")]
        author: String,
    },
    /// Number of stored articles
    Count,
    /// Tail of the error log
    Log,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let default_path = PathBuf::from("config.default.toml");

    let override_path = if let Some(p) = args.config {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() { Some(p) } else { None }
    };

    let config = match Config::load_with_defaults(
        if default_path.exists() { Some(&default_path) } else { None },
        override_path.as_deref(),
    )
    .await
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(%e, "failed to load configuration");
            return Err(e);
        }
    };
    info!(default = ?default_path, override = ?override_path, "configuration loaded");

    let log_sink = Arc::new(LogFileSink::new(config.logging.error_log_path()));

    if let Command::Log = args.command {
        println!("{}", log_sink.tail(DEFAULT_TAIL_CHARS));
        return Ok(());
    }

    if let Command::Ingest { reset: true } = args.command {
        reset_database(&config.database.path).await?;
    }

    let pool = init_db_pool(&config.database.path).await?;
    run_migrations(&pool).await?;
    let store = IngestionStore::new(pool);

    match args.command {
        Command::Ingest { .. } => {
            let sink: Arc<dyn ErrorSink> = log_sink;
            let report = run_full_ingestion(&config, &store, sink).await?;
            println!("{}", report);
        }
        Command::Recent { limit, offset } => print_list(&store.list_recent(limit, offset).await?),
        Command::Liked { limit } => print_list(&store.list_liked(limit).await?),
        Command::Top { limit } => print_list(&store.most_viewed(limit).await?),
        Command::Search { term, limit, order } => {
            let hits = store.search(&term, limit, order).await?;
            if hits.is_empty() {
                println!("No articles match '{}'.", term);
            }
            for hit in hits {
                println!("[{}] {} ({})", hit.article.id, hit.title_highlight, hit.article.category);
                if !hit.summary_highlight.is_empty() {
                    println!("    {}", hit.summary_highlight);
                }
            }
        }
        Command::Show { id } => {
            let article = store
                .get(id)
                .await?
                .with_context(|| format!("no article with id {}", id))?;
            store.increment_view(id).await?;
            print_article(&article);
            for comment in store.list_comments(id).await? {
                println!(
                    "  - {} ({}): {}",
                    comment.author,
                    comment.created_at.format("%d/%m/%Y %H:%M"),
                    comment.text
                );
            }
        }
        Command::Like { id } => {
            if !store.toggle_like(id).await? {
                anyhow::bail!("no article with id {}", id);
            }
            if let Some(a) = store.get(id).await? {
                println!("[{}] liked: {} ({} likes)", a.id, a.liked, a.like_count);
            }
        }
        Command::Comment { id, text, author } => {
            if store.get(id).await?.is_none() {
                anyhow::bail!("no article with id {}", id);
            }
            match store.add_comment(id, &author, &text).await? {
                Some(comment_id) => println!("comment {} added", comment_id),
                None => println!("Empty comment ignored."),
            }
        }
        Command::Count => println!("{}", store.count().await?),
        Command::Log => unreachable!("handled before opening the database"),
    }

    Ok(())
}

/// Removes the database file and its WAL companions.
async fn reset_database(path: &str) -> Result<()> {
    for suffix in ["", "-wal", "-shm"] {
        let file = format!("{}{}", path, suffix);
        if Path::new(&file).exists() {
            tokio::fs::remove_file(&file)
                .await
                .with_context(|| format!("failed to remove {}", file))?;
            warn!(path = %file, "database file removed");
        }
    }
    Ok(())
}

fn print_list(articles: &[ArticleRecord]) {
    if articles.is_empty() {
        println!("No articles.");
    }
    for a in articles {
        println!(
            "[{}] {} | {} | {} | {} views, {} likes",
            a.id, a.title, a.source_name, a.category, a.view_count, a.like_count
        );
    }
}

fn print_article(a: &ArticleRecord) {
    println!("{}", a.title);
    println!(
        "{} | {} | {}",
        a.source_name,
        a.author.as_deref().unwrap_or("-"),
        a.category
    );
    println!("{}", a.source_url);
    if let Some(image) = &a.image_url {
        println!("image: {}", image);
    }
    println!();
    println!("{}", if a.body.is_empty() { &a.summary } else { &a.body });
}
