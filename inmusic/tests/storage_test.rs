use inmusic::models::{NormalizedArticle, SearchOrder};
use inmusic::report::MemorySink;
use inmusic::storage::{IngestionStore, ANONYMOUS_AUTHOR};
use sqlx::sqlite::SqlitePoolOptions;

// Helper to create an in-memory store with the real schema
async fn setup_store() -> IngestionStore {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("open in-memory db");
    common::run_migrations(&pool).await.expect("migrations");
    IngestionStore::new(pool)
}

fn article(title: &str, summary: &str, url: &str) -> NormalizedArticle {
    NormalizedArticle {
        title: title.to_string(),
        image_url: None,
        summary: summary.to_string(),
        body: format!("{} {}", title, summary),
        source_url: url.to_string(),
        author: Some("Redação".to_string()),
        source_name: "Teste".to_string(),
    }
}

#[tokio::test]
async fn save_batch_is_idempotent_and_keeps_first_copy() {
    let store = setup_store().await;
    let sink = MemorySink::new();

    let first = store
        .save_batch(
            &[
                article("Banda anuncia turnê", "datas", "https://a.example/1"),
                article("Título repetido", "segunda cópia", "https://a.example/1"),
                article("Novo álbum", "", "https://a.example/2"),
            ],
            &sink,
        )
        .await;
    assert_eq!((first.inserted, first.duplicates, first.rejected), (2, 1, 0));

    let again = store
        .save_batch(&[article("Novo álbum", "", "https://a.example/2")], &sink)
        .await;
    assert_eq!((again.inserted, again.duplicates), (0, 1));

    assert_eq!(store.count().await.unwrap(), 2);
    let recent = store.list_recent(10, 0).await.unwrap();
    let kept = recent
        .iter()
        .find(|a| a.source_url == "https://a.example/1")
        .unwrap();
    assert_eq!(kept.title, "Banda anuncia turnê");
    assert!(sink.is_empty());
}

#[tokio::test]
async fn new_records_are_classified_with_zeroed_counters() {
    let store = setup_store().await;
    let sink = MemorySink::new();
    store
        .save_batch(
            &[
                article("Artist announces world tour", "", "https://a.example/tour"),
                article("Top 10 songs of the year", "", "https://a.example/top"),
                article("Random music trivia", "", "https://a.example/trivia"),
            ],
            &sink,
        )
        .await;

    let mut categories: Vec<_> = store
        .list_recent(10, 0)
        .await
        .unwrap()
        .into_iter()
        .map(|a| {
            assert_eq!((a.view_count, a.like_count, a.liked), (0, 0, false));
            (a.source_url, a.category)
        })
        .collect();
    categories.sort();
    assert_eq!(
        categories,
        vec![
            ("https://a.example/top".to_string(), "Listas".to_string()),
            ("https://a.example/tour".to_string(), "Shows".to_string()),
            ("https://a.example/trivia".to_string(), "Outros".to_string()),
        ]
    );
}

#[tokio::test]
async fn invalid_records_are_reported_and_skipped() {
    let store = setup_store().await;
    let sink = MemorySink::new();

    let outcome = store
        .save_batch(
            &[
                article("   ", "sem título", "https://a.example/blank"),
                article("Válido", "", "https://a.example/ok"),
                article("Sem url", "", ""),
            ],
            &sink,
        )
        .await;

    assert_eq!((outcome.inserted, outcome.rejected), (1, 2));
    assert_eq!(
        sink.contexts(),
        vec!["store:save_batch".to_string(), "store:save_batch".to_string()]
    );
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn recent_lists_newest_batch_first() {
    let store = setup_store().await;
    let sink = MemorySink::new();
    store
        .save_batch(&[article("Antigo", "", "https://a.example/old")], &sink)
        .await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    store
        .save_batch(&[article("Novo", "", "https://a.example/new")], &sink)
        .await;

    let titles: Vec<_> = store
        .list_recent(10, 0)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.title)
        .collect();
    assert_eq!(titles, vec!["Novo", "Antigo"]);

    let page: Vec<_> = store.list_recent(1, 1).await.unwrap();
    assert_eq!(page[0].title, "Antigo");
}

#[tokio::test]
async fn most_viewed_orders_by_views_then_insert_order() {
    let store = setup_store().await;
    let sink = MemorySink::new();
    store
        .save_batch(
            &[
                article("A", "", "https://a.example/a"),
                article("B", "", "https://a.example/b"),
                article("C", "", "https://a.example/c"),
            ],
            &sink,
        )
        .await;
    let ids: Vec<i64> = {
        let mut all = store.list_recent(10, 0).await.unwrap();
        all.sort_by_key(|a| a.id);
        all.into_iter().map(|a| a.id).collect()
    };

    assert!(store.increment_view(ids[2]).await.unwrap());
    assert!(store.increment_view(ids[2]).await.unwrap());

    let titles: Vec<_> = store
        .most_viewed(5)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.title)
        .collect();
    assert_eq!(titles, vec!["C", "A", "B"]);

    let top2: Vec<_> = store.most_viewed(2).await.unwrap();
    assert_eq!(top2.len(), 2);
    assert_eq!(top2[0].view_count, 2);

    assert!(!store.increment_view(9999).await.unwrap());
}

#[tokio::test]
async fn equal_views_across_batches_put_newest_batch_first() {
    let store = setup_store().await;
    let sink = MemorySink::new();
    store
        .save_batch(&[article("Festival A", "", "https://a.example/fa")], &sink)
        .await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    store
        .save_batch(&[article("Festival B", "", "https://a.example/fb")], &sink)
        .await;

    let titles: Vec<_> = store
        .most_viewed(2)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.title)
        .collect();
    assert_eq!(titles, vec!["Festival B", "Festival A"]);

    let hits: Vec<_> = store
        .search("festival", 10, SearchOrder::MostViewed)
        .await
        .unwrap()
        .into_iter()
        .map(|h| h.article.title)
        .collect();
    assert_eq!(hits, vec!["Festival B", "Festival A"]);
}

#[tokio::test]
async fn toggle_like_flips_and_never_goes_negative() {
    let store = setup_store().await;
    let sink = MemorySink::new();
    store
        .save_batch(&[article("Curtido", "", "https://a.example/like")], &sink)
        .await;
    let id = store.list_recent(1, 0).await.unwrap()[0].id;

    assert!(store.toggle_like(id).await.unwrap());
    let a = store.get(id).await.unwrap().unwrap();
    assert_eq!((a.liked, a.like_count), (true, 1));
    assert_eq!(store.list_liked(10).await.unwrap().len(), 1);

    assert!(store.toggle_like(id).await.unwrap());
    let a = store.get(id).await.unwrap().unwrap();
    assert_eq!((a.liked, a.like_count), (false, 0));
    assert!(store.list_liked(10).await.unwrap().is_empty());

    // counter already at zero while liked: unliking must clamp
    sqlx::query("UPDATE articles SET liked = 1, like_count = 0 WHERE id = ?")
        .bind(id)
        .execute(store.pool())
        .await
        .unwrap();
    store.toggle_like(id).await.unwrap();
    let a = store.get(id).await.unwrap().unwrap();
    assert_eq!((a.liked, a.like_count), (false, 0));

    assert!(!store.toggle_like(9999).await.unwrap());
}

#[tokio::test]
async fn search_matches_case_insensitively_and_highlights() {
    let store = setup_store().await;
    let sink = MemorySink::new();
    store
        .save_batch(
            &[
                article("Big Show Tonight", "Doors open at 8", "https://a.example/show"),
                article("Quiet evening", "A show of hands", "https://a.example/hands"),
                article("Nothing here", "", "https://a.example/none"),
                article("100% acústico", "", "https://a.example/pct"),
            ],
            &sink,
        )
        .await;

    let hits = store.search("show", 10, SearchOrder::Recent).await.unwrap();
    assert_eq!(hits.len(), 2);
    let big = hits
        .iter()
        .find(|h| h.article.source_url == "https://a.example/show")
        .unwrap();
    assert_eq!(big.title_highlight, "Big <mark>Show</mark> Tonight");
    assert_eq!(big.summary_highlight, "Doors open at 8");
    let hands = hits
        .iter()
        .find(|h| h.article.source_url == "https://a.example/hands")
        .unwrap();
    assert_eq!(hands.summary_highlight, "A <mark>show</mark> of hands");

    // wildcard characters are matched literally
    let pct = store.search("0%", 10, SearchOrder::Recent).await.unwrap();
    assert_eq!(pct.len(), 1);
    assert_eq!(pct[0].title_highlight, "10<mark>0%</mark> acústico");

    let everything = store.search("", 10, SearchOrder::Recent).await.unwrap();
    assert_eq!(everything.len(), 4);
    assert!(everything.iter().all(|h| !h.title_highlight.contains("<mark>")));
}

#[tokio::test]
async fn search_folds_case_of_accented_letters() {
    let store = setup_store().await;
    let sink = MemorySink::new();
    store
        .save_batch(
            &[
                article("Banda anuncia turnê", "", "https://a.example/turne"),
                article("ÁLBUM novo", "sai em junho", "https://a.example/album"),
                article("Outra coisa", "", "https://a.example/other"),
            ],
            &sink,
        )
        .await;

    let tour = store.search("TURNÊ", 10, SearchOrder::Recent).await.unwrap();
    assert_eq!(tour.len(), 1);
    assert_eq!(tour[0].title_highlight, "Banda anuncia <mark>turnê</mark>");

    let album = store.search("álbum", 10, SearchOrder::Recent).await.unwrap();
    assert_eq!(album.len(), 1);
    assert_eq!(album[0].title_highlight, "<mark>ÁLBUM</mark> novo");

    // the newest row does not match; limit counts matching rows only
    let one = store.search("turnê", 1, SearchOrder::Recent).await.unwrap();
    assert_eq!(one.len(), 1);
    assert_eq!(one[0].article.source_url, "https://a.example/turne");
}

#[tokio::test]
async fn search_can_order_by_views() {
    let store = setup_store().await;
    let sink = MemorySink::new();
    store
        .save_batch(
            &[
                article("Festival um", "", "https://a.example/f1"),
                article("Festival dois", "", "https://a.example/f2"),
            ],
            &sink,
        )
        .await;
    let second = store
        .search("dois", 1, SearchOrder::Recent)
        .await
        .unwrap()
        .remove(0)
        .article;
    store.increment_view(second.id).await.unwrap();

    let hits = store
        .search("festival", 10, SearchOrder::MostViewed)
        .await
        .unwrap();
    assert_eq!(hits[0].article.title, "Festival dois");
    assert_eq!(hits[0].title_highlight, "<mark>Festival</mark> dois");
}

#[tokio::test]
async fn comments_are_trimmed_and_listed_oldest_first() {
    let store = setup_store().await;
    let sink = MemorySink::new();
    store
        .save_batch(&[article("Com comentários", "", "https://a.example/c")], &sink)
        .await;
    let id = store.list_recent(1, 0).await.unwrap()[0].id;

    assert!(store.add_comment(id, "  Maria ", "  Adorei! ").await.unwrap().is_some());
    assert!(store.add_comment(id, "   ", "Também").await.unwrap().is_some());
    assert_eq!(store.add_comment(id, "Zé", "   ").await.unwrap(), None);

    let comments = store.list_comments(id).await.unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!((comments[0].author.as_str(), comments[0].text.as_str()), ("Maria", "Adorei!"));
    assert_eq!(comments[1].author, ANONYMOUS_AUTHOR);
    assert!(store.list_comments(id + 1).await.unwrap().is_empty());
}
