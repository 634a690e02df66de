//! End-to-end behavior against an in-memory SQLite database

mod common;

use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use strata::database::{DatabaseAdapter, SqliteAdapter};
use strata::interceptor::{QueryEvent, QueryInterceptor, QueryOutcome};
use strata::{
    BackendKind, Connection, ConnectionConfig, Error, MemoryCache, SaveOutcome, SqlBackend,
};

async fn adapter() -> SqliteAdapter {
    let config = ConnectionConfig::builder(BackendKind::Sqlite)
        .database(":memory:")
        .build()
        .unwrap();
    SqliteAdapter::connect("test", &config).await.unwrap()
}

/// `users` and `articles` tables with no rows, under `namespace`
async fn empty_connection(namespace: &str) -> (Connection, SqliteAdapter) {
    let adapter = adapter().await;
    for ddl in [
        format!(
            "CREATE TABLE {}users (id INTEGER PRIMARY KEY AUTOINCREMENT, username TEXT UNIQUE, age INTEGER)",
            namespace
        ),
        format!(
            "CREATE TABLE {}articles (id INTEGER PRIMARY KEY AUTOINCREMENT, title TEXT, tag TEXT, user_id INTEGER)",
            namespace
        ),
    ] {
        adapter.execute(&ddl, vec![]).await.unwrap();
    }
    let backend = SqlBackend::new(Arc::new(adapter.clone())).with_namespace(namespace);
    (Connection::new(Arc::new(backend)), adapter)
}

/// Three users and three articles
async fn seeded() -> Connection {
    let (connection, _) = empty_connection("").await;
    let users = connection.container("users");
    let john = users
        .insert(&json!({"username": "JohnDoe", "age": 25}))
        .await
        .unwrap();
    let jane = users
        .insert(&json!({"username": "JaneDoe", "age": 22}))
        .await
        .unwrap();
    let kid = users
        .insert(&json!({"username": "Kid", "age": 5}))
        .await
        .unwrap();

    let articles = connection.container("articles");
    for (title, tag, author) in [
        ("Pasta", "cooking", &john),
        ("Bread", "cooking", &kid),
        ("Portraits", "people", &jane),
    ] {
        articles
            .insert(&json!({"title": title, "tag": tag, "user_id": author}))
            .await
            .unwrap();
    }
    connection
}

#[tokio::test]
async fn test_search_greater() {
    let connection = seeded().await;
    let rows = connection
        .container("users")
        .find("age", "greater", 20)
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn test_in_and_not_in() {
    let connection = seeded().await;
    let articles = connection.container("articles");

    let all = articles
        .find("tag", "in", json!(["cooking", "people"]))
        .await
        .unwrap();
    assert_eq!(all.len(), 3);

    let people = articles
        .find("tag", "not in", json!(["cooking", "geo"]))
        .await
        .unwrap();
    assert_eq!(people.len(), 1);
    assert_eq!(people[0]["title"], json!("Portraits"));

    let none = articles.find("tag", "in", json!([])).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_in_requires_array() {
    let connection = seeded().await;
    let err = connection
        .container("articles")
        .search("tag", "in", "cooking")
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[tokio::test]
async fn test_select_alias() {
    let connection = seeded().await;
    let row = connection
        .container("users")
        .search("username", "is", "JohnDoe")
        .unwrap()
        .select_as("username", "user")
        .unwrap()
        .fetch_one()
        .await
        .unwrap();
    assert_eq!(row, json!({"user": "JohnDoe"}).as_object().cloned().unwrap());
}

#[tokio::test]
async fn test_join_filters_on_author() {
    let connection = seeded().await;
    let rows = connection
        .container("articles")
        .search("users.age", "greater", 20)
        .unwrap()
        .join("articles.user_id", "users.id")
        .unwrap()
        .select("articles.title")
        .unwrap()
        .sort("articles.title", "asc")
        .unwrap()
        .fetch()
        .await
        .unwrap();

    let titles: Vec<_> = rows.iter().map(|row| row["title"].clone()).collect();
    assert_eq!(titles, vec![json!("Pasta"), json!("Portraits")]);
}

#[tokio::test]
async fn test_join_filter_with_paging() {
    let connection = seeded().await;
    let query = connection
        .container("articles")
        .search("users.age", "greater", 20)
        .unwrap()
        .join("articles.user_id", "users.id")
        .unwrap()
        .select("articles.title")
        .unwrap()
        .sort("articles.title", "asc")
        .unwrap();

    let first = query.clone().limit(1).unwrap().fetch().await.unwrap();
    assert_eq!(first, vec![json!({"title": "Pasta"}).as_object().cloned().unwrap()]);

    let second = query.clone().skip(1).unwrap().fetch().await.unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0]["title"], json!("Portraits"));

    let past_end = query.skip(2).unwrap().fetch().await.unwrap();
    assert!(past_end.is_empty());
}

#[tokio::test]
async fn test_save_with_join_is_rejected() {
    let connection = seeded().await;
    let articles = connection.container("articles");
    for author in ["Nobody", "JohnDoe"] {
        let err = articles
            .search("users.username", "is", author)
            .unwrap()
            .join("articles.user_id", "users.id")
            .unwrap()
            .save(&json!({"title": "Soup"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedFeature { .. }), "{:?}", err);
    }
    assert_eq!(articles.search_all().count().await.unwrap(), 3);
    assert!(articles.find_first("title", "is", "Soup").await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_then_fetch_first() {
    let connection = seeded().await;
    let users = connection.container("users");

    let affected = users
        .search("username", "is", "JohnDoe")
        .unwrap()
        .update(&json!({"age": 26}))
        .await
        .unwrap();
    assert_eq!(affected, 1);

    let name = users
        .search("age", "is", 26)
        .unwrap()
        .select("username")
        .unwrap()
        .fetch_first()
        .await
        .unwrap();
    assert_eq!(name, Some(json!("JohnDoe")));
}

#[tokio::test]
async fn test_insert_round_trip() {
    let (connection, _) = empty_connection("").await;
    let users = connection.container("users");
    let id = users
        .insert(&json!({"username": "olive", "age": 40}))
        .await
        .unwrap();
    assert_eq!(id, json!(1));

    let row = users.search_id(id).unwrap().fetch_one().await.unwrap();
    assert_eq!(row["username"], json!("olive"));
    assert_eq!(row["age"], json!(40));
}

#[tokio::test]
async fn test_or_search_and_sort() {
    let connection = seeded().await;
    let rows = connection
        .container("users")
        .search("age", "less", 10)
        .unwrap()
        .or_search("username", "like", "jane%")
        .unwrap()
        .sort("age", "desc")
        .unwrap()
        .fetch()
        .await
        .unwrap();
    let names: Vec<_> = rows.iter().map(|row| row["username"].clone()).collect();
    assert_eq!(names, vec![json!("JaneDoe"), json!("Kid")]);
}

#[tokio::test]
async fn test_sort_precedence() {
    let (connection, _) = empty_connection("").await;
    let users = connection.container("users");
    for (name, age) in [("b", 30), ("a", 30), ("c", 20)] {
        users
            .insert(&json!({"username": name, "age": age}))
            .await
            .unwrap();
    }

    let rows = users
        .search_all()
        .sort("age", "asc")
        .unwrap()
        .sort("username", "asc")
        .unwrap()
        .fetch()
        .await
        .unwrap();
    let names: Vec<_> = rows.iter().map(|row| row["username"].clone()).collect();
    assert_eq!(names, vec![json!("c"), json!("a"), json!("b")]);
}

#[tokio::test]
async fn test_limit_and_skip_boundaries() {
    let connection = seeded().await;
    let users = connection.container("users");

    let none = users.search_all().limit(0).unwrap().fetch().await.unwrap();
    assert!(none.is_empty());

    let beyond = users.search_all().skip(10).unwrap().fetch().await.unwrap();
    assert!(beyond.is_empty());

    let page = users
        .search_all()
        .sort("age", "asc")
        .unwrap()
        .skip(1)
        .unwrap()
        .limit(1)
        .unwrap()
        .fetch()
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0]["username"], json!("JaneDoe"));
}

#[tokio::test]
async fn test_fetch_is_repeatable() {
    let connection = seeded().await;
    let query = connection
        .container("users")
        .search("age", "greater", 1)
        .unwrap()
        .sort("age", "asc")
        .unwrap();
    let first = query.fetch().await.unwrap();
    let second = query.fetch().await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_count_ignores_paging() {
    let connection = seeded().await;
    let count = connection
        .container("users")
        .search("age", "greater", 1)
        .unwrap()
        .limit(1)
        .unwrap()
        .count()
        .await
        .unwrap();
    assert_eq!(count, 3);
}

#[tokio::test]
async fn test_remove() {
    let connection = seeded().await;
    let users = connection.container("users");
    let removed = users
        .search("age", "less", 18)
        .unwrap()
        .remove()
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert_eq!(users.search_all().count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_save_inserts_then_updates() {
    let (connection, _) = empty_connection("").await;
    let users = connection.container("users");
    let query = users.search("username", "is", "olive").unwrap();

    let first = query.save(&json!({"age": 1})).await.unwrap();
    assert!(first.is_insert());

    let second = query.save(&json!({"age": 2})).await.unwrap();
    assert_eq!(second, SaveOutcome::Updated(1));

    let age = users.find_first("username", "is", "olive").await.unwrap();
    assert!(age.is_some());
    let row = users.find_one("username", "is", "olive").await.unwrap();
    assert_eq!(row["age"], json!(2));
    assert_eq!(users.search_all().count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_save_rejects_non_is_predicates() {
    let connection = seeded().await;
    let err = connection
        .container("users")
        .search("age", "greater", 1)
        .unwrap()
        .save(&json!({"age": 1}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidOperator(_)));
}

#[tokio::test]
async fn test_match_is_unsupported() {
    let connection = seeded().await;
    let err = connection
        .container("users")
        .find("username", "match", "^J")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedOperator { .. }));
}

#[tokio::test]
async fn test_terminal_requires_search() {
    let connection = seeded().await;
    let query = connection.container("users").query();
    assert!(matches!(
        query.fetch().await,
        Err(Error::SearchNotInitialized(_))
    ));
    assert!(matches!(
        query.clone().limit(1),
        Err(Error::SearchNotInitialized(_))
    ));
}

#[tokio::test]
async fn test_filters_and_validators() {
    let connection = seeded().await;
    let rows = connection
        .container("users")
        .search_all()
        .filter("username", |value| json!(value.as_str().unwrap_or("").to_uppercase()))
        .unwrap()
        .validate("age", |value| value.as_i64().map_or(false, |age| age >= 18))
        .unwrap()
        .sort("age", "desc")
        .unwrap()
        .fetch()
        .await
        .unwrap();
    let names: Vec<_> = rows.iter().map(|row| row["username"].clone()).collect();
    assert_eq!(names, vec![json!("JOHNDOE"), json!("JANEDOE")]);
}

#[tokio::test]
async fn test_group_and_having() {
    let connection = seeded().await;
    let rows = connection
        .container("articles")
        .search_all()
        .select("tag")
        .unwrap()
        .select_as("COUNT(*)", "total")
        .unwrap()
        .group("tag")
        .unwrap()
        .having("COUNT(*)", "greater", 1)
        .unwrap()
        .fetch()
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["tag"], json!("cooking"));
    assert_eq!(rows[0]["total"], json!(2));
}

#[tokio::test]
async fn test_namespace_and_container_names() {
    let (connection, _) = empty_connection("olive_").await;
    assert_eq!(
        connection.container_names().await.unwrap(),
        vec!["articles", "users"]
    );

    let users = connection.container("users");
    users
        .insert(&json!({"username": "ns", "age": 3}))
        .await
        .unwrap();
    assert_eq!(users.search_all().count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_cursor() {
    let connection = seeded().await;
    let mut cursor = connection
        .container("users")
        .search_all()
        .sort("age", "asc")
        .unwrap()
        .cursor()
        .await
        .unwrap();
    assert_eq!(cursor.len(), 3);
    let first = cursor.next().unwrap();
    assert_eq!(first["username"], json!("Kid"));
    cursor.close();
    assert!(cursor.next().is_none());
}

#[derive(Default)]
struct Counter {
    events: Mutex<Vec<String>>,
}

impl QueryInterceptor for Counter {
    fn after(&self, event: &QueryEvent<'_>, outcome: &QueryOutcome<'_>, _: Duration) {
        self.events
            .lock()
            .unwrap()
            .push(format!("{} {}", event.operation, outcome));
    }
}

#[tokio::test]
async fn test_cached_fetch_skips_backend() {
    let counter = Arc::new(Counter::default());
    let connection = seeded()
        .await
        .with_interceptor(counter.clone())
        .with_cache(Arc::new(MemoryCache::new()));
    let users = connection.container("users");

    let query = users.search("age", "greater", 20).unwrap();
    let first = query
        .fetch_and_cache("adults", Some(Duration::from_secs(60)))
        .await
        .unwrap();
    assert_eq!(first.len(), 2);

    users
        .search("username", "is", "Kid")
        .unwrap()
        .update(&json!({"age": 50}))
        .await
        .unwrap();

    let cached = query
        .fetch_and_cache("adults", Some(Duration::from_secs(60)))
        .await
        .unwrap();
    assert_eq!(cached, first);

    let events = counter.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec!["fetch 2 row(s)", "update 1 affected", "fetch cached"]
    );

    let fresh = query.fetch().await.unwrap();
    assert_eq!(fresh.len(), 3);
}
