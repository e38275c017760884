use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use recon_feed::FeedError;
use recon_feed::db::{
    ConnectionConfig, Connector, CredentialResolver, CredentialSource, Feed, HardcodedStrategy,
    RecordSource, Row, TablePrefix, WpConfigStrategy,
};
use recon_feed::router::{FeedState, feed_router};
use recon_feed::types::PageRequest;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::ServiceExt;

const KEY: &str = "feed-test-key";

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Connect(CredentialSource),
    Count(&'static str, String, PageRequest),
    Fetch(&'static str, String, PageRequest),
}

#[derive(Clone)]
struct FakeConnector {
    total: i64,
    rows: Vec<Row>,
    refuse: bool,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl FakeConnector {
    fn with_rows(total: i64, rows: Vec<Row>) -> Self {
        Self {
            total,
            rows,
            refuse: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::with_rows(0, Vec::new())
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

struct FakeSource {
    total: i64,
    rows: Vec<Row>,
    calls: Arc<Mutex<Vec<Call>>>,
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn RecordSource>, FeedError> {
        self.calls.lock().unwrap().push(Call::Connect(config.source));
        if self.refuse {
            return Err(FeedError::ConnectionFailure {
                tag: config.source,
                error: sqlx::Error::Protocol("Access denied for user 'reader'@'10.1.2.3'".into()),
            });
        }
        Ok(Box::new(FakeSource {
            total: self.total,
            rows: self.rows.clone(),
            calls: self.calls.clone(),
        }))
    }
}

#[async_trait]
impl RecordSource for FakeSource {
    async fn count(
        &mut self,
        feed: &Feed,
        prefix: &TablePrefix,
        page: &PageRequest,
    ) -> Result<i64, FeedError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Count(feed.name, prefix.table(feed.table_suffix), *page));
        Ok(self.total)
    }

    async fn fetch(
        &mut self,
        feed: &Feed,
        prefix: &TablePrefix,
        page: &PageRequest,
    ) -> Result<Vec<Row>, FeedError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Fetch(feed.name, prefix.table(feed.table_suffix), *page));
        Ok(self.rows.clone())
    }
}

fn row(id: i64, reference: &str) -> Row {
    let mut row = Row::new();
    row.insert("id".to_string(), json!(id));
    row.insert("paya_reference".to_string(), json!(reference));
    row
}

fn resolver_with(database: &str) -> CredentialResolver {
    CredentialResolver::new(vec![Box::new(HardcodedStrategy::new(ConnectionConfig::new(
        CredentialSource::Hardcoded,
        "localhost",
        database,
        "reader",
        "",
    )))])
}

fn app(connector: FakeConnector, database: &str) -> Router {
    app_with_resolver(connector, resolver_with(database))
}

fn app_with_resolver(connector: FakeConnector, resolver: CredentialResolver) -> Router {
    let state = FeedState::new(
        KEY,
        TablePrefix::parse("pw_").unwrap(),
        resolver,
        Arc::new(connector),
    );
    feed_router(state)
}

async fn get(app: Router, uri: &str, key_header: Option<(&str, &str)>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some((name, value)) = key_header {
        builder = builder.header(name, value);
    }
    let resp = app
        .oneshot(builder.body(Body::empty()).expect("failed to build request"))
        .await
        .expect("request failed");
    let status = resp.status();
    let body = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    let json = serde_json::from_slice(&body).expect("response body was not json");
    (status, json)
}

#[tokio::test]
async fn missing_key_is_401_and_never_touches_the_database() {
    let connector = FakeConnector::with_rows(10, vec![row(1, "pi_1")]);
    let (status, body) = get(
        app(connector.clone(), "shop"),
        "/get_transactions.php?days=5&page=2&limit=10",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");
    assert!(connector.calls().is_empty());
}

#[tokio::test]
async fn wrong_key_is_401_on_both_feeds() {
    for uri in ["/get_checkout_journey.php", "/get_transactions.php?api_key=nope"] {
        let connector = FakeConnector::with_rows(0, Vec::new());
        let (status, _) = get(app(connector.clone(), "shop"), uri, Some(("X-Api-Key", "wrong"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert!(connector.calls().is_empty());
    }
}

#[tokio::test]
async fn transactions_page_uses_clamped_parameters() {
    let connector = FakeConnector::with_rows(25_000, vec![row(9, "pi_9"), row(8, "pi_8")]);
    let (status, body) = get(
        app(connector.clone(), "shop"),
        "/get_transactions.php?days=999&page=2&limit=50000",
        Some(("x-api-key", KEY)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["total"], 25_000);
    assert_eq!(body["page"], 2);
    assert_eq!(body["limit"], 10_000);
    assert_eq!(body["has_more"], true);
    assert_eq!(body["data"][0]["paya_reference"], "pi_9");
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let expected = PageRequest {
        days: 30,
        page: 2,
        limit: 10_000,
    };
    assert_eq!(
        connector.calls(),
        vec![
            Call::Connect(CredentialSource::Hardcoded),
            Call::Count("transactions", "pw_transactions".to_string(), expected),
            Call::Fetch("transactions", "pw_transactions".to_string(), expected),
        ]
    );
}

#[tokio::test]
async fn checkout_journey_accepts_query_key_and_defaults() {
    let connector = FakeConnector::with_rows(3, Vec::new());
    let uri = format!("/get_checkout_journey?api_key={KEY}&days=0");
    let (status, body) = get(app(connector.clone(), "shop"), &uri, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["page"], 1);
    assert_eq!(body["limit"], 5000);
    assert_eq!(body["has_more"], false);
    assert_eq!(body["data"], json!([]));

    let calls = connector.calls();
    assert_eq!(
        calls[1],
        Call::Count(
            "checkout_journey",
            "pw_checkout_journey".to_string(),
            PageRequest {
                days: 1,
                page: 1,
                limit: 5000
            }
        )
    );
}

#[tokio::test]
async fn incomplete_credentials_are_500_without_connecting() {
    let connector = FakeConnector::with_rows(1, Vec::new());
    let (status, body) = get(
        app(connector.clone(), ""),
        "/get_transactions.php",
        Some(("X-Api-Key", KEY)),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"success": false, "error": "Database configuration incomplete"}));
    assert!(connector.calls().is_empty());
}

#[tokio::test]
async fn connection_failure_is_500_with_generic_message() {
    let connector = FakeConnector::refusing();
    let (status, body) = get(
        app(connector.clone(), "shop"),
        "/get_checkout_journey.php",
        Some(("X-Api-Key", KEY)),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Database connection failed");
    assert!(!body.to_string().contains("Access denied"));
    assert_eq!(connector.calls(), vec![Call::Connect(CredentialSource::Hardcoded)]);
}

#[tokio::test]
async fn wp_config_table_prefix_overrides_configured_prefix() {
    let dir = TempDir::new().expect("failed to create temp dir");
    std::fs::write(
        dir.path().join("wp-config.php"),
        r#"<?php
define('DB_NAME', 'shop');
define('DB_USER', 'reader');
define('DB_PASSWORD', 'secret');
define('DB_HOST', 'localhost');
$table_prefix = 'wp2_';
"#,
    )
    .expect("failed to write wp-config.php");

    let connector = FakeConnector::with_rows(1, vec![row(1, "pi_1")]);
    let resolver = CredentialResolver::new(vec![Box::new(WpConfigStrategy::new(dir.path(), 1))]);
    let (status, body) = get(
        app_with_resolver(connector.clone(), resolver),
        "/get_transactions.php",
        Some(("X-Api-Key", KEY)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    let expected = PageRequest {
        days: 2,
        page: 1,
        limit: 5000,
    };
    assert_eq!(
        connector.calls(),
        vec![
            Call::Connect(CredentialSource::WpConfig),
            Call::Count("transactions", "wp2_transactions".to_string(), expected),
            Call::Fetch("transactions", "wp2_transactions".to_string(), expected),
        ]
    );
}

#[tokio::test]
async fn row_columns_keep_projection_order() {
    let mut ordered = Row::new();
    ordered.insert("id".to_string(), json!(7));
    ordered.insert("paya_reference".to_string(), json!("pi_7"));
    ordered.insert("amount".to_string(), json!("12.50"));
    ordered.insert("currency".to_string(), json!("GBP"));
    let connector = FakeConnector::with_rows(1, vec![ordered]);

    let (status, body) = get(
        app(connector, "shop"),
        "/get_transactions.php",
        Some(("X-Api-Key", KEY)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let keys: Vec<&str> = body["data"][0]
        .as_object()
        .expect("row should be an object")
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(keys, ["id", "paya_reference", "amount", "currency"]);
}
