//! Integration tests for common Courier workflows.
//!
//! These run complete calls through the engine and the reqwest transport
//! against a mock server.

use courier::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn engine() -> Engine {
    let transport = assert_ok!(ReqwestTransport::new(
        ReqwestConfig::builder()
            .logging(LogLevel::None, vec![])
            .build()
    ));
    Engine::builder(transport)
        .middleware(Middleware::status_validation())
        .build()
}

// =============================================================================
// Operations
// =============================================================================

#[derive(Serialize)]
struct NewItem {
    id: u32,
    name: String,
}

struct CreateItem {
    base: String,
    item: NewItem,
}

impl Operation for CreateItem {
    type Request = NewItem;
    type Response = String;

    fn url(&self) -> String {
        format!("{}/items", self.base)
    }

    fn kind(&self) -> OperationKind {
        OperationKind::ReadWrite
    }

    fn request(&self) -> Option<&NewItem> {
        Some(&self.item)
    }

    fn response_path(&self) -> Option<&str> {
        Some(".success")
    }
}

#[derive(Debug, Deserialize, PartialEq)]
struct Item {
    id: u32,
    name: String,
}

#[derive(Serialize)]
struct Page {
    page: u32,
    per_page: u32,
}

struct ListItems {
    base: String,
    page: Page,
}

impl Operation for ListItems {
    type Request = ();
    type Response = Vec<Item>;

    fn url(&self) -> String {
        with_query(&format!("{}/items", self.base), &self.page).unwrap_or_default()
    }

    fn kind(&self) -> OperationKind {
        OperationKind::Read
    }

    fn response_path(&self) -> Option<&str> {
        Some(".data.items")
    }
}

struct DeleteItem {
    base: String,
    id: u32,
}

impl Operation for DeleteItem {
    type Request = ();
    type Response = ();

    fn url(&self) -> String {
        format!("{}/items/{}", self.base, self.id)
    }

    fn kind(&self) -> OperationKind {
        OperationKind::Read
    }

    fn method(&self) -> HttpMethod {
        HttpMethod::Delete
    }
}

struct Health {
    base: String,
}

impl Operation for Health {
    type Request = ();
    type Response = serde_json::Value;

    fn url(&self) -> String {
        format!("{}/health", self.base)
    }

    fn kind(&self) -> OperationKind {
        OperationKind::Read
    }
}

// =============================================================================
// Workflows
// =============================================================================

#[tokio::test]
async fn test_post_decodes_nested_string() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/items"))
        .and(header("content-type", "application/json"))
        .and(body_json(serde_json::json!({"id": 1, "name": "x"})))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(serde_json::json!({"success": "true"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let operation = CreateItem {
        base: server.uri(),
        item: NewItem {
            id: 1,
            name: "x".to_string(),
        },
    };

    let result = assert_ok!(engine().execute(&operation).await);
    assert_eq!(result, "true");
}

#[tokio::test]
async fn test_server_error_surfaces_without_recoverer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let err = assert_err!(engine().execute(&Health { base: server.uri() }).await);
    assert!(err.is_server_error());
    assert_eq!(err.status_error(), Some(&HttpStatusError::Server { code: 503 }));
    assert!(err.call_site().file().ends_with("common_workflows.rs"));
}

#[tokio::test]
async fn test_retry_recovers_from_transient_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .mount(&server)
        .await;

    let engine = engine();
    engine.add_middleware(Middleware::retry(RetryConfig::constant(
        3,
        Duration::from_millis(10),
    )));

    let body = assert_ok!(engine.execute(&Health { base: server.uri() }).await);
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn test_query_parameters_and_path_scoped_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .and(query_param("page", "2"))
        .and(query_param("per_page", "10"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {"items": [{"id": 7, "name": "seven"}]}
        })))
        .mount(&server)
        .await;

    let engine = engine();
    engine.add_middleware(Middleware::bearer_auth("secret"));

    let items = assert_ok!(
        engine
            .execute(&ListItems {
                base: server.uri(),
                page: Page {
                    page: 2,
                    per_page: 10,
                },
            })
            .await
    );
    assert_eq!(
        items,
        vec![Item {
            id: 7,
            name: "seven".to_string()
        }]
    );
}

#[tokio::test]
async fn test_empty_response_with_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/items/3"))
        .respond_with(ResponseTemplate::new(204).insert_header("x-deleted", "3"))
        .mount(&server)
        .await;

    let meta = assert_ok!(
        engine()
            .execute_with_meta(&DeleteItem {
                base: server.uri(),
                id: 3,
            })
            .await
    );
    assert_eq!(meta.status, 204);
    assert_eq!(meta.headers.get("X-Deleted"), Some("3"));
}

#[tokio::test]
async fn test_cancelled_call_rejects() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let engine = engine();
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let err = assert_err!(
        engine
            .call(&Health { base: server.uri() })
            .cancellation(token)
            .send()
            .await
    );
    assert!(err.is_cancelled());
}
