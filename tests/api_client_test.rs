//! Integration tests for the HTTP client and its typed operations.

mod common;

use common::{TOKEN, api_url, column, failure, ok, table};
use db_admin_client::api::{ApiClient, Endpoint, Envelope};
use db_admin_client::error::ApiError;
use db_admin_client::models::{
    AlterTableRequest, ColumnDefinition, CreateTableRequest, Row, RowKey, RowsQuery, SortOrder,
};
use db_admin_client::session::{MemoryTokenStore, TokenStore};
use reqwest::Method;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> ApiClient {
    ApiClient::new(
        &api_url(server),
        Arc::new(MemoryTokenStore::with_token(TOKEN)),
        None,
    )
    .unwrap()
}

// =============================================================================
// Envelope handling
// =============================================================================

#[tokio::test]
async fn test_bearer_token_is_attached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/schema/tables"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ok(json!({"tables": [table("users")]})))
        .expect(1)
        .mount(&server)
        .await;

    let tables = assert_ok!(client(&server).list_tables().await);
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].name, "users");
}

#[tokio::test]
async fn test_no_authorization_header_without_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(ok(json!({"connected": false})))
        .mount(&server)
        .await;

    let api = ApiClient::new(&api_url(&server), Arc::new(MemoryTokenStore::new()), None).unwrap();
    let status = assert_ok!(api.status().await);
    assert!(!status.connected);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].headers.contains_key("authorization"));
}

#[tokio::test]
async fn test_failure_envelope_message_is_kept_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/schema/table/ghosts"))
        .respond_with(failure(404, "Table 'ghosts' does not exist"))
        .mount(&server)
        .await;

    let err = assert_err!(client(&server).table_columns("ghosts").await);
    assert_eq!(err, ApiError::envelope("Table 'ghosts' does not exist"));
    assert_eq!(err.to_string(), "Table 'ghosts' does not exist");
}

#[tokio::test]
async fn test_non_envelope_error_body_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/database/info"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let err = assert_err!(client(&server).database_info().await);
    assert!(matches!(err, ApiError::Transport { .. }));
    assert!(err.is_retryable());
    assert!(err.to_string().contains("502"));
}

#[tokio::test]
async fn test_malformed_success_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/schema/tables"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = assert_err!(client(&server).list_tables().await);
    assert!(matches!(err, ApiError::Decode { .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_request_folds_errors_into_envelope() {
    let api = ApiClient::new(
        "http://127.0.0.1:9/api",
        Arc::new(MemoryTokenStore::new()),
        None,
    )
    .unwrap();

    let envelope: Envelope<Value> = api
        .request(Method::GET, &Endpoint::new(["status"]), None)
        .await;
    assert!(!envelope.success);
    assert!(envelope.data.is_none());
    assert!(envelope.error.unwrap().starts_with("Request failed"));
}

// =============================================================================
// Typed operations
// =============================================================================

#[tokio::test]
async fn test_rows_query_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/table/order%20items"))
        .and(query_param("page", "2"))
        .and(query_param("limit", "25"))
        .and(query_param("sort", "created_at"))
        .and(query_param("order", "desc"))
        .respond_with(ok(json!({
            "rows": [{"id": 26, "sku": "A-1"}],
            "page": 2,
            "limit": 25
        })))
        .expect(1)
        .mount(&server)
        .await;

    let query = RowsQuery::page(2, 25).sorted_by("created_at", SortOrder::Desc);
    let rows = assert_ok!(client(&server).table_rows("order items", &query).await);
    assert_eq!(rows.page, 2);
    assert_eq!(rows.rows.len(), 1);
}

#[tokio::test]
async fn test_create_table_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/schema/table"))
        .and(body_json(json!({
            "name": "notes",
            "columns": [
                {"name": "id", "data_type": "integer", "nullable": false, "is_primary_key": true},
                {"name": "body", "data_type": "text", "nullable": true, "is_primary_key": false}
            ]
        })))
        .respond_with(ok(json!({"message": "Table created", "table": "notes"})))
        .expect(1)
        .mount(&server)
        .await;

    let request = CreateTableRequest::new(
        "notes",
        vec![
            ColumnDefinition::new("id", "integer").primary_key(),
            ColumnDefinition::new("body", "text"),
        ],
    );
    let change = assert_ok!(client(&server).create_table(&request).await);
    assert_eq!(change.table, "notes");
}

#[tokio::test]
async fn test_alter_table_is_tagged_by_alter_type() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/schema/table/users"))
        .and(body_json(json!({"alter_type": "RenameTable", "new_name": "customers"})))
        .respond_with(ok(json!({"message": "Table renamed", "rows_affected": 0})))
        .expect(1)
        .mount(&server)
        .await;

    let request = AlterTableRequest::RenameTable {
        new_name: "customers".to_string(),
    };
    assert_ok!(client(&server).alter_table("users", &request).await);
}

#[tokio::test]
async fn test_row_mutations_address_rows_by_key() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/table/users/42"))
        .and(body_json(json!({"name": "Ada"})))
        .respond_with(ok(json!({"message": "Row updated", "rows_affected": 1})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/table/users/42"))
        .respond_with(ok(json!({"message": "Row deleted", "rows_affected": 1})))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server);
    let key = RowKey::parse("42").unwrap();
    let row: Row = serde_json::from_value(json!({"name": "Ada"})).unwrap();

    let updated = assert_ok!(api.update_row("users", &key, &row).await);
    assert_eq!(updated.rows_affected, 1);
    let deleted = assert_ok!(api.delete_row("users", &key).await);
    assert_eq!(deleted.message, "Row deleted");
}

#[tokio::test]
async fn test_validation_fails_before_dispatch() {
    let server = MockServer::start().await;
    let api = client(&server);

    let err = assert_err!(api.table_columns("  ").await);
    assert!(matches!(err, ApiError::Validation { .. }));
    let err = assert_err!(api.create_table(&CreateTableRequest::new("t", vec![])).await);
    assert!(matches!(err, ApiError::Validation { .. }));

    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_connect_stores_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/connect"))
        .respond_with(ok(json!({
            "token": "fresh",
            "database": "app",
            "db_type": "mysql"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/schema/table/users"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ok(json!({"columns": [column("id", "int", true)]})))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = Arc::new(MemoryTokenStore::new());
    let api = ApiClient::new(&api_url(&server), tokens.clone(), None).unwrap();
    let request = db_admin_client::models::ConnectRequest::new(
        db_admin_client::models::DatabaseType::Mysql,
        "localhost",
        "app",
        "root",
        "secret",
    );
    assert_ok!(api.connect(&request).await);
    assert_eq!(tokens.get().as_deref(), Some("fresh"));

    let columns = assert_ok!(api.table_columns("users").await);
    assert!(columns[0].is_primary_key);
}
