//! Shared fixtures for tests against a mocked backend.

#![allow(dead_code)]

use db_admin_client::cache::CacheSettings;
use db_admin_client::context::AppContext;
use db_admin_client::session::{MemoryTokenStore, TokenStore};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN: &str = "test-token";

pub fn api_url(server: &MockServer) -> String {
    format!("{}/api", server.uri())
}

/// A successful envelope around `data`.
pub fn ok(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"success": true, "data": data}))
}

/// A failed envelope carrying `error`.
pub fn failure(status: u16, error: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({"success": false, "error": error}))
}

/// No retries, so failing reads fail fast.
pub fn settings() -> CacheSettings {
    CacheSettings {
        retry: 0,
        retry_delay: Duration::from_millis(10),
        ..CacheSettings::default()
    }
}

pub fn context_with(server: &MockServer, tokens: Arc<dyn TokenStore>) -> AppContext {
    AppContext::new(&api_url(server), tokens, settings(), Some(Duration::from_secs(5)))
        .expect("context")
}

/// A context holding a stored token.
pub fn context(server: &MockServer) -> AppContext {
    context_with(server, Arc::new(MemoryTokenStore::with_token(TOKEN)))
}

pub async fn mount_status(server: &MockServer, db_type: &str) {
    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(ok(json!({
            "connected": true,
            "database": "app",
            "db_type": db_type
        })))
        .mount(server)
        .await;
}

/// A context that has already resolved to a connected session.
pub async fn connected_context(server: &MockServer) -> AppContext {
    mount_status(server, "postgres").await;
    let ctx = context(server);
    let session = ctx.start().await;
    assert!(session.is_connected(), "expected connected session: {:?}", session);
    ctx
}

pub fn table(name: &str) -> Value {
    json!({"name": name, "table_type": "BASE TABLE", "row_count_estimate": 0})
}

pub fn column(name: &str, data_type: &str, is_primary_key: bool) -> Value {
    json!({
        "name": name,
        "data_type": data_type,
        "nullable": !is_primary_key,
        "is_primary_key": is_primary_key,
        "default_value": null
    })
}
