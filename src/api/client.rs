//! HTTP client for the REST backend.
//!
//! Every response is wrapped in a `{success, data?, error?}` envelope. The
//! client attaches the bearer token from the [`TokenStore`] to each request
//! and never panics or fails at the type level on HTTP-level problems:
//! [`ApiClient::request`] always yields an envelope, and
//! [`ApiClient::try_request`] yields the same outcome as an [`ApiResult`]
//! with the error kind preserved.

use crate::error::{ApiError, ApiResult};
use crate::session::TokenStore;
use reqwest::Method;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

/// Default base URL of the backend API.
pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";

/// Uniform response wrapper used by every endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default = "none", skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn none<T>() -> Option<T> {
    None
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

impl<T: DeserializeOwned> Envelope<T> {
    /// Narrow the envelope to its payload.
    ///
    /// A successful envelope without `data` is accepted when `T` can be built
    /// from `null` (unit, `Option`, raw JSON).
    pub fn into_result(self) -> ApiResult<T> {
        if !self.success {
            return Err(ApiError::envelope(
                self.error.unwrap_or_else(|| "Request failed".to_string()),
            ));
        }
        match self.data {
            Some(data) => Ok(data),
            None => T::deserialize(JsonValue::Null)
                .map_err(|_| ApiError::decode("Response is missing its data")),
        }
    }
}

/// Path (and optional query string) of a backend endpoint, relative to the API base.
///
/// Segments are percent-encoded when the URL is built, so table names and
/// row ids can contain any character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    segments: Vec<String>,
    query: Vec<(&'static str, String)>,
}

impl Endpoint {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
            query: Vec::new(),
        }
    }

    /// Append a path segment.
    pub fn segment(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(segment.into());
        self
    }

    /// Append query string pairs.
    pub fn query(mut self, pairs: Vec<(&'static str, String)>) -> Self {
        self.query.extend(pairs);
        self
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        if !self.query.is_empty() {
            let query: Vec<String> = self.query.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            write!(f, "?{}", query.join("&"))?;
        }
        Ok(())
    }
}

/// Authenticated client for the backend API.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    tokens: Arc<dyn TokenStore>,
}

impl ApiClient {
    /// Create a client for the given base URL.
    pub fn new(
        base_url: &str,
        tokens: Arc<dyn TokenStore>,
        timeout: Option<Duration>,
    ) -> ApiResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ApiError::validation(format!("Invalid API URL '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::validation(format!(
                "API URL '{}' cannot be used as a base",
                base_url
            )));
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| ApiError::transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            tokens,
        })
    }

    /// Base URL requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Token storage used for the bearer header.
    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    /// Whether a session token is currently stored.
    pub fn has_token(&self) -> bool {
        self.tokens.get().is_some()
    }

    fn url_for(&self, endpoint: &Endpoint) -> ApiResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::validation("API URL cannot be used as a base"))?
            .pop_if_empty()
            .extend(endpoint.segments.iter());
        if !endpoint.query.is_empty() {
            url.query_pairs_mut().extend_pairs(endpoint.query.iter());
        }
        Ok(url)
    }

    /// Issue a request and return the envelope.
    ///
    /// Transport and decode failures come back as `success: false` envelopes.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &Endpoint,
        body: Option<JsonValue>,
    ) -> Envelope<T> {
        match self.try_request(method, endpoint, body).await {
            Ok(data) => Envelope::ok(data),
            Err(e) => Envelope::failure(e.to_string()),
        }
    }

    /// Issue a request and narrow the envelope to its payload.
    pub async fn try_request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &Endpoint,
        body: Option<JsonValue>,
    ) -> ApiResult<T> {
        let url = self.url_for(endpoint)?;
        let request_id = uuid::Uuid::new_v4().simple().to_string();
        let start = Instant::now();

        let mut request = self
            .http
            .request(method.clone(), url)
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = self.tokens.get() {
            request = request.bearer_auth(token);
        }
        if let Some(body) = &body {
            request = request.json(body);
        }

        debug!(
            request_id = %request_id,
            method = %method,
            endpoint = %endpoint,
            "Sending API request"
        );

        let response = request.send().await.map_err(|e| {
            warn!(
                request_id = %request_id,
                method = %method,
                endpoint = %endpoint,
                error = %e,
                "API request failed"
            );
            ApiError::from(e)
        })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(ApiError::from)?;

        debug!(
            request_id = %request_id,
            status = status.as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "API response received"
        );

        match serde_json::from_slice::<Envelope<T>>(&bytes) {
            Ok(envelope) => envelope.into_result(),
            Err(e) if status.is_success() => Err(ApiError::decode(format!(
                "{} {}: {}",
                method, endpoint, e
            ))),
            Err(_) => Err(ApiError::transport(format!(
                "{} {} returned HTTP {}",
                method, endpoint, status
            ))),
        }
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, endpoint: Endpoint) -> ApiResult<T> {
        self.try_request(Method::GET, &endpoint, None).await
    }

    pub(crate) async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        endpoint: Endpoint,
        body: Option<&B>,
    ) -> ApiResult<T> {
        let body = body.map(serde_json::to_value).transpose()?;
        self.try_request(Method::POST, &endpoint, body).await
    }

    pub(crate) async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        endpoint: Endpoint,
        body: &B,
    ) -> ApiResult<T> {
        let body = serde_json::to_value(body)?;
        self.try_request(Method::PUT, &endpoint, Some(body)).await
    }

    pub(crate) async fn delete<T: DeserializeOwned>(&self, endpoint: Endpoint) -> ApiResult<T> {
        self.try_request(Method::DELETE, &endpoint, None).await
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("has_token", &self.has_token())
            .finish()
    }
}
