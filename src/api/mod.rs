//! API client and domain operations.
//!
//! [`ApiClient`] issues authenticated requests to the backend. The submodules
//! add one typed operation per backend capability; each narrows the envelope
//! to an [`ApiResult`](crate::error::ApiResult) and never swallows errors.

pub mod auth;
pub mod client;
pub mod data;
pub mod database;
pub mod query;
pub mod schema;

pub use client::{ApiClient, DEFAULT_API_URL, Endpoint, Envelope};
