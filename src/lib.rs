//! Database Admin Client Library
//!
//! This library keeps a local, cached view of a database served by a REST
//! administration backend (SQLite, PostgreSQL, MySQL): tables, column and
//! index metadata, and pages of rows. Mutations go through the backend and
//! invalidate exactly the cached views they can have changed.

pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod format;
pub mod models;
pub mod session;
pub mod sql;
pub mod store;
pub mod workspace;

pub use api::ApiClient;
pub use cache::{FetchPolicy, QueryCache, QueryKey};
pub use config::Config;
pub use context::AppContext;
pub use error::{ApiError, ApiResult};
pub use session::{Session, SessionManager, SessionStatus};
pub use store::DataStore;
pub use workspace::Workspace;
