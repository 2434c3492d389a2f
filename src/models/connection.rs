//! Connection-related data models.
//!
//! This module defines the wire types for connecting to a database through the
//! backend and for reporting session status.

use crate::error::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};

/// Supported database types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    Postgres,
    /// Includes MariaDB
    Mysql,
    Sqlite,
}

impl DatabaseType {
    /// Get the display name for this database type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Postgres => "PostgreSQL",
            Self::Mysql => "MySQL",
            Self::Sqlite => "SQLite",
        }
    }

    /// Get the default port for this database type.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Self::Postgres => Some(5432),
            Self::Mysql => Some(3306),
            Self::Sqlite => None,
        }
    }

    /// Whether connecting requires a host, port and credentials.
    pub fn is_networked(&self) -> bool {
        !matches!(self, Self::Sqlite)
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for DatabaseType {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "mysql" | "mariadb" => Ok(Self::Mysql),
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            other => Err(ApiError::validation(format!(
                "Unknown database type '{}'. Expected postgres, mysql or sqlite",
                other
            ))),
        }
    }
}

/// Credentials sent to `POST /connect`.
///
/// SQLite connections leave host, port and credentials empty; the fields are
/// still sent because the backend expects every field to be present.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectRequest {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    pub database: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub db_type: DatabaseType,
}

impl ConnectRequest {
    /// Create a request for a networked database using its default port.
    pub fn new(
        db_type: DatabaseType,
        host: impl Into<String>,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: db_type.default_port().unwrap_or(0),
            database: database.into(),
            username: username.into(),
            password: password.into(),
            db_type,
        }
    }

    /// Create a request for a SQLite database file.
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            host: String::new(),
            port: 0,
            database: path.into(),
            username: String::new(),
            password: String::new(),
            db_type: DatabaseType::Sqlite,
        }
    }

    /// Override the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Check required fields before dispatch.
    pub fn validate(&self) -> ApiResult<()> {
        if self.database.trim().is_empty() {
            let what = if self.db_type.is_networked() {
                "Database name"
            } else {
                "Database file path"
            };
            return Err(ApiError::validation(format!("{} is required", what)));
        }
        if self.db_type.is_networked() {
            if self.host.trim().is_empty() {
                return Err(ApiError::validation("Host is required"));
            }
            if self.port == 0 {
                return Err(ApiError::validation("Port must be between 1 and 65535"));
            }
            if self.username.trim().is_empty() {
                return Err(ApiError::validation("Username is required"));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for ConnectRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectRequest")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"***")
            .field("db_type", &self.db_type)
            .finish()
    }
}

/// Response of `POST /connect`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectResponse {
    pub token: String,
    pub database: String,
    pub db_type: DatabaseType,
}

/// Response of `GET /status`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusResponse {
    pub connected: bool,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub db_type: Option<DatabaseType>,
}

/// Response of `GET /database/info`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatabaseInfo {
    pub database: String,
    pub db_type: String,
    pub version: String,
    pub table_count: i64,
}
