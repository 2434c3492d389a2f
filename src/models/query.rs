//! Ad-hoc SQL query models.

use crate::error::{ApiError, ApiResult};
use crate::models::data::Row;
use serde::{Deserialize, Serialize};

/// Body of `POST /query`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryRequest {
    pub sql: String,
}

impl QueryRequest {
    pub fn new(sql: impl Into<String>) -> Self {
        Self { sql: sql.into() }
    }

    pub fn validate(&self) -> ApiResult<()> {
        if self.sql.trim().is_empty() {
            return Err(ApiError::validation("Empty SQL statement"));
        }
        Ok(())
    }
}

/// Response of `POST /query`.
///
/// Reads carry `rows` and `row_count`; writes carry `message` and
/// `rows_affected`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Row>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,
}

impl QueryResult {
    /// Whether the statement returned a result set.
    pub fn has_rows(&self) -> bool {
        self.rows.is_some()
    }

    /// Column names across the returned rows, sorted by name.
    pub fn column_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for row in self.rows.iter().flatten() {
            for name in row.keys() {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
        names
    }
}
