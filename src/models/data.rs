//! Row data models.
//!
//! Rows are open maps from column name to a tagged [`CellValue`]. They are
//! checked against the table's column metadata before being sent, and rows
//! are only ever targeted for edit/delete through their primary key.

use crate::error::{ApiError, ApiResult};
use crate::models::schema::{ColumnInfo, primary_key_column};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Default page size for row listings.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Maximum page size accepted by the client.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    /// Arrays and objects returned for JSON columns
    Json(JsonValue),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this value for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Json(_) => "json",
        }
    }

    /// Render the value for display.
    pub fn display(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => n.to_string(),
            Self::String(s) => s.clone(),
            Self::Json(v) => v.to_string(),
        }
    }
}

impl From<JsonValue> for CellValue {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(b),
            JsonValue::Number(n) => Self::Number(n),
            JsonValue::String(s) => Self::String(s),
            other => Self::Json(other),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// A table row keyed by column name.
pub type Row = BTreeMap<String, CellValue>;

/// Primary key value of a row, the only identity safe for edits and deletes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowKey(String);

impl RowKey {
    /// Build a key from a cell value. Only strings and numbers can address a row.
    pub fn from_value(value: &CellValue) -> ApiResult<Self> {
        match value {
            CellValue::String(s) if !s.is_empty() => Ok(Self(s.clone())),
            CellValue::Number(n) => Ok(Self(n.to_string())),
            other => Err(ApiError::validation(format!(
                "A {} value cannot identify a row",
                other.type_name()
            ))),
        }
    }

    /// Build a key from a raw id, e.g. one typed on the command line.
    pub fn parse(raw: impl Into<String>) -> ApiResult<Self> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(ApiError::validation("Row id is required"));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a row in a listing.
///
/// `Position` is what a grid falls back to when the table has no primary key.
/// It changes across refetch and sort, so it is never accepted for mutations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RowIdentity {
    Key(RowKey),
    Position(usize),
}

impl RowIdentity {
    /// Identify a row by primary key, falling back to its position.
    pub fn for_row(row: &Row, columns: &[ColumnInfo], index: usize) -> Self {
        primary_key_column(columns)
            .and_then(|pk| row.get(&pk.name))
            .and_then(|value| RowKey::from_value(value).ok())
            .map(Self::Key)
            .unwrap_or(Self::Position(index))
    }

    /// Convert into a key usable for mutations.
    pub fn into_key(self, table: &str) -> ApiResult<RowKey> {
        match self {
            Self::Key(key) => Ok(key),
            Self::Position(_) => Err(ApiError::missing_primary_key(table)),
        }
    }
}

/// Resolve the primary key of a row, rejecting tables without one.
pub fn row_key(table: &str, row: &Row, columns: &[ColumnInfo]) -> ApiResult<RowKey> {
    let pk = primary_key_column(columns).ok_or_else(|| ApiError::missing_primary_key(table))?;
    let value = row.get(&pk.name).ok_or_else(|| {
        ApiError::validation(format!("Row has no value for primary key '{}'", pk.name))
    })?;
    RowKey::from_value(value)
}

/// Kind of write a row is validated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowWrite {
    Insert,
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Integer,
    Decimal,
    Boolean,
    Other,
}

impl ColumnKind {
    fn of(data_type: &str) -> Self {
        let lower = data_type.to_ascii_lowercase();
        let base = lower.split('(').next().unwrap_or("").trim();
        match base {
            "int" | "integer" | "smallint" | "bigint" | "tinyint" | "mediumint" | "int2"
            | "int4" | "int8" | "serial" | "bigserial" | "smallserial" => Self::Integer,
            "decimal" | "numeric" | "real" | "float" | "float4" | "float8" | "double"
            | "double precision" => Self::Decimal,
            "bool" | "boolean" => Self::Boolean,
            _ => Self::Other,
        }
    }

    fn accepts(&self, value: &CellValue) -> bool {
        match (self, value) {
            (_, CellValue::Null) => true,
            (Self::Other, _) => true,
            (Self::Integer, CellValue::Number(n)) => n.is_i64() || n.is_u64(),
            (Self::Integer, CellValue::String(s)) => s.trim().parse::<i64>().is_ok(),
            (Self::Decimal, CellValue::Number(_)) => true,
            (Self::Decimal, CellValue::String(s)) => s.trim().parse::<f64>().is_ok(),
            (Self::Boolean, CellValue::Bool(_)) => true,
            (Self::Boolean, CellValue::Number(n)) => matches!(n.as_i64(), Some(0 | 1)),
            (Self::Boolean, CellValue::String(s)) => matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "true" | "false" | "t" | "f" | "1" | "0"
            ),
            _ => false,
        }
    }
}

/// Validate a row against the table's columns before sending it.
pub fn validate_row(row: &Row, columns: &[ColumnInfo], write: RowWrite) -> ApiResult<()> {
    if row.is_empty() {
        return Err(ApiError::validation(match write {
            RowWrite::Insert => "Cannot insert an empty row",
            RowWrite::Update => "No changes to save",
        }));
    }

    for (name, value) in row {
        let column = columns
            .iter()
            .find(|c| &c.name == name)
            .ok_or_else(|| ApiError::validation(format!("Unknown column '{}'", name)))?;

        if value.is_null() && !column.nullable && !column.has_default() {
            return Err(ApiError::validation(format!(
                "Column '{}' cannot be NULL",
                name
            )));
        }

        if !ColumnKind::of(&column.data_type).accepts(value) {
            return Err(ApiError::validation(format!(
                "Column '{}' ({}) cannot hold {} value '{}'",
                name,
                column.data_type,
                value.type_name(),
                value.display()
            )));
        }
    }

    Ok(())
}

/// Sort direction for row listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl std::str::FromStr for SortOrder {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(ApiError::validation(format!(
                "Invalid sort order '{}'. Expected asc or desc",
                other
            ))),
        }
    }
}

/// Pagination and sorting parameters of a row listing.
///
/// Unset fields are left to the backend's defaults, so `RowsQuery::default()`
/// and an explicit first page are distinct cache entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowsQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<SortOrder>,
}

impl RowsQuery {
    pub fn page(page: u32, limit: u32) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn sorted_by(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some(column.into());
        self.order = Some(order);
        self
    }

    /// Check the parameters before dispatch.
    pub fn validate(&self) -> ApiResult<()> {
        if self.page == Some(0) {
            return Err(ApiError::validation("Page numbers start at 1"));
        }
        if let Some(limit) = self.limit {
            if limit == 0 || limit > MAX_PAGE_SIZE {
                return Err(ApiError::validation(format!(
                    "Limit must be between 1 and {}",
                    MAX_PAGE_SIZE
                )));
            }
        }
        if self.sort.as_deref().is_some_and(|s| s.trim().is_empty()) {
            return Err(ApiError::validation("Sort column cannot be empty"));
        }
        Ok(())
    }

    /// Query string pairs in the order the backend documents them.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(sort) = &self.sort {
            pairs.push(("sort", sort.clone()));
        }
        if let Some(order) = self.order {
            pairs.push(("order", order.as_str().to_string()));
        }
        pairs
    }
}

/// Response of `GET /table/{name}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginatedRows {
    pub rows: Vec<Row>,
    pub page: u32,
    pub limit: u32,
}

/// Response of row and alter mutations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationResult {
    pub message: String,
    pub rows_affected: u64,
}
