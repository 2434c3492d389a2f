//! Data models for the database admin client.
//!
//! This module re-exports all wire and domain types used throughout the crate.

pub mod connection;
pub mod data;
pub mod query;
pub mod schema;

// Re-export commonly used types
pub use connection::{ConnectRequest, ConnectResponse, DatabaseInfo, DatabaseType, StatusResponse};
pub use data::{
    CellValue, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, MutationResult, PaginatedRows, Row, RowIdentity,
    RowKey, RowWrite, RowsQuery, SortOrder, row_key, validate_row,
};
pub use query::{QueryRequest, QueryResult};
pub use schema::{
    AlterTableRequest, ColumnDefinition, ColumnInfo, ColumnList, CreateTableRequest,
    ForeignKeyInfo, ForeignKeyList, IndexInfo, IndexList, TableChange, TableInfo, TableList,
    primary_key_column,
};
