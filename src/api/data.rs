//! Row endpoints.

use crate::api::client::{ApiClient, Endpoint};
use crate::error::{ApiError, ApiResult};
use crate::models::{MutationResult, PaginatedRows, Row, RowKey, RowsQuery};

fn rows_endpoint(table: &str) -> ApiResult<Endpoint> {
    if table.trim().is_empty() {
        return Err(ApiError::validation("Table name is required"));
    }
    Ok(Endpoint::new(["table"]).segment(table))
}

impl ApiClient {
    /// `GET /table/{name}?page&limit&sort&order`.
    pub async fn table_rows(&self, table: &str, query: &RowsQuery) -> ApiResult<PaginatedRows> {
        query.validate()?;
        self.get(rows_endpoint(table)?.query(query.to_query_pairs()))
            .await
    }

    /// `POST /table/{name}`.
    pub async fn insert_row(&self, table: &str, row: &Row) -> ApiResult<MutationResult> {
        self.post(rows_endpoint(table)?, Some(row)).await
    }

    /// `PUT /table/{name}/{id}`.
    pub async fn update_row(&self, table: &str, key: &RowKey, row: &Row) -> ApiResult<MutationResult> {
        self.put(rows_endpoint(table)?.segment(key.as_str()), row)
            .await
    }

    /// `DELETE /table/{name}/{id}`.
    pub async fn delete_row(&self, table: &str, key: &RowKey) -> ApiResult<MutationResult> {
        self.delete(rows_endpoint(table)?.segment(key.as_str()))
            .await
    }
}
