//! Cached reads and invalidating mutations.
//!
//! [`DataStore`] is the layer consumers talk to. Reads go through the
//! [`QueryCache`]; mutations go straight to the backend and, only once they
//! succeed, invalidate the keys their [`InvalidationPlan`] names. A failed
//! mutation leaves the cache exactly as it was.

use crate::api::ApiClient;
use crate::cache::{FetchPolicy, InvalidationPlan, QueryCache, QueryKey};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    AlterTableRequest, ColumnInfo, CreateTableRequest, DatabaseInfo, DatabaseType, ForeignKeyInfo,
    IndexInfo, MutationResult, PaginatedRows, QueryRequest, QueryResult, Row, RowKey, RowWrite,
    RowsQuery, TableChange, TableInfo, primary_key_column, row_key, validate_row,
};
use crate::sql::{check_dangerous_sql, classify_sql};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

const DELETE_ROW_REASON: &str = "This will permanently delete the row";
const DROP_TABLE_REASON: &str = "This will permanently delete the table and all its data";
const DROP_COLUMN_REASON: &str = "This will permanently delete the column and all its data";

#[derive(Debug, Clone)]
pub struct DataStore {
    api: ApiClient,
    cache: QueryCache,
}

impl DataStore {
    pub fn new(api: ApiClient, cache: QueryCache) -> Self {
        Self { api, cache }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    async fn read<T, F, Fut>(&self, key: QueryKey, policy: FetchPolicy, op: F) -> ApiResult<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: Fn(ApiClient) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        let api = self.api.clone();
        self.cache.fetch(key, policy, move || op(api.clone())).await
    }

    async fn invalidate(&self, operation: &str, plan: InvalidationPlan) {
        let count = self.cache.apply(&plan).await;
        debug!(operation, invalidated = count, "Applied invalidation plan");
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn tables(&self, policy: FetchPolicy) -> ApiResult<Arc<Vec<TableInfo>>> {
        self.read(QueryKey::Tables, policy, |api| async move {
            api.list_tables().await
        })
        .await
    }

    pub async fn database_info(&self, policy: FetchPolicy) -> ApiResult<Arc<DatabaseInfo>> {
        self.read(QueryKey::DatabaseInfo, policy, |api| async move {
            api.database_info().await
        })
        .await
    }

    pub async fn columns(&self, table: &str, policy: FetchPolicy) -> ApiResult<Arc<Vec<ColumnInfo>>> {
        let name = table.to_string();
        self.read(QueryKey::columns(table), policy, move |api| {
            let table = name.clone();
            async move { api.table_columns(&table).await }
        })
        .await
    }

    pub async fn indexes(&self, table: &str, policy: FetchPolicy) -> ApiResult<Arc<Vec<IndexInfo>>> {
        let name = table.to_string();
        self.read(QueryKey::indexes(table), policy, move |api| {
            let table = name.clone();
            async move { api.table_indexes(&table).await }
        })
        .await
    }

    pub async fn foreign_keys(
        &self,
        table: &str,
        policy: FetchPolicy,
    ) -> ApiResult<Arc<Vec<ForeignKeyInfo>>> {
        let name = table.to_string();
        self.read(QueryKey::foreign_keys(table), policy, move |api| {
            let table = name.clone();
            async move { api.table_foreign_keys(&table).await }
        })
        .await
    }

    /// One page of rows. Each distinct page/limit/sort/order is its own cache entry.
    pub async fn rows(
        &self,
        table: &str,
        query: &RowsQuery,
        policy: FetchPolicy,
    ) -> ApiResult<Arc<PaginatedRows>> {
        query.validate()?;
        let name = table.to_string();
        let params = query.clone();
        self.read(QueryKey::rows(table, query.clone()), policy, move |api| {
            let table = name.clone();
            let query = params.clone();
            async move { api.table_rows(&table, &query).await }
        })
        .await
    }

    /// Primary key of a displayed row, rejecting tables without one.
    pub async fn row_key_for(&self, table: &str, row: &Row) -> ApiResult<RowKey> {
        let columns = self.columns(table, FetchPolicy::default()).await?;
        row_key(table, row, &columns)
    }

    async fn require_primary_key(&self, table: &str) -> ApiResult<Arc<Vec<ColumnInfo>>> {
        let columns = self.columns(table, FetchPolicy::default()).await?;
        if primary_key_column(&columns).is_none() {
            return Err(ApiError::missing_primary_key(table));
        }
        Ok(columns)
    }

    // =========================================================================
    // Schema mutations
    // =========================================================================

    pub async fn create_table(&self, request: &CreateTableRequest) -> ApiResult<TableChange> {
        let change = self.api.create_table(request).await?;
        info!(table = %request.name, "Table created");
        self.invalidate("create_table", InvalidationPlan::create_table())
            .await;
        Ok(change)
    }

    /// Alter a table. Dropping a column requires `confirmed`.
    pub async fn alter_table(
        &self,
        table: &str,
        request: &AlterTableRequest,
        confirmed: bool,
    ) -> ApiResult<MutationResult> {
        if request.is_destructive() && !confirmed {
            return Err(ApiError::confirmation_required(
                request.operation_name(),
                DROP_COLUMN_REASON,
            ));
        }
        let result = self.api.alter_table(table, request).await?;
        info!(table, operation = request.operation_name(), "Table altered");
        self.invalidate("alter_table", InvalidationPlan::alter_table(table, request))
            .await;
        Ok(result)
    }

    /// Drop a table. Requires `confirmed`.
    pub async fn drop_table(&self, table: &str, confirmed: bool) -> ApiResult<TableChange> {
        if !confirmed {
            return Err(ApiError::confirmation_required("DROP TABLE", DROP_TABLE_REASON));
        }
        let change = self.api.drop_table(table).await?;
        info!(table, "Table dropped");
        self.invalidate("drop_table", InvalidationPlan::drop_table(table))
            .await;
        Ok(change)
    }

    // =========================================================================
    // Row mutations
    // =========================================================================

    pub async fn insert_row(&self, table: &str, row: &Row) -> ApiResult<MutationResult> {
        let columns = self.columns(table, FetchPolicy::default()).await?;
        validate_row(row, &columns, RowWrite::Insert)?;
        let result = self.api.insert_row(table, row).await?;
        info!(table, rows_affected = result.rows_affected, "Row inserted");
        self.invalidate("insert_row", InvalidationPlan::row_change(table))
            .await;
        Ok(result)
    }

    pub async fn update_row(&self, table: &str, key: &RowKey, row: &Row) -> ApiResult<MutationResult> {
        let columns = self.require_primary_key(table).await?;
        validate_row(row, &columns, RowWrite::Update)?;
        let result = self.api.update_row(table, key, row).await?;
        info!(table, key = %key, rows_affected = result.rows_affected, "Row updated");
        self.invalidate("update_row", InvalidationPlan::row_change(table))
            .await;
        Ok(result)
    }

    /// Delete a row by primary key. Requires `confirmed`.
    pub async fn delete_row(&self, table: &str, key: &RowKey, confirmed: bool) -> ApiResult<MutationResult> {
        if !confirmed {
            return Err(ApiError::confirmation_required("DELETE ROW", DELETE_ROW_REASON));
        }
        self.require_primary_key(table).await?;
        let result = self.api.delete_row(table, key).await?;
        info!(table, key = %key, rows_affected = result.rows_affected, "Row deleted");
        self.invalidate("delete_row", InvalidationPlan::row_change(table))
            .await;
        Ok(result)
    }

    // =========================================================================
    // Ad-hoc SQL
    // =========================================================================

    /// Execute SQL. Statements the guard flags as dangerous require `confirmed`.
    ///
    /// Invalidation is scoped by what the statements can have changed.
    pub async fn execute_sql(
        &self,
        request: &QueryRequest,
        db_type: Option<DatabaseType>,
        confirmed: bool,
    ) -> ApiResult<QueryResult> {
        request.validate()?;
        if !confirmed {
            if let Some(operation) = check_dangerous_sql(&request.sql, db_type) {
                return Err(operation.confirmation_error());
            }
        }

        let result = self.api.execute_sql(request).await?;
        let scope = classify_sql(&request.sql, db_type);
        info!(scope = ?scope, rows_affected = ?result.rows_affected, "SQL executed");
        self.invalidate("execute_sql", InvalidationPlan::sql(scope))
            .await;
        Ok(result)
    }
}
