//! Schema endpoints: table listing, per-table metadata and DDL.

use crate::api::client::{ApiClient, Endpoint};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    AlterTableRequest, ColumnInfo, ColumnList, CreateTableRequest, ForeignKeyInfo, ForeignKeyList,
    IndexInfo, IndexList, MutationResult, TableChange, TableInfo, TableList,
};

fn table_endpoint(table: &str) -> ApiResult<Endpoint> {
    if table.trim().is_empty() {
        return Err(ApiError::validation("Table name is required"));
    }
    Ok(Endpoint::new(["schema", "table"]).segment(table))
}

impl ApiClient {
    /// `GET /schema/tables`.
    pub async fn list_tables(&self) -> ApiResult<Vec<TableInfo>> {
        let list: TableList = self.get(Endpoint::new(["schema", "tables"])).await?;
        Ok(list.tables)
    }

    /// `GET /schema/table/{name}`.
    pub async fn table_columns(&self, table: &str) -> ApiResult<Vec<ColumnInfo>> {
        let list: ColumnList = self.get(table_endpoint(table)?).await?;
        Ok(list.columns)
    }

    /// `GET /schema/table/{name}/indexes`.
    pub async fn table_indexes(&self, table: &str) -> ApiResult<Vec<IndexInfo>> {
        let list: IndexList = self.get(table_endpoint(table)?.segment("indexes")).await?;
        Ok(list.indexes)
    }

    /// `GET /schema/table/{name}/foreign-keys`.
    pub async fn table_foreign_keys(&self, table: &str) -> ApiResult<Vec<ForeignKeyInfo>> {
        let list: ForeignKeyList = self
            .get(table_endpoint(table)?.segment("foreign-keys"))
            .await?;
        Ok(list.foreign_keys)
    }

    /// `POST /schema/table`.
    pub async fn create_table(&self, request: &CreateTableRequest) -> ApiResult<TableChange> {
        request.validate()?;
        self.post(Endpoint::new(["schema", "table"]), Some(request))
            .await
    }

    /// `PUT /schema/table/{name}`.
    pub async fn alter_table(
        &self,
        table: &str,
        request: &AlterTableRequest,
    ) -> ApiResult<MutationResult> {
        request.validate()?;
        self.put(table_endpoint(table)?, request).await
    }

    /// `DELETE /schema/table/{name}`.
    pub async fn drop_table(&self, table: &str) -> ApiResult<TableChange> {
        self.delete(table_endpoint(table)?).await
    }
}
