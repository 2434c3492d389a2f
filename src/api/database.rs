//! Database information endpoint.

use crate::api::client::{ApiClient, Endpoint};
use crate::error::ApiResult;
use crate::models::DatabaseInfo;

impl ApiClient {
    /// `GET /database/info`.
    pub async fn database_info(&self) -> ApiResult<DatabaseInfo> {
        self.get(Endpoint::new(["database", "info"])).await
    }
}
