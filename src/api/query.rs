//! Ad-hoc SQL endpoint.

use crate::api::client::{ApiClient, Endpoint};
use crate::error::ApiResult;
use crate::models::{QueryRequest, QueryResult};

impl ApiClient {
    /// `POST /query`.
    pub async fn execute_sql(&self, request: &QueryRequest) -> ApiResult<QueryResult> {
        request.validate()?;
        self.post(Endpoint::new(["query"]), Some(request)).await
    }
}
