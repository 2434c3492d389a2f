//! Connection lifecycle endpoints.

use crate::api::client::{ApiClient, Endpoint};
use crate::error::ApiResult;
use crate::models::{ConnectRequest, ConnectResponse, StatusResponse};
use serde_json::Value as JsonValue;
use tracing::{info, warn};

impl ApiClient {
    /// `POST /connect`. Stores the returned token on success.
    pub async fn connect(&self, request: &ConnectRequest) -> ApiResult<ConnectResponse> {
        request.validate()?;

        let response: ConnectResponse = self
            .post(Endpoint::new(["connect"]), Some(request))
            .await?;

        self.tokens().set(&response.token)?;
        info!(
            database = %response.database,
            db_type = %response.db_type,
            "Connected"
        );
        Ok(response)
    }

    /// `GET /status`.
    pub async fn status(&self) -> ApiResult<StatusResponse> {
        self.get(Endpoint::new(["status"])).await
    }

    /// `POST /disconnect`. Clears the stored token when the server acknowledges.
    pub async fn disconnect(&self) -> ApiResult<()> {
        let _: JsonValue = self
            .post::<JsonValue, JsonValue>(Endpoint::new(["disconnect"]), None)
            .await?;
        if let Err(e) = self.tokens().clear() {
            warn!(error = %e, "Failed to clear session token");
        }
        Ok(())
    }
}
