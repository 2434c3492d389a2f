//! Session state machine.
//!
//! ```text
//! Uninitialized ──start()──▶ Checking ──probe──▶ Connected
//!                                   └────────────▶ Disconnected
//! ```
//!
//! The current [`Session`] is published on a `tokio::sync::watch` channel.
//! Only actual changes are published, and a re-check while connected never
//! passes through `Checking`, so observers see no flicker.

pub mod token;

pub use token::{FileTokenStore, MemoryTokenStore, TOKEN_KEY, TokenStore};

use crate::api::ApiClient;
use crate::error::ApiResult;
use crate::models::{ConnectRequest, ConnectResponse, DatabaseType};
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tracing::{info, warn};

/// Connection status of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Uninitialized,
    Checking,
    Connected,
    Disconnected,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Checking => write!(f, "checking"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Observable session state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Session {
    pub status: SessionStatus,
    pub database: Option<String>,
    pub db_type: Option<DatabaseType>,
}

impl Session {
    fn with_status(status: SessionStatus) -> Self {
        Self {
            status,
            database: None,
            db_type: None,
        }
    }

    fn connected(database: Option<String>, db_type: Option<DatabaseType>) -> Self {
        Self {
            status: SessionStatus::Connected,
            database,
            db_type,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == SessionStatus::Connected
    }
}

/// Drives the session state machine against the backend.
pub struct SessionManager {
    api: ApiClient,
    state: watch::Sender<Session>,
    /// Serializes status probes
    probe: Mutex<()>,
}

impl SessionManager {
    pub fn new(api: ApiClient) -> Self {
        let (state, _) = watch::channel(Session::default());
        Self {
            api,
            state,
            probe: Mutex::new(()),
        }
    }

    /// Current state.
    pub fn state(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().is_connected()
    }

    /// Database type of the connected session, if any.
    pub fn db_type(&self) -> Option<DatabaseType> {
        self.state.borrow().db_type
    }

    fn transition(&self, next: Session) {
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next.clone();
            true
        });
        if changed {
            info!(
                status = %next.status,
                database = next.database.as_deref().unwrap_or(""),
                "Session state changed"
            );
        }
    }

    /// Initial transition out of `Uninitialized`.
    pub async fn start(&self) -> Session {
        if self.state.borrow().status == SessionStatus::Uninitialized {
            self.transition(Session::with_status(SessionStatus::Checking));
        }
        self.check_status().await
    }

    /// Validate the stored token against the backend.
    ///
    /// While connected, the state stays `Connected` during the probe and is
    /// only replaced by the probe's outcome.
    pub async fn check_status(&self) -> Session {
        let _probe = self.probe.lock().await;

        if !self.api.has_token() {
            self.transition(Session::with_status(SessionStatus::Disconnected));
            return self.state();
        }

        if !self.is_connected() {
            self.transition(Session::with_status(SessionStatus::Checking));
        }

        match self.api.status().await {
            Ok(status) if status.connected => {
                self.transition(Session::connected(status.database, status.db_type));
            }
            Ok(_) => {
                info!("Backend reports no active connection");
                self.drop_token();
                self.transition(Session::with_status(SessionStatus::Disconnected));
            }
            Err(e) => {
                warn!(error = %e, "Status probe failed");
                self.drop_token();
                self.transition(Session::with_status(SessionStatus::Disconnected));
            }
        }
        self.state()
    }

    /// Open a backend connection. On failure the state is left as it was.
    pub async fn connect(&self, request: &ConnectRequest) -> ApiResult<ConnectResponse> {
        let response = self.api.connect(request).await?;
        self.transition(Session::connected(
            Some(response.database.clone()),
            Some(response.db_type),
        ));
        Ok(response)
    }

    /// Close the session.
    ///
    /// The server is notified on a best-effort basis; the local token is
    /// cleared and the state becomes `Disconnected` regardless.
    pub async fn disconnect(&self) -> ApiResult<()> {
        if let Err(e) = self.api.disconnect().await {
            warn!(error = %e, "Server disconnect failed, logging out locally");
        }
        let cleared = self.api.tokens().clear();
        self.transition(Session::with_status(SessionStatus::Disconnected));
        cleared
    }

    fn drop_token(&self) {
        if let Err(e) = self.api.tokens().clear() {
            warn!(error = %e, "Failed to clear session token");
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}
