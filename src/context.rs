//! Application context.
//!
//! One [`AppContext`] is built at startup and handed to every consumer. It
//! owns the API client, the cache, the session and the view selection, and
//! coordinates them where an operation touches more than one: connecting or
//! disconnecting drops all cached data, dropping or renaming a table updates
//! the selection.

use crate::api::ApiClient;
use crate::cache::{CacheSettings, FetchPolicy, QueryCache};
use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    AlterTableRequest, ConnectRequest, ConnectResponse, MutationResult, PaginatedRows,
    QueryRequest, QueryResult, TableChange,
};
use crate::session::{FileTokenStore, Session, SessionManager, TokenStore};
use crate::sql::{dropped_tables, renamed_tables};
use crate::store::DataStore;
use crate::workspace::Workspace;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub struct AppContext {
    api: ApiClient,
    cache: QueryCache,
    session: SessionManager,
    store: DataStore,
    workspace: Workspace,
    gc_task: OnceLock<JoinHandle<()>>,
}

impl AppContext {
    pub fn new(
        api_url: &str,
        tokens: Arc<dyn TokenStore>,
        settings: CacheSettings,
        timeout: Option<Duration>,
    ) -> ApiResult<Self> {
        let api = ApiClient::new(api_url, tokens, timeout)?;
        let cache = QueryCache::new(settings);
        Ok(Self {
            session: SessionManager::new(api.clone()),
            store: DataStore::new(api.clone(), cache.clone()),
            workspace: Workspace::new(),
            api,
            cache,
            gc_task: OnceLock::new(),
        })
    }

    /// Build the context from the command line, with a file-backed token store.
    pub fn from_config(config: &Config) -> ApiResult<Self> {
        let options = config.cache_options();
        options.validate().map_err(ApiError::validation)?;
        let tokens = Arc::new(FileTokenStore::new(config.token_file_or_default()));
        Self::new(
            &config.api_url,
            tokens,
            options.settings(),
            config.request_timeout_duration(),
        )
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn store(&self) -> &DataStore {
        &self.store
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Start background work and resolve the initial session state.
    pub async fn start(&self) -> Session {
        self.gc_task.get_or_init(|| self.cache.start_gc_task());
        self.session.start().await
    }

    pub async fn check_status(&self) -> Session {
        self.session.check_status().await
    }

    /// Connect to a database. Data cached for a previous session is dropped.
    pub async fn connect(&self, request: &ConnectRequest) -> ApiResult<ConnectResponse> {
        let response = self.session.connect(request).await?;
        self.cache.clear().await;
        self.workspace.reset();
        Ok(response)
    }

    /// Disconnect. Local state is cleared even if the server call fails.
    pub async fn disconnect(&self) -> ApiResult<()> {
        let result = self.session.disconnect().await;
        self.cache.clear().await;
        self.workspace.reset();
        result
    }

    /// Drop a table and clear the selection if it pointed at it.
    pub async fn drop_table(&self, table: &str, confirmed: bool) -> ApiResult<TableChange> {
        let change = self.store.drop_table(table, confirmed).await?;
        self.workspace.table_dropped(table);
        Ok(change)
    }

    /// Alter a table; a rename moves the selection along.
    pub async fn alter_table(
        &self,
        table: &str,
        request: &AlterTableRequest,
        confirmed: bool,
    ) -> ApiResult<MutationResult> {
        let result = self.store.alter_table(table, request, confirmed).await?;
        if let Some(new_name) = request.renamed_to() {
            self.workspace.table_renamed(table, new_name);
        }
        Ok(result)
    }

    /// Execute SQL in the session's dialect.
    ///
    /// Tables the batch drops leave the selection and renamed tables carry it
    /// along. When the batch cannot be parsed the selection is checked against
    /// a fresh table listing instead.
    pub async fn execute_sql(&self, request: &QueryRequest, confirmed: bool) -> ApiResult<QueryResult> {
        let db_type = self.session.db_type();
        let result = self.store.execute_sql(request, db_type, confirmed).await?;
        match (
            dropped_tables(&request.sql, db_type),
            renamed_tables(&request.sql, db_type),
        ) {
            (Some(dropped), Some(renamed)) => {
                for table in dropped {
                    self.workspace.table_dropped(&table);
                }
                for (old, new) in renamed {
                    self.workspace.table_renamed(&old, &new);
                }
            }
            _ => self.reconcile_selection().await,
        }
        Ok(result)
    }

    /// Clear the selection if its table no longer exists on the server.
    async fn reconcile_selection(&self) {
        let Some(selected) = self.workspace.selected_table() else {
            return;
        };
        match self.store.tables(FetchPolicy::ForceFresh).await {
            Ok(tables) => {
                if !tables.iter().any(|t| t.name == selected) {
                    self.workspace.table_dropped(&selected);
                }
            }
            Err(e) => warn!(table = %selected, error = %e, "Could not verify selected table"),
        }
    }

    /// Rows of the selected table with the current listing parameters.
    ///
    /// Returns `None` when nothing is selected, or when the selection changed
    /// while the page was loading; such results belong to a view that no
    /// longer exists and are discarded.
    pub async fn selected_rows(&self, policy: FetchPolicy) -> ApiResult<Option<Arc<PaginatedRows>>> {
        let ticket = self.workspace.ticket();
        let Some(table) = ticket.table.as_deref() else {
            return Ok(None);
        };
        let rows = self.store.rows(table, &ticket.rows_query, policy).await?;
        if !self.workspace.is_current(&ticket) {
            debug!(table, "View changed while loading rows, discarding result");
            return Ok(None);
        }
        Ok(Some(rows))
    }
}

impl Drop for AppContext {
    fn drop(&mut self) {
        if let Some(task) = self.gc_task.get() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("api", &self.api)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
