//! Command-line commands.
//!
//! Each command runs against an [`AppContext`] and renders its outcome as a
//! string in the requested [`OutputFormat`].

use crate::cache::FetchPolicy;
use crate::context::AppContext;
use crate::error::{ApiError, ApiResult};
use crate::format::{
    OutputFormat, column_names, columns_to_rows, indexes_to_rows, ordered_columns, render_rows,
    tables_to_rows, to_json,
};
use crate::models::{
    AlterTableRequest, CellValue, ColumnDefinition, ConnectRequest, CreateTableRequest,
    DatabaseType, MutationResult, QueryRequest, Row, RowKey, RowsQuery, SortOrder,
};
use clap::Subcommand;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::warn;

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Connect the backend to a database
    Connect {
        /// Database type (postgres, mysql, sqlite)
        #[arg(long = "type", value_name = "TYPE")]
        db_type: DatabaseType,
        /// Database name, or file path for SQLite
        #[arg(long)]
        database: String,
        /// Server host (ignored for SQLite)
        #[arg(long, default_value = "localhost")]
        host: String,
        /// Server port (default: the database's standard port)
        #[arg(long)]
        port: Option<u16>,
        #[arg(short, long, default_value = "")]
        username: String,
        #[arg(long, env = "DBADMIN_PASSWORD", default_value = "", hide_env_values = true)]
        password: String,
    },
    /// Show the session state
    Status,
    /// Disconnect and forget the session token
    Disconnect,
    /// Show database information
    Info,
    /// List tables
    Tables,
    /// Show a table's columns, indexes and foreign keys
    Describe { table: String },
    /// List rows of a table
    Rows {
        table: String,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        limit: Option<u32>,
        /// Column to sort by
        #[arg(long)]
        sort: Option<String>,
        /// Sort direction (asc, desc)
        #[arg(long)]
        order: Option<SortOrder>,
    },
    /// Insert a row given as a JSON object
    Insert { table: String, row: String },
    /// Update the row with the given primary key
    Update { table: String, id: String, row: String },
    /// Delete the row with the given primary key
    Delete {
        table: String,
        id: String,
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Create a table from a JSON array of column definitions
    CreateTable { name: String, columns: String },
    /// Alter a table from a JSON change, e.g. {"alter_type":"RenameTable","new_name":"x"}
    AlterTable {
        table: String,
        change: String,
        /// Confirm destructive changes
        #[arg(long)]
        yes: bool,
    },
    /// Drop a table
    DropTable {
        table: String,
        /// Confirm the drop
        #[arg(long)]
        yes: bool,
    },
    /// Execute SQL
    Query {
        sql: String,
        /// Confirm dangerous statements
        #[arg(long)]
        yes: bool,
    },
}

impl Command {
    fn needs_connection(&self) -> bool {
        !matches!(self, Self::Connect { .. } | Self::Status | Self::Disconnect)
    }
}

fn parse_json<T: DeserializeOwned>(what: &str, raw: &str) -> ApiResult<T> {
    serde_json::from_str(raw).map_err(|e| ApiError::validation(format!("Invalid {}: {}", what, e)))
}

fn mutation_message(result: &MutationResult) -> String {
    format!("{} ({} rows affected)\n", result.message, result.rows_affected)
}

/// Run one command and render its output.
pub async fn run(ctx: &AppContext, command: Command, format: OutputFormat) -> ApiResult<String> {
    let session = ctx.start().await;
    if command.needs_connection() && !session.is_connected() {
        return Err(ApiError::validation(
            "Not connected. Run `dbadmin connect` first",
        ));
    }

    let store = ctx.store();
    let policy = FetchPolicy::default();

    match command {
        Command::Connect {
            db_type,
            database,
            host,
            port,
            username,
            password,
        } => {
            let mut request = match db_type {
                DatabaseType::Sqlite => ConnectRequest::sqlite(database),
                networked => ConnectRequest::new(networked, host, database, username, password),
            };
            if let Some(port) = port.filter(|_| db_type.is_networked()) {
                request = request.with_port(port);
            }
            let response = ctx.connect(&request).await?;
            Ok(format!(
                "Connected to {} ({})\n",
                response.database,
                response.db_type.display_name()
            ))
        }

        Command::Status => match format {
            OutputFormat::Json => Ok(to_json(&session)),
            _ => Ok(match (&session.database, session.db_type) {
                (Some(db), Some(t)) => {
                    format!("{} to {} ({})\n", session.status, db, t.display_name())
                }
                _ => format!("{}\n", session.status),
            }),
        },

        Command::Disconnect => {
            ctx.disconnect().await?;
            Ok("Disconnected\n".to_string())
        }

        Command::Info => {
            let info = store.database_info(policy).await?;
            if format == OutputFormat::Json {
                return Ok(to_json(info.as_ref()));
            }
            let rows: Vec<Row> = [
                ("database", CellValue::from(info.database.as_str())),
                ("type", CellValue::from(info.db_type.as_str())),
                ("version", CellValue::from(info.version.as_str())),
                ("tables", CellValue::from(info.table_count)),
            ]
            .into_iter()
            .map(|(property, value)| {
                Row::from([
                    ("property".to_string(), CellValue::from(property)),
                    ("value".to_string(), value),
                ])
            })
            .collect();
            Ok(render_rows(
                format,
                &["property".to_string(), "value".to_string()],
                &rows,
            ))
        }

        Command::Tables => {
            let tables = store.tables(policy).await?;
            if format == OutputFormat::Json {
                return Ok(to_json(tables.as_ref()));
            }
            let (columns, rows) = tables_to_rows(&tables);
            Ok(render_rows(format, &columns, &rows))
        }

        Command::Describe { table } => {
            ctx.workspace().select_table(Some(&table));
            let (columns, indexes, foreign_keys) = tokio::try_join!(
                store.columns(&table, policy),
                store.indexes(&table, policy),
                store.foreign_keys(&table, policy),
            )?;
            if format == OutputFormat::Json {
                return Ok(to_json(&json!({
                    "table": table,
                    "columns": columns.as_ref(),
                    "indexes": indexes.as_ref(),
                    "foreign_keys": foreign_keys.as_ref(),
                })));
            }
            let (names, rows) = columns_to_rows(&columns);
            let mut output = render_rows(format, &names, &rows);
            if !indexes.is_empty() {
                let (names, rows) = indexes_to_rows(&indexes);
                output.push('\n');
                output.push_str(&render_rows(format, &names, &rows));
            }
            for fk in foreign_keys.iter() {
                output.push_str(&format!(
                    "{}: {} -> {}.{}\n",
                    fk.constraint_name, fk.column_name, fk.foreign_table, fk.foreign_column
                ));
            }
            Ok(output)
        }

        Command::Rows {
            table,
            page,
            limit,
            sort,
            order,
        } => {
            let workspace = ctx.workspace();
            workspace.select_table(Some(&table));
            let defaults = workspace.state().rows_query;
            workspace.set_rows_query(RowsQuery {
                page: page.or(defaults.page),
                limit: limit.or(defaults.limit),
                sort,
                order,
            });
            let Some(result) = ctx.selected_rows(policy).await? else {
                return Ok(String::new());
            };
            if format == OutputFormat::Json {
                return Ok(to_json(result.as_ref()));
            }
            let columns = match store.columns(&table, policy).await {
                Ok(schema) => ordered_columns(&schema, &result.rows),
                Err(e) => {
                    warn!(table = %table, error = %e, "Could not load columns, sorting by name");
                    column_names(&result.rows)
                }
            };
            let mut output = render_rows(format, &columns, &result.rows);
            output.push_str(&format!("Page {} (limit {})\n", result.page, result.limit));
            Ok(output)
        }

        Command::Insert { table, row } => {
            let row: Row = parse_json("row", &row)?;
            let result = store.insert_row(&table, &row).await?;
            Ok(mutation_message(&result))
        }

        Command::Update { table, id, row } => {
            let row: Row = parse_json("row", &row)?;
            let key = RowKey::parse(id)?;
            let result = store.update_row(&table, &key, &row).await?;
            Ok(mutation_message(&result))
        }

        Command::Delete { table, id, yes } => {
            let key = RowKey::parse(id)?;
            let result = store.delete_row(&table, &key, yes).await?;
            Ok(mutation_message(&result))
        }

        Command::CreateTable { name, columns } => {
            let columns: Vec<ColumnDefinition> = parse_json("column definitions", &columns)?;
            let change = store
                .create_table(&CreateTableRequest::new(name, columns))
                .await?;
            Ok(format!("{}\n", change.message))
        }

        Command::AlterTable { table, change, yes } => {
            let request: AlterTableRequest = parse_json("table change", &change)?;
            let result = ctx.alter_table(&table, &request, yes).await?;
            Ok(mutation_message(&result))
        }

        Command::DropTable { table, yes } => {
            let change = ctx.drop_table(&table, yes).await?;
            Ok(format!("{}\n", change.message))
        }

        Command::Query { sql, yes } => {
            let result = ctx.execute_sql(&QueryRequest::new(sql), yes).await?;
            if format == OutputFormat::Json {
                return Ok(to_json(&result));
            }
            match &result.rows {
                Some(rows) => Ok(render_rows(format, &result.column_names(), rows)),
                None => Ok(format!(
                    "{} ({} rows affected)\n",
                    result.message.as_deref().unwrap_or("OK"),
                    result.rows_affected.unwrap_or(0)
                )),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_needing_connection() {
        assert!(!Command::Status.needs_connection());
        assert!(!Command::Disconnect.needs_connection());
        assert!(Command::Tables.needs_connection());
        assert!(
            Command::Query {
                sql: "SELECT 1".to_string(),
                yes: false
            }
            .needs_connection()
        );
    }

    #[test]
    fn test_parse_json_errors_are_validation() {
        let err = parse_json::<Row>("row", "{not json").unwrap_err();
        assert!(matches!(err, ApiError::Validation { .. }));
        assert!(err.to_string().contains("Invalid row"));
    }

    #[test]
    fn test_mutation_message() {
        let result = MutationResult {
            message: "Row inserted".to_string(),
            rows_affected: 1,
        };
        assert_eq!(mutation_message(&result), "Row inserted (1 rows affected)\n");
    }
}
