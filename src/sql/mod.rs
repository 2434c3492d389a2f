//! Client-side analysis of ad-hoc SQL.
//!
//! Statements are parsed with [sqlparser](https://docs.rs/sqlparser/) in the
//! dialect of the connected database. The analysis decides which cache keys a
//! successful execution invalidates and whether the statement needs an
//! explicit confirmation before it is sent. It never rewrites or blocks SQL
//! the parser does not understand: such statements are sent as-is and treated
//! conservatively.

pub mod classify;
pub mod guard;

pub use classify::{StatementKind, StatementScope, classify_sql, dropped_tables, renamed_tables};
pub use guard::{DangerousOperation, check_dangerous_sql};

use crate::models::DatabaseType;
use sqlparser::ast::Statement;
use sqlparser::dialect::{Dialect, GenericDialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;
use tracing::debug;

/// Get the SQL dialect for the given database type.
///
/// Without a known session type the generic dialect is used.
pub fn dialect_for(db_type: Option<DatabaseType>) -> Box<dyn Dialect> {
    match db_type {
        Some(DatabaseType::Postgres) => Box::new(PostgreSqlDialect {}),
        Some(DatabaseType::Mysql) => Box::new(MySqlDialect {}),
        Some(DatabaseType::Sqlite) => Box::new(SQLiteDialect {}),
        None => Box::new(GenericDialect {}),
    }
}

/// Parse SQL into statements, or `None` if the parser rejects it.
pub(crate) fn parse(sql: &str, db_type: Option<DatabaseType>) -> Option<Vec<Statement>> {
    let dialect = dialect_for(db_type);
    match Parser::parse_sql(dialect.as_ref(), sql) {
        Ok(statements) if !statements.is_empty() => Some(statements),
        Ok(_) => None,
        Err(e) => {
            debug!(error = %e, "SQL not understood by the parser");
            None
        }
    }
}
