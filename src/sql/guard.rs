//! Dangerous statement detection for ad-hoc SQL.
//!
//! Detection works on the AST, so formatting tricks and comments do not hide
//! a statement. SQL the parser rejects cannot be vetted, so it is reported
//! as [`DangerousOperation::Unrecognized`] and needs the same confirmation.

use crate::error::ApiError;
use crate::models::DatabaseType;
use crate::sql::parse;
use sqlparser::ast::{AlterTableOperation, ObjectType, Statement};

/// Type of dangerous SQL operation detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DangerousOperation {
    /// DROP DATABASE or DROP SCHEMA statement
    DropDatabase,
    /// DROP TABLE statement
    DropTable,
    /// DROP INDEX statement
    DropIndex,
    /// ALTER TABLE DROP COLUMN statement
    AlterTableDropColumn,
    /// TRUNCATE TABLE statement
    Truncate,
    /// DELETE without WHERE clause
    DeleteWithoutWhere,
    /// UPDATE without WHERE clause
    UpdateWithoutWhere,
    /// SQL the parser could not read
    Unrecognized,
}

impl DangerousOperation {
    /// Get the operation name for confirmation prompts.
    pub fn operation_name(&self) -> &'static str {
        match self {
            Self::DropDatabase => "DROP DATABASE",
            Self::DropTable => "DROP TABLE",
            Self::DropIndex => "DROP INDEX",
            Self::AlterTableDropColumn => "ALTER TABLE DROP COLUMN",
            Self::Truncate => "TRUNCATE",
            Self::DeleteWithoutWhere => "DELETE without WHERE",
            Self::UpdateWithoutWhere => "UPDATE without WHERE",
            Self::Unrecognized => "Unrecognized SQL",
        }
    }

    /// Get the reason why this operation is dangerous.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::DropDatabase => {
                "This will permanently delete the entire database and all its data"
            }
            Self::DropTable => "This will permanently delete the table and all its data",
            Self::DropIndex => "This will permanently delete the index",
            Self::AlterTableDropColumn => {
                "This will permanently delete the column and all its data"
            }
            Self::Truncate => "This will remove all rows from the table",
            Self::DeleteWithoutWhere => "This will delete all rows from the table",
            Self::UpdateWithoutWhere => "This will update all rows in the table",
            Self::Unrecognized => {
                "The statement could not be analyzed and may modify or delete data"
            }
        }
    }

    /// The error returned when the operation was not confirmed.
    pub fn confirmation_error(&self) -> ApiError {
        ApiError::confirmation_required(self.operation_name(), self.reason())
    }
}

/// Find the first dangerous statement in a SQL batch.
///
/// # Examples
///
/// ```
/// use db_admin_client::models::DatabaseType;
/// use db_admin_client::sql::{check_dangerous_sql, DangerousOperation};
///
/// let pg = Some(DatabaseType::Postgres);
/// assert_eq!(check_dangerous_sql("DROP TABLE users", pg), Some(DangerousOperation::DropTable));
/// assert_eq!(
///     check_dangerous_sql("DELETE FROM users", pg),
///     Some(DangerousOperation::DeleteWithoutWhere)
/// );
/// assert_eq!(check_dangerous_sql("DELETE FROM users WHERE id = 1", pg), None);
/// assert_eq!(
///     check_dangerous_sql("DROP TABLE users; FROBNICATE", pg),
///     Some(DangerousOperation::Unrecognized)
/// );
/// ```
pub fn check_dangerous_sql(sql: &str, db_type: Option<DatabaseType>) -> Option<DangerousOperation> {
    let Some(statements) = parse(sql, db_type) else {
        return Some(DangerousOperation::Unrecognized);
    };
    statements.iter().find_map(check_statement)
}

fn check_statement(stmt: &Statement) -> Option<DangerousOperation> {
    match stmt {
        Statement::Drop { object_type, .. } => match object_type {
            ObjectType::Table => Some(DangerousOperation::DropTable),
            ObjectType::Index => Some(DangerousOperation::DropIndex),
            ObjectType::Database | ObjectType::Schema => Some(DangerousOperation::DropDatabase),
            _ => None,
        },

        Statement::AlterTable(alter_table) => alter_table
            .operations
            .iter()
            .any(|op| matches!(op, AlterTableOperation::DropColumn { .. }))
            .then_some(DangerousOperation::AlterTableDropColumn),

        Statement::Truncate { .. } => Some(DangerousOperation::Truncate),

        Statement::Delete(delete) if delete.selection.is_none() => {
            Some(DangerousOperation::DeleteWithoutWhere)
        }

        Statement::Update(update) if update.selection.is_none() => {
            Some(DangerousOperation::UpdateWithoutWhere)
        }

        _ => None,
    }
}
