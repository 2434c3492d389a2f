//! Statement classification for cache invalidation.

use crate::models::DatabaseType;
use crate::sql::parse;
use sqlparser::ast::{AlterTableOperation, ObjectName, ObjectType, RenameTableNameKind, Statement};

/// Kind of a single SQL statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// SELECT, SHOW, EXPLAIN and friends
    Read,
    /// INSERT, UPDATE, DELETE, MERGE, COPY
    Dml,
    /// CREATE, DROP, ALTER, TRUNCATE, COMMENT
    Ddl,
    /// BEGIN, COMMIT, ROLLBACK, SAVEPOINT
    Transaction,
    /// Anything else, including administrative statements
    Other,
}

/// What a batch of statements can have changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StatementScope {
    /// Nothing: only reads
    ReadOnly,
    /// Row data only
    Data,
    /// Schema or anything the client cannot reason about
    Schema,
}

/// Classify a parsed statement.
pub fn classify_statement(stmt: &Statement) -> StatementKind {
    match stmt {
        Statement::Query(_)
        | Statement::ShowTables { .. }
        | Statement::ShowColumns { .. }
        | Statement::ShowDatabases { .. }
        | Statement::ShowSchemas { .. }
        | Statement::ShowCreate { .. }
        | Statement::ShowFunctions { .. }
        | Statement::ShowVariable { .. }
        | Statement::ShowVariables { .. }
        | Statement::ShowStatus { .. }
        | Statement::ShowCollation { .. }
        | Statement::ExplainTable { .. } => StatementKind::Read,

        // EXPLAIN only reads when the explained statement does
        Statement::Explain { statement, .. } => classify_statement(statement),

        Statement::Insert(_)
        | Statement::Update { .. }
        | Statement::Delete(_)
        | Statement::Merge { .. }
        | Statement::Copy { .. } => StatementKind::Dml,

        Statement::CreateTable { .. }
        | Statement::CreateView { .. }
        | Statement::CreateIndex(_)
        | Statement::CreateSchema { .. }
        | Statement::CreateDatabase { .. }
        | Statement::CreateSequence { .. }
        | Statement::CreateType { .. }
        | Statement::CreateFunction { .. }
        | Statement::CreateTrigger { .. }
        | Statement::CreateVirtualTable { .. }
        | Statement::AlterTable { .. }
        | Statement::AlterView { .. }
        | Statement::AlterIndex { .. }
        | Statement::AlterSchema { .. }
        | Statement::AlterType { .. }
        | Statement::Drop { .. }
        | Statement::DropFunction { .. }
        | Statement::DropTrigger { .. }
        | Statement::Truncate { .. }
        | Statement::Comment { .. } => StatementKind::Ddl,

        Statement::StartTransaction { .. }
        | Statement::Commit { .. }
        | Statement::Rollback { .. }
        | Statement::Savepoint { .. }
        | Statement::ReleaseSavepoint { .. } => StatementKind::Transaction,

        _ => StatementKind::Other,
    }
}

impl StatementKind {
    fn scope(self) -> StatementScope {
        match self {
            Self::Read | Self::Transaction => StatementScope::ReadOnly,
            Self::Dml => StatementScope::Data,
            Self::Ddl | Self::Other => StatementScope::Schema,
        }
    }
}

/// Scope of a whole SQL batch: the widest scope of its statements.
///
/// Unparseable SQL is scoped [`StatementScope::Schema`].
pub fn classify_sql(sql: &str, db_type: Option<DatabaseType>) -> StatementScope {
    match parse(sql, db_type) {
        Some(statements) => statements
            .iter()
            .map(|stmt| classify_statement(stmt).scope())
            .max()
            .unwrap_or(StatementScope::Schema),
        None => StatementScope::Schema,
    }
}

/// Names of the tables a batch drops, or `None` if the batch cannot be parsed.
pub fn dropped_tables(sql: &str, db_type: Option<DatabaseType>) -> Option<Vec<String>> {
    let statements = parse(sql, db_type)?;
    Some(
        statements
            .iter()
            .filter_map(|stmt| match stmt {
                Statement::Drop {
                    object_type: ObjectType::Table,
                    names,
                    ..
                } => Some(names.iter().map(object_name).collect::<Vec<_>>()),
                _ => None,
            })
            .flatten()
            .collect(),
    )
}

/// `(old, new)` names of the tables a batch renames, in statement order, or
/// `None` if the batch cannot be parsed.
///
/// Covers `ALTER TABLE .. RENAME TO/AS ..` and MySQL's `RENAME TABLE a TO b, ..`.
pub fn renamed_tables(sql: &str, db_type: Option<DatabaseType>) -> Option<Vec<(String, String)>> {
    let statements = parse(sql, db_type)?;
    let mut renames = Vec::new();
    for stmt in &statements {
        match stmt {
            Statement::AlterTable(alter) => {
                for op in &alter.operations {
                    if let AlterTableOperation::RenameTable { table_name } = op {
                        let new_name = match table_name {
                            RenameTableNameKind::As(name) | RenameTableNameKind::To(name) => name,
                        };
                        renames.push((object_name(&alter.name), object_name(new_name)));
                    }
                }
            }
            Statement::RenameTable(pairs) => {
                renames.extend(
                    pairs
                        .iter()
                        .map(|r| (object_name(&r.old_name), object_name(&r.new_name))),
                );
            }
            _ => {}
        }
    }
    Some(renames)
}

fn object_name(name: &ObjectName) -> String {
    bare_name(&name.to_string())
}

/// Last component of a possibly qualified, possibly quoted name.
fn bare_name(qualified: &str) -> String {
    let last = qualified.rsplit('.').next().unwrap_or(qualified);
    last.trim_matches(|c| matches!(c, '"' | '`' | '[' | ']'))
        .to_string()
}
