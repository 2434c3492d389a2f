//! Schema-related data models.
//!
//! This module defines the table, column, index and foreign key descriptors
//! returned by the schema endpoints, and the DDL requests sent back.

use crate::error::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableInfo {
    pub name: String,
    pub table_type: String,
    #[serde(default)]
    pub row_count_estimate: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableList {
    pub tables: Vec<TableInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub is_primary_key: bool,
    #[serde(default)]
    pub default_value: Option<String>,
}

impl ColumnInfo {
    /// Whether the database fills this column when the value is omitted.
    pub fn has_default(&self) -> bool {
        self.default_value.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnList {
    pub columns: Vec<ColumnInfo>,
}

/// Find the primary key column, if the table declares one.
pub fn primary_key_column(columns: &[ColumnInfo]) -> Option<&ColumnInfo> {
    columns.iter().find(|c| c.is_primary_key)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexInfo {
    pub name: String,
    pub is_unique: bool,
    pub is_primary: bool,
    pub column_names: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexList {
    pub indexes: Vec<IndexInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForeignKeyInfo {
    pub constraint_name: String,
    pub column_name: String,
    pub foreign_table: String,
    pub foreign_column: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForeignKeyList {
    pub foreign_keys: Vec<ForeignKeyInfo>,
}

/// Column definition used when creating a table or adding/modifying a column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub is_primary_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

fn default_nullable() -> bool {
    true
}

impl ColumnDefinition {
    /// Create a nullable, non-key column definition.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            is_primary_key: false,
            default_value: None,
        }
    }

    /// Mark the column as the primary key (implies NOT NULL).
    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.nullable = false;
        self
    }

    /// Mark the column NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Set the default value expression.
    pub fn with_default(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = Some(default_value.into());
        self
    }

    fn validate(&self) -> ApiResult<()> {
        if self.name.trim().is_empty() {
            return Err(ApiError::validation("Column name is required"));
        }
        if self.data_type.trim().is_empty() {
            return Err(ApiError::validation(format!(
                "Data type is required for column '{}'",
                self.name
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateTableRequest {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
}

impl CreateTableRequest {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDefinition>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Check the request before dispatch.
    pub fn validate(&self) -> ApiResult<()> {
        validate_identifier("Table name", &self.name)?;
        if self.columns.is_empty() {
            return Err(ApiError::validation("A table needs at least one column"));
        }
        let mut seen = HashSet::new();
        for column in &self.columns {
            column.validate()?;
            if !seen.insert(column.name.to_lowercase()) {
                return Err(ApiError::validation(format!(
                    "Duplicate column name '{}'",
                    column.name
                )));
            }
        }
        Ok(())
    }
}

/// Body of `PUT /schema/table/{name}`, tagged by `alter_type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "alter_type")]
pub enum AlterTableRequest {
    RenameTable {
        new_name: String,
    },
    AddColumn {
        column_definition: ColumnDefinition,
    },
    DropColumn {
        column_name: String,
    },
    ModifyColumn {
        old_column_name: String,
        column_definition: ColumnDefinition,
    },
    RenameColumn {
        old_column_name: String,
        column_name: String,
    },
}

impl AlterTableRequest {
    /// Name of the operation for logs and confirmation prompts.
    pub fn operation_name(&self) -> &'static str {
        match self {
            Self::RenameTable { .. } => "RENAME TABLE",
            Self::AddColumn { .. } => "ADD COLUMN",
            Self::DropColumn { .. } => "DROP COLUMN",
            Self::ModifyColumn { .. } => "MODIFY COLUMN",
            Self::RenameColumn { .. } => "RENAME COLUMN",
        }
    }

    /// Whether the change destroys data.
    pub fn is_destructive(&self) -> bool {
        matches!(self, Self::DropColumn { .. })
    }

    /// New table name for a rename, if any.
    pub fn renamed_to(&self) -> Option<&str> {
        match self {
            Self::RenameTable { new_name } => Some(new_name),
            _ => None,
        }
    }

    /// Check the request before dispatch.
    pub fn validate(&self) -> ApiResult<()> {
        match self {
            Self::RenameTable { new_name } => validate_identifier("New table name", new_name),
            Self::AddColumn { column_definition } => column_definition.validate(),
            Self::DropColumn { column_name } => validate_identifier("Column name", column_name),
            Self::ModifyColumn {
                old_column_name,
                column_definition,
            } => {
                validate_identifier("Column name", old_column_name)?;
                column_definition.validate()
            }
            Self::RenameColumn {
                old_column_name,
                column_name,
            } => {
                validate_identifier("Column name", old_column_name)?;
                validate_identifier("New column name", column_name)
            }
        }
    }
}

/// Response of create and drop table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableChange {
    pub message: String,
    pub table: String,
}

fn validate_identifier(what: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(format!("{} is required", what)));
    }
    Ok(())
}
