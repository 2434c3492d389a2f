//! Which cache keys each successful mutation invalidates.
//!
//! Plans are computed up front and only applied once the mutation has
//! succeeded; a failed mutation applies nothing.

use crate::cache::key::{KeyFilter, QueryKey};
use crate::models::AlterTableRequest;
use crate::sql::StatementScope;

/// Set of key filters to invalidate after a mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationPlan {
    filters: Vec<KeyFilter>,
}

impl InvalidationPlan {
    pub fn none() -> Self {
        Self::default()
    }

    fn with(mut self, filter: KeyFilter) -> Self {
        if !self.filters.contains(&filter) {
            self.filters.push(filter);
        }
        self
    }

    /// Creating a table changes the table list and the table count.
    pub fn create_table() -> Self {
        Self::none()
            .with(KeyFilter::Exact(QueryKey::Tables))
            .with(KeyFilter::Exact(QueryKey::DatabaseInfo))
    }

    /// Dropping a table changes the table list and the table count, and
    /// leaves everything cached for that table dead.
    pub fn drop_table(table: &str) -> Self {
        Self::create_table().with(KeyFilter::Table(table.to_string()))
    }

    /// Any DDL on a table changes its columns and its row shape. Indexes and
    /// foreign keys change as a by-product of column changes. The table list
    /// is included because a rename changes what it shows.
    pub fn alter_table(table: &str, request: &AlterTableRequest) -> Self {
        let plan = Self::none()
            .with(KeyFilter::Exact(QueryKey::columns(table)))
            .with(KeyFilter::TableRows(table.to_string()))
            .with(KeyFilter::Exact(QueryKey::indexes(table)))
            .with(KeyFilter::Exact(QueryKey::foreign_keys(table)))
            .with(KeyFilter::Exact(QueryKey::Tables));
        match request.renamed_to() {
            Some(new_name) => plan
                .with(KeyFilter::Table(table.to_string()))
                .with(KeyFilter::Table(new_name.to_string())),
            None => plan,
        }
    }

    /// Row changes only affect row listings of that table.
    pub fn row_change(table: &str) -> Self {
        Self::none().with(KeyFilter::TableRows(table.to_string()))
    }

    /// Ad-hoc SQL, scoped by what the statements can touch.
    pub fn sql(scope: StatementScope) -> Self {
        match scope {
            StatementScope::ReadOnly => Self::none(),
            StatementScope::Data => Self::none().with(KeyFilter::AllRows),
            StatementScope::Schema => Self::none().with(KeyFilter::All),
        }
    }

    pub fn filters(&self) -> &[KeyFilter] {
        &self.filters
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Whether the plan invalidates the given key.
    pub fn covers(&self, key: &QueryKey) -> bool {
        self.filters.iter().any(|f| f.matches(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColumnDefinition, RowsQuery};

    fn rows(table: &str) -> QueryKey {
        QueryKey::rows(table, RowsQuery::page(2, 25))
    }

    #[test]
    fn test_create_table_plan() {
        let plan = InvalidationPlan::create_table();
        assert!(plan.covers(&QueryKey::Tables));
        assert!(plan.covers(&QueryKey::DatabaseInfo));
        assert!(!plan.covers(&QueryKey::columns("users")));
        assert!(!plan.covers(&rows("users")));
    }

    #[test]
    fn test_drop_table_plan() {
        let plan = InvalidationPlan::drop_table("orders");
        assert!(plan.covers(&QueryKey::Tables));
        assert!(plan.covers(&QueryKey::DatabaseInfo));
        assert!(plan.covers(&QueryKey::columns("orders")));
        assert!(plan.covers(&rows("orders")));
        assert!(!plan.covers(&rows("users")));
    }

    #[test]
    fn test_add_column_plan() {
        let request = AlterTableRequest::AddColumn {
            column_definition: ColumnDefinition::new("age", "integer"),
        };
        let plan = InvalidationPlan::alter_table("users", &request);
        assert!(plan.covers(&QueryKey::columns("users")));
        assert!(plan.covers(&rows("users")));
        assert!(plan.covers(&QueryKey::rows("users", RowsQuery::default())));
        assert!(plan.covers(&QueryKey::Tables));
        assert!(plan.covers(&QueryKey::indexes("users")));
        assert!(!plan.covers(&QueryKey::DatabaseInfo));
        assert!(!plan.covers(&QueryKey::columns("orders")));
    }

    #[test]
    fn test_rename_table_plan_covers_both_names() {
        let request = AlterTableRequest::RenameTable {
            new_name: "customers".to_string(),
        };
        let plan = InvalidationPlan::alter_table("users", &request);
        assert!(plan.covers(&QueryKey::Tables));
        assert!(plan.covers(&QueryKey::foreign_keys("users")));
        assert!(plan.covers(&QueryKey::columns("customers")));
        assert!(plan.covers(&rows("customers")));
    }

    #[test]
    fn test_row_change_plan_leaves_columns_alone() {
        let plan = InvalidationPlan::row_change("users");
        assert!(plan.covers(&rows("users")));
        assert!(plan.covers(&QueryKey::rows("users", RowsQuery::default())));
        assert!(!plan.covers(&QueryKey::columns("users")));
        assert!(!plan.covers(&QueryKey::Tables));
        assert!(!plan.covers(&rows("orders")));
    }

    #[test]
    fn test_sql_plans() {
        assert!(InvalidationPlan::sql(StatementScope::ReadOnly).is_empty());

        let data = InvalidationPlan::sql(StatementScope::Data);
        assert!(data.covers(&rows("anything")));
        assert!(!data.covers(&QueryKey::Tables));

        let schema = InvalidationPlan::sql(StatementScope::Schema);
        assert!(schema.covers(&QueryKey::Tables));
        assert!(schema.covers(&QueryKey::DatabaseInfo));
    }

    #[test]
    fn test_filters_are_deduplicated() {
        let plan = InvalidationPlan::none()
            .with(KeyFilter::AllRows)
            .with(KeyFilter::AllRows);
        assert_eq!(plan.filters().len(), 1);
    }
}
