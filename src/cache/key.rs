//! Cache keys and key filters.

use crate::models::RowsQuery;

/// Address of one cached read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Tables,
    DatabaseInfo,
    Columns(String),
    Indexes(String),
    ForeignKeys(String),
    Rows { table: String, query: RowsQuery },
}

impl QueryKey {
    pub fn columns(table: impl Into<String>) -> Self {
        Self::Columns(table.into())
    }

    pub fn indexes(table: impl Into<String>) -> Self {
        Self::Indexes(table.into())
    }

    pub fn foreign_keys(table: impl Into<String>) -> Self {
        Self::ForeignKeys(table.into())
    }

    pub fn rows(table: impl Into<String>, query: RowsQuery) -> Self {
        Self::Rows {
            table: table.into(),
            query,
        }
    }

    /// Resource kind, the first component of the key.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Tables => "tables",
            Self::DatabaseInfo => "databaseInfo",
            Self::Columns(_) => "table",
            Self::Indexes(_) => "tableIndexes",
            Self::ForeignKeys(_) => "tableForeignKeys",
            Self::Rows { .. } => "tableRows",
        }
    }

    /// Table the key is scoped to, if any.
    pub fn table(&self) -> Option<&str> {
        match self {
            Self::Tables | Self::DatabaseInfo => None,
            Self::Columns(t) | Self::Indexes(t) | Self::ForeignKeys(t) => Some(t),
            Self::Rows { table, .. } => Some(table),
        }
    }
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rows { table, query } => {
                write!(f, "{}:{}", self.kind(), table)?;
                let pairs = query.to_query_pairs();
                if !pairs.is_empty() {
                    let rendered: Vec<String> =
                        pairs.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                    write!(f, "?{}", rendered.join("&"))?;
                }
                Ok(())
            }
            other => match other.table() {
                Some(table) => write!(f, "{}:{}", other.kind(), table),
                None => write!(f, "{}", other.kind()),
            },
        }
    }
}

/// Selects the cache keys an invalidation applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyFilter {
    /// One specific key.
    Exact(QueryKey),
    /// Every row listing of a table, whatever its pagination and sort.
    TableRows(String),
    /// Every row listing of every table.
    AllRows,
    /// Every key scoped to a table.
    Table(String),
    /// Everything.
    All,
}

impl KeyFilter {
    pub fn matches(&self, key: &QueryKey) -> bool {
        match self {
            Self::Exact(exact) => exact == key,
            Self::TableRows(table) => {
                matches!(key, QueryKey::Rows { table: t, .. } if t == table)
            }
            Self::AllRows => matches!(key, QueryKey::Rows { .. }),
            Self::Table(table) => key.table() == Some(table.as_str()),
            Self::All => true,
        }
    }
}

impl std::fmt::Display for KeyFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact(key) => write!(f, "{}", key),
            Self::TableRows(table) => write!(f, "tableRows:{}:*", table),
            Self::AllRows => write!(f, "tableRows:*"),
            Self::Table(table) => write!(f, "*:{}", table),
            Self::All => write!(f, "*"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SortOrder;

    #[test]
    fn test_key_display() {
        assert_eq!(QueryKey::Tables.to_string(), "tables");
        assert_eq!(QueryKey::columns("users").to_string(), "table:users");
        assert_eq!(
            QueryKey::rows("users", RowsQuery::page(2, 10)).to_string(),
            "tableRows:users?page=2&limit=10"
        );
        assert_eq!(QueryKey::rows("users", RowsQuery::default()).to_string(), "tableRows:users");
    }

    #[test]
    fn test_distinct_row_params_are_distinct_keys() {
        let a = QueryKey::rows("users", RowsQuery::page(1, 10));
        let b = QueryKey::rows("users", RowsQuery::page(1, 10).sorted_by("id", SortOrder::Asc));
        assert_ne!(a, b);
    }

    #[test]
    fn test_table_rows_filter_matches_all_variants_of_one_table() {
        let filter = KeyFilter::TableRows("users".to_string());
        assert!(filter.matches(&QueryKey::rows("users", RowsQuery::default())));
        assert!(filter.matches(&QueryKey::rows(
            "users",
            RowsQuery::page(3, 50).sorted_by("name", SortOrder::Desc)
        )));
        assert!(!filter.matches(&QueryKey::rows("orders", RowsQuery::default())));
        assert!(!filter.matches(&QueryKey::columns("users")));
    }

    #[test]
    fn test_table_filter_matches_every_scoped_key() {
        let filter = KeyFilter::Table("users".to_string());
        assert!(filter.matches(&QueryKey::columns("users")));
        assert!(filter.matches(&QueryKey::indexes("users")));
        assert!(filter.matches(&QueryKey::foreign_keys("users")));
        assert!(filter.matches(&QueryKey::rows("users", RowsQuery::default())));
        assert!(!filter.matches(&QueryKey::Tables));
        assert!(!filter.matches(&QueryKey::columns("users_archive")));
    }

    #[test]
    fn test_exact_and_all_filters() {
        assert!(KeyFilter::Exact(QueryKey::Tables).matches(&QueryKey::Tables));
        assert!(!KeyFilter::Exact(QueryKey::Tables).matches(&QueryKey::DatabaseInfo));
        assert!(KeyFilter::All.matches(&QueryKey::DatabaseInfo));
        assert!(KeyFilter::AllRows.matches(&QueryKey::rows("x", RowsQuery::default())));
        assert!(!KeyFilter::AllRows.matches(&QueryKey::columns("x")));
    }
}
