use std::collections::HashMap;
use std::sync::Arc;

use super::row::{OwnedRow, index_cache};
use crate::types::Value;

/// A result set from a query
///
/// This struct holds every row a query produced, in order, plus the column names they share.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The rows returned by the query
    pub results: Vec<OwnedRow>,
    /// Column names shared by all rows (to avoid duplicating in each row)
    column_names: Option<Arc<Vec<String>>>,
    column_index_cache: Option<Arc<HashMap<String, usize>>>,
}

impl ResultSet {
    /// Create a new result set with a known capacity
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            results: Vec::with_capacity(capacity),
            column_names: None,
            column_index_cache: None,
        }
    }

    /// Set the column names for this result set (to be shared by all rows)
    pub fn set_column_names(&mut self, column_names: Arc<Vec<String>>) {
        self.column_index_cache = Some(index_cache(&column_names));
        self.column_names = Some(column_names);
    }

    /// Get the column names for this result set
    #[must_use]
    pub fn column_names(&self) -> Option<&Arc<Vec<String>>> {
        self.column_names.as_ref()
    }

    /// Add a row to the result set; ignored until column names are set.
    pub fn add_row_values(&mut self, row_values: Vec<Value>) {
        if let (Some(column_names), Some(cache)) = (&self.column_names, &self.column_index_cache) {
            self.results.push(OwnedRow {
                column_names: Arc::clone(column_names),
                values: row_values,
                column_index_cache: Arc::clone(cache),
            });
        }
    }

    /// Number of rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OwnedRow> {
        self.results.iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a OwnedRow;
    type IntoIter = std::slice::Iter<'a, OwnedRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_share_column_names() {
        let mut rs = ResultSet::with_capacity(2);
        rs.add_row_values(vec![Value::Int(0)]);
        assert!(rs.is_empty());

        rs.set_column_names(Arc::new(vec!["n".to_string()]));
        rs.add_row_values(vec![Value::Int(1)]);
        rs.add_row_values(vec![Value::Int(2)]);
        assert_eq!(rs.len(), 2);
        assert!(Arc::ptr_eq(&rs.results[0].column_names, &rs.results[1].column_names));
        let total: i64 = rs.iter().filter_map(|r| r.get("n").and_then(Value::as_int)).sum();
        assert_eq!(total, 3);
    }
}
