use std::collections::HashMap;
use std::sync::Arc;

use crate::types::Value;

/// A materialized row from a query result
///
/// This struct holds owned copies of one row's values together with the column names
/// shared by every row of the same [`ResultSet`](super::ResultSet).
#[derive(Debug, Clone)]
pub struct OwnedRow {
    /// The column names for this row (shared across all rows in a result set)
    pub column_names: Arc<Vec<String>>,
    /// The values for this row
    pub values: Vec<Value>,
    // Internal cache for faster column lookups
    #[doc(hidden)]
    pub(crate) column_index_cache: Arc<HashMap<String, usize>>,
}

pub(crate) fn index_cache(column_names: &[String]) -> Arc<HashMap<String, usize>> {
    let mut cache = HashMap::with_capacity(column_names.len());
    for (i, name) in column_names.iter().enumerate() {
        // first occurrence wins for duplicated names
        cache.entry(name.clone()).or_insert(i);
    }
    Arc::new(cache)
}

impl OwnedRow {
    /// Create a row, building its own column index.
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, values: Vec<Value>) -> Self {
        let column_index_cache = index_cache(&column_names);
        Self {
            column_names,
            values,
            column_index_cache,
        }
    }

    /// Get the index of a column by name
    #[must_use]
    pub fn column_index(&self, column_name: &str) -> Option<usize> {
        if let Some(&idx) = self.column_index_cache.get(column_name) {
            return Some(idx);
        }
        // the engine matches column names case-insensitively
        self.column_names
            .iter()
            .position(|col| col.eq_ignore_ascii_case(column_name))
    }

    /// Get a value from the row by column name
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&Value> {
        self.column_index(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Get a value from the row by column index
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name_is_case_insensitive_fallback() {
        let names = Arc::new(vec!["id".to_string(), "Name".to_string()]);
        let row = OwnedRow::new(names, vec![Value::Int(7), Value::Text("x".into())]);
        assert_eq!(row.get("id"), Some(&Value::Int(7)));
        assert_eq!(row.get("name"), Some(&Value::Text("x".into())));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.get_by_index(1), row.get("Name"));
        assert_eq!(row.len(), 2);
    }
}
