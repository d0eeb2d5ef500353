use std::sync::Arc;

use super::column::Column;
use super::row::Row;

/// One statement's result set: ordered rows sharing a column set.
///
/// Columns are kept beside the rows, never as a row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recordset {
    columns: Arc<Vec<Column>>,
    /// The rows returned by the statement
    pub rows: Vec<Row>,
}

impl Recordset {
    #[must_use]
    pub fn new(columns: Arc<Vec<Column>>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    #[must_use]
    pub fn columns(&self) -> &Arc<Vec<Column>> {
        &self.columns
    }

    /// Look up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }
}

impl<'a> IntoIterator for &'a Recordset {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
