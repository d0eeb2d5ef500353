pub mod column;
pub mod recordset;
pub mod row;

use std::collections::HashMap;

pub use column::Column;
pub use recordset::Recordset;
pub use row::{FieldValue, RETURN_FIELD, Row};

use crate::types::RowValues;

/// Output parameter values keyed by parameter name.
pub type OutputParameters = HashMap<String, RowValues>;

/// What a request hands back once the driver reports `done`.
///
/// In streaming mode `recordsets` stays empty: rows were already sent as events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub recordsets: Vec<Recordset>,
    pub output: OutputParameters,
    /// One entry per `rowcount` the driver reported, in order.
    ///
    /// The tiberius adapter reports none: its query stream does not surface
    /// `DONE` counts, so this stays empty under the `mssql` feature.
    pub rows_affected: Vec<u64>,
    /// Return code of a stored procedure call.
    pub return_value: Option<i32>,
}

impl QueryResult {
    /// The first recordset, if any statement produced one.
    #[must_use]
    pub fn recordset(&self) -> Option<&Recordset> {
        self.recordsets.first()
    }

    /// Sum of every reported row count.
    #[must_use]
    pub fn total_rows_affected(&self) -> u64 {
        self.rows_affected.iter().sum()
    }
}
