use serde::{Deserialize, Serialize};

use crate::types::SqlType;

/// Column metadata for one recordset, derived from the driver's `meta` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Position within the recordset (0-based).
    pub index: usize,
    pub name: String,
    pub sql_type: SqlType,
    /// Declared length; `None` for fixed-size types and `MAX` columns.
    pub length: Option<u32>,
    pub nullable: bool,
    /// Server-side type name for `udt` columns.
    pub udt_name: Option<String>,
}

impl Column {
    #[must_use]
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            index: 0,
            name: name.into(),
            sql_type,
            length: None,
            nullable: true,
            udt_name: None,
        }
    }

    #[must_use]
    pub fn with_length(mut self, length: Option<u32>) -> Self {
        self.length = length;
        self
    }

    #[must_use]
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    #[must_use]
    pub fn with_udt_name(mut self, udt_name: impl Into<String>) -> Self {
        self.udt_name = Some(udt_name.into());
        self
    }
}
