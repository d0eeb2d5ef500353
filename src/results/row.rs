use std::collections::HashMap;

use crate::types::RowValues;

/// Reserved field carrying a stored procedure's return code.
pub const RETURN_FIELD: &str = "___return___";

/// Value stored under one field name of a [`Row`].
///
/// A result with several columns of the same name (self-joins, `SELECT a.id, b.id`)
/// keeps every value, in column order, instead of letting the last one win.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Single(RowValues),
    Multiple(Vec<RowValues>),
}

impl FieldValue {
    /// The single value, or the first of a repeated field.
    #[must_use]
    pub fn first(&self) -> Option<&RowValues> {
        match self {
            FieldValue::Single(v) => Some(v),
            FieldValue::Multiple(values) => values.first(),
        }
    }

    #[must_use]
    pub fn as_single(&self) -> Option<&RowValues> {
        match self {
            FieldValue::Single(v) => Some(v),
            FieldValue::Multiple(_) => None,
        }
    }

    #[must_use]
    pub fn as_multiple(&self) -> Option<&[RowValues]> {
        match self {
            FieldValue::Single(_) => None,
            FieldValue::Multiple(values) => Some(values),
        }
    }

    fn push(&mut self, value: RowValues) {
        match self {
            FieldValue::Single(existing) => {
                let first = std::mem::replace(existing, RowValues::Null);
                *self = FieldValue::Multiple(vec![first, value]);
            }
            FieldValue::Multiple(values) => values.push(value),
        }
    }
}

/// A row from a recordset: an ordered mapping from field name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    names: Vec<String>,
    values: Vec<FieldValue>,
    // name -> position, so repeated names aggregate without a scan
    index: HashMap<String, usize>,
}

impl Row {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `name`, aggregating into a list when the name is already present.
    pub fn push_value(&mut self, name: &str, value: RowValues) {
        if let Some(&idx) = self.index.get(name) {
            self.values[idx].push(value);
            return;
        }
        self.index.insert(name.to_string(), self.names.len());
        self.names.push(name.to_string());
        self.values.push(FieldValue::Single(value));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.index.get(name).map(|&idx| &self.values[idx])
    }

    /// The value under `name`; the first one when the field repeats.
    #[must_use]
    pub fn get_value(&self, name: &str) -> Option<&RowValues> {
        self.get(name).and_then(FieldValue::first)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.names.iter().map(String::as_str).zip(self.values.iter())
    }

    /// True when this is the synthetic row carrying a procedure return code.
    #[must_use]
    pub fn is_return_row(&self) -> bool {
        self.get_value(RETURN_FIELD).is_some_and(|v| !v.is_null())
    }
}
