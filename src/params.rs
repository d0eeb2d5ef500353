use serde::Serialize;

use crate::types::{ParameterDirection, RowValues, SqlType};

/// A named, typed request parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    /// Name without the leading `@`.
    pub name: String,
    pub sql_type: SqlType,
    pub direction: ParameterDirection,
    #[serde(skip)]
    pub value: RowValues,
    pub length: Option<u32>,
    pub precision: Option<u8>,
    pub scale: Option<u8>,
}

impl Parameter {
    #[must_use]
    pub fn input(name: &str, sql_type: SqlType, value: RowValues) -> Self {
        Self::new(name, sql_type, ParameterDirection::Input, value)
    }

    #[must_use]
    pub fn output(name: &str, sql_type: SqlType) -> Self {
        Self::new(name, sql_type, ParameterDirection::Output, RowValues::Null)
    }

    fn new(name: &str, sql_type: SqlType, direction: ParameterDirection, value: RowValues) -> Self {
        Self {
            name: name.trim_start_matches('@').to_string(),
            sql_type,
            direction,
            value,
            length: None,
            precision: None,
            scale: None,
        }
    }

    #[must_use]
    pub fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    #[must_use]
    pub fn with_precision(mut self, precision: u8, scale: u8) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    #[must_use]
    pub fn with_scale(mut self, scale: u8) -> Self {
        self.scale = Some(scale);
        self
    }

    #[must_use]
    pub fn is_output(&self) -> bool {
        self.direction == ParameterDirection::Output
    }

    /// `@name type` fragment for a `DECLARE` list.
    #[must_use]
    pub fn declaration(&self) -> String {
        format!(
            "@{} {}",
            self.name,
            self.sql_type
                .declaration(self.length, self.precision, self.scale)
        )
    }
}

/// Request parameters in insertion order; names are unique.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    items: Vec<Parameter>,
}

impl Parameters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `param`, replacing an earlier parameter of the same name in place.
    pub fn add(&mut self, param: Parameter) {
        match self.items.iter_mut().find(|p| p.name == param.name) {
            Some(existing) => *existing = param,
            None => self.items.push(param),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        let name = name.trim_start_matches('@');
        self.items.iter().find(|p| p.name == name)
    }

    pub(crate) fn set_value(&mut self, name: &str, value: RowValues) {
        if let Some(p) = self.items.iter_mut().find(|p| p.name == name) {
            p.value = value;
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Parameter> {
        self.items.iter()
    }

    pub fn inputs(&self) -> impl Iterator<Item = &Parameter> {
        self.items.iter().filter(|p| !p.is_output())
    }

    pub fn outputs(&self) -> impl Iterator<Item = &Parameter> {
        self.items.iter().filter(|p| p.is_output())
    }

    #[must_use]
    pub fn has_outputs(&self) -> bool {
        self.items.iter().any(Parameter::is_output)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
