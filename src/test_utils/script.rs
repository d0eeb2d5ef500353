use crate::driver::{DriverError, DriverEvent};
use crate::results::Column;
use crate::types::{RowValues, SqlType};

/// Builder for the event sequence a scripted command replays.
///
/// ```rust
/// use mssql_request::prelude::*;
/// use mssql_request::test_utils::EventScript;
///
/// let events = EventScript::new()
///     .recordset(&[("id", SqlType::Int)])
///     .row(vec![RowValues::Int(1)])
///     .rowcount(1)
///     .done();
/// assert_eq!(events.len(), 5);
/// ```
#[derive(Debug, Default, Clone)]
pub struct EventScript {
    events: Vec<DriverEvent>,
    row_index: usize,
}

impl EventScript {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a recordset with the given column names and types.
    #[must_use]
    pub fn recordset(self, columns: &[(&str, SqlType)]) -> Self {
        self.columns(
            columns
                .iter()
                .map(|(name, ty)| Column::new(*name, *ty))
                .collect(),
        )
    }

    /// Start a recordset with fully specified columns.
    #[must_use]
    pub fn columns(mut self, columns: Vec<Column>) -> Self {
        self.events.push(DriverEvent::Meta(columns));
        self.row_index = 0;
        self
    }

    /// One row whose cells arrive in column order.
    #[must_use]
    pub fn row(mut self, values: Vec<RowValues>) -> Self {
        self.events.push(DriverEvent::Row(self.row_index));
        self.row_index += 1;
        self.events.extend(
            values
                .into_iter()
                .enumerate()
                .map(|(index, data)| DriverEvent::Column { index, data }),
        );
        self
    }

    /// A chunked single-cell payload, one driver row per fragment.
    #[must_use]
    pub fn fragments(mut self, fragments: &[&str]) -> Self {
        for fragment in fragments {
            self = self.row(vec![RowValues::Text((*fragment).to_string())]);
        }
        self
    }

    #[must_use]
    pub fn rowcount(mut self, count: u64) -> Self {
        self.events.push(DriverEvent::RowCount(count));
        self
    }

    /// Fail the command here; `done` is not needed afterwards.
    #[must_use]
    pub fn error(mut self, err: DriverError) -> Self {
        self.events.push(DriverEvent::Error(err));
        self
    }

    /// Close the script with `Done`.
    #[must_use]
    pub fn done(mut self) -> Vec<DriverEvent> {
        self.events.push(DriverEvent::Done);
        self.events
    }

    /// Events as pushed, without a trailing `Done`.
    #[must_use]
    pub fn build(self) -> Vec<DriverEvent> {
        self.events
    }
}
