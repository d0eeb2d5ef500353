//! Boundary to the lower-level driver and the connection pool.
//!
//! The request layer only talks to these traits. A driver delivers one command's
//! results as a stream of [`DriverEvent`]s; the pool hands out exclusive leases.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use thiserror::Error;

use crate::error::SqlMiddlewareDbError;
use crate::results::Column;
use crate::types::RowValues;

/// SQLSTATE the driver reports when the link to the server is gone.
pub const CONNECTION_BROKEN_STATE: &str = "08s01";

/// Failure reported by the driver, either up front or as an `error` event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DriverError {
    pub message: String,
    /// ODBC-style SQLSTATE, when the driver knows it.
    pub sql_state: Option<String>,
    /// Server error number, when the server raised the error.
    pub code: Option<i32>,
}

impl DriverError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            sql_state: None,
            code: None,
        }
    }

    #[must_use]
    pub fn with_sql_state(mut self, sql_state: impl Into<String>) -> Self {
        self.sql_state = Some(sql_state.into());
        self
    }

    #[must_use]
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }

    /// True when the connection that produced this error must not be reused.
    #[must_use]
    pub fn is_connection_broken(&self) -> bool {
        self.sql_state
            .as_deref()
            .is_some_and(|state| state.to_lowercase() == CONNECTION_BROKEN_STATE)
    }
}

/// One notification from the driver while a command runs.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverEvent {
    /// A new result set starts with these columns.
    Meta(Vec<Column>),
    /// A new row starts; its cells follow as `Column` events.
    Row(usize),
    /// One cell (or one fragment of a chunked cell) of the current row.
    Column { index: usize, data: RowValues },
    /// A statement reported its affected row count.
    RowCount(u64),
    /// The command failed; nothing more will follow.
    Error(DriverError),
    /// The command finished.
    Done,
}

/// Events of one command, pulled one at a time.
pub type EventStream<'c> = BoxStream<'c, DriverEvent>;

/// Row submitted through a [`TableBinding`]: field name and value, in column order.
pub type NamedRow = Vec<(String, RowValues)>;

/// Server-side table bound for bulk insertion.
#[async_trait]
pub trait TableBinding: Send {
    /// Columns of the bound table; empty when the table does not exist.
    fn columns(&self) -> &[Column];

    /// Insert every row in one call.
    async fn insert_rows(&mut self, rows: Vec<NamedRow>) -> Result<(), DriverError>;
}

/// A physical connection leased from the pool.
#[async_trait]
pub trait DriverConnection: Send {
    /// Submit `command` with positional `binds` and return its event stream.
    async fn execute_raw<'c>(
        &'c mut self,
        command: &str,
        binds: Vec<RowValues>,
    ) -> Result<EventStream<'c>, DriverError>;

    /// Bind to a table by (unquoted) name for bulk insertion.
    async fn bind_table<'c>(
        &'c mut self,
        name: &str,
    ) -> Result<Box<dyn TableBinding + 'c>, DriverError>;

    /// Flag this connection so the pool's validation reports it unhealthy.
    fn mark_unhealthy(&mut self);

    fn is_unhealthy(&self) -> bool;
}

/// Source of exclusive connection leases.
#[async_trait]
pub trait ConnectionPool: Send + Sync {
    type Connection: DriverConnection;

    /// Lease a connection; waits while the pool is exhausted.
    async fn acquire(&self) -> Result<Self::Connection, SqlMiddlewareDbError>;

    /// Hand a lease back. Called exactly once per successful `acquire`.
    fn release(&self, conn: Self::Connection);
}

/// Flag `conn` unhealthy when `err` carries the broken-connection signature.
pub(crate) fn flag_if_broken<C: DriverConnection + ?Sized>(conn: &mut C, err: &DriverError) {
    if err.is_connection_broken() {
        tracing::warn!(sql_state = ?err.sql_state, "connection flagged unhealthy: {}", err.message);
        conn.mark_unhealthy();
    }
}
