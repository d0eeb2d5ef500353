//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::bulk::{BulkColumn, BulkTable};
pub use crate::driver::{ConnectionPool, DriverConnection, DriverError, DriverEvent};
pub use crate::error::{RequestErrorCode, SqlMiddlewareDbError, TransactionErrorCode};
pub use crate::materializer::RequestEvent;
pub use crate::options::RequestOptions;
pub use crate::params::{Parameter, Parameters};
pub use crate::pool::ConfigAndPool;
pub use crate::request::Request;
pub use crate::results::{Column, FieldValue, QueryResult, Recordset, Row};
pub use crate::transaction::{IsolationLevel, Transaction, TransactionState};
pub use crate::types::{RowValues, SqlType};

#[cfg(feature = "mssql")]
pub use crate::mssql::{MssqlOptions, MssqlOptionsBuilder, MssqlPool};
