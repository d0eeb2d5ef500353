//! Request execution for SQL Server clients.
//!
//! A [`Request`] turns parameters and a command into text a driver can run,
//! then rebuilds recordsets, output parameters and return codes from the
//! driver's row/column event stream. [`Transaction`] pins requests to one
//! leased connection and [`BulkTable`] loads rows through the driver's
//! table-binding API.
//!
//! The driver and pool sit behind [`DriverConnection`] and [`ConnectionPool`].
//! The `mssql` feature provides implementations over tiberius and bb8.

pub mod bulk;
pub mod coercion;
pub mod command;
pub mod driver;
pub mod error;
pub mod materializer;
pub mod options;
pub mod params;
pub mod pool;
pub mod prelude;
pub mod request;
pub mod results;
pub mod transaction;
pub mod types;

#[cfg(feature = "mssql")]
pub mod mssql;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use bulk::{BulkColumn, BulkTable, bulk_insert};
pub use coercion::{UdtParser, UdtParsers, cast_parameter, value_correction};
pub use command::{ExecutionMode, SynthesizedCommand, synthesize_procedure, synthesize_query};
pub use driver::{
    ConnectionPool, DriverConnection, DriverError, DriverEvent, EventStream, NamedRow,
    TableBinding,
};
pub use error::{RequestErrorCode, SqlMiddlewareDbError, TransactionErrorCode};
pub use materializer::{JSON_COLUMN_ID, RequestEvent, ResultMaterializer, XML_COLUMN_ID};
pub use options::RequestOptions;
pub use params::{Parameter, Parameters};
pub use pool::ConfigAndPool;
pub use request::{Request, RequestTarget};
pub use results::{
    Column, FieldValue, OutputParameters, QueryResult, RETURN_FIELD, Recordset, Row,
};
pub use transaction::{IsolationLevel, Transaction, TransactionState};
pub use types::{ParameterDirection, RowValues, SqlType};

#[cfg(feature = "mssql")]
pub use mssql::{MssqlOptions, MssqlOptionsBuilder, MssqlPool, create_mssql_client};
