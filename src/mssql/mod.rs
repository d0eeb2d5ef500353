// MSSQL module - SQL Server driver behind the request layer
//
// - config: connection options and pool setup
// - client: raw client creation and the bb8 connection manager
// - params: binding middleware values as tiberius parameters
// - placeholders: `?` binds renamed to the `@Pn` form tiberius expects
// - query: translating tiberius result streams into driver events
// - bulk: table binding over tiberius bulk load

pub mod bulk;
pub mod client;
pub mod config;
pub mod params;
pub mod placeholders;
pub mod query;

pub use client::{MssqlClient, MssqlConnection, MssqlManager, create_mssql_client};
pub use config::{MssqlOptions, MssqlOptionsBuilder, MssqlPool};
