use async_trait::async_trait;
use tiberius::TokenRow;

use super::client::MssqlClient;
use super::params::bulk_cell;
use super::query::{column_from_tiberius, driver_error};
use crate::driver::{DriverError, NamedRow, TableBinding};
use crate::results::Column;

/// "Invalid object name" raised for a table that does not exist.
const INVALID_OBJECT_NAME: u32 = 208;

/// A table bound for tiberius bulk load.
pub struct MssqlTableBinding<'c> {
    client: &'c mut MssqlClient,
    name: String,
    columns: Vec<Column>,
}

impl<'c> MssqlTableBinding<'c> {
    /// Read the table's columns; a missing table binds with no columns.
    pub(crate) async fn bind(client: &'c mut MssqlClient, name: &str) -> Result<Self, DriverError> {
        let name = quote_path(name);
        let columns = match fetch_columns(client, &name).await {
            Ok(columns) => columns,
            Err(tiberius::error::Error::Server(token)) if token.code() == INVALID_OBJECT_NAME => {
                Vec::new()
            }
            Err(err) => return Err(driver_error(err)),
        };
        Ok(Self {
            client,
            name,
            columns,
        })
    }
}

/// Bracket every dotted part of an unquoted table path; empty parts (`db..t`) stay empty.
fn quote_path(path: &str) -> String {
    path.split('.')
        .map(|part| {
            if part.is_empty() {
                String::new()
            } else {
                format!("[{}]", part.replace(']', "]]"))
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

async fn fetch_columns(client: &mut MssqlClient, name: &str) -> tiberius::Result<Vec<Column>> {
    let mut stream = client
        .simple_query(format!("SELECT TOP 0 * FROM {name}"))
        .await?;
    let columns = stream
        .columns()
        .await?
        .map(|cols| cols.iter().map(column_from_tiberius).collect())
        .unwrap_or_default();
    stream.into_results().await?;
    Ok(columns)
}

#[async_trait]
impl TableBinding for MssqlTableBinding<'_> {
    fn columns(&self) -> &[Column] {
        &self.columns
    }

    async fn insert_rows(&mut self, rows: Vec<NamedRow>) -> Result<(), DriverError> {
        let mut request = self
            .client
            .bulk_insert(&self.name)
            .await
            .map_err(driver_error)?;
        for row in rows {
            let mut token = TokenRow::new();
            for ((_name, value), column) in row.into_iter().zip(&self.columns) {
                token.push(bulk_cell(value, column.sql_type));
            }
            request.send(token).await.map_err(driver_error)?;
        }
        let result = request.finalize().await.map_err(driver_error)?;
        tracing::debug!(table = %self.name, rows = result.total(), "bulk load finalized");
        Ok(())
    }
}
