//! Bulk loading through the driver's table-binding API.

use std::sync::LazyLock;

use regex::Regex;

use crate::coercion::cast_parameter;
use crate::command::SynthesizedCommand;
use crate::driver::{ConnectionPool, DriverConnection, DriverError, NamedRow, flag_if_broken};
use crate::error::{RequestErrorCode, SqlMiddlewareDbError};
use crate::materializer::run_command;
use crate::options::RequestOptions;
use crate::results::Column;
use crate::types::{RowValues, SqlType};

static BRACKETS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\[\]]").expect("bracket pattern is valid"));

/// Column declaration of a [`BulkTable`].
#[derive(Debug, Clone, PartialEq)]
pub struct BulkColumn {
    pub name: String,
    pub sql_type: SqlType,
    pub length: Option<u32>,
    pub precision: Option<u8>,
    pub scale: Option<u8>,
    /// `Some(true)` → `NULL`, `Some(false)` → `NOT NULL`, `None` → server default.
    pub nullable: Option<bool>,
    pub primary: bool,
}

impl BulkColumn {
    #[must_use]
    pub fn new(name: &str, sql_type: SqlType) -> Self {
        Self {
            name: name.to_string(),
            sql_type,
            length: None,
            precision: None,
            scale: None,
            nullable: None,
            primary: false,
        }
    }

    #[must_use]
    pub fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    #[must_use]
    pub fn precision(mut self, precision: u8, scale: u8) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    #[must_use]
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = Some(nullable);
        self
    }

    #[must_use]
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    fn declaration(&self) -> String {
        let mut decl = format!(
            "[{}] {}",
            self.name,
            self.sql_type
                .declaration(self.length, self.precision, self.scale)
        );
        match self.nullable {
            Some(true) => decl.push_str(" NULL"),
            Some(false) => decl.push_str(" NOT NULL"),
            None => {}
        }
        if self.primary {
            decl.push_str(" PRIMARY KEY");
        }
        decl
    }
}

/// Target table plus the rows to load into it.
///
/// ```rust
/// use mssql_request::prelude::*;
///
/// let mut table = BulkTable::new("[sales].[dbo].[#staging]").with_create(true);
/// table.add_column(BulkColumn::new("id", SqlType::Int).nullable(false).primary());
/// table.add_row(vec![RowValues::Int(1)]);
/// assert!(table.temporary);
/// assert_eq!(table.path, "[sales].[dbo].[#staging]");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkTable {
    pub name: String,
    pub schema: Option<String>,
    pub database: Option<String>,
    /// Bracket-quoted `[database].[schema].[name]`.
    pub path: String,
    /// Name starts with `#`.
    pub temporary: bool,
    /// Create the table when it does not exist yet.
    pub create: bool,
    pub columns: Vec<BulkColumn>,
    pub rows: Vec<Vec<RowValues>>,
}

impl BulkTable {
    /// Parse `name`, `schema.name` or `database.schema.name`, bracket-quoted or not.
    #[must_use]
    pub fn new(path: &str) -> Self {
        let mut parts = split_name(path);
        let name = parts.pop().unwrap_or_default();
        let schema = parts.pop().filter(|s| !s.is_empty());
        let database = parts.pop().filter(|s| !s.is_empty());

        let path = match (&database, &schema) {
            (Some(db), Some(schema)) => format!("[{db}].[{schema}].[{name}]"),
            (Some(db), None) => format!("[{db}]..[{name}]"),
            (None, Some(schema)) => format!("[{schema}].[{name}]"),
            (None, None) => format!("[{name}]"),
        };

        Self {
            temporary: name.starts_with('#'),
            name,
            schema,
            database,
            path,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    pub fn add_column(&mut self, column: BulkColumn) -> &mut Self {
        self.columns.push(column);
        self
    }

    pub fn add_row(&mut self, values: Vec<RowValues>) -> &mut Self {
        self.rows.push(values);
        self
    }

    /// `CREATE TABLE` statement for the declared columns.
    #[must_use]
    pub fn declare(&self) -> String {
        let columns: Vec<String> = self.columns.iter().map(BulkColumn::declaration).collect();
        format!("CREATE TABLE {} ({})", self.path, columns.join(", "))
    }

    /// Guarded DDL that only creates the table when it is missing.
    #[must_use]
    pub fn create_if_missing(&self) -> String {
        let object_id = if self.temporary {
            format!("tempdb..[{}]", self.name)
        } else {
            self.path.clone()
        };
        format!(
            "IF OBJECT_ID('{}') IS NULL {}",
            object_id.replace('\'', "''"),
            self.declare()
        )
    }

    /// Path with bracket quoting removed, as the table binding expects it.
    #[must_use]
    pub fn binding_name(&self) -> String {
        BRACKETS.replace_all(&self.path, "").into_owned()
    }

    fn validate(&self) -> Result<(), SqlMiddlewareDbError> {
        if self.name.is_empty() {
            return Err(SqlMiddlewareDbError::request(
                RequestErrorCode::Name,
                "Table name must be specified for bulk insert.",
            ));
        }
        if self.name.starts_with('@') {
            return Err(SqlMiddlewareDbError::request(
                RequestErrorCode::Name,
                "You can't use table variables for bulk insert.",
            ));
        }
        Ok(())
    }
}

/// Split a possibly bracket-quoted dotted name into its unquoted parts.
fn split_name(path: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in path.trim().chars() {
        match c {
            '[' if !quoted => quoted = true,
            ']' if quoted => quoted = false,
            '.' if !quoted => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts
}

/// Load `table` on a connection leased from `pool` for this call only.
///
/// # Errors
/// `RequestError(ENAME)` for invalid names or a table missing on the server,
/// `RequestError(EREQUEST)` when the driver fails.
pub async fn bulk_insert<P: ConnectionPool>(
    pool: &P,
    table: &BulkTable,
) -> Result<u64, SqlMiddlewareDbError> {
    table.validate()?;
    let mut conn = pool.acquire().await?;
    let outcome = load(&mut conn, table).await;
    pool.release(conn);
    outcome
}

async fn load<C: DriverConnection + ?Sized>(
    conn: &mut C,
    table: &BulkTable,
) -> Result<u64, SqlMiddlewareDbError> {
    if table.create {
        let ddl = SynthesizedCommand::plain(table.create_if_missing());
        run_command(conn, &ddl, &RequestOptions::default()).await?;
    }

    match insert_batch(conn, table).await {
        Ok(Some(count)) => Ok(count),
        Ok(None) => Err(SqlMiddlewareDbError::request(
            RequestErrorCode::Name,
            format!("Table {} was not found on the server.", table.path),
        )),
        Err(err) => {
            flag_if_broken(conn, &err);
            Err(SqlMiddlewareDbError::from_driver(err))
        }
    }
}

/// `Ok(None)` when the bound table has no columns, i.e. it does not exist.
async fn insert_batch<C: DriverConnection + ?Sized>(
    conn: &mut C,
    table: &BulkTable,
) -> Result<Option<u64>, DriverError> {
    let mut binding = conn.bind_table(&table.binding_name()).await?;
    if binding.columns().is_empty() {
        return Ok(None);
    }
    let rows: Vec<NamedRow> = table
        .rows
        .iter()
        .map(|values| project_row(binding.columns(), values))
        .collect();
    tracing::debug!(table = %table.path, rows = rows.len(), "bulk insert");
    binding.insert_rows(rows).await?;
    Ok(Some(table.rows.len() as u64))
}

fn project_row(columns: &[Column], values: &[RowValues]) -> NamedRow {
    columns
        .iter()
        .enumerate()
        .map(|(i, col)| {
            let value = values.get(i).cloned().unwrap_or(RowValues::Null);
            (col.name.clone(), cast_parameter(value, col.sql_type))
        })
        .collect()
}
