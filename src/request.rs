use crate::bulk::{BulkTable, bulk_insert};
use crate::command::{SynthesizedCommand, synthesize_procedure, synthesize_query};
use crate::driver::ConnectionPool;
use crate::error::SqlMiddlewareDbError;
use crate::materializer::{Materialized, run_command};
use crate::options::RequestOptions;
use crate::params::{Parameter, Parameters};
use crate::results::{OutputParameters, QueryResult, RETURN_FIELD, Row};
use crate::transaction::Transaction;
use crate::types::{RowValues, SqlType};

/// Where a request gets its connection from.
pub enum RequestTarget<'a, P: ConnectionPool> {
    /// Lease a fresh connection per operation.
    Pool(&'a P),
    /// Run on the connection a begun transaction holds.
    Transaction(&'a mut Transaction<P>),
}

/// One logical operation: parameters plus the command that uses them.
///
/// ```rust,no_run
/// # use mssql_request::prelude::*;
/// # async fn demo<P: ConnectionPool>(pool: &P) -> Result<(), SqlMiddlewareDbError> {
/// let mut request = Request::new(pool);
/// request
///     .input("id", SqlType::Int, RowValues::Int(5))
///     .output("total", SqlType::Money);
/// let result = request.execute("dbo.order_total").await?;
/// let total = result.output.get("total");
/// # let _ = (total, result.return_value);
/// # Ok(())
/// # }
/// ```
pub struct Request<'a, P: ConnectionPool> {
    target: RequestTarget<'a, P>,
    params: Parameters,
    options: RequestOptions,
}

impl<'a, P: ConnectionPool> Request<'a, P> {
    #[must_use]
    pub fn new(pool: &'a P) -> Self {
        Self {
            target: RequestTarget::Pool(pool),
            params: Parameters::new(),
            options: RequestOptions::default(),
        }
    }

    /// A request running inside `tx`. Inherits the transaction's options.
    #[must_use]
    pub fn from_transaction(tx: &'a mut Transaction<P>) -> Self {
        let options = tx.options().clone();
        Self {
            target: RequestTarget::Transaction(tx),
            params: Parameters::new(),
            options,
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options_mut(&mut self) -> &mut RequestOptions {
        &mut self.options
    }

    #[must_use]
    pub fn options(&self) -> &RequestOptions {
        &self.options
    }

    /// Add an input parameter.
    pub fn input(&mut self, name: &str, sql_type: SqlType, value: RowValues) -> &mut Self {
        self.params.add(Parameter::input(name, sql_type, value));
        self
    }

    /// Add an output parameter; its value is filled in after execution.
    pub fn output(&mut self, name: &str, sql_type: SqlType) -> &mut Self {
        self.params.add(Parameter::output(name, sql_type));
        self
    }

    /// Add a fully specified parameter (length, precision, scale).
    pub fn parameter(&mut self, param: Parameter) -> &mut Self {
        self.params.add(param);
        self
    }

    #[must_use]
    pub fn parameters(&self) -> &Parameters {
        &self.params
    }

    /// Run `command` with the request's parameters.
    ///
    /// # Errors
    /// `ConnectionError` when no connection can be leased, `RequestError(EREQUEST)`
    /// when the driver reports a failure, `TransactionError(ENOTBEGUN)` when the
    /// owning transaction holds no connection.
    pub async fn query(&mut self, command: &str) -> Result<QueryResult, SqlMiddlewareDbError> {
        if command.is_empty() {
            return Ok(QueryResult::default());
        }
        let synthesized = synthesize_query(command, &self.params);
        let materialized = self.run(&synthesized).await?;
        Ok(self.complete(materialized, false))
    }

    /// Run a batch of statements.
    ///
    /// The driver executes batches and queries the same way, so this shares the
    /// query pipeline, parameters included.
    ///
    /// # Errors
    /// Same as [`Request::query`].
    pub async fn batch(&mut self, command: &str) -> Result<QueryResult, SqlMiddlewareDbError> {
        self.query(command).await
    }

    /// Call a stored procedure, collecting its return code and output parameters.
    ///
    /// # Errors
    /// Same as [`Request::query`].
    pub async fn execute(&mut self, procedure: &str) -> Result<QueryResult, SqlMiddlewareDbError> {
        let synthesized = synthesize_procedure(procedure, &self.params);
        let materialized = self.run(&synthesized).await?;
        Ok(self.complete(materialized, true))
    }

    /// Bulk-load `table`. Always leases its own connection from the pool, even when
    /// the request belongs to a transaction.
    ///
    /// # Errors
    /// `RequestError(ENAME)` for a missing/invalid table name or a table that does
    /// not exist, `RequestError(EREQUEST)` for driver failures.
    pub async fn bulk(&mut self, table: &BulkTable) -> Result<u64, SqlMiddlewareDbError> {
        let pool: &P = match &self.target {
            RequestTarget::Pool(pool) => *pool,
            RequestTarget::Transaction(tx) => tx.pool(),
        };
        bulk_insert(pool, table).await
    }

    /// In-flight commands cannot be cancelled; always returns `false`.
    #[must_use]
    pub fn cancel(&self) -> bool {
        false
    }

    async fn run(
        &mut self,
        command: &SynthesizedCommand,
    ) -> Result<Materialized, SqlMiddlewareDbError> {
        match &mut self.target {
            RequestTarget::Pool(pool) => {
                let mut conn = pool.acquire().await?;
                let outcome = run_command(&mut conn, command, &self.options).await;
                pool.release(conn);
                outcome
            }
            RequestTarget::Transaction(tx) => {
                let conn = tx.connection_mut()?;
                run_command(conn, command, &self.options).await
            }
        }
    }

    fn complete(&mut self, materialized: Materialized, with_return: bool) -> QueryResult {
        let Materialized {
            recordsets,
            rows_affected,
            projection,
        } = materialized;

        let mut output = OutputParameters::new();
        let mut return_value = None;
        if let Some(row) = projection {
            output = self.apply_outputs(&row);
            if with_return {
                return_value = row
                    .get_value(RETURN_FIELD)
                    .and_then(RowValues::as_int)
                    .and_then(|v| i32::try_from(*v).ok());
            }
        }

        QueryResult {
            recordsets,
            output,
            rows_affected,
            return_value,
        }
    }

    fn apply_outputs(&mut self, row: &Row) -> OutputParameters {
        let names: Vec<String> = self.params.outputs().map(|p| p.name.clone()).collect();
        let mut output = OutputParameters::new();
        for name in names {
            let value = row.get_value(&name).cloned().unwrap_or(RowValues::Null);
            self.params.set_value(&name, value.clone());
            output.insert(name, value);
        }
        output
    }
}
