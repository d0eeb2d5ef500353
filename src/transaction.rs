use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::command::SynthesizedCommand;
use crate::driver::{ConnectionPool, DriverConnection};
use crate::error::{SqlMiddlewareDbError, TransactionErrorCode};
use crate::materializer::run_command;
use crate::options::RequestOptions;
use crate::request::Request;

/// Session isolation level used when a transaction begins.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize,
)]
pub enum IsolationLevel {
    ReadUncommitted,
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
    Snapshot,
}

impl IsolationLevel {
    /// Text used in `SET TRANSACTION ISOLATION LEVEL`.
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
            IsolationLevel::Snapshot => "SNAPSHOT",
        }
    }

    /// Numeric code (1 through 5, in the order above).
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            IsolationLevel::ReadUncommitted => 1,
            IsolationLevel::ReadCommitted => 2,
            IsolationLevel::RepeatableRead => 3,
            IsolationLevel::Serializable => 4,
            IsolationLevel::Snapshot => 5,
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

fn invalid_isolation(level: impl fmt::Display) -> SqlMiddlewareDbError {
    SqlMiddlewareDbError::transaction(
        TransactionErrorCode::Isolation,
        format!("Invalid isolation level: {level}"),
    )
}

impl TryFrom<u8> for IsolationLevel {
    type Error = SqlMiddlewareDbError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(IsolationLevel::ReadUncommitted),
            2 => Ok(IsolationLevel::ReadCommitted),
            3 => Ok(IsolationLevel::RepeatableRead),
            4 => Ok(IsolationLevel::Serializable),
            5 => Ok(IsolationLevel::Snapshot),
            other => Err(invalid_isolation(other)),
        }
    }
}

/// Accepts `READ COMMITTED`, `read_committed`, `read-committed` and `ReadCommitted`.
impl FromStr for IsolationLevel {
    type Err = SqlMiddlewareDbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "readuncommitted" => Ok(IsolationLevel::ReadUncommitted),
            "readcommitted" => Ok(IsolationLevel::ReadCommitted),
            "repeatableread" => Ok(IsolationLevel::RepeatableRead),
            "serializable" => Ok(IsolationLevel::Serializable),
            "snapshot" => Ok(IsolationLevel::Snapshot),
            _ => Err(invalid_isolation(s)),
        }
    }
}

/// Lifecycle of a [`Transaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Idle,
    Begun,
    Committed,
    RolledBack,
    /// `COMMIT`/`ROLLBACK` failed; the connection was released anyway.
    Aborted,
}

/// A logical transaction pinned to one leased connection.
///
/// The connection is held from a successful [`begin`](Transaction::begin) until
/// [`commit`](Transaction::commit) or [`rollback`](Transaction::rollback) finishes,
/// whatever the outcome. Dropping a begun transaction flags its connection unhealthy
/// and returns it, so the pool never hands out a session stuck mid-transaction.
pub struct Transaction<P: ConnectionPool> {
    pool: P,
    options: RequestOptions,
    isolation_level: IsolationLevel,
    conn: Option<P::Connection>,
    state: TransactionState,
}

impl<P: ConnectionPool> Transaction<P> {
    #[must_use]
    pub fn new(pool: P) -> Self {
        Self {
            pool,
            options: RequestOptions::default(),
            isolation_level: IsolationLevel::default(),
            conn: None,
            state: TransactionState::Idle,
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    #[must_use]
    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }

    #[must_use]
    pub fn options(&self) -> &RequestOptions {
        &self.options
    }

    #[must_use]
    pub fn pool(&self) -> &P {
        &self.pool
    }

    /// A request that runs on this transaction's connection.
    pub fn request(&mut self) -> Request<'_, P> {
        Request::from_transaction(self)
    }

    pub(crate) fn connection_mut(&mut self) -> Result<&mut P::Connection, SqlMiddlewareDbError> {
        self.conn.as_mut().ok_or_else(|| {
            SqlMiddlewareDbError::transaction(
                TransactionErrorCode::NotBegun,
                "Transaction has not begun. Call begin() first.",
            )
        })
    }

    /// Lease a connection and start the transaction on it.
    ///
    /// # Errors
    /// `TransactionError(EALREADYBEGUN)` unless the transaction is `Idle`;
    /// `ConnectionError` when leasing fails; `RequestError` when the server rejects
    /// the statement, in which case the lease is released and the state stays `Idle`.
    pub async fn begin(&mut self, level: IsolationLevel) -> Result<(), SqlMiddlewareDbError> {
        if self.state != TransactionState::Idle {
            return Err(SqlMiddlewareDbError::transaction(
                TransactionErrorCode::AlreadyBegun,
                "Transaction has already begun.",
            ));
        }

        let mut conn = self.pool.acquire().await?;
        let statement = SynthesizedCommand::plain(format!(
            "SET TRANSACTION ISOLATION LEVEL {};BEGIN TRAN;",
            level.as_sql()
        ));
        match run_command(&mut conn, &statement, &self.options.batch()).await {
            Ok(_) => {
                tracing::debug!(isolation = %level, "transaction begun");
                self.conn = Some(conn);
                self.isolation_level = level;
                self.state = TransactionState::Begun;
                Ok(())
            }
            Err(err) => {
                self.pool.release(conn);
                Err(err)
            }
        }
    }

    /// Commit and release the connection.
    ///
    /// # Errors
    /// `TransactionError(ENOTBEGUN)` without a held connection; `TransactionError(EABORT)`
    /// when `COMMIT` fails (the connection is released regardless).
    pub async fn commit(&mut self) -> Result<(), SqlMiddlewareDbError> {
        self.finish("COMMIT TRAN", TransactionState::Committed).await
    }

    /// Roll back and release the connection.
    ///
    /// # Errors
    /// Same as [`Transaction::commit`].
    pub async fn rollback(&mut self) -> Result<(), SqlMiddlewareDbError> {
        self.finish("ROLLBACK TRAN", TransactionState::RolledBack).await
    }

    async fn finish(
        &mut self,
        statement: &str,
        on_success: TransactionState,
    ) -> Result<(), SqlMiddlewareDbError> {
        let Some(mut conn) = self.conn.take() else {
            return Err(SqlMiddlewareDbError::transaction(
                TransactionErrorCode::NotBegun,
                "Transaction has not begun. Call begin() first.",
            ));
        };

        let outcome = run_command(
            &mut conn,
            &SynthesizedCommand::plain(statement),
            &self.options.batch(),
        )
        .await;
        self.pool.release(conn);

        match outcome {
            Ok(_) => {
                self.state = on_success;
                Ok(())
            }
            Err(err) => {
                self.state = TransactionState::Aborted;
                Err(SqlMiddlewareDbError::transaction(
                    TransactionErrorCode::Aborted,
                    format!("{statement} failed: {err}"),
                ))
            }
        }
    }
}

impl<P: ConnectionPool> Drop for Transaction<P> {
    fn drop(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            tracing::warn!("transaction dropped without commit or rollback; discarding its connection");
            conn.mark_unhealthy();
            self.pool.release(conn);
        }
    }
}
