use std::fmt;

use thiserror::Error;

use crate::driver::DriverError;

/// Sub-codes carried by [`SqlMiddlewareDbError::RequestError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestErrorCode {
    /// Invalid bulk target name, or the target table does not exist.
    Name,
    /// The driver reported an execution failure.
    Request,
    /// A chunked JSON payload failed to parse.
    Json,
}

impl RequestErrorCode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RequestErrorCode::Name => "ENAME",
            RequestErrorCode::Request => "EREQUEST",
            RequestErrorCode::Json => "EJSON",
        }
    }
}

impl fmt::Display for RequestErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sub-codes carried by [`SqlMiddlewareDbError::TransactionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionErrorCode {
    /// `begin` was called on a transaction that already left `Idle`.
    AlreadyBegun,
    /// The transaction holds no connection (never begun, or already finished).
    NotBegun,
    /// Unknown isolation level.
    Isolation,
    /// `COMMIT`/`ROLLBACK` failed; the lease has been released anyway.
    Aborted,
}

impl TransactionErrorCode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionErrorCode::AlreadyBegun => "EALREADYBEGUN",
            TransactionErrorCode::NotBegun => "ENOTBEGUN",
            TransactionErrorCode::Isolation => "EISOLATION",
            TransactionErrorCode::Aborted => "EABORT",
        }
    }
}

impl fmt::Display for TransactionErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum SqlMiddlewareDbError {
    #[cfg(feature = "mssql")]
    #[error(transparent)]
    MssqlError(#[from] tiberius::error::Error),

    #[error("Request error ({code}): {message}")]
    RequestError {
        code: RequestErrorCode,
        message: String,
        #[source]
        source: Option<DriverError>,
    },

    #[error("Transaction error ({code}): {message}")]
    TransactionError {
        code: TransactionErrorCode,
        message: String,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),
}

impl SqlMiddlewareDbError {
    pub(crate) fn request(code: RequestErrorCode, message: impl Into<String>) -> Self {
        SqlMiddlewareDbError::RequestError {
            code,
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn transaction(code: TransactionErrorCode, message: impl Into<String>) -> Self {
        SqlMiddlewareDbError::TransactionError {
            code,
            message: message.into(),
        }
    }

    /// Request-level `EREQUEST` error wrapping a driver failure.
    #[must_use]
    pub fn from_driver(err: DriverError) -> Self {
        SqlMiddlewareDbError::RequestError {
            code: RequestErrorCode::Request,
            message: err.message.clone(),
            source: Some(err),
        }
    }

    /// Request sub-code, if this is a request error.
    #[must_use]
    pub fn request_code(&self) -> Option<RequestErrorCode> {
        match self {
            SqlMiddlewareDbError::RequestError { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Transaction sub-code, if this is a transaction error.
    #[must_use]
    pub fn transaction_code(&self) -> Option<TransactionErrorCode> {
        match self {
            SqlMiddlewareDbError::TransactionError { code, .. } => Some(*code),
            _ => None,
        }
    }
}
