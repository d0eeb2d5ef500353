use crate::driver::ConnectionPool;
use crate::options::RequestOptions;
use crate::request::Request;
use crate::transaction::Transaction;

/// Configuration and connection pool for a database
///
/// Holds the pool together with the request defaults every request and
/// transaction created from it starts with.
#[derive(Clone, Debug)]
pub struct ConfigAndPool<P> {
    /// The connection pool
    pub pool: P,
    /// Defaults applied to requests and transactions
    pub options: RequestOptions,
}

impl<P: ConnectionPool + Clone> ConfigAndPool<P> {
    #[must_use]
    pub fn new(pool: P) -> Self {
        Self {
            pool,
            options: RequestOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// A request leasing connections from this pool.
    #[must_use]
    pub fn request(&self) -> Request<'_, P> {
        Request::new(&self.pool).with_options(self.options.clone())
    }

    /// A transaction that will lease its connection from this pool on `begin`.
    #[must_use]
    pub fn transaction(&self) -> Transaction<P> {
        Transaction::new(self.pool.clone()).with_options(self.options.clone())
    }
}
