use std::fmt;

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use tiberius::{AuthMethod, Config as TiberiusConfig};

use super::client::MssqlManager;
use crate::driver::ConnectionPool;
use crate::error::SqlMiddlewareDbError;
use crate::options::RequestOptions;
use crate::pool::ConfigAndPool;

const DEFAULT_PORT: u16 = 1433;
const DEFAULT_MAX_SIZE: u32 = 20;

/// Options for configuring an MSSQL pool.
#[derive(Debug, Clone)]
pub struct MssqlOptions {
    pub server: String,
    pub database: String,
    pub user: String,
    pub password: String,
    pub port: Option<u16>,
    pub instance_name: Option<String>,
    pub max_size: u32,
    pub parse_json: bool,
}

impl MssqlOptions {
    #[must_use]
    pub fn new(server: String, database: String, user: String, password: String) -> Self {
        Self {
            server,
            database,
            user,
            password,
            port: None,
            instance_name: None,
            max_size: DEFAULT_MAX_SIZE,
            parse_json: false,
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_instance_name(mut self, instance_name: Option<String>) -> Self {
        self.instance_name = instance_name;
        self
    }

    #[must_use]
    pub fn with_max_size(mut self, max_size: u32) -> Self {
        self.max_size = max_size;
        self
    }

    #[must_use]
    pub fn with_parse_json(mut self, parse_json: bool) -> Self {
        self.parse_json = parse_json;
        self
    }
}

/// Fluent builder for MSSQL options.
#[derive(Debug, Clone)]
pub struct MssqlOptionsBuilder {
    opts: MssqlOptions,
}

impl MssqlOptionsBuilder {
    #[must_use]
    pub fn new(server: String, database: String, user: String, password: String) -> Self {
        Self {
            opts: MssqlOptions::new(server, database, user, password),
        }
    }

    #[must_use]
    pub fn port(mut self, port: Option<u16>) -> Self {
        self.opts.port = port;
        self
    }

    #[must_use]
    pub fn instance_name(mut self, instance_name: Option<String>) -> Self {
        self.opts.instance_name = instance_name;
        self
    }

    #[must_use]
    pub fn max_size(mut self, max_size: u32) -> Self {
        self.opts.max_size = max_size;
        self
    }

    #[must_use]
    pub fn parse_json(mut self, parse_json: bool) -> Self {
        self.opts.parse_json = parse_json;
        self
    }

    #[must_use]
    pub fn finish(self) -> MssqlOptions {
        self.opts
    }

    /// Build a `ConfigAndPool` for SQL Server.
    ///
    /// # Errors
    ///
    /// Returns `SqlMiddlewareDbError` if pool creation fails.
    pub async fn build(self) -> Result<ConfigAndPool<MssqlPool>, SqlMiddlewareDbError> {
        ConfigAndPool::new_mssql(self.finish()).await
    }
}

/// bb8 pool of SQL Server connections.
#[derive(Clone)]
pub struct MssqlPool {
    pool: Pool<MssqlManager>,
}

impl MssqlPool {
    #[must_use]
    pub fn new(pool: Pool<MssqlManager>) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn inner(&self) -> &Pool<MssqlManager> {
        &self.pool
    }
}

impl fmt::Debug for MssqlPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MssqlPool")
            .field("state", &self.pool.state())
            .finish()
    }
}

#[async_trait]
impl ConnectionPool for MssqlPool {
    type Connection = PooledConnection<'static, MssqlManager>;

    async fn acquire(&self) -> Result<Self::Connection, SqlMiddlewareDbError> {
        let conn = self.pool.get_owned().await.map_err(|e| {
            SqlMiddlewareDbError::ConnectionError(format!("SQL Server pool error: {e}"))
        })?;
        tracing::debug!("leased SQL Server connection");
        Ok(conn)
    }

    fn release(&self, conn: Self::Connection) {
        // bb8 consults `has_broken` on drop and destroys flagged connections.
        tracing::debug!(unhealthy = conn.unhealthy, "returning SQL Server connection");
        drop(conn);
    }
}

impl ConfigAndPool<MssqlPool> {
    #[must_use]
    pub fn mssql_builder(
        server: String,
        database: String,
        user: String,
        password: String,
    ) -> MssqlOptionsBuilder {
        MssqlOptionsBuilder::new(server, database, user, password)
    }

    /// Asynchronous initializer for `ConfigAndPool` with SQL Server (MSSQL).
    ///
    /// # Errors
    /// Returns `SqlMiddlewareDbError::ConfigError` for a zero pool size and
    /// `SqlMiddlewareDbError::ConnectionError` if pool creation fails.
    pub async fn new_mssql(opts: MssqlOptions) -> Result<Self, SqlMiddlewareDbError> {
        if opts.max_size == 0 {
            return Err(SqlMiddlewareDbError::ConfigError(
                "SQL Server pool max_size must be at least 1".into(),
            ));
        }
        let manager = MssqlManager::new(build_tiberius_config(&opts));

        let pool = Pool::builder()
            .max_size(opts.max_size)
            .build(manager)
            .await
            .map_err(|e| {
                SqlMiddlewareDbError::ConnectionError(format!(
                    "Failed to create SQL Server pool: {e}"
                ))
            })?;

        Ok(ConfigAndPool::new(MssqlPool::new(pool))
            .with_options(RequestOptions::default().with_parse_json(opts.parse_json)))
    }
}

pub(crate) fn build_tiberius_config(opts: &MssqlOptions) -> TiberiusConfig {
    let mut config = TiberiusConfig::new();
    config.host(&opts.server);
    config.database(&opts.database);
    config.port(opts.port.unwrap_or(DEFAULT_PORT));
    config.authentication(AuthMethod::sql_server(&opts.user, &opts.password));
    if let Some(instance) = &opts.instance_name {
        config.instance_name(instance);
    }
    config.trust_cert();
    config
}
