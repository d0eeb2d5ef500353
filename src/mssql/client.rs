use bb8::ManageConnection;
use tiberius::{Client, Config as TiberiusConfig, SqlBrowser};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use super::config::{MssqlOptions, build_tiberius_config};
use crate::error::SqlMiddlewareDbError;

/// Type alias for SQL Server client
pub type MssqlClient = Client<Compat<TcpStream>>;

/// Open one TCP connection and log in, following a single server redirect.
pub(crate) async fn connect(config: TiberiusConfig) -> tiberius::Result<MssqlClient> {
    let tcp = TcpStream::connect_named(&config).await?;
    tcp.set_nodelay(true)?;

    match Client::connect(config.clone(), tcp.compat_write()).await {
        Err(tiberius::error::Error::Routing { host, port }) => {
            tracing::debug!(%host, port, "SQL Server redirected the login");
            let mut config = config;
            config.host(&host);
            config.port(port);
            let tcp = TcpStream::connect(config.get_addr()).await?;
            tcp.set_nodelay(true)?;
            Client::connect(config, tcp.compat_write()).await
        }
        other => other,
    }
}

/// Helper function to create a new MSSQL connection outside of any pool
///
/// # Errors
/// Returns `SqlMiddlewareDbError::MssqlError` carrying the tiberius failure.
pub async fn create_mssql_client(opts: &MssqlOptions) -> Result<MssqlClient, SqlMiddlewareDbError> {
    Ok(connect(build_tiberius_config(opts)).await?)
}

/// A pooled SQL Server session plus the health flag the request layer sets.
pub struct MssqlConnection {
    pub(crate) client: MssqlClient,
    pub(crate) unhealthy: bool,
}

impl MssqlConnection {
    #[must_use]
    pub fn new(client: MssqlClient) -> Self {
        Self {
            client,
            unhealthy: false,
        }
    }

    /// Direct access to the tiberius client.
    pub fn client_mut(&mut self) -> &mut MssqlClient {
        &mut self.client
    }
}

/// bb8 manager for SQL Server clients.
#[derive(Debug, Clone)]
pub struct MssqlManager {
    pub(crate) config: TiberiusConfig,
}

impl MssqlManager {
    #[must_use]
    pub fn new(config: TiberiusConfig) -> Self {
        Self { config }
    }
}

impl ManageConnection for MssqlManager {
    type Connection = MssqlConnection;
    type Error = tiberius::error::Error;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let cfg = self.config.clone();
        async move {
            let client = connect(cfg).await?;
            tracing::debug!("SQL Server connection established");
            Ok(MssqlConnection::new(client))
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move {
            conn.client
                .simple_query("SELECT 1")
                .await?
                .into_row()
                .await
                .map(|_| ())
        }
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.unhealthy
    }
}
