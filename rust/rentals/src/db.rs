use crate::config::{AppConfig, DatabaseConfig};
use anyhow::{Context, Result};
use async_trait::async_trait;
use bb8::{ManageConnection, Pool};
use diesel_async::{AsyncPgConnection, SimpleAsyncConnection};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore};
use rustls_pemfile::certs;
use std::fs::File;
use std::io::BufReader;
use tokio_postgres::{Client, Config as PgConfig, NoTls};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{info, warn};

pub type PgPool = Pool<PgConnectionManager>;

/// Builds the connection pool and fails if the database cannot be reached.
pub async fn connect_pool(config: &AppConfig) -> Result<PgPool> {
    let manager = PgConnectionManager::new(&config.database)?;
    let pool = Pool::builder()
        .max_size(config.max_pool_size)
        .build(manager)
        .await
        .context("failed to build PostgreSQL connection pool")?;

    pool.get()
        .await
        .map_err(|err| anyhow::anyhow!("{err:?}"))
        .with_context(|| {
            format!(
                "failed to connect to {}:{}/{}",
                config.database.host, config.database.port, config.database.name
            )
        })?;
    info!("database connectivity check succeeded");

    Ok(pool)
}

/// Opens a standalone session outside the pool. Statements prepared on it
/// live until they are dropped or the session ends.
pub async fn connect_session(database: &DatabaseConfig) -> Result<Client> {
    PgConnectionManager::new(database)?
        .connect_session()
        .await
        .with_context(|| {
            format!(
                "failed to open statement session to {}:{}/{}",
                database.host, database.port, database.name
            )
        })
}

#[derive(Clone)]
pub struct PgConnectionManager {
    config: PgConfig,
    tls: PgTls,
}

#[derive(Clone)]
enum PgTls {
    None,
    Rustls(MakeRustlsConnect),
}

impl PgConnectionManager {
    pub fn new(database: &DatabaseConfig) -> Result<Self> {
        let mut config = PgConfig::new();
        config
            .host(&database.host)
            .port(database.port)
            .user(&database.username)
            .password(&database.password)
            .dbname(&database.name)
            .application_name("rentals");

        let tls = match database.ssl_root_cert.as_deref() {
            Some(path) => PgTls::Rustls(build_tls_connector(
                path,
                database.ssl_cert.as_deref(),
                database.ssl_key.as_deref(),
            )?),
            None => PgTls::None,
        };
        Ok(Self { config, tls })
    }

    async fn connect_session(&self) -> Result<Client> {
        let config = self.config.clone();
        match &self.tls {
            PgTls::None => {
                let (client, connection) = config.connect(NoTls).await?;
                tokio::spawn(async move {
                    if let Err(err) = connection.await {
                        warn!(error = ?err, "statement session closed with error");
                    }
                });
                Ok(client)
            }
            PgTls::Rustls(connector) => {
                let (client, connection) = config.connect(connector.clone()).await?;
                tokio::spawn(async move {
                    if let Err(err) = connection.await {
                        warn!(error = ?err, "statement session closed with error");
                    }
                });
                Ok(client)
            }
        }
    }
}

#[async_trait]
impl ManageConnection for PgConnectionManager {
    type Connection = AsyncPgConnection;
    type Error = anyhow::Error;

    async fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let config = self.config.clone();
        match &self.tls {
            PgTls::None => {
                let (client, connection) = config.connect(NoTls).await?;
                AsyncPgConnection::try_from_client_and_connection(client, connection)
                    .await
                    .map_err(|err| anyhow::anyhow!(err))
            }
            PgTls::Rustls(connector) => {
                let (client, connection) = config.connect(connector.clone()).await?;
                AsyncPgConnection::try_from_client_and_connection(client, connection)
                    .await
                    .map_err(|err| anyhow::anyhow!(err))
            }
        }
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.batch_execute("SELECT 1").await?;
        Ok(())
    }

    fn has_broken(&self, _: &mut Self::Connection) -> bool {
        false
    }
}

fn build_tls_connector(
    root_cert: &str,
    client_cert: Option<&str>,
    client_key: Option<&str>,
) -> Result<MakeRustlsConnect> {
    let mut reader = BufReader::new(
        File::open(root_cert)
            .with_context(|| format!("failed to open PGSSLROOTCERT file '{root_cert}'"))?,
    );
    let mut root_store = RootCertStore::empty();
    for cert in certs(&mut reader) {
        let cert = cert.context("failed to parse PGSSLROOTCERT")?;
        root_store
            .add(cert)
            .map_err(|_| anyhow::anyhow!("invalid certificate in PGSSLROOTCERT"))?;
    }

    let builder = ClientConfig::builder().with_root_certificates(root_store);
    let client_config = match (client_cert, client_key) {
        (None, None) => builder.with_no_client_auth(),
        (Some(cert), Some(key)) => builder
            .with_client_auth_cert(load_client_certs(cert)?, load_client_key(key)?)
            .with_context(|| format!("failed to build client TLS config for {root_cert}"))?,
        _ => anyhow::bail!("PGSSLCERT and PGSSLKEY must both be set (or neither)"),
    };

    Ok(MakeRustlsConnect::new(client_config))
}

fn load_client_certs(path: &str) -> Result<Vec<CertificateDer<'static>>> {
    let mut reader = BufReader::new(
        File::open(path).with_context(|| format!("failed to open PGSSLCERT file '{path}'"))?,
    );

    let chain = certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to parse PGSSLCERT")?;
    if chain.is_empty() {
        anyhow::bail!("PGSSLCERT contained no certificates");
    }

    Ok(chain)
}

fn load_client_key(path: &str) -> Result<PrivateKeyDer<'static>> {
    let mut reader = BufReader::new(
        File::open(path).with_context(|| format!("failed to open PGSSLKEY file '{path}'"))?,
    );

    rustls_pemfile::private_key(&mut reader)
        .context("failed to parse PGSSLKEY")?
        .context("PGSSLKEY contained no private keys")
}
