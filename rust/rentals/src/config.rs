use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    fmt,
    net::{SocketAddr, ToSocketAddrs},
    time::Duration,
};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub database: DatabaseConfig,
    pub max_pool_size: u32,
    pub shutdown_grace: Duration,
}

/// Connection parameters for the rentals database.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub name: String,
    pub ssl_root_cert: Option<String>,
    pub ssl_cert: Option<String>,
    pub ssl_key: Option<String>,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .field("ssl_root_cert", &self.ssl_root_cert)
            .field("ssl_cert", &self.ssl_cert)
            .field("ssl_key", &self.ssl_key)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    port: Option<u16>,
    db_host: String,
    db_port: u16,
    db_username: String,
    db_password: String,
    db_name: String,
    #[serde(default = "default_pool_size")]
    db_max_pool_size: u32,
    #[serde(default = "default_shutdown_grace_secs")]
    shutdown_grace_secs: u64,
    #[serde(default)]
    pgsslrootcert: Option<String>,
    #[serde(default)]
    pgsslcert: Option<String>,
    #[serde(default)]
    pgsslkey: Option<String>,
}

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 8080;

const fn default_pool_size() -> u32 {
    10
}

const fn default_shutdown_grace_secs() -> u64 {
    5
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Builds the configuration from explicit `KEY=value` pairs.
    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let raw: RawConfig = envy::from_iter(vars)
            .context("failed to parse HOST/PORT and DB_* environment variables")?;

        let listen_addr = resolve_addr(raw.host, raw.port)?;

        Ok(Self {
            listen_addr,
            database: DatabaseConfig {
                host: raw.db_host,
                port: raw.db_port,
                username: raw.db_username,
                password: raw.db_password,
                name: raw.db_name,
                ssl_root_cert: raw.pgsslrootcert,
                ssl_cert: raw.pgsslcert,
                ssl_key: raw.pgsslkey,
            },
            max_pool_size: raw.db_max_pool_size.max(1),
            shutdown_grace: Duration::from_secs(raw.shutdown_grace_secs),
        })
    }
}

fn resolve_addr(host: Option<String>, port: Option<u16>) -> Result<SocketAddr> {
    let host = host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = port.unwrap_or(DEFAULT_PORT);
    let combined = format!("{}:{}", host, port);
    combined
        .to_socket_addrs()
        .context("invalid HOST/PORT combination")?
        .next()
        .context("listen address resolved to no targets")
}
