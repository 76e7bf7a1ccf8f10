pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod presenter;
pub mod query;
pub mod repository;
pub mod server;
pub mod state;
pub mod telemetry;

use crate::{config::AppConfig, server::Server};

/// Bootstraps the rentals service using environment configuration.
pub async fn run() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    Server::new(config).await?.run().await
}
