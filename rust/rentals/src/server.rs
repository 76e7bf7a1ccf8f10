use crate::{
    config::AppConfig,
    db,
    presenter,
    repository::{PgRentalRepository, RentalStore},
    state::AppState,
};
use anyhow::Context;
use axum::{routing::get, Json, Router};
use serde_json::json;
use std::{future::Future, sync::Arc};
use tokio::{net::TcpListener, signal, sync::oneshot, time::timeout};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub struct Server {
    config: Arc<AppConfig>,
    state: AppState,
}

impl Server {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let pool = db::connect_pool(&config).await?;
        let session = db::connect_session(&config.database).await?;
        let repository = PgRentalRepository::new(pool, session)
            .await
            .context("failed to prepare rental statements")?;
        let rentals: Arc<dyn RentalStore> = Arc::new(repository);
        Ok(Self::with_store(config, rentals))
    }

    /// Assembles a server around an existing store.
    pub fn with_store(config: AppConfig, rentals: Arc<dyn RentalStore>) -> Self {
        Self {
            config: Arc::new(config),
            state: AppState::new(rentals),
        }
    }

    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    /// Serves until SIGINT, SIGTERM or SIGQUIT.
    pub async fn run(self) -> anyhow::Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Serves until `shutdown` resolves, drains in-flight requests for at
    /// most the configured grace period, then releases the store.
    pub async fn run_until<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        let addr = self.config.listen_addr;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        info!(%addr, "rentals service listening");

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = self.router();
        let mut server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        let served = tokio::select! {
            joined = &mut server => Some(joined),
            _ = shutdown => None,
        };

        let outcome = match served {
            Some(joined) => joined
                .context("server task failed")
                .and_then(|result| result.context("server stopped unexpectedly")),
            None => {
                let _ = shutdown_tx.send(());
                let grace = self.config.shutdown_grace;
                match timeout(grace, &mut server).await {
                    Ok(joined) => joined
                        .context("server task failed")
                        .and_then(|result| result.context("server error during shutdown")),
                    Err(_) => {
                        warn!(?grace, "in-flight requests did not finish in time");
                        server.abort();
                        Ok(())
                    }
                }
            }
        };

        self.state
            .rentals
            .close()
            .await
            .context("failed to release rental statements")?;
        info!("rentals service stopped");

        outcome
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/rentals", get(presenter::retrieve_rentals))
        .route("/rentals/", get(presenter::retrieve_rental_by_id))
        .route("/rentals/:id", get(presenter::retrieve_rental_by_id))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = ?err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = ?err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let quit = async {
        match signal::unix::signal(signal::unix::SignalKind::quit()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = ?err, "failed to install SIGQUIT handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();
    #[cfg(not(unix))]
    let quit = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received terminate signal, shutting down"),
        _ = quit => info!("received quit signal, shutting down"),
    }
}
