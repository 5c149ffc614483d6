//! API Server
//!
//! Router assembly, middleware stack and graceful shutdown.

use super::{
    handlers::AppState,
    middleware::{create_cors_layer, request_id_middleware},
    routes::create_router,
};
use crate::config::ServerConfig;
use crate::factory::RgsServices;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};

/// Router with every layer attached
pub fn create_app(services: &RgsServices, config: &ServerConfig) -> axum::Router {
    let state = Arc::new(AppState {
        store: services.store.clone(),
        sessions: services.sessions.clone(),
        orchestrator: services.orchestrator.clone(),
        metrics: services.metrics.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    });

    create_router(state)
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
        // CORS outside the timeout so preflights answer immediately
        .layer(create_cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http())
        // Outermost, so responses built by the layers above get the header too
        .layer(axum::middleware::from_fn(request_id_middleware))
}

pub struct ApiServer {
    config: ServerConfig,
    services: RgsServices,
}

impl ApiServer {
    pub fn new(config: ServerConfig, services: RgsServices) -> Self {
        Self { config, services }
    }

    /// Serve until Ctrl+C or SIGTERM
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let app = create_app(&self.services, &self.config);
        let addr = self.get_socket_addr()?;

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(
            %addr,
            store = self.services.store.name(),
            games = ?self.services.orchestrator.games().game_ids(),
            "RGS API listening"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("API server stopped gracefully");
        Ok(())
    }

    fn get_socket_addr(&self) -> Result<SocketAddr, Box<dyn std::error::Error>> {
        Ok(SocketAddr::from((
            self.config.host.parse::<std::net::IpAddr>()?,
            self.config.port,
        )))
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
