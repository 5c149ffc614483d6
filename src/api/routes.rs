//! Route Definitions

use super::handlers::*;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Build the API router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        // Sessions
        .route("/session/start", post(start_session_handler))
        .route("/session/:session_id/end", post(end_session_handler))
        // Rounds
        .route("/games/:game_id/spin", post(spin_handler))
        .route("/rounds/:round_id", get(round_handler))
        .route("/rounds/:round_id/verify", get(verify_round_handler))
        .route("/wallets/:player_id", get(wallet_handler))
        // Prometheus scrape target
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}
