//! Request Handlers
//!
//! Thin adapters: parse, call the core, map the result.

use super::{errors::ApiError, middleware::RequestId, models::*};
use crate::common::Amount;
use crate::errors::DeclineReason;
use crate::ledger::StoreBackend;
use crate::metrics::SpinMetrics;
use crate::orchestrator::{RoundOrchestrator, RoundVerification, SpinRequest};
use crate::sessions::SessionService;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::header,
    response::{IntoResponse, Response},
    Extension, Json,
};
use std::sync::Arc;

/// Shared application state
pub struct AppState {
    pub store: Arc<dyn StoreBackend>,
    pub sessions: Arc<SessionService>,
    pub orchestrator: Arc<RoundOrchestrator>,
    pub metrics: Arc<SpinMetrics>,
    pub version: String,
}

fn json_body<T>(request_id: &RequestId, body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value).map_err(|rejection| {
        ApiError::declined(
            request_id.0.clone(),
            DeclineReason::InvalidRequest(rejection.body_text()),
        )
    })
}

/// Decimal bet from the wire. Non-positive values become a zero wager so the
/// core declines them after the session check.
fn parse_wager(request_id: &RequestId, bet_amount: f64) -> Result<Amount, ApiError> {
    if !bet_amount.is_finite() {
        return Err(ApiError::declined(
            request_id.0.clone(),
            DeclineReason::InvalidAmount(bet_amount.to_string()),
        ));
    }
    if bet_amount <= 0.0 {
        return Ok(Amount::ZERO);
    }
    Amount::from_major(bet_amount).ok_or_else(|| {
        ApiError::declined(
            request_id.0.clone(),
            DeclineReason::InvalidAmount(bet_amount.to_string()),
        )
    })
}

/// GET /health
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let store_ok = state.store.ping().is_ok();
    Json(HealthResponse {
        status: if store_ok { "ok" } else { "degraded" }.to_string(),
        service: "rgs-core".to_string(),
        store: if store_ok { "ok" } else { "error" }.to_string(),
        version: state.version.clone(),
    })
}

/// POST /session/start
pub async fn start_session_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    body: Result<Json<SessionStartRequest>, JsonRejection>,
) -> Result<Json<SessionStartResponse>, ApiError> {
    let body = json_body(&request_id, body)?;

    let started = state
        .sessions
        .start_session(&body.operator_id, &body.external_player_id, &body.currency)
        .await
        .map_err(|e| {
            if let Some(reason) = e.decline_reason() {
                state.metrics.record_decline(reason.code());
            }
            ApiError::from_rgs(request_id.0.clone(), e)
        })?;
    state.metrics.record_session_started();

    Ok(Json(SessionStartResponse {
        session_id: started.session.session_id,
        player_id: started.session.player_id,
        currency: started.session.currency,
        created_at: started.session.created_at,
        balance: started.wallet.balance.to_major(),
    }))
}

/// POST /session/:session_id/end
pub async fn end_session_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionEndResponse>, ApiError> {
    let session = state
        .sessions
        .close_session(&session_id)
        .await
        .map_err(|e| ApiError::from_rgs(request_id.0.clone(), e))?;

    Ok(Json(SessionEndResponse {
        session_id: session.session_id,
        active: session.active,
    }))
}

/// POST /games/:game_id/spin
pub async fn spin_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(game_id): Path<String>,
    body: Result<Json<SpinRequestBody>, JsonRejection>,
) -> Result<Json<SpinResponse>, ApiError> {
    let body = json_body(&request_id, body)?;
    let wager = parse_wager(&request_id, body.bet_amount)?;

    let result = state
        .orchestrator
        .spin(SpinRequest {
            session_id: body.session_id,
            player_id: body.player_id,
            game_id,
            wager,
            currency: body.currency,
        })
        .await
        .map_err(|e| ApiError::from_rgs(request_id.0.clone(), e))?;

    Ok(Json(result.into()))
}

/// GET /rounds/:round_id
pub async fn round_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(round_id): Path<String>,
) -> Result<Json<RoundResponse>, ApiError> {
    let round = state
        .orchestrator
        .load_round(&round_id)
        .map_err(|e| ApiError::from_rgs(request_id.0.clone(), e))?
        .ok_or_else(|| {
            ApiError::not_found(request_id.0.clone(), format!("Round {} not found", round_id))
        })?;

    Ok(Json(round.into()))
}

/// GET /rounds/:round_id/verify
pub async fn verify_round_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(round_id): Path<String>,
) -> Result<Json<RoundVerification>, ApiError> {
    state
        .orchestrator
        .verify_round(&round_id)
        .map_err(|e| ApiError::from_rgs(request_id.0.clone(), e))?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(request_id.0.clone(), format!("Round {} not found", round_id)))
}

/// GET /wallets/:player_id
pub async fn wallet_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(player_id): Path<String>,
) -> Result<Json<WalletResponse>, ApiError> {
    match state.orchestrator.wallet(&player_id) {
        Ok(wallet) => Ok(Json(wallet.into())),
        Err(e) if e.decline_reason() == Some(&DeclineReason::WalletNotFound) => Err(
            ApiError::not_found(request_id.0, format!("Wallet for {} not found", player_id)),
        ),
        Err(e) => Err(ApiError::from_rgs(request_id.0, e)),
    }
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.metrics.to_prometheus_format(),
    )
        .into_response()
}
