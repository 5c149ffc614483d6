//! HTTP routes exercised in-process with `tower::ServiceExt::oneshot`

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use rgs_core::api::create_app;
use rgs_core::config::ConfigBuilder;
use rgs_core::RgsFactory;
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> Router {
    let config = ConfigBuilder::new().build().unwrap();
    let services = RgsFactory::build(&config).unwrap();
    create_app(&services, &config.server)
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn start_session(app: &Router, external: &str) -> Value {
    let (status, body) = call(
        app,
        "POST",
        "/session/start",
        Some(json!({"operator_id": "casino", "external_player_id": external})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let (status, body) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "ok");
}

#[tokio::test]
async fn test_session_spin_round_flow() {
    let app = app();
    let session = start_session(&app, "erin").await;
    assert_eq!(session["balance"], 1000.0);
    assert_eq!(session["currency"], "USD");

    let (status, spin) = call(
        &app,
        "POST",
        "/games/classic-5x3/spin",
        Some(json!({
            "session_id": session["session_id"],
            "player_id": session["player_id"],
            "bet_amount": 10.0,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", spin);
    assert_eq!(spin["bet_amount"], 10.0);
    assert_eq!(spin["grid"].as_array().map(|rows| rows.len()), Some(3));

    let win = spin["win_amount"].as_f64().unwrap();
    let balance = spin["new_balance"].as_f64().unwrap();
    assert!((balance - (990.0 + win)).abs() < 1e-6);

    let round_id = spin["round_id"].as_str().unwrap();
    let (status, round) = call(&app, "GET", &format!("/rounds/{}", round_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(round["win_amount"], spin["win_amount"]);

    let (status, verification) =
        call(&app, "GET", &format!("/rounds/{}/verify", round_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verification["is_valid"], true);

    let player = session["player_id"].as_str().unwrap();
    let (status, wallet) = call(&app, "GET", &format!("/wallets/{}", player), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(wallet["balance"], spin["new_balance"]);
}

#[tokio::test]
async fn test_declines_are_structured() {
    let app = app();
    let alice = start_session(&app, "alice").await;
    let bob = start_session(&app, "bob").await;

    let (status, body) = call(
        &app,
        "POST",
        "/games/classic-5x3/spin",
        Some(json!({
            "session_id": alice["session_id"],
            "player_id": bob["player_id"],
            "bet_amount": 1.0,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "SESSION_PLAYER_MISMATCH");
    assert_eq!(body["error"]["retryable"], false);
    assert!(body["request_id"].is_string());

    let (status, body) = call(
        &app,
        "POST",
        "/games/classic-5x3/spin",
        Some(json!({
            "session_id": alice["session_id"],
            "player_id": alice["player_id"],
            "bet_amount": 5000.0,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INSUFFICIENT_BALANCE");
    assert_eq!(body["error"]["details"]["balance"], 1000.0);

    let (status, body) = call(
        &app,
        "POST",
        "/games/classic-5x3/spin",
        Some(json!({
            "session_id": alice["session_id"],
            "player_id": alice["player_id"],
            "bet_amount": -1.0,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "NON_POSITIVE_WAGER");

    let (status, body) = call(&app, "POST", "/games/classic-5x3/spin", Some(json!({"oops": 1}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn test_ended_session_cannot_spin() {
    let app = app();
    let session = start_session(&app, "frank").await;
    let session_id = session["session_id"].as_str().unwrap();

    let (status, body) = call(&app, "POST", &format!("/session/{}/end", session_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], false);

    let (status, body) = call(
        &app,
        "POST",
        "/games/classic-5x3/spin",
        Some(json!({
            "session_id": session_id,
            "player_id": session["player_id"],
            "bet_amount": 1.0,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_SESSION");
}

#[tokio::test]
async fn test_unknown_resources_are_404() {
    let app = app();
    let (status, body) = call(&app, "GET", "/rounds/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = call(&app, "GET", "/wallets/nobody", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_request_id_propagated() {
    let app = app();
    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "trace-123")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(
        response.headers().get("x-request-id").and_then(|v| v.to_str().ok()),
        Some("trace-123")
    );
}

#[tokio::test]
async fn test_metrics_exposed() {
    let app = app();
    start_session(&app, "gina").await;

    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("rgs_sessions_started_total 1"));
}

#[tokio::test]
async fn test_cors_preflight_carries_request_id() {
    let app = app();
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/games/classic-5x3/spin")
        .header("origin", "https://casino.example")
        .header("access-control-request-method", "POST")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert!(response.status().is_success());
    assert!(response.headers().contains_key("access-control-allow-origin"));
    assert!(response.headers().contains_key("x-request-id"));
}
