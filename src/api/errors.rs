//! API Error Handling
//!
//! Structured error responses with proper HTTP status codes and request tracking.
//! Declines map to 400, transaction faults to 503.

use crate::errors::{DeclineReason, RgsError, TransactionFault};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

/// Top-level API error response with request tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub request_id: String,
    pub error: ErrorBody,
}

/// Error body with structured information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error code (INVALID_SESSION, LOCK_TIMEOUT, NOT_FOUND, etc.)
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Whether the same request may succeed if retried
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error types with request tracking
#[derive(Debug)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub request_id: String,
}

#[derive(Debug)]
pub enum ApiErrorKind {
    NotFound(String),
    Declined(DeclineReason),
    Fault(TransactionFault),
    InternalError(String),
}

impl ApiError {
    pub fn not_found(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::NotFound(message),
            request_id,
        }
    }

    pub fn declined(request_id: String, reason: DeclineReason) -> Self {
        Self {
            kind: ApiErrorKind::Declined(reason),
            request_id,
        }
    }

    pub fn internal_error(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::InternalError(message),
            request_id,
        }
    }

    /// Map a core error onto its HTTP shape
    pub fn from_rgs(request_id: String, error: RgsError) -> Self {
        let kind = match error {
            RgsError::Declined(reason) => ApiErrorKind::Declined(reason),
            RgsError::Transaction(fault) => ApiErrorKind::Fault(fault),
            other => ApiErrorKind::InternalError(other.to_string()),
        };
        Self { kind, request_id }
    }

    pub fn status(&self) -> StatusCode {
        match &self.kind {
            ApiErrorKind::NotFound(_) => StatusCode::NOT_FOUND,
            ApiErrorKind::Declined(_) => StatusCode::BAD_REQUEST,
            ApiErrorKind::Fault(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorKind::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorBody {
        match &self.kind {
            ApiErrorKind::NotFound(msg) => ErrorBody {
                code: "NOT_FOUND".to_string(),
                message: msg.clone(),
                retryable: false,
                details: None,
            },
            ApiErrorKind::Declined(reason) => ErrorBody {
                code: reason.code().to_string(),
                message: reason.to_string(),
                retryable: false,
                details: decline_details(reason),
            },
            ApiErrorKind::Fault(fault) => ErrorBody {
                code: fault.code().to_string(),
                message: fault.to_string(),
                retryable: fault.is_retryable(),
                details: None,
            },
            ApiErrorKind::InternalError(msg) => ErrorBody {
                code: "INTERNAL_ERROR".to_string(),
                message: msg.clone(),
                retryable: false,
                details: None,
            },
        }
    }
}

fn decline_details(reason: &DeclineReason) -> Option<serde_json::Value> {
    match reason {
        DeclineReason::InsufficientBalance { balance, wager } => Some(json!({
            "balance": balance.to_major(),
            "bet_amount": wager.to_major(),
        })),
        DeclineReason::CurrencyMismatch { wallet, request } => Some(json!({
            "wallet_currency": wallet,
            "request_currency": request,
        })),
        _ => None,
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ApiErrorKind::NotFound(msg) => write!(f, "[{}] Not Found: {}", self.request_id, msg),
            ApiErrorKind::Declined(reason) => write!(f, "[{}] Declined: {}", self.request_id, reason),
            ApiErrorKind::Fault(fault) => write!(f, "[{}] Fault: {}", self.request_id, fault),
            ApiErrorKind::InternalError(msg) => write!(f, "[{}] Internal Error: {}", self.request_id, msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorResponse {
            request_id: self.request_id.clone(),
            error: self.body(),
        });

        (status, body).into_response()
    }
}
