//! Common utilities and shared functionality
//!
//! Monetary types and helpers used across the engine, ledger and API.

pub mod types;

pub use types::{Amount, Multiplier, AMOUNT_SCALE, MULTIPLIER_SCALE};
