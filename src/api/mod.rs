//! HTTP API
//!
//! JSON over HTTP for sessions, spins, round lookup and verification,
//! wallets, health and metrics.

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;

pub use server::{create_app, ApiServer};
