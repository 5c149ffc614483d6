//! rgs-core - Remote gaming server core for slot rounds
//!
//! Turns a wager into a VRF-seeded symbol grid, scores it against an
//! immutable paytable and settles the result against the player's wallet in
//! one atomic ledger transaction. A player's balance is never visibly
//! inconsistent and never goes negative.
//!
//! Layout:
//! - [`games`]: paytable catalog, outcome engine, VRF
//! - [`ledger`]: abstract store, memory and RocksDB backends, transactions
//! - [`sessions`] and [`orchestrator`]: the spin flow
//! - [`api`]: axum HTTP surface

pub mod api;
pub mod common;
pub mod config;
pub mod errors;
pub mod factory;
pub mod games;
pub mod ledger;
pub mod metrics;
pub mod orchestrator;
pub mod sessions;

pub use common::{Amount, Multiplier};
pub use config::{ConfigBuilder, ConfigLoader, RgsConfig};
pub use errors::{DeclineReason, RgsError, RgsResult, TransactionFault};
pub use factory::{RgsFactory, RgsServices};
pub use orchestrator::{GameRegistry, RoundOrchestrator, SpinRequest, SpinResult};
