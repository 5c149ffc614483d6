//! Slot game modules
//!
//! Paytable catalog, outcome engine and the VRF that seeds each spin.

pub mod engine;
pub mod paytable;
pub mod types;
pub mod vrf_engine;

pub use engine::OutcomeEngine;
pub use paytable::{Paytable, PaytableSpec, CLASSIC_GAME_ID, REELS, ROWS};
pub use types::{Contribution, ContributionKind, Grid, Outcome, VRFBundle};
pub use vrf_engine::VrfEngine;
