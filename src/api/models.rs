//! API Request and Response Models
//!
//! Amounts cross the HTTP boundary as decimal major units; everything inside
//! the core is fixed-point.

use crate::games::{Contribution, ContributionKind, Grid, VRFBundle};
use crate::ledger::{RoundRecord, Wallet};
use crate::orchestrator::SpinResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub store: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStartRequest {
    pub operator_id: String,
    pub external_player_id: String,
    #[serde(default = "default_currency")]
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStartResponse {
    pub session_id: String,
    pub player_id: String,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEndResponse {
    pub session_id: String,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpinRequestBody {
    pub session_id: String,
    pub player_id: String,
    pub bet_amount: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

/// One win line or scatter win, amounts in major units
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContributionView {
    #[serde(flatten)]
    pub kind: ContributionKind,
    pub multiplier: f64,
    pub amount: f64,
    pub description: String,
}

impl From<&Contribution> for ContributionView {
    fn from(c: &Contribution) -> Self {
        Self {
            kind: c.kind.clone(),
            multiplier: c.multiplier.as_f64(),
            amount: c.amount.to_major(),
            description: c.description.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpinResponse {
    pub round_id: String,
    pub player_id: String,
    pub game_id: String,
    pub bet_amount: f64,
    pub win_amount: f64,
    pub new_balance: f64,
    pub currency: String,
    pub timestamp: DateTime<Utc>,
    pub grid: Grid,
    pub contributions: Vec<ContributionView>,
    pub scatter_count: usize,
    pub vrf: VRFBundle,
}

impl From<SpinResult> for SpinResponse {
    fn from(spin: SpinResult) -> Self {
        Self {
            contributions: spin.contributions.iter().map(ContributionView::from).collect(),
            round_id: spin.round_id,
            player_id: spin.player_id,
            game_id: spin.game_id,
            bet_amount: spin.wager.to_major(),
            win_amount: spin.payout.to_major(),
            new_balance: spin.balance.to_major(),
            currency: spin.currency,
            timestamp: spin.timestamp,
            grid: spin.grid,
            scatter_count: spin.scatter_count,
            vrf: spin.vrf,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundResponse {
    pub round_id: String,
    pub player_id: String,
    pub session_id: String,
    pub game_id: String,
    pub bet_amount: f64,
    pub win_amount: f64,
    pub balance_after: f64,
    pub currency: String,
    pub timestamp: DateTime<Utc>,
    pub grid: Grid,
    pub contributions: Vec<ContributionView>,
    pub scatter_count: usize,
    pub vrf: VRFBundle,
}

impl From<RoundRecord> for RoundResponse {
    fn from(round: RoundRecord) -> Self {
        Self {
            contributions: round.contributions.iter().map(ContributionView::from).collect(),
            round_id: round.round_id,
            player_id: round.player_id,
            session_id: round.session_id,
            game_id: round.game_id,
            bet_amount: round.wager.to_major(),
            win_amount: round.payout.to_major(),
            balance_after: round.balance_after.to_major(),
            currency: round.currency,
            timestamp: round.created_at,
            grid: round.grid,
            scatter_count: round.scatter_count,
            vrf: round.vrf,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletResponse {
    pub player_id: String,
    pub balance: f64,
    pub currency: String,
}

impl From<Wallet> for WalletResponse {
    fn from(wallet: Wallet) -> Self {
        Self {
            player_id: wallet.player_id,
            balance: wallet.balance.to_major(),
            currency: wallet.currency,
        }
    }
}
