//! Abstract transactional record store
//!
//! A backend only has to load records by key and apply a `WriteSet`
//! atomically. Locking is the ledger's job, not the backend's.

use crate::common::Amount;
use crate::errors::{StorageError, StorageResult};
use crate::games::types::{Contribution, Grid, VRFBundle};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub player_id: String,
    pub balance: Amount,
    pub currency: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub player_id: String,
    pub operator_id: String,
    pub external_player_id: String,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub player_id: String,
    pub operator_id: String,
    pub currency: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Immutable record of one settled spin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round_id: String,
    pub player_id: String,
    pub session_id: String,
    pub game_id: String,
    pub wager: Amount,
    pub payout: Amount,
    pub balance_after: Amount,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub grid: Grid,
    pub contributions: Vec<Contribution>,
    pub scatter_count: usize,
    pub vrf: VRFBundle,
}

/// Writes staged by one transaction, applied all-or-nothing
#[derive(Debug, Clone, Default)]
pub struct WriteSet {
    pub players: Vec<PlayerRecord>,
    pub wallets: Vec<Wallet>,
    pub sessions: Vec<SessionRecord>,
    pub rounds: Vec<RoundRecord>,
    pub metadata: Vec<(String, Vec<u8>)>,
}

impl WriteSet {
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len(&self) -> usize {
        self.players.len()
            + self.wallets.len()
            + self.sessions.len()
            + self.rounds.len()
            + self.metadata.len()
    }
}

/// Storage backend for wallets, players, sessions, rounds and metadata
pub trait StoreBackend: Send + Sync {
    fn load_wallet(&self, player_id: &str) -> StorageResult<Option<Wallet>>;
    fn load_player(&self, player_id: &str) -> StorageResult<Option<PlayerRecord>>;
    fn load_session(&self, session_id: &str) -> StorageResult<Option<SessionRecord>>;
    fn load_round(&self, round_id: &str) -> StorageResult<Option<RoundRecord>>;
    fn load_metadata(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Apply every write or none of them
    fn commit(&self, writes: WriteSet) -> StorageResult<()>;

    /// Cheap liveness probe for health checks
    fn ping(&self) -> StorageResult<()>;

    fn name(&self) -> &'static str;
}

/// Referential checks shared by every backend, run before a commit is applied.
///
/// Round ids must be new; the player and session a round references, the
/// player behind each wallet and each session must exist either in the store
/// or in the same write set.
pub(crate) fn check_constraints<P, S, R>(
    writes: &WriteSet,
    player_exists: P,
    session_exists: S,
    round_exists: R,
) -> StorageResult<()>
where
    P: Fn(&str) -> StorageResult<bool>,
    S: Fn(&str) -> StorageResult<bool>,
    R: Fn(&str) -> StorageResult<bool>,
{
    let staged_players: HashSet<&str> = writes.players.iter().map(|p| p.player_id.as_str()).collect();
    let staged_sessions: HashSet<&str> = writes.sessions.iter().map(|s| s.session_id.as_str()).collect();

    let has_player = |id: &str| -> StorageResult<bool> {
        Ok(staged_players.contains(id) || player_exists(id)?)
    };

    let mut round_ids = HashSet::new();
    for round in &writes.rounds {
        if !round_ids.insert(round.round_id.as_str()) || round_exists(&round.round_id)? {
            return Err(StorageError::Constraint(format!(
                "round {} already exists",
                round.round_id
            )));
        }
        if !has_player(&round.player_id)? {
            return Err(StorageError::Constraint(format!(
                "round {} references unknown player {}",
                round.round_id, round.player_id
            )));
        }
        if !staged_sessions.contains(round.session_id.as_str()) && !session_exists(&round.session_id)? {
            return Err(StorageError::Constraint(format!(
                "round {} references unknown session {}",
                round.round_id, round.session_id
            )));
        }
    }

    for wallet in &writes.wallets {
        if !has_player(&wallet.player_id)? {
            return Err(StorageError::Constraint(format!(
                "wallet references unknown player {}",
                wallet.player_id
            )));
        }
    }

    for session in &writes.sessions {
        if !has_player(&session.player_id)? {
            return Err(StorageError::Constraint(format!(
                "session {} references unknown player {}",
                session.session_id, session.player_id
            )));
        }
    }

    Ok(())
}
