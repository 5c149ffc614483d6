//! Player sessions
//!
//! Issues sessions and validates the (session, player) binding of every spin.
//! First contact for an operator + external player pair creates the player
//! and its wallet under the player's ledger lock, so concurrent starts never
//! create two wallets.

use crate::common::Amount;
use crate::errors::{DeclineReason, RgsResult};
use crate::ledger::{PlayerRecord, SessionRecord, Wallet, WalletLedger};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// A freshly issued session with the wallet it spends from
#[derive(Debug, Clone)]
pub struct SessionStart {
    pub session: SessionRecord,
    pub wallet: Wallet,
    pub new_player: bool,
}

pub struct SessionService {
    ledger: Arc<WalletLedger>,
    starting_balance: Amount,
}

impl SessionService {
    pub fn new(ledger: Arc<WalletLedger>, starting_balance: Amount) -> Self {
        Self {
            ledger,
            starting_balance,
        }
    }

    /// Stable player id for an operator's external player
    pub fn player_id_for(operator_id: &str, external_player_id: &str) -> String {
        let mut hasher = Sha256::new();
        // Length prefixes keep ("ab", "c") and ("a", "bc") apart
        hasher.update((operator_id.len() as u64).to_be_bytes());
        hasher.update(operator_id.as_bytes());
        hasher.update((external_player_id.len() as u64).to_be_bytes());
        hasher.update(external_player_id.as_bytes());
        let digest = hex::encode(hasher.finalize());
        format!("player-{}", &digest[..24])
    }

    pub async fn start_session(
        &self,
        operator_id: &str,
        external_player_id: &str,
        currency: &str,
    ) -> RgsResult<SessionStart> {
        if operator_id.trim().is_empty() || external_player_id.trim().is_empty() {
            return Err(DeclineReason::InvalidRequest(
                "operator_id and external_player_id are required".to_string(),
            )
            .into());
        }
        if currency.trim().is_empty() {
            return Err(DeclineReason::InvalidRequest("currency is required".to_string()).into());
        }

        let player_id = Self::player_id_for(operator_id, external_player_id);
        let mut tx = self.ledger.begin(&player_id).await?;

        let new_player = tx.find_player()?.is_none();
        if new_player {
            tx.stage_player(PlayerRecord {
                player_id: player_id.clone(),
                operator_id: operator_id.to_string(),
                external_player_id: external_player_id.to_string(),
                currency: currency.to_string(),
                created_at: Utc::now(),
            });
        }

        let wallet = match tx.find_wallet()? {
            Some(wallet) if wallet.currency != currency => {
                return Err(DeclineReason::CurrencyMismatch {
                    wallet: wallet.currency,
                    request: currency.to_string(),
                }
                .into());
            }
            Some(wallet) => wallet,
            None => tx.open_wallet(currency, self.starting_balance),
        };

        let session = SessionRecord {
            session_id: Uuid::new_v4().to_string(),
            player_id: player_id.clone(),
            operator_id: operator_id.to_string(),
            currency: currency.to_string(),
            active: true,
            created_at: Utc::now(),
        };
        tx.stage_session(session.clone());
        tx.commit()?;

        info!(
            player_id = %player_id,
            session_id = %session.session_id,
            new_player,
            "Session started"
        );

        Ok(SessionStart {
            session,
            wallet,
            new_player,
        })
    }

    /// Active session bound to `player_id`
    pub fn validate(&self, session_id: &str, player_id: &str) -> RgsResult<SessionRecord> {
        let session = self
            .ledger
            .store()
            .load_session(session_id)?
            .filter(|s| s.active)
            .ok_or(DeclineReason::InvalidSession)?;

        if session.player_id != player_id {
            return Err(DeclineReason::SessionPlayerMismatch.into());
        }
        Ok(session)
    }

    /// Deactivate a session. Closing twice is a no-op.
    pub async fn close_session(&self, session_id: &str) -> RgsResult<SessionRecord> {
        let session = self
            .ledger
            .store()
            .load_session(session_id)?
            .ok_or(DeclineReason::InvalidSession)?;

        if !session.active {
            return Ok(session);
        }

        let mut tx = self.ledger.begin(&session.player_id).await?;
        let closed = SessionRecord {
            active: false,
            ..session
        };
        tx.stage_session(closed.clone());
        tx.commit()?;

        info!(session_id = %closed.session_id, player_id = %closed.player_id, "Session closed");
        Ok(closed)
    }
}
