//! Wallet ledger transaction
//!
//! Every balance mutation runs inside a `LedgerTransaction`: it holds the
//! wallet's exclusive lock, stages writes locally and hands them to the store
//! as one atomic commit. Dropping it without `commit` discards every staged
//! write, which covers early returns, panics and cancelled futures alike.

use crate::common::Amount;
use crate::errors::{DeclineReason, RgsError, RgsResult, StorageResult, TransactionFault};
use crate::games::types::{Outcome, VRFBundle};
use crate::ledger::store::{PlayerRecord, RoundRecord, SessionRecord, StoreBackend, Wallet, WriteSet};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

/// One FIFO mutex per player id
#[derive(Default)]
pub struct RowLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl RowLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the player's lock in arrival order, up to `timeout`
    pub async fn acquire(
        &self,
        player_id: &str,
        timeout: Duration,
    ) -> Result<OwnedMutexGuard<()>, TransactionFault> {
        // Clone the Arc out so the map shard is not held across the await
        let lock = self.locks.entry(player_id.to_string()).or_default().clone();

        tokio::time::timeout(timeout, lock.lock_owned())
            .await
            .map_err(|_| TransactionFault::LockTimeout {
                player_id: player_id.to_string(),
                waited_ms: timeout.as_millis() as u64,
            })
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Everything the ledger needs to settle one spin
#[derive(Debug, Clone)]
pub struct SettlementRequest {
    pub round_id: String,
    pub player_id: String,
    pub session_id: String,
    pub game_id: String,
    pub currency: String,
    pub wager: Amount,
    pub outcome: Outcome,
    pub vrf: VRFBundle,
}

/// A committed settlement
#[derive(Debug, Clone)]
pub struct Settlement {
    pub round: RoundRecord,
    pub balance_before: Amount,
}

impl Settlement {
    pub fn balance(&self) -> Amount {
        self.round.balance_after
    }
}

/// Entry point for all wallet mutations
pub struct WalletLedger {
    store: Arc<dyn StoreBackend>,
    locks: RowLocks,
    lock_timeout: Duration,
}

impl WalletLedger {
    pub fn new(store: Arc<dyn StoreBackend>, lock_timeout: Duration) -> Self {
        Self {
            store,
            locks: RowLocks::new(),
            lock_timeout,
        }
    }

    pub fn store(&self) -> &Arc<dyn StoreBackend> {
        &self.store
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// Open a transaction scope holding `player_id`'s lock
    pub async fn begin(&self, player_id: &str) -> Result<LedgerTransaction, TransactionFault> {
        let guard = self.locks.acquire(player_id, self.lock_timeout).await?;
        Ok(LedgerTransaction {
            store: Arc::clone(&self.store),
            player_id: player_id.to_string(),
            writes: WriteSet::default(),
            wallet: None,
            wallet_dirty: false,
            finished: false,
            _guard: guard,
        })
    }

    /// Committed wallet state, read without taking the lock
    pub fn wallet(&self, player_id: &str) -> RgsResult<Wallet> {
        self.store
            .load_wallet(player_id)?
            .ok_or_else(|| DeclineReason::WalletNotFound.into())
    }

    /// Debit the wager, credit the payout and record the round, atomically.
    pub async fn settle(&self, request: SettlementRequest) -> RgsResult<Settlement> {
        if request.wager.is_zero() {
            return Err(DeclineReason::NonPositiveWager.into());
        }

        let mut tx = self.begin(&request.player_id).await?;

        // The session may have closed while this spin waited for the lock
        let session = tx
            .find_session(&request.session_id)?
            .filter(|s| s.active)
            .ok_or(DeclineReason::InvalidSession)?;
        if session.player_id != request.player_id {
            return Err(DeclineReason::SessionPlayerMismatch.into());
        }

        let wallet = tx.wallet()?;
        if wallet.currency != request.currency {
            return Err(DeclineReason::CurrencyMismatch {
                wallet: wallet.currency,
                request: request.currency,
            }
            .into());
        }
        let balance_before = wallet.balance;

        tx.debit(request.wager)?;
        let balance_after = tx.credit(request.outcome.payout)?;

        let round = RoundRecord {
            round_id: request.round_id,
            player_id: request.player_id,
            session_id: request.session_id,
            game_id: request.game_id,
            wager: request.wager,
            payout: request.outcome.payout,
            balance_after,
            currency: wallet.currency,
            created_at: Utc::now(),
            grid: request.outcome.grid,
            contributions: request.outcome.contributions,
            scatter_count: request.outcome.scatter_count,
            vrf: request.vrf,
        };
        tx.stage_round(round.clone());
        tx.commit()?;

        info!(
            player_id = %round.player_id,
            round_id = %round.round_id,
            wager = %round.wager,
            payout = %round.payout,
            balance = %balance_after,
            "Round settled"
        );

        Ok(Settlement {
            round,
            balance_before,
        })
    }
}

/// Explicit transaction scope over one player's records
pub struct LedgerTransaction {
    store: Arc<dyn StoreBackend>,
    player_id: String,
    writes: WriteSet,
    /// Working copy of the wallet, loaded on first use
    wallet: Option<Wallet>,
    wallet_dirty: bool,
    finished: bool,
    _guard: OwnedMutexGuard<()>,
}

impl LedgerTransaction {
    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    /// Wallet as seen by this transaction, including staged changes
    pub fn find_wallet(&mut self) -> StorageResult<Option<Wallet>> {
        if self.wallet.is_none() {
            self.wallet = self.store.load_wallet(&self.player_id)?;
        }
        Ok(self.wallet.clone())
    }

    pub fn wallet(&mut self) -> RgsResult<Wallet> {
        self.find_wallet()?
            .ok_or_else(|| DeclineReason::WalletNotFound.into())
    }

    pub fn find_player(&self) -> StorageResult<Option<PlayerRecord>> {
        if let Some(staged) = self.writes.players.iter().find(|p| p.player_id == self.player_id) {
            return Ok(Some(staged.clone()));
        }
        self.store.load_player(&self.player_id)
    }

    /// Session as seen by this transaction, including staged changes
    pub fn find_session(&self, session_id: &str) -> StorageResult<Option<SessionRecord>> {
        if let Some(staged) = self.writes.sessions.iter().rev().find(|s| s.session_id == session_id) {
            return Ok(Some(staged.clone()));
        }
        self.store.load_session(session_id)
    }

    /// Subtract `amount`; the balance never goes negative
    pub fn debit(&mut self, amount: Amount) -> RgsResult<Amount> {
        let mut wallet = self.wallet()?;
        let balance = wallet
            .balance
            .checked_sub(amount)
            .ok_or(DeclineReason::InsufficientBalance {
                balance: wallet.balance,
                wager: amount,
            })?;

        wallet.balance = balance;
        self.wallet = Some(wallet);
        self.wallet_dirty = true;
        Ok(balance)
    }

    pub fn credit(&mut self, amount: Amount) -> RgsResult<Amount> {
        let mut wallet = self.wallet()?;
        let balance = wallet.balance.checked_add(amount).ok_or_else(|| {
            RgsError::from(TransactionFault::BalanceOverflow {
                player_id: self.player_id.clone(),
                payout: amount,
            })
        })?;

        wallet.balance = balance;
        self.wallet = Some(wallet);
        self.wallet_dirty = true;
        Ok(balance)
    }

    /// Stage a brand new wallet for this transaction's player
    pub fn open_wallet(&mut self, currency: &str, balance: Amount) -> Wallet {
        let wallet = Wallet {
            player_id: self.player_id.clone(),
            balance,
            currency: currency.to_string(),
            updated_at: Utc::now(),
        };
        self.wallet = Some(wallet.clone());
        self.wallet_dirty = true;
        wallet
    }

    pub fn stage_player(&mut self, player: PlayerRecord) {
        self.writes.players.push(player);
    }

    pub fn stage_session(&mut self, session: SessionRecord) {
        self.writes.sessions.push(session);
    }

    pub fn stage_round(&mut self, round: RoundRecord) {
        self.writes.rounds.push(round);
    }

    pub fn is_dirty(&self) -> bool {
        self.wallet_dirty || !self.writes.is_empty()
    }

    /// Apply every staged write atomically, then release the lock
    pub fn commit(mut self) -> Result<(), TransactionFault> {
        let mut writes = std::mem::take(&mut self.writes);
        if self.wallet_dirty {
            if let Some(mut wallet) = self.wallet.take() {
                wallet.updated_at = Utc::now();
                writes.wallets.push(wallet);
            }
        }

        // Whatever the store answers, this scope is done
        self.finished = true;
        let staged = writes.len();
        self.store.commit(writes).map_err(|e| {
            warn!(player_id = %self.player_id, error = %e, "Ledger commit failed, nothing applied");
            TransactionFault::Storage(e)
        })?;

        debug!(player_id = %self.player_id, staged, "Ledger transaction committed");
        Ok(())
    }

    /// Discard every staged write
    pub fn rollback(mut self) {
        self.writes = WriteSet::default();
        self.wallet_dirty = false;
        self.finished = true;
        debug!(player_id = %self.player_id, "Ledger transaction rolled back");
    }
}

impl Drop for LedgerTransaction {
    fn drop(&mut self) {
        if !self.finished && self.is_dirty() {
            warn!(
                player_id = %self.player_id,
                staged = self.writes.len(),
                "Ledger transaction dropped without commit, staged writes discarded"
            );
        }
    }
}
