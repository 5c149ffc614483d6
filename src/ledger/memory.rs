//! In-memory store backend

use crate::errors::{StorageError, StorageResult};
use crate::ledger::store::{
    check_constraints, PlayerRecord, RoundRecord, SessionRecord, StoreBackend, Wallet, WriteSet,
};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard};

#[derive(Default)]
struct Tables {
    players: HashMap<String, PlayerRecord>,
    wallets: HashMap<String, Wallet>,
    sessions: HashMap<String, SessionRecord>,
    rounds: HashMap<String, RoundRecord>,
    metadata: HashMap<String, Vec<u8>>,
}

/// Volatile store used by tests and the `memory` backend setting
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StorageError::Unavailable("memory store lock poisoned".to_string()))
    }

    /// Number of persisted rounds
    pub fn round_count(&self) -> usize {
        self.read().map(|t| t.rounds.len()).unwrap_or(0)
    }
}

impl StoreBackend for MemoryStore {
    fn load_wallet(&self, player_id: &str) -> StorageResult<Option<Wallet>> {
        Ok(self.read()?.wallets.get(player_id).cloned())
    }

    fn load_player(&self, player_id: &str) -> StorageResult<Option<PlayerRecord>> {
        Ok(self.read()?.players.get(player_id).cloned())
    }

    fn load_session(&self, session_id: &str) -> StorageResult<Option<SessionRecord>> {
        Ok(self.read()?.sessions.get(session_id).cloned())
    }

    fn load_round(&self, round_id: &str) -> StorageResult<Option<RoundRecord>> {
        Ok(self.read()?.rounds.get(round_id).cloned())
    }

    fn load_metadata(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.read()?.metadata.get(key).cloned())
    }

    fn commit(&self, writes: WriteSet) -> StorageResult<()> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StorageError::Unavailable("memory store lock poisoned".to_string()))?;

        check_constraints(
            &writes,
            |id| Ok(tables.players.contains_key(id)),
            |id| Ok(tables.sessions.contains_key(id)),
            |id| Ok(tables.rounds.contains_key(id)),
        )?;

        // Nothing below can fail, so the commit is all-or-nothing
        for player in writes.players {
            tables.players.insert(player.player_id.clone(), player);
        }
        for wallet in writes.wallets {
            tables.wallets.insert(wallet.player_id.clone(), wallet);
        }
        for session in writes.sessions {
            tables.sessions.insert(session.session_id.clone(), session);
        }
        for round in writes.rounds {
            tables.rounds.insert(round.round_id.clone(), round);
        }
        for (key, value) in writes.metadata {
            tables.metadata.insert(key, value);
        }
        Ok(())
    }

    fn ping(&self) -> StorageResult<()> {
        self.read().map(|_| ())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
