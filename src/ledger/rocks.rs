//! RocksDB store backend
//!
//! Records are JSON values under prefixed string keys. A commit checks
//! constraints and then writes a single `WriteBatch`, so either every record
//! of a settlement lands or none does.

use crate::errors::{StorageError, StorageResult};
use crate::ledger::store::{
    check_constraints, PlayerRecord, RoundRecord, SessionRecord, StoreBackend, Wallet, WriteSet,
};
use rocksdb::{Options, WriteBatch, DB};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex};

const PLAYER_PREFIX: &str = "player:";
const WALLET_PREFIX: &str = "wallet:";
const SESSION_PREFIX: &str = "session:";
const ROUND_PREFIX: &str = "round:";
const META_PREFIX: &str = "meta:";

fn key(prefix: &str, id: &str) -> Vec<u8> {
    format!("{}{}", prefix, id).into_bytes()
}

#[derive(Clone)]
pub struct RocksStore {
    db: Arc<DB>,
    /// Serializes constraint check + batch write
    commit_lock: Arc<Mutex<()>>,
}

impl RocksStore {
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(64 * 1024 * 1024);
        opts.set_max_write_buffer_number(4);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let db = DB::open(&opts, path)?;
        Ok(Self {
            db: Arc::new(db),
            commit_lock: Arc::new(Mutex::new(())),
        })
    }

    fn get_json<T: DeserializeOwned>(&self, key: &[u8]) -> StorageResult<Option<T>> {
        match self.db.get(key)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StorageError::Corrupted(e.to_string())),
            None => Ok(None),
        }
    }

    fn exists(&self, key: &[u8]) -> StorageResult<bool> {
        Ok(self.db.get_pinned(key)?.is_some())
    }
}

fn put_json<T: Serialize>(batch: &mut WriteBatch, key: Vec<u8>, value: &T) -> StorageResult<()> {
    let bytes = serde_json::to_vec(value).map_err(|e| StorageError::Corrupted(e.to_string()))?;
    batch.put(key, bytes);
    Ok(())
}

impl StoreBackend for RocksStore {
    fn load_wallet(&self, player_id: &str) -> StorageResult<Option<Wallet>> {
        self.get_json(&key(WALLET_PREFIX, player_id))
    }

    fn load_player(&self, player_id: &str) -> StorageResult<Option<PlayerRecord>> {
        self.get_json(&key(PLAYER_PREFIX, player_id))
    }

    fn load_session(&self, session_id: &str) -> StorageResult<Option<SessionRecord>> {
        self.get_json(&key(SESSION_PREFIX, session_id))
    }

    fn load_round(&self, round_id: &str) -> StorageResult<Option<RoundRecord>> {
        self.get_json(&key(ROUND_PREFIX, round_id))
    }

    fn load_metadata(&self, name: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.db.get(key(META_PREFIX, name))?)
    }

    fn commit(&self, writes: WriteSet) -> StorageResult<()> {
        let _guard = self
            .commit_lock
            .lock()
            .map_err(|_| StorageError::Unavailable("commit lock poisoned".to_string()))?;

        check_constraints(
            &writes,
            |id| self.exists(&key(PLAYER_PREFIX, id)),
            |id| self.exists(&key(SESSION_PREFIX, id)),
            |id| self.exists(&key(ROUND_PREFIX, id)),
        )?;

        let mut batch = WriteBatch::default();
        for player in &writes.players {
            put_json(&mut batch, key(PLAYER_PREFIX, &player.player_id), player)?;
        }
        for wallet in &writes.wallets {
            put_json(&mut batch, key(WALLET_PREFIX, &wallet.player_id), wallet)?;
        }
        for session in &writes.sessions {
            put_json(&mut batch, key(SESSION_PREFIX, &session.session_id), session)?;
        }
        for round in &writes.rounds {
            put_json(&mut batch, key(ROUND_PREFIX, &round.round_id), round)?;
        }
        for (name, value) in &writes.metadata {
            batch.put(key(META_PREFIX, name), value);
        }

        self.db.write(batch)?;
        Ok(())
    }

    fn ping(&self) -> StorageResult<()> {
        self.db.get_pinned(b"meta:__ping")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "rocksdb"
    }
}
