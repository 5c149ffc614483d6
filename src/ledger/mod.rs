//! Wallet ledger
//!
//! Abstract store, its memory and RocksDB backends, and the transaction
//! scope that every balance mutation goes through.

pub mod memory;
pub mod rocks;
pub mod store;
pub mod transaction;

pub use memory::MemoryStore;
pub use rocks::RocksStore;
pub use store::{PlayerRecord, RoundRecord, SessionRecord, StoreBackend, Wallet, WriteSet};
pub use transaction::{LedgerTransaction, RowLocks, Settlement, SettlementRequest, WalletLedger};
