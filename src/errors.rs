//! Error types for the round settlement system
//!
//! Three families matter to callers: declined requests (client fault, nothing
//! was mutated, never retried), transaction faults (system fault, fully rolled
//! back, safe to retry) and startup-time configuration/catalog errors.

use crate::common::Amount;
use thiserror::Error;

/// Root error type for all core operations
#[derive(Debug, Error)]
pub enum RgsError {
    /// Request declined before any mutation
    #[error("Request declined: {0}")]
    Declined(#[from] DeclineReason),

    /// Mutation attempted but rolled back
    #[error("Transaction fault: {0}")]
    Transaction(#[from] TransactionFault),

    /// Malformed paytable catalog
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

/// Client-fault conditions. None of these leave a partial effect behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeclineReason {
    #[error("Invalid or inactive session")]
    InvalidSession,

    #[error("Session / player mismatch")]
    SessionPlayerMismatch,

    #[error("Bet amount must be > 0")]
    NonPositiveWager,

    #[error("Insufficient balance: balance {balance}, wager {wager}")]
    InsufficientBalance { balance: Amount, wager: Amount },

    #[error("Wallet not found")]
    WalletNotFound,

    #[error("Currency mismatch: wallet holds {wallet}, request uses {request}")]
    CurrencyMismatch { wallet: String, request: String },

    #[error("Unknown game: {0}")]
    UnknownGame(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl DeclineReason {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            DeclineReason::InvalidSession => "INVALID_SESSION",
            DeclineReason::SessionPlayerMismatch => "SESSION_PLAYER_MISMATCH",
            DeclineReason::NonPositiveWager => "NON_POSITIVE_WAGER",
            DeclineReason::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            DeclineReason::WalletNotFound => "WALLET_NOT_FOUND",
            DeclineReason::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            DeclineReason::UnknownGame(_) => "UNKNOWN_GAME",
            DeclineReason::InvalidAmount(_) => "INVALID_AMOUNT",
            DeclineReason::InvalidRequest(_) => "INVALID_REQUEST",
        }
    }
}

/// System-fault conditions raised while a ledger transaction was open
#[derive(Debug, Error)]
pub enum TransactionFault {
    #[error("Storage failure: {0}")]
    Storage(#[from] StorageError),

    #[error("Timed out after {waited_ms}ms waiting for wallet lock of {player_id}")]
    LockTimeout { player_id: String, waited_ms: u64 },

    #[error("Balance overflow crediting {payout} to {player_id}")]
    BalanceOverflow { player_id: String, payout: Amount },

    /// The round's payout itself does not fit in an `Amount`
    #[error("Payout overflow scoring wager {wager}")]
    PayoutOverflow { wager: Amount },
}

impl TransactionFault {
    pub fn code(&self) -> &'static str {
        match self {
            TransactionFault::Storage(StorageError::Constraint(_)) => "COMMIT_FAILED",
            TransactionFault::Storage(_) => "STORE_UNAVAILABLE",
            TransactionFault::LockTimeout { .. } => "LOCK_TIMEOUT",
            TransactionFault::BalanceOverflow { .. } | TransactionFault::PayoutOverflow { .. } => {
                "BALANCE_OVERFLOW"
            }
        }
    }

    /// Overflow will fail the same way on every attempt; everything else may
    /// succeed once the store or the contending settlement is done.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            TransactionFault::BalanceOverflow { .. } | TransactionFault::PayoutOverflow { .. }
        )
    }
}

/// Storage system errors
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Corrupted data: {0}")]
    Corrupted(String),
}

/// Paytable catalog validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("Symbol alphabet is empty")]
    EmptyAlphabet,

    #[error("Duplicate symbol: {0}")]
    DuplicateSymbol(String),

    #[error("Symbol {0} must have a positive weight")]
    NonPositiveWeight(String),

    #[error("Catalog must define exactly one scatter symbol, found {0}")]
    ScatterCount(usize),

    #[error("Catalog may define at most one wild symbol, found {0}")]
    WildCount(usize),

    #[error("Paytable references undefined symbol: {0}")]
    UndefinedSymbol(String),

    #[error("Scatter symbol {0} cannot appear in the line paytable")]
    ScatterInLinePays(String),

    #[error("Run length {count} for {symbol} is outside 1..={max}")]
    InvalidRunLength { symbol: String, count: u8, max: usize },

    #[error("Duplicate pay entry: {0}")]
    DuplicatePay(String),

    #[error("Multiplier for {0} must be positive")]
    ZeroMultiplier(String),

    #[error("Scatter paytable is empty")]
    EmptyScatterPays,

    #[error("Catalog defines no paylines")]
    NoPaylines,

    #[error("Payline {name} has {len} positions, expected {expected}")]
    PaylineLength { name: String, len: usize, expected: usize },

    #[error("Payline {name} references row {row}, grid has {rows} rows")]
    PaylineOutOfBounds { name: String, row: usize, rows: usize },

    #[error("Game {0} is already registered")]
    DuplicateGame(String),

    #[error("Grid has wrong shape: {0}")]
    GridShape(String),

    #[error("Failed to parse paytable: {0}")]
    Parse(String),
}

/// Configuration and validation errors
#[derive(Debug, Clone, Error)]
pub enum ConfigurationError {
    #[error("Missing required field: {0}")]
    MissingRequired(String),

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue { field: String, value: String, reason: String },

    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),
}

impl From<StorageError> for RgsError {
    fn from(e: StorageError) -> Self {
        RgsError::Transaction(TransactionFault::Storage(e))
    }
}

impl From<rocksdb::Error> for StorageError {
    fn from(e: rocksdb::Error) -> Self {
        StorageError::Unavailable(e.to_string())
    }
}

impl RgsError {
    pub fn is_declined(&self) -> bool {
        matches!(self, RgsError::Declined(_))
    }

    /// Only transaction faults are safe to retry; they never leave a debit
    /// applied without its matching credit.
    pub fn is_retryable(&self) -> bool {
        match self {
            RgsError::Transaction(fault) => fault.is_retryable(),
            _ => false,
        }
    }

    pub fn decline_reason(&self) -> Option<&DeclineReason> {
        match self {
            RgsError::Declined(reason) => Some(reason),
            _ => None,
        }
    }
}

// Convenience type alias for Results
pub type RgsResult<T> = Result<T, RgsError>;
pub type StorageResult<T> = Result<T, StorageError>;
