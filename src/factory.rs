//! Service wiring
//!
//! Builds every long-lived handle from a validated `RgsConfig` so the binary
//! and the integration tests assemble the system the same way.

use crate::config::{RgsConfig, StorageBackendKind};
use crate::errors::{ConfigurationError, RgsResult};
use crate::games::{Paytable, VrfEngine};
use crate::ledger::{MemoryStore, RocksStore, StoreBackend, WalletLedger};
use crate::metrics::SpinMetrics;
use crate::orchestrator::{GameRegistry, RoundOrchestrator};
use crate::sessions::SessionService;
use std::sync::Arc;
use tracing::info;

/// Shared handles of a running server
#[derive(Clone)]
pub struct RgsServices {
    pub store: Arc<dyn StoreBackend>,
    pub ledger: Arc<WalletLedger>,
    pub sessions: Arc<SessionService>,
    pub orchestrator: Arc<RoundOrchestrator>,
    pub metrics: Arc<SpinMetrics>,
}

pub struct RgsFactory;

impl RgsFactory {
    /// Open the configured store and build everything on top of it
    pub fn build(config: &RgsConfig) -> RgsResult<RgsServices> {
        let store = Self::open_store(config)?;
        Self::build_with_store(config, store)
    }

    /// Build on top of an already opened store
    pub fn build_with_store(config: &RgsConfig, store: Arc<dyn StoreBackend>) -> RgsResult<RgsServices> {
        let starting_balance = config.ledger.starting_amount()?;

        let mut games = GameRegistry::with_classic()?;
        for path in &config.games.paytables {
            let paytable = Paytable::load(path)?;
            info!(game_id = paytable.game_id(), path = %path.display(), "Registered paytable");
            games.register(paytable)?;
        }

        let vrf = VrfEngine::load_or_create(store.as_ref())?;
        info!(public_key = %vrf.public_key_hex(), "VRF key ready");

        let ledger = Arc::new(WalletLedger::new(store.clone(), config.ledger.lock_timeout()));
        let sessions = Arc::new(SessionService::new(ledger.clone(), starting_balance));
        let metrics = Arc::new(SpinMetrics::new());
        let orchestrator = Arc::new(RoundOrchestrator::new(
            sessions.clone(),
            ledger.clone(),
            Arc::new(games),
            Arc::new(vrf),
            metrics.clone(),
        ));

        Ok(RgsServices {
            store,
            ledger,
            sessions,
            orchestrator,
            metrics,
        })
    }

    fn open_store(config: &RgsConfig) -> RgsResult<Arc<dyn StoreBackend>> {
        match config.storage.backend {
            StorageBackendKind::Memory => {
                info!("Using in-memory store");
                Ok(Arc::new(MemoryStore::new()))
            }
            StorageBackendKind::Rocksdb => {
                let dir = config
                    .storage
                    .data_dir
                    .as_ref()
                    .ok_or_else(|| ConfigurationError::MissingRequired("storage.data_dir".to_string()))?;
                std::fs::create_dir_all(dir).map_err(|e| {
                    ConfigurationError::LoadFailed(format!("Cannot create {}: {}", dir.display(), e))
                })?;
                info!(data_dir = %dir.display(), "Opening RocksDB store");
                Ok(Arc::new(RocksStore::open(dir)?))
            }
        }
    }
}
