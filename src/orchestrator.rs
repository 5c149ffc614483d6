//! Round orchestrator
//!
//! Coordinates one spin end to end: session check, VRF seed, engine draw,
//! ledger settlement. It keeps no state of its own beyond shared handles.

use crate::common::Amount;
use crate::errors::{CatalogError, DeclineReason, RgsError, RgsResult};
use crate::games::{Contribution, Grid, OutcomeEngine, Paytable, VRFBundle, VrfEngine};
use crate::ledger::{RoundRecord, SettlementRequest, Wallet, WalletLedger};
use crate::metrics::SpinMetrics;
use crate::sessions::SessionService;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Outcome engines keyed by game id
#[derive(Default)]
pub struct GameRegistry {
    games: HashMap<String, Arc<OutcomeEngine>>,
}

impl GameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding only the built-in catalog
    pub fn with_classic() -> Result<Self, CatalogError> {
        let mut registry = Self::new();
        registry.register(Paytable::classic())?;
        Ok(registry)
    }

    pub fn register(&mut self, paytable: Paytable) -> Result<(), CatalogError> {
        let game_id = paytable.game_id().to_string();
        if self.games.contains_key(&game_id) {
            return Err(CatalogError::DuplicateGame(game_id));
        }
        let engine = OutcomeEngine::new(Arc::new(paytable))?;
        self.games.insert(game_id, Arc::new(engine));
        Ok(())
    }

    pub fn get(&self, game_id: &str) -> Option<Arc<OutcomeEngine>> {
        self.games.get(game_id).cloned()
    }

    pub fn game_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.games.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[derive(Debug, Clone)]
pub struct SpinRequest {
    pub session_id: String,
    pub player_id: String,
    pub game_id: String,
    pub wager: Amount,
    pub currency: String,
}

/// Settled spin as returned to the caller
#[derive(Debug, Clone)]
pub struct SpinResult {
    pub round_id: String,
    pub player_id: String,
    pub game_id: String,
    pub wager: Amount,
    pub payout: Amount,
    pub balance: Amount,
    pub currency: String,
    pub timestamp: DateTime<Utc>,
    pub grid: Grid,
    pub contributions: Vec<Contribution>,
    pub scatter_count: usize,
    pub vrf: VRFBundle,
}

impl From<RoundRecord> for SpinResult {
    fn from(round: RoundRecord) -> Self {
        Self {
            round_id: round.round_id,
            player_id: round.player_id,
            game_id: round.game_id,
            wager: round.wager,
            payout: round.payout,
            balance: round.balance_after,
            currency: round.currency,
            timestamp: round.created_at,
            grid: round.grid,
            contributions: round.contributions,
            scatter_count: round.scatter_count,
            vrf: round.vrf,
        }
    }
}

/// Replay of a stored round against its VRF bundle
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RoundVerification {
    pub round_id: String,
    pub is_valid: bool,
    pub vrf_valid: bool,
    pub grid_matches: bool,
    pub payout_matches: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct RoundOrchestrator {
    sessions: Arc<SessionService>,
    ledger: Arc<WalletLedger>,
    games: Arc<GameRegistry>,
    vrf: Arc<VrfEngine>,
    metrics: Arc<SpinMetrics>,
}

impl RoundOrchestrator {
    pub fn new(
        sessions: Arc<SessionService>,
        ledger: Arc<WalletLedger>,
        games: Arc<GameRegistry>,
        vrf: Arc<VrfEngine>,
        metrics: Arc<SpinMetrics>,
    ) -> Self {
        Self {
            sessions,
            ledger,
            games,
            vrf,
            metrics,
        }
    }

    pub async fn spin(&self, request: SpinRequest) -> RgsResult<SpinResult> {
        let session_id = request.session_id.clone();
        let player_id = request.player_id.clone();
        let result = self.settle_spin(request).await;

        match &result {
            Ok(spin) => {
                self.metrics.record_spin(spin.wager.units(), spin.payout.units());
            }
            Err(RgsError::Declined(reason)) => {
                self.metrics.record_decline(reason.code());
                info!(
                    player_id = %player_id,
                    session_id = %session_id,
                    code = reason.code(),
                    "Spin declined: {}",
                    reason
                );
            }
            Err(e) => {
                self.metrics.record_fault();
                warn!(
                    player_id = %player_id,
                    session_id = %session_id,
                    retryable = e.is_retryable(),
                    "Spin aborted: {}",
                    e
                );
            }
        }

        result
    }

    async fn settle_spin(&self, request: SpinRequest) -> RgsResult<SpinResult> {
        // Session binding first; nothing is drawn for a declined request
        self.sessions
            .validate(&request.session_id, &request.player_id)?;

        if request.wager.is_zero() {
            return Err(DeclineReason::NonPositiveWager.into());
        }

        let engine = self
            .games
            .get(&request.game_id)
            .ok_or_else(|| DeclineReason::UnknownGame(request.game_id.clone()))?;

        let round_id = Uuid::new_v4().to_string();
        let input = VrfEngine::round_input(
            &round_id,
            &request.game_id,
            &request.player_id,
            &request.session_id,
        );
        let (vrf, seed) = self.vrf.prove(&input);
        let outcome = engine.spin_seeded(request.wager, seed)?;

        let settlement = self
            .ledger
            .settle(SettlementRequest {
                round_id,
                player_id: request.player_id,
                session_id: request.session_id,
                game_id: request.game_id,
                currency: request.currency,
                wager: request.wager,
                outcome,
                vrf,
            })
            .await?;

        Ok(settlement.round.into())
    }

    pub fn load_round(&self, round_id: &str) -> RgsResult<Option<RoundRecord>> {
        Ok(self.ledger.store().load_round(round_id)?)
    }

    pub fn wallet(&self, player_id: &str) -> RgsResult<Wallet> {
        self.ledger.wallet(player_id)
    }

    /// Re-verify a stored round: VRF proof, re-drawn grid and re-scored payout.
    /// `None` when the round does not exist.
    pub fn verify_round(&self, round_id: &str) -> RgsResult<Option<RoundVerification>> {
        let Some(round) = self.load_round(round_id)? else {
            return Ok(None);
        };

        let mut verification = RoundVerification {
            round_id: round.round_id.clone(),
            is_valid: false,
            vrf_valid: false,
            grid_matches: false,
            payout_matches: false,
            error: None,
        };

        let expected_input = VrfEngine::round_input(
            &round.round_id,
            &round.game_id,
            &round.player_id,
            &round.session_id,
        );
        match VrfEngine::verify_vrf_proof(&round.vrf, &expected_input) {
            Ok(true) => verification.vrf_valid = true,
            Ok(false) => verification.error = Some("VRF proof does not verify".to_string()),
            Err(e) => verification.error = Some(e),
        }

        let Some(engine) = self.games.get(&round.game_id) else {
            verification.error = Some(format!("Unknown game: {}", round.game_id));
            return Ok(Some(verification));
        };
        let seed = match VrfEngine::seed_from_bundle(&round.vrf) {
            Ok(seed) => seed,
            Err(e) => {
                verification.error = Some(e);
                return Ok(Some(verification));
            }
        };

        let replay = match engine.spin_seeded(round.wager, seed) {
            Ok(replay) => replay,
            Err(e) => {
                verification.error = Some(e.to_string());
                return Ok(Some(verification));
            }
        };
        verification.grid_matches = replay.grid == round.grid;
        verification.payout_matches =
            replay.payout == round.payout && replay.contributions == round.contributions;
        verification.is_valid =
            verification.vrf_valid && verification.grid_matches && verification.payout_matches;

        if verification.error.is_none() && !verification.is_valid {
            verification.error = Some("Replayed outcome differs from stored round".to_string());
        }

        Ok(Some(verification))
    }

    pub fn games(&self) -> &GameRegistry {
        &self.games
    }

    pub fn sessions(&self) -> &SessionService {
        &self.sessions
    }

    pub fn metrics(&self) -> &SpinMetrics {
        &self.metrics
    }

    pub fn vrf_public_key(&self) -> String {
        self.vrf.public_key_hex()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{MemoryStore, StoreBackend, WriteSet};
    use std::time::Duration;

    struct Fixture {
        store: Arc<MemoryStore>,
        orchestrator: RoundOrchestrator,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(WalletLedger::new(store.clone(), Duration::from_millis(200)));
        let sessions = Arc::new(SessionService::new(
            ledger.clone(),
            Amount::from_major_units(1000),
        ));
        let orchestrator = RoundOrchestrator::new(
            sessions,
            ledger,
            Arc::new(GameRegistry::with_classic().unwrap()),
            Arc::new(VrfEngine::new_random()),
            Arc::new(SpinMetrics::new()),
        );
        Fixture {
            store,
            orchestrator,
        }
    }

    fn spin_request(session_id: &str, player_id: &str, wager: u64) -> SpinRequest {
        SpinRequest {
            session_id: session_id.to_string(),
            player_id: player_id.to_string(),
            game_id: crate::games::CLASSIC_GAME_ID.to_string(),
            wager: Amount::from_major_units(wager),
            currency: "USD".to_string(),
        }
    }

    #[tokio::test]
    async fn test_spin_settles_and_verifies() {
        let f = fixture();
        let start = f
            .orchestrator
            .sessions()
            .start_session("casino", "alice", "USD")
            .await
            .unwrap();
        let player = start.session.player_id.clone();

        let result = f
            .orchestrator
            .spin(spin_request(&start.session.session_id, &player, 10))
            .await
            .unwrap();

        let summed = Amount::checked_sum(result.contributions.iter().map(|c| c.amount)).unwrap();
        assert_eq!(result.payout, summed);
        assert_eq!(
            result.balance.units(),
            Amount::from_major_units(990).units() + result.payout.units()
        );
        assert_eq!(f.orchestrator.wallet(&player).unwrap().balance, result.balance);

        let verification = f.orchestrator.verify_round(&result.round_id).unwrap().unwrap();
        assert!(verification.is_valid, "{:?}", verification);
        assert!(f.orchestrator.verify_round("missing").unwrap().is_none());
        assert_eq!(f.orchestrator.metrics().snapshot().spins_total, 1);
    }

    #[tokio::test]
    async fn test_tampered_round_fails_verification() {
        let f = fixture();
        let start = f
            .orchestrator
            .sessions()
            .start_session("casino", "alice", "USD")
            .await
            .unwrap();
        let result = f
            .orchestrator
            .spin(spin_request(&start.session.session_id, &start.session.player_id, 10))
            .await
            .unwrap();

        // Re-store a copy of the round with a doctored payout under a new id
        let mut forged = f.orchestrator.load_round(&result.round_id).unwrap().unwrap();
        forged.round_id = "forged".to_string();
        forged.payout = Amount::from_major_units(5000);
        let mut writes = WriteSet::default();
        writes.rounds.push(forged);
        f.store.commit(writes).unwrap();

        let verification = f.orchestrator.verify_round("forged").unwrap().unwrap();
        assert!(!verification.is_valid);
        assert!(!verification.vrf_valid);
        assert!(verification.error.is_some());
    }

    #[tokio::test]
    async fn test_session_mismatch_declines_before_draw() {
        let f = fixture();
        let alice = f
            .orchestrator
            .sessions()
            .start_session("casino", "alice", "USD")
            .await
            .unwrap();
        let bob = f
            .orchestrator
            .sessions()
            .start_session("casino", "bob", "USD")
            .await
            .unwrap();

        let err = f
            .orchestrator
            .spin(spin_request(&alice.session.session_id, &bob.session.player_id, 10))
            .await
            .unwrap_err();
        assert_eq!(err.decline_reason(), Some(&DeclineReason::SessionPlayerMismatch));
        assert_eq!(f.store.round_count(), 0);
        assert_eq!(
            f.orchestrator.metrics().snapshot().declines.get("SESSION_PLAYER_MISMATCH"),
            Some(&1)
        );
    }

    #[tokio::test]
    async fn test_unknown_game_and_zero_wager() {
        let f = fixture();
        let start = f
            .orchestrator
            .sessions()
            .start_session("casino", "alice", "USD")
            .await
            .unwrap();
        let session = start.session.session_id.as_str();
        let player = start.session.player_id.as_str();

        let err = f.orchestrator.spin(spin_request(session, player, 0)).await.unwrap_err();
        assert_eq!(err.decline_reason(), Some(&DeclineReason::NonPositiveWager));

        let mut request = spin_request(session, player, 10);
        request.game_id = "nope".to_string();
        let err = f.orchestrator.spin(request).await.unwrap_err();
        assert_eq!(err.decline_reason().map(|r| r.code()), Some("UNKNOWN_GAME"));
    }

    #[test]
    fn test_registry_rejects_duplicate_game() {
        let mut registry = GameRegistry::with_classic().unwrap();
        assert_eq!(
            registry.register(Paytable::classic()),
            Err(CatalogError::DuplicateGame(crate::games::CLASSIC_GAME_ID.to_string()))
        );
        assert_eq!(registry.game_ids(), vec![crate::games::CLASSIC_GAME_ID.to_string()]);
    }
}
