use crate::errors::{StorageError, StorageResult};
use crate::games::types::VRFBundle;
use crate::ledger::store::{StoreBackend, WriteSet};
use schnorrkel::context::SigningContext;
use schnorrkel::vrf::{VRFPreOut, VRFProof};
use schnorrkel::{ExpansionMode, Keypair, MiniSecretKey, PublicKey};
use std::sync::Arc;

const VRF_SIGNING_CONTEXT: &[u8] = b"rgs-core-spin";
const VRF_SEED_CONTEXT: &[u8] = b"rgs-core-seed";

/// Metadata key holding the 32-byte mini secret of the server VRF key
pub const VRF_SEED_KEY: &str = "vrf:mini_secret_seed";

/// VRF-based seed generator for spins
pub struct VrfEngine {
    keypair: Arc<Keypair>,
}

impl VrfEngine {
    /// Create a new VRF engine with a keypair
    pub fn new(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
        }
    }

    /// Create a new VRF engine with a random keypair (for testing)
    pub fn new_random() -> Self {
        use rand_core::OsRng;
        Self::new(Keypair::generate_with(OsRng))
    }

    pub fn from_mini_secret(seed: &[u8; 32]) -> StorageResult<Self> {
        let mini = MiniSecretKey::from_bytes(seed)
            .map_err(|e| StorageError::Corrupted(format!("Invalid VRF seed: {:?}", e)))?;
        Ok(Self::new(mini.expand_to_keypair(ExpansionMode::Ed25519)))
    }

    /// Load the persisted VRF key, creating and committing one on first start.
    ///
    /// This keeps `public_key` stable across restarts so old rounds verify.
    pub fn load_or_create(store: &dyn StoreBackend) -> StorageResult<Self> {
        if let Some(existing) = store.load_metadata(VRF_SEED_KEY)? {
            let seed: [u8; 32] = existing
                .try_into()
                .map_err(|_| StorageError::Corrupted("VRF seed must be 32 bytes".to_string()))?;
            return Self::from_mini_secret(&seed);
        }

        use rand_core::OsRng;
        let mini = MiniSecretKey::generate_with(OsRng);

        let mut writes = WriteSet::default();
        writes
            .metadata
            .push((VRF_SEED_KEY.to_string(), mini.to_bytes().to_vec()));
        store.commit(writes)?;

        tracing::info!("Generated new VRF key");
        Ok(Self::new(mini.expand_to_keypair(ExpansionMode::Ed25519)))
    }

    /// Deterministic VRF input for a round
    pub fn round_input(round_id: &str, game_id: &str, player_id: &str, session_id: &str) -> String {
        format!("{}:{}:{}:{}", round_id, game_id, player_id, session_id)
    }

    /// Evaluate the VRF on `input_message`. The pre-output is unique per key
    /// and input, so the 32-byte seed derived from it cannot be re-rolled.
    pub fn prove(&self, input_message: &str) -> (VRFBundle, [u8; 32]) {
        let ctx = SigningContext::new(VRF_SIGNING_CONTEXT);
        let (inout, proof, _) = self.keypair.vrf_sign(ctx.bytes(input_message.as_bytes()));
        let output: [u8; 32] = inout.make_bytes(VRF_SEED_CONTEXT);

        let bundle = VRFBundle {
            vrf_output: hex::encode(output),
            vrf_preout: hex::encode(inout.to_preout().to_bytes()),
            vrf_proof: hex::encode(proof.to_bytes()),
            public_key: self.public_key_hex(),
            input_message: input_message.to_string(),
        };
        (bundle, output)
    }

    /// RNG seed carried by a bundle
    pub fn seed_from_bundle(bundle: &VRFBundle) -> Result<[u8; 32], String> {
        hex::decode(&bundle.vrf_output)
            .map_err(|e| format!("Invalid VRF output hex: {}", e))?
            .try_into()
            .map_err(|_| "VRF output must be 32 bytes".to_string())
    }

    /// Verify a VRF proof (public verification function)
    pub fn verify_vrf_proof(vrf_bundle: &VRFBundle, expected_input: &str) -> Result<bool, String> {
        if vrf_bundle.input_message != expected_input {
            return Ok(false);
        }

        let vrf_output = Self::seed_from_bundle(vrf_bundle)?;
        let preout_bytes = hex::decode(&vrf_bundle.vrf_preout)
            .map_err(|e| format!("Invalid VRF pre-output hex: {}", e))?;
        let proof_bytes = hex::decode(&vrf_bundle.vrf_proof)
            .map_err(|e| format!("Invalid VRF proof hex: {}", e))?;
        let public_key_bytes = hex::decode(&vrf_bundle.public_key)
            .map_err(|e| format!("Invalid public key hex: {}", e))?;

        let public_key = PublicKey::from_bytes(&public_key_bytes)
            .map_err(|e| format!("Invalid public key: {:?}", e))?;
        let preout = VRFPreOut::from_bytes(&preout_bytes)
            .map_err(|e| format!("Invalid VRF pre-output: {:?}", e))?;
        let proof = VRFProof::from_bytes(&proof_bytes)
            .map_err(|e| format!("Invalid VRF proof: {:?}", e))?;

        let ctx = SigningContext::new(VRF_SIGNING_CONTEXT);
        let inout = match public_key.vrf_verify(ctx.bytes(expected_input.as_bytes()), &preout, &proof)
        {
            Ok((inout, _)) => inout,
            Err(_) => return Ok(false),
        };

        // Seed must be the one the verified pre-output yields
        let computed: [u8; 32] = inout.make_bytes(VRF_SEED_CONTEXT);
        Ok(computed == vrf_output)
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.keypair.public.to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::memory::MemoryStore;

    #[test]
    fn test_prove_and_verify() {
        let engine = VrfEngine::new_random();
        let input = VrfEngine::round_input("round-1", "classic-5x3", "player-1", "session-1");
        assert_eq!(input, "round-1:classic-5x3:player-1:session-1");

        let (bundle, seed) = engine.prove(&input);
        assert_eq!(bundle.public_key, engine.public_key_hex());
        assert!(VrfEngine::verify_vrf_proof(&bundle, &input).unwrap());
        assert_eq!(VrfEngine::seed_from_bundle(&bundle).unwrap(), seed);
    }

    #[test]
    fn test_tamper_detection() {
        let engine = VrfEngine::new_random();
        let (mut bundle, _) = engine.prove("round-2:g:p:s");

        assert!(!VrfEngine::verify_vrf_proof(&bundle, "round-3:g:p:s").unwrap());

        bundle.vrf_output = hex::encode([0xff; 32]);
        assert!(!VrfEngine::verify_vrf_proof(&bundle, "round-2:g:p:s").unwrap());

        bundle.vrf_proof = "zz".to_string();
        assert!(VrfEngine::verify_vrf_proof(&bundle, "round-2:g:p:s").is_err());
    }

    #[test]
    fn test_output_is_unique_per_input() {
        let engine = VrfEngine::new_random();
        let input = "r1:classic-5x3:p1:s1";

        let (first, first_seed) = engine.prove(input);
        for _ in 0..10 {
            let (bundle, seed) = engine.prove(input);
            assert_eq!(seed, first_seed);
            assert_eq!(bundle.vrf_preout, first.vrf_preout);
            assert!(VrfEngine::verify_vrf_proof(&bundle, input).unwrap());
        }

        let (_, other_seed) = engine.prove("r2:classic-5x3:p1:s1");
        assert_ne!(other_seed, first_seed);
    }

    #[test]
    fn test_swapped_preout_rejected() {
        let engine = VrfEngine::new_random();
        let (mut bundle, _) = engine.prove("r1:g:p:s");
        let (other, _) = engine.prove("r2:g:p:s");

        // A pre-output from another input cannot be passed off with this proof
        bundle.vrf_preout = other.vrf_preout;
        bundle.vrf_output = other.vrf_output;
        assert!(!VrfEngine::verify_vrf_proof(&bundle, "r1:g:p:s").unwrap());
    }

    #[test]
    fn test_key_is_persisted() {
        let store = MemoryStore::new();
        let first = VrfEngine::load_or_create(&store).unwrap();
        let second = VrfEngine::load_or_create(&store).unwrap();
        assert_eq!(first.public_key_hex(), second.public_key_hex());
    }

    #[test]
    fn test_corrupted_seed_rejected() {
        let store = MemoryStore::new();
        let mut writes = WriteSet::default();
        writes.metadata.push((VRF_SEED_KEY.to_string(), vec![1, 2, 3]));
        store.commit(writes).unwrap();

        assert!(matches!(
            VrfEngine::load_or_create(&store),
            Err(StorageError::Corrupted(_))
        ));
    }
}
