// ============================================
// File: crates/pearpass-core/src/pairing.rs
// ============================================
//! # Pairing Manager
//!
//! ## Creation Reason
//! Implements the trust bootstrap between host and extension: derivation and
//! verification of the human-readable pairing code, and pinning of the
//! extension's long-term Ed25519 key with its two-state lifecycle.
//!
//! ## Main Functionality
//! - Pairing-code derivation (`%06d-%04X` from a tagged SHA-256)
//! - Constant-time, case-insensitive code verification
//! - Peer pinning with `PENDING → CONFIRMED` state machine
//! - Locked-vault pairing-status queries via the unprotected cache
//!
//! ## Peer State Machine
//! ```text
//! ┌────────┐  pin_peer   ┌─────────┐  confirm_peer  ┌───────────┐
//! │ absent │ ──────────► │ PENDING │ ─────────────► │ CONFIRMED │
//! └────────┘             └─────────┘                └───────────┘
//!      ▲                      │                           │
//!      └──────────────────────┴────── identity reset ─────┘
//! ```
//! No other transitions exist. Only a `CONFIRMED` peer's key is mirrored to
//! the unprotected cache; `PENDING` must never appear there.
//!
//! ## ⚠️ Important Note for Next Developer
//! - The pairing-code preimage (`tag ‖ secret ‖ ed_pub`) is wire-visible:
//!   both sides derive the same code, so the layout cannot change without
//!   coordinating with the extension
//! - Code comparison must stay constant-time
//! - A locked vault must not block first-run pairing: the peer record is
//!   mirrored in a process-private cache, with the vault authoritative
//!   whenever it is readable
//!
//! ## Last Modified
//! v0.1.0 - Initial pairing manager

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use pearpass_common::encoding::{b64_decode_exact, b64_encode};

use crate::crypto::primitives::{ct_eq, sha256};
use crate::crypto::{ED25519_PUBLIC_KEY_SIZE, PAIRING_CODE_TAG, PAIRING_SECRET_SIZE};
use crate::error::{ErrorKind, ProtocolError, Result};
use crate::identity::IdentityStore;
use crate::kv::{KvStore, PlainCache, KEY_PEER_DATA};

// ============================================
// PairingState
// ============================================

/// Lifecycle state of the pinned peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PairingState {
    /// Pinned during `getAppIdentity`, not yet proven by a handshake.
    #[serde(rename = "PENDING")]
    Pending,
    /// Proven by a verified handshake; visible to locked-vault status checks.
    #[serde(rename = "CONFIRMED")]
    Confirmed,
}

impl std::fmt::Display for PairingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Confirmed => write!(f, "CONFIRMED"),
        }
    }
}

// ============================================
// PeerRecord
// ============================================

/// The persisted peer record (`peer.data`, JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PeerRecord {
    /// Extension's Ed25519 public key, base64.
    #[serde(rename = "publicKey")]
    public_key: String,
    /// Pairing lifecycle state.
    #[serde(rename = "pairingState")]
    pairing_state: PairingState,
}

impl PeerRecord {
    fn key_bytes(&self) -> Result<[u8; ED25519_PUBLIC_KEY_SIZE]> {
        b64_decode_exact(&self.public_key).map_err(|_| {
            ProtocolError::new(ErrorKind::InvalidPeerPublicKey, "stored peer key is malformed")
        })
    }
}

// ============================================
// Pairing-code derivation
// ============================================

/// Derives the human-readable pairing code from the identity key and the
/// pairing secret.
///
/// `h = sha256(tag ‖ secret ‖ ed_pub)`, code = `%06d-%04X` built from
/// big-endian `h[0..4] mod 1_000_000` and `h[4..6]`. Deterministic and
/// reproducible across processes; the extension derives the same code.
#[must_use]
pub fn derive_pairing_code(
    ed_pub: &[u8; ED25519_PUBLIC_KEY_SIZE],
    secret: &[u8; PAIRING_SECRET_SIZE],
) -> String {
    let mut input =
        Vec::with_capacity(PAIRING_CODE_TAG.len() + PAIRING_SECRET_SIZE + ED25519_PUBLIC_KEY_SIZE);
    input.extend_from_slice(PAIRING_CODE_TAG);
    input.extend_from_slice(secret);
    input.extend_from_slice(ed_pub);

    let digest = sha256(&input);
    let decimal = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]) % 1_000_000;
    let suffix = u16::from_be_bytes([digest[4], digest[5]]);

    format!("{decimal:06}-{suffix:04X}")
}

// ============================================
// PairingManager
// ============================================

/// Manages the pairing code and the pinned peer record.
pub struct PairingManager {
    kv: Arc<dyn KvStore>,
    plain: Arc<dyn PlainCache>,
    identity: Arc<IdentityStore>,
    /// Process-private mirror of the peer record; serves reads while the
    /// vault is locked. The vault wins whenever it is readable.
    mem: Mutex<Option<PeerRecord>>,
}

impl PairingManager {
    /// Creates a pairing manager over the given backends.
    #[must_use]
    pub fn new(
        kv: Arc<dyn KvStore>,
        plain: Arc<dyn PlainCache>,
        identity: Arc<IdentityStore>,
    ) -> Self {
        Self {
            kv,
            plain,
            identity,
            mem: Mutex::new(None),
        }
    }

    /// Returns the current pairing code for this host identity.
    pub async fn pairing_code(&self) -> Result<String> {
        let public = self.identity.get_or_create().await?;
        let secret = self.identity.pairing_secret().await?;
        Ok(derive_pairing_code(&public.ed_pub, secret.as_bytes()))
    }

    /// Verifies a user-supplied pairing code.
    ///
    /// Case-insensitive (input is upper-cased), constant-time comparison.
    /// Empty input is always `false`.
    pub async fn verify_pairing_code(&self, input: &str) -> Result<bool> {
        if input.is_empty() {
            return Ok(false);
        }
        let expected = self.pairing_code().await?;
        let candidate = input.to_uppercase();
        Ok(ct_eq(candidate.as_bytes(), expected.as_bytes()))
    }

    /// Pins the extension's public key as the peer, state `PENDING`.
    ///
    /// Re-pinning the same key is a no-op that preserves the existing state.
    ///
    /// # Errors
    /// - `InvalidPeerPublicKey` if the key is not 32 bytes of valid base64
    /// - `PeerAlreadyPaired` if a different key is already pinned
    pub async fn pin_peer(&self, peer_ed_pub_b64: &str) -> Result<()> {
        let bytes: [u8; ED25519_PUBLIC_KEY_SIZE] =
            b64_decode_exact(peer_ed_pub_b64).map_err(|_| {
                ProtocolError::new(ErrorKind::InvalidPeerPublicKey, "peer key is not a 32-byte key")
            })?;

        if let Some(existing) = self.load_record().await {
            if existing.key_bytes()? != bytes {
                return Err(ErrorKind::PeerAlreadyPaired.into());
            }
            debug!("peer already pinned; pin is a no-op");
            return Ok(());
        }

        let record = PeerRecord {
            public_key: b64_encode(bytes),
            pairing_state: PairingState::Pending,
        };
        self.save_record(&record).await;

        info!("Peer pinned as PENDING");
        Ok(())
    }

    /// Confirms the pending peer and mirrors its key to the unprotected
    /// cache.
    ///
    /// # Errors
    /// - `InvalidPeerPublicKey` if the key is malformed
    /// - `NoPendingPairing` if no peer record exists
    /// - `PeerKeyMismatch` if the key differs from the pinned one
    pub async fn confirm_peer(&self, peer_ed_pub_b64: &str) -> Result<()> {
        let bytes: [u8; ED25519_PUBLIC_KEY_SIZE] =
            b64_decode_exact(peer_ed_pub_b64).map_err(|_| {
                ProtocolError::new(ErrorKind::InvalidPeerPublicKey, "peer key is not a 32-byte key")
            })?;

        let Some(mut record) = self.load_record().await else {
            return Err(ErrorKind::NoPendingPairing.into());
        };
        if record.key_bytes()? != bytes {
            return Err(ErrorKind::PeerKeyMismatch.into());
        }

        record.pairing_state = PairingState::Confirmed;
        self.save_record(&record).await;

        // Only a CONFIRMED key may reach the unprotected cache
        self.plain.put(b64_encode(bytes)).await;

        info!("Peer pairing confirmed");
        Ok(())
    }

    /// Returns the pinned peer's public key, or `None` when no peer is
    /// pinned.
    ///
    /// # Errors
    /// `InvalidPeerPublicKey` if a record exists but its key is malformed.
    pub async fn peer_public_key(&self) -> Result<Option<[u8; ED25519_PUBLIC_KEY_SIZE]>> {
        match self.load_record().await {
            Some(record) => record.key_bytes().map(Some),
            None => Ok(None),
        }
    }

    /// Returns the pinned peer's pairing state, or `None` when absent.
    pub async fn peer_state(&self) -> Option<PairingState> {
        self.load_record().await.map(|record| record.pairing_state)
    }

    /// Returns `true` iff the argument byte-equals the confirmed peer key.
    ///
    /// Answers from the unprotected cache, so this works while the vault is
    /// locked; a `PENDING` peer is never reported as paired.
    pub async fn is_paired(&self, peer_ed_pub_b64: &str) -> bool {
        let Ok(candidate) = b64_decode_exact::<ED25519_PUBLIC_KEY_SIZE>(peer_ed_pub_b64) else {
            return false;
        };
        let Some(cached) = self.plain.get().await else {
            return false;
        };
        let Ok(confirmed) = b64_decode_exact::<ED25519_PUBLIC_KEY_SIZE>(&cached) else {
            return false;
        };
        candidate == confirmed
    }

    /// Wipes the peer record, the unprotected cache, and the local mirror.
    /// Called during pairing reset.
    pub async fn reset(&self) {
        if let Err(e) = self.kv.put(KEY_PEER_DATA, "").await {
            warn!(error = %e, "reset: peer record not overwritten");
        }
        self.plain.clear().await;
        *self.mem.lock() = None;
    }

    // ========================================
    // Record persistence
    // ========================================

    async fn load_record(&self) -> Option<PeerRecord> {
        match self.kv.get(KEY_PEER_DATA).await {
            Ok(value) => match value.non_empty() {
                Some(json) => match serde_json::from_str(&json) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!(error = %e, "stored peer record is not valid JSON");
                        None
                    }
                },
                // Vault readable but empty: fall back to the local mirror,
                // which only exists if this process pinned a peer while the
                // vault was locked
                None => self.mem.lock().clone(),
            },
            Err(e) => {
                debug!(error = %e, "peer record unavailable from kv");
                self.mem.lock().clone()
            }
        }
    }

    async fn save_record(&self, record: &PeerRecord) {
        *self.mem.lock() = Some(record.clone());

        match serde_json::to_string(record) {
            Ok(json) => {
                if let Err(e) = self.kv.put(KEY_PEER_DATA, &json).await {
                    warn!(error = %e, "peer record not persisted");
                }
            }
            Err(e) => warn!(error = %e, "peer record serialisation failed"),
        }
    }
}

impl std::fmt::Debug for PairingManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PairingManager")
            .field("mirrored", &self.mem.lock().is_some())
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{MemoryCache, MemoryKv};

    fn manager() -> (Arc<MemoryKv>, Arc<MemoryCache>, PairingManager) {
        let kv = Arc::new(MemoryKv::new());
        let plain = Arc::new(MemoryCache::new());
        let identity = Arc::new(IdentityStore::new(Arc::clone(&kv) as Arc<dyn KvStore>));
        let pairing = PairingManager::new(
            Arc::clone(&kv) as Arc<dyn KvStore>,
            Arc::clone(&plain) as Arc<dyn PlainCache>,
            identity,
        );
        (kv, plain, pairing)
    }

    fn peer_key() -> String {
        b64_encode([0x11u8; 32])
    }

    #[test]
    fn test_code_format_and_determinism() {
        let ed_pub = [0x42u8; 32];
        let secret = [0x17u8; 32];

        let code = derive_pairing_code(&ed_pub, &secret);
        assert_eq!(code, derive_pairing_code(&ed_pub, &secret));

        // ^\d{6}-[0-9A-F]{4}$
        assert_eq!(code.len(), 11);
        let (decimal, rest) = code.split_at(6);
        assert!(decimal.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(&rest[..1], "-");
        assert!(rest[1..]
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn test_code_separation() {
        let ed_pub = [0x42u8; 32];
        let secret = [0x17u8; 32];
        let base = derive_pairing_code(&ed_pub, &secret);

        let mut other_pub = ed_pub;
        other_pub[31] ^= 0x01;
        assert_ne!(base, derive_pairing_code(&other_pub, &secret));

        let mut other_secret = secret;
        other_secret[0] ^= 0x01;
        assert_ne!(base, derive_pairing_code(&ed_pub, &other_secret));
    }

    #[tokio::test]
    async fn test_verify_code_case_insensitive() {
        let (_kv, _plain, pairing) = manager();

        let code = pairing.pairing_code().await.unwrap();
        assert!(pairing.verify_pairing_code(&code).await.unwrap());
        assert!(pairing
            .verify_pairing_code(&code.to_lowercase())
            .await
            .unwrap());

        assert!(!pairing.verify_pairing_code("").await.unwrap());
        assert!(!pairing.verify_pairing_code("000000-0000").await.unwrap());
    }

    #[tokio::test]
    async fn test_pin_monotonicity() {
        let (_kv, _plain, pairing) = manager();

        pairing.pin_peer(&peer_key()).await.unwrap();
        assert_eq!(pairing.peer_state().await, Some(PairingState::Pending));

        // Same key again: no-op
        pairing.pin_peer(&peer_key()).await.unwrap();
        assert_eq!(pairing.peer_state().await, Some(PairingState::Pending));

        // Different key: rejected
        let other = b64_encode([0x22u8; 32]);
        let err = pairing.pin_peer(&other).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::PeerAlreadyPaired);
    }

    #[tokio::test]
    async fn test_pin_rejects_malformed_key() {
        let (_kv, _plain, pairing) = manager();

        let err = pairing.pin_peer("not base64").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidPeerPublicKey);

        let short = b64_encode([0u8; 16]);
        let err = pairing.pin_peer(&short).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidPeerPublicKey);
    }

    #[tokio::test]
    async fn test_confirmation_gate() {
        let (_kv, plain, pairing) = manager();

        // Nothing to confirm yet
        let err = pairing.confirm_peer(&peer_key()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoPendingPairing);

        pairing.pin_peer(&peer_key()).await.unwrap();

        // PENDING never reaches the unprotected cache
        assert_eq!(plain.get().await, None);
        assert!(!pairing.is_paired(&peer_key()).await);

        // Wrong key cannot confirm
        let other = b64_encode([0x22u8; 32]);
        let err = pairing.confirm_peer(&other).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::PeerKeyMismatch);
        assert_eq!(plain.get().await, None);

        pairing.confirm_peer(&peer_key()).await.unwrap();
        assert_eq!(pairing.peer_state().await, Some(PairingState::Confirmed));
        assert_eq!(plain.get().await, Some(peer_key()));
        assert!(pairing.is_paired(&peer_key()).await);
        assert!(!pairing.is_paired(&other).await);
    }

    #[tokio::test]
    async fn test_locked_vault_pairing_continuity() {
        let (kv, _plain, pairing) = manager();
        kv.set_locked(true);

        pairing.pin_peer(&peer_key()).await.unwrap();

        // The record serves from the local mirror while the vault is locked
        let pinned = pairing.peer_public_key().await.unwrap().unwrap();
        assert_eq!(pinned, [0x11u8; 32]);
        assert_eq!(pairing.peer_state().await, Some(PairingState::Pending));
    }

    #[tokio::test]
    async fn test_reset_clears_peer_state() {
        let (_kv, plain, pairing) = manager();

        pairing.pin_peer(&peer_key()).await.unwrap();
        pairing.confirm_peer(&peer_key()).await.unwrap();

        pairing.reset().await;

        assert_eq!(pairing.peer_public_key().await.unwrap(), None);
        assert_eq!(pairing.peer_state().await, None);
        assert_eq!(plain.get().await, None);
        assert!(!pairing.is_paired(&peer_key()).await);
    }

    #[tokio::test]
    async fn test_record_wire_format() {
        let (kv, _plain, pairing) = manager();
        pairing.pin_peer(&peer_key()).await.unwrap();

        let raw = kv.get(KEY_PEER_DATA).await.unwrap().non_empty().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["publicKey"], peer_key());
        assert_eq!(parsed["pairingState"], "PENDING");
    }
}
