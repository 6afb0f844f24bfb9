// ============================================
// File: crates/pearpass-core/src/identity.rs
// ============================================
//! # Identity Store
//!
//! ## Creation Reason
//! Persists and serves the host's long-term identity: the Ed25519 signing
//! pair, the X25519 exchange pair, the creation timestamp, and the pairing
//! secret. One identity per installation; its lifetime ends only with an
//! explicit pairing reset.
//!
//! ## Main Functionality
//! - `IdentityStore`: load-or-generate, secret access, fingerprint, reset
//! - `IdentityPublic`: the shareable half of the identity
//! - Memory cache so a locked vault does not prevent first-run pairing
//!
//! ## Persistence Model
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  id.ed25519        base64( ed_pub(32) ‖ ed_sk(64) )      │
//! │  id.x25519         base64( x_pub(32) ‖ x_sk(32) )        │
//! │  id.createdAt      ISO-8601 string                       │
//! │  id.pairingSecret  base64( 32 random bytes )             │
//! └──────────────────────────────────────────────────────────┘
//! ```
//! All five fields exist together or the identity counts as absent;
//! partial or undecodable state triggers regeneration on the next load.
//! Writes are independent; a failed write is tolerated by the next load.
//!
//! ## ⚠️ Important Note for Next Developer
//! - KV failures are downgraded to "not persisted": callers always get a
//!   usable identity, never a raw storage error
//! - Loads never repopulate the memory cache; only generation does. The
//!   cache exists exactly for the locked-vault window
//!
//! ## Last Modified
//! v0.1.0 - Initial identity store

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use pearpass_common::encoding::{b64_decode, b64_encode};
use pearpass_common::time::iso8601_utc_now;

use crate::crypto::keys::{ExchangeKeyPair, IdentityKeyPair, PairingSecret};
use crate::crypto::primitives::sha256;
use crate::crypto::ED25519_PUBLIC_KEY_SIZE;
use crate::error::{ErrorKind, ProtocolError, Result};
use crate::kv::{KvStore, KEY_CREATED_AT, KEY_ED25519, KEY_PAIRING_SECRET, KEY_X25519};

// ============================================
// IdentityPublic
// ============================================

/// The shareable half of the host identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityPublic {
    /// Ed25519 verifying key.
    pub ed_pub: [u8; 32],
    /// X25519 public key.
    pub x_pub: [u8; 32],
    /// ISO-8601 creation timestamp.
    pub created_at: String,
}

impl IdentityPublic {
    /// Returns `hex(sha256(ed_pub))`, the identity fingerprint shown to the
    /// user during pairing.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        IdentityStore::fingerprint(&self.ed_pub)
    }
}

// ============================================
// IdentityKeys (internal)
// ============================================

/// The complete identity, secrets included. Never leaves the core.
#[derive(Clone)]
pub(crate) struct IdentityKeys {
    pub(crate) signing: IdentityKeyPair,
    pub(crate) exchange: ExchangeKeyPair,
    pub(crate) created_at: String,
    pub(crate) pairing_secret: PairingSecret,
}

impl IdentityKeys {
    fn generate() -> Self {
        Self {
            signing: IdentityKeyPair::generate(),
            exchange: ExchangeKeyPair::generate(),
            created_at: iso8601_utc_now(),
            pairing_secret: PairingSecret::generate(),
        }
    }

    fn public(&self) -> IdentityPublic {
        IdentityPublic {
            ed_pub: self.signing.public_key_bytes(),
            x_pub: self.exchange.public_key_bytes(),
            created_at: self.created_at.clone(),
        }
    }
}

// ============================================
// IdentityStore
// ============================================

/// Loads, generates, and rotates the host's long-term identity.
pub struct IdentityStore {
    kv: Arc<dyn KvStore>,
    cache: Mutex<Option<IdentityKeys>>,
}

impl IdentityStore {
    /// Creates a store over the given KV backend.
    #[must_use]
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            kv,
            cache: Mutex::new(None),
        }
    }

    /// Returns the host identity, generating and persisting one if needed.
    ///
    /// Idempotent: repeated calls return the same public keys and perform
    /// no key generation once an identity exists (persisted or cached).
    ///
    /// # Errors
    /// None in practice; KV failures are downgraded to "not persisted".
    pub async fn get_or_create(&self) -> Result<IdentityPublic> {
        // Best effort; "already initialized" and a locked vault are both fine
        if let Err(e) = self.kv.init().await {
            debug!(error = %e, "kv init unavailable");
        }

        if let Some(keys) = self.load_persisted().await {
            return Ok(keys.public());
        }

        if let Some(keys) = self.cache.lock().clone() {
            return Ok(keys.public());
        }

        let keys = IdentityKeys::generate();
        {
            let mut guard = self.cache.lock();
            if let Some(existing) = guard.clone() {
                // Another task won the generation race
                return Ok(existing.public());
            }
            *guard = Some(keys.clone());
        }

        info!(
            fingerprint = %Self::fingerprint(&keys.signing.public_key_bytes()),
            "Generated new host identity"
        );
        self.persist(&keys).await;

        Ok(keys.public())
    }

    /// Returns the 32-byte pairing secret, minting the identity first if
    /// none exists yet.
    ///
    /// # Errors
    /// `InvalidPairingSecret` if a persisted secret is undecodable or not
    /// exactly 32 bytes.
    pub async fn pairing_secret(&self) -> Result<PairingSecret> {
        if let Some(secret) = self.load_secret().await? {
            return Ok(secret);
        }

        self.get_or_create().await?;

        if let Some(secret) = self.load_secret().await? {
            return Ok(secret);
        }
        // get_or_create always leaves the secret in KV or the cache
        Err(ErrorKind::IdentityKeysUnavailable.into())
    }

    async fn load_secret(&self) -> Result<Option<PairingSecret>> {
        if let Some(b64) = self.read_key(KEY_PAIRING_SECRET).await {
            let bytes = b64_decode(&b64).map_err(|_| {
                ProtocolError::new(ErrorKind::InvalidPairingSecret, "stored secret is not base64")
            })?;
            return PairingSecret::from_slice(&bytes).map(Some);
        }
        Ok(self.cache.lock().as_ref().map(|keys| keys.pairing_secret.clone()))
    }

    /// Returns `hex(sha256(ed_pub))`.
    #[must_use]
    pub fn fingerprint(ed_pub: &[u8; ED25519_PUBLIC_KEY_SIZE]) -> String {
        hex::encode(sha256(ed_pub))
    }

    /// Wipes the identity and mints a fresh one.
    ///
    /// The five identity fields are overwritten with empty values (failed
    /// overwrites are tolerated: the empty-vs-absent distinction does not
    /// matter to the loader), the memory cache is cleared, and a new
    /// identity is generated. Sessions and the peer record are torn down by
    /// the caller, which owns the ordering.
    pub async fn reset(&self) -> Result<IdentityPublic> {
        for key in [KEY_ED25519, KEY_X25519, KEY_CREATED_AT, KEY_PAIRING_SECRET] {
            if let Err(e) = self.kv.put(key, "").await {
                warn!(key, error = %e, "reset: identity field not overwritten");
            }
        }
        *self.cache.lock() = None;

        info!("Host identity reset");
        self.get_or_create().await
    }

    /// Returns the signing key pair, trying the vault first and the memory
    /// cache second.
    ///
    /// # Errors
    /// `IdentityKeysUnavailable` when the vault is locked and no identity
    /// was generated in this process.
    pub(crate) async fn signing_keypair(&self) -> Result<IdentityKeyPair> {
        if let Some(b64) = self.read_key(KEY_ED25519).await {
            if let Ok(bytes) = b64_decode(&b64) {
                if let Ok(keypair) = IdentityKeyPair::from_blob(&bytes) {
                    return Ok(keypair);
                }
            }
            warn!("persisted ed25519 identity blob is invalid");
        }

        if let Some(keys) = self.cache.lock().as_ref() {
            return Ok(keys.signing.clone());
        }

        Err(ErrorKind::IdentityKeysUnavailable.into())
    }

    /// The in-memory identity, if one was generated in this process.
    #[cfg(test)]
    pub(crate) fn mem_identity(&self) -> Option<IdentityPublic> {
        self.cache.lock().as_ref().map(IdentityKeys::public)
    }

    // ========================================
    // Persistence helpers
    // ========================================

    /// Reads a key, downgrading KV errors and empty values to `None`.
    async fn read_key(&self, key: &str) -> Option<String> {
        match self.kv.get(key).await {
            Ok(value) => value.non_empty(),
            Err(e) => {
                debug!(key, error = %e, "kv read unavailable");
                None
            }
        }
    }

    /// Loads the full identity from the vault; any missing or undecodable
    /// field makes the whole identity count as absent.
    async fn load_persisted(&self) -> Option<IdentityKeys> {
        let ed_b64 = self.read_key(KEY_ED25519).await?;
        let x_b64 = self.read_key(KEY_X25519).await?;
        let created_at = self.read_key(KEY_CREATED_AT).await?;
        let secret_b64 = self.read_key(KEY_PAIRING_SECRET).await?;

        let signing = IdentityKeyPair::from_blob(&b64_decode(&ed_b64).ok()?).ok()?;
        let exchange = ExchangeKeyPair::from_blob(&b64_decode(&x_b64).ok()?).ok()?;
        let pairing_secret = PairingSecret::from_slice(&b64_decode(&secret_b64).ok()?).ok()?;

        Some(IdentityKeys {
            signing,
            exchange,
            created_at,
            pairing_secret,
        })
    }

    /// Writes all identity fields. Each write is independent; failures are
    /// logged and swallowed so a locked vault degrades to memory-only.
    async fn persist(&self, keys: &IdentityKeys) {
        let fields = [
            (KEY_ED25519, b64_encode(keys.signing.to_blob())),
            (KEY_X25519, b64_encode(keys.exchange.to_blob())),
            (KEY_CREATED_AT, keys.created_at.clone()),
            (KEY_PAIRING_SECRET, b64_encode(keys.pairing_secret.as_bytes())),
        ];
        for (key, value) in fields {
            if let Err(e) = self.kv.put(key, &value).await {
                warn!(key, error = %e, "identity field not persisted");
            }
        }
    }
}

impl std::fmt::Debug for IdentityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityStore")
            .field("cached", &self.cache.lock().is_some())
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{KvStore, KvValue, MemoryKv};

    fn store() -> (Arc<MemoryKv>, IdentityStore) {
        let kv = Arc::new(MemoryKv::new());
        let identity = IdentityStore::new(Arc::clone(&kv) as Arc<dyn KvStore>);
        (kv, identity)
    }

    #[tokio::test]
    async fn test_get_or_create_idempotent() {
        let (_kv, identity) = store();

        let first = identity.get_or_create().await.unwrap();
        let second = identity.get_or_create().await.unwrap();

        assert_eq!(first.ed_pub, second.ed_pub);
        assert_eq!(first.x_pub, second.x_pub);
        assert_eq!(first.created_at, second.created_at);
    }

    #[tokio::test]
    async fn test_identity_survives_reload() {
        let kv = Arc::new(MemoryKv::new());

        let first = IdentityStore::new(Arc::clone(&kv) as Arc<dyn KvStore>)
            .get_or_create()
            .await
            .unwrap();

        // A fresh store over the same vault sees the same identity
        let second = IdentityStore::new(Arc::clone(&kv) as Arc<dyn KvStore>)
            .get_or_create()
            .await
            .unwrap();

        assert_eq!(first.ed_pub, second.ed_pub);
        assert_eq!(first.x_pub, second.x_pub);
    }

    #[tokio::test]
    async fn test_locked_vault_falls_back_to_memory() {
        let (kv, identity) = store();
        kv.set_locked(true);

        let first = identity.get_or_create().await.unwrap();
        let second = identity.get_or_create().await.unwrap();
        assert_eq!(first.ed_pub, second.ed_pub);

        // Nothing reached the vault
        kv.set_locked(false);
        assert_eq!(
            kv.get(KEY_ED25519).await.unwrap(),
            KvValue::Missing
        );

        // The cached identity keeps serving after unlock
        let third = identity.get_or_create().await.unwrap();
        assert_eq!(first.ed_pub, third.ed_pub);
        assert!(identity.mem_identity().is_some());
    }

    #[tokio::test]
    async fn test_partial_state_triggers_regeneration() {
        let (kv, identity) = store();

        let first = identity.get_or_create().await.unwrap();

        // Corrupt one field; the loader must treat the identity as absent
        kv.put(KEY_X25519, "not base64").await.unwrap();
        *identity.cache.lock() = None;

        let second = identity.get_or_create().await.unwrap();
        assert_ne!(first.ed_pub, second.ed_pub);
    }

    #[tokio::test]
    async fn test_pairing_secret_generated_with_identity() {
        let (_kv, identity) = store();

        let secret1 = identity.pairing_secret().await.unwrap();
        let secret2 = identity.pairing_secret().await.unwrap();
        assert_eq!(secret1.as_bytes(), secret2.as_bytes());
    }

    #[tokio::test]
    async fn test_pairing_secret_rejects_bad_length() {
        let (kv, identity) = store();
        identity.get_or_create().await.unwrap();

        kv.put(KEY_PAIRING_SECRET, &b64_encode([0u8; 16])).await.unwrap();

        let err = identity.pairing_secret().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidPairingSecret);
    }

    #[tokio::test]
    async fn test_signing_keypair_prefers_vault_then_memory() {
        let (kv, identity) = store();

        // No identity anywhere
        let err = identity.signing_keypair().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::IdentityKeysUnavailable);

        kv.set_locked(true);
        let public = identity.get_or_create().await.unwrap();

        // Vault locked: the memory fallback serves the signing key
        let keypair = identity.signing_keypair().await.unwrap();
        assert_eq!(keypair.public_key_bytes(), public.ed_pub);
    }

    #[tokio::test]
    async fn test_reset_rotates_identity() {
        let (_kv, identity) = store();

        let old = identity.get_or_create().await.unwrap();
        let new = identity.reset().await.unwrap();

        assert_ne!(old.ed_pub, new.ed_pub);
        assert_ne!(old.x_pub, new.x_pub);

        // The new identity is stable
        let again = identity.get_or_create().await.unwrap();
        assert_eq!(new.ed_pub, again.ed_pub);
    }

    #[tokio::test]
    async fn test_fingerprint_format() {
        let (_kv, identity) = store();
        let public = identity.get_or_create().await.unwrap();

        let fingerprint = public.fingerprint();
        assert_eq!(fingerprint.len(), 64);
        assert!(fingerprint.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(fingerprint, IdentityStore::fingerprint(&public.ed_pub));
    }
}
