// ============================================
// File: crates/pearpass-core/src/kv.rs
// ============================================
//! # Encrypted Key-Value Store Contract
//!
//! ## Creation Reason
//! The vault subsystem owns the encrypted key-value store; the channel core
//! only consumes it. This module pins down the contract the core relies on,
//! normalises the loose value shapes the vault produces, and provides
//! in-memory reference backends for tests and pre-vault hosts.
//!
//! ## Main Functionality
//! - `KvStore`: async contract (`status` / `init` / `get` / `put`)
//! - `PlainCache`: the unprotected single-slot cache readable while locked
//! - `KvValue`: `Missing | Present` normalisation of vault responses
//! - `MemoryKv` / `MemoryCache`: lockable in-memory backends
//!
//! ## ⚠️ Important Note for Next Developer
//! - A locked vault surfaces as `KvError::Locked`; the identity and pairing
//!   stores downgrade that to "not persisted" and keep working from memory
//! - The plain cache is NOT encrypted: only the confirmed peer's public key
//!   may ever be written to it
//!
//! ## Last Modified
//! v0.1.0 - Initial KV contract

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;

// ============================================
// Storage Keys
// ============================================

/// Ed25519 identity blob: base64 of `ed_pub(32) ‖ ed_sk(64)`.
pub const KEY_ED25519: &str = "id.ed25519";
/// X25519 identity blob: base64 of `x_pub(32) ‖ x_sk(32)`.
pub const KEY_X25519: &str = "id.x25519";
/// ISO-8601 identity creation timestamp.
pub const KEY_CREATED_AT: &str = "id.createdAt";
/// Base64 of the 32-byte pairing secret.
pub const KEY_PAIRING_SECRET: &str = "id.pairingSecret";
/// JSON peer record: `{"publicKey": "<b64>", "pairingState": "..."}`.
pub const KEY_PEER_DATA: &str = "peer.data";

// ============================================
// KvError
// ============================================

/// Errors a KV backend may report.
#[derive(Error, Debug, Clone)]
pub enum KvError {
    /// The vault is locked; no reads or writes are possible right now.
    #[error("key-value store is locked")]
    Locked,

    /// The backend failed for another reason.
    #[error("key-value store backend error: {0}")]
    Backend(String),
}

/// Result alias for KV operations.
pub type KvResult<T> = std::result::Result<T, KvError>;

// ============================================
// KvValue
// ============================================

/// A normalised KV read result.
///
/// The vault's `get` historically returns `string`, `{data: string|null}`,
/// or `null`; everything folds into this two-state shape at the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvValue {
    /// No value stored under the key.
    Missing,
    /// A value is present (possibly the empty string).
    Present(String),
}

impl KvValue {
    /// Folds a raw vault JSON response into a `KvValue`.
    #[must_use]
    pub fn from_json(raw: Option<&serde_json::Value>) -> Self {
        match raw {
            None | Some(serde_json::Value::Null) => Self::Missing,
            Some(serde_json::Value::String(s)) => Self::Present(s.clone()),
            Some(serde_json::Value::Object(obj)) => match obj.get("data") {
                Some(serde_json::Value::String(s)) => Self::Present(s.clone()),
                _ => Self::Missing,
            },
            Some(_) => Self::Missing,
        }
    }

    /// Returns the value if present and non-empty.
    ///
    /// Reset overwrites keys with empty strings, so loaders treat the empty
    /// string as absent.
    #[must_use]
    pub fn non_empty(self) -> Option<String> {
        match self {
            Self::Present(s) if !s.is_empty() => Some(s),
            _ => None,
        }
    }
}

/// Initialisation status of the KV store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KvStatus {
    /// Whether the store has been initialised.
    pub initialized: bool,
}

// ============================================
// KvStore Trait
// ============================================

/// Contract the channel core requires from the vault's encrypted store.
///
/// Backends may suspend on I/O; implementations must be safe to call from
/// the host's async runtime.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Reports whether the store has been initialised.
    async fn status(&self) -> KvResult<KvStatus>;

    /// Initialises the store. Idempotent: "already initialised" is success.
    async fn init(&self) -> KvResult<()>;

    /// Reads a value.
    async fn get(&self, key: &str) -> KvResult<KvValue>;

    /// Writes a value.
    async fn put(&self, key: &str, value: &str) -> KvResult<()>;
}

// ============================================
// PlainCache Trait
// ============================================

/// The unprotected single-slot cache, addressable while the vault is locked.
///
/// Holds only the **confirmed** peer's Ed25519 public key (base64). Used by
/// pairing-status queries that must answer without unlocking the vault.
#[async_trait]
pub trait PlainCache: Send + Sync {
    /// Reads the slot.
    async fn get(&self) -> Option<String>;

    /// Overwrites the slot.
    async fn put(&self, value: String);

    /// Empties the slot.
    async fn clear(&self);
}

// ============================================
// MemoryKv
// ============================================

/// In-memory KV backend with a lock switch.
///
/// Used by tests to simulate the vault in both locked and unlocked states,
/// and by hosts before a real vault is attached.
#[derive(Default)]
pub struct MemoryKv {
    inner: Mutex<MemoryKvInner>,
}

#[derive(Default)]
struct MemoryKvInner {
    entries: HashMap<String, String>,
    initialized: bool,
    locked: bool,
}

impl MemoryKv {
    /// Creates an empty, unlocked store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips the simulated vault lock.
    pub fn set_locked(&self, locked: bool) {
        self.inner.lock().locked = locked;
    }

    /// Returns the number of stored entries (test helper).
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Returns `true` when no entries are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn status(&self) -> KvResult<KvStatus> {
        let inner = self.inner.lock();
        Ok(KvStatus {
            initialized: inner.initialized && !inner.locked,
        })
    }

    async fn init(&self) -> KvResult<()> {
        let mut inner = self.inner.lock();
        if inner.locked {
            return Err(KvError::Locked);
        }
        // Re-initialisation is not an error
        inner.initialized = true;
        Ok(())
    }

    async fn get(&self, key: &str) -> KvResult<KvValue> {
        let inner = self.inner.lock();
        if inner.locked {
            return Err(KvError::Locked);
        }
        Ok(match inner.entries.get(key) {
            Some(value) => KvValue::Present(value.clone()),
            None => KvValue::Missing,
        })
    }

    async fn put(&self, key: &str, value: &str) -> KvResult<()> {
        let mut inner = self.inner.lock();
        if inner.locked {
            return Err(KvError::Locked);
        }
        inner.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ============================================
// MemoryCache
// ============================================

/// In-memory implementation of the unprotected cache.
#[derive(Default)]
pub struct MemoryCache {
    slot: Mutex<Option<String>>,
}

impl MemoryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlainCache for MemoryCache {
    async fn get(&self) -> Option<String> {
        self.slot.lock().clone()
    }

    async fn put(&self, value: String) {
        *self.slot.lock() = Some(value);
    }

    async fn clear(&self) {
        *self.slot.lock() = None;
    }
}

// ============================================
// Tests
// ============================================
