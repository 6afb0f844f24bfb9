// ============================================
// File: crates/pearpass-core/src/core.rs
// ============================================
//! # Core Aggregate
//!
//! The channel core as one owned object: identity store, pairing manager,
//! session store, and session manager wired together over a KV backend and
//! the unprotected cache. The host process constructs exactly one `Core` at
//! startup and hands it to the RPC dispatcher; tests build isolated cores
//! over in-memory backends.
//!
//! ## Last Modified
//! v0.1.0 - Initial aggregate

use std::sync::Arc;

use tracing::info;

use crate::error::Result;
use crate::identity::{IdentityPublic, IdentityStore};
use crate::kv::{KvStore, PlainCache};
use crate::pairing::PairingManager;
use crate::session::manager::SessionManager;
use crate::session::SessionStore;

// ============================================
// ResetOutcome
// ============================================

/// Result of a pairing reset.
#[derive(Debug, Clone)]
pub struct ResetOutcome {
    /// How many live sessions were torn down.
    pub cleared_sessions: usize,
    /// The freshly minted identity.
    pub identity: IdentityPublic,
}

// ============================================
// Core
// ============================================

/// The secure-channel core owned by the host process.
pub struct Core {
    identity: Arc<IdentityStore>,
    pairing: Arc<PairingManager>,
    sessions: Arc<SessionStore>,
    manager: SessionManager,
}

impl Core {
    /// Wires up a core over the given storage backends.
    #[must_use]
    pub fn new(kv: Arc<dyn KvStore>, plain: Arc<dyn PlainCache>) -> Self {
        let identity = Arc::new(IdentityStore::new(Arc::clone(&kv)));
        let pairing = Arc::new(PairingManager::new(
            kv,
            plain,
            Arc::clone(&identity),
        ));
        let sessions = Arc::new(SessionStore::new());
        let manager = SessionManager::new(
            Arc::clone(&identity),
            Arc::clone(&pairing),
            Arc::clone(&sessions),
        );

        Self {
            identity,
            pairing,
            sessions,
            manager,
        }
    }

    /// The identity store.
    #[must_use]
    pub fn identity(&self) -> &IdentityStore {
        &self.identity
    }

    /// The pairing manager.
    #[must_use]
    pub fn pairing(&self) -> &PairingManager {
        &self.pairing
    }

    /// The session store.
    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// The session manager.
    #[must_use]
    pub fn session_manager(&self) -> &SessionManager {
        &self.manager
    }

    /// Tears down the pairing: closes every session, forgets the peer, and
    /// rotates the host identity.
    ///
    /// Ordering matters: sessions anchored to the old identity die first,
    /// then the peer record and unprotected cache are wiped, then a fresh
    /// identity is minted.
    pub async fn reset_pairing(&self) -> Result<ResetOutcome> {
        let cleared_sessions = self.sessions.clear_all();
        self.pairing.reset().await;
        let identity = self.identity.reset().await?;

        info!(cleared_sessions, "Pairing reset complete");

        Ok(ResetOutcome {
            cleared_sessions,
            identity,
        })
    }
}

impl std::fmt::Debug for Core {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Core")
            .field("sessions", &self.sessions.count())
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

    use pearpass_common::encoding::b64_encode;

    fn core() -> Core {
        Core::new(
            Arc::new(MemoryKv::new()),
            Arc::new(MemoryCache::new()),
        )
    }

    #[tokio::test]
    async fn test_reset_wipes_everything() {
        let core = core();

        let old = core.identity().get_or_create().await.unwrap();
        let peer = b64_encode([0x33u8; 32]);
        core.pairing().pin_peer(&peer).await.unwrap();
        core.pairing().confirm_peer(&peer).await.unwrap();

        // A couple of live sessions
        use crate::crypto::keys::SessionKey;
        core.sessions().create(SessionKey::from_bytes([1; 32]), vec![0; 96]);
        core.sessions().create(SessionKey::from_bytes([2; 32]), vec![0; 96]);

        let outcome = core.reset_pairing().await.unwrap();

        assert_eq!(outcome.cleared_sessions, 2);
        assert_eq!(core.sessions().count(), 0);
        assert_ne!(outcome.identity.ed_pub, old.ed_pub);
        assert_eq!(core.pairing().peer_public_key().await.unwrap(), None);
        assert!(!core.pairing().is_paired(&peer).await);
    }

    #[tokio::test]
    async fn test_reset_on_fresh_core() {
        let core = core();
        let outcome = core.reset_pairing().await.unwrap();
        assert_eq!(outcome.cleared_sessions, 0);
    }
}
