// ============================================
// File: crates/pearpass-core/src/session/mod.rs
// ============================================
//! # Session Store
//!
//! ## Creation Reason
//! Holds the in-memory table of live sessions between the host and the
//! extension: symmetric key, handshake transcript, replay counters, and the
//! peer-verified flag.
//!
//! ## Main Functionality
//! - `Session`: per-connection channel state
//! - `SessionStore`: create / get / close / clear-all over a concurrent map
//!
//! ## Session Lifecycle
//! ```text
//! ┌──────────┐  begin_handshake   ┌─────────────┐  finish_handshake
//! │  (none)  │ ─────────────────► │  unverified │ ──────────────────┐
//! └──────────┘                    └──────┬──────┘                   ▼
//!                                        │                   ┌──────────┐
//!                      close / clear_all │                   │ verified │
//!                      / process exit    │                   └────┬─────┘
//!                                        ▼                        │
//!                                  ┌──────────┐ ◄─────────────────┘
//!                                  │ dropped  │
//!                                  └──────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Sessions are memory-only; loss on restart is expected and consumers
//!   must tolerate `SessionNotFound` at any time
//! - Counters are atomic; the map lock is never held across I/O
//! - The session key zeroizes when the session drops
//!
//! ## Last Modified
//! v0.1.0 - Initial session store

pub mod manager;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};

use pearpass_common::types::SessionId;

use crate::crypto::keys::SessionKey;
use crate::error::{ErrorKind, ProtocolError, Result};

// ============================================
// Session
// ============================================

/// One live channel between the host and the extension.
pub struct Session {
    id: SessionId,
    key: SessionKey,
    /// `host_eph_pub ‖ ext_eph_pub ‖ peer_ed_pub`, recorded at handshake.
    transcript: Vec<u8>,
    send_seq: AtomicU64,
    last_recv_seq: AtomicU64,
    peer_verified: AtomicBool,
}

impl Session {
    fn new(id: SessionId, key: SessionKey, transcript: Vec<u8>) -> Self {
        Self {
            id,
            key,
            transcript,
            send_seq: AtomicU64::new(0),
            last_recv_seq: AtomicU64::new(0),
            peer_verified: AtomicBool::new(false),
        }
    }

    /// Returns the session id.
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Returns the symmetric channel key.
    #[must_use]
    pub(crate) fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Returns the recorded handshake transcript.
    #[must_use]
    pub fn transcript(&self) -> &[u8] {
        &self.transcript
    }

    /// Allocates the next outbound sequence number (first frame is 1).
    #[must_use]
    pub fn next_send_seq(&self) -> u64 {
        self.send_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Enforces strictly monotonic inbound sequence numbers.
    ///
    /// # Errors
    /// `ReplayDetected` if `seq` does not advance past the last accepted
    /// value. The session stays live: a replayed frame is dropped, not a
    /// reason to tear down the channel.
    pub fn record_incoming_seq(&self, seq: u64) -> Result<()> {
        let current = self.last_recv_seq.load(Ordering::SeqCst);
        if seq > current {
            self.last_recv_seq.store(seq, Ordering::SeqCst);
            Ok(())
        } else {
            Err(ProtocolError::new(
                ErrorKind::ReplayDetected,
                format!("seq {seq} not greater than {current}"),
            ))
        }
    }

    /// Returns `true` once the peer's finish signature has verified.
    #[must_use]
    pub fn is_peer_verified(&self) -> bool {
        self.peer_verified.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_peer_verified(&self) {
        self.peer_verified.store(true, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("peer_verified", &self.is_peer_verified())
            .field("send_seq", &self.send_seq.load(Ordering::SeqCst))
            .field("last_recv_seq", &self.last_recv_seq.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

// ============================================
// SessionStore
// ============================================

/// In-memory table of live sessions keyed by session id.
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<SessionId, Arc<Session>>,
}

impl SessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new session and returns its freshly minted id.
    pub fn create(&self, key: SessionKey, transcript: Vec<u8>) -> SessionId {
        let id = SessionId::generate();
        let session = Arc::new(Session::new(id.clone(), key, transcript));
        self.sessions.insert(id.clone(), session);

        info!(session_id = %id, "Session created");
        id
    }

    /// Looks up a session.
    #[must_use]
    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Looks up a session or fails with `SessionNotFound`.
    pub fn get_or_error(&self, id: &SessionId) -> Result<Arc<Session>> {
        self.get(id)
            .ok_or_else(|| ProtocolError::new(ErrorKind::SessionNotFound, format!("session {id}")))
    }

    /// Removes a session. Returns `true` if one was removed.
    pub fn close(&self, id: &SessionId) -> bool {
        let removed = self.sessions.remove(id).is_some();
        if removed {
            info!(session_id = %id, "Session closed");
        } else {
            debug!(session_id = %id, "close on unknown session");
        }
        removed
    }

    /// Removes every session, returning how many were dropped.
    pub fn clear_all(&self) -> usize {
        let count = self.sessions.len();
        self.sessions.clear();
        if count > 0 {
            info!(count, "All sessions cleared");
        }
        count
    }

    /// Number of live sessions.
    #[must_use]
    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` when no sessions are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("sessions", &self.count())
            .finish()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_session(store: &SessionStore) -> SessionId {
        store.create(SessionKey::from_bytes([0x42; 32]), vec![0u8; 96])
    }

    #[test]
    fn test_create_and_get() {
        let store = SessionStore::new();
        let id = test_session(&store);

        assert_eq!(store.count(), 1);
        let session = store.get(&id).unwrap();
        assert_eq!(session.id(), &id);
        assert_eq!(session.transcript().len(), 96);
        assert!(!session.is_peer_verified());
    }

    #[test]
    fn test_get_or_error() {
        let store = SessionStore::new();
        let missing = SessionId::generate();

        let err = store.get_or_error(&missing).unwrap_err();
        assert_eq!(err.kind, ErrorKind::SessionNotFound);
    }

    #[test]
    fn test_close() {
        let store = SessionStore::new();
        let id = test_session(&store);

        assert!(store.close(&id));
        assert!(!store.close(&id));
        assert!(store.get(&id).is_none());
    }

    #[test]
    fn test_clear_all() {
        let store = SessionStore::new();
        test_session(&store);
        test_session(&store);
        test_session(&store);

        assert_eq!(store.clear_all(), 3);
        assert!(store.is_empty());
        assert_eq!(store.clear_all(), 0);
    }

    #[test]
    fn test_send_seq_starts_at_one() {
        let store = SessionStore::new();
        let id = test_session(&store);
        let session = store.get(&id).unwrap();

        assert_eq!(session.next_send_seq(), 1);
        assert_eq!(session.next_send_seq(), 2);
        assert_eq!(session.next_send_seq(), 3);
    }

    #[test]
    fn test_incoming_seq_strictly_monotonic() {
        let store = SessionStore::new();
        let id = test_session(&store);
        let session = store.get(&id).unwrap();

        assert!(session.record_incoming_seq(1).is_ok());
        assert!(session.record_incoming_seq(5).is_ok());

        // Equal and lower values are replays
        let err = session.record_incoming_seq(5).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ReplayDetected);
        assert!(session.record_incoming_seq(2).is_err());
        assert!(session.record_incoming_seq(6).is_ok());

        // Zero can never be accepted (counters start at 0)
        let fresh_id = test_session(&store);
        let fresh = store.get(&fresh_id).unwrap();
        assert!(fresh.record_incoming_seq(0).is_err());
    }

    #[test]
    fn test_session_ids_unique() {
        let store = SessionStore::new();
        let a = test_session(&store);
        let b = test_session(&store);
        assert_ne!(a, b);
    }
}
