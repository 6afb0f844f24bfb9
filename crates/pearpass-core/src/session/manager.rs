// ============================================
// File: crates/pearpass-core/src/session/manager.rs
// ============================================
//! # Session Manager
//!
//! ## Creation Reason
//! Runs the session handshake between host and extension and drives the
//! encrypted data phase: ephemeral key exchange, transcript signatures in
//! both directions, sealed frames, and replay enforcement.
//!
//! ## Handshake Flow
//! ```text
//! Extension                                          Host
//!   │                                                  │
//!   │  ext_eph_pub (X25519) ─────────────────────────► │
//!   │                                                  │
//!   │                    pinned peer key required      │
//!   │                    fresh host ephemeral          │
//!   │                    shared = X25519(eph, ext_eph) │
//!   │                    transcript = H ‖ X ‖ E        │
//!   │                    sig = Ed25519(id_sk, transcript)
//!   │                                                  │
//!   │ ◄──────────────── host_eph_pub, sig, session_id  │
//!   │                                                  │
//!   │  verify sig against pinned host key              │
//!   │  client_sig = Ed25519(ext_sk,                    │
//!   │      "pearpass/client-finish/v1" ‖ sid ‖ transcript)
//!   │                                                  │
//!   │  client_sig ───────────────────────────────────► │
//!   │                                                  │
//!   │                    verify, mark peer verified    │
//!   │                                                  │
//!   │ ═══════════ sealed frames (seq-numbered) ══════  │
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Transcript byte order (`host_eph ‖ ext_eph ‖ peer_ed`) is protocol;
//!   both signatures cover it and the extension builds the same bytes
//! - The client-finish tag prevents cross-protocol signature reuse, and
//!   binding the session id prevents replaying a transcript onto another
//!   session
//! - The raw X25519 shared secret keys the channel; changing that (e.g. to
//!   a KDF) is a wire-compat decision owned jointly with the extension
//! - A handshake works against a `PENDING` peer: confirmation piggybacks on
//!   the first verified finish. Do not tighten this - it would break
//!   first-run pairing
//!
//! ## Last Modified
//! v0.1.0 - Initial session manager

use std::sync::Arc;

use tracing::{debug, info, warn};

use pearpass_common::encoding::{b64_decode, b64_decode_exact, b64_encode};
use pearpass_common::types::SessionId;

use crate::crypto::keys::{EphemeralKeyPair, SessionKey};
use crate::crypto::primitives::{ed_verify, random_array, secretbox_open, secretbox_seal};
use crate::crypto::{
    CLIENT_FINISH_TAG, ED25519_SIGNATURE_SIZE, SECRETBOX_NONCE_SIZE, TRANSCRIPT_SIZE,
    X25519_PUBLIC_KEY_SIZE,
};
use crate::error::{ErrorKind, ProtocolError, Result};
use crate::identity::IdentityStore;
use crate::pairing::PairingManager;
use crate::session::SessionStore;

// ============================================
// Reply Types
// ============================================

/// Host side of a completed `beginHandshake`.
#[derive(Debug, Clone)]
pub struct HandshakeReply {
    /// Host's ephemeral X25519 public key, base64.
    pub host_eph_pub_b64: String,
    /// Ed25519 signature over the transcript, base64.
    pub signature_b64: String,
    /// Freshly minted session id.
    pub session_id: SessionId,
}

/// An encrypted frame produced by [`SessionManager::seal`].
#[derive(Debug, Clone)]
pub struct SealedFrame {
    /// Random 24-byte nonce, base64.
    pub nonce_b64: String,
    /// Ciphertext with the Poly1305 tag inside, base64.
    pub ciphertext_b64: String,
    /// Outbound sequence number (first frame is 1).
    pub seq: u64,
}

// ============================================
// SessionManager
// ============================================

/// Runs handshakes and the encrypted data phase over the session store.
pub struct SessionManager {
    identity: Arc<IdentityStore>,
    pairing: Arc<PairingManager>,
    sessions: Arc<SessionStore>,
}

impl SessionManager {
    /// Creates a manager over the given components.
    #[must_use]
    pub fn new(
        identity: Arc<IdentityStore>,
        pairing: Arc<PairingManager>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            identity,
            pairing,
            sessions,
        }
    }

    // ========================================
    // Handshake
    // ========================================

    /// Begins a handshake against the extension's ephemeral public key.
    ///
    /// A pinned peer is required; `PENDING` is acceptable (see module docs).
    ///
    /// # Errors
    /// - `NotPaired` if no peer key is pinned
    /// - `IdentityKeysUnavailable` if the signing key is unreachable
    /// - `InvalidKeyLength` if the ephemeral key is malformed
    /// - `InvalidPeerPublicKey` if the exchange degenerates to all zeroes
    pub async fn begin_handshake(&self, ext_eph_pub_b64: &str) -> Result<HandshakeReply> {
        let peer_ed_pub = self
            .pairing
            .peer_public_key()
            .await?
            .ok_or_else(|| ProtocolError::from(ErrorKind::NotPaired))?;

        let ext_eph_pub: [u8; X25519_PUBLIC_KEY_SIZE] =
            b64_decode_exact(ext_eph_pub_b64).map_err(|_| {
                ProtocolError::new(
                    ErrorKind::InvalidKeyLength,
                    "extension ephemeral key is not a 32-byte key",
                )
            })?;

        let signing = self.identity.signing_keypair().await?;

        let ephemeral = EphemeralKeyPair::generate();
        let host_eph_pub = ephemeral.public_key_bytes();

        // Contributory-behaviour guard: a low-order extension key would
        // collapse the shared secret to zero
        let shared = ephemeral.exchange(&ext_eph_pub);
        if shared.iter().all(|&b| b == 0) {
            return Err(ProtocolError::new(
                ErrorKind::InvalidPeerPublicKey,
                "ephemeral exchange produced an all-zero secret",
            ));
        }

        let mut transcript = Vec::with_capacity(TRANSCRIPT_SIZE);
        transcript.extend_from_slice(&host_eph_pub);
        transcript.extend_from_slice(&ext_eph_pub);
        transcript.extend_from_slice(&peer_ed_pub);

        let signature = signing.sign(&transcript);

        let session_id = self
            .sessions
            .create(SessionKey::from_bytes(shared), transcript);

        debug!(session_id = %session_id, "Handshake begun");

        Ok(HandshakeReply {
            host_eph_pub_b64: b64_encode(host_eph_pub),
            signature_b64: b64_encode(signature),
            session_id,
        })
    }

    /// Verifies the extension's finish signature for a session.
    ///
    /// Idempotent: finishing an already-verified session succeeds without
    /// re-verification. Any failure on a live session closes it.
    ///
    /// # Errors
    /// - `SessionNotFound` if the session id names no live session
    /// - `PeerNotPaired` if the peer record disappeared
    /// - `InvalidClientSignature` if the signature is not 64 valid bytes
    /// - `InvalidTranscript` if the transcript is empty or no longer embeds
    ///   the pinned peer key
    /// - `PeerSignatureInvalid` if verification fails
    pub async fn finish_handshake(&self, session_id: &SessionId, client_sig_b64: &str) -> Result<()> {
        match self.verify_finish(session_id, client_sig_b64).await {
            Ok(()) => Ok(()),
            Err(err) => {
                if err.kind != ErrorKind::SessionNotFound {
                    self.sessions.close(session_id);
                }
                if err.is_suspicious() {
                    warn!(session_id = %session_id, code = err.code(), "handshake finish rejected");
                }
                Err(err)
            }
        }
    }

    async fn verify_finish(&self, session_id: &SessionId, client_sig_b64: &str) -> Result<()> {
        let session = self.sessions.get_or_error(session_id)?;

        if session.is_peer_verified() {
            return Ok(());
        }

        let peer_ed_pub = self
            .pairing
            .peer_public_key()
            .await?
            .ok_or_else(|| ProtocolError::from(ErrorKind::PeerNotPaired))?;

        let client_sig = b64_decode(client_sig_b64).map_err(|_| {
            ProtocolError::new(ErrorKind::InvalidClientSignature, "signature is not base64")
        })?;
        if client_sig.len() != ED25519_SIGNATURE_SIZE {
            return Err(ProtocolError::new(
                ErrorKind::InvalidClientSignature,
                format!("expected {ED25519_SIGNATURE_SIZE} bytes, got {}", client_sig.len()),
            ));
        }

        let transcript = session.transcript();
        if transcript.is_empty() {
            return Err(ProtocolError::new(
                ErrorKind::InvalidTranscript,
                "session has no recorded transcript",
            ));
        }
        // A session anchored to a previous peer must be refused
        if transcript.len() != TRANSCRIPT_SIZE
            || transcript[2 * X25519_PUBLIC_KEY_SIZE..] != peer_ed_pub
        {
            return Err(ProtocolError::new(
                ErrorKind::InvalidTranscript,
                "transcript does not embed the pinned peer key",
            ));
        }

        // Tag prevents cross-protocol reuse; the session id binds the
        // signature to exactly this session
        let sid = session_id.to_string();
        let mut client_transcript =
            Vec::with_capacity(CLIENT_FINISH_TAG.len() + sid.len() + transcript.len());
        client_transcript.extend_from_slice(CLIENT_FINISH_TAG);
        client_transcript.extend_from_slice(sid.as_bytes());
        client_transcript.extend_from_slice(transcript);

        let valid = ed_verify(&peer_ed_pub, &client_transcript, &client_sig).map_err(|e| {
            ProtocolError::new(ErrorKind::InvalidPeerPublicKey, e.detail)
        })?;
        if !valid {
            return Err(ErrorKind::PeerSignatureInvalid.into());
        }

        session.mark_peer_verified();
        info!(session_id = %session_id, "Peer verified");

        // First verified finish also confirms a PENDING pairing, which
        // exposes the peer key to locked-vault status checks
        if let Err(e) = self.pairing.confirm_peer(&b64_encode(peer_ed_pub)).await {
            warn!(code = e.code(), "peer confirmation after handshake failed");
        }

        Ok(())
    }

    // ========================================
    // Data phase
    // ========================================

    /// Seals a plaintext frame for a session.
    ///
    /// Uses a fresh random 24-byte nonce per call (safe at 192 bits) and
    /// allocates the next outbound sequence number.
    ///
    /// # Errors
    /// `SessionNotFound` if the session id names no live session.
    pub fn seal(&self, session_id: &SessionId, plaintext: &[u8]) -> Result<SealedFrame> {
        let session = self.sessions.get_or_error(session_id)?;

        let nonce: [u8; SECRETBOX_NONCE_SIZE] = random_array();
        let seq = session.next_send_seq();
        let ciphertext = secretbox_seal(session.key().as_bytes(), &nonce, plaintext)?;

        Ok(SealedFrame {
            nonce_b64: b64_encode(nonce),
            ciphertext_b64: b64_encode(ciphertext),
            seq,
        })
    }

    /// Opens a sealed frame and enforces replay protection.
    ///
    /// # Errors
    /// - `SessionNotFound` if the session id names no live session
    /// - `InvalidKeyLength` if the nonce is not 24 bytes
    /// - `DecryptFailed` on authentication failure; the session is closed
    /// - `ReplayDetected` if `seq` does not advance; the session stays live
    pub fn open(
        &self,
        session_id: &SessionId,
        nonce_b64: &str,
        ciphertext_b64: &str,
        seq: u64,
    ) -> Result<Vec<u8>> {
        let session = self.sessions.get_or_error(session_id)?;

        let nonce: [u8; SECRETBOX_NONCE_SIZE] = b64_decode_exact(nonce_b64).map_err(|_| {
            ProtocolError::new(ErrorKind::InvalidKeyLength, "nonce is not 24 bytes of base64")
        })?;

        let opened = b64_decode(ciphertext_b64)
            .map_err(|_| ProtocolError::new(ErrorKind::DecryptFailed, "ciphertext is not base64"))
            .and_then(|ciphertext| secretbox_open(session.key().as_bytes(), &nonce, &ciphertext));

        let plaintext = match opened {
            Ok(plaintext) => plaintext,
            Err(err) => {
                if err.closes_session() {
                    warn!(session_id = %session_id, "frame failed authentication; closing session");
                    self.sessions.close(session_id);
                }
                return Err(err);
            }
        };

        session.record_incoming_seq(seq)?;

        Ok(plaintext)
    }

    /// Records an inbound sequence number without decrypting.
    ///
    /// # Errors
    /// - `SessionNotFound` if the session id names no live session
    /// - `ReplayDetected` if `seq` does not advance
    pub fn record_incoming_seq(&self, session_id: &SessionId, seq: u64) -> Result<()> {
        let session = self.sessions.get_or_error(session_id)?;
        session.record_incoming_seq(seq)
    }

    /// Closes a session. Returns `true` if one was removed.
    pub fn close_session(&self, session_id: &SessionId) -> bool {
        self.sessions.close(session_id)
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
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
    use crate::crypto::keys::IdentityKeyPair;
    use crate::kv::{KvStore, MemoryCache, MemoryKv, PlainCache};
    use crate::pairing::PairingState;

    /// Everything a test needs, plus a simulated extension.
    struct Rig {
        kv: Arc<MemoryKv>,
        pairing: Arc<PairingManager>,
        sessions: Arc<SessionStore>,
        manager: SessionManager,
        ext_identity: IdentityKeyPair,
    }

    impl Rig {
        fn new() -> Self {
            let kv = Arc::new(MemoryKv::new());
            let plain = Arc::new(MemoryCache::new());
            let identity = Arc::new(IdentityStore::new(Arc::clone(&kv) as Arc<dyn KvStore>));
            let pairing = Arc::new(PairingManager::new(
                Arc::clone(&kv) as Arc<dyn KvStore>,
                Arc::clone(&plain) as Arc<dyn PlainCache>,
                Arc::clone(&identity),
            ));
            let sessions = Arc::new(SessionStore::new());
            let manager = SessionManager::new(
                Arc::clone(&identity),
                Arc::clone(&pairing),
                Arc::clone(&sessions),
            );
            Self {
                kv,
                pairing,
                sessions,
                manager,
                ext_identity: IdentityKeyPair::generate(),
            }
        }

        async fn pair(&self) {
            self.pairing
                .pin_peer(&b64_encode(self.ext_identity.public_key_bytes()))
                .await
                .unwrap();
        }

        /// Runs the extension side of the handshake: generate an ephemeral,
        /// begin, and sign the client-finish transcript.
        async fn handshake(&self) -> (SessionId, [u8; 32]) {
            let ext_eph = EphemeralKeyPair::generate();
            let ext_eph_pub = ext_eph.public_key_bytes();

            let reply = self
                .manager
                .begin_handshake(&b64_encode(ext_eph_pub))
                .await
                .unwrap();

            let host_eph_pub: [u8; 32] = b64_decode_exact(&reply.host_eph_pub_b64).unwrap();
            let shared = ext_eph.exchange(&host_eph_pub);

            let sig = self.client_finish_sig(&reply, &ext_eph_pub);
            self.manager
                .finish_handshake(&reply.session_id, &b64_encode(sig))
                .await
                .unwrap();

            (reply.session_id, shared)
        }

        fn client_finish_sig(&self, reply: &HandshakeReply, ext_eph_pub: &[u8; 32]) -> [u8; 64] {
            let host_eph_pub: [u8; 32] = b64_decode_exact(&reply.host_eph_pub_b64).unwrap();
            let mut transcript = Vec::new();
            transcript.extend_from_slice(&host_eph_pub);
            transcript.extend_from_slice(ext_eph_pub);
            transcript.extend_from_slice(&self.ext_identity.public_key_bytes());

            let mut message = Vec::new();
            message.extend_from_slice(CLIENT_FINISH_TAG);
            message.extend_from_slice(reply.session_id.to_string().as_bytes());
            message.extend_from_slice(&transcript);

            self.ext_identity.sign(&message)
        }
    }

    #[tokio::test]
    async fn test_begin_requires_pinned_peer() {
        let rig = Rig::new();
        let eph = EphemeralKeyPair::generate();

        let err = rig
            .manager
            .begin_handshake(&b64_encode(eph.public_key_bytes()))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotPaired);
    }

    #[tokio::test]
    async fn test_begin_signature_verifies_on_extension_side() {
        let rig = Rig::new();
        rig.pair().await;

        let ext_eph = EphemeralKeyPair::generate();
        let ext_eph_pub = ext_eph.public_key_bytes();
        let reply = rig
            .manager
            .begin_handshake(&b64_encode(ext_eph_pub))
            .await
            .unwrap();

        // The extension rebuilds the transcript and checks the host's
        // signature against the host identity it learned at pairing time
        let host_ed_pub = rig.manager.identity.get_or_create().await.unwrap().ed_pub;
        let host_eph_pub: [u8; 32] = b64_decode_exact(&reply.host_eph_pub_b64).unwrap();
        let signature: [u8; 64] = b64_decode_exact(&reply.signature_b64).unwrap();

        let mut transcript = Vec::new();
        transcript.extend_from_slice(&host_eph_pub);
        transcript.extend_from_slice(&ext_eph_pub);
        transcript.extend_from_slice(&rig.ext_identity.public_key_bytes());

        assert!(ed_verify(&host_ed_pub, &transcript, &signature).unwrap());

        // Any transcript byte flip invalidates it
        transcript[0] ^= 0x01;
        assert!(!ed_verify(&host_ed_pub, &transcript, &signature).unwrap());
    }

    #[tokio::test]
    async fn test_handshake_works_against_pending_peer() {
        let rig = Rig::new();
        rig.pair().await;
        assert_eq!(rig.pairing.peer_state().await, Some(PairingState::Pending));

        let (session_id, _) = rig.handshake().await;

        // Finish verified the peer and piggybacked confirmation
        let session = rig.sessions.get(&session_id).unwrap();
        assert!(session.is_peer_verified());
        assert_eq!(rig.pairing.peer_state().await, Some(PairingState::Confirmed));
    }

    #[tokio::test]
    async fn test_finish_is_idempotent() {
        let rig = Rig::new();
        rig.pair().await;
        let (session_id, _) = rig.handshake().await;

        // A second finish with garbage succeeds without re-verification
        rig.manager
            .finish_handshake(&session_id, &b64_encode([0u8; 64]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_bad_client_signature_closes_session() {
        let rig = Rig::new();
        rig.pair().await;

        let ext_eph = EphemeralKeyPair::generate();
        let reply = rig
            .manager
            .begin_handshake(&b64_encode(ext_eph.public_key_bytes()))
            .await
            .unwrap();

        let mut sig = rig.client_finish_sig(&reply, &ext_eph.public_key_bytes());
        sig[0] ^= 0xFF;

        let err = rig
            .manager
            .finish_handshake(&reply.session_id, &b64_encode(sig))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::PeerSignatureInvalid);

        // The session is gone
        assert!(rig.sessions.get(&reply.session_id).is_none());
    }

    #[tokio::test]
    async fn test_finish_rejects_malformed_signature() {
        let rig = Rig::new();
        rig.pair().await;

        let ext_eph = EphemeralKeyPair::generate();
        let reply = rig
            .manager
            .begin_handshake(&b64_encode(ext_eph.public_key_bytes()))
            .await
            .unwrap();

        let err = rig
            .manager
            .finish_handshake(&reply.session_id, &b64_encode([0u8; 16]))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidClientSignature);
    }

    #[tokio::test]
    async fn test_finish_unknown_session() {
        let rig = Rig::new();
        rig.pair().await;

        let err = rig
            .manager
            .finish_handshake(&SessionId::generate(), &b64_encode([0u8; 64]))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::SessionNotFound);
    }

    #[tokio::test]
    async fn test_seal_open_roundtrip() {
        let rig = Rig::new();
        rig.pair().await;
        let (session_id, _) = rig.handshake().await;

        let frame = rig.manager.seal(&session_id, b"hello").unwrap();
        assert_eq!(frame.seq, 1);

        let plaintext = rig
            .manager
            .open(&session_id, &frame.nonce_b64, &frame.ciphertext_b64, frame.seq)
            .unwrap();
        assert_eq!(plaintext, b"hello");
    }

    #[tokio::test]
    async fn test_extension_can_open_host_frames() {
        let rig = Rig::new();
        rig.pair().await;
        let (session_id, ext_shared) = rig.handshake().await;

        let frame = rig.manager.seal(&session_id, b"vault entry").unwrap();

        // The extension holds the same shared secret from its side of the
        // exchange
        let nonce: [u8; 24] = b64_decode_exact(&frame.nonce_b64).unwrap();
        let ciphertext = b64_decode(&frame.ciphertext_b64).unwrap();
        let plaintext = secretbox_open(&ext_shared, &nonce, &ciphertext).unwrap();
        assert_eq!(plaintext, b"vault entry");
    }

    #[tokio::test]
    async fn test_replay_rejected_session_stays_live() {
        let rig = Rig::new();
        rig.pair().await;
        let (session_id, _) = rig.handshake().await;

        // Frames arrive out of band with their own seq numbers
        rig.manager.record_incoming_seq(&session_id, 5).unwrap();

        let err = rig.manager.record_incoming_seq(&session_id, 5).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ReplayDetected);
        assert!(rig.manager.record_incoming_seq(&session_id, 4).is_err());

        // A fresh frame still goes through
        rig.manager.record_incoming_seq(&session_id, 6).unwrap();
        assert!(rig.sessions.get(&session_id).is_some());
    }

    #[tokio::test]
    async fn test_replayed_frame_via_open() {
        let rig = Rig::new();
        rig.pair().await;
        let (session_id, _) = rig.handshake().await;

        let frame = rig.manager.seal(&session_id, b"one").unwrap();
        rig.manager
            .open(&session_id, &frame.nonce_b64, &frame.ciphertext_b64, frame.seq)
            .unwrap();

        // Byte-identical replay
        let err = rig
            .manager
            .open(&session_id, &frame.nonce_b64, &frame.ciphertext_b64, frame.seq)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ReplayDetected);

        // The next frame is fine
        let frame2 = rig.manager.seal(&session_id, b"two").unwrap();
        rig.manager
            .open(&session_id, &frame2.nonce_b64, &frame2.ciphertext_b64, frame2.seq)
            .unwrap();
    }

    #[tokio::test]
    async fn test_tampered_frame_closes_session() {
        let rig = Rig::new();
        rig.pair().await;
        let (session_id, _) = rig.handshake().await;

        let frame = rig.manager.seal(&session_id, b"payload").unwrap();
        let mut ciphertext = b64_decode(&frame.ciphertext_b64).unwrap();
        ciphertext[0] ^= 0x01;

        let err = rig
            .manager
            .open(&session_id, &frame.nonce_b64, &b64_encode(ciphertext), frame.seq)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::DecryptFailed);
        assert!(rig.sessions.get(&session_id).is_none());
    }

    #[tokio::test]
    async fn test_locked_vault_first_run_handshake() {
        let rig = Rig::new();
        rig.kv.set_locked(true);

        // Identity is minted into memory only; pairing mirrors locally
        rig.manager.identity.get_or_create().await.unwrap();
        rig.pair().await;

        let (session_id, _) = rig.handshake().await;
        let frame = rig.manager.seal(&session_id, b"works while locked").unwrap();
        let plaintext = rig
            .manager
            .open(&session_id, &frame.nonce_b64, &frame.ciphertext_b64, frame.seq)
            .unwrap();
        assert_eq!(plaintext, b"works while locked");
    }
}
