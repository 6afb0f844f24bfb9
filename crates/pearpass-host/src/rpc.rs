// ============================================
// File: crates/pearpass-host/src/rpc.rs
// ============================================
//! # RPC Dispatcher
//!
//! ## Creation Reason
//! The native-messaging loop hands this dispatcher one JSON request at a
//! time; it validates parameters, enforces the native-messaging enable
//! gate, and maps the named operations onto the channel core.
//!
//! ## Request Surface
//! ```text
//! ┌────────────────────┬───────────────────────────┬─────────────────────┐
//! │ request            │ params                    │ response            │
//! ├────────────────────┼───────────────────────────┼─────────────────────┤
//! │ getAppIdentity     │ pairingToken, peerEdPubB64│ edPub/xPub/fp       │
//! │ beginHandshake     │ extEphPubB64              │ eph/sig/sessionId   │
//! │ finishHandshake    │ sessionId, clientSigB64   │ {ok}                │
//! │ closeSession       │ sessionId                 │ {ok}                │
//! │ checkPairingStatus │ peerEdPubB64              │ {paired}            │
//! │ resetPairing       │ -                         │ {ok, cleared, id}   │
//! └────────────────────┴───────────────────────────┴─────────────────────┘
//! ```
//! Errors serialise flat as `{code, message}`.
//!
//! ## Access Policy
//! Every request requires the user-controlled native-messaging flag, except
//! `getAppIdentity`: that one is the pairing bootstrap and is gated by the
//! user-typed pairing token instead.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Parameter validation happens here, before any business logic runs
//! - This layer is stateless apart from the enable flag; all channel state
//!   lives in the core
//!
//! ## Last Modified
//! v0.1.0 - Initial dispatcher

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};

use pearpass_common::encoding::b64_encode;
use pearpass_common::types::SessionId;
use pearpass_core::error::{ErrorKind, ProtocolError, Result};
use pearpass_core::identity::IdentityPublic;
use pearpass_core::Core;

// ============================================
// RpcDispatcher
// ============================================

/// Maps named native-messaging requests onto the channel core.
pub struct RpcDispatcher {
    core: Arc<Core>,
    messaging_enabled: AtomicBool,
}

impl RpcDispatcher {
    /// Creates a dispatcher over a core with the given enable-flag state.
    #[must_use]
    pub fn new(core: Arc<Core>, messaging_enabled: bool) -> Self {
        Self {
            core,
            messaging_enabled: AtomicBool::new(messaging_enabled),
        }
    }

    /// Flips the user-controlled native-messaging flag.
    pub fn set_messaging_enabled(&self, enabled: bool) {
        self.messaging_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Current state of the enable flag.
    #[must_use]
    pub fn messaging_enabled(&self) -> bool {
        self.messaging_enabled.load(Ordering::SeqCst)
    }

    /// Handles one request message, folding failures into `{code, message}`
    /// objects.
    pub async fn handle(&self, message: &Value) -> Value {
        let Some(request) = message.get("request").and_then(Value::as_str) else {
            return json!({
                "code": "UnknownRequest",
                "message": "request name is required",
            });
        };

        match self.dispatch(request, message).await {
            Ok(response) => response,
            Err(err) => {
                if err.is_suspicious() {
                    warn!(request, code = err.code(), "request rejected");
                } else {
                    debug!(request, code = err.code(), "request failed");
                }
                json!({ "code": err.code(), "message": err.detail })
            }
        }
    }

    async fn dispatch(&self, request: &str, params: &Value) -> Result<Value> {
        // getAppIdentity is the pairing bootstrap: it is gated by the
        // pairing token rather than the enable flag
        if !self.messaging_enabled() && request != "getAppIdentity" {
            return Err(ErrorKind::NativeMessagingDisabled.into());
        }

        match request {
            "getAppIdentity" => self.get_app_identity(params).await,
            "beginHandshake" => self.begin_handshake(params).await,
            "finishHandshake" => self.finish_handshake(params).await,
            "closeSession" => self.close_session(params),
            "checkPairingStatus" => self.check_pairing_status(params).await,
            "resetPairing" => self.reset_pairing(params).await,
            other => Ok(json!({
                "code": "UnknownRequest",
                "message": format!("unknown request '{other}'"),
            })),
        }
    }

    // ========================================
    // Operations
    // ========================================

    async fn get_app_identity(&self, params: &Value) -> Result<Value> {
        let token = require_str(params, "pairingToken", ErrorKind::PairingTokenRequired)?;
        let peer = require_str(params, "peerEdPubB64", ErrorKind::PeerPublicKeyRequired)?;

        if !self.core.pairing().verify_pairing_code(token).await? {
            return Err(ErrorKind::InvalidPairingToken.into());
        }

        self.core.pairing().pin_peer(peer).await?;

        let identity = self.core.identity().get_or_create().await?;
        Ok(identity_json(&identity))
    }

    async fn begin_handshake(&self, params: &Value) -> Result<Value> {
        let ext_eph = require_str(params, "extEphPubB64", ErrorKind::MissingEphemeralPublicKey)?;

        let reply = self.core.session_manager().begin_handshake(ext_eph).await?;
        Ok(json!({
            "hostEphPubB64": reply.host_eph_pub_b64,
            "signatureB64": reply.signature_b64,
            "sessionId": reply.session_id.to_string(),
        }))
    }

    async fn finish_handshake(&self, params: &Value) -> Result<Value> {
        let session_id = require_session_id(params)?;
        let client_sig = require_str(params, "clientSigB64", ErrorKind::MissingClientSignature)?;

        self.core
            .session_manager()
            .finish_handshake(&session_id, client_sig)
            .await?;
        Ok(json!({ "ok": true }))
    }

    fn close_session(&self, params: &Value) -> Result<Value> {
        let session_id = require_session_id(params)?;

        // Idempotent: closing an already-gone session is still success
        self.core.session_manager().close_session(&session_id);
        Ok(json!({ "ok": true }))
    }

    async fn check_pairing_status(&self, params: &Value) -> Result<Value> {
        let peer = require_str(params, "peerEdPubB64", ErrorKind::PeerPublicKeyRequired)?;

        let paired = self.core.pairing().is_paired(peer).await;
        Ok(json!({ "paired": paired }))
    }

    async fn reset_pairing(&self, _params: &Value) -> Result<Value> {
        let outcome = self.core.reset_pairing().await?;
        Ok(json!({
            "ok": true,
            "clearedSessions": outcome.cleared_sessions,
            "newIdentity": identity_json(&outcome.identity),
        }))
    }
}

impl std::fmt::Debug for RpcDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcDispatcher")
            .field("messaging_enabled", &self.messaging_enabled())
            .finish_non_exhaustive()
    }
}

// ============================================
// Helpers
// ============================================

fn identity_json(identity: &IdentityPublic) -> Value {
    json!({
        "edPub": b64_encode(identity.ed_pub),
        "xPub": b64_encode(identity.x_pub),
        "fingerprint": identity.fingerprint(),
    })
}

/// Extracts a required non-empty string parameter.
fn require_str<'a>(params: &'a Value, field: &str, missing: ErrorKind) -> Result<&'a str> {
    match params.get(field).and_then(Value::as_str) {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(missing.into()),
    }
}

/// Extracts and parses the required session id.
///
/// A malformed id cannot name a live session, so it reports
/// `SessionNotFound` rather than a separate parse error.
fn require_session_id(params: &Value) -> Result<SessionId> {
    let raw = require_str(params, "sessionId", ErrorKind::MissingSessionId)?;
    raw.parse()
        .map_err(|_| ProtocolError::new(ErrorKind::SessionNotFound, "malformed session id"))
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use pearpass_core::kv::{MemoryCache, MemoryKv};

    fn dispatcher(enabled: bool) -> RpcDispatcher {
        let core = Arc::new(Core::new(
            Arc::new(MemoryKv::new()),
            Arc::new(MemoryCache::new()),
        ));
        RpcDispatcher::new(core, enabled)
    }

    #[tokio::test]
    async fn test_disabled_gate_blocks_everything_but_identity_read() {
        let rpc = dispatcher(false);

        for request in [
            "beginHandshake",
            "finishHandshake",
            "closeSession",
            "checkPairingStatus",
            "resetPairing",
        ] {
            let reply = rpc.handle(&json!({ "request": request })).await;
            assert_eq!(reply["code"], "NativeMessagingDisabled", "{request}");
        }

        // The pairing bootstrap answers (with its own token gate)
        let reply = rpc.handle(&json!({ "request": "getAppIdentity" })).await;
        assert_eq!(reply["code"], "PairingTokenRequired");
    }

    #[tokio::test]
    async fn test_missing_params_have_specific_codes() {
        let rpc = dispatcher(true);

        let reply = rpc
            .handle(&json!({ "request": "getAppIdentity", "pairingToken": "x" }))
            .await;
        assert_eq!(reply["code"], "PeerPublicKeyRequired");

        let reply = rpc.handle(&json!({ "request": "beginHandshake" })).await;
        assert_eq!(reply["code"], "MissingEphemeralPublicKey");

        let reply = rpc.handle(&json!({ "request": "finishHandshake" })).await;
        assert_eq!(reply["code"], "MissingSessionId");

        let reply = rpc
            .handle(&json!({ "request": "finishHandshake", "sessionId": "00000000000000000000000000000000" }))
            .await;
        assert_eq!(reply["code"], "MissingClientSignature");

        let reply = rpc.handle(&json!({ "request": "checkPairingStatus" })).await;
        assert_eq!(reply["code"], "PeerPublicKeyRequired");
    }

    #[tokio::test]
    async fn test_non_string_params_count_as_missing() {
        let rpc = dispatcher(true);

        let reply = rpc
            .handle(&json!({ "request": "beginHandshake", "extEphPubB64": 42 }))
            .await;
        assert_eq!(reply["code"], "MissingEphemeralPublicKey");
    }

    #[tokio::test]
    async fn test_unknown_request() {
        let rpc = dispatcher(true);

        let reply = rpc.handle(&json!({ "request": "launchMissiles" })).await;
        assert_eq!(reply["code"], "UnknownRequest");

        let reply = rpc.handle(&json!({ "not_a_request": 1 })).await;
        assert_eq!(reply["code"], "UnknownRequest");
    }

    #[tokio::test]
    async fn test_malformed_session_id_is_not_found() {
        let rpc = dispatcher(true);

        let reply = rpc
            .handle(&json!({
                "request": "closeSession",
                "sessionId": "not-hex",
            }))
            .await;
        assert_eq!(reply["code"], "SessionNotFound");
    }

    #[tokio::test]
    async fn test_close_session_idempotent() {
        let rpc = dispatcher(true);

        let reply = rpc
            .handle(&json!({
                "request": "closeSession",
                "sessionId": "00112233445566778899aabbccddeeff",
            }))
            .await;
        assert_eq!(reply["ok"], true);
    }

    #[tokio::test]
    async fn test_flag_can_flip_at_runtime() {
        let rpc = dispatcher(false);
        assert!(!rpc.messaging_enabled());

        rpc.set_messaging_enabled(true);
        let reply = rpc
            .handle(&json!({ "request": "checkPairingStatus", "peerEdPubB64": "AAAA" }))
            .await;
        assert_eq!(reply["paired"], false);
    }
}
