// ============================================
// File: crates/pearpass-core/src/error.rs
// ============================================
//! # Protocol Error Taxonomy
//!
//! Every failure the channel can report travels as a stable `{code, message}`
//! object over the wire. `ErrorKind` is the closed set of codes the extension
//! is written against; `ProtocolError` pairs a kind with a human-readable
//! detail string. Codes are protocol: adding one is an extension-coordination
//! event, renaming one is a breaking change.
//!
//! ## Failure Policy
//! - Validation errors return without mutating any state
//! - `PeerSignatureInvalid` and `DecryptFailed` close the offending session
//!   but never touch identity or pairing state
//! - `ReplayDetected` rejects the frame and leaves the session live
//! - `IdentityKeysUnavailable` means "vault locked right now"; the caller
//!   should prompt for unlock and retry
//!
//! ## Last Modified
//! v0.1.0 - Initial taxonomy

use thiserror::Error;

/// Result type for core protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

// ============================================
// ErrorKind
// ============================================

/// Wire-stable error codes for the secure channel.
///
/// The `code()` string of each variant is what the extension sees; the
/// variant set is closed and versioned with the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // ========================================
    // Request validation
    // ========================================
    /// `getAppIdentity` called without a pairing token.
    PairingTokenRequired,
    /// A request that needs the peer's public key was missing it.
    PeerPublicKeyRequired,
    /// `beginHandshake` called without the extension's ephemeral key.
    MissingEphemeralPublicKey,
    /// A session-scoped request was missing its session id.
    MissingSessionId,
    /// `finishHandshake` called without the client signature.
    MissingClientSignature,

    // ========================================
    // Pairing
    // ========================================
    /// The user-typed pairing token did not match the expected code.
    InvalidPairingToken,
    /// A persisted pairing secret had the wrong length.
    InvalidPairingSecret,
    /// A different peer key is already pinned.
    PeerAlreadyPaired,
    /// No peer is pinned; pairing must happen first.
    NotPaired,
    /// Handshake verification found no pinned peer.
    PeerNotPaired,
    /// `confirmPeer` called with no pending record.
    NoPendingPairing,
    /// `confirmPeer` called with a key that differs from the pinned one.
    PeerKeyMismatch,

    // ========================================
    // Session & handshake
    // ========================================
    /// The session id does not name a live session.
    SessionNotFound,
    /// The pinned peer key could not be decoded as a 32-byte Ed25519 key.
    InvalidPeerPublicKey,
    /// The client signature was not 64 bytes of valid base64.
    InvalidClientSignature,
    /// The recorded handshake transcript is empty or inconsistent.
    InvalidTranscript,
    /// The peer's transcript signature failed verification.
    PeerSignatureInvalid,

    // ========================================
    // Data phase
    // ========================================
    /// Authenticated decryption failed (tampering or wrong key).
    DecryptFailed,
    /// A sequence number was not a usable non-negative integer.
    InvalidSeq,
    /// A frame's sequence number did not advance past the last one seen.
    ReplayDetected,

    // ========================================
    // Environment
    // ========================================
    /// Identity key material is unreachable (vault locked, no memory copy).
    IdentityKeysUnavailable,
    /// The user has not enabled native messaging.
    NativeMessagingDisabled,

    // ========================================
    // Crypto wrapper
    // ========================================
    /// A fixed-size key input had the wrong length.
    InvalidKeyLength,
    /// A signature input had the wrong length.
    InvalidSignatureLength,
}

impl ErrorKind {
    /// Returns the stable wire code for this kind.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::PairingTokenRequired => "PairingTokenRequired",
            Self::PeerPublicKeyRequired => "PeerPublicKeyRequired",
            Self::MissingEphemeralPublicKey => "MissingEphemeralPublicKey",
            Self::MissingSessionId => "MissingSessionId",
            Self::MissingClientSignature => "MissingClientSignature",
            Self::InvalidPairingToken => "InvalidPairingToken",
            Self::InvalidPairingSecret => "InvalidPairingSecret",
            Self::PeerAlreadyPaired => "PeerAlreadyPaired",
            Self::NotPaired => "NotPaired",
            Self::PeerNotPaired => "PeerNotPaired",
            Self::NoPendingPairing => "NoPendingPairing",
            Self::PeerKeyMismatch => "PeerKeyMismatch",
            Self::SessionNotFound => "SessionNotFound",
            Self::InvalidPeerPublicKey => "InvalidPeerPublicKey",
            Self::InvalidClientSignature => "InvalidClientSignature",
            Self::InvalidTranscript => "InvalidTranscript",
            Self::PeerSignatureInvalid => "PeerSignatureInvalid",
            Self::DecryptFailed => "DecryptFailed",
            Self::InvalidSeq => "InvalidSeq",
            Self::ReplayDetected => "ReplayDetected",
            Self::IdentityKeysUnavailable => "IdentityKeysUnavailable",
            Self::NativeMessagingDisabled => "NativeMessagingDisabled",
            Self::InvalidKeyLength => "InvalidKeyLength",
            Self::InvalidSignatureLength => "InvalidSignatureLength",
        }
    }

    /// Default human-readable message for this kind.
    #[must_use]
    pub const fn default_message(self) -> &'static str {
        match self {
            Self::PairingTokenRequired => "pairing token is required",
            Self::PeerPublicKeyRequired => "peer public key is required",
            Self::MissingEphemeralPublicKey => "ephemeral public key is required",
            Self::MissingSessionId => "session id is required",
            Self::MissingClientSignature => "client signature is required",
            Self::InvalidPairingToken => "pairing token does not match",
            Self::InvalidPairingSecret => "stored pairing secret is invalid",
            Self::PeerAlreadyPaired => "a different peer is already paired",
            Self::NotPaired => "no peer has been paired",
            Self::PeerNotPaired => "no paired peer available for verification",
            Self::NoPendingPairing => "no pending pairing to confirm",
            Self::PeerKeyMismatch => "peer key does not match the pinned key",
            Self::SessionNotFound => "session not found",
            Self::InvalidPeerPublicKey => "peer public key is malformed",
            Self::InvalidClientSignature => "client signature is malformed",
            Self::InvalidTranscript => "handshake transcript is invalid",
            Self::PeerSignatureInvalid => "peer signature verification failed",
            Self::DecryptFailed => "frame decryption failed",
            Self::InvalidSeq => "sequence number is invalid",
            Self::ReplayDetected => "frame sequence number did not advance",
            Self::IdentityKeysUnavailable => "identity keys are unavailable",
            Self::NativeMessagingDisabled => "native messaging is disabled",
            Self::InvalidKeyLength => "key has the wrong length",
            Self::InvalidSignatureLength => "signature has the wrong length",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

// ============================================
// ProtocolError
// ============================================

/// A protocol failure: a wire-stable kind plus a detail string.
///
/// The RPC layer serialises this to `{code, message}`; `detail` must never
/// contain key material.
#[derive(Error, Debug, Clone)]
#[error("{kind}: {detail}")]
pub struct ProtocolError {
    /// Stable error code.
    pub kind: ErrorKind,
    /// Human-readable context for logs and the wire message field.
    pub detail: String,
}

impl ProtocolError {
    /// Creates an error with an explicit detail string.
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// Returns the stable wire code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Returns `true` if this failure must tear down the session it
    /// occurred on.
    #[must_use]
    pub const fn closes_session(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::PeerSignatureInvalid | ErrorKind::DecryptFailed
        )
    }

    /// Returns `true` if this error might indicate an attack and warrants
    /// elevated logging.
    #[must_use]
    pub const fn is_suspicious(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::PeerSignatureInvalid
                | ErrorKind::DecryptFailed
                | ErrorKind::ReplayDetected
                | ErrorKind::InvalidPairingToken
        )
    }
}

impl From<ErrorKind> for ProtocolError {
    fn from(kind: ErrorKind) -> Self {
        Self {
            kind,
            detail: kind.default_message().to_string(),
        }
    }
}

// ============================================
// Tests
// ============================================
