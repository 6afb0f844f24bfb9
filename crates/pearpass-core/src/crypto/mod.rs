// ============================================
// File: crates/pearpass-core/src/crypto/mod.rs
// ============================================
//! # Cryptography Module
//!
//! ## Creation Reason
//! Centralizes all cryptographic operations for the PearPass secure channel,
//! using audited RustCrypto / dalek implementations.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`keys`]: Key types and generation (Ed25519, X25519, session keys)
//! - [`primitives`]: Thin wrapper functions (hash, secretbox, CSPRNG,
//!   constant-time compare, signature verification)
//!
//! ## Cryptographic Design
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Handshake Phase                          │
//! │  Extension                                      Host        │
//! │    │  X25519 Ephemeral Key ────────────────────► │          │
//! │    │                                             │          │
//! │    │ ◄──────────────────── X25519 Ephemeral Key  │          │
//! │    │ ◄── Ed25519 sig over (ephemerals ‖ peer pk) │          │
//! │    │                                             │          │
//! │    │  Ed25519 sig over (tag ‖ session ‖ transcript) ──►     │
//! │    │                                             │          │
//! │    │        X25519 shared secret = session key   │          │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Phase                             │
//! │   Session Key + random 24B nonce ──► XSalsa20-Poly1305      │
//! │   Monotonic seq counters ──► replay rejection               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Properties
//! - **Authentication**: Ed25519 signatures over fixed-order transcripts
//! - **Confidentiality**: XSalsa20 stream cipher
//! - **Integrity**: Poly1305 authentication tag
//! - **Replay Protection**: strictly monotonic per-session counters
//! - Random 192-bit nonces make per-call nonce collisions negligible
//!
//! ## ⚠️ Important Note for Next Developer
//! - ALL implementations come from RustCrypto / dalek (audited)
//! - NEVER roll your own crypto
//! - ALL sensitive keys implement Zeroize
//! - The domain-separation tags below are wire constants; changing one
//!   breaks every already-paired extension
//!
//! ## Last Modified
//! v0.1.0 - Initial crypto implementation

pub mod keys;
pub mod primitives;

// Re-export primary types at module level
pub use keys::{EphemeralKeyPair, ExchangeKeyPair, IdentityKeyPair, PairingSecret, SessionKey};

// ============================================
// Constants
// ============================================

/// Size of an Ed25519 public key in bytes.
pub const ED25519_PUBLIC_KEY_SIZE: usize = 32;

/// Size of an Ed25519 secret key in bytes (NaCl layout: seed ‖ public).
pub const ED25519_SECRET_KEY_SIZE: usize = 64;

/// Size of an Ed25519 signature in bytes.
pub const ED25519_SIGNATURE_SIZE: usize = 64;

/// Size of an X25519 public key in bytes.
pub const X25519_PUBLIC_KEY_SIZE: usize = 32;

/// Size of an X25519 secret key in bytes.
pub const X25519_SECRET_KEY_SIZE: usize = 32;

/// Size of an XSalsa20-Poly1305 key in bytes.
pub const SECRETBOX_KEY_SIZE: usize = 32;

/// Size of an XSalsa20-Poly1305 nonce in bytes.
pub const SECRETBOX_NONCE_SIZE: usize = 24;

/// Size of a Poly1305 authentication tag in bytes.
pub const SECRETBOX_TAG_SIZE: usize = 16;

/// Size of a SHA-256 digest in bytes.
pub const SHA256_SIZE: usize = 32;

/// Size of the pairing secret in bytes.
pub const PAIRING_SECRET_SIZE: usize = 32;

/// Size of the handshake transcript: host ephemeral ‖ extension ephemeral ‖
/// peer identity key.
pub const TRANSCRIPT_SIZE: usize = 3 * 32;

/// Domain-separation tag for pairing-code derivation.
pub const PAIRING_CODE_TAG: &[u8] = b"pearpass/pairingcode/v1";

/// Domain-separation tag for the extension's handshake-finish signature.
pub const CLIENT_FINISH_TAG: &[u8] = b"pearpass/client-finish/v1";
