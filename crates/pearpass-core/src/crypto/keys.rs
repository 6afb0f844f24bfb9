// ============================================
// File: crates/pearpass-core/src/crypto/keys.rs
// ============================================
//! # Cryptographic Key Types
//!
//! ## Creation Reason
//! Defines the key types used throughout the PearPass channel with proper
//! security properties (Zeroize on drop, redacted Debug, constant-time
//! comparison).
//!
//! ## Main Functionality
//! - `IdentityKeyPair`: Long-term Ed25519 signing keys
//! - `ExchangeKeyPair`: Long-term X25519 keys (persisted with the identity)
//! - `EphemeralKeyPair`: Per-session X25519 key exchange keys
//! - `SessionKey`: Symmetric channel key (raw ECDH output)
//! - `PairingSecret`: 32 random bytes bound into the pairing code
//!
//! ## Key Lifecycle
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  IdentityKeyPair + ExchangeKeyPair + PairingSecret         │
//! │  ├─ Generated once per installation                        │
//! │  ├─ Persisted in the vault's encrypted store               │
//! │  └─ Rotated only by an explicit pairing reset              │
//! │                                                            │
//! │  EphemeralKeyPair (per-session)                            │
//! │  ├─ Generated fresh for each handshake                     │
//! │  ├─ Consumed by the X25519 exchange (single use)           │
//! │  └─ Secret zeroed when the exchange drops it               │
//! │                                                            │
//! │  SessionKey (per-session)                                  │
//! │  ├─ The 32-byte X25519 shared secret, used directly        │
//! │  └─ Zeroed when the session is closed                      │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - ALL secret-bearing types MUST zeroize on drop
//! - Private keys must NEVER appear in logs or Debug output
//! - The persisted blob layouts are wire/storage formats: the Ed25519
//!   secret uses the NaCl layout (seed ‖ public), and blobs lead with the
//!   public key
//!
//! ## Last Modified
//! v0.1.0 - Initial key type definitions

use std::fmt;

use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use subtle::ConstantTimeEq;
use x25519_dalek::{EphemeralSecret, PublicKey as X25519PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{
    ED25519_PUBLIC_KEY_SIZE, ED25519_SECRET_KEY_SIZE, ED25519_SIGNATURE_SIZE, PAIRING_SECRET_SIZE,
    SECRETBOX_KEY_SIZE, X25519_PUBLIC_KEY_SIZE, X25519_SECRET_KEY_SIZE,
};
use crate::crypto::primitives::random_array;
use crate::error::{ErrorKind, ProtocolError, Result};

// ============================================
// IdentityKeyPair (Ed25519)
// ============================================

/// Long-term Ed25519 identity key pair for signing handshake transcripts.
///
/// # Security
/// - The signing key zeroizes on drop (inside `ed25519-dalek`)
/// - Serialize only through [`IdentityKeyPair::to_blob`], destined for the
///   vault's encrypted store
#[derive(Clone)]
pub struct IdentityKeyPair {
    signing_key: SigningKey,
}

impl IdentityKeyPair {
    /// Generates a new random identity key pair using the OS CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Restores an identity from its storage blob: `public(32) ‖ secret(64)`
    /// where the secret uses the NaCl layout `seed ‖ public`.
    ///
    /// # Errors
    /// `InvalidKeyLength` if the blob has the wrong size or its embedded
    /// public keys are inconsistent.
    pub fn from_blob(blob: &[u8]) -> Result<Self> {
        const BLOB_LEN: usize = ED25519_PUBLIC_KEY_SIZE + ED25519_SECRET_KEY_SIZE;
        if blob.len() != BLOB_LEN {
            return Err(ProtocolError::new(
                ErrorKind::InvalidKeyLength,
                format!("ed25519 identity blob: expected {BLOB_LEN}, got {}", blob.len()),
            ));
        }

        let mut keypair_bytes = [0u8; ED25519_SECRET_KEY_SIZE];
        keypair_bytes.copy_from_slice(&blob[ED25519_PUBLIC_KEY_SIZE..]);
        let signing_key = SigningKey::from_keypair_bytes(&keypair_bytes).map_err(|_| {
            ProtocolError::new(ErrorKind::InvalidKeyLength, "ed25519 identity blob is inconsistent")
        })?;
        keypair_bytes.zeroize();

        // Leading public key must match the one derived from the secret
        if signing_key.verifying_key().as_bytes() != &blob[..ED25519_PUBLIC_KEY_SIZE] {
            return Err(ProtocolError::new(
                ErrorKind::InvalidKeyLength,
                "ed25519 identity blob public key mismatch",
            ));
        }

        Ok(Self { signing_key })
    }

    /// Serializes to the storage blob: `public(32) ‖ seed ‖ public`.
    #[must_use]
    pub fn to_blob(&self) -> Vec<u8> {
        let mut blob = Vec::with_capacity(ED25519_PUBLIC_KEY_SIZE + ED25519_SECRET_KEY_SIZE);
        blob.extend_from_slice(self.signing_key.verifying_key().as_bytes());
        blob.extend_from_slice(&self.signing_key.to_keypair_bytes());
        blob
    }

    /// Returns the raw public key bytes.
    #[must_use]
    pub fn public_key_bytes(&self) -> [u8; ED25519_PUBLIC_KEY_SIZE] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Signs a message, returning the 64-byte Ed25519 signature.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> [u8; ED25519_SIGNATURE_SIZE] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl fmt::Debug for IdentityKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print private key material
        let public = self.public_key_bytes();
        write!(
            f,
            "IdentityKeyPair({:02x}{:02x}{:02x}{:02x}...)",
            public[0], public[1], public[2], public[3]
        )
    }
}

// ============================================
// ExchangeKeyPair (X25519, long-term)
// ============================================

/// Long-term X25519 key pair persisted alongside the Ed25519 identity.
///
/// Exposed to the extension during pairing; sessions themselves use fresh
/// [`EphemeralKeyPair`]s.
#[derive(Clone)]
pub struct ExchangeKeyPair {
    secret: StaticSecret,
}

impl ExchangeKeyPair {
    /// Generates a new random exchange key pair.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            secret: StaticSecret::random_from_rng(OsRng),
        }
    }

    /// Restores an exchange pair from its storage blob:
    /// `public(32) ‖ secret(32)`.
    ///
    /// # Errors
    /// `InvalidKeyLength` if the blob has the wrong size or the public key
    /// does not match the secret.
    pub fn from_blob(blob: &[u8]) -> Result<Self> {
        const BLOB_LEN: usize = X25519_PUBLIC_KEY_SIZE + X25519_SECRET_KEY_SIZE;
        if blob.len() != BLOB_LEN {
            return Err(ProtocolError::new(
                ErrorKind::InvalidKeyLength,
                format!("x25519 identity blob: expected {BLOB_LEN}, got {}", blob.len()),
            ));
        }

        let mut secret_bytes = [0u8; X25519_SECRET_KEY_SIZE];
        secret_bytes.copy_from_slice(&blob[X25519_PUBLIC_KEY_SIZE..]);
        let secret = StaticSecret::from(secret_bytes);
        secret_bytes.zeroize();

        let derived = X25519PublicKey::from(&secret);
        if derived.as_bytes() != &blob[..X25519_PUBLIC_KEY_SIZE] {
            return Err(ProtocolError::new(
                ErrorKind::InvalidKeyLength,
                "x25519 identity blob public key mismatch",
            ));
        }

        Ok(Self { secret })
    }

    /// Serializes to the storage blob: `public(32) ‖ secret(32)`.
    #[must_use]
    pub fn to_blob(&self) -> Vec<u8> {
        let mut blob = Vec::with_capacity(X25519_PUBLIC_KEY_SIZE + X25519_SECRET_KEY_SIZE);
        blob.extend_from_slice(X25519PublicKey::from(&self.secret).as_bytes());
        blob.extend_from_slice(&self.secret.to_bytes());
        blob
    }

    /// Returns the raw public key bytes.
    #[must_use]
    pub fn public_key_bytes(&self) -> [u8; X25519_PUBLIC_KEY_SIZE] {
        X25519PublicKey::from(&self.secret).to_bytes()
    }
}

impl fmt::Debug for ExchangeKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let public = self.public_key_bytes();
        write!(
            f,
            "ExchangeKeyPair({:02x}{:02x}{:02x}{:02x}...)",
            public[0], public[1], public[2], public[3]
        )
    }
}

// ============================================
// EphemeralKeyPair (X25519, per-session)
// ============================================

/// Ephemeral X25519 key pair for one handshake.
///
/// Single-use by construction: the exchange consumes the secret, so a key
/// pair can never be reused across sessions.
pub struct EphemeralKeyPair {
    secret: Option<EphemeralSecret>,
    public: X25519PublicKey,
}

impl EphemeralKeyPair {
    /// Generates a new random ephemeral key pair.
    #[must_use]
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random_from_rng(OsRng);
        let public = X25519PublicKey::from(&secret);
        Self {
            secret: Some(secret),
            public,
        }
    }

    /// Returns the public key bytes.
    #[must_use]
    pub fn public_key_bytes(&self) -> [u8; X25519_PUBLIC_KEY_SIZE] {
        self.public.to_bytes()
    }

    /// Performs the key exchange with a peer's public key, consuming the
    /// secret. The underlying library zeroizes the secret as it drops.
    #[must_use]
    pub fn exchange(mut self, peer_public: &[u8; X25519_PUBLIC_KEY_SIZE]) -> [u8; 32] {
        let peer = X25519PublicKey::from(*peer_public);
        let secret = self.secret.take().expect("ephemeral key already consumed");
        secret.diffie_hellman(&peer).to_bytes()
    }
}

impl fmt::Debug for EphemeralKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let public = self.public.as_bytes();
        f.debug_struct("EphemeralKeyPair")
            .field(
                "public",
                &format_args!(
                    "{:02x}{:02x}{:02x}{:02x}...",
                    public[0], public[1], public[2], public[3]
                ),
            )
            .field("consumed", &self.secret.is_none())
            .finish()
    }
}

// ============================================
// SessionKey
// ============================================

/// Symmetric session key for the encrypted channel.
///
/// Holds the raw 32-byte X25519 shared secret, used directly as the
/// secretbox key. X25519 output is close enough to uniform for this; the
/// layout is fixed by the extension and must not change unilaterally.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; SECRETBOX_KEY_SIZE]);

impl SessionKey {
    /// Creates a session key from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; SECRETBOX_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Returns the raw key bytes. Handle with care.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; SECRETBOX_KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print key material
        write!(f, "SessionKey([REDACTED])")
    }
}

impl PartialEq for SessionKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for SessionKey {}

// ============================================
// PairingSecret
// ============================================

/// The 32-byte pairing secret bound into the pairing-code derivation.
///
/// Rotating the identity rotates this secret, which invalidates old pairing
/// codes even if an Ed25519 key were ever reused.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PairingSecret([u8; PAIRING_SECRET_SIZE]);

impl PairingSecret {
    /// Generates a fresh random pairing secret.
    #[must_use]
    pub fn generate() -> Self {
        Self(random_array())
    }

    /// Restores a pairing secret from persisted bytes.
    ///
    /// # Errors
    /// `InvalidPairingSecret` if `bytes` is not exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PAIRING_SECRET_SIZE {
            return Err(ProtocolError::new(
                ErrorKind::InvalidPairingSecret,
                format!("expected {PAIRING_SECRET_SIZE} bytes, got {}", bytes.len()),
            ));
        }
        let mut out = [0u8; PAIRING_SECRET_SIZE];
        out.copy_from_slice(bytes);
        Ok(Self(out))
    }

    /// Returns the raw secret bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; PAIRING_SECRET_SIZE] {
        &self.0
    }
}

impl fmt::Debug for PairingSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PairingSecret([REDACTED])")
    }
}

// ============================================
// Tests
// ============================================
