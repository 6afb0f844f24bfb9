// ============================================
// File: crates/pearpass-core/src/crypto/primitives.rs
// ============================================
//! # Crypto Primitives Wrapper
//!
//! Thin, length-checked adapter over the audited implementations. Every
//! fixed-size input is validated before it reaches the underlying library;
//! mismatches raise `InvalidKeyLength` / `InvalidSignatureLength`. No
//! branches on secret data beyond what the libraries themselves do.
//!
//! Key generation lives in [`super::keys`]; this module covers the
//! free-function surface: hashing, randomness, constant-time comparison,
//! signature verification over raw bytes, and the secretbox pair.
//!
//! ## Last Modified
//! v0.1.0 - Initial primitives wrapper

use crypto_secretbox::{
    aead::{Aead, KeyInit},
    Nonce, XSalsa20Poly1305,
};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::{
    ED25519_PUBLIC_KEY_SIZE, ED25519_SIGNATURE_SIZE, SECRETBOX_KEY_SIZE, SECRETBOX_NONCE_SIZE,
    SHA256_SIZE,
};
use crate::error::{ErrorKind, ProtocolError, Result};

// ============================================
// Randomness & Hashing
// ============================================

/// Fills a fixed-size array with bytes from the OS CSPRNG.
#[must_use]
pub fn random_array<const N: usize>() -> [u8; N] {
    let mut out = [0u8; N];
    OsRng.fill_bytes(&mut out);
    out
}

/// Computes the SHA-256 digest of `data`.
#[must_use]
pub fn sha256(data: &[u8]) -> [u8; SHA256_SIZE] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Constant-time equality for byte strings.
///
/// Differing lengths return `false` without inspecting content.
#[must_use]
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

// ============================================
// Ed25519 Verification
// ============================================

/// Verifies an Ed25519 signature over `message`.
///
/// # Arguments
/// * `public_key` - 32-byte Ed25519 verifying key
/// * `message` - The signed bytes
/// * `signature` - 64-byte signature
///
/// # Returns
/// `Ok(true)` if the signature verifies, `Ok(false)` if it does not.
///
/// # Errors
/// - `InvalidKeyLength` if the public key is not 32 bytes or not a valid
///   curve point
/// - `InvalidSignatureLength` if the signature is not 64 bytes
pub fn ed_verify(public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<bool> {
    if public_key.len() != ED25519_PUBLIC_KEY_SIZE {
        return Err(ProtocolError::new(
            ErrorKind::InvalidKeyLength,
            format!(
                "ed25519 public key: expected {ED25519_PUBLIC_KEY_SIZE}, got {}",
                public_key.len()
            ),
        ));
    }
    if signature.len() != ED25519_SIGNATURE_SIZE {
        return Err(ProtocolError::new(
            ErrorKind::InvalidSignatureLength,
            format!(
                "ed25519 signature: expected {ED25519_SIGNATURE_SIZE}, got {}",
                signature.len()
            ),
        ));
    }

    let mut key_bytes = [0u8; ED25519_PUBLIC_KEY_SIZE];
    key_bytes.copy_from_slice(public_key);
    let key = VerifyingKey::from_bytes(&key_bytes).map_err(|_| {
        ProtocolError::new(ErrorKind::InvalidKeyLength, "ed25519 public key is not a valid point")
    })?;

    let mut sig_bytes = [0u8; ED25519_SIGNATURE_SIZE];
    sig_bytes.copy_from_slice(signature);
    let sig = Signature::from_bytes(&sig_bytes);

    Ok(key.verify(message, &sig).is_ok())
}

// ============================================
// Secretbox (XSalsa20-Poly1305)
// ============================================

/// Authenticated encryption: seals `plaintext` under `key` and `nonce`.
///
/// Output length is `plaintext.len() + 16` (the Poly1305 tag travels inside
/// the ciphertext per secretbox convention).
///
/// # Errors
/// `InvalidKeyLength` if the key is not 32 bytes or the nonce is not 24.
pub fn secretbox_seal(key: &[u8], nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = secretbox_cipher(key)?;
    let nonce = secretbox_nonce(nonce)?;

    cipher.encrypt(&nonce, plaintext).map_err(|_| {
        // Sealing only fails on pathological input sizes
        ProtocolError::new(ErrorKind::DecryptFailed, "secretbox seal failed")
    })
}

/// Authenticated decryption: opens `ciphertext` sealed by [`secretbox_seal`].
///
/// # Errors
/// - `InvalidKeyLength` if the key is not 32 bytes or the nonce is not 24
/// - `DecryptFailed` if authentication fails (tampering or wrong key)
pub fn secretbox_open(key: &[u8], nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let cipher = secretbox_cipher(key)?;
    let nonce = secretbox_nonce(nonce)?;

    cipher
        .decrypt(&nonce, ciphertext)
        .map_err(|_| ErrorKind::DecryptFailed.into())
}

fn secretbox_cipher(key: &[u8]) -> Result<XSalsa20Poly1305> {
    if key.len() != SECRETBOX_KEY_SIZE {
        return Err(ProtocolError::new(
            ErrorKind::InvalidKeyLength,
            format!("secretbox key: expected {SECRETBOX_KEY_SIZE}, got {}", key.len()),
        ));
    }
    XSalsa20Poly1305::new_from_slice(key)
        .map_err(|_| ProtocolError::new(ErrorKind::InvalidKeyLength, "secretbox key rejected"))
}

fn secretbox_nonce(nonce: &[u8]) -> Result<Nonce> {
    if nonce.len() != SECRETBOX_NONCE_SIZE {
        return Err(ProtocolError::new(
            ErrorKind::InvalidKeyLength,
            format!(
                "secretbox nonce: expected {SECRETBOX_NONCE_SIZE}, got {}",
                nonce.len()
            ),
        ));
    }
    Ok(*Nonce::from_slice(nonce))
}

// ============================================
// Tests
// ============================================
