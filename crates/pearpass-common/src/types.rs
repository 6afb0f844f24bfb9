// ============================================
// File: crates/pearpass-common/src/types.rs
// ============================================
//! # Core Type Definitions
//!
//! ## Creation Reason
//! Centralizes fundamental type definitions used throughout the PearPass
//! secure channel, ensuring type safety and consistent representations.
//!
//! ## Main Functionality
//! - `SessionId`: Unique identifier for active sessions (16 bytes, hex)
//!
//! ## Main Logical Flow
//! 1. Session ids are minted when a handshake begins
//! 2. Used as keys in the session table
//! 3. Travel hex-encoded over the native-messaging wire
//! 4. Bound into the client-finish transcript, so the encoding is part of
//!    the protocol and must never change
//!
//! ## ⚠️ Important Note for Next Developer
//! - SessionId is security-critical - always use the OS CSPRNG
//! - The hex string form is signed by the extension; keep it lowercase
//! - SessionId implements Zeroize and zeroes itself on drop
//!
//! ## Last Modified
//! v0.1.0 - Initial type definitions

use std::fmt;
use std::str::FromStr;

use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::error::CommonError;

// ============================================
// Constants
// ============================================

/// Size of a SessionId in bytes (128 bits of entropy).
pub const SESSION_ID_SIZE: usize = 16;

// ============================================
// SessionId
// ============================================

/// Unique identifier for an active session.
///
/// # Security Properties
/// - Generated using the operating system's CSPRNG
/// - Fixed 16-byte size (128 bits of entropy)
/// - Implements `Zeroize` for memory cleanup on drop
/// - Does NOT implement `Copy` due to the secure drop behavior
///
/// # Wire Format
/// Lowercase hex, 32 characters. The hex form is embedded verbatim in the
/// client-finish transcript that the extension signs.
///
/// # Example
/// ```
/// use pearpass_common::types::SessionId;
///
/// let session_id = SessionId::generate();
/// let restored: SessionId = session_id.to_string().parse().unwrap();
/// assert_eq!(session_id, restored);
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Zeroize)]
pub struct SessionId([u8; SESSION_ID_SIZE]);

impl Drop for SessionId {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl SessionId {
    /// Creates a `SessionId` from raw bytes.
    ///
    /// Returns `None` if `bytes` is not exactly 16 bytes.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != SESSION_ID_SIZE {
            return None;
        }
        let mut id = [0u8; SESSION_ID_SIZE];
        id.copy_from_slice(bytes);
        Some(Self(id))
    }

    /// Generates a new cryptographically random `SessionId`.
    #[must_use]
    pub fn generate() -> Self {
        let mut id = [0u8; SESSION_ID_SIZE];
        OsRng.fill_bytes(&mut id);
        Self(id)
    }

    /// Returns the raw bytes of the session id.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; SESSION_ID_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Only show the first 4 bytes in debug output
        write!(
            f,
            "SessionId({:02x}{:02x}{:02x}{:02x}...)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for SessionId {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)
            .map_err(|e| CommonError::decoding("session id hex", e.to_string()))?;
        Self::from_bytes(&bytes)
            .ok_or(CommonError::InvalidLength {
                expected: SESSION_ID_SIZE,
                actual: bytes.len(),
            })
    }
}

impl Serialize for SessionId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl AsRef<[u8]> for SessionId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// ============================================
// Tests
// ============================================
