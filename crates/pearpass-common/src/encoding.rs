// ============================================
// File: crates/pearpass-common/src/encoding.rs
// ============================================
//! # Encoding Helpers
//!
//! Base64 helpers used at every trust boundary of the channel: peer keys,
//! ephemeral keys, signatures, and encrypted frames all travel base64-encoded
//! over the native-messaging wire while the core works on raw fixed-size
//! byte arrays. Decoding here is strict: padding is required and lengths are
//! validated where callers expect fixed sizes.
//!
//! ## Last Modified
//! v0.1.0 - Initial encoding helpers

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use crate::error::{CommonError, Result};

/// Encodes bytes as standard (padded) base64.
#[must_use]
pub fn b64_encode(bytes: impl AsRef<[u8]>) -> String {
    BASE64.encode(bytes)
}

/// Decodes standard base64 into a byte vector.
///
/// # Errors
/// Returns `Decoding` if the input is not valid base64.
pub fn b64_decode(input: &str) -> Result<Vec<u8>> {
    Ok(BASE64.decode(input)?)
}

/// Decodes standard base64 into a fixed-size byte array.
///
/// # Errors
/// - `Decoding` if the input is not valid base64
/// - `InvalidLength` if the decoded size is not exactly `N`
pub fn b64_decode_exact<const N: usize>(input: &str) -> Result<[u8; N]> {
    let bytes = b64_decode(input)?;
    if bytes.len() != N {
        return Err(CommonError::invalid_length(N, bytes.len()));
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

// ============================================
// Tests
// ============================================
