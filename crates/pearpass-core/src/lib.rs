// ============================================
// File: crates/pearpass-core/src/lib.rs
// ============================================
//! # PearPass Core - Pairing & Session Channel
//!
//! ## Creation Reason
//! Implements the security core of the PearPass native-messaging channel:
//! long-term identity management, user-confirmed pairing, the session
//! handshake, and the authenticated data channel.
//!
//! ## Main Functionality
//! - [`crypto`]: Thin wrapper over audited crypto implementations
//! - [`kv`]: Contract for the vault's encrypted key-value store
//! - [`identity`]: Long-term Ed25519 + X25519 identity persistence
//! - [`pairing`]: Pairing-code derivation and peer pinning
//! - [`session`]: Session store, handshake, and encrypted frames
//! - [`error`]: Wire-stable protocol error taxonomy
//!
//! ## Component Layering
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     RPC façade (host)                    │
//! ├──────────────────────────────────────────────────────────┤
//! │   SessionManager          │          Core                │
//! ├───────────────┬───────────┴───────────┬──────────────────┤
//! │ SessionStore  │    PairingManager     │  IdentityStore   │
//! ├───────────────┴───────────────────────┴──────────────────┤
//! │        KV store contract        │    crypto wrapper      │
//! └──────────────────────────────────────────────────────────┘
//! ```
//! No component depends on one above it.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Everything here is wire-visible: pairing-code preimages, transcript
//!   byte order, and error codes are protocol, not implementation detail
//! - Sessions live in memory only; losing them on restart is expected
//! - KV persistence failures are downgraded, never surfaced raw
//!
//! ## Last Modified
//! v0.1.0 - Initial core implementation

#![warn(clippy::all)]

pub mod core;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod kv;
pub mod pairing;
pub mod session;

// Re-export primary types at crate root
pub use crate::core::{Core, ResetOutcome};
pub use error::{ErrorKind, ProtocolError, Result};
pub use identity::{IdentityPublic, IdentityStore};
pub use pairing::{PairingManager, PairingState};
pub use session::manager::{HandshakeReply, SealedFrame, SessionManager};
pub use session::{Session, SessionStore};
