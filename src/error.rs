//! Error types for the cipher layer.
//!
//! Mirrors the split used by the rest of the crate: one small error type
//! per component rather than a single crate-wide enum, so callers can
//! match narrowly and so lower layers don't need to anticipate the
//! vocabulary of higher ones.

use core::fmt;

/// Failures from [`crate::cipher::Cipher::seal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SealError {
    /// The nonce generator failed (OS RNG unavailable).
    RngFailure,
    /// `plain` or `aad` exceeds what the AEAD backend can address.
    SizeOverflow,
}

impl fmt::Display for SealError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RngFailure => write!(f, "random nonce generation failed"),
            Self::SizeOverflow => write!(f, "input exceeds maximum AEAD message size"),
        }
    }
}

impl std::error::Error for SealError {}

/// Failure from [`crate::cipher::Cipher::open`].
///
/// A single unit struct by design: the AEAD construction must not let a
/// caller distinguish "wrong key" from "tampered ciphertext" from
/// "oversized input" by error type alone — all three collapse to one
/// oracle-proof variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticationFailed;

impl fmt::Display for AuthenticationFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "authentication failed")
    }
}

impl std::error::Error for AuthenticationFailed {}
