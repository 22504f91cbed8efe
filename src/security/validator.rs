//! Shared-secret credential check.

use std::fmt;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("missing or empty credential")]
    Missing,

    #[error("invalid credential")]
    Invalid,
}

type Digest256 = [u8; 32];

fn digest(input: &str) -> Digest256 {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(input.as_bytes()));
    out
}

/// Admits a request when its credential equals the configured secret.
///
/// Both values are reduced to SHA-256 digests, so the comparison always runs
/// over 32 bytes whatever the input lengths, and the digests are compared in
/// constant time. Only the secret's digest is kept.
pub struct AccessValidator {
    secret: Digest256,
}

impl AccessValidator {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: digest(secret),
        }
    }

    /// # Errors
    ///
    /// [`AccessError::Missing`] for an absent or empty credential,
    /// [`AccessError::Invalid`] for any other mismatch.
    pub fn validate(&self, credential: Option<&str>) -> Result<(), AccessError> {
        let credential = match credential {
            Some(c) if !c.is_empty() => c,
            _ => return Err(AccessError::Missing),
        };
        let candidate = digest(credential);
        if bool::from(self.secret[..].ct_eq(&candidate[..])) {
            Ok(())
        } else {
            Err(AccessError::Invalid)
        }
    }
}

impl fmt::Debug for AccessValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessValidator").finish_non_exhaustive()
    }
}
