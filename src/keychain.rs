//! Versioned key derivation: HKDF-SHA256 subkeys staged from one master
//! secret, with one currently-active version.

use std::collections::HashMap;
use std::sync::Mutex;

use core::fmt;
use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::cipher::KEY_BYTES;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeychainError {
    /// `ver == 0` was passed to `stage`.
    ZeroVersion,
    /// `activate`/`take` referenced a version never staged.
    UnknownVersion(u32),
    /// `active()` was called before any `activate`.
    NoActiveKey,
    /// The HKDF expand step failed (requested length unsupported).
    DeriveFailed,
}

impl fmt::Display for KeychainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroVersion => write!(f, "key version cannot be zero"),
            Self::UnknownVersion(v) => write!(f, "key version {v} unknown"),
            Self::NoActiveKey => write!(f, "no active key"),
            Self::DeriveFailed => write!(f, "hkdf derive failed"),
        }
    }
}

impl std::error::Error for KeychainError {}

/// Owns the master secret and every derived subkey. Non-`Clone`: the
/// only way to get subkey bytes out is `take`, which hands back a copy
/// for a `RelayCore` to hold — the `Keychain` itself never gives up its
/// originals.
pub struct Keychain {
    master: Zeroizing<[u8; KEY_BYTES]>,
    slots: Mutex<Inner>,
}

struct Inner {
    versions: HashMap<u32, Zeroizing<[u8; KEY_BYTES]>>,
    active: u32,
}

impl Keychain {
    pub fn new(master: [u8; KEY_BYTES]) -> Self {
        Self {
            master: Zeroizing::new(master),
            slots: Mutex::new(Inner {
                versions: HashMap::new(),
                active: 0,
            }),
        }
    }

    /// Derive `HKDF-SHA256(master, salt, info) -> 32 bytes` and insert
    /// it under `ver`. Re-staging the same `(ver, salt, info)` is
    /// idempotent — HKDF is a pure function of its inputs, so the
    /// derived bytes are identical and simply overwrite the slot.
    pub fn stage(&self, ver: u32, salt: &[u8], info: &[u8]) -> Result<(), KeychainError> {
        if ver == 0 {
            return Err(KeychainError::ZeroVersion);
        }

        let hk = Hkdf::<Sha256>::new(Some(salt), &*self.master);
        let mut subkey = [0u8; KEY_BYTES];
        hk.expand(info, &mut subkey)
            .map_err(|_| KeychainError::DeriveFailed)?;

        let mut inner = self.slots.lock().unwrap();
        inner.versions.insert(ver, Zeroizing::new(subkey));
        Ok(())
    }

    /// Mark `ver` as the version new seals should use. Requires `ver`
    /// already staged.
    pub fn activate(&self, ver: u32) -> Result<(), KeychainError> {
        let mut inner = self.slots.lock().unwrap();
        if !inner.versions.contains_key(&ver) {
            return Err(KeychainError::UnknownVersion(ver));
        }
        inner.active = ver;
        Ok(())
    }

    /// Copy out the subkey for `ver`. Used only at `RelayCore`
    /// construction — the `RelayCore` then owns its own copy.
    pub fn take(&self, ver: u32) -> Result<[u8; KEY_BYTES], KeychainError> {
        let inner = self.slots.lock().unwrap();
        inner
            .versions
            .get(&ver)
            .map(|k| **k)
            .ok_or(KeychainError::UnknownVersion(ver))
    }

    pub fn active(&self) -> Result<u32, KeychainError> {
        let inner = self.slots.lock().unwrap();
        if inner.active == 0 {
            return Err(KeychainError::NoActiveKey);
        }
        Ok(inner.active)
    }
}
