//! AEAD cipher: AES-256-GCM over a 32-byte key, 12-byte nonce, 16-byte tag.
//!
//! `Cipher` owns its key for the duration of the process; it is never
//! `Clone` and never moved out of a shared location, so the key bytes
//! exist in exactly one place until `Cipher` drops and zeroizes them.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use getrandom::getrandom;
use zeroize::Zeroizing;

use crate::error::{AuthenticationFailed, SealError};

pub const KEY_BYTES: usize = 32;
pub const NONCE_BYTES: usize = 12;
pub const TAG_BYTES: usize = 16;

/// A sealed message: random nonce, ciphertext body (tag appended by the
/// backend), and the 16-byte authentication tag split out for callers
/// that want to inspect it (e.g. the replay-cache key in `relay`).
#[derive(Clone, Debug)]
pub struct Packet {
    pub nonce: [u8; NONCE_BYTES],
    pub body: Vec<u8>,
    pub mac: [u8; TAG_BYTES],
}

/// A plaintext buffer that zeroizes its contents on drop.
///
/// Exposes a read-only view for callers that just want to inspect the
/// bytes, and a destructive `take` for callers that want to consume the
/// buffer without a copy (at which point zeroing becomes their
/// responsibility).
pub struct SecureBlob(Zeroizing<Vec<u8>>);

impl SecureBlob {
    fn new(data: Vec<u8>) -> Self {
        Self(Zeroizing::new(data))
    }

    pub fn view(&self) -> &[u8] {
        &self.0
    }

    pub fn take(self) -> Vec<u8> {
        // `Zeroizing` wipes on drop; extracting the inner `Vec` here
        // moves it out without a wipe, matching the C++ `take()` which
        // hands ownership to the caller and skips the destructor's
        // cleanse on the moved-from (now empty) buffer.
        Zeroizing::into_inner(self.0)
    }
}

/// Stateless AEAD wrapper over a single 32-byte key.
///
/// Non-`Clone`, non-`Copy`: duplicating a `Cipher` would duplicate live
/// key material, which the type system should make impossible rather
/// than merely discouraged.
pub struct Cipher {
    key: Zeroizing<[u8; KEY_BYTES]>,
}

impl Cipher {
    pub fn new(key: [u8; KEY_BYTES]) -> Self {
        Self {
            key: Zeroizing::new(key),
        }
    }

    /// Generate a random nonce, encrypt `plain`, and bind `aad`.
    pub fn seal(&self, plain: &[u8], aad: &[u8]) -> Result<Packet, SealError> {
        if plain.len() > i32::MAX as usize || aad.len() > i32::MAX as usize {
            return Err(SealError::SizeOverflow);
        }

        let mut nonce_bytes = [0u8; NONCE_BYTES];
        getrandom(&mut nonce_bytes).map_err(|_| SealError::RngFailure)?;

        let cipher = Aes256Gcm::new_from_slice(&*self.key)
            .map_err(|_| SealError::SizeOverflow)?;
        let nonce = Nonce::from_slice(&nonce_bytes);
        let sealed = cipher
            .encrypt(nonce, Payload { msg: plain, aad })
            .map_err(|_| SealError::SizeOverflow)?;

        // `aes-gcm` appends the tag to the ciphertext; split it back out
        // so `Packet` carries the two fields the wire format wants.
        let tag_at = sealed.len() - TAG_BYTES;
        let mut mac = [0u8; TAG_BYTES];
        mac.copy_from_slice(&sealed[tag_at..]);

        Ok(Packet {
            nonce: nonce_bytes,
            body: sealed[..tag_at].to_vec(),
            mac,
        })
    }

    /// Verify `pkt` against `aad` under the stored key.
    ///
    /// On any failure — MAC mismatch, size overflow, internal error —
    /// returns `AuthenticationFailed` without exposing partial
    /// plaintext; any staging buffer is wiped before the function
    /// returns.
    pub fn open(&self, pkt: &Packet, aad: &[u8]) -> Result<SecureBlob, AuthenticationFailed> {
        if pkt.body.len() > i32::MAX as usize || aad.len() > i32::MAX as usize {
            return Err(AuthenticationFailed);
        }

        let cipher = Aes256Gcm::new_from_slice(&*self.key).map_err(|_| AuthenticationFailed)?;
        let nonce = Nonce::from_slice(&pkt.nonce);

        let mut combined = Vec::with_capacity(pkt.body.len() + TAG_BYTES);
        combined.extend_from_slice(&pkt.body);
        combined.extend_from_slice(&pkt.mac);

        match cipher.decrypt(nonce, Payload { msg: &combined, aad }) {
            Ok(plain) => Ok(SecureBlob::new(plain)),
            Err(_) => {
                // `aes-gcm` does not hand back partial plaintext on
                // tag failure, but `combined` held ciphertext plus tag
                // (not secret) — nothing further to wipe here beyond
                // what `Zeroizing` already guards.
                Err(AuthenticationFailed)
            }
        }
    }
}

/// Mint a fresh random 32-byte key.
pub fn mint_key() -> Result<[u8; KEY_BYTES], SealError> {
    let mut key = [0u8; KEY_BYTES];
    getrandom(&mut key).map_err(|_| SealError::RngFailure)?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes_of(s: &str) -> Vec<u8> {
        s.as_bytes().to_vec()
    }

    #[test]
    fn roundtrip_ok() {
        let key = mint_key().unwrap();
        let rig = Cipher::new(key);
        let aad = bytes_of("frame:42");
        let plain = bytes_of("edge-cam packet");

        let p = rig.seal(&plain, &aad).unwrap();
        let out = rig.open(&p, &aad).unwrap();
        assert_eq!(out.view(), plain.as_slice());
    }

    #[test]
    fn roundtrip_empty_plaintext() {
        let key = mint_key().unwrap();
        let rig = Cipher::new(key);
        let p = rig.seal(b"", b"aad").unwrap();
        let out = rig.open(&p, b"aad").unwrap();
        assert!(out.view().is_empty());
    }

    #[test]
    fn tamper_ciphertext_fails() {
        let key = mint_key().unwrap();
        let rig = Cipher::new(key);
        let mut p = rig.seal(&bytes_of("pixel-plane"), &bytes_of("hdr")).unwrap();
        p.body[0] ^= 0x01;
        assert_eq!(rig.open(&p, &bytes_of("hdr")), Err(AuthenticationFailed));
    }

    #[test]
    fn tamper_tag_fails() {
        let key = mint_key().unwrap();
        let rig = Cipher::new(key);
        let mut p = rig.seal(&bytes_of("node-frame"), &bytes_of("meta")).unwrap();
        p.mac[0] ^= 0x80;
        assert_eq!(rig.open(&p, &bytes_of("meta")), Err(AuthenticationFailed));
    }

    #[test]
    fn tamper_aad_fails() {
        let key = mint_key().unwrap();
        let rig = Cipher::new(key);
        let aad = bytes_of("stream:cam-7");
        let p = rig.seal(&bytes_of("motion-slice"), &aad).unwrap();
        let mut bad_aad = aad.clone();
        bad_aad[0] ^= 0xFF;
        assert_eq!(rig.open(&p, &bad_aad), Err(AuthenticationFailed));
    }

    #[test]
    fn wrong_key_fails() {
        let rig_a = Cipher::new(mint_key().unwrap());
        let rig_b = Cipher::new(mint_key().unwrap());
        let p = rig_a.seal(&bytes_of("data"), b"aad").unwrap();
        assert_eq!(rig_b.open(&p, b"aad"), Err(AuthenticationFailed));
    }
}
