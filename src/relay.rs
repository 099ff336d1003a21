//! `RelayCore`: frames a `Ctrl` into wire bytes, assigns monotonic
//! sequence numbers, and enforces a freshness window plus a bounded
//! replay cache on open — over a single subkey.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use core::fmt;

use crate::cipher::{Cipher, AuthenticationFailed};
use crate::error::SealError;
use crate::wire::{pack_ctrl, unpack_ctrl};

/// Control commands dispatched to a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Cmd {
    Arm = 1,
    Disarm = 2,
    Sync = 3,
    Ping = 4,
}

impl Cmd {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Cmd::Arm),
            2 => Some(Cmd::Disarm),
            3 => Some(Cmd::Sync),
            4 => Some(Cmd::Ping),
            _ => None,
        }
    }
}

/// A command bound for (or received from) a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ctrl {
    pub dev: String,
    pub cmd: Cmd,
    pub at_ms: u64,
    pub body: Vec<u8>,
}

/// A sealed `Ctrl` plus the framing metadata needed to open it: the
/// per-core sequence number and the sender's timestamp.
#[derive(Debug, Clone)]
pub struct Env {
    pub seq: u64,
    pub at_ms: u64,
    pub pkt: crate::cipher::Packet,
}

/// Failures surfaced by `RelayCore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayError {
    /// Zero is not a valid replay-cache capacity.
    Config(&'static str),
    /// Size caps or wire-format violations (§4.3).
    Framing(&'static str),
    /// `env.at_ms` fell outside `[now - max_skew, now + max_skew]`.
    Skew,
    /// The envelope's (seq, nonce, tag) triple was already presented.
    Replay,
    /// AEAD tag mismatch.
    AuthenticationFailed,
    /// Nonce generation or input size exceeded the cipher backend.
    SealFailed(SealError),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "relay config invalid: {msg}"),
            Self::Framing(msg) => write!(f, "framing error: {msg}"),
            Self::Skew => write!(f, "timestamp outside skew window"),
            Self::Replay => write!(f, "replay blocked"),
            Self::AuthenticationFailed => write!(f, "authentication failed"),
            Self::SealFailed(e) => write!(f, "seal failed: {e}"),
        }
    }
}

impl std::error::Error for RelayError {}

impl From<AuthenticationFailed> for RelayError {
    fn from(_: AuthenticationFailed) -> Self {
        RelayError::AuthenticationFailed
    }
}

impl From<SealError> for RelayError {
    fn from(e: SealError) -> Self {
        RelayError::SealFailed(e)
    }
}

/// Milliseconds since the Unix epoch. Test code that exercises skew
/// semantics should inject a clock rather than depend on wall-clock
/// timing; this crate's own tests do so by constructing `Ctrl.at_ms`
/// directly with a known offset from `now_ms()`.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_millis() as u64
}

fn aad_for(seq: u64, at_ms: u64) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[..8].copy_from_slice(&seq.to_be_bytes());
    out[8..].copy_from_slice(&at_ms.to_be_bytes());
    out
}

struct Inner {
    seq: u64,
    seen: HashSet<String>,
    fifo: VecDeque<String>,
}

/// Frames, seals, and opens `Ctrl` messages over one subkey. One lock
/// guards sequence number, replay cache, and the AEAD call together —
/// the three must move in lockstep (§5).
pub struct RelayCore {
    cipher: Cipher,
    max_skew_ms: u64,
    replay_cap: usize,
    inner: Mutex<Inner>,
}

impl RelayCore {
    pub fn new(key: [u8; 32], max_skew_ms: u64, replay_cap: usize) -> Result<Self, RelayError> {
        if replay_cap == 0 {
            return Err(RelayError::Config("replay cap cannot be zero"));
        }
        Ok(Self {
            cipher: Cipher::new(key),
            max_skew_ms,
            replay_cap,
            inner: Mutex::new(Inner {
                seq: 0,
                seen: HashSet::new(),
                fifo: VecDeque::new(),
            }),
        })
    }

    /// Increment `seq`, frame and seal `ctrl`.
    pub fn seal_ctrl(&self, ctrl: &Ctrl) -> Result<Env, RelayError> {
        let raw = pack_ctrl(ctrl)?;

        let mut inner = self.inner.lock().unwrap();
        inner.seq += 1;
        let seq = inner.seq;
        let aad = aad_for(seq, ctrl.at_ms);
        let pkt = self.cipher.seal(&raw, &aad)?;
        drop(inner);

        Ok(Env {
            seq,
            at_ms: ctrl.at_ms,
            pkt,
        })
    }

    /// Check freshness, test-and-mark the replay cache, then decrypt
    /// and unframe. The replay mark happens before decryption so a
    /// tampered-ciphertext retry with the same identifiers cannot be
    /// re-presented (§4.3, §7).
    pub fn open_ctrl(&self, env: &Env) -> Result<Ctrl, RelayError> {
        let now = now_ms();
        let low = now.saturating_sub(self.max_skew_ms);
        let high = now + self.max_skew_ms;
        if env.at_ms < low || env.at_ms > high {
            return Err(RelayError::Skew);
        }

        let replay_key = format!(
            "{}:{}:{}",
            env.seq,
            hex::encode(env.pkt.nonce),
            hex::encode(env.pkt.mac)
        );

        {
            let mut inner = self.inner.lock().unwrap();
            if Self::seen_or_mark(&mut inner, self.replay_cap, replay_key) {
                return Err(RelayError::Replay);
            }
        }

        let aad = aad_for(env.seq, env.at_ms);
        let plain = self.cipher.open(&env.pkt, &aad)?;
        let ctrl = unpack_ctrl(plain.view())?;
        Ok(ctrl)
    }

    /// Returns `true` if `key` had already been marked (replay hit).
    fn seen_or_mark(inner: &mut Inner, cap: usize, key: String) -> bool {
        if !inner.seen.insert(key.clone()) {
            return true;
        }
        inner.fifo.push_back(key);
        while inner.fifo.len() > cap {
            if let Some(old) = inner.fifo.pop_front() {
                inner.seen.remove(&old);
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::mint_key;

    fn ctrl(dev: &str, cmd: Cmd, at_ms: u64, body: &[u8]) -> Ctrl {
        Ctrl {
            dev: dev.to_string(),
            cmd,
            at_ms,
            body: body.to_vec(),
        }
    }

    #[test]
    fn flow_ok() {
        let key = mint_key().unwrap();
        let tx = RelayCore::new(key, 30_000, 8192).unwrap();
        let rx = RelayCore::new(key, 30_000, 8192).unwrap();

        let c = ctrl("pixel-7", Cmd::Sync, now_ms(), &[1, 2, 3, 4]);
        let env = tx.seal_ctrl(&c).unwrap();
        let out = rx.open_ctrl(&env).unwrap();
        assert_eq!(out.dev, c.dev);
        assert_eq!(out.cmd, c.cmd);
        assert_eq!(out.body, c.body);
        assert_eq!(env.seq, 1);
    }

    #[test]
    fn sequence_is_monotonic() {
        let key = mint_key().unwrap();
        let tx = RelayCore::new(key, 30_000, 8192).unwrap();
        for expected in 1..=5u64 {
            let c = ctrl("dev", Cmd::Ping, now_ms(), &[]);
            let env = tx.seal_ctrl(&c).unwrap();
            assert_eq!(env.seq, expected);
        }
    }

    #[test]
    fn replay_blocked() {
        let key = mint_key().unwrap();
        let tx = RelayCore::new(key, 30_000, 8192).unwrap();
        let rx = RelayCore::new(key, 30_000, 8192).unwrap();

        let c = ctrl("moto-edge", Cmd::Arm, now_ms(), &[9, 8]);
        let env = tx.seal_ctrl(&c).unwrap();
        rx.open_ctrl(&env).unwrap();
        assert_eq!(rx.open_ctrl(&env), Err(RelayError::Replay));
    }

    #[test]
    fn skew_blocked() {
        let key = mint_key().unwrap();
        let tx = RelayCore::new(key, 30_000, 8192).unwrap();
        let rx = RelayCore::new(key, 1, 8192).unwrap();

        let c = ctrl("galaxy-s24", Cmd::Ping, now_ms() - 1000, &[7]);
        let env = tx.seal_ctrl(&c).unwrap();
        assert_eq!(rx.open_ctrl(&env), Err(RelayError::Skew));
    }

    #[test]
    fn replay_cache_evicts_oldest() {
        let key = mint_key().unwrap();
        let tx = RelayCore::new(key, 30_000, 2).unwrap();
        let rx = RelayCore::new(key, 30_000, 2).unwrap();

        let envs: Vec<Env> = (0..3)
            .map(|i| {
                let c = ctrl("dev", Cmd::Ping, now_ms(), &[i]);
                tx.seal_ctrl(&c).unwrap()
            })
            .collect();

        for env in &envs {
            rx.open_ctrl(env).unwrap();
        }

        // Cache capacity is 2; by the time envs[2] was marked, envs[0]'s
        // key had been evicted, so re-presenting it succeeds instead of
        // failing as a replay. That re-open itself marks envs[0] again
        // and, since the cache is still full, evicts envs[1]'s key in
        // turn — so envs[1] now also opens successfully, while envs[2]
        // was never evicted and still correctly replays.
        assert!(rx.open_ctrl(&envs[0]).is_ok());
        assert!(rx.open_ctrl(&envs[1]).is_ok());
        assert_eq!(rx.open_ctrl(&envs[2]), Err(RelayError::Replay));
    }

    #[test]
    fn replay_cap_zero_rejected() {
        let key = mint_key().unwrap();
        assert!(matches!(
            RelayCore::new(key, 30_000, 0),
            Err(RelayError::Config(_))
        ));
    }
}
