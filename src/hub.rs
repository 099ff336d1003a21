//! `EdgeHub`: composes a `Keychain`, a per-key-version map of
//! `RelayCore`s, a token-bucket `RateGate`, and an allow-list
//! `PolicyGate` into the full send/receive surface used by a deployed
//! endpoint.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use core::fmt;

use crate::keychain::{Keychain, KeychainError};
use crate::relay::{now_ms, Cmd, Ctrl, Env, RelayCore, RelayError};

/// A sealed envelope tagged with the key version it was sealed under.
#[derive(Debug, Clone)]
pub struct VersionedEnv {
    pub key_ver: u32,
    pub env: Env,
}

/// Failures surfaced by `EdgeHub`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubError {
    Keychain(KeychainError),
    Relay(RelayError),
    /// `cmd` is not in the `PolicyGate` allow-set.
    NotAllowed(Cmd),
    /// The device's token bucket is empty.
    RateLimited,
}

impl fmt::Display for HubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keychain(e) => write!(f, "{e}"),
            Self::Relay(e) => write!(f, "{e}"),
            Self::NotAllowed(cmd) => write!(f, "cmd {cmd:?} not allowed"),
            Self::RateLimited => write!(f, "rate limited"),
        }
    }
}

impl std::error::Error for HubError {}

impl From<KeychainError> for HubError {
    fn from(e: KeychainError) -> Self {
        HubError::Keychain(e)
    }
}

impl From<RelayError> for HubError {
    fn from(e: RelayError) -> Self {
        HubError::Relay(e)
    }
}

/// Default-deny allow-set of permitted commands.
#[derive(Default)]
pub struct PolicyGate {
    allowed: Mutex<HashSet<Cmd>>,
}

impl PolicyGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(&self, cmd: Cmd) {
        self.allowed.lock().unwrap().insert(cmd);
    }

    pub fn can(&self, cmd: Cmd) -> bool {
        self.allowed.lock().unwrap().contains(&cmd)
    }
}

struct Bucket {
    tokens: f64,
    last_ms: u64,
}

/// Per-device token bucket rate limiter.
pub struct RateGate {
    burst: f64,
    refill_per_sec: f64,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl RateGate {
    pub fn new(burst: u32, refill_per_sec: u32) -> Result<Self, HubConfigError> {
        if burst == 0 || refill_per_sec == 0 {
            return Err(HubConfigError("rate gate config invalid"));
        }
        Ok(Self {
            burst: burst as f64,
            refill_per_sec: refill_per_sec as f64,
            buckets: Mutex::new(HashMap::new()),
        })
    }

    /// Refill `dev`'s bucket for elapsed time, then attempt to spend
    /// one token. Returns `true` if the request is allowed.
    pub fn hit(&self, dev: &str, now_ms: u64) -> bool {
        let mut buckets = self.buckets.lock().unwrap();
        let bucket = buckets.entry(dev.to_string()).or_insert(Bucket {
            tokens: self.burst,
            last_ms: now_ms,
        });

        let dt_ms = now_ms.saturating_sub(bucket.last_ms);
        bucket.tokens = (bucket.tokens + (dt_ms as f64 / 1000.0) * self.refill_per_sec).min(self.burst);
        bucket.last_ms = now_ms;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Invalid constructor arguments (zero burst/refill, zero replay cap).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubConfigError(pub &'static str);

impl fmt::Display for HubConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hub config invalid: {}", self.0)
    }
}

impl std::error::Error for HubConfigError {}

/// Multiplexes a `RelayCore` per key version over a shared `Keychain`,
/// applying rate limiting and command policy on both seal and open.
pub struct EdgeHub {
    keychain: Keychain,
    max_skew_ms: u64,
    replay_cap: usize,
    rate: RateGate,
    policy: PolicyGate,
    cores: Mutex<HashMap<u32, RelayCore>>,
}

impl EdgeHub {
    pub fn new(
        master: [u8; 32],
        max_skew_ms: u64,
        replay_cap: usize,
        burst: u32,
        refill_per_sec: u32,
    ) -> Result<Self, HubConfigError> {
        if replay_cap == 0 {
            return Err(HubConfigError("replay cap cannot be zero"));
        }
        Ok(Self {
            keychain: Keychain::new(master),
            max_skew_ms,
            replay_cap,
            rate: RateGate::new(burst, refill_per_sec)?,
            policy: PolicyGate::new(),
            cores: Mutex::new(HashMap::new()),
        })
    }

    pub fn stage_key(
        &self,
        ver: u32,
        salt: &[u8],
        info: &[u8],
        activate_now: bool,
    ) -> Result<(), HubError> {
        self.keychain.stage(ver, salt, info)?;
        if activate_now {
            self.keychain.activate(ver)?;
            tracing::debug!(key_ver = ver, "activated key version");
        }
        Ok(())
    }

    pub fn allow_cmd(&self, cmd: Cmd) {
        self.policy.allow(cmd);
    }

    /// Look up the `RelayCore` for `ver`, lazily constructing it from
    /// the keychain under the hub's lock if this is the first use.
    /// Lock order here is EdgeHub -> Keychain (never the reverse): the
    /// cores map lock is held while `Keychain::take` is called.
    fn core_for(&self, ver: u32) -> Result<(), HubError> {
        let mut cores = self.cores.lock().unwrap();
        if cores.contains_key(&ver) {
            return Ok(());
        }
        let key = self.keychain.take(ver)?;
        let core = RelayCore::new(key, self.max_skew_ms, self.replay_cap)?;
        cores.insert(ver, core);
        tracing::debug!(key_ver = ver, "constructed relay core");
        Ok(())
    }

    fn with_core<T>(
        &self,
        ver: u32,
        f: impl FnOnce(&RelayCore) -> Result<T, HubError>,
    ) -> Result<T, HubError> {
        self.core_for(ver)?;
        let cores = self.cores.lock().unwrap();
        let core = cores.get(&ver).expect("just inserted");
        f(core)
    }

    /// Policy-gate, rate-gate, then seal `ctrl` under the currently
    /// active key version.
    pub fn seal(&self, ctrl: &Ctrl) -> Result<VersionedEnv, HubError> {
        if !self.policy.can(ctrl.cmd) {
            tracing::warn!(dev = %ctrl.dev, cmd = ?ctrl.cmd, "policy denied seal");
            return Err(HubError::NotAllowed(ctrl.cmd));
        }
        if !self.rate.hit(&ctrl.dev, now_ms()) {
            tracing::warn!(dev = %ctrl.dev, "rate limited seal");
            return Err(HubError::RateLimited);
        }

        let ver = self.keychain.active()?;
        let env = self.with_core(ver, |core| Ok(core.seal_ctrl(ctrl)?))?;
        Ok(VersionedEnv { key_ver: ver, env })
    }

    /// Decrypt `venv` first, then apply policy and rate accounting on
    /// the opened `Ctrl`'s dev/cmd. Decryption happens before rate
    /// accounting so a forged or stale envelope cannot drain a real
    /// device's token bucket (§4.4, §9 open question c).
    pub fn open(&self, venv: &VersionedEnv) -> Result<Ctrl, HubError> {
        let ctrl = self.with_core(venv.key_ver, |core| Ok(core.open_ctrl(&venv.env)?))?;

        if !self.policy.can(ctrl.cmd) {
            tracing::warn!(dev = %ctrl.dev, cmd = ?ctrl.cmd, "policy denied open");
            return Err(HubError::NotAllowed(ctrl.cmd));
        }
        if !self.rate.hit(&ctrl.dev, now_ms()) {
            tracing::warn!(dev = %ctrl.dev, "rate limited open");
            return Err(HubError::RateLimited);
        }

        Ok(ctrl)
    }
}
