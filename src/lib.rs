//! # SyncStream
//!
//! Authenticated, replay-resistant control channel for fleets of edge
//! devices (cameras, sensors) dispatched from a mobile endpoint through
//! a relay or hub.
//!
//! ## Quick start
//!
//! ```rust
//! use syncstream::{EdgeHub, Ctrl, Cmd, mint_key, now_ms};
//!
//! let master = mint_key().unwrap();
//! let tx = EdgeHub::new(master, 30_000, 8192, 64, 64).unwrap();
//! let rx = EdgeHub::new(master, 30_000, 8192, 64, 64).unwrap();
//!
//! tx.stage_key(1, b"salt", b"ctrl-v1", true).unwrap();
//! rx.stage_key(1, b"salt", b"ctrl-v1", true).unwrap();
//! tx.allow_cmd(Cmd::Sync);
//! rx.allow_cmd(Cmd::Sync);
//!
//! let ctrl = Ctrl { dev: "cam-7".into(), cmd: Cmd::Sync, at_ms: now_ms(), body: vec![1, 2, 3] };
//! let venv = tx.seal(&ctrl).unwrap();
//! let out = rx.open(&venv).unwrap();
//! assert_eq!(out.body, ctrl.body);
//! ```
//!
//! ## What this crate does NOT provide
//!
//! Transport, session negotiation, forward secrecy across process
//! restarts, multi-party group keys, persistent state, or
//! network-level anti-flood. See `SPEC_FULL.md` in the repository for
//! the full contract.

#![deny(unsafe_code)]

pub mod cipher;
pub mod error;
pub mod hub;
pub mod hexutil;
pub mod keychain;
pub mod relay;
pub mod wire;

pub use cipher::{mint_key, Cipher, Packet, SecureBlob};
pub use error::{AuthenticationFailed, SealError};
pub use hexutil::{from_hex, hex_of, HexError};
pub use hub::{EdgeHub, HubConfigError, HubError, PolicyGate, RateGate, VersionedEnv};
pub use keychain::{Keychain, KeychainError};
pub use relay::{now_ms, Cmd, Ctrl, Env, RelayCore, RelayError};
