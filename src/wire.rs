//! Wire framing for a `Ctrl` (big-endian throughout):
//!
//! ```text
//! u16 dev_len | dev_len bytes of dev
//! u8  cmd
//! u64 at_ms
//! u16 body_len | body_len bytes of body
//! ```
//!
//! The cmd byte is part of the framed plaintext, not the AEAD's
//! associated data — see `relay::aad_for`.

use crate::relay::{Cmd, Ctrl, RelayError};

/// Build the framed plaintext for `ctrl`. Rejects `dev`/`body` longer
/// than `u16::MAX` bytes.
pub fn pack_ctrl(ctrl: &Ctrl) -> Result<Vec<u8>, RelayError> {
    if ctrl.dev.len() > u16::MAX as usize {
        return Err(RelayError::Framing("device id too long"));
    }
    if ctrl.body.len() > u16::MAX as usize {
        return Err(RelayError::Framing("payload too long"));
    }

    let mut out = Vec::with_capacity(2 + ctrl.dev.len() + 1 + 8 + 2 + ctrl.body.len());
    out.extend_from_slice(&(ctrl.dev.len() as u16).to_be_bytes());
    out.extend_from_slice(ctrl.dev.as_bytes());
    out.push(ctrl.cmd as u8);
    out.extend_from_slice(&ctrl.at_ms.to_be_bytes());
    out.extend_from_slice(&(ctrl.body.len() as u16).to_be_bytes());
    out.extend_from_slice(&ctrl.body);
    Ok(out)
}

/// Parse a framed plaintext back into a `Ctrl`. Rejects any
/// out-of-bounds read, a missing cmd byte, an unrecognized cmd value,
/// or trailing bytes after `body`.
pub fn unpack_ctrl(raw: &[u8]) -> Result<Ctrl, RelayError> {
    let mut at = 0usize;

    let dev = take_str(raw, &mut at)?;

    if at >= raw.len() {
        return Err(RelayError::Framing("missing cmd"));
    }
    let cmd = Cmd::from_u8(raw[at]).ok_or(RelayError::Framing("unknown cmd"))?;
    at += 1;

    let at_ms = read_u64(raw, &mut at)?;
    let body = take_vec(raw, &mut at)?;

    if at != raw.len() {
        return Err(RelayError::Framing("trailing bytes"));
    }

    Ok(Ctrl {
        dev,
        cmd,
        at_ms,
        body,
    })
}

fn read_u16(raw: &[u8], at: &mut usize) -> Result<u16, RelayError> {
    if *at + 2 > raw.len() {
        return Err(RelayError::Framing("u16 bounds"));
    }
    let v = u16::from_be_bytes([raw[*at], raw[*at + 1]]);
    *at += 2;
    Ok(v)
}

fn read_u64(raw: &[u8], at: &mut usize) -> Result<u64, RelayError> {
    if *at + 8 > raw.len() {
        return Err(RelayError::Framing("u64 bounds"));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&raw[*at..*at + 8]);
    *at += 8;
    Ok(u64::from_be_bytes(buf))
}

fn take_str(raw: &[u8], at: &mut usize) -> Result<String, RelayError> {
    let n = read_u16(raw, at)? as usize;
    if *at + n > raw.len() {
        return Err(RelayError::Framing("str bounds"));
    }
    let s = raw[*at..*at + n].to_vec();
    *at += n;
    // Device ids are caller-owned opaque bytes (§3: "UTF-8-free bytes");
    // a non-UTF-8 id is a framing error rather than lossy-replaced,
    // since silently mangling it would desync policy/rate lookups keyed
    // by `dev`.
    String::from_utf8(s).map_err(|_| RelayError::Framing("dev not utf-8"))
}

fn take_vec(raw: &[u8], at: &mut usize) -> Result<Vec<u8>, RelayError> {
    let n = read_u16(raw, at)? as usize;
    if *at + n > raw.len() {
        return Err(RelayError::Framing("vec bounds"));
    }
    let v = raw[*at..*at + n].to_vec();
    *at += n;
    Ok(v)
}
