// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Join tokens: the only artifact needed to join a relay group from a
//! second device.
//!
//! URL-safe unpadded base64 over a version-prefixed binary layout:
//!   `0x01` + 16 UUID bytes + 1 byte index into the public broker table
//!   `0x02` + 16 UUID bytes + broker URL bytes

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use uuid::Uuid;

use super::brokers::{broker_url, DEFAULT_BROKERS};

const VERSION_PUBLIC: u8 = 0x01;
const VERSION_PRIVATE: u8 = 0x02;

/// Encode `(relay_id, broker_url)` into a compact token. Public brokers
/// collapse to a one-byte table index.
pub fn encode_join_token(relay_id: &str, broker: &str) -> Option<String> {
    let uuid_bytes = Uuid::parse_str(relay_id).ok()?;
    let uuid_bytes = uuid_bytes.as_bytes();

    for (i, (host, port)) in DEFAULT_BROKERS.iter().enumerate() {
        if broker == format!("mqtts://{host}:{port}") || broker == format!("mqtt://{host}:{port}")
        {
            let mut raw = Vec::with_capacity(18);
            raw.push(VERSION_PUBLIC);
            raw.extend_from_slice(uuid_bytes);
            raw.push(i as u8);
            return Some(URL_SAFE_NO_PAD.encode(raw));
        }
    }

    let mut raw = Vec::with_capacity(17 + broker.len());
    raw.push(VERSION_PRIVATE);
    raw.extend_from_slice(uuid_bytes);
    raw.extend_from_slice(broker.as_bytes());
    Some(URL_SAFE_NO_PAD.encode(raw))
}

/// Decode a token back to `(relay_id, broker_url)`. `None` on any
/// malformed input.
pub fn decode_join_token(token: &str) -> Option<(String, String)> {
    let raw = URL_SAFE_NO_PAD.decode(token.trim_end_matches('=')).ok()?;
    if raw.len() < 18 {
        return None;
    }

    let version = raw[0];
    let uuid = Uuid::from_slice(&raw[1..17]).ok()?.to_string();

    match version {
        VERSION_PUBLIC => {
            let idx = raw[17] as usize;
            let (host, port) = DEFAULT_BROKERS.get(idx)?;
            Some((uuid, broker_url(host, *port)))
        }
        VERSION_PRIVATE => {
            let url = String::from_utf8(raw[17..].to_vec()).ok()?;
            Some((uuid, url))
        }
        _ => None,
    }
}

/// Loose shape check used by the CLI to treat a bare argument as a token.
pub fn looks_like_token(arg: &str) -> bool {
    arg.len() > 20 && !arg.starts_with('-')
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
