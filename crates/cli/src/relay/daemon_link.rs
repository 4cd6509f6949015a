// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI-side view of the daemon: is the relay handled by a live daemon,
//! and poking it to push immediately.
//!
//! The daemon records its trigger port in KV. A recorded port is only
//! trusted after an actual connect; three consecutive failures clear it
//! so a non-daemon caller may fall back to a direct publish.

use std::net::TcpStream;
use std::time::Duration;

use anyhow::Result;

use crate::store::Store;

use super::{KV_DAEMON_FAILS, KV_DAEMON_PORT};

const CONNECT_TIMEOUT: Duration = Duration::from_millis(250);
const MAX_FAILURES: i64 = 3;

fn try_connect(port: u16) -> Option<TcpStream> {
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));
    TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT).ok()
}

/// Validate the recorded daemon port by a real connect attempt.
///
/// Failure bookkeeping lives in KV so transient races (daemon mid-restart)
/// don't immediately orphan the port.
pub fn is_relay_handled_by_daemon(store: &Store) -> Result<bool> {
    let port = store.kv_get_i64(KV_DAEMON_PORT)?;
    let Ok(port) = u16::try_from(port) else {
        return Ok(false);
    };
    if port == 0 {
        return Ok(false);
    }

    if try_connect(port).is_some() {
        store.kv_set(KV_DAEMON_FAILS, None)?;
        return Ok(true);
    }

    let failures = store.kv_get_i64(KV_DAEMON_FAILS)? + 1;
    if failures >= MAX_FAILURES {
        store.kv_set(KV_DAEMON_PORT, None)?;
        store.kv_set(KV_DAEMON_FAILS, None)?;
    } else {
        store.kv_set(KV_DAEMON_FAILS, Some(&failures.to_string()))?;
    }
    Ok(false)
}

/// Ping the daemon's trigger port so it schedules an immediate push.
/// Best effort; senders fall back to the daemon's periodic poll.
pub fn trigger_daemon_push(store: &Store) {
    let Ok(port) = store.kv_get_i64(KV_DAEMON_PORT) else {
        return;
    };
    let Ok(port) = u16::try_from(port) else {
        return;
    };
    if port == 0 {
        return;
    }
    use std::io::Write as _;
    if let Some(mut stream) = try_connect(port) {
        let _ = stream.write_all(b"\n");
    }
}

#[cfg(test)]
#[path = "daemon_link_tests.rs"]
mod tests;
