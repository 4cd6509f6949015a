// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Built-in public broker table and reachability probing.

use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

/// Public MQTT brokers usable without an account. Token version `0x01`
/// indexes into this table — append only, never reorder.
pub const DEFAULT_BROKERS: &[(&str, u16)] = &[
    ("broker.emqx.io", 8883),
    ("broker.hivemq.com", 8883),
    ("test.mosquitto.org", 8883),
];

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

pub fn broker_url(host: &str, port: u16) -> String {
    format!("mqtts://{host}:{port}")
}

/// True when `url` points at one of the built-in public brokers.
pub fn is_public(url: &str) -> bool {
    DEFAULT_BROKERS
        .iter()
        .any(|(h, p)| url == format!("mqtts://{h}:{p}") || url == format!("mqtt://{h}:{p}"))
}

/// TCP connect to the broker, returning round-trip millis on success.
pub fn ping_broker(host: &str, port: u16) -> Option<u64> {
    let start = Instant::now();
    let addr = (host, port).to_socket_addrs().ok()?.next()?;
    TcpStream::connect_timeout(&addr, PROBE_TIMEOUT).ok()?;
    Some(start.elapsed().as_millis() as u64)
}

/// Probe every public broker, preserving table order.
pub fn probe_all() -> Vec<(&'static str, u16, Option<u64>)> {
    let handles: Vec<_> = DEFAULT_BROKERS
        .iter()
        .map(|&(host, port)| std::thread::spawn(move || (host, port, ping_broker(host, port))))
        .collect();
    handles
        .into_iter()
        .map(|h| h.join().unwrap_or(("", 0, None)))
        .filter(|(host, _, _)| !host.is_empty())
        .collect()
}

#[cfg(test)]
#[path = "brokers_tests.rs"]
mod tests;
