// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-device relay via MQTT pub/sub.
//!
//! Topic layout under the relay group id:
//!   `{relay_id}/{device_uuid}` — retained state + event tail per device
//!   `{relay_id}/control`      — non-retained control events
//!
//! An empty retained payload on a device topic is the explicit
//! "device gone" signal (also the LWT). Per-device dedup floors live in
//! KV: `relay_events_{device}`, `relay_reset_{device}`,
//! `relay_ctrl_{device}`, `relay_sync_time_{device}` and the short-id
//! claim table `relay_short_{short}`.

pub mod brokers;
pub mod client;
pub mod control;
pub mod daemon_link;
pub mod device;
pub mod import;
pub mod payload;
pub mod token;

use anyhow::Result;

use crate::event::epoch_now;
use crate::store::Store;

pub const CONTROL_SUFFIX: &str = "control";

pub const KV_STATUS: &str = "relay_status";
pub const KV_LAST_ERROR: &str = "relay_last_error";
pub const KV_LAST_PUSH_ID: &str = "relay_last_push_id";
pub const KV_LAST_PUSH: &str = "relay_last_push";
pub const KV_DAEMON_PORT: &str = "relay_daemon_port";
pub const KV_DAEMON_FAILS: &str = "relay_daemon_port_failures";

pub fn kv_events_key(device: &str) -> String {
    format!("relay_events_{device}")
}

pub fn kv_reset_key(device: &str) -> String {
    format!("relay_reset_{device}")
}

pub fn kv_ctrl_key(device: &str) -> String {
    format!("relay_ctrl_{device}")
}

pub fn kv_sync_key(device: &str) -> String {
    format!("relay_sync_time_{device}")
}

pub fn kv_short_key(short: &str) -> String {
    format!("relay_short_{short}")
}

/// Retained state topic for one device.
pub fn device_topic(relay_id: &str, device_uuid: &str) -> String {
    format!("{relay_id}/{device_uuid}")
}

/// Control topic for the group.
pub fn control_topic(relay_id: &str) -> String {
    format!("{relay_id}/{CONTROL_SUFFIX}")
}

/// Wildcard subscription covering every device plus control.
pub fn subscription_topic(relay_id: &str) -> String {
    format!("{relay_id}/+")
}

/// Split a full topic into `(relay_id, suffix)`.
pub fn split_topic(topic: &str) -> Option<(&str, &str)> {
    topic.split_once('/')
}

/// Record a healthy relay iteration.
pub fn record_ok(store: &Store) {
    let _ = store.kv_set(KV_STATUS, Some("ok"));
    let _ = store.kv_set(KV_LAST_ERROR, None);
}

/// Record a relay failure for `relay status` to surface.
pub fn record_error(store: &Store, err: &str) {
    let _ = store.kv_set(KV_STATUS, Some("error"));
    let _ = store.kv_set(KV_LAST_ERROR, Some(err));
}

/// A remote device known through KV bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDevice {
    pub uuid: String,
    pub short: String,
    pub sync_time: i64,
}

/// Remote devices derived from KV — present even when a remote currently
/// has zero instances.
pub fn get_remote_devices(store: &Store) -> Result<Vec<RemoteDevice>> {
    let shorts = store.kv_prefix("relay_short_")?;
    let mut devices: Vec<RemoteDevice> = Vec::new();
    for (key, uuid) in shorts {
        let Some(short) = key.strip_prefix("relay_short_") else {
            continue;
        };
        let sync_time = store.kv_get_i64(&kv_sync_key(&uuid))?;
        devices.push(RemoteDevice { uuid, short: short.to_owned(), sync_time });
    }
    devices.sort_by(|a, b| a.short.cmp(&b.short));
    Ok(devices)
}

/// Stamp the last-successful-sync time for a device.
pub fn touch_sync_time(store: &Store, device: &str) {
    let _ = store.kv_set(&kv_sync_key(device), Some(&epoch_now().to_string()));
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
