// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control events on `{relay_id}/control`: cross-device actions.
//!
//! `stop` executes a local stop on the named instance; `start` is
//! log-only (a remote device cannot be told to spawn a process). Events
//! are filtered by target device and a per-source timestamp floor
//! (`relay_ctrl_{source}`), since the control topic is not retained but
//! brokers may still redeliver on QoS 1.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::config::HuddleConfig;
use crate::event::{epoch_now, EventType};
use crate::lifecycle;
use crate::store::Store;

use super::client::publish_once;
use super::device::DeviceIdentity;
use super::{control_topic, kv_ctrl_key};

/// One control event on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlEnvelope {
    pub action: String,
    pub target: String,
    /// Short id of the device expected to act.
    pub target_device: String,
    #[serde(default)]
    pub from: String,
    /// Short id of the sending device.
    #[serde(default)]
    pub from_device: String,
    /// Epoch seconds; the dedup floor per source device.
    #[serde(default)]
    pub ts: i64,
}

/// Publish one control action to the group.
pub async fn send_control(
    config: &HuddleConfig,
    own: &DeviceIdentity,
    from: &str,
    action: &str,
    target: &str,
    target_short: &str,
) -> Result<()> {
    let Some(ref relay_id) = config.relay_id else {
        anyhow::bail!("no relay configured");
    };
    let envelope = ControlEnvelope {
        action: action.to_owned(),
        target: target.to_owned(),
        target_device: target_short.to_owned(),
        from: from.to_owned(),
        from_device: own.short.clone(),
        ts: epoch_now(),
    };
    let payload = serde_json::to_vec(&envelope)?;
    publish_once(config, &control_topic(relay_id), payload, false).await
}

/// Process an inbound control payload (single object or array).
pub fn handle_control_events(store: &Store, own: &DeviceIdentity, payload: &[u8]) -> Result<()> {
    let value: serde_json::Value = serde_json::from_slice(payload)?;
    let envelopes: Vec<ControlEnvelope> = if value.is_array() {
        serde_json::from_value(value)?
    } else {
        vec![serde_json::from_value(value)?]
    };

    for envelope in envelopes {
        if envelope.target_device != own.short {
            continue;
        }
        // Per-source floor: ignore stale or replayed control events.
        let floor_key = kv_ctrl_key(&envelope.from_device);
        if envelope.ts <= store.kv_get_i64(&floor_key)? {
            continue;
        }
        store.kv_set(&floor_key, Some(&envelope.ts.to_string()))?;

        store.log_event(
            EventType::Control,
            "_control",
            &json!({
                "action": envelope.action,
                "target": envelope.target,
                "target_device": envelope.target_device,
                "from": envelope.from,
                "from_device": envelope.from_device,
            }),
        )?;

        match envelope.action.as_str() {
            "stop" => {
                info!(target = %envelope.target, from = %envelope.from, "remote stop");
                if !lifecycle::stop_instance(store, &envelope.target)? {
                    warn!(target = %envelope.target, "remote stop target not found");
                }
            }
            // A remote device cannot be instructed to start a process;
            // the control event above is the whole effect.
            "start" => {}
            other => warn!(action = other, "unknown control action ignored"),
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "control_tests.rs"]
mod tests;
