// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Import pipeline for inbound relay messages.
//!
//! Per device the importer enforces: short-id collision discard, reset
//! detection (explicit `reset_ts` advance or event-id regression), a
//! local reset-time floor, namespaced instance upsert with removal of
//! disappeared rows in the same critical section, and an id-deduped
//! event-tail import annotated with `_relay` provenance.

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::event::{parse_iso, SYSTEM_PREFIX};
use crate::store::{self, InstanceRow, Store};
use crate::wake;

use super::device::DeviceIdentity;
use super::payload::RelayPayload;
use super::{control, kv_events_key, kv_reset_key, kv_short_key, kv_sync_key, touch_sync_time};

/// What one inbound message did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    pub instances_upserted: usize,
    pub instances_removed: usize,
    pub events_imported: usize,
    /// Payload was discarded wholesale (collision, own echo).
    pub discarded: bool,
}

/// Route one inbound publish by topic suffix.
pub fn handle_message(
    store: &Store,
    own: &DeviceIdentity,
    suffix: &str,
    payload: &[u8],
) -> Result<ImportOutcome> {
    if suffix == own.uuid {
        // Our own retained state echoed back.
        return Ok(ImportOutcome { discarded: true, ..ImportOutcome::default() });
    }
    if suffix == super::CONTROL_SUFFIX {
        control::handle_control_events(store, own, payload)?;
        return Ok(ImportOutcome::default());
    }
    if payload.is_empty() {
        handle_device_gone(store, suffix)?;
        return Ok(ImportOutcome::default());
    }

    let parsed: RelayPayload = serde_json::from_slice(payload)?;
    import_device_state(store, own, suffix, &parsed)
}

/// Empty retained payload: the device left (or its daemon's LWT fired).
/// Remove its rows and bookkeeping.
pub fn handle_device_gone(store: &Store, device: &str) -> Result<()> {
    info!(device, "relay device gone");
    store.with_txn(|tx| {
        store::delete_instances_by_origin_on(tx, device)?;
        Ok(())
    })?;
    store.kv_set(&kv_sync_key(device), None)?;

    // Reverse-lookup the short-id claim and clear it.
    let shorts = store.kv_prefix("relay_short_")?;
    for (key, value) in shorts {
        if value == device {
            store.kv_set(&key, None)?;
        }
    }
    Ok(())
}

/// Strip or append the device suffix on one name.
///
/// The importer's own short id is stripped (`luna:AAAA` imported on
/// device AAAA is local `luna`); names already namespaced to a third
/// device pass through; bare names get the sender's suffix.
pub fn namespace_name(name: &str, sender_short: &str, own_short: &str) -> String {
    if name.is_empty() {
        return String::new();
    }
    if let Some(base) = name.strip_suffix(&format!(":{own_short}")) {
        return base.to_owned();
    }
    if name.contains(':') {
        return name.to_owned();
    }
    format!("{name}:{sender_short}")
}

fn namespace_list(names: &[String], sender_short: &str, own_short: &str) -> Vec<String> {
    names.iter().map(|n| namespace_name(n, sender_short, own_short)).collect()
}

/// Drop everything previously imported from `device` and zero its floors.
fn purge_device(store: &Store, device: &str) -> Result<()> {
    store.with_txn(|tx| {
        let rows = store::delete_instances_by_origin_on(tx, device)?;
        let events = store::delete_relay_events_on(tx, device)?;
        debug!(device, rows, events, "purged remote device state");
        Ok(())
    })?;
    store.kv_set(&kv_events_key(device), Some("0"))?;
    Ok(())
}

/// Steps (a)–(g) for a device-topic payload.
pub fn import_device_state(
    store: &Store,
    own: &DeviceIdentity,
    device: &str,
    payload: &RelayPayload,
) -> Result<ImportOutcome> {
    let mut outcome = ImportOutcome::default();
    let short = payload.state.short_id.clone();
    if short.is_empty() {
        warn!(device, "payload without short id discarded");
        outcome.discarded = true;
        return Ok(outcome);
    }

    // (a) Short-id collision: one device per short id, first claim wins.
    match store.kv_get(&kv_short_key(&short))? {
        Some(existing) if existing != device => {
            warn!(device, short = %short, existing = %existing, "short-id collision, payload discarded");
            outcome.discarded = true;
            return Ok(outcome);
        }
        Some(_) => {}
        None => store.kv_set(&kv_short_key(&short), Some(device))?,
    }

    // (b) Remote reset: their reset_ts advanced past our floor.
    let known_reset = store.kv_get_i64(&kv_reset_key(device))?;
    if payload.state.reset_ts > known_reset {
        info!(device, reset_ts = payload.state.reset_ts, "remote reset detected");
        purge_device(store, device)?;
        store.kv_set(&kv_reset_key(device), Some(&payload.state.reset_ts.to_string()))?;
    }

    // (c) Local floor: nothing older than our own last reset comes in.
    let local_floor = store.local_reset_ts()?;

    // (d)+(e) Instance upsert and disappearance removal, one critical section.
    let (upserted, removed) = store.with_txn(|tx| {
        let mut incoming_keys: Vec<String> = Vec::new();
        let mut upserted = 0;
        for (name, row_value) in &payload.state.instances {
            let Ok(mut row) = serde_json::from_value::<InstanceRow>(row_value.clone()) else {
                warn!(device, name = name.as_str(), "unparseable remote row skipped");
                continue;
            };
            if row.status_time != 0 && local_floor != 0 && row.status_time < local_floor {
                continue;
            }
            row.name = namespace_name(name, &short, &own.short);
            row.parent_name =
                row.parent_name.map(|p| namespace_name(&p, &short, &own.short));
            row.origin_device_id = device.to_owned();
            row.session_id = None;
            row.parent_session_id = None;
            row.agent_id = None;
            incoming_keys.push(row.name.clone());
            store::instances::upsert_on(tx, &row)?;
            upserted += 1;
        }

        // Remote disappearances: rows of this device not in the payload.
        let mut stmt =
            tx.prepare("SELECT name FROM instances WHERE origin_device_id = ?1")?;
        let existing: Vec<String> = stmt
            .query_map([device], |r| r.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        drop(stmt);
        let mut removed = 0;
        for name in existing {
            if !incoming_keys.contains(&name) {
                tx.execute("DELETE FROM instances WHERE name = ?1", [&name])?;
                removed += 1;
            }
        }
        Ok((upserted, removed))
    })?;
    outcome.instances_upserted = upserted;
    outcome.instances_removed = removed;

    // (f) Event tail.
    let mut events = payload.events.clone();
    events.sort_by_key(|e| e.id);
    let mut floor = store.kv_get_i64(&kv_events_key(device))?;

    // Id regression without an explicit reset_ts advance: the remote db
    // was recreated out from under the bus. Treat as a reset.
    if let Some(max_incoming) = events.iter().map(|e| e.id).max() {
        if max_incoming < floor {
            info!(device, max_incoming, floor, "remote id regression, treating as reset");
            purge_device(store, device)?;
            floor = 0;
        }
    }

    let mut imported = 0;
    let mut max_seen = floor;
    for ev in &events {
        if ev.id <= floor {
            continue;
        }
        max_seen = max_seen.max(ev.id);
        if ev.instance.starts_with(SYSTEM_PREFIX) {
            continue;
        }
        if local_floor != 0 && parse_iso(&ev.ts).is_some_and(|secs| secs < local_floor) {
            continue;
        }

        let instance = namespace_name(&ev.instance, &short, &own.short);
        let mut data = ev.data.clone();
        if let Some(obj) = data.as_object_mut() {
            if let Some(from) = obj.get("from").and_then(Value::as_str) {
                let from = namespace_name(from, &short, &own.short);
                obj.insert("from".to_owned(), Value::String(from));
            }
            for key in ["mentions", "delivered_to"] {
                if let Some(list) = obj.get(key).and_then(Value::as_array) {
                    let names: Vec<String> = list
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_owned))
                        .collect();
                    let mapped = namespace_list(&names, &short, &own.short);
                    obj.insert(
                        key.to_owned(),
                        Value::Array(mapped.into_iter().map(Value::String).collect()),
                    );
                }
            }
            obj.insert(
                "_relay".to_owned(),
                serde_json::json!({"device": device, "short": short, "id": ev.id}),
            );
        }
        store.log_event_at(ev.kind, &instance, &data, &ev.ts)?;
        imported += 1;
    }
    if max_seen > floor {
        store.kv_set(&kv_events_key(device), Some(&max_seen.to_string()))?;
    }
    outcome.events_imported = imported;

    touch_sync_time(store, device);

    // (g) Local listeners see the remote tail immediately.
    if outcome.events_imported > 0 || outcome.instances_upserted > 0 {
        wake::notify_all(store);
    }
    Ok(outcome)
}

#[cfg(test)]
#[path = "import_tests.rs"]
mod tests;
