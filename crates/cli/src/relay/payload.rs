// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build this device's retained relay payload: a state snapshot plus the
//! tail of local events past the push cursor.

use anyhow::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::Event;
use crate::store::{EventQuery, InstanceFilter, Store};

use super::device::DeviceIdentity;
use super::{KV_LAST_PUSH, KV_LAST_PUSH_ID};

/// Cap per publish; overflow schedules an immediate re-push.
pub const MAX_EVENTS_PER_PUSH: usize = 100;

/// The `state` half of the payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayState {
    /// Local rows keyed by their local names, local-only ids removed.
    #[serde(default)]
    pub instances: IndexMap<String, Value>,
    #[serde(default)]
    pub short_id: String,
    /// Epoch seconds of the last local reset event.
    #[serde(default)]
    pub reset_ts: i64,
}

/// Full retained payload for `{relay_id}/{device_uuid}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayPayload {
    #[serde(default)]
    pub state: RelayState,
    #[serde(default)]
    pub events: Vec<Event>,
}

/// A payload ready to publish plus cursor bookkeeping.
#[derive(Debug, Clone)]
pub struct PushBatch {
    pub payload: RelayPayload,
    /// Max event id included; the push cursor advances here on success.
    pub max_id: i64,
    /// More local events remain — schedule an immediate re-push.
    pub has_more: bool,
}

/// Strip identifiers that only mean something on this device.
fn strip_local_ids(mut row: Value) -> Value {
    if let Some(obj) = row.as_object_mut() {
        for key in ["session_id", "parent_session_id", "agent_id"] {
            obj.insert(key.to_owned(), Value::Null);
        }
    }
    row
}

/// Build the next push, or `None` when the push cursor is current and
/// `force` is unset (state-only refreshes use `force`).
pub fn build_push(
    store: &Store,
    identity: &DeviceIdentity,
    force: bool,
) -> Result<Option<PushBatch>> {
    let last_push = store.kv_get_i64(KV_LAST_PUSH_ID)?;

    let events = store.query_events(&EventQuery {
        after_id: last_push,
        local_only: true,
        limit: MAX_EVENTS_PER_PUSH + 1,
        ..EventQuery::default()
    })?;
    if events.is_empty() && !force {
        return Ok(None);
    }

    let has_more = events.len() > MAX_EVENTS_PER_PUSH;
    let events: Vec<Event> = events.into_iter().take(MAX_EVENTS_PER_PUSH).collect();
    let max_id = events.iter().map(|e| e.id).max().unwrap_or(last_push);

    let mut instances = IndexMap::new();
    for row in store.iter_instances(&InstanceFilter { local_only: true, ..Default::default() })? {
        instances.insert(row.name.clone(), strip_local_ids(serde_json::to_value(&row)?));
    }

    let payload = RelayPayload {
        state: RelayState {
            instances,
            short_id: identity.short.clone(),
            reset_ts: store.local_reset_ts()?,
        },
        events,
    };
    Ok(Some(PushBatch { payload, max_id, has_more }))
}

/// Record a successful push of `batch`.
pub fn mark_pushed(store: &Store, batch: &PushBatch) -> Result<()> {
    store.kv_set(KV_LAST_PUSH_ID, Some(&batch.max_id.to_string()))?;
    store.kv_set(KV_LAST_PUSH, Some(&crate::event::epoch_now().to_string()))?;
    Ok(())
}

#[cfg(test)]
#[path = "payload_tests.rs"]
mod tests;
