// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::json;

use crate::event::EventType;
use crate::store::{InstanceRow, Store};

use super::super::device::DeviceIdentity;
use super::{build_push, mark_pushed, MAX_EVENTS_PER_PUSH};

fn identity() -> DeviceIdentity {
    DeviceIdentity { uuid: "dev-a-uuid".into(), short: "AAAA".into() }
}

#[test]
fn push_excludes_remote_rows_and_events() -> anyhow::Result<()> {
    let store = Store::open_in_memory()?;

    let mut local = InstanceRow::new("luna");
    local.session_id = Some("sess-1".into());
    store.insert_instance(&local)?;

    let mut remote = InstanceRow::new("nova:BBBB");
    remote.origin_device_id = "dev-b-uuid".into();
    store.insert_instance(&remote)?;

    store.log_event(EventType::Message, "luna", &json!({"text": "local", "from": "luna"}))?;
    store.log_event(
        EventType::Message,
        "nova:BBBB",
        &json!({"text": "imported", "from": "nova:BBBB"}),
    )?;

    let batch = build_push(&store, &identity(), false)?
        .ok_or_else(|| anyhow::anyhow!("expected a batch"))?;
    assert_eq!(batch.payload.events.len(), 1);
    assert_eq!(batch.payload.events[0].instance, "luna");
    assert!(batch.payload.state.instances.contains_key("luna"));
    assert!(!batch.payload.state.instances.contains_key("nova:BBBB"));
    assert_eq!(batch.payload.state.short_id, "AAAA");

    // Local-only identifiers are nulled in the published row.
    assert_eq!(batch.payload.state.instances["luna"]["session_id"], serde_json::Value::Null);
    Ok(())
}

#[test]
fn cursor_gates_pushes_and_force_overrides() -> anyhow::Result<()> {
    let store = Store::open_in_memory()?;
    store.insert_instance(&InstanceRow::new("luna"))?;
    store.log_event(EventType::Message, "luna", &json!({"text": "x", "from": "luna"}))?;

    let batch = build_push(&store, &identity(), false)?
        .ok_or_else(|| anyhow::anyhow!("expected a batch"))?;
    mark_pushed(&store, &batch)?;

    assert!(build_push(&store, &identity(), false)?.is_none(), "cursor is current");
    assert!(build_push(&store, &identity(), true)?.is_some(), "force refresh still builds");
    Ok(())
}

#[test]
fn overflow_sets_has_more() -> anyhow::Result<()> {
    let store = Store::open_in_memory()?;
    store.insert_instance(&InstanceRow::new("luna"))?;
    for i in 0..(MAX_EVENTS_PER_PUSH + 5) {
        store.log_event(EventType::Message, "luna", &json!({"text": i, "from": "luna"}))?;
    }

    let batch = build_push(&store, &identity(), false)?
        .ok_or_else(|| anyhow::anyhow!("expected a batch"))?;
    assert!(batch.has_more);
    assert_eq!(batch.payload.events.len(), MAX_EVENTS_PER_PUSH);
    mark_pushed(&store, &batch)?;

    let rest = build_push(&store, &identity(), false)?
        .ok_or_else(|| anyhow::anyhow!("expected the tail"))?;
    assert!(!rest.has_more);
    assert_eq!(rest.payload.events.len(), 5);
    Ok(())
}
