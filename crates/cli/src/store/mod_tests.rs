// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::json;

use crate::event::EventType;
use crate::store::{EventQuery, InstanceRow, Store};

#[test]
fn log_event_ids_are_strictly_increasing() -> anyhow::Result<()> {
    let store = Store::open_in_memory()?;
    let mut last = 0;
    for i in 0..20 {
        let id = store.log_event(EventType::Message, "alpha", &json!({"text": i.to_string()}))?;
        assert!(id > last, "id {id} not above {last}");
        last = id;
    }
    assert_eq!(store.max_event_id()?, last);
    Ok(())
}

#[test]
fn events_are_id_filtered_not_time_filtered() -> anyhow::Result<()> {
    let store = Store::open_in_memory()?;
    store.log_event(EventType::Message, "alpha", &json!({"text": "first"}))?;
    // A past timestamp must not hide an event from an id-based read.
    let id = store.log_event_at(
        EventType::Message,
        "alpha",
        &json!({"text": "backdated"}),
        "2001-01-01T00:00:00Z",
    )?;
    let events = store.events_after(1, &[EventType::Message], 0)?;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, id);
    Ok(())
}

#[test]
fn query_events_filters_by_kind_instance_and_locality() -> anyhow::Result<()> {
    let store = Store::open_in_memory()?;
    store.log_event(EventType::Message, "alpha", &json!({"text": "a"}))?;
    store.log_event(EventType::Life, "alpha", &json!({"action": "started"}))?;
    store.log_event(EventType::Message, "remote:AAAA", &json!({"text": "b"}))?;

    let messages = store.query_events(&EventQuery {
        kinds: vec![EventType::Message],
        ..EventQuery::default()
    })?;
    assert_eq!(messages.len(), 2);

    let local = store.query_events(&EventQuery { local_only: true, ..EventQuery::default() })?;
    assert_eq!(local.len(), 2);

    let alpha_only = store.query_events(&EventQuery {
        instance: Some("alpha".into()),
        ..EventQuery::default()
    })?;
    assert_eq!(alpha_only.len(), 2);
    Ok(())
}

#[test]
fn stopped_snapshot_round_trips_instance_row() -> anyhow::Result<()> {
    let store = Store::open_in_memory()?;
    let mut row = InstanceRow::new("luna");
    row.tag = Some("api".into());
    row.last_event_id = 42;
    store.log_event(
        EventType::Life,
        "luna",
        &json!({"action": "stopped", "snapshot": serde_json::to_value(&row)?}),
    )?;

    let snap = store
        .stopped_snapshot_load("luna")?
        .ok_or_else(|| anyhow::anyhow!("missing snapshot"))?;
    assert_eq!(snap.name, "luna");
    assert_eq!(snap.tag.as_deref(), Some("api"));
    assert_eq!(snap.last_event_id, 42);

    assert!(store.stopped_snapshot_load("nova")?.is_none());
    Ok(())
}

#[test]
fn latest_stopped_snapshot_wins() -> anyhow::Result<()> {
    let store = Store::open_in_memory()?;
    for cursor in [1_i64, 9] {
        let mut row = InstanceRow::new("luna");
        row.last_event_id = cursor;
        store.log_event(
            EventType::Life,
            "luna",
            &json!({"action": "stopped", "snapshot": serde_json::to_value(&row)?}),
        )?;
    }
    let snap = store
        .stopped_snapshot_load("luna")?
        .ok_or_else(|| anyhow::anyhow!("missing snapshot"))?;
    assert_eq!(snap.last_event_id, 9);
    Ok(())
}

#[test]
fn reset_archives_and_preserves_id_monotonicity_marker() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("huddle.db");
    let store = Store::open(&path)?;
    store.log_event(EventType::Message, "alpha", &json!({"text": "pre"}))?;
    store.kv_set("relay_events_devx", Some("5"))?;

    let archive = store.reset()?;
    let archive = archive.ok_or_else(|| anyhow::anyhow!("no archive written"))?;
    assert!(archive.exists());

    // Transient relay KV gone, reset floor recorded.
    assert!(store.kv_get("relay_events_devx")?.is_none());
    assert!(store.kv_get("relay_local_reset_ts")?.is_some());
    assert!(store.local_reset_ts()? > 0);

    // The reset life event exists in the fresh log.
    let events = store.events_after(0, &[EventType::Life], 0)?;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].data["action"], "reset");
    Ok(())
}
