// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::json;

use crate::event::{Event, EventType};
use crate::store::{InstanceFilter, InstanceRow, Store};

use super::super::device::DeviceIdentity;
use super::super::payload::{RelayPayload, RelayState};
use super::super::{kv_events_key, kv_short_key};
use super::{handle_device_gone, handle_message, import_device_state, namespace_name};

const DEV_B: &str = "dev-b-uuid";

fn own() -> DeviceIdentity {
    DeviceIdentity { uuid: "dev-a-uuid".into(), short: "AAAA".into() }
}

fn remote_event(id: i64, from: &str, text: &str, mentions: &[&str]) -> Event {
    Event {
        id,
        ts: "2026-03-01T10:00:00.000Z".into(),
        kind: EventType::Message,
        instance: from.into(),
        data: json!({"text": text, "from": from, "mentions": mentions}),
    }
}

fn payload_from(short: &str, instances: &[(&str, i64)], events: Vec<Event>) -> RelayPayload {
    let mut state = RelayState { short_id: short.into(), ..RelayState::default() };
    for (name, cursor) in instances {
        let mut row = InstanceRow::new(*name);
        row.last_event_id = *cursor;
        row.session_id = Some("remote-sess".into());
        state.instances.insert(
            (*name).to_owned(),
            serde_json::to_value(&row).unwrap_or_default(),
        );
    }
    RelayPayload { state, events }
}

#[test]
fn namespacing_rules() {
    assert_eq!(namespace_name("relaytest", "BBBB", "AAAA"), "relaytest:BBBB");
    // Our own suffix strips back to the local name.
    assert_eq!(namespace_name("luna:AAAA", "BBBB", "AAAA"), "luna");
    // Third-device names pass through untouched.
    assert_eq!(namespace_name("kira:CCCC", "BBBB", "AAAA"), "kira:CCCC");
    assert_eq!(namespace_name("", "BBBB", "AAAA"), "");
}

#[test]
fn import_namespaces_instances_and_events() -> anyhow::Result<()> {
    let store = Store::open_in_memory()?;
    let payload = payload_from(
        "BBBB",
        &[("relaytest", 3)],
        vec![remote_event(7, "relaytest", "hello over the wire", &["luna:AAAA"])],
    );

    let outcome = import_device_state(&store, &own(), DEV_B, &payload)?;
    assert_eq!(outcome.instances_upserted, 1);
    assert_eq!(outcome.events_imported, 1);

    // Roster: only the namespaced key exists, local ids are nulled.
    assert!(store.get_instance("relaytest")?.is_none());
    let row = store
        .get_instance("relaytest:BBBB")?
        .ok_or_else(|| anyhow::anyhow!("row missing"))?;
    assert_eq!(row.origin_device_id, DEV_B);
    assert!(row.session_id.is_none());

    // Event: sender namespaced, our own suffix stripped from mentions,
    // provenance annotated, original id preserved in the mark.
    let events = store.events_after(0, &[EventType::Message], 0)?;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].instance, "relaytest:BBBB");
    assert_eq!(events[0].data["from"], "relaytest:BBBB");
    assert_eq!(events[0].data["mentions"][0], "luna");
    assert_eq!(events[0].data["_relay"]["short"], "BBBB");
    assert_eq!(events[0].data["_relay"]["id"], 7);

    assert_eq!(store.kv_get_i64(&kv_events_key(DEV_B))?, 7);
    Ok(())
}

#[test]
fn duplicate_ids_are_dropped_on_reimport() -> anyhow::Result<()> {
    let store = Store::open_in_memory()?;
    let payload =
        payload_from("BBBB", &[("relaytest", 0)], vec![remote_event(7, "relaytest", "x", &[])]);
    import_device_state(&store, &own(), DEV_B, &payload)?;
    let second = import_device_state(&store, &own(), DEV_B, &payload)?;
    assert_eq!(second.events_imported, 0);
    assert_eq!(store.events_after(0, &[EventType::Message], 0)?.len(), 1);
    Ok(())
}

#[test]
fn short_id_collision_discards_payload() -> anyhow::Result<()> {
    let store = Store::open_in_memory()?;
    store.kv_set(&kv_short_key("BBBB"), Some("some-other-device"))?;

    let payload = payload_from("BBBB", &[("relaytest", 0)], vec![]);
    let outcome = import_device_state(&store, &own(), DEV_B, &payload)?;
    assert!(outcome.discarded);
    assert!(store.get_instance("relaytest:BBBB")?.is_none());
    // The original claim is untouched.
    assert_eq!(
        store.kv_get(&kv_short_key("BBBB"))?.as_deref(),
        Some("some-other-device")
    );
    Ok(())
}

#[test]
fn remote_reset_purges_before_new_events_apply() -> anyhow::Result<()> {
    let store = Store::open_in_memory()?;
    let first =
        payload_from("BBBB", &[("relaytest", 0)], vec![remote_event(5, "relaytest", "old", &[])]);
    import_device_state(&store, &own(), DEV_B, &first)?;
    assert_eq!(store.events_after(0, &[EventType::Message], 0)?.len(), 1);

    // Their reset_ts advances: previously imported rows and events go away.
    let mut second =
        payload_from("BBBB", &[("fresh", 0)], vec![remote_event(1, "fresh", "new era", &[])]);
    second.state.reset_ts = 12345;
    let outcome = import_device_state(&store, &own(), DEV_B, &second)?;

    assert!(store.get_instance("relaytest:BBBB")?.is_none(), "old row purged");
    assert!(store.get_instance("fresh:BBBB")?.is_some());
    let msgs = store.events_after(0, &[EventType::Message], 0)?;
    assert_eq!(msgs.len(), 1);
    assert_eq!(msgs[0].data["text"], "new era");
    assert_eq!(outcome.events_imported, 1);
    Ok(())
}

#[test]
fn id_regression_without_reset_ts_is_a_reset() -> anyhow::Result<()> {
    let store = Store::open_in_memory()?;
    let first =
        payload_from("BBBB", &[("relaytest", 0)], vec![remote_event(50, "relaytest", "a", &[])]);
    import_device_state(&store, &own(), DEV_B, &first)?;
    assert_eq!(store.kv_get_i64(&kv_events_key(DEV_B))?, 50);

    // Their db was recreated: ids restart below our floor.
    let second =
        payload_from("BBBB", &[("relaytest", 0)], vec![remote_event(2, "relaytest", "b", &[])]);
    let outcome = import_device_state(&store, &own(), DEV_B, &second)?;
    assert_eq!(outcome.events_imported, 1);

    let msgs = store.events_after(0, &[EventType::Message], 0)?;
    assert_eq!(msgs.len(), 1, "pre-regression imports were purged");
    assert_eq!(msgs[0].data["text"], "b");
    assert_eq!(store.kv_get_i64(&kv_events_key(DEV_B))?, 2);
    Ok(())
}

#[test]
fn disappeared_remote_rows_are_removed() -> anyhow::Result<()> {
    let store = Store::open_in_memory()?;
    let first = payload_from("BBBB", &[("relaytest", 0), ("other", 0)], vec![]);
    import_device_state(&store, &own(), DEV_B, &first)?;
    assert_eq!(
        store.iter_instances(&InstanceFilter::default())?.len(),
        2
    );

    let second = payload_from("BBBB", &[("relaytest", 0)], vec![]);
    let outcome = import_device_state(&store, &own(), DEV_B, &second)?;
    assert_eq!(outcome.instances_removed, 1);
    assert!(store.get_instance("other:BBBB")?.is_none());
    assert!(store.get_instance("relaytest:BBBB")?.is_some());
    Ok(())
}

#[test]
fn reserved_pseudo_instances_are_skipped() -> anyhow::Result<()> {
    let store = Store::open_in_memory()?;
    let payload = payload_from(
        "BBBB",
        &[("relaytest", 0)],
        vec![
            remote_event(1, "_device", "internal", &[]),
            remote_event(2, "relaytest", "real", &[]),
        ],
    );
    let outcome = import_device_state(&store, &own(), DEV_B, &payload)?;
    assert_eq!(outcome.events_imported, 1);
    // The skipped id still advances the floor.
    assert_eq!(store.kv_get_i64(&kv_events_key(DEV_B))?, 2);
    Ok(())
}

#[test]
fn device_gone_clears_rows_and_short_claim() -> anyhow::Result<()> {
    let store = Store::open_in_memory()?;
    let payload = payload_from("BBBB", &[("relaytest", 0)], vec![]);
    import_device_state(&store, &own(), DEV_B, &payload)?;
    assert!(store.get_instance("relaytest:BBBB")?.is_some());
    assert_eq!(store.kv_get(&kv_short_key("BBBB"))?.as_deref(), Some(DEV_B));

    handle_device_gone(&store, DEV_B)?;
    assert!(store.get_instance("relaytest:BBBB")?.is_none());
    assert!(store.kv_get(&kv_short_key("BBBB"))?.is_none());
    Ok(())
}

#[test]
fn own_echo_is_discarded() -> anyhow::Result<()> {
    let store = Store::open_in_memory()?;
    let outcome = handle_message(&store, &own(), "dev-a-uuid", b"{}")?;
    assert!(outcome.discarded);
    Ok(())
}

#[test]
fn empty_payload_routes_to_device_gone() -> anyhow::Result<()> {
    let store = Store::open_in_memory()?;
    let payload = payload_from("BBBB", &[("relaytest", 0)], vec![]);
    import_device_state(&store, &own(), DEV_B, &payload)?;

    handle_message(&store, &own(), DEV_B, b"")?;
    assert!(store.get_instance("relaytest:BBBB")?.is_none());
    Ok(())
}

#[test]
fn local_reset_floor_drops_older_remote_events() -> anyhow::Result<()> {
    let store = Store::open_in_memory()?;
    // Local reset at a time after the remote event's timestamp.
    store.kv_set("relay_local_reset_ts", Some("1900000000"))?;

    let mut old = remote_event(9, "relaytest", "from before your reset", &[]);
    old.ts = "2026-03-01T10:00:00Z".into(); // epoch ~1772000000 < floor
    let payload = payload_from("BBBB", &[("relaytest", 0)], vec![old]);
    let outcome = import_device_state(&store, &own(), DEV_B, &payload)?;
    assert_eq!(outcome.events_imported, 0);
    // Floor still advances so the event is not retried forever.
    assert_eq!(store.kv_get_i64(&kv_events_key(DEV_B))?, 9);
    Ok(())
}
