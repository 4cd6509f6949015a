// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Two-workspace relay scenarios: device A's push payload imported on
//! device B, namespacing and reset propagation end to end. No broker —
//! the payload goes straight from builder to importer.

use huddle::command::send::{send_message, SendArgs};
use huddle::deliver::deliver;
use huddle::relay::device::DeviceIdentity;
use huddle::relay::import::import_device_state;
use huddle::relay::payload::{build_push, mark_pushed};
use huddle_specs::{seed_instance, Workspace};

fn dev_a() -> DeviceIdentity {
    DeviceIdentity { uuid: "device-a-uuid".into(), short: "AAAA".into() }
}

fn dev_b() -> DeviceIdentity {
    DeviceIdentity { uuid: "device-b-uuid".into(), short: "BBBB".into() }
}

#[test]
fn relay_namespacing_end_to_end() -> anyhow::Result<()> {
    let a = Workspace::new()?;
    let b = Workspace::new()?;
    let store_a = a.store()?;
    let store_b = b.store()?;

    seed_instance(&store_a, "relaytest")?;
    send_message(
        &store_a,
        "relaytest",
        &SendArgs { text: "hello from A".into(), ..SendArgs::default() },
    )?;

    let batch = build_push(&store_a, &dev_a(), false)?
        .ok_or_else(|| anyhow::anyhow!("nothing to push"))?;
    mark_pushed(&store_a, &batch)?;

    let outcome = import_device_state(&store_b, &dev_b(), "device-a-uuid", &batch.payload)?;
    assert!(outcome.instances_upserted >= 1);

    // On B: only the namespaced row, and the message carries provenance.
    assert!(store_b.get_instance("relaytest")?.is_none());
    assert!(store_b.get_instance("relaytest:AAAA")?.is_some());

    let events = store_b.events_after(0, &[huddle::event::EventType::Message], 0)?;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].data["from"], "relaytest:AAAA");
    assert_eq!(events[0].data["_relay"]["short"], "AAAA");
    assert_eq!(events[0].data["_relay"]["device"], "device-a-uuid");
    Ok(())
}

#[test]
fn cross_device_mention_reaches_local_instance() -> anyhow::Result<()> {
    let a = Workspace::new()?;
    let b = Workspace::new()?;
    let store_a = a.store()?;
    let store_b = b.store()?;

    // B has a local instance luna; A addresses it by composite key.
    seed_instance(&store_b, "luna")?;
    seed_instance(&store_a, "relaytest")?;
    // A learned about luna through an earlier import.
    let mut remote_row = huddle::store::InstanceRow::new("luna:BBBB");
    remote_row.origin_device_id = "device-b-uuid".into();
    store_a.insert_instance(&remote_row)?;

    send_message(
        &store_a,
        "relaytest",
        &SendArgs { text: "@luna:BBBB ping across".into(), ..SendArgs::default() },
    )?;

    let batch = build_push(&store_a, &dev_a(), false)?
        .ok_or_else(|| anyhow::anyhow!("nothing to push"))?;
    import_device_state(&store_b, &dev_b(), "device-a-uuid", &batch.payload)?;

    // B's own suffix was stripped: the mention is plain "luna" locally.
    let delivery = deliver(&store_b, "luna", true)?;
    assert_eq!(delivery.messages.len(), 1);
    assert!(delivery.messages[0].text.contains("ping across"));
    assert!(delivery.messages[0].text.contains("relaytest:AAAA"));
    Ok(())
}

#[test]
fn remote_reset_removes_imported_rows_before_new_events() -> anyhow::Result<()> {
    let a = Workspace::new()?;
    let b = Workspace::new()?;
    let store_a = a.store()?;
    let store_b = b.store()?;

    seed_instance(&store_a, "relaytest")?;
    send_message(
        &store_a,
        "relaytest",
        &SendArgs { text: "old world".into(), ..SendArgs::default() },
    )?;
    let batch = build_push(&store_a, &dev_a(), false)?
        .ok_or_else(|| anyhow::anyhow!("nothing to push"))?;
    import_device_state(&store_b, &dev_b(), "device-a-uuid", &batch.payload)?;
    assert!(store_b.get_instance("relaytest:AAAA")?.is_some());

    // A resets and starts a new life.
    store_a.reset()?;
    seed_instance(&store_a, "phoenix")?;
    send_message(
        &store_a,
        "phoenix",
        &SendArgs { text: "new world".into(), ..SendArgs::default() },
    )?;
    let batch = build_push(&store_a, &dev_a(), false)?
        .ok_or_else(|| anyhow::anyhow!("nothing to push"))?;
    import_device_state(&store_b, &dev_b(), "device-a-uuid", &batch.payload)?;

    assert!(store_b.get_instance("relaytest:AAAA")?.is_none(), "pre-reset row removed");
    assert!(store_b.get_instance("phoenix:AAAA")?.is_some());
    let texts: Vec<String> = store_b
        .events_after(0, &[huddle::event::EventType::Message], 0)?
        .iter()
        .filter_map(|e| e.data.get("text").and_then(|t| t.as_str()).map(str::to_owned))
        .collect();
    assert!(!texts.contains(&"old world".to_owned()));
    assert!(texts.contains(&"new world".to_owned()));
    Ok(())
}
