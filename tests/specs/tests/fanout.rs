// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-device fan-out and tag broadcast scenarios.

use huddle::command::send::{send_message, SendArgs};
use huddle::deliver::deliver;
use huddle_specs::{seed_instance, seed_tagged, Workspace};

fn send(text: &str) -> SendArgs {
    SendArgs { text: text.into(), ..SendArgs::default() }
}

#[test]
fn single_device_fanout() -> anyhow::Result<()> {
    let ws = Workspace::new()?;
    let store = ws.store()?;
    for name in ["alpha", "bravo", "gamma"] {
        seed_instance(&store, name)?;
    }

    let outcome = send_message(&store, "alpha", &send("@bravo @gamma hello"))?;
    let event = store
        .get_event(outcome.event_id)?
        .ok_or_else(|| anyhow::anyhow!("event missing"))?;
    let msg = event.message().ok_or_else(|| anyhow::anyhow!("not a message"))?;
    assert_eq!(msg.mentions, vec!["bravo", "gamma"]);

    let bravo = deliver(&store, "bravo", true)?;
    assert_eq!(bravo.messages.len(), 1);
    assert!(bravo.messages[0].text.contains("hello"));
    assert_eq!(bravo.new_cursor, outcome.event_id);

    let gamma = deliver(&store, "gamma", true)?;
    assert_eq!(gamma.messages.len(), 1);

    let alpha = deliver(&store, "alpha", true)?;
    assert!(alpha.messages.is_empty());
    Ok(())
}

#[test]
fn tag_broadcast() -> anyhow::Result<()> {
    let ws = Workspace::new()?;
    let store = ws.store()?;
    seed_tagged(&store, "api-luna", "api")?;
    seed_tagged(&store, "api-nova", "api")?;
    seed_tagged(&store, "web-kira", "web")?;

    let outcome = send_message(&store, "web-kira", &send("@api- deploy"))?;
    let event = store
        .get_event(outcome.event_id)?
        .ok_or_else(|| anyhow::anyhow!("event missing"))?;
    let msg = event.message().ok_or_else(|| anyhow::anyhow!("not a message"))?;
    assert_eq!(msg.mentions, vec!["api-luna", "api-nova"]);

    assert_eq!(deliver(&store, "api-luna", true)?.messages.len(), 1);
    assert_eq!(deliver(&store, "api-nova", true)?.messages.len(), 1);
    assert!(deliver(&store, "web-kira", true)?.messages.is_empty());
    Ok(())
}

#[test]
fn cursors_never_regress_across_many_deliveries() -> anyhow::Result<()> {
    let ws = Workspace::new()?;
    let store = ws.store()?;
    seed_instance(&store, "alpha")?;
    seed_instance(&store, "bravo")?;

    let mut last_cursor = 0;
    for i in 0..10 {
        send_message(&store, "alpha", &send(&format!("@bravo msg {i}")))?;
        let delivery = deliver(&store, "bravo", true)?;
        assert!(delivery.new_cursor >= last_cursor);
        last_cursor = delivery.new_cursor;
    }
    let row = store
        .get_instance("bravo")?
        .ok_or_else(|| anyhow::anyhow!("row missing"))?;
    assert_eq!(row.last_event_id, last_cursor);
    Ok(())
}
