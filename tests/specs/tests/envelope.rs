// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Envelope semantics: ack validation and thread inheritance.

use huddle::command::send::{send_message, SendArgs};
use huddle::error::CliError;
use huddle::event::EventType;
use huddle_specs::{seed_instance, Workspace};

#[test]
fn ack_without_reply_to_is_exit_1_and_unlogged() -> anyhow::Result<()> {
    let ws = Workspace::new()?;
    let store = ws.store()?;
    seed_instance(&store, "alpha")?;
    seed_instance(&store, "bravo")?;

    let args = SendArgs {
        intent: Some("ack".into()),
        text: "@bravo ok".into(),
        ..SendArgs::default()
    };
    let err = send_message(&store, "alpha", &args)
        .err()
        .ok_or_else(|| anyhow::anyhow!("expected rejection"))?;
    let cli = err
        .downcast_ref::<CliError>()
        .ok_or_else(|| anyhow::anyhow!("expected CliError"))?;
    assert_eq!(cli.exit_code(), 1);
    assert!(cli.to_string().contains("requires --reply-to"));

    assert!(store.events_after(0, &[EventType::Message], 0)?.is_empty());
    Ok(())
}

#[test]
fn thread_inheritance_from_reply_to() -> anyhow::Result<()> {
    let ws = Workspace::new()?;
    let store = ws.store()?;
    seed_instance(&store, "alpha")?;
    seed_instance(&store, "bravo")?;

    let parent = SendArgs {
        intent: Some("request".into()),
        thread: Some("t1".into()),
        text: "@bravo parent-msg".into(),
        ..SendArgs::default()
    };
    let parent_out = send_message(&store, "alpha", &parent)?;

    let child = SendArgs {
        intent: Some("ack".into()),
        reply_to: Some(parent_out.event_id),
        text: "@alpha ack-msg".into(),
        ..SendArgs::default()
    };
    let child_out = send_message(&store, "bravo", &child)?;
    assert!(child_out.event_id > parent_out.event_id);

    let event = store
        .get_event(child_out.event_id)?
        .ok_or_else(|| anyhow::anyhow!("event missing"))?;
    let msg = event.message().ok_or_else(|| anyhow::anyhow!("not a message"))?;
    assert_eq!(msg.intent.map(|i| i.as_str()), Some("ack"));
    assert_eq!(msg.reply_to_local, Some(parent_out.event_id));
    assert_eq!(msg.thread.as_deref(), Some("t1"));
    Ok(())
}
