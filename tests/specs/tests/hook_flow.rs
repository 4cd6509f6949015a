// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hook-driven status flow: blocked/approved transitions and subagent
//! suppression.

use serde_json::json;

use huddle::hooks::{dispatch, HookInput, HookKind};
use huddle::status::Status;
use huddle::store::{InstancePatch, RunningTasks};
use huddle_specs::{seed_instance, seed_session_binding, Workspace};

fn hook_input(session: &str, fields: serde_json::Value) -> anyhow::Result<HookInput> {
    let mut base = json!({"session_id": session, "transcript_path": "/tmp/transcript.jsonl"});
    if let (Some(obj), Some(extra)) = (base.as_object_mut(), fields.as_object()) {
        for (k, v) in extra {
            obj.insert(k.clone(), v.clone());
        }
    }
    Ok(serde_json::from_value(base)?)
}

#[test]
fn notification_in_subagent_context_is_suppressed() -> anyhow::Result<()> {
    let ws = Workspace::new()?;
    let store = ws.store()?;
    seed_instance(&store, "alpha")?;
    seed_session_binding(&store, "sess-sub", "alpha")?;

    let tasks: RunningTasks = serde_json::from_value(json!({
        "active": true,
        "subagents": [{"agent_id": "task-1", "type": "explore"}],
    }))?;
    store.update_instance(
        "alpha",
        &InstancePatch { running_tasks: Some(tasks), ..InstancePatch::default() },
    )?;

    dispatch(
        &ws.ctx,
        HookKind::Notify,
        &hook_input(
            "sess-sub",
            json!({"hook_event_name": "Notification", "message": "Permission denied"}),
        )?,
    )?;

    let row = store
        .get_instance("alpha")?
        .ok_or_else(|| anyhow::anyhow!("row missing"))?;
    assert_ne!(row.status, Status::Blocked);
    Ok(())
}

#[test]
fn blocked_then_approved_round_trip() -> anyhow::Result<()> {
    let ws = Workspace::new()?;
    let store = ws.store()?;
    seed_instance(&store, "alpha")?;
    seed_session_binding(&store, "sess-1", "alpha")?;

    dispatch(
        &ws.ctx,
        HookKind::Notify,
        &hook_input(
            "sess-1",
            json!({"hook_event_name": "Notification", "message": "Permission denied"}),
        )?,
    )?;
    let row = store
        .get_instance("alpha")?
        .ok_or_else(|| anyhow::anyhow!("row missing"))?;
    assert_eq!(row.status, Status::Blocked);
    assert_eq!(row.status_context, "Permission denied");

    dispatch(
        &ws.ctx,
        HookKind::Post,
        &hook_input(
            "sess-1",
            json!({"hook_event_name": "PostToolUse", "tool_name": "Bash",
                   "tool_input": {"command": "echo noop"}, "tool_response": {"ok": true}}),
        )?,
    )?;
    let row = store
        .get_instance("alpha")?
        .ok_or_else(|| anyhow::anyhow!("row missing"))?;
    assert_eq!(row.status, Status::Active);
    assert_eq!(row.status_context, "approved:Bash");
    Ok(())
}

#[test]
fn hook_batch_delivers_pending_messages_inline() -> anyhow::Result<()> {
    let ws = Workspace::new()?;
    let store = ws.store()?;
    seed_instance(&store, "alpha")?;
    seed_instance(&store, "bravo")?;
    seed_session_binding(&store, "sess-1", "alpha")?;

    huddle::command::send::send_message(
        &store,
        "bravo",
        &huddle::command::send::SendArgs {
            text: "@alpha ready when you are".into(),
            ..Default::default()
        },
    )?;

    let out = dispatch(
        &ws.ctx,
        HookKind::Stop,
        &hook_input("sess-1", json!({"hook_event_name": "Stop"}))?,
    )?;
    assert!(out.contains("ready when you are"));
    assert!(out.contains("[bravo"));

    // Acknowledged: a second stop hook delivers nothing.
    let again = dispatch(
        &ws.ctx,
        HookKind::Stop,
        &hook_input("sess-1", json!({"hook_event_name": "Stop"}))?,
    )?;
    assert!(again.is_empty());
    Ok(())
}
