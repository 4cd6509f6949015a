// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hook dispatcher: the subprocess entry the agent tools invoke.
//!
//! Stdin carries one JSON object; stdout carries the formatted message
//! batch for inline injection (empty when there is nothing). Hook-path
//! errors are never fatal to the agent — the dispatcher logs and exits 0
//! on best-effort failure. Before reading the body at all, a fast-path
//! gate checks whether any participants exist.

use std::io::Read;

use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::context::Context;
use crate::deliver;
use crate::event::EventType;
use crate::identity::{self, Identity};
use crate::status::{self, Status};
use crate::store::{InstancePatch, Store, SubagentRef};

/// Which hook subcommand was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    Pre,
    Post,
    Notify,
    SessionStart,
    UserPromptSubmit,
    Stop,
    SessionEnd,
    SubagentStart,
    SubagentStop,
}

/// Parsed hook stdin. Tool-specific fields are optional; anything else
/// lands in `extra`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HookInput {
    pub hook_event_name: String,
    pub session_id: String,
    pub transcript_path: Option<String>,
    pub tool_name: Option<String>,
    pub tool_input: Option<Value>,
    pub tool_response: Option<Value>,
    pub message: Option<String>,
    pub agent_id: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Full hook entry: gate, read stdin, dispatch, print. Always returns 0.
pub fn run(ctx: &Context, kind: HookKind) -> i32 {
    // Fast-path gate: skip before reading the body when nobody is here.
    if Store::gate_check(&ctx.dirs.db_path()) == Some(false) {
        return 0;
    }

    let mut body = String::new();
    if std::io::stdin().read_to_string(&mut body).is_err() {
        return 0;
    }
    let input: HookInput = match serde_json::from_str(&body) {
        Ok(input) => input,
        Err(e) => {
            warn!("malformed hook input: {e}");
            return 0;
        }
    };

    match dispatch(ctx, kind, &input) {
        Ok(output) => {
            if !output.is_empty() {
                println!("{output}");
            }
        }
        Err(e) => warn!("hook dispatch failed: {e:#}"),
    }
    0
}

/// Dispatch one hook event. Returns the stdout batch.
pub fn dispatch(ctx: &Context, kind: HookKind, input: &HookInput) -> Result<String> {
    let store = ctx.store()?;

    if kind == HookKind::SessionStart {
        return session_start(&store, input);
    }

    let Some(id) = identity::resolve_hook(&store, &input.session_id)? else {
        // Unbound session: nothing to do, never an error.
        return Ok(String::new());
    };

    match kind {
        HookKind::Pre => {
            let tool = input.tool_name.as_deref().unwrap_or("?");
            status::apply(&store, &id.name, Status::Active, format!("tool:{tool}"), "")?;
            Ok(String::new())
        }
        HookKind::Post => {
            let tool = input.tool_name.as_deref().unwrap_or("?");
            status::apply(&store, &id.name, Status::Active, format!("approved:{tool}"), "")?;
            store.log_event(
                EventType::Tool,
                &id.name,
                &json!({
                    "name": tool,
                    "input": input.tool_input,
                    "response": input.tool_response,
                }),
            )?;
            Ok(deliver::deliver(&store, &id.name, true)?.render())
        }
        HookKind::Notify => {
            let reason = input.message.clone().unwrap_or_default();
            if id.row.as_ref().is_some_and(|r| r.running_tasks.active) {
                // The prompt belongs to a transient subagent; a blocked
                // status would stick on the parent after it resolves.
                return Ok(String::new());
            }
            status::apply(&store, &id.name, Status::Blocked, reason, "")?;
            Ok(String::new())
        }
        HookKind::UserPromptSubmit => {
            status::apply(&store, &id.name, Status::Active, "prompt", "")?;
            Ok(deliver::deliver(&store, &id.name, true)?.render())
        }
        HookKind::Stop => {
            status::apply(&store, &id.name, Status::Listening, "idle", "")?;
            Ok(deliver::deliver(&store, &id.name, true)?.render())
        }
        HookKind::SessionEnd => {
            status::apply(&store, &id.name, Status::Inactive, "session:end", "")?;
            Ok(String::new())
        }
        HookKind::SubagentStart => {
            subagent_start(&store, &id, input)?;
            Ok(String::new())
        }
        HookKind::SubagentStop => {
            subagent_stop(&store, &id, input)?;
            Ok(String::new())
        }
        HookKind::SessionStart => Ok(String::new()),
    }
}

/// Bind the launcher-provided name to this session and mark it active.
fn session_start(store: &Store, input: &HookInput) -> Result<String> {
    let Some(name) = std::env::var("HUDDLE_NAME").ok().filter(|v| !v.is_empty()) else {
        return Ok(String::new());
    };
    if store.get_instance(&name)?.is_none() {
        return Ok(String::new());
    }
    if !input.session_id.is_empty() {
        if let Err(e) = identity::bind_session(store, &input.session_id, &name, false) {
            warn!("session bind skipped: {e}");
            return Ok(String::new());
        }
        store.update_instance(
            &name,
            &InstancePatch {
                session_id: Some(input.session_id.clone()),
                transcript_path: input.transcript_path.clone(),
                ..InstancePatch::default()
            },
        )?;
    }
    status::apply(store, &name, Status::Active, "session:start", "")?;
    Ok(String::new())
}

fn subagent_start(store: &Store, id: &Identity, input: &HookInput) -> Result<()> {
    let Some(agent_id) = input.agent_id.clone().filter(|v| !v.is_empty()) else {
        return Ok(());
    };
    let Some(row) = store.get_instance(&id.name)? else {
        return Ok(());
    };
    let mut tasks = row.running_tasks;
    if !tasks.subagents.iter().any(|s| s.agent_id == agent_id) {
        let kind = input
            .extra
            .get("agent_type")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_owned();
        tasks.subagents.push(SubagentRef { agent_id, kind });
    }
    tasks.active = true;
    store.update_instance(
        &id.name,
        &InstancePatch { running_tasks: Some(tasks), ..InstancePatch::default() },
    )?;
    Ok(())
}

/// Remove the subagent from the parent's tracking even when the subagent
/// never registered an instance of its own (ghost cleanup).
fn subagent_stop(store: &Store, id: &Identity, input: &HookInput) -> Result<()> {
    let Some(agent_id) = input.agent_id.clone().filter(|v| !v.is_empty()) else {
        return Ok(());
    };
    let Some(row) = store.get_instance(&id.name)? else {
        return Ok(());
    };
    let mut tasks = row.running_tasks;
    tasks.subagents.retain(|s| s.agent_id != agent_id);
    if tasks.subagents.is_empty() {
        tasks.active = false;
    }
    store.update_instance(
        &id.name,
        &InstancePatch { running_tasks: Some(tasks), ..InstancePatch::default() },
    )?;
    Ok(())
}

#[cfg(test)]
#[path = "hooks_tests.rs"]
mod tests;
