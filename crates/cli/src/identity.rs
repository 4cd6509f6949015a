// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identity resolution: "who is speaking" for a CLI command or hook.
//!
//! Resolution order: explicit `--name`, then the `HUDDLE_NAME` env
//! marker set by the launcher, then (hooks only) the session binding in
//! KV. Bindings are single-valued — rebinding a session id to another
//! instance requires the explicit rebind path.

use anyhow::Result;

use crate::error::CliError;
use crate::store::{InstanceRow, Store};

const SESSION_KEY_PREFIX: &str = "session:";

/// Who was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKind {
    /// A registered instance.
    Instance,
    /// A human or script outside the roster.
    External,
}

/// Resolved identity for one invocation.
#[derive(Debug, Clone)]
pub struct Identity {
    pub kind: IdentityKind,
    pub name: String,
    pub row: Option<InstanceRow>,
    pub session_id: Option<String>,
}

fn session_key(session_id: &str) -> String {
    format!("{SESSION_KEY_PREFIX}{session_id}")
}

/// Look up the instance bound to a tool session id.
pub fn lookup_session(store: &Store, session_id: &str) -> Result<Option<String>> {
    store.kv_get(&session_key(session_id))
}

/// Bind a session id to an instance. Fails when the id is already bound
/// to a different instance, unless `rebind` is set.
pub fn bind_session(
    store: &Store,
    session_id: &str,
    name: &str,
    rebind: bool,
) -> Result<(), anyhow::Error> {
    if let Some(existing) = lookup_session(store, session_id)? {
        if existing != name && !rebind {
            return Err(CliError::Input(format!(
                "session already bound to '{existing}'"
            ))
            .into());
        }
    }
    store.kv_set(&session_key(session_id), Some(name))?;
    Ok(())
}

/// Remove a session binding.
pub fn unbind_session(store: &Store, session_id: &str) -> Result<()> {
    store.kv_set(&session_key(session_id), None)
}

/// Resolve the sender identity for a CLI command.
pub fn resolve(store: &Store, explicit: Option<&str>) -> Result<Identity, anyhow::Error> {
    let from_env = std::env::var("HUDDLE_NAME").ok().filter(|v| !v.is_empty());
    let Some(name) = explicit.map(str::to_owned).or(from_env) else {
        return Err(CliError::Identity(
            "no identity: not a registered instance".to_owned(),
        )
        .into());
    };

    let row = store.get_instance(&name)?;
    let kind = if row.is_some() { IdentityKind::Instance } else { IdentityKind::External };
    Ok(Identity { kind, name, row, session_id: None })
}

/// Resolve the instance behind a hook invocation via its session binding.
pub fn resolve_hook(store: &Store, session_id: &str) -> Result<Option<Identity>> {
    let Some(name) = lookup_session(store, session_id)? else {
        return Ok(None);
    };
    let Some(row) = store.get_instance(&name)? else {
        // Stale binding: the instance was stopped out from under it.
        return Ok(None);
    };
    Ok(Some(Identity {
        kind: IdentityKind::Instance,
        name,
        row: Some(row),
        session_id: Some(session_id.to_owned()),
    }))
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
