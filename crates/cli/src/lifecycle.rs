// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Instance lifecycle: register, stop (with terminal snapshot), resume.
//!
//! Shared by the CLI subcommands and the relay control path — a remote
//! `stop` control event runs the same code as `huddle stop`.

use anyhow::Result;
use serde_json::json;
use uuid::Uuid;

use crate::error::CliError;
use crate::event::{iso_now, EventType};
use crate::status::Status;
use crate::store::{InstanceRow, Store};
use crate::wake;

/// Name pool for unnamed registrations.
const NAMES: &[&str] = &[
    "luna", "nova", "kira", "vega", "echo", "iris", "mira", "rhea", "zane", "odin", "pax",
    "remy", "sol", "tali", "uma", "wren",
];

/// Pick an unused short name. Falls back to numeric suffixes when the
/// pool is taken.
pub fn generate_name(store: &Store) -> Result<String> {
    // uuid bytes as the entropy source — good enough for name picking.
    let seed = Uuid::new_v4();
    let offset = seed.as_bytes()[0] as usize;
    for i in 0..NAMES.len() {
        let candidate = NAMES[(offset + i) % NAMES.len()];
        if store.get_instance(candidate)?.is_none() {
            return Ok(candidate.to_owned());
        }
    }
    let mut n = 2_u64;
    loop {
        let candidate = format!("{}{n}", NAMES[offset % NAMES.len()]);
        if store.get_instance(&candidate)?.is_none() {
            return Ok(candidate);
        }
        n += 1;
    }
}

/// Validate a user-supplied instance name. Colons are reserved for the
/// relay's device suffix, underscores for subagent segments, and a
/// leading `_` for system pseudo-instances.
pub fn validate_name(name: &str) -> Result<(), CliError> {
    if name.is_empty() {
        return Err(CliError::Input("instance name must not be empty".into()));
    }
    if name.starts_with('_') {
        return Err(CliError::Input("names starting with '_' are reserved".into()));
    }
    if name.contains(':') {
        return Err(CliError::Input("':' in names is reserved for remote devices".into()));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(CliError::Input(format!("invalid instance name: {name}")));
    }
    Ok(())
}

/// Register a new instance: roster row plus a `life/started` event.
pub fn register_instance(store: &Store, row: &InstanceRow) -> Result<()> {
    if store.get_instance(&row.name)?.is_some() {
        return Err(CliError::Input(format!("'{}' is already registered", row.name)).into());
    }
    store.insert_instance(row)?;
    store.log_event(EventType::Life, &row.name, &json!({"action": "started"}))?;
    Ok(())
}

/// Stop an instance: write the terminal snapshot event, drop its
/// endpoints and roster row, then wake the listeners that were attached
/// so their waits return promptly.
pub fn stop_instance(store: &Store, name: &str) -> Result<bool> {
    let Some(mut row) = store.get_instance(name)? else {
        return Ok(false);
    };
    row.status = Status::Inactive;
    row.last_stop = Some(iso_now());

    store.log_event(
        EventType::Life,
        name,
        &json!({"action": "stopped", "snapshot": serde_json::to_value(&row)?}),
    )?;

    let ports = store.list_notify_ports(name)?;
    store.delete_notify_endpoint(name, None)?;
    store.delete_instance(name)?;

    // The rows are gone; fire-and-forget with no pruning.
    wake::notify_ports(&ports);
    Ok(true)
}

/// Resume a stopped instance from its snapshot. The cursor is restored
/// verbatim, so messages sent while stopped replay on the next delivery
/// (no cap is applied).
pub fn resume_instance(store: &Store, name: &str) -> Result<InstanceRow> {
    if store.get_instance(name)?.is_some() {
        return Err(CliError::Input(format!(
            "'{name}' is still active — run huddle stop {name} first"
        ))
        .into());
    }
    let Some(mut row) = store.stopped_snapshot_load(name)? else {
        return Err(CliError::NotFound(format!("'{name}' not found in stopped instances")).into());
    };

    row.status = Status::Listening;
    row.status_context = "resumed".into();
    row.status_time = crate::event::epoch_now();
    store.insert_instance(&row)?;
    store.log_event(EventType::Life, name, &json!({"action": "started", "resumed": true}))?;
    Ok(row)
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
