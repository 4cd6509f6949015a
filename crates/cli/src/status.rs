// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-instance status state machine.
//!
//! Transitions are driven by hooks, delivery and explicit CLI actions.
//! `status_time` is stamped on every transition; a `status` event is
//! logged only when the status value actually changes, so subscription
//! presets (`blocked`, `idle`) observe transitions without flooding the
//! log on same-state refreshes.

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::CliError;
use crate::event::{epoch_now, EventType};
use crate::store::{InstancePatch, Store};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Executing its turn.
    Active,
    /// In its wait loop, reads new messages quickly.
    Listening,
    /// Needs external approval; reason in `status_context`.
    Blocked,
    /// Stopped or unreachable.
    Inactive,
    /// Initial / neutral.
    #[default]
    Unknown,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Listening => "listening",
            Self::Blocked => "blocked",
            Self::Inactive => "inactive",
            Self::Unknown => "unknown",
        }
    }

    /// Roster glyph used by `huddle list`.
    pub fn glyph(&self) -> &'static str {
        match self {
            Self::Active => "▶",
            Self::Listening => "◉",
            Self::Blocked => "■",
            Self::Inactive => "○",
            Self::Unknown => "◦",
        }
    }
}

impl FromStr for Status {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "listening" => Ok(Self::Listening),
            "blocked" => Ok(Self::Blocked),
            "inactive" => Ok(Self::Inactive),
            "unknown" => Ok(Self::Unknown),
            other => Err(CliError::Input(format!("invalid status: {other}"))),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Apply a transition to `name`: update the row, stamp `status_time`,
/// and log a `status` event when the value changed.
///
/// Returns false when the instance does not exist.
pub fn apply(
    store: &Store,
    name: &str,
    to: Status,
    context: impl Into<String>,
    detail: impl Into<String>,
) -> Result<bool> {
    let Some(row) = store.get_instance(name)? else {
        return Ok(false);
    };
    let from = row.status;

    let patch = InstancePatch {
        status: Some(to),
        status_context: Some(context.into()),
        status_detail: Some(detail.into()),
        status_time: Some(epoch_now()),
        ..InstancePatch::default()
    };
    store.update_instance(name, &patch)?;

    if from != to {
        store.log_event(
            EventType::Status,
            name,
            &json!({"from": from.as_str(), "to": to.as_str()}),
        )?;
    }
    Ok(true)
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
