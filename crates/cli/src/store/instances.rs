// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Roster rows: the mutable per-instance state keyed by name.
//!
//! Local rows have an empty `origin_device_id` and no colon in the name;
//! relay-imported rows are keyed `name:SHORT` and carry the remote device
//! UUID. Serde derives exist because full rows travel inside stopped
//! snapshots and relay payloads.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context as _, Result};
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use crate::error::CliError;
use crate::event::{epoch_now, iso_now};
use crate::status::Status;

use super::Store;

/// Agent tool driving an instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Claude,
    Gemini,
    Codex,
    #[default]
    Adhoc,
}

impl Tool {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Gemini => "gemini",
            Self::Codex => "codex",
            Self::Adhoc => "adhoc",
        }
    }
}

impl FromStr for Tool {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "claude" => Ok(Self::Claude),
            "gemini" => Ok(Self::Gemini),
            "codex" => Ok(Self::Codex),
            "adhoc" => Ok(Self::Adhoc),
            other => Err(CliError::Input(format!("invalid tool: {other}"))),
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A subagent tracked under a parent instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubagentRef {
    pub agent_id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// Subagent bookkeeping stored as JSON in the `running_tasks` column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningTasks {
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub subagents: Vec<SubagentRef>,
}

/// One roster row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceRow {
    pub name: String,
    pub status: Status,
    pub status_context: String,
    pub status_detail: String,
    pub status_time: i64,
    pub last_event_id: i64,
    pub tag: Option<String>,
    pub tool: Tool,
    pub background: bool,
    pub session_id: Option<String>,
    pub parent_session_id: Option<String>,
    pub agent_id: Option<String>,
    pub parent_name: Option<String>,
    pub directory: String,
    pub transcript_path: String,
    pub wait_timeout: i64,
    pub subagent_timeout: i64,
    pub hints: String,
    pub origin_device_id: String,
    pub tcp_mode: bool,
    pub running_tasks: RunningTasks,
    pub broadcast_listen: bool,
    pub created_at: String,
    pub last_stop: Option<String>,
}

impl Default for InstanceRow {
    fn default() -> Self {
        Self {
            name: String::new(),
            status: Status::Unknown,
            status_context: String::new(),
            status_detail: String::new(),
            status_time: 0,
            last_event_id: 0,
            tag: None,
            tool: Tool::Adhoc,
            background: false,
            session_id: None,
            parent_session_id: None,
            agent_id: None,
            parent_name: None,
            directory: String::new(),
            transcript_path: String::new(),
            wait_timeout: 60,
            subagent_timeout: 300,
            hints: String::new(),
            origin_device_id: String::new(),
            tcp_mode: true,
            running_tasks: RunningTasks::default(),
            broadcast_listen: false,
            created_at: String::new(),
            last_stop: None,
        }
    }
}

impl InstanceRow {
    /// Fresh local row with the given name and now-stamps.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status_time: epoch_now(),
            created_at: iso_now(),
            ..Self::default()
        }
    }

    /// True when this row was imported from another device.
    pub fn is_remote(&self) -> bool {
        !self.origin_device_id.is_empty()
    }

    /// Display name including the tag group when present.
    pub fn display_name(&self) -> String {
        match &self.tag {
            Some(tag) if !tag.is_empty() && !self.name.starts_with(&format!("{tag}-")) => {
                format!("{tag}-{}", self.name)
            }
            _ => self.name.clone(),
        }
    }
}

/// Filters for [`Store::iter_instances`].
#[derive(Debug, Clone, Default)]
pub struct InstanceFilter {
    pub tag: Option<String>,
    pub tool: Option<Tool>,
    pub status: Option<Status>,
    pub local_only: bool,
}

/// Partial update applied under the write lock.
///
/// Deserializing from JSON rejects unknown keys, so dynamic callers cannot
/// invent columns. `last_event_id` is applied through a `MAX()` guard —
/// cursors never regress via patching.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InstancePatch {
    pub status: Option<Status>,
    pub status_context: Option<String>,
    pub status_detail: Option<String>,
    pub status_time: Option<i64>,
    pub last_event_id: Option<i64>,
    pub tag: Option<String>,
    pub session_id: Option<String>,
    pub transcript_path: Option<String>,
    pub wait_timeout: Option<i64>,
    pub subagent_timeout: Option<i64>,
    pub hints: Option<String>,
    pub running_tasks: Option<RunningTasks>,
    pub broadcast_listen: Option<bool>,
    pub last_stop: Option<String>,
}

impl InstancePatch {
    /// Parse a JSON object into a patch, rejecting unknown keys.
    pub fn from_value(value: serde_json::Value) -> Result<Self, CliError> {
        serde_json::from_value(value).map_err(|e| CliError::Input(format!("invalid patch: {e}")))
    }

    fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.status_context.is_none()
            && self.status_detail.is_none()
            && self.status_time.is_none()
            && self.last_event_id.is_none()
            && self.tag.is_none()
            && self.session_id.is_none()
            && self.transcript_path.is_none()
            && self.wait_timeout.is_none()
            && self.subagent_timeout.is_none()
            && self.hints.is_none()
            && self.running_tasks.is_none()
            && self.broadcast_listen.is_none()
            && self.last_stop.is_none()
    }
}

pub(super) fn map_row(row: &Row<'_>) -> rusqlite::Result<InstanceRow> {
    let status: String = row.get("status")?;
    let tool: String = row.get("tool")?;
    let running_tasks: String = row.get("running_tasks")?;
    Ok(InstanceRow {
        name: row.get("name")?,
        status: status.parse().unwrap_or(Status::Unknown),
        status_context: row.get("status_context")?,
        status_detail: row.get("status_detail")?,
        status_time: row.get("status_time")?,
        last_event_id: row.get("last_event_id")?,
        tag: row.get("tag")?,
        tool: tool.parse().unwrap_or_default(),
        background: row.get("background")?,
        session_id: row.get("session_id")?,
        parent_session_id: row.get("parent_session_id")?,
        agent_id: row.get("agent_id")?,
        parent_name: row.get("parent_name")?,
        directory: row.get("directory")?,
        transcript_path: row.get("transcript_path")?,
        wait_timeout: row.get("wait_timeout")?,
        subagent_timeout: row.get("subagent_timeout")?,
        hints: row.get("hints")?,
        origin_device_id: row.get("origin_device_id")?,
        tcp_mode: row.get("tcp_mode")?,
        running_tasks: serde_json::from_str(&running_tasks).unwrap_or_default(),
        broadcast_listen: row.get("broadcast_listen")?,
        created_at: row.get("created_at")?,
        last_stop: row.get("last_stop")?,
    })
}

pub(super) const INSTANCE_COLUMNS: &str = "name, status, status_context, status_detail, \
     status_time, last_event_id, tag, tool, background, session_id, parent_session_id, \
     agent_id, parent_name, directory, transcript_path, wait_timeout, subagent_timeout, \
     hints, origin_device_id, tcp_mode, running_tasks, broadcast_listen, created_at, last_stop";

/// Upsert one row on an open connection. Shared by `insert_instance` and
/// the relay import transaction.
pub(crate) fn upsert_on(conn: &rusqlite::Connection, row: &InstanceRow) -> Result<()> {
    let running_tasks = serde_json::to_string(&row.running_tasks)?;
    conn.execute(
        &format!(
            "INSERT INTO instances ({INSTANCE_COLUMNS}) \
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21,?22,?23,?24) \
             ON CONFLICT(name) DO UPDATE SET \
             status=?2, status_context=?3, status_detail=?4, status_time=?5, \
             last_event_id=MAX(last_event_id, ?6), tag=?7, tool=?8, background=?9, \
             session_id=?10, parent_session_id=?11, agent_id=?12, parent_name=?13, \
             directory=?14, transcript_path=?15, wait_timeout=?16, subagent_timeout=?17, \
             hints=?18, origin_device_id=?19, tcp_mode=?20, running_tasks=?21, \
             broadcast_listen=?22, created_at=?23, last_stop=?24"
        ),
        params![
            row.name,
            row.status.as_str(),
            row.status_context,
            row.status_detail,
            row.status_time,
            row.last_event_id,
            row.tag,
            row.tool.as_str(),
            row.background,
            row.session_id,
            row.parent_session_id,
            row.agent_id,
            row.parent_name,
            row.directory,
            row.transcript_path,
            row.wait_timeout,
            row.subagent_timeout,
            row.hints,
            row.origin_device_id,
            row.tcp_mode,
            running_tasks,
            row.broadcast_listen,
            row.created_at,
            row.last_stop,
        ],
    )?;
    Ok(())
}

impl Store {
    /// Insert or replace a roster row.
    pub fn insert_instance(&self, row: &InstanceRow) -> Result<()> {
        let conn = self.conn.lock();
        upsert_on(&conn, row)
    }

    /// Lookup by primary key.
    pub fn get_instance(&self, name: &str) -> Result<Option<InstanceRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {INSTANCE_COLUMNS} FROM instances WHERE name = ?1"
        ))?;
        let mut rows = stmt.query_map([name], map_row)?;
        rows.next().transpose().context("read instance row")
    }

    /// Point-in-time roster snapshot with optional filters, ordered by name.
    pub fn iter_instances(&self, filter: &InstanceFilter) -> Result<Vec<InstanceRow>> {
        let mut sql = format!("SELECT {INSTANCE_COLUMNS} FROM instances WHERE 1=1");
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(ref tag) = filter.tag {
            sql.push_str(" AND tag = ?");
            args.push(Box::new(tag.clone()));
        }
        if let Some(tool) = filter.tool {
            sql.push_str(" AND tool = ?");
            args.push(Box::new(tool.as_str()));
        }
        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            args.push(Box::new(status.as_str()));
        }
        if filter.local_only {
            sql.push_str(" AND origin_device_id = ''");
        }
        sql.push_str(" ORDER BY name");

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())), map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Apply a partial update. Returns false when the row does not exist.
    pub fn update_instance(&self, name: &str, patch: &InstancePatch) -> Result<bool> {
        if patch.is_empty() {
            return Ok(self.get_instance(name)?.is_some());
        }

        let mut sets: Vec<String> = Vec::new();
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        macro_rules! set {
            ($field:expr, $col:literal, $val:expr) => {
                if let Some(ref v) = $field {
                    sets.push(format!(concat!($col, " = ?{}"), args.len() + 1));
                    args.push(Box::new($val(v)));
                }
            };
        }

        set!(patch.status, "status", |v: &Status| v.as_str().to_owned());
        set!(patch.status_context, "status_context", |v: &String| v.clone());
        set!(patch.status_detail, "status_detail", |v: &String| v.clone());
        set!(patch.status_time, "status_time", |v: &i64| *v);
        if let Some(cursor) = patch.last_event_id {
            sets.push(format!("last_event_id = MAX(last_event_id, ?{})", args.len() + 1));
            args.push(Box::new(cursor));
        }
        set!(patch.tag, "tag", |v: &String| v.clone());
        set!(patch.session_id, "session_id", |v: &String| v.clone());
        set!(patch.transcript_path, "transcript_path", |v: &String| v.clone());
        set!(patch.wait_timeout, "wait_timeout", |v: &i64| *v);
        set!(patch.subagent_timeout, "subagent_timeout", |v: &i64| *v);
        set!(patch.hints, "hints", |v: &String| v.clone());
        if let Some(ref tasks) = patch.running_tasks {
            sets.push(format!("running_tasks = ?{}", args.len() + 1));
            args.push(Box::new(serde_json::to_string(tasks)?));
        }
        set!(patch.broadcast_listen, "broadcast_listen", |v: &bool| *v);
        set!(patch.last_stop, "last_stop", |v: &String| v.clone());

        let sql = format!("UPDATE instances SET {} WHERE name = ?{}", sets.join(", "), args.len() + 1);
        args.push(Box::new(name.to_owned()));

        let conn = self.conn.lock();
        let changed = conn.execute(
            &sql,
            rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
        )?;
        Ok(changed > 0)
    }

    /// Remove a roster row. Returns false when it did not exist.
    pub fn delete_instance(&self, name: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute("DELETE FROM instances WHERE name = ?1", [name])?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
#[path = "instances_tests.rs"]
mod tests;
