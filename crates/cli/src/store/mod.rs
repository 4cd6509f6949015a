// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable single-writer store: append-only event log, instance roster,
//! notify endpoints and KV scratch, all in one SQLite file.
//!
//! One `rusqlite::Connection` sits behind a `parking_lot::Mutex` — that
//! mutex is the process-wide write lock. Cross-process writers serialize
//! on SQLite's file lock (WAL mode, busy timeout). Code holding the lock
//! must not call back out to the network or hook dispatch; the relay
//! import transaction is the only multi-statement critical section.

pub mod instances;
pub mod kv;
pub mod schema;

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags, Transaction};
use serde_json::Value;

use crate::event::{epoch_now, iso_now, Event, EventType};

pub use instances::{InstanceFilter, InstancePatch, InstanceRow, RunningTasks, SubagentRef, Tool};

/// Handle to the store file.
pub struct Store {
    pub(crate) conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

/// Filters for [`Store::query_events`].
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    /// Only events with `id > after_id`.
    pub after_id: i64,
    /// Restrict to these types; empty means all.
    pub kinds: Vec<EventType>,
    /// Restrict to one owning instance.
    pub instance: Option<String>,
    /// Exclude relay-imported events (instance contains `:`).
    pub local_only: bool,
    /// Cap the result count; 0 means unlimited.
    pub limit: usize,
}

impl Store {
    /// Open (creating if needed) the store at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("cannot open store {}", path.display()))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        // journal_mode echoes the new mode as a row.
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        schema::init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn), path: Some(path.to_path_buf()) })
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn), path: None })
    }

    /// The hook fast-path gate: one cheap statement with a short busy
    /// timeout. `Some(true)` means participants exist; `None` means the
    /// check errored and the caller should fall through to the full path.
    pub fn gate_check(path: &Path) -> Option<bool> {
        if !path.exists() {
            return Some(false);
        }
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY).ok()?;
        conn.busy_timeout(std::time::Duration::from_secs(1)).ok()?;
        match conn.query_row("SELECT 1 FROM instances LIMIT 1", [], |_| Ok(())) {
            Ok(()) => Some(true),
            Err(rusqlite::Error::QueryReturnedNoRows) => Some(false),
            Err(_) => None,
        }
    }

    /// Append an event stamped now. Returns the new id.
    pub fn log_event(&self, kind: EventType, instance: &str, data: &Value) -> Result<i64> {
        self.log_event_at(kind, instance, data, &iso_now())
    }

    /// Append an event with an explicit timestamp (relay import).
    pub fn log_event_at(
        &self,
        kind: EventType,
        instance: &str,
        data: &Value,
        ts: &str,
    ) -> Result<i64> {
        let conn = self.conn.lock();
        insert_event_on(&conn, ts, kind, instance, data)
    }

    /// Events with `id > after_id` of the given types, in id order.
    pub fn events_after(
        &self,
        after_id: i64,
        kinds: &[EventType],
        limit: usize,
    ) -> Result<Vec<Event>> {
        self.query_events(&EventQuery {
            after_id,
            kinds: kinds.to_vec(),
            limit,
            ..EventQuery::default()
        })
    }

    /// General event query, in id order.
    pub fn query_events(&self, query: &EventQuery) -> Result<Vec<Event>> {
        let mut sql =
            String::from("SELECT id, ts, type, instance, data FROM events WHERE id > ?");
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(query.after_id)];
        if !query.kinds.is_empty() {
            let marks = vec!["?"; query.kinds.len()].join(", ");
            sql.push_str(&format!(" AND type IN ({marks})"));
            for kind in &query.kinds {
                args.push(Box::new(kind.as_str()));
            }
        }
        if let Some(ref instance) = query.instance {
            sql.push_str(" AND instance = ?");
            args.push(Box::new(instance.clone()));
        }
        if query.local_only {
            // Locally-originated only: no device suffix and no relay mark
            // (an imported mention of a local name must not re-export).
            sql.push_str(
                " AND instance NOT LIKE '%:%' AND json_extract(data, '$._relay') IS NULL",
            );
        }
        sql.push_str(" ORDER BY id");
        if query.limit > 0 {
            sql.push_str(&format!(" LIMIT {}", query.limit));
        }

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let events = stmt
            .query_map(
                rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
                map_event_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }

    /// Lookup one event by id.
    pub fn get_event(&self, id: i64) -> Result<Option<Event>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT id, ts, type, instance, data FROM events WHERE id = ?1")?;
        let mut rows = stmt.query_map([id], map_event_row)?;
        Ok(rows.next().transpose()?)
    }

    /// Max event id, 0 when the log is empty.
    pub fn max_event_id(&self) -> Result<i64> {
        let conn = self.conn.lock();
        let id: Option<i64> = conn.query_row("SELECT MAX(id) FROM events", [], |row| row.get(0))?;
        Ok(id.unwrap_or(0))
    }

    /// Most recent `life/stopped` snapshot for `name`, decoded as a row.
    pub fn stopped_snapshot_load(&self, name: &str) -> Result<Option<InstanceRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT data FROM events WHERE type = 'life' \
             AND json_extract(data, '$.action') = 'stopped' \
             AND json_extract(data, '$.snapshot.name') = ?1 \
             ORDER BY id DESC LIMIT 1",
        )?;
        let mut rows = stmt.query_map([name], |row| row.get::<_, String>(0))?;
        let Some(data) = rows.next().transpose()? else {
            return Ok(None);
        };
        let value: Value = serde_json::from_str(&data)?;
        let snapshot = value
            .get("snapshot")
            .cloned()
            .context("stopped event missing snapshot")?;
        Ok(Some(serde_json::from_value(snapshot)?))
    }

    /// Epoch seconds of the most recent local reset, from KV with an
    /// event-scan fallback.
    pub fn local_reset_ts(&self) -> Result<i64> {
        if let Some(ts) = self.kv_get("relay_local_reset_ts")? {
            if let Ok(secs) = ts.parse() {
                return Ok(secs);
            }
        }
        let conn = self.conn.lock();
        let ts: Option<String> = conn
            .query_row(
                "SELECT ts FROM events WHERE type = 'life' \
                 AND json_extract(data, '$.action') = 'reset' \
                 AND json_extract(data, '$._relay') IS NULL \
                 AND instance NOT LIKE '%:%' \
                 ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        Ok(ts.and_then(|t| crate::event::parse_iso(&t)).unwrap_or(0))
    }

    /// Archive the current database contents and start over.
    ///
    /// The file is checkpointed and copied to `huddle.db.bak-{epoch}`,
    /// all tables are dropped and recreated, one `life/reset` event is
    /// written and the reset time is recorded in KV. Device identity
    /// files are untouched.
    pub fn reset(&self) -> Result<Option<PathBuf>> {
        let conn = self.conn.lock();

        let archive = match &self.path {
            Some(path) if path.exists() => {
                let _ = conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()));
                let archive = path.with_extension(format!("db.bak-{}", epoch_now()));
                std::fs::copy(path, &archive)
                    .with_context(|| format!("cannot archive {}", path.display()))?;
                Some(archive)
            }
            _ => None,
        };

        schema::drop_all_tables(&conn)?;
        schema::init_schema(&conn)?;

        let now = iso_now();
        let reset_ts = epoch_now();
        insert_event_on(
            &conn,
            &now,
            EventType::Life,
            "_system",
            &serde_json::json!({"action": "reset", "archived": archive.as_ref().map(|p| p.display().to_string())}),
        )?;
        kv_set_on(&conn, "relay_local_reset_ts", Some(&reset_ts.to_string()))?;
        Ok(archive)
    }

    /// Run `f` inside one SQL transaction under the write lock.
    ///
    /// Reserved for the relay import path, which must atomically delete
    /// and upsert per device.
    pub fn with_txn<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

fn map_event_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Event> {
    let kind: String = row.get(2)?;
    let data: String = row.get(4)?;
    Ok(Event {
        id: row.get(0)?,
        ts: row.get(1)?,
        kind: kind.parse().unwrap_or(EventType::Message),
        instance: row.get(3)?,
        data: serde_json::from_str(&data).unwrap_or(Value::Null),
    })
}

/// Insert one event row on an open connection, returning its id.
pub(crate) fn insert_event_on(
    conn: &Connection,
    ts: &str,
    kind: EventType,
    instance: &str,
    data: &Value,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO events (ts, type, instance, data) VALUES (?1, ?2, ?3, ?4)",
        params![ts, kind.as_str(), instance, serde_json::to_string(data)?],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Delete every roster row imported from `device`.
pub(crate) fn delete_instances_by_origin_on(conn: &Connection, device: &str) -> Result<usize> {
    Ok(conn.execute("DELETE FROM instances WHERE origin_device_id = ?1", [device])?)
}

/// Delete every event annotated as imported from `device`.
pub(crate) fn delete_relay_events_on(conn: &Connection, device: &str) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM events WHERE json_extract(data, '$._relay.device') = ?1",
        [device],
    )?)
}

/// KV upsert/delete on an open connection (transaction-safe variant).
pub(crate) fn kv_set_on(conn: &Connection, key: &str, value: Option<&str>) -> Result<()> {
    match value {
        Some(v) => {
            conn.execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2) \
                 ON CONFLICT(key) DO UPDATE SET value = ?2",
                params![key, v],
            )?;
        }
        None => {
            conn.execute("DELETE FROM kv WHERE key = ?1", [key])?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
