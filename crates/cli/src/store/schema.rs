// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite schema for the store. Additive columns only — bump
//! `SCHEMA_VERSION` when a table definition changes shape.

use anyhow::Result;
use rusqlite::Connection;

pub const SCHEMA_VERSION: i32 = 3;

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ts TEXT NOT NULL,
            type TEXT NOT NULL,
            instance TEXT NOT NULL,
            data TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS instances (
            name TEXT PRIMARY KEY,
            status TEXT NOT NULL DEFAULT 'unknown',
            status_context TEXT NOT NULL DEFAULT '',
            status_detail TEXT NOT NULL DEFAULT '',
            status_time INTEGER NOT NULL DEFAULT 0,
            last_event_id INTEGER NOT NULL DEFAULT 0,
            tag TEXT,
            tool TEXT NOT NULL DEFAULT 'adhoc',
            background INTEGER NOT NULL DEFAULT 0,
            session_id TEXT,
            parent_session_id TEXT,
            agent_id TEXT,
            parent_name TEXT,
            directory TEXT NOT NULL DEFAULT '',
            transcript_path TEXT NOT NULL DEFAULT '',
            wait_timeout INTEGER NOT NULL DEFAULT 60,
            subagent_timeout INTEGER NOT NULL DEFAULT 300,
            hints TEXT NOT NULL DEFAULT '',
            origin_device_id TEXT NOT NULL DEFAULT '',
            tcp_mode INTEGER NOT NULL DEFAULT 1,
            running_tasks TEXT NOT NULL DEFAULT '{}',
            broadcast_listen INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT '',
            last_stop TEXT
        );

        CREATE TABLE IF NOT EXISTS notify_endpoints (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            instance TEXT NOT NULL,
            port INTEGER NOT NULL,
            UNIQUE(instance, port)
        );

        CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_events_type_id ON events(type, id);
        CREATE INDEX IF NOT EXISTS idx_events_instance ON events(instance);
        CREATE INDEX IF NOT EXISTS idx_instances_origin ON instances(origin_device_id);
        "#,
    )?;

    conn.execute(&format!("PRAGMA user_version = {SCHEMA_VERSION}"), [])?;
    Ok(())
}

/// Drop everything. Used by `reset` after archiving the file.
pub fn drop_all_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DROP TABLE IF EXISTS events;
        DROP TABLE IF EXISTS instances;
        DROP TABLE IF EXISTS notify_endpoints;
        DROP TABLE IF EXISTS kv;
        "#,
    )?;
    Ok(())
}
