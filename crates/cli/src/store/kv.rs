// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! String scratch space and notify-endpoint rows.
//!
//! KV carries the small cross-process coordination state: relay cursors
//! and floors, daemon liveness port, session bindings, tip-seen markers.

use anyhow::Result;
use indexmap::IndexMap;
use rusqlite::params;

use super::Store;

impl Store {
    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let mut rows = stmt.query_map([key], |row| row.get::<_, String>(0))?;
        Ok(rows.next().transpose()?)
    }

    /// Set a key; `None` deletes it.
    pub fn kv_set(&self, key: &str, value: Option<&str>) -> Result<()> {
        let conn = self.conn.lock();
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

    /// All entries whose key starts with `prefix`, ordered by key.
    pub fn kv_prefix(&self, prefix: &str) -> Result<IndexMap<String, String>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT key, value FROM kv WHERE key LIKE ?1 || '%' ORDER BY key")?;
        let mut map = IndexMap::new();
        let rows = stmt.query_map([prefix], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (k, v) = row?;
            map.insert(k, v);
        }
        Ok(map)
    }

    /// Integer view over a KV value, defaulting to 0.
    pub fn kv_get_i64(&self, key: &str) -> Result<i64> {
        Ok(self
            .kv_get(key)?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0))
    }

    /// Register a listener port. `(instance, port)` is idempotent.
    pub fn register_notify_port(&self, instance: &str, port: u16) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR IGNORE INTO notify_endpoints (instance, port) VALUES (?1, ?2)",
            params![instance, port],
        )?;
        Ok(())
    }

    /// Remove one endpoint, or all endpoints for the instance when `port`
    /// is `None`. Idempotent — concurrent pruners are benign.
    pub fn delete_notify_endpoint(&self, instance: &str, port: Option<u16>) -> Result<()> {
        let conn = self.conn.lock();
        match port {
            Some(p) => {
                conn.execute(
                    "DELETE FROM notify_endpoints WHERE instance = ?1 AND port = ?2",
                    params![instance, p],
                )?;
            }
            None => {
                conn.execute("DELETE FROM notify_endpoints WHERE instance = ?1", [instance])?;
            }
        }
        Ok(())
    }

    /// Ports registered for one instance, in insertion order.
    pub fn list_notify_ports(&self, instance: &str) -> Result<Vec<u16>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT port FROM notify_endpoints WHERE instance = ?1 ORDER BY id")?;
        let ports = stmt
            .query_map([instance], |row| row.get::<_, u16>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ports)
    }

    /// Every `(instance, port)` pair, in insertion order.
    pub fn all_notify_endpoints(&self) -> Result<Vec<(String, u16)>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT ne.instance, ne.port FROM notify_endpoints ne \
             JOIN instances i ON i.name = ne.instance \
             WHERE ne.port > 0 ORDER BY ne.id",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u16>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
#[path = "kv_tests.rs"]
mod tests;
