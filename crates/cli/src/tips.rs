// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-time tips, tracked per instance in KV (`tip:{instance}:{key}`).

use anyhow::Result;

use crate::store::Store;

/// Tip texts keyed by a stable id.
pub const TIPS: &[(&str, &str)] = &[
    (
        "list:status",
        "[tip] Statuses: ▶ active (will read new msgs very soon)  ◉ listening (will read new msgs in <1s)  ■ blocked (needs human user approval)  ○ inactive (dead)  ◦ unknown (neutral)",
    ),
    (
        "send:intent:request",
        "[tip] intent=request: You signaled you expect a response.",
    ),
    (
        "send:intent:inform",
        "[tip] intent=inform: You signaled no response needed.",
    ),
    (
        "send:intent:ack",
        "[tip] intent=ack: You acknowledged receipt. Recipient won't respond.",
    ),
    (
        "recv:intent:request",
        "[tip] intent=request: Sender expects a response.",
    ),
    (
        "recv:intent:inform",
        "[tip] intent=inform: Sender doesn't expect a response.",
    ),
    (
        "recv:intent:ack",
        "[tip] intent=ack: Sender confirmed receipt. No response needed.",
    ),
    (
        "mention:matching",
        "[tip] @targets: @api- matches all with tag 'api' | @luna matches prefix | underscore blocks: @luna won't match luna_sub_1",
    ),
];

fn tip_key(instance: &str, key: &str) -> String {
    format!("tip:{instance}:{key}")
}

fn lookup(key: &str) -> Option<&'static str> {
    TIPS.iter().find(|(k, _)| *k == key).map(|(_, text)| *text)
}

pub fn has_seen(store: &Store, instance: &str, key: &str) -> Result<bool> {
    if instance.is_empty() {
        return Ok(true);
    }
    Ok(store.kv_get(&tip_key(instance, key))?.is_some())
}

pub fn mark_seen(store: &Store, instance: &str, key: &str) -> Result<()> {
    if instance.is_empty() {
        return Ok(());
    }
    store.kv_set(&tip_key(instance, key), Some("1"))
}

/// Return the tip text on first encounter for this instance, marking it
/// seen. `None` on repeats or unknown keys.
pub fn once(store: &Store, instance: &str, key: &str) -> Result<Option<&'static str>> {
    let Some(text) = lookup(key) else {
        return Ok(None);
    };
    if has_seen(store, instance, key)? {
        return Ok(None);
    }
    mark_seen(store, instance, key)?;
    Ok(Some(text))
}

#[cfg(test)]
#[path = "tips_tests.rs"]
mod tests;
