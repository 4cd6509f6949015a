// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subscriptions over the event stream.
//!
//! A subscription is itself a `subscription` event owned by an instance;
//! the active set is folded from the log (a later event with `remove`
//! set true retires the matching filter). The evaluator runs during
//! delivery — matching is deterministic and non-consuming.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::event::{parse_iso, Event, EventType};
use crate::status::Status;
use crate::store::{EventQuery, Store};

/// Window for the `collision` preset: two `file` events for the same
/// path by different instances within this many seconds.
pub const COLLISION_WINDOW_SECS: i64 = 20;

pub const PRESETS: &[&str] = &["collision", "created", "stopped", "blocked", "idle"];

/// One subscription filter. All set fields must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubFilter {
    /// Glob over `file` event paths (`*` and `?`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_glob: Option<String>,
    /// Built-in preset name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    /// Owning instance of the candidate event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    /// `life`/`control` action name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// True on an unsubscribe marker.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub remove: bool,
}

impl SubFilter {
    pub fn is_empty(&self) -> bool {
        self.file_glob.is_none()
            && self.preset.is_none()
            && self.agent.is_none()
            && self.action.is_none()
    }

    /// Equality ignoring the `remove` marker, for unsubscribe matching.
    fn same_filter(&self, other: &Self) -> bool {
        self.file_glob == other.file_glob
            && self.preset == other.preset
            && self.agent == other.agent
            && self.action == other.action
    }
}

/// Active subscriptions owned by `name`, folded from the log.
pub fn subscriptions_for(store: &Store, name: &str) -> Result<Vec<SubFilter>> {
    let events = store.query_events(&EventQuery {
        kinds: vec![EventType::Subscription],
        instance: Some(name.to_owned()),
        ..EventQuery::default()
    })?;

    let mut active: Vec<SubFilter> = Vec::new();
    for ev in events {
        let Some(filter) = ev.data.get("filter") else {
            continue;
        };
        let Ok(filter) = serde_json::from_value::<SubFilter>(filter.clone()) else {
            continue;
        };
        if filter.remove {
            active.retain(|f| !f.same_filter(&filter));
        } else if !active.iter().any(|f| f.same_filter(&filter)) {
            active.push(filter);
        }
    }
    Ok(active)
}

/// Does `filter` match `ev`? Preset evaluation may consult the log.
pub fn matches(store: &Store, filter: &SubFilter, ev: &Event) -> bool {
    if filter.is_empty() {
        return false;
    }
    if let Some(ref agent) = filter.agent {
        if &ev.instance != agent {
            return false;
        }
    }
    if let Some(ref glob) = filter.file_glob {
        if ev.kind != EventType::File {
            return false;
        }
        let Some(path) = ev.data.get("path").and_then(|v| v.as_str()) else {
            return false;
        };
        if !glob_match(glob, path) {
            return false;
        }
    }
    if let Some(ref action) = filter.action {
        let ev_action = ev.data.get("action").and_then(|v| v.as_str());
        if ev_action != Some(action.as_str()) {
            return false;
        }
    }
    if let Some(ref preset) = filter.preset {
        if !preset_matches(store, preset, ev) {
            return false;
        }
    }
    true
}

fn preset_matches(store: &Store, preset: &str, ev: &Event) -> bool {
    match preset {
        "created" => {
            ev.kind == EventType::Life
                && ev.data.get("action").and_then(|v| v.as_str()) == Some("started")
        }
        "stopped" => {
            ev.kind == EventType::Life
                && ev.data.get("action").and_then(|v| v.as_str()) == Some("stopped")
        }
        "blocked" => status_transition_to(ev, Status::Blocked),
        "idle" => status_transition_to(ev, Status::Listening),
        "collision" => file_collision(store, ev).unwrap_or(false),
        _ => false,
    }
}

fn status_transition_to(ev: &Event, to: Status) -> bool {
    ev.kind == EventType::Status
        && ev.data.get("to").and_then(|v| v.as_str()) == Some(to.as_str())
}

/// Another instance touched the same path within the collision window.
fn file_collision(store: &Store, ev: &Event) -> Result<bool> {
    if ev.kind != EventType::File {
        return Ok(false);
    }
    let Some(path) = ev.data.get("path").and_then(|v| v.as_str()) else {
        return Ok(false);
    };
    let Some(ev_secs) = parse_iso(&ev.ts) else {
        return Ok(false);
    };

    let candidates = store.query_events(&EventQuery {
        kinds: vec![EventType::File],
        ..EventQuery::default()
    })?;
    Ok(candidates.iter().any(|other| {
        other.id != ev.id
            && other.instance != ev.instance
            && other.data.get("path").and_then(|v| v.as_str()) == Some(path)
            && parse_iso(&other.ts)
                .is_some_and(|secs| (ev_secs - secs).abs() <= COLLISION_WINDOW_SECS)
    }))
}

/// Minimal glob: `*` matches any run, `?` one character; everything else
/// is literal. Compiled through the regex engine.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push('^');
    for c in pattern.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    regex::Regex::new(&re).map(|r| r.is_match(text)).unwrap_or(false)
}

#[cfg(test)]
#[path = "subs_tests.rs"]
mod tests;
