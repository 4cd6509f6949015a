// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! @mention routing: resolve the leading `@target` tokens of a message
//! body against the roster.
//!
//! Matching precedence per token: exact name, then tag, then name prefix.
//! A prefix match is suppressed when the character following the prefix
//! is `_` — underscore segments mark subagents and must not catch
//! accidental routing (`@luna` never matches `luna_sub_1`). The trailing
//! `-` form (`@api-`) is an explicit tag broadcast, and `@name:SHORT`
//! addresses a remote instance by its composite key.

use indexmap::IndexSet;

use crate::store::InstanceRow;

/// Routing result: who gets the message and the audited mention list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routed {
    /// Deduplicated recipient instance names, in first-mention order.
    pub recipients: Vec<String>,
    /// Deduplicated ordered mention list stored with the event.
    pub mentions: Vec<String>,
}

impl Routed {
    pub fn empty() -> Self {
        Self { recipients: Vec::new(), mentions: Vec::new() }
    }
}

/// True when `token` (without the `@`) has the shape of a mention target.
fn is_target_token(token: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    let mut rest = token;
    // Optional trailing `:SHORT` for cross-device addressing.
    if let Some((name, short)) = token.rsplit_once(':') {
        if name.is_empty() || short.is_empty() {
            return false;
        }
        if !short.chars().all(|c| c.is_ascii_alphanumeric()) {
            return false;
        }
        rest = name;
    }
    rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Resolve one token against the roster, appending matches in order.
fn resolve_token(token: &str, roster: &[InstanceRow], out: &mut IndexSet<String>) {
    // Explicit tag broadcast: `@api-`.
    if let Some(tag) = token.strip_suffix('-') {
        if !tag.is_empty() {
            for row in roster {
                if row.tag.as_deref() == Some(tag) {
                    out.insert(row.name.clone());
                }
            }
        }
        return;
    }

    // Cross-device composite key: exact match only.
    if token.contains(':') {
        if roster.iter().any(|r| r.name == token) {
            out.insert(token.to_owned());
        }
        return;
    }

    // Exact name wins over a tag of the same spelling.
    if roster.iter().any(|r| r.name == token) {
        out.insert(token.to_owned());
        return;
    }

    // Bare tag form.
    let mut tagged = false;
    for row in roster {
        if row.tag.as_deref() == Some(token) {
            out.insert(row.name.clone());
            tagged = true;
        }
    }
    if tagged {
        return;
    }

    // Name prefix, unless the next character is an underscore.
    for row in roster {
        if let Some(rest) = row.name.strip_prefix(token) {
            if !rest.starts_with('_') && !rest.is_empty() {
                out.insert(row.name.clone());
            }
        }
    }
}

/// Parse the leading `@target` tokens of `text` and resolve them.
///
/// Unknown tokens are silently dropped; self-mentions are dropped; an
/// empty result with a non-empty body is a valid broadcast-style record.
pub fn route(text: &str, sender: &str, roster: &[InstanceRow]) -> Routed {
    let mut resolved: IndexSet<String> = IndexSet::new();

    for word in text.split_whitespace() {
        let Some(token) = word.strip_prefix('@') else {
            break;
        };
        // Tolerate trailing punctuation like `@luna,`.
        let token = token.trim_end_matches(|c: char| !c.is_ascii_alphanumeric() && c != '-');
        if !is_target_token(token) {
            break;
        }
        resolve_token(token, roster, &mut resolved);
    }

    resolved.shift_remove(sender);

    let names: Vec<String> = resolved.into_iter().collect();
    Routed { recipients: names.clone(), mentions: names }
}

#[cfg(test)]
#[path = "mention_tests.rs"]
mod tests;
