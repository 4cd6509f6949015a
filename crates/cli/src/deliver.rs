// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cursor-based delivery: read events past an instance's cursor, pick the
//! ones addressed to it, format a per-turn batch and advance the cursor.
//!
//! The cursor always advances to the max *scanned* id, not the max
//! included id — an instance that is never mentioned must not re-scan the
//! same tail forever, and excluded events cannot stall anyone.

use anyhow::Result;

use crate::error::CliError;
use crate::event::{Event, EventType, Intent, MessageData};
use crate::store::{InstancePatch, Store};
use crate::subs;
use crate::tips;

/// One formatted item in a delivery batch.
#[derive(Debug, Clone)]
pub struct DeliveredMessage {
    pub id: i64,
    pub text: String,
}

/// Result of one delivery pass.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub messages: Vec<DeliveredMessage>,
    pub new_cursor: i64,
}

impl Delivery {
    /// Join the batch into the inline-injection form hooks print.
    pub fn render(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Read and format everything new for `name`.
///
/// Inclusion: mentioned by name, or a subscription match, or (when
/// `mentions` is empty) the instance opted into broadcasts. When
/// `advance` is set the cursor moves to the max scanned id.
pub fn deliver(store: &Store, name: &str, advance: bool) -> Result<Delivery> {
    let row = store
        .get_instance(name)?
        .ok_or_else(|| CliError::NotFound(format!("'{name}' is not registered")))?;
    let cursor = row.last_event_id;

    let subscriptions = subs::subscriptions_for(store, name)?;
    // Without subscriptions only messages can match; skip scanning the rest.
    let kinds: &[EventType] =
        if subscriptions.is_empty() { &[EventType::Message] } else { &[] };
    let events = store.events_after(cursor, kinds, 0)?;

    let mut messages = Vec::new();
    let mut scanned_max = cursor;
    for ev in &events {
        scanned_max = scanned_max.max(ev.id);

        if let Some(msg) = ev.message() {
            let mentioned = msg.mentions.iter().any(|m| m == name);
            let broadcast =
                msg.mentions.is_empty() && row.broadcast_listen && msg.from != name;
            if mentioned || broadcast {
                messages.push(DeliveredMessage {
                    id: ev.id,
                    text: format_message(store, name, ev, &msg)?,
                });
                continue;
            }
        }

        if ev.instance != name
            && subscriptions.iter().any(|f| subs::matches(store, f, ev))
        {
            messages.push(DeliveredMessage { id: ev.id, text: format_notice(ev) });
        }
    }

    let new_cursor = scanned_max;
    if advance && new_cursor > cursor {
        store.update_instance(
            name,
            &InstancePatch { last_event_id: Some(new_cursor), ..InstancePatch::default() },
        )?;
    }

    Ok(Delivery { messages, new_cursor })
}

/// Render one message block:
///
/// ```text
/// [api-luna #12] deploy finished
///   (request, thread t1, reply to #10)
/// ```
///
/// with a one-time intent tip appended on first receipt of each intent.
pub fn format_message(
    store: &Store,
    recipient: &str,
    ev: &Event,
    msg: &MessageData,
) -> Result<String> {
    // Full display name includes the tag group; stopped senders fall
    // back to the name recorded in the event.
    let from = store
        .get_instance(&msg.from)?
        .map(|row| row.display_name())
        .unwrap_or_else(|| msg.from.clone());
    let mut block = format!("[{from} #{}] {}", ev.id, msg.text);

    let mut envelope: Vec<String> = Vec::new();
    if let Some(intent) = msg.intent {
        if intent != Intent::Inform {
            envelope.push(intent.as_str().to_owned());
        }
    }
    if let Some(ref thread) = msg.thread {
        envelope.push(format!("thread {thread}"));
    }
    if let Some(reply_to) = msg.reply_to_local {
        envelope.push(format!("reply to #{reply_to}"));
    }
    if !envelope.is_empty() {
        block.push_str(&format!("\n  ({})", envelope.join(", ")));
    }

    if let Some(ref attachment) = msg.attachment {
        block.push_str(&format!("\n  [attachment: {}]", attachment.name));
    }

    if let Some(intent) = msg.intent {
        let key = format!("recv:intent:{}", intent.as_str());
        if let Some(tip) = tips::once(store, recipient, &key)? {
            block.push('\n');
            block.push_str(tip);
        }
    }

    Ok(block)
}

/// Render a subscription-matched event as a compact notice line.
fn format_notice(ev: &Event) -> String {
    let summary = match ev.kind {
        EventType::Life => ev
            .data
            .get("action")
            .and_then(|v| v.as_str())
            .unwrap_or("?")
            .to_owned(),
        EventType::Status => format!(
            "{} → {}",
            ev.data.get("from").and_then(|v| v.as_str()).unwrap_or("?"),
            ev.data.get("to").and_then(|v| v.as_str()).unwrap_or("?"),
        ),
        EventType::File => format!(
            "{} {}",
            ev.data.get("op").and_then(|v| v.as_str()).unwrap_or("touched"),
            ev.data.get("path").and_then(|v| v.as_str()).unwrap_or("?"),
        ),
        _ => ev.kind.to_string(),
    };
    format!("[event #{}] {} {}: {}", ev.id, ev.instance, ev.kind, summary)
}

#[cfg(test)]
#[path = "deliver_tests.rs"]
mod tests;
