// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `huddle send` — route, log, fan out, wake.

use std::path::PathBuf;

use anyhow::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use clap::Args;

use crate::context::Context;
use crate::error::CliError;
use crate::event::{Attachment, EventType, Intent, MessageData};
use crate::identity;
use crate::mention;
use crate::relay::daemon_link;
use crate::store::{InstanceFilter, Store};
use crate::tips;
use crate::wake;

#[derive(Debug, Clone, Default, Args)]
pub struct SendArgs {
    /// Sender identity (defaults to HUDDLE_NAME or the hook session).
    #[arg(long)]
    pub name: Option<String>,
    /// Envelope intent: request, inform or ack.
    #[arg(long)]
    pub intent: Option<String>,
    /// Opaque thread id.
    #[arg(long)]
    pub thread: Option<String>,
    /// Local event id this message replies to.
    #[arg(long = "reply-to")]
    pub reply_to: Option<i64>,
    /// Explicit recipients in addition to @mentions in the text.
    #[arg(long = "to")]
    pub to: Vec<String>,
    /// Attach a file (embedded base64).
    #[arg(long)]
    pub attach: Option<PathBuf>,
    /// Attach pre-encoded base64 content instead of a file.
    #[arg(long = "attach-base64", conflicts_with = "attach")]
    pub attach_base64: Option<String>,
    /// File name to record with --attach-base64.
    #[arg(long = "attach-name", requires = "attach_base64")]
    pub attach_name: Option<String>,
    /// Message body; leading @targets select recipients.
    pub text: String,
}

/// What a send did, for output and tests.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub event_id: i64,
    pub recipients: Vec<String>,
    pub intent: Option<Intent>,
}

/// Validate, route and log one message, then fan out wakes.
pub fn send_message(store: &Store, from: &str, args: &SendArgs) -> Result<SendOutcome> {
    if args.text.trim().is_empty() {
        return Err(CliError::Input("empty message".into()).into());
    }

    let intent = args.intent.as_deref().map(str::parse::<Intent>).transpose()?;
    if intent == Some(Intent::Ack) && args.reply_to.is_none() {
        return Err(CliError::Input("Intent 'ack' requires --reply-to".into()).into());
    }

    // Reply target must exist; inherit its thread when ours is unset.
    let mut thread = args.thread.clone();
    if let Some(reply_to) = args.reply_to {
        let Some(parent) = store.get_event(reply_to)? else {
            return Err(CliError::NotFound(format!("--reply-to event {reply_to} not found")).into());
        };
        if thread.is_none() {
            thread = parent.message().and_then(|m| m.thread);
        }
    }

    let roster = store.iter_instances(&InstanceFilter::default())?;
    let mut routed = mention::route(&args.text, from, &roster);

    // Explicit --to recipients are strict: unknown names are input errors.
    for to in &args.to {
        if !roster.iter().any(|r| &r.name == to) {
            return Err(CliError::Input(format!("unknown recipient: {to}")).into());
        }
        if to != from && !routed.recipients.contains(to) {
            routed.recipients.push(to.clone());
            routed.mentions.push(to.clone());
        }
    }

    let attachment = match (&args.attach, &args.attach_base64) {
        (Some(path), _) => {
            let bytes = std::fs::read(path)
                .map_err(|e| CliError::Input(format!("cannot read {}: {e}", path.display())))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "attachment".to_owned());
            Some(Attachment { name, base64: STANDARD.encode(bytes) })
        }
        (None, Some(encoded)) => {
            STANDARD
                .decode(encoded)
                .map_err(|e| CliError::Input(format!("invalid base64 attachment: {e}")))?;
            let name =
                args.attach_name.clone().unwrap_or_else(|| "attachment".to_owned());
            Some(Attachment { name, base64: encoded.clone() })
        }
        (None, None) => None,
    };

    let data = MessageData {
        text: args.text.clone(),
        from: from.to_owned(),
        mentions: routed.mentions.clone(),
        intent,
        thread,
        reply_to_local: args.reply_to,
        delivered_to: routed.recipients.clone(),
        attachment,
        relay: None,
        extra: serde_json::Map::new(),
    };
    let event_id = store.log_event(EventType::Message, from, &serde_json::to_value(&data)?)?;

    // Wake local recipients; remote ones wake on their own device after
    // the relay import. Then poke the daemon to push promptly.
    for recipient in &routed.recipients {
        if !recipient.contains(':') {
            wake::notify_instance(store, recipient);
        }
    }
    daemon_link::trigger_daemon_push(store);

    Ok(SendOutcome { event_id, recipients: routed.recipients, intent })
}

/// CLI wrapper: resolve identity, send, report.
pub fn run(ctx: &Context, args: &SendArgs) -> Result<i32> {
    let store = ctx.store()?;
    let id = identity::resolve(&store, args.name.as_deref())?;
    let outcome = send_message(&store, &id.name, args)?;

    match outcome.recipients.len() {
        0 => println!("Sent #{} — 0 recipients", outcome.event_id),
        n => println!(
            "Sent #{} — {n} recipient(s): {}",
            outcome.event_id,
            outcome.recipients.join(", ")
        ),
    }

    if let Some(intent) = outcome.intent {
        let key = format!("send:intent:{}", intent.as_str());
        if let Some(tip) = tips::once(&store, &id.name, &key)? {
            println!("\n{tip}");
        }
    }
    Ok(0)
}

#[cfg(test)]
#[path = "send_tests.rs"]
mod tests;
