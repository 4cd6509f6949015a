// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `huddle events` — query the log, optionally blocking, and manage
//! subscriptions (`events sub` / `events unsub`).

use std::time::{Duration, Instant};

use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::context::Context;
use crate::error::CliError;
use crate::event::EventType;
use crate::identity;
use crate::store::{EventQuery, Store};
use crate::subs::{SubFilter, PRESETS};
use crate::wake::{NotifyRegistration, NotifyServer, WakeReason};

const WAIT_POLL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Default, Args)]
pub struct EventsArgs {
    #[command(subcommand)]
    pub sub: Option<EventsCmd>,

    /// Restrict to one event type.
    #[arg(long = "type")]
    pub kind: Option<String>,
    /// Restrict to one owning instance.
    #[arg(long)]
    pub instance: Option<String>,
    /// Only events with id greater than this.
    #[arg(long, default_value_t = 0)]
    pub since: i64,
    /// Cap the result count.
    #[arg(long, default_value_t = 50)]
    pub limit: usize,
    /// Block up to this many seconds for a first result.
    #[arg(long)]
    pub wait: Option<u64>,
    /// Identity for the blocking wait's wake endpoint.
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum EventsCmd {
    /// Subscribe to a filter over the event stream.
    Sub(SubArgs),
    /// Retire a previously added subscription.
    Unsub(SubArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct SubArgs {
    /// Owning identity of the subscription.
    #[arg(long)]
    pub name: Option<String>,
    /// Glob over file-event paths.
    #[arg(long)]
    pub file: Option<String>,
    /// Built-in preset: collision, created, stopped, blocked, idle.
    #[arg(long)]
    pub preset: Option<String>,
    /// Restrict to events owned by this instance.
    #[arg(long)]
    pub agent: Option<String>,
    /// Restrict to this life/control action.
    #[arg(long)]
    pub action: Option<String>,
}

fn filter_from(args: &SubArgs, remove: bool) -> Result<SubFilter> {
    if let Some(ref preset) = args.preset {
        if !PRESETS.contains(&preset.as_str()) {
            return Err(CliError::Input(format!(
                "unknown preset '{preset}' ({})",
                PRESETS.join(", ")
            ))
            .into());
        }
    }
    let filter = SubFilter {
        file_glob: args.file.clone(),
        preset: args.preset.clone(),
        agent: args.agent.clone(),
        action: args.action.clone(),
        remove,
    };
    if filter.is_empty() {
        return Err(CliError::Input(
            "subscription needs at least one of --file/--preset/--agent/--action".into(),
        )
        .into());
    }
    Ok(filter)
}

fn log_subscription(store: &Store, owner: &str, filter: &SubFilter) -> Result<i64> {
    Ok(store.log_event(
        EventType::Subscription,
        owner,
        &json!({"filter": serde_json::to_value(filter)?}),
    )?)
}

fn query_from(args: &EventsArgs) -> Result<EventQuery> {
    let kinds = match &args.kind {
        Some(kind) => vec![kind.parse::<EventType>()?],
        None => Vec::new(),
    };
    Ok(EventQuery {
        after_id: args.since,
        kinds,
        instance: args.instance.clone(),
        limit: args.limit,
        local_only: false,
    })
}

pub async fn run(ctx: &Context, args: &EventsArgs) -> Result<i32> {
    let store = ctx.store()?;

    if let Some(ref cmd) = args.sub {
        let (sub_args, remove) = match cmd {
            EventsCmd::Sub(a) => (a, false),
            EventsCmd::Unsub(a) => (a, true),
        };
        let id = identity::resolve(&store, sub_args.name.as_deref())?;
        let filter = filter_from(sub_args, remove)?;
        log_subscription(&store, &id.name, &filter)?;
        println!("{} {}", if remove { "Unsubscribed" } else { "Subscribed" }, id.name);
        return Ok(0);
    }

    let query = query_from(args)?;
    let mut events = store.query_events(&query)?;

    if events.is_empty() {
        if let Some(wait) = args.wait {
            let deadline = Instant::now() + Duration::from_secs(wait);
            let cancel = CancellationToken::new();
            let server = NotifyServer::bind().await?;
            // A wake endpoint only helps when the caller is a known
            // instance; anonymous waiters rely on the poll interval.
            let registration = match args.name.as_deref() {
                Some(name) => Some(NotifyRegistration::register(&store, name, server.port())?),
                None => None,
            };

            loop {
                events = store.query_events(&query)?;
                if !events.is_empty() {
                    break;
                }
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                if server.wait(remaining.min(WAIT_POLL), &cancel).await
                    == WakeReason::Cancelled
                {
                    break;
                }
            }
            drop(registration);
        }
    }

    for ev in &events {
        println!("{}", serde_json::to_string(ev)?);
    }
    Ok(0)
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
