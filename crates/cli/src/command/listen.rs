// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `huddle listen` — blocking wait loop with TCP wake and poll fallback.
//!
//! Registers a notify endpoint, waits, re-runs delivery after every wake
//! or poll tick, prints batches as they arrive, and exits 0 at the
//! deadline (empty output when nothing arrived).

use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Args;
use tokio_util::sync::CancellationToken;

use crate::context::Context;
use crate::deliver;
use crate::error::CliError;
use crate::identity;
use crate::status::{self, Status};
use crate::wake::{NotifyRegistration, NotifyServer, WakeReason};

/// Poll fallback ceiling: a lost wake is caught within this bound.
const POLL_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Default, Args)]
pub struct ListenArgs {
    /// Listening identity (defaults to HUDDLE_NAME).
    #[arg(long)]
    pub name: Option<String>,
    /// Overall wait in seconds (default: config wait_timeout).
    #[arg(long)]
    pub timeout: Option<u64>,
}

pub async fn run(ctx: &Context, args: &ListenArgs) -> Result<i32> {
    let store = ctx.store()?;
    let id = identity::resolve(&store, args.name.as_deref())?;
    if id.row.is_none() {
        return Err(CliError::Identity(format!("'{}' is not registered", id.name)).into());
    }

    let timeout = Duration::from_secs(args.timeout.unwrap_or(ctx.config.wait_timeout));
    let deadline = Instant::now() + timeout;
    let cancel = CancellationToken::new();

    let ctrlc_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrlc_cancel.cancel();
        }
    });

    status::apply(&store, &id.name, Status::Listening, "idle", "")?;

    let server = NotifyServer::bind().await?;
    let _registration = NotifyRegistration::register(&store, &id.name, server.port())?;

    loop {
        // Deliver first: events may predate the endpoint registration.
        let delivery = deliver::deliver(&store, &id.name, true)?;
        for message in &delivery.messages {
            println!("{}", message.text);
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match server.wait(remaining.min(POLL_INTERVAL), &cancel).await {
            WakeReason::Cancelled => break,
            WakeReason::Woken | WakeReason::Timeout => continue,
        }
    }

    Ok(0)
}
