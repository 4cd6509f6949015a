// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `huddle stop` — write the terminal snapshot and leave the roster.
//!
//! A `name:SHORT` target is a remote instance: instead of touching the
//! local roster, a `stop` control event is published so the owning
//! device runs the stop itself.

use anyhow::Result;
use clap::Args;

use crate::context::Context;
use crate::error::CliError;
use crate::identity;
use crate::lifecycle;
use crate::relay::control::send_control;
use crate::relay::device::device_identity;
use crate::store::InstanceFilter;

#[derive(Debug, Clone, Default, Args)]
pub struct StopArgs {
    /// Instance to stop (defaults to the resolved identity). A
    /// `name:SHORT` form targets a remote device via the relay.
    pub name: Option<String>,
    /// Stop every local instance with this tag.
    #[arg(long)]
    pub tag: Option<String>,
}

pub async fn run(ctx: &Context, args: &StopArgs) -> Result<i32> {
    let store = ctx.store()?;

    if let Some(ref tag) = args.tag {
        let rows = store.iter_instances(&InstanceFilter {
            tag: Some(tag.clone()),
            local_only: true,
            ..Default::default()
        })?;
        if rows.is_empty() {
            return Err(CliError::NotFound(format!("no instances with tag '{tag}'")).into());
        }
        for row in rows {
            lifecycle::stop_instance(&store, &row.name)?;
            println!("Stopped {}", row.name);
        }
        return Ok(0);
    }

    let name = match &args.name {
        Some(name) => name.clone(),
        None => identity::resolve(&store, None)?.name,
    };

    if let Some((target, short)) = name.split_once(':') {
        if store.get_instance(&name)?.is_none() {
            return Err(CliError::NotFound(format!("'{name}' is not in the roster")).into());
        }
        if !ctx.config.relay_active() {
            return Err(CliError::Input("relay is not enabled".into()).into());
        }
        let own = device_identity(&ctx.dirs)?;
        let from = identity::resolve(&store, None).map(|id| id.name).unwrap_or_default();
        send_control(&ctx.config, &own, &from, "stop", target, short).await?;
        println!("Sent stop for {name} to device {short}");
        return Ok(0);
    }

    if !lifecycle::stop_instance(&store, &name)? {
        return Err(CliError::NotFound(format!("'{name}' is not registered")).into());
    }
    println!("Stopped {name}");
    Ok(0)
}
