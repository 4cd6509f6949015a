// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `huddle start` — register an identity in the roster — and
//! `huddle resume` — revive a stopped one from its snapshot.

use anyhow::Result;
use clap::Args;

use crate::context::Context;
use crate::identity;
use crate::lifecycle;
use crate::store::{InstanceRow, Tool};

#[derive(Debug, Clone, Default, Args)]
pub struct StartArgs {
    /// Instance name (generated when omitted).
    #[arg(long = "as")]
    pub as_name: Option<String>,
    /// Group tag for prefix routing (@tag-).
    #[arg(long)]
    pub tag: Option<String>,
    /// Driving tool: claude, gemini, codex or adhoc.
    #[arg(long, default_value = "adhoc")]
    pub tool: String,
    /// Headless instance (no interactive terminal).
    #[arg(long)]
    pub background: bool,
    /// Tool session id to bind immediately.
    #[arg(long)]
    pub session: Option<String>,
}

pub fn run(ctx: &Context, args: &StartArgs) -> Result<i32> {
    let store = ctx.store()?;

    let name = match &args.as_name {
        Some(name) => {
            lifecycle::validate_name(name)?;
            name.clone()
        }
        None => lifecycle::generate_name(&store)?,
    };

    let mut row = InstanceRow::new(&name);
    row.tag = args.tag.clone();
    row.tool = args.tool.parse::<Tool>()?;
    row.background = args.background;
    row.directory = std::env::current_dir()
        .map(|d| d.display().to_string())
        .unwrap_or_default();
    row.wait_timeout = ctx.config.wait_timeout as i64;
    row.subagent_timeout = ctx.config.subagent_timeout as i64;
    row.hints = ctx.config.hints.clone().unwrap_or_default();
    row.session_id = args.session.clone();

    lifecycle::register_instance(&store, &row)?;
    if let Some(ref session) = args.session {
        identity::bind_session(&store, session, &name, false)?;
    }

    println!("Started {name} ({})", row.tool);
    println!("Send to it: huddle send '@{name} hello'");
    Ok(0)
}

#[derive(Debug, Clone, Args)]
pub struct ResumeArgs {
    /// Stopped instance to revive. The snapshot cursor is restored, so
    /// messages sent while stopped are delivered on the next read.
    pub name: String,
}

pub fn run_resume(ctx: &Context, args: &ResumeArgs) -> Result<i32> {
    let store = ctx.store()?;
    let row = lifecycle::resume_instance(&store, &args.name)?;
    println!("Resumed {} ({})", row.name, row.tool);
    Ok(0)
}

#[cfg(test)]
#[path = "start_tests.rs"]
mod tests;
