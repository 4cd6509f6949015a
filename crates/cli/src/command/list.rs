// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `huddle list` — the roster, one line per instance.

use anyhow::Result;
use clap::Args;

use crate::context::Context;
use crate::event::epoch_now;
use crate::status::Status;
use crate::store::{InstanceFilter, InstanceRow, Tool};
use crate::tips;

#[derive(Debug, Clone, Default, Args)]
pub struct ListArgs {
    /// Only instances with this tag.
    #[arg(long)]
    pub tag: Option<String>,
    /// Only instances driven by this tool.
    #[arg(long)]
    pub tool: Option<String>,
    /// Only instances in this status.
    #[arg(long)]
    pub status: Option<String>,
    /// Exclude relay-imported instances.
    #[arg(long)]
    pub local: bool,
    /// Identity for one-time tip tracking.
    #[arg(long)]
    pub name: Option<String>,
}

/// Compact age like `3s`, `2m`, `1h`, `4d`.
pub fn format_age(secs: i64) -> String {
    let secs = secs.max(0);
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86400)
    }
}

/// One roster line.
pub fn format_row(row: &InstanceRow, now: i64) -> String {
    let mut line = format!(
        "{} {} [{}]",
        row.status.glyph(),
        row.name,
        row.tool.as_str().to_uppercase()
    );
    if let Some(ref tag) = row.tag {
        line.push_str(&format!(" #{tag}"));
    }
    line.push_str(&format!(" {}", row.status.as_str()));
    if !row.status_context.is_empty() {
        line.push_str(&format!(" ({})", row.status_context));
    }
    if row.status_time > 0 {
        line.push_str(&format!(" {}", format_age(now - row.status_time)));
    }
    if row.is_remote() {
        line.push_str(" [remote]");
    }
    line
}

pub fn run(ctx: &Context, args: &ListArgs) -> Result<i32> {
    let store = ctx.store()?;
    let filter = InstanceFilter {
        tag: args.tag.clone(),
        tool: args.tool.as_deref().map(str::parse::<Tool>).transpose()?,
        status: args.status.as_deref().map(str::parse::<Status>).transpose()?,
        local_only: args.local,
    };

    let rows = store.iter_instances(&filter)?;
    if rows.is_empty() {
        println!("No instances. Run: huddle start");
        return Ok(0);
    }

    let now = epoch_now();
    for row in &rows {
        println!("{}", format_row(row, now));
    }

    let tip_id = args
        .name
        .clone()
        .or_else(|| std::env::var("HUDDLE_NAME").ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| "_global".to_owned());
    if let Some(tip) = tips::once(&store, &tip_id, "list:status")? {
        println!("\n{tip}");
    }
    Ok(0)
}

#[cfg(test)]
#[path = "list_tests.rs"]
mod tests;
