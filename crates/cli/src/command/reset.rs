// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `huddle reset` — archive the store and start over. Device identity
//! files survive; everything else goes.

use anyhow::Result;
use clap::Args;

use crate::context::Context;

#[derive(Debug, Clone, Default, Args)]
pub struct ResetArgs {}

pub fn run(ctx: &Context, _args: &ResetArgs) -> Result<i32> {
    let store = ctx.store()?;
    match store.reset()? {
        Some(archive) => println!("Reset complete (archived to {})", archive.display()),
        None => println!("Reset complete"),
    }
    Ok(0)
}
