// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hermetic harness for end-to-end scenario tests: a throwaway state
//! directory with a real store file, plus seeding helpers.

use anyhow::Result;

use huddle::config::HuddleConfig;
use huddle::context::Context;
use huddle::identity;
use huddle::paths::HuddleDirs;
use huddle::store::{InstanceRow, Store};

/// One disposable huddle workspace.
pub struct Workspace {
    _tmp: tempfile::TempDir,
    pub ctx: Context,
}

impl Workspace {
    pub fn new() -> Result<Self> {
        let tmp = tempfile::tempdir()?;
        let dirs = HuddleDirs::at(tmp.path());
        dirs.ensure()?;
        let ctx = Context { dirs, config: HuddleConfig::default() };
        Ok(Self { _tmp: tmp, ctx })
    }

    pub fn store(&self) -> Result<Store> {
        self.ctx.store()
    }
}

/// Register an instance row directly (no CLI round trip).
pub fn seed_instance(store: &Store, name: &str) -> Result<InstanceRow> {
    let row = InstanceRow::new(name);
    store.insert_instance(&row)?;
    Ok(row)
}

/// Register an instance with a tag.
pub fn seed_tagged(store: &Store, name: &str, tag: &str) -> Result<InstanceRow> {
    let mut row = InstanceRow::new(name);
    row.tag = Some(tag.to_owned());
    store.insert_instance(&row)?;
    Ok(row)
}

/// Bind a tool session id to an instance, as the launcher would.
pub fn seed_session_binding(store: &Store, session_id: &str, name: &str) -> Result<()> {
    identity::bind_session(store, session_id, name, false)?;
    Ok(())
}
