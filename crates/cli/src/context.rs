// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-invocation context threaded through every core operation.
//!
//! There is no global state: CLI commands, hooks and the daemon each build
//! a `Context` once and pass it down explicitly.

use std::path::Path;

use anyhow::Result;

use crate::config::HuddleConfig;
use crate::paths::HuddleDirs;
use crate::store::Store;

/// Immutable invocation context: resolved state dir + loaded config.
#[derive(Debug, Clone)]
pub struct Context {
    pub dirs: HuddleDirs,
    pub config: HuddleConfig,
}

impl Context {
    /// Resolve dirs (honoring an explicit `--dir`), ensure they exist and
    /// load the config snapshot.
    pub fn init(override_dir: Option<&Path>) -> Result<Self> {
        let dirs = HuddleDirs::resolve(override_dir)?;
        dirs.ensure()?;
        let config = HuddleConfig::load(&dirs.config_path())?;
        Ok(Self { dirs, config })
    }

    /// Open the store at this context's db path.
    pub fn store(&self) -> Result<Store> {
        Store::open(&self.dirs.db_path())
    }

    /// Re-read the config snapshot from disk (after a save by a command).
    pub fn reload_config(&mut self) -> Result<()> {
        self.config = HuddleConfig::load(&self.dirs.config_path())?;
        Ok(())
    }
}
