// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Layout of the persistent state directory.
//!
//! Everything huddle writes lives under one root (default `~/.huddle`,
//! override with `HUDDLE_DIR`): the store, the user config, the device
//! identity files and the daemon pid file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};

pub const DB_FILE: &str = "huddle.db";
pub const ENV_FILE: &str = "env";
pub const CONFIG_FILE: &str = "config.toml";
pub const DAEMON_PID_FILE: &str = "huddled.pid";
pub const DAEMON_LOG_FILE: &str = "huddled.log";

/// Resolved state directory with accessors for the well-known files.
#[derive(Debug, Clone)]
pub struct HuddleDirs {
    root: PathBuf,
}

impl HuddleDirs {
    /// Resolve the state root: explicit override > `HUDDLE_DIR` > `~/.huddle`.
    pub fn resolve(override_dir: Option<&Path>) -> Result<Self> {
        let root = match override_dir {
            Some(dir) => dir.to_path_buf(),
            None => match std::env::var_os("HUDDLE_DIR") {
                Some(dir) if !dir.is_empty() => PathBuf::from(dir),
                _ => dirs::home_dir()
                    .context("cannot determine home directory")?
                    .join(".huddle"),
            },
        };
        Ok(Self { root })
    }

    /// Use an explicit root (tests, daemon with `--dir`).
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the root and `.tmp` subdirectory if missing.
    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(self.tmp_dir())
            .with_context(|| format!("cannot create state dir {}", self.root.display()))?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn db_path(&self) -> PathBuf {
        self.root.join(DB_FILE)
    }

    pub fn env_file(&self) -> PathBuf {
        self.root.join(ENV_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join(".tmp")
    }

    pub fn device_id_path(&self) -> PathBuf {
        self.tmp_dir().join("device_id")
    }

    pub fn device_short_path(&self) -> PathBuf {
        self.tmp_dir().join("device_short")
    }

    pub fn daemon_pid_path(&self) -> PathBuf {
        self.root.join(DAEMON_PID_FILE)
    }

    pub fn daemon_log_path(&self) -> PathBuf {
        self.root.join(DAEMON_LOG_FILE)
    }
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
