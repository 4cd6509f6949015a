// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User configuration (`config.toml` in the state directory).
//!
//! The file is read as a snapshot, mutated in memory and written back
//! whole — concurrent writers are rare (relay setup commands) and last
//! write wins. Missing file means defaults.

use std::fs;
use std::path::Path;

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};

fn default_wait_timeout() -> u64 {
    60
}

fn default_subagent_timeout() -> u64 {
    300
}

/// Persistent configuration snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HuddleConfig {
    /// Relay group id (UUID string). Topic root for MQTT.
    pub relay_id: Option<String>,
    /// Pinned broker URL (`mqtt://host:port` or `mqtts://host:port`).
    pub relay: Option<String>,
    /// Whether cross-device sync is enabled.
    pub relay_enabled: bool,
    /// Shared broker password for private brokers.
    pub relay_token: Option<String>,
    /// Default blocking-wait timeout for `listen` and hook waits, seconds.
    pub wait_timeout: u64,
    /// Default timeout for subagent tracking, seconds.
    pub subagent_timeout: u64,
    /// Free-form hints injected into newly registered instances.
    pub hints: Option<String>,
}

impl Default for HuddleConfig {
    fn default() -> Self {
        Self {
            relay_id: None,
            relay: None,
            relay_enabled: false,
            relay_token: None,
            wait_timeout: default_wait_timeout(),
            subagent_timeout: default_subagent_timeout(),
            hints: None,
        }
    }
}

impl HuddleConfig {
    /// Load the config file, or defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(text) => toml::from_str(&text)
                .with_context(|| format!("malformed config {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("cannot read {}", path.display())),
        }
    }

    /// Write the snapshot back to disk.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self).context("serialize config")?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, text).with_context(|| format!("cannot write {}", path.display()))?;
        Ok(())
    }

    /// True when a relay group is configured and enabled.
    pub fn relay_active(&self) -> bool {
        self.relay_enabled && self.relay_id.is_some() && self.relay.is_some()
    }
}

/// Parse the passthrough `env` file: one `KEY=VALUE` per line, `#`
/// comments and blank lines ignored. Missing file means empty.
pub fn load_env_extras(path: &Path) -> Vec<(String, String)> {
    let Ok(text) = fs::read_to_string(path) else {
        return Vec::new();
    };
    text.lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            let value = value.trim();
            if key.is_empty() || value.is_empty() {
                return None;
            }
            Some((key.to_owned(), value.to_owned()))
        })
        .collect()
}

/// Environment for launched agents: `HUDDLE_*` settings from the config
/// plus passthrough vars from the env file. The launcher layers the
/// shell environment on top, so shell > env file > config.
pub fn build_agent_env(config: &HuddleConfig, env_file: &Path) -> Vec<(String, String)> {
    let mut env: Vec<(String, String)> = Vec::new();
    env.push(("HUDDLE_WAIT_TIMEOUT".to_owned(), config.wait_timeout.to_string()));
    if let Some(ref hints) = config.hints {
        if !hints.is_empty() {
            env.push(("HUDDLE_HINTS".to_owned(), hints.clone()));
        }
    }
    for (key, value) in load_env_extras(env_file) {
        if !env.iter().any(|(k, _)| k == &key) {
            env.push((key, value));
        }
    }
    env
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
