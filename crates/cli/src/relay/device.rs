// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-install device identity: a 128-bit UUID generated at first use and
//! a 4-character uppercase short id derived from it. Both are persisted
//! under `.tmp/` and never rotated; `reset` leaves them alone.

use std::fs;

use anyhow::{Context as _, Result};
use uuid::Uuid;

use crate::paths::HuddleDirs;

/// This device's stable identity pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub uuid: String,
    pub short: String,
}

/// Derive the short id: first four hex characters of the UUID, uppercased.
/// Collisions across devices are possible and handled by the relay's
/// short-id claim table, not prevented here.
pub fn derive_short(uuid: &str) -> String {
    uuid.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(4)
        .collect::<String>()
        .to_uppercase()
}

/// Load (or create on first use) the device identity files.
pub fn device_identity(dirs: &HuddleDirs) -> Result<DeviceIdentity> {
    dirs.ensure()?;

    let uuid_path = dirs.device_id_path();
    let uuid = match fs::read_to_string(&uuid_path) {
        Ok(text) if !text.trim().is_empty() => text.trim().to_owned(),
        _ => {
            let fresh = Uuid::new_v4().to_string();
            fs::write(&uuid_path, &fresh)
                .with_context(|| format!("cannot write {}", uuid_path.display()))?;
            fresh
        }
    };

    let short_path = dirs.device_short_path();
    let short = match fs::read_to_string(&short_path) {
        Ok(text) if !text.trim().is_empty() => text.trim().to_owned(),
        _ => {
            let derived = derive_short(&uuid);
            fs::write(&short_path, &derived)
                .with_context(|| format!("cannot write {}", short_path.display()))?;
            derived
        }
    };

    Ok(DeviceIdentity { uuid, short })
}

#[cfg(test)]
#[path = "device_tests.rs"]
mod tests;
