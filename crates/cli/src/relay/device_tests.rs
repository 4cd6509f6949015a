// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::paths::HuddleDirs;

use super::{derive_short, device_identity};

#[test]
fn identity_is_created_once_and_stable() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let dirs = HuddleDirs::at(tmp.path());

    let first = device_identity(&dirs)?;
    assert_eq!(first.short.len(), 4);
    assert!(first.short.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));

    let second = device_identity(&dirs)?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn short_id_derivation() {
    assert_eq!(derive_short("ab1e2a1c-9d3f-4a61-8b72-d51a10f2b9aa"), "AB1E");
    assert_eq!(derive_short("00ff"), "00FF");
}
