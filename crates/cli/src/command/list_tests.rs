// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::status::Status;
use crate::store::{InstanceRow, Tool};

use super::{format_age, format_row};

#[test]
fn ages_are_compact() {
    assert_eq!(format_age(5), "5s");
    assert_eq!(format_age(125), "2m");
    assert_eq!(format_age(7200), "2h");
    assert_eq!(format_age(200_000), "2d");
    assert_eq!(format_age(-5), "0s");
}

#[test]
fn row_line_carries_glyph_tool_and_context() {
    let mut row = InstanceRow::new("api-luna");
    row.tag = Some("api".into());
    row.tool = Tool::Claude;
    row.status = Status::Blocked;
    row.status_context = "Permission denied".into();
    row.status_time = 0;

    let line = format_row(&row, 100);
    assert!(line.starts_with("■ api-luna [CLAUDE] #api blocked"));
    assert!(line.contains("(Permission denied)"));
    assert!(!line.contains("[remote]"));

    row.origin_device_id = "dev-b".into();
    assert!(format_row(&row, 100).contains("[remote]"));
}
