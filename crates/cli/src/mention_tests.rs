// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::store::InstanceRow;

use super::route;

fn roster(entries: &[(&str, Option<&str>)]) -> Vec<InstanceRow> {
    entries
        .iter()
        .map(|(name, tag)| {
            let mut row = InstanceRow::new(*name);
            row.tag = tag.map(str::to_owned);
            row
        })
        .collect()
}

#[test]
fn plain_fanout_to_named_instances() {
    let roster = roster(&[("alpha", None), ("bravo", None), ("gamma", None)]);
    let routed = route("@bravo @gamma hello", "alpha", &roster);
    assert_eq!(routed.mentions, vec!["bravo", "gamma"]);
    assert_eq!(routed.recipients, vec!["bravo", "gamma"]);
}

#[test]
fn tag_suffix_broadcasts_to_group() {
    let roster = roster(&[
        ("api-luna", Some("api")),
        ("api-nova", Some("api")),
        ("web-kira", Some("web")),
    ]);
    let routed = route("@api- deploy", "web-kira", &roster);
    assert_eq!(routed.mentions, vec!["api-luna", "api-nova"]);
}

#[test]
fn bare_tag_matches_when_no_name_collides() {
    let roster = roster(&[("api-luna", Some("api")), ("api-nova", Some("api"))]);
    let routed = route("@api status?", "api-nova", &roster);
    // Self is dropped from the tag expansion.
    assert_eq!(routed.recipients, vec!["api-luna"]);
}

#[test]
fn name_wins_over_tag_collision() {
    let mut roster = roster(&[("luna", None), ("grouped", Some("luna"))]);
    roster[0].tag = None;
    let routed = route("@luna hello", "grouped", &roster);
    assert_eq!(routed.recipients, vec!["luna"]);
}

#[test]
fn prefix_match_skips_underscore_segments() {
    let roster = roster(&[("luna_sub_1", None), ("lunatic", None)]);
    let routed = route("@luna hi", "sender", &roster);
    // luna_sub_1 is protected by the underscore rule; lunatic matches.
    assert_eq!(routed.recipients, vec!["lunatic"]);
}

#[test]
fn exact_match_preferred_over_prefix() {
    let roster = roster(&[("luna", None), ("lunatic", None)]);
    let routed = route("@luna hi", "sender", &roster);
    assert_eq!(routed.recipients, vec!["luna"]);
}

#[test]
fn cross_device_composite_key() {
    let roster = roster(&[("relaytest:AAAA", None), ("relaytest", None)]);
    let routed = route("@relaytest:AAAA ping", "local", &roster);
    assert_eq!(routed.recipients, vec!["relaytest:AAAA"]);
}

#[test]
fn scanning_stops_at_first_non_mention_token() {
    let roster = roster(&[("alpha", None), ("bravo", None)]);
    let routed = route("@alpha tell @bravo I said hi", "sender", &roster);
    assert_eq!(routed.recipients, vec!["alpha"]);
}

#[test]
fn unknown_tokens_drop_silently_and_empty_is_valid() {
    let roster = roster(&[("alpha", None)]);
    let routed = route("@ghost hello", "alpha", &roster);
    assert!(routed.recipients.is_empty());
    assert!(routed.mentions.is_empty());
}

#[test]
fn duplicate_mentions_dedup_preserving_order() {
    let roster = roster(&[("alpha", None), ("bravo", None)]);
    let routed = route("@bravo @alpha @bravo hi", "sender", &roster);
    assert_eq!(routed.recipients, vec!["bravo", "alpha"]);
}

#[test]
fn trailing_punctuation_is_tolerated() {
    let roster = roster(&[("alpha", None)]);
    let routed = route("@alpha, hello", "sender", &roster);
    assert_eq!(routed.recipients, vec!["alpha"]);
}

#[test]
fn repeat_call_is_stable_given_same_roster() {
    let roster = roster(&[("alpha", None), ("bravo", None)]);
    let first = route("@alpha @bravo hi", "sender", &roster);
    let second = route("@alpha @bravo hi", "sender", &roster);
    assert_eq!(first, second);
}
