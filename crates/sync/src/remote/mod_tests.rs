// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use serde_json::json;

fn doc(group_id: &str) -> RemoteDocument {
    RemoteDocument {
        id: "d1".to_string(),
        entity_type: EntityType::Meal,
        group_id: group_id.to_string(),
        natural_key: None,
        fields: json!({}),
        updated_at: 1,
        deleted: false,
    }
}

#[test]
fn filter_by_group() {
    let filter = DocumentFilter::group("g1");
    assert!(filter.matches(&doc("g1")));
    assert!(!filter.matches(&doc("g2")));
    assert!(DocumentFilter::default().matches(&doc("g2")));
}

#[test]
fn merge_overwrites_present_fields_only() {
    let mut stored = json!({"title": "rice", "amount": 500, "note": "keep"});
    merge_fields(&mut stored, json!({"amount": 650, "title": "rice"}));
    assert_eq!(stored, json!({"title": "rice", "amount": 650, "note": "keep"}));
}

#[test]
fn merge_replaces_non_objects() {
    let mut stored = json!(null);
    merge_fields(&mut stored, json!({"a": 1}));
    assert_eq!(stored, json!({"a": 1}));
}
