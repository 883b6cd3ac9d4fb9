use std::path::PathBuf;

use serde_json::Value;
use tsm_core::core_api::{Engine, Session};
use tsm_core::merge::MergeReport;
use tsm_core::profile::ProfileSelector;
use tsm_render::{
    JsonStyle, TextRenderOptions, render_groups_json, render_groups_text, render_items_text,
    render_report_json, render_report_text, render_summary_json, render_summary_text,
};

fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..")
}

fn session_from_fixture(name: &str) -> Session {
    Engine::new()
        .open_path(
            &workspace_root().join("tests/fixtures").join(name),
            &ProfileSelector::default(),
        )
        .expect("fixture should parse")
}

fn object_keys(value: &Value) -> Vec<&str> {
    value
        .as_object()
        .expect("json should be an object")
        .keys()
        .map(String::as_str)
        .collect()
}

#[test]
fn summary_json_uses_canonical_key_order() {
    let session = session_from_fixture("populated_profile.lua");
    let value = render_summary_json(&session.summary(), JsonStyle::CanonicalV1);

    assert_eq!(
        object_keys(&value),
        vec![
            "profile",
            "groups",
            "items",
            "tree_status_entries",
            "collapsed_entries",
            "other_keys",
            "dialect",
            "top_groups",
            "issues",
        ]
    );
    assert_eq!(value["dialect"], "legacy");
    assert_eq!(value["top_groups"][0]["path"], "Tradeskills`Herbs");
    assert_eq!(value["top_groups"][0]["items"], 2);
    assert_eq!(value["issues"], Value::Array(Vec::new()));
}

#[test]
fn summary_text_lists_counts_and_top_groups() {
    let session = session_from_fixture("populated_profile.lua");
    let rendered = render_summary_text(&session.summary());

    assert!(rendered.starts_with("Profile: Default\nGroups: 6\nItems: 5 (legacy keys)\n"));
    assert!(rendered.contains("Top groups by item count:\n       2  Tradeskills`Herbs\n"));
    assert!(!rendered.contains("Issues:"));
}

#[test]
fn blank_profile_summary_has_no_dialect() {
    let session = session_from_fixture("blank_profile.lua");
    let summary = session.summary();
    let value = render_summary_json(&summary, JsonStyle::CanonicalV1);
    assert_eq!(value["dialect"], Value::Null);
    assert_eq!(value["top_groups"], Value::Array(Vec::new()));

    let rendered = render_summary_text(&summary);
    assert!(rendered.contains("Items: 0\n"));
    assert!(!rendered.contains("Top groups"));
}

#[test]
fn groups_render_as_an_indented_tree() {
    let session = session_from_fixture("populated_profile.lua");
    let groups = session.groups();

    assert_eq!(
        render_groups_text(&groups),
        "Tradeskills (0 items)\n  Herbs (2 items)\n  Cloth (1 item)\nConsumables (1 item)\nMisc (0 items)\n  Odd`Name (1 item)\n"
    );

    let value = render_groups_json(&groups, JsonStyle::CanonicalV1);
    let first = &value[0];
    assert_eq!(
        object_keys(first),
        vec!["path", "name", "depth", "items", "children", "expanded"]
    );
    assert_eq!(first["children"], 2);
    assert_eq!(value[5]["path"], "Misc`Odd\\`Name");
    assert_eq!(value[5]["name"], "Odd`Name");
}

#[test]
fn items_align_keys_in_a_column() {
    let session = session_from_fixture("crlf_compact_profile.lua");
    let items = session.items(None).expect("items list");
    let rendered = render_items_text(&items);
    let lines: Vec<&str> = rendered.lines().collect();

    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], format!("{:<24}  Herbs", "i:2447"));
    assert_eq!(lines[1], format!("{:<24}  Herbs", "i:2449::1:2"));
    assert_eq!(render_items_text(&[]), "No items.\n");
}

#[test]
fn report_text_skips_zero_counters_unless_verbose() {
    let report = MergeReport {
        groups_created: 3,
        items_added: 1,
        visibility_added: 3,
        ..MergeReport::default()
    };
    assert_eq!(
        render_report_text(&report, false, TextRenderOptions::default()),
        "Groups created: 3\nItems added: 1\nTree status entries added: 3\n"
    );

    let verbose = render_report_text(&report, true, TextRenderOptions { verbose: true });
    assert!(verbose.starts_with("Dry run, nothing was written.\n"));
    assert!(verbose.contains("Items removed: 0\n"));

    let unchanged = MergeReport {
        items_unchanged: 4,
        ..MergeReport::default()
    };
    assert_eq!(
        render_report_text(&unchanged, false, TextRenderOptions::default()),
        "No changes.\n"
    );
}

#[test]
fn report_json_carries_every_counter() {
    let report = MergeReport {
        items_removed: 2,
        ..MergeReport::default()
    };
    let value = render_report_json(&report, true, JsonStyle::CanonicalV1);
    let json: Value = serde_json::from_str(
        &serde_json::to_string(&value).expect("rendered json should serialize"),
    )
    .expect("serialized json should parse");

    assert_eq!(json["changed"], true);
    assert_eq!(json["dry_run"], true);
    assert_eq!(json["items_removed"], 2);
    assert_eq!(object_keys(&json).len(), 12);
}
