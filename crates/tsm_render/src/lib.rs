use std::fmt::Write as _;

use serde_json::{Map as JsonMap, Value as JsonValue};
use tsm_core::core_api::{GroupEntry, ItemEntry, ProfileIssue, ProfileSummary};
use tsm_core::merge::MergeReport;

const GROUP_INDENT: &str = "  ";
const COUNT_COL_WIDTH: usize = 6;
const KEY_COL_MIN_WIDTH: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonStyle {
    #[default]
    CanonicalV1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextRenderOptions {
    /// Also list counters that are zero.
    pub verbose: bool,
}

pub fn render_summary_json(summary: &ProfileSummary, style: JsonStyle) -> JsonValue {
    match style {
        JsonStyle::CanonicalV1 => JsonValue::Object(summary_json(summary)),
    }
}

pub fn render_groups_json(groups: &[GroupEntry], style: JsonStyle) -> JsonValue {
    match style {
        JsonStyle::CanonicalV1 => JsonValue::Array(groups.iter().map(group_to_json).collect()),
    }
}

pub fn render_items_json(items: &[ItemEntry], style: JsonStyle) -> JsonValue {
    match style {
        JsonStyle::CanonicalV1 => JsonValue::Array(items.iter().map(item_to_json).collect()),
    }
}

pub fn render_report_json(report: &MergeReport, dry_run: bool, style: JsonStyle) -> JsonValue {
    match style {
        JsonStyle::CanonicalV1 => {
            let mut out = JsonMap::new();
            out.insert("changed".to_string(), JsonValue::Bool(!report.is_noop()));
            out.insert("dry_run".to_string(), JsonValue::Bool(dry_run));
            for (key, _, value) in report_counters(report) {
                out.insert(key.to_string(), JsonValue::from(value));
            }
            JsonValue::Object(out)
        }
    }
}

fn summary_json(summary: &ProfileSummary) -> JsonMap<String, JsonValue> {
    let mut out = JsonMap::new();
    out.insert(
        "profile".to_string(),
        JsonValue::String(summary.profile.clone()),
    );
    out.insert("groups".to_string(), JsonValue::from(summary.groups));
    out.insert("items".to_string(), JsonValue::from(summary.items));
    out.insert(
        "tree_status_entries".to_string(),
        JsonValue::from(summary.tree_status_entries),
    );
    out.insert(
        "collapsed_entries".to_string(),
        JsonValue::from(summary.collapsed_entries),
    );
    out.insert("other_keys".to_string(), JsonValue::from(summary.other_keys));
    out.insert(
        "dialect".to_string(),
        match summary.dialect {
            Some(dialect) => JsonValue::String(dialect.as_str().to_string()),
            None => JsonValue::Null,
        },
    );
    out.insert(
        "top_groups".to_string(),
        JsonValue::Array(
            summary
                .top_groups
                .iter()
                .map(|count| {
                    let mut m = JsonMap::new();
                    m.insert("path".to_string(), JsonValue::String(count.path.encode()));
                    m.insert("items".to_string(), JsonValue::from(count.items));
                    JsonValue::Object(m)
                })
                .collect(),
        ),
    );
    out.insert(
        "issues".to_string(),
        JsonValue::Array(
            summary
                .issues
                .iter()
                .map(|issue| JsonValue::String(issue_key(*issue).to_string()))
                .collect(),
        ),
    );
    out
}

fn group_to_json(group: &GroupEntry) -> JsonValue {
    let mut m = JsonMap::new();
    m.insert("path".to_string(), JsonValue::String(group.path.encode()));
    m.insert("name".to_string(), JsonValue::String(group.name.clone()));
    m.insert("depth".to_string(), JsonValue::from(group.depth));
    m.insert("items".to_string(), JsonValue::from(group.items));
    m.insert("children".to_string(), JsonValue::from(group.children));
    m.insert(
        "expanded".to_string(),
        match group.expanded {
            Some(v) => JsonValue::Bool(v),
            None => JsonValue::Null,
        },
    );
    JsonValue::Object(m)
}

fn item_to_json(item: &ItemEntry) -> JsonValue {
    let mut m = JsonMap::new();
    m.insert("key".to_string(), JsonValue::String(item.key.clone()));
    m.insert("id".to_string(), JsonValue::from(item.id));
    m.insert(
        "modifiers".to_string(),
        JsonValue::Array(item.modifiers.iter().map(|v| JsonValue::from(*v)).collect()),
    );
    m.insert("group".to_string(), JsonValue::String(item.group.encode()));
    JsonValue::Object(m)
}

fn report_counters(report: &MergeReport) -> [(&'static str, &'static str, usize); 10] {
    [
        ("groups_created", "Groups created", report.groups_created),
        ("groups_removed", "Groups removed", report.groups_removed),
        ("groups_renamed", "Groups renamed", report.groups_renamed),
        ("items_added", "Items added", report.items_added),
        ("items_moved", "Items moved", report.items_moved),
        ("items_unchanged", "Items unchanged", report.items_unchanged),
        ("items_removed", "Items removed", report.items_removed),
        ("visibility_added", "Tree status entries added", report.visibility_added),
        ("visibility_removed", "Tree status entries removed", report.visibility_removed),
        ("collapsed_cleared", "Collapsed entries cleared", report.collapsed_cleared),
    ]
}

fn issue_key(issue: ProfileIssue) -> &'static str {
    match issue {
        ProfileIssue::MissingVisibility => "missing_visibility",
        ProfileIssue::OrphanedReferences => "orphaned_references",
        ProfileIssue::UnreadEntries => "unread_entries",
    }
}

fn issue_text(issue: ProfileIssue) -> &'static str {
    match issue {
        ProfileIssue::MissingVisibility => "some groups have no tree status entry and stay hidden",
        ProfileIssue::OrphanedReferences => "entries point at groups that do not exist",
        ProfileIssue::UnreadEntries => {
            "some group or item entries could not be read and are kept as is"
        }
    }
}

pub fn render_summary_text(summary: &ProfileSummary) -> String {
    let mut out = String::new();
    writeln!(&mut out, "Profile: {}", summary.profile).expect("writing to String cannot fail");
    writeln!(&mut out, "Groups: {}", summary.groups).expect("writing to String cannot fail");
    let dialect = match summary.dialect {
        Some(dialect) => format!(" ({dialect} keys)"),
        None => String::new(),
    };
    writeln!(&mut out, "Items: {}{dialect}", summary.items).expect("writing to String cannot fail");
    writeln!(
        &mut out,
        "Tree status entries: {}",
        summary.tree_status_entries
    )
    .expect("writing to String cannot fail");
    writeln!(&mut out, "Collapsed entries: {}", summary.collapsed_entries)
        .expect("writing to String cannot fail");
    writeln!(&mut out, "Other profile keys: {}", summary.other_keys)
        .expect("writing to String cannot fail");

    if !summary.top_groups.is_empty() {
        writeln!(&mut out).expect("writing to String cannot fail");
        writeln!(&mut out, "Top groups by item count:").expect("writing to String cannot fail");
        for count in &summary.top_groups {
            writeln!(
                &mut out,
                "{GROUP_INDENT}{:>width$}  {}",
                count.items,
                count.path,
                width = COUNT_COL_WIDTH
            )
            .expect("writing to String cannot fail");
        }
    }

    if !summary.issues.is_empty() {
        writeln!(&mut out).expect("writing to String cannot fail");
        writeln!(&mut out, "Issues:").expect("writing to String cannot fail");
        for issue in &summary.issues {
            writeln!(&mut out, "{GROUP_INDENT}- {}", issue_text(*issue))
                .expect("writing to String cannot fail");
        }
    }
    out
}

/// One line per group, indented by depth, in file order.
pub fn render_groups_text(groups: &[GroupEntry]) -> String {
    if groups.is_empty() {
        return "No groups.\n".to_string();
    }
    let mut out = String::new();
    for group in groups {
        let indent = GROUP_INDENT.repeat(group.depth.saturating_sub(1));
        let status = match group.expanded {
            Some(true) => "",
            Some(false) => " [collapsed]",
            None => " [no tree status]",
        };
        writeln!(
            &mut out,
            "{indent}{} ({}){status}",
            group.name,
            plural(group.items, "item")
        )
        .expect("writing to String cannot fail");
    }
    out
}

pub fn render_items_text(items: &[ItemEntry]) -> String {
    if items.is_empty() {
        return "No items.\n".to_string();
    }
    let width = items
        .iter()
        .map(|item| item.key.len())
        .max()
        .unwrap_or_default()
        .max(KEY_COL_MIN_WIDTH);
    let mut out = String::new();
    for item in items {
        writeln!(&mut out, "{:<width$}  {}", item.key, item.group)
            .expect("writing to String cannot fail");
    }
    out
}

pub fn render_report_text(
    report: &MergeReport,
    dry_run: bool,
    options: TextRenderOptions,
) -> String {
    let mut out = String::new();
    if dry_run {
        writeln!(&mut out, "Dry run, nothing was written.").expect("writing to String cannot fail");
    }
    if report.is_noop() {
        writeln!(&mut out, "No changes.").expect("writing to String cannot fail");
        if !options.verbose {
            return out;
        }
    }
    for (_, label, value) in report_counters(report) {
        if value == 0 && !options.verbose {
            continue;
        }
        writeln!(&mut out, "{label}: {value}")
            .expect("writing to String cannot fail");
    }
    out
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {noun}")
    } else {
        format!("{count} {noun}s")
    }
}
