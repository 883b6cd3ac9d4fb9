use serde::{Deserialize, Serialize};

use crate::group_path::GroupPath;
use crate::item_string::Dialect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileIssue {
    /// Some group ancestors have no `groupTreeStatus` entry.
    MissingVisibility,
    /// Items or status entries point at groups that do not exist.
    OrphanedReferences,
    /// Entries inside recognized tables that are kept as unread text.
    UnreadEntries,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupCount {
    pub path: GroupPath,
    pub items: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileSummary {
    pub profile: String,
    pub groups: usize,
    pub items: usize,
    pub tree_status_entries: usize,
    pub collapsed_entries: usize,
    pub other_keys: usize,
    pub dialect: Option<Dialect>,
    pub top_groups: Vec<GroupCount>,
    pub issues: Vec<ProfileIssue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupEntry {
    pub path: GroupPath,
    pub name: String,
    pub depth: usize,
    pub items: usize,
    pub children: usize,
    pub expanded: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ItemEntry {
    pub key: String,
    pub id: u32,
    pub modifiers: Vec<i32>,
    pub group: GroupPath,
}
