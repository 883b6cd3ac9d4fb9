use crate::group_path::{GroupPath, TreeStatusKey};
use crate::item_string::{self, Dialect, ItemIdentity};

use super::table::TableEntries;

/// Modules every TSM 2.x group carries an operation slot for.
pub const DEFAULT_OPERATION_MODULES: [&str; 5] =
    ["Mailing", "Auctioning", "Crafting", "Shopping", "Warehousing"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupMeta {
    /// Value text exactly as it appeared in the file.
    Raw(String),
    /// Fresh group: one empty operation slot per module.
    Template(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemAssignment {
    /// Key text as stored (`item:...` or `i:...`). Kept when the item moves.
    pub key_text: String,
    pub path: GroupPath,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtherKey {
    pub name: Option<String>,
    pub raw: String,
    pub(crate) terminated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    Groups,
    Items,
    TreeStatus,
    CollapsedStatus,
}

impl TableKind {
    pub const ALL: [TableKind; 4] = [
        TableKind::Groups,
        TableKind::Items,
        TableKind::TreeStatus,
        TableKind::CollapsedStatus,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Groups => "groups",
            Self::Items => "items",
            Self::TreeStatus => "groupTreeStatus",
            Self::CollapsedStatus => "groupTreeCollapsedStatus",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }

    /// Status tables keep their chain keys in a nested `groups` sub-table.
    pub(crate) fn is_status(&self) -> bool {
        matches!(self, Self::TreeStatus | Self::CollapsedStatus)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Section {
    Table(TableKind),
    Other(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProfileLayout {
    pub(crate) prelude: String,
    pub(crate) sections: Vec<Section>,
    pub(crate) trailer: String,
    pub(crate) newline: &'static str,
    pub(crate) entry_indent: String,
    pub(crate) closing_indent: String,
    pub(crate) closes_inline: bool,
}

/// One profile of the addon's SavedVariables, as read from a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileModel {
    pub(crate) groups: TableEntries<GroupPath, GroupMeta>,
    pub(crate) items: TableEntries<ItemIdentity, ItemAssignment>,
    pub(crate) tree_status: TableEntries<TreeStatusKey, bool>,
    pub(crate) collapsed_status: TableEntries<TreeStatusKey, bool>,
    pub(crate) other_keys: Vec<OtherKey>,
    pub(crate) layout: ProfileLayout,
}

impl ProfileModel {
    pub fn groups(&self) -> &TableEntries<GroupPath, GroupMeta> {
        &self.groups
    }

    pub fn items(&self) -> &TableEntries<ItemIdentity, ItemAssignment> {
        &self.items
    }

    pub fn tree_status(&self) -> &TableEntries<TreeStatusKey, bool> {
        &self.tree_status
    }

    pub fn collapsed_status(&self) -> &TableEntries<TreeStatusKey, bool> {
        &self.collapsed_status
    }

    pub fn other_keys(&self) -> &[OtherKey] {
        &self.other_keys
    }

    pub fn has_table(&self, kind: TableKind) -> bool {
        self.layout.sections.contains(&Section::Table(kind))
    }

    pub fn group_of(&self, item: &ItemIdentity) -> Option<&GroupPath> {
        self.items.get(item).map(|assignment| &assignment.path)
    }

    /// Majority dialect of the item keys already in the file.
    pub fn detected_dialect(&self) -> Option<Dialect> {
        item_string::detect_dialect(self.items.iter().map(|(_, a)| a.key_text.as_str()))
    }
}
