//! Group hierarchy over the flat `groups` map.
//!
//! There is no node structure: a group exists when its serialized path is a
//! key, and parents are found by enumerating path prefixes.

use std::fmt;

use indexmap::IndexMap;

use crate::group_path::{GroupPath, TreeStatusKey};
use crate::item_string::ItemIdentity;
use crate::profile::{GroupMeta, ProfileModel, SetOutcome};

pub fn visibility_key_for(path: &GroupPath) -> TreeStatusKey {
    TreeStatusKey::for_path(path)
}

/// An entry that points at a group the profile does not have.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OrphanReference {
    Item {
        item: ItemIdentity,
        group: GroupPath,
    },
    Visibility(TreeStatusKey),
    Collapsed(TreeStatusKey),
    MissingParent(GroupPath),
}

impl fmt::Display for OrphanReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Item { item, group } => {
                write!(f, "item {item} assigned to missing group {group}")
            }
            Self::Visibility(key) => {
                write!(f, "tree status {key} for missing group {}", key.path())
            }
            Self::Collapsed(key) => {
                write!(f, "collapsed status {key} for missing group {}", key.path())
            }
            Self::MissingParent(path) => write!(f, "group {path} has no parent group"),
        }
    }
}

impl ProfileModel {
    pub fn has_group(&self, path: &GroupPath) -> bool {
        self.groups.contains(path)
    }

    /// Insert `path` and any missing ancestors, root first. Returns the groups
    /// that were created.
    pub fn ensure_group(
        &mut self,
        path: &GroupPath,
        operation_modules: &[String],
    ) -> Vec<GroupPath> {
        let mut created = Vec::new();
        for ancestor in path.ancestors() {
            if self.groups.contains(&ancestor) {
                continue;
            }
            self.groups
                .set(ancestor.clone(), GroupMeta::Template(operation_modules.to_vec()));
            created.push(ancestor);
        }
        created
    }

    /// Remove a single group entry. Descendants, items and status entries are
    /// left alone.
    pub fn delete_group(&mut self, path: &GroupPath) -> bool {
        self.groups.remove(path).is_some()
    }

    /// Add a tree-status entry for every ancestor of `path` that lacks one.
    pub fn ensure_visibility(&mut self, path: &GroupPath) -> usize {
        let mut added = 0;
        for ancestor in path.ancestors() {
            let key = visibility_key_for(&ancestor);
            if !self.tree_status.contains(&key)
                && self.tree_status.set(key, true) == SetOutcome::Inserted
            {
                added += 1;
            }
        }
        added
    }

    pub fn missing_visibility(&self) -> Vec<GroupPath> {
        let mut missing: Vec<GroupPath> = Vec::new();
        for path in self.groups.keys() {
            for ancestor in path.ancestors() {
                if !self.tree_status.contains(&visibility_key_for(&ancestor))
                    && !missing.contains(&ancestor)
                {
                    missing.push(ancestor);
                }
            }
        }
        missing
    }

    pub fn orphan_references(&self) -> Vec<OrphanReference> {
        let mut orphans = Vec::new();
        for path in self.groups.keys() {
            let parent_missing = path
                .parent()
                .is_some_and(|parent| !self.groups.contains(&parent));
            if parent_missing {
                orphans.push(OrphanReference::MissingParent(path.clone()));
            }
        }
        for (item, assignment) in self.items.iter() {
            if !self.groups.contains(&assignment.path) {
                orphans.push(OrphanReference::Item {
                    item: item.clone(),
                    group: assignment.path.clone(),
                });
            }
        }
        for key in self.tree_status.keys() {
            if !self.groups.contains(key.path()) {
                orphans.push(OrphanReference::Visibility(key.clone()));
            }
        }
        for key in self.collapsed_status.keys() {
            if !self.groups.contains(key.path()) {
                orphans.push(OrphanReference::Collapsed(key.clone()));
            }
        }
        orphans
    }

    /// Direct children of every group, in group order. Root groups are listed
    /// under `None`.
    pub fn hierarchy(&self) -> IndexMap<Option<GroupPath>, Vec<GroupPath>> {
        let mut tree: IndexMap<Option<GroupPath>, Vec<GroupPath>> = IndexMap::new();
        tree.insert(None, Vec::new());
        for path in self.groups.keys() {
            tree.entry(Some(path.clone())).or_default();
        }
        for path in self.groups.keys() {
            tree.entry(path.parent()).or_default().push(path.clone());
        }
        tree
    }

    pub fn items_in_group(&self, path: &GroupPath) -> Vec<&ItemIdentity> {
        self.items
            .iter()
            .filter(|(_, assignment)| &assignment.path == path)
            .map(|(item, _)| item)
            .collect()
    }
}
