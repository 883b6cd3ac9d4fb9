//! Batch operations on a profile.
//!
//! Every operation works on a copy of the model and only hands it back when the
//! result introduces no reference to a missing group. A rejected batch leaves
//! the caller's model exactly as it was.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core_api::{CoreError, CoreErrorCode};
use crate::group_path::GroupPath;
use crate::item_string::{self, Dialect, ItemIdentity};
use crate::profile::{DEFAULT_OPERATION_MODULES, ItemAssignment, ProfileModel, SetOutcome};
use crate::tree::OrphanReference;

const ORPHANS_SHOWN: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub item: ItemIdentity,
    pub group: GroupPath,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOptions {
    /// Dialect for item keys the batch adds. Existing keys keep theirs.
    pub dialect: Dialect,
    pub operation_modules: Vec<String>,
    pub reset_collapsed_status: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            dialect: Dialect::Legacy,
            operation_modules: default_operation_modules(),
            reset_collapsed_status: false,
        }
    }
}

pub fn default_operation_modules() -> Vec<String> {
    DEFAULT_OPERATION_MODULES
        .iter()
        .map(|module| module.to_string())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteScope {
    GroupOnly,
    WithDescendants,
}

/// What happens to items assigned to a deleted group. Callers always pick one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanPolicy {
    /// Drop the assignments; the items become ungrouped.
    Ungroup,
    /// Reassign to the deleted group's parent. Root groups fall back to
    /// `Ungroup`.
    MoveToParent,
    MoveTo(GroupPath),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOptions {
    pub scope: DeleteScope,
    pub orphans: OrphanPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    pub groups_created: usize,
    pub groups_removed: usize,
    pub groups_renamed: usize,
    pub items_added: usize,
    pub items_moved: usize,
    pub items_unchanged: usize,
    pub items_removed: usize,
    pub visibility_added: usize,
    pub visibility_removed: usize,
    pub collapsed_cleared: usize,
}

impl MergeReport {
    pub fn is_noop(&self) -> bool {
        *self
            == Self {
                items_unchanged: self.items_unchanged,
                ..Self::default()
            }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Planned {
    pub model: ProfileModel,
    pub report: MergeReport,
}

/// Assign items to groups in input order. The last assignment of an item wins.
pub fn plan(
    model: &ProfileModel,
    assignments: &[Assignment],
    options: &MergeOptions,
) -> Result<Planned, CoreError> {
    let mut next = model.clone();
    let mut report = MergeReport::default();

    for assignment in assignments {
        let created = next.ensure_group(&assignment.group, &options.operation_modules);
        report.groups_created += created.len();
        report.visibility_added += next.ensure_visibility(&assignment.group);

        let key_text = match next.items.get(&assignment.item) {
            Some(existing) => existing.key_text.clone(),
            None => item_string::render(&assignment.item, options.dialect),
        };
        let outcome = next.items.set(
            assignment.item.clone(),
            ItemAssignment {
                key_text,
                path: assignment.group.clone(),
            },
        );
        match outcome {
            SetOutcome::Inserted => report.items_added += 1,
            SetOutcome::Replaced => report.items_moved += 1,
            SetOutcome::Unchanged => report.items_unchanged += 1,
        }
    }

    report.visibility_added += heal_visibility(&mut next);
    if options.reset_collapsed_status {
        report.collapsed_cleared = next.collapsed_status.clear();
    }

    reject_new_orphans(model, &next)?;
    info!(
        created = report.groups_created,
        added = report.items_added,
        moved = report.items_moved,
        unchanged = report.items_unchanged,
        "planned merge of {} assignment(s)",
        assignments.len()
    );
    Ok(Planned {
        model: next,
        report,
    })
}

pub fn delete_group(
    model: &ProfileModel,
    path: &GroupPath,
    options: &DeleteOptions,
) -> Result<Planned, CoreError> {
    if !model.has_group(path) {
        return Err(group_not_found(path));
    }

    let targets: Vec<GroupPath> = match options.scope {
        DeleteScope::GroupOnly => vec![path.clone()],
        DeleteScope::WithDescendants => model
            .groups
            .keys()
            .filter(|group| path.is_ancestor_of(group))
            .cloned()
            .collect(),
    };
    let deleted: HashSet<&GroupPath> = targets.iter().collect();

    let destination = match &options.orphans {
        OrphanPolicy::Ungroup => None,
        OrphanPolicy::MoveToParent => path.parent(),
        OrphanPolicy::MoveTo(target) => {
            if deleted.contains(target) {
                return Err(CoreError::new(
                    CoreErrorCode::InvalidInput,
                    format!("cannot move items into {target}, it is being deleted"),
                ));
            }
            if !model.has_group(target) {
                return Err(group_not_found(target));
            }
            Some(target.clone())
        }
    };

    let mut next = model.clone();
    let mut report = MergeReport::default();

    let affected: Vec<(ItemIdentity, ItemAssignment)> = next
        .items
        .iter()
        .filter(|(_, assignment)| deleted.contains(&assignment.path))
        .map(|(item, assignment)| (item.clone(), assignment.clone()))
        .collect();
    for (item, assignment) in affected {
        match &destination {
            Some(target) => {
                next.items.set(
                    item,
                    ItemAssignment {
                        key_text: assignment.key_text,
                        path: target.clone(),
                    },
                );
                report.items_moved += 1;
            }
            None => {
                next.items.remove(&item);
                report.items_removed += 1;
            }
        }
    }

    for target in &targets {
        if next.delete_group(target) {
            report.groups_removed += 1;
        }
    }

    let still_referenced = |key_path: &GroupPath, model: &ProfileModel| {
        model.groups.keys().any(|group| key_path.is_ancestor_of(group))
    };
    let stale: Vec<_> = next
        .tree_status
        .keys()
        .filter(|key| deleted.contains(key.path()) && !still_referenced(key.path(), &next))
        .cloned()
        .collect();
    for key in stale {
        next.tree_status.remove(&key);
        report.visibility_removed += 1;
    }
    let stale: Vec<_> = next
        .collapsed_status
        .keys()
        .filter(|key| deleted.contains(key.path()) && !still_referenced(key.path(), &next))
        .cloned()
        .collect();
    for key in stale {
        next.collapsed_status.remove(&key);
        report.collapsed_cleared += 1;
    }

    reject_new_orphans(model, &next)?;
    info!(
        removed = report.groups_removed,
        items_moved = report.items_moved,
        items_removed = report.items_removed,
        "planned deletion of {path}"
    );
    Ok(Planned {
        model: next,
        report,
    })
}

/// Drop every assignment whose base item id is listed.
pub fn remove_items(model: &ProfileModel, ids: &[u32]) -> Result<Planned, CoreError> {
    let wanted: HashSet<u32> = ids.iter().copied().collect();
    let mut next = model.clone();
    let mut report = MergeReport::default();

    let matching: Vec<ItemIdentity> = next
        .items
        .keys()
        .filter(|item| wanted.contains(&item.id()))
        .cloned()
        .collect();
    for item in matching {
        next.items.remove(&item);
        report.items_removed += 1;
    }

    reject_new_orphans(model, &next)?;
    debug!(removed = report.items_removed, "planned item removal");
    Ok(Planned {
        model: next,
        report,
    })
}

/// Move `from` and its descendants under the new path `to`, keeping their
/// positions, metadata and item assignments.
pub fn rename_group(
    model: &ProfileModel,
    from: &GroupPath,
    to: &GroupPath,
    operation_modules: &[String],
) -> Result<Planned, CoreError> {
    if !model.has_group(from) {
        return Err(group_not_found(from));
    }
    if model.has_group(to) {
        return Err(CoreError::new(
            CoreErrorCode::GroupExists,
            format!("group {to} already exists"),
        ));
    }
    if from.is_ancestor_of(to) {
        return Err(CoreError::new(
            CoreErrorCode::InvalidInput,
            format!("cannot move {from} inside itself ({to})"),
        ));
    }

    let mut next = model.clone();
    let mut report = MergeReport::default();

    let moved: Vec<_> = next
        .groups
        .iter()
        .filter(|(group, _)| from.is_ancestor_of(group))
        .map(|(group, meta)| (group.clone(), meta.clone()))
        .collect();
    for (group, meta) in moved {
        if let Some(renamed) = group.rebase(from, to) {
            next.groups.rekey(&group, renamed, meta);
            report.groups_renamed += 1;
        }
    }

    let reassigned: Vec<_> = next
        .items
        .iter()
        .filter_map(|(item, assignment)| {
            let path = assignment.path.rebase(from, to)?;
            Some((item.clone(), assignment.key_text.clone(), path))
        })
        .collect();
    for (item, key_text, path) in reassigned {
        next.items.set(item, ItemAssignment { key_text, path });
        report.items_moved += 1;
    }

    for table in [&mut next.tree_status, &mut next.collapsed_status] {
        let rekeyed: Vec<_> = table
            .iter()
            .filter_map(|(key, value)| {
                let path = key.path().rebase(from, to)?;
                Some((key.clone(), crate::tree::visibility_key_for(&path), *value))
            })
            .collect();
        for (old, new, value) in rekeyed {
            table.rekey(&old, new, value);
        }
    }

    report.groups_created += next.ensure_group(to, operation_modules).len();
    report.visibility_added += heal_visibility(&mut next);

    reject_new_orphans(model, &next)?;
    info!(renamed = report.groups_renamed, "planned rename of {from} to {to}");
    Ok(Planned {
        model: next,
        report,
    })
}

fn heal_visibility(model: &mut ProfileModel) -> usize {
    let groups: Vec<GroupPath> = model.groups.keys().cloned().collect();
    groups
        .iter()
        .map(|group| model.ensure_visibility(group))
        .sum()
}

fn reject_new_orphans(baseline: &ProfileModel, candidate: &ProfileModel) -> Result<(), CoreError> {
    let known: HashSet<OrphanReference> = baseline.orphan_references().into_iter().collect();
    let fresh: Vec<OrphanReference> = candidate
        .orphan_references()
        .into_iter()
        .filter(|orphan| !known.contains(orphan))
        .collect();
    if fresh.is_empty() {
        return Ok(());
    }

    let mut shown: Vec<String> = fresh
        .iter()
        .take(ORPHANS_SHOWN)
        .map(ToString::to_string)
        .collect();
    if fresh.len() > ORPHANS_SHOWN {
        shown.push(format!("and {} more", fresh.len() - ORPHANS_SHOWN));
    }
    Err(CoreError::new(
        CoreErrorCode::OrphanReferenceDetected,
        format!("batch rejected: {}", shown.join("; ")),
    ))
}

fn group_not_found(path: &GroupPath) -> CoreError {
    CoreError::new(CoreErrorCode::GroupNotFound, format!("group {path} not found"))
}
