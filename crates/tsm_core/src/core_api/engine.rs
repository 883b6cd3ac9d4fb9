use std::path::Path;

use tracing::debug;

use crate::catalog::{self, ItemRecord};
use crate::group_path::GroupPath;
use crate::item_string::Dialect;
use crate::merge::{self, Assignment, DeleteOptions, MergeOptions, MergeReport, Planned};
use crate::persist;
use crate::profile::{self, ProfileModel, ProfileSelector};
use crate::tree::visibility_key_for;
use crate::writer;

use super::error::{CoreError, CoreErrorCode};
use super::types::{GroupCount, GroupEntry, ItemEntry, ProfileIssue, ProfileSummary};

const TOP_GROUPS: usize = 10;

#[derive(Debug, Default, Clone, Copy)]
pub struct Engine;

/// A loaded profile. Operations either apply in full or leave the session as
/// it was.
#[derive(Debug)]
pub struct Session {
    selector: ProfileSelector,
    original: String,
    model: ProfileModel,
    modified: bool,
}

impl Engine {
    pub fn new() -> Self {
        Self
    }

    pub fn open_text(
        &self,
        text: impl Into<String>,
        selector: &ProfileSelector,
    ) -> Result<Session, CoreError> {
        let original = text.into();
        let model = profile::read(&original, selector)?;
        Ok(Session {
            selector: selector.clone(),
            original,
            model,
            modified: false,
        })
    }

    pub fn open_path(&self, path: &Path, selector: &ProfileSelector) -> Result<Session, CoreError> {
        let text = persist::read_text(path)?;
        self.open_text(text, selector).map_err(|e| {
            CoreError::new(e.code, format!("{}: {}", path.display(), e.message))
        })
    }
}

impl Session {
    pub fn selector(&self) -> &ProfileSelector {
        &self.selector
    }

    pub fn model(&self) -> &ProfileModel {
        &self.model
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn detected_dialect(&self) -> Option<Dialect> {
        self.model.detected_dialect()
    }

    pub fn summary(&self) -> ProfileSummary {
        let model = &self.model;
        let mut top_groups: Vec<GroupCount> = model
            .groups()
            .keys()
            .map(|path| GroupCount {
                path: path.clone(),
                items: model.items_in_group(path).len(),
            })
            .filter(|count| count.items > 0)
            .collect();
        // stable sort keeps file order between equal counts
        top_groups.sort_by(|a, b| b.items.cmp(&a.items));
        top_groups.truncate(TOP_GROUPS);

        ProfileSummary {
            profile: self.selector.profile.clone(),
            groups: model.groups().len(),
            items: model.items().len(),
            tree_status_entries: model.tree_status().len(),
            collapsed_entries: model.collapsed_status().len(),
            other_keys: model.other_keys().len(),
            dialect: model.detected_dialect(),
            top_groups,
            issues: self.issues(),
        }
    }

    pub fn issues(&self) -> Vec<ProfileIssue> {
        let model = &self.model;
        let mut issues = Vec::new();
        if !model.missing_visibility().is_empty() {
            issues.push(ProfileIssue::MissingVisibility);
        }
        if !model.orphan_references().is_empty() {
            issues.push(ProfileIssue::OrphanedReferences);
        }
        let unread = model.groups().opaque_len() + model.items().opaque_len();
        if unread > 0 {
            issues.push(ProfileIssue::UnreadEntries);
        }
        issues
    }

    pub fn groups(&self) -> Vec<GroupEntry> {
        let hierarchy = self.model.hierarchy();
        self.model
            .groups()
            .keys()
            .map(|path| GroupEntry {
                path: path.clone(),
                name: path.name().to_string(),
                depth: path.depth(),
                items: self.model.items_in_group(path).len(),
                children: hierarchy
                    .get(&Some(path.clone()))
                    .map(Vec::len)
                    .unwrap_or_default(),
                expanded: self
                    .model
                    .tree_status()
                    .get(&visibility_key_for(path))
                    .copied(),
            })
            .collect()
    }

    /// Item assignments, optionally limited to one group (without its
    /// subgroups).
    pub fn items(&self, group: Option<&GroupPath>) -> Result<Vec<ItemEntry>, CoreError> {
        if let Some(group) = group {
            if !self.model.has_group(group) {
                return Err(CoreError::new(
                    CoreErrorCode::GroupNotFound,
                    format!("group {group} not found"),
                ));
            }
        }
        Ok(self
            .model
            .items()
            .iter()
            .filter(|(_, assignment)| group.is_none_or(|g| &assignment.path == g))
            .map(|(item, assignment)| ItemEntry {
                key: assignment.key_text.clone(),
                id: item.id(),
                modifiers: item.modifiers().to_vec(),
                group: assignment.path.clone(),
            })
            .collect())
    }

    pub fn apply(
        &mut self,
        assignments: &[Assignment],
        options: &MergeOptions,
    ) -> Result<MergeReport, CoreError> {
        let planned = merge::plan(&self.model, assignments, options)?;
        Ok(self.commit(planned))
    }

    /// Assign every representable record to `group`.
    pub fn import_records(
        &mut self,
        records: &[ItemRecord],
        group: &GroupPath,
        options: &MergeOptions,
    ) -> Result<MergeReport, CoreError> {
        let assignments: Vec<Assignment> = catalog::identities(records)
            .into_iter()
            .map(|item| Assignment {
                item,
                group: group.clone(),
            })
            .collect();
        self.apply(&assignments, options)
    }

    pub fn delete_group(
        &mut self,
        path: &GroupPath,
        options: &DeleteOptions,
    ) -> Result<MergeReport, CoreError> {
        let planned = merge::delete_group(&self.model, path, options)?;
        Ok(self.commit(planned))
    }

    pub fn remove_items(&mut self, ids: &[u32]) -> Result<MergeReport, CoreError> {
        let planned = merge::remove_items(&self.model, ids)?;
        Ok(self.commit(planned))
    }

    pub fn rename_group(
        &mut self,
        from: &GroupPath,
        to: &GroupPath,
        operation_modules: &[String],
    ) -> Result<MergeReport, CoreError> {
        let planned = merge::rename_group(&self.model, from, to, operation_modules)?;
        Ok(self.commit(planned))
    }

    /// Current text. An unmodified session returns the loaded text unchanged.
    pub fn to_text(&self) -> String {
        if self.modified {
            writer::write(&self.model)
        } else {
            self.original.clone()
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        persist::write_atomic(path, &self.to_text())
    }

    fn commit(&mut self, planned: Planned) -> MergeReport {
        if planned.model != self.model {
            self.modified = true;
            self.model = planned.model;
        } else {
            debug!("batch left the profile unchanged");
        }
        planned.report
    }
}
