//! Item records coming from outside the engine.
//!
//! Scrapers for the item-database sites live elsewhere; the engine only sees
//! them through [`CatalogSource`]. [`JsonCatalog`] serves records saved to disk.

use std::path::Path;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core_api::{CoreError, CoreErrorCode};
use crate::item_string::{ItemIdentity, ItemStringError};
use crate::persist;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<i32>,
}

impl ItemRecord {
    pub fn identity(&self) -> Result<ItemIdentity, ItemStringError> {
        ItemIdentity::with_modifiers(self.id, self.modifiers.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryFilters {
    /// Equipment slot, e.g. `head` or `chest`, for armor categories.
    pub slot: Option<String>,
    pub limit: Option<usize>,
}

pub trait CatalogSource {
    fn fetch_category(
        &self,
        category: &str,
        filters: &CategoryFilters,
    ) -> Result<Vec<ItemRecord>, CoreError>;

    fn resolve_item(&self, id: u32) -> Result<Option<ItemRecord>, CoreError>;
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecordFile {
    Categorized(IndexMap<String, Vec<ItemRecord>>),
    Flat(Vec<ItemRecord>),
}

/// Records loaded from JSON: either `{"category": [records]}` or a bare array,
/// which is served under every category name.
#[derive(Debug, Clone, Default)]
pub struct JsonCatalog {
    categories: IndexMap<String, Vec<ItemRecord>>,
    uncategorized: Vec<ItemRecord>,
}

impl JsonCatalog {
    pub fn from_json(raw: &str) -> Result<Self, CoreError> {
        let file: RecordFile = serde_json::from_str(raw).map_err(|e| {
            CoreError::new(
                CoreErrorCode::InvalidInput,
                format!("invalid item record file: {e}"),
            )
        })?;
        Ok(match file {
            RecordFile::Categorized(categories) => Self {
                categories,
                uncategorized: Vec::new(),
            },
            RecordFile::Flat(records) => Self {
                categories: IndexMap::new(),
                uncategorized: records,
            },
        })
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        Self::from_json(&persist::read_text(path)?)
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    /// Every record in the file, categories first.
    pub fn records(&self) -> impl Iterator<Item = &ItemRecord> {
        self.categories.values().flatten().chain(&self.uncategorized)
    }
}

impl CatalogSource for JsonCatalog {
    fn fetch_category(
        &self,
        category: &str,
        filters: &CategoryFilters,
    ) -> Result<Vec<ItemRecord>, CoreError> {
        let records = match self.categories.get(category) {
            Some(records) => records,
            None if self.categories.is_empty() => &self.uncategorized,
            None => {
                return Err(CoreError::new(
                    CoreErrorCode::InvalidInput,
                    format!("unknown category {category:?}"),
                ));
            }
        };
        if filters.slot.is_some() {
            warn!("record files carry no slot data; ignoring slot filter");
        }
        let limit = filters.limit.unwrap_or(usize::MAX);
        Ok(records.iter().take(limit).cloned().collect())
    }

    fn resolve_item(&self, id: u32) -> Result<Option<ItemRecord>, CoreError> {
        Ok(self.records().find(|record| record.id == id).cloned())
    }
}

/// Turn records into identities, skipping any that cannot be represented.
pub fn identities(records: &[ItemRecord]) -> Vec<ItemIdentity> {
    let mut out = IndexSet::with_capacity(records.len());
    for record in records {
        match record.identity() {
            Ok(identity) => {
                out.insert(identity);
            }
            Err(err) => warn!("skipping item {} ({:?}): {err}", record.id, record.name),
        }
    }
    out.into_iter().collect()
}
