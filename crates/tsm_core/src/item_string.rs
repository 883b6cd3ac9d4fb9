//! Item reference strings as stored in the `items` table.
//!
//! Two dialects are understood:
//! - legacy (3.3.5 clients): `item:ID:M1:M2:M3:M4:M5:M6`, always six trailing fields
//! - compact (newer clients): `i:ID` or `i:ID::M1:M2...`
//!
//! Both decode to the same [`ItemIdentity`], so an item keyed in one dialect is
//! recognized when a later batch is written in the other.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const LEGACY_PREFIX: &str = "item:";
pub const COMPACT_PREFIX: &str = "i:";
pub const MODIFIER_SLOTS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Legacy,
    Compact,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Compact => "compact",
        }
    }

    pub fn of(raw: &str) -> Option<Self> {
        if raw.starts_with(LEGACY_PREFIX) {
            Some(Self::Legacy)
        } else if raw.starts_with(COMPACT_PREFIX) {
            Some(Self::Compact)
        } else {
            None
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ItemStringError {
    #[error("unrecognized item string {0:?}")]
    UnrecognizedFormat(String),
    #[error("item id must be non-zero")]
    ZeroId,
    #[error("too many modifiers: {0} (at most {MODIFIER_SLOTS})")]
    TooManyModifiers(usize),
}

/// Numeric identity of an item: base id plus modifier ids.
///
/// Trailing zero modifiers carry no information in either dialect and are
/// trimmed on construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemIdentity {
    id: u32,
    modifiers: Vec<i32>,
}

impl ItemIdentity {
    pub fn new(id: u32) -> Result<Self, ItemStringError> {
        Self::with_modifiers(id, Vec::new())
    }

    pub fn with_modifiers(id: u32, mut modifiers: Vec<i32>) -> Result<Self, ItemStringError> {
        if id == 0 {
            return Err(ItemStringError::ZeroId);
        }
        while modifiers.last() == Some(&0) {
            modifiers.pop();
        }
        if modifiers.len() > MODIFIER_SLOTS {
            return Err(ItemStringError::TooManyModifiers(modifiers.len()));
        }
        Ok(Self { id, modifiers })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn modifiers(&self) -> &[i32] {
        &self.modifiers
    }
}

impl fmt::Display for ItemIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(self, Dialect::Compact))
    }
}

pub fn parse(raw: &str) -> Result<ItemIdentity, ItemStringError> {
    let unrecognized = || ItemStringError::UnrecognizedFormat(raw.to_string());

    if let Some(rest) = raw.strip_prefix(LEGACY_PREFIX) {
        let fields: Vec<&str> = rest.split(':').collect();
        if fields.len() != MODIFIER_SLOTS + 1 {
            return Err(unrecognized());
        }
        let id = parse_id(fields[0]).ok_or_else(unrecognized)?;
        let modifiers = fields[1..]
            .iter()
            .map(|field| parse_modifier(field))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(unrecognized)?;
        return ItemIdentity::with_modifiers(id, modifiers);
    }

    if let Some(rest) = raw.strip_prefix(COMPACT_PREFIX) {
        let (id_part, modifier_part) = match rest.split_once("::") {
            Some((id_part, modifiers)) => (id_part, Some(modifiers)),
            None => (rest, None),
        };
        let id = parse_id(id_part).ok_or_else(unrecognized)?;
        let modifiers = match modifier_part {
            None => Vec::new(),
            Some(list) => list
                .split(':')
                .map(parse_modifier)
                .collect::<Option<Vec<_>>>()
                .ok_or_else(unrecognized)?,
        };
        return ItemIdentity::with_modifiers(id, modifiers);
    }

    Err(unrecognized())
}

pub fn render(identity: &ItemIdentity, dialect: Dialect) -> String {
    match dialect {
        Dialect::Legacy => {
            let mut out = format!("{LEGACY_PREFIX}{}", identity.id);
            for slot in 0..MODIFIER_SLOTS {
                let value = identity.modifiers.get(slot).copied().unwrap_or(0);
                out.push(':');
                out.push_str(&value.to_string());
            }
            out
        }
        Dialect::Compact => {
            let mut out = format!("{COMPACT_PREFIX}{}", identity.id);
            if !identity.modifiers.is_empty() {
                out.push(':');
                for modifier in &identity.modifiers {
                    out.push(':');
                    out.push_str(&modifier.to_string());
                }
            }
            out
        }
    }
}

/// Majority dialect among existing item keys; ties favour legacy.
pub fn detect_dialect<'a>(keys: impl IntoIterator<Item = &'a str>) -> Option<Dialect> {
    let mut legacy = 0usize;
    let mut compact = 0usize;
    for key in keys {
        match Dialect::of(key) {
            Some(Dialect::Legacy) => legacy += 1,
            Some(Dialect::Compact) => compact += 1,
            None => {}
        }
    }
    match (legacy, compact) {
        (0, 0) => None,
        (l, c) if c > l => Some(Dialect::Compact),
        _ => Some(Dialect::Legacy),
    }
}

fn parse_id(field: &str) -> Option<u32> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

fn parse_modifier(field: &str) -> Option<i32> {
    let digits = field.strip_prefix('-').unwrap_or(field);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}
