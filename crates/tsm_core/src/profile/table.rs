use std::hash::Hash;

use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum SlotKey<K> {
    Known(K),
    /// Entry the model does not interpret, kept by its position in the file.
    Opaque(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Slot<V> {
    pub(crate) value: Option<V>,
    /// Captured source text, leading trivia through separator. `None` once the
    /// entry is new or changed and has to be rendered.
    pub(crate) raw: Option<String>,
    pub(crate) terminated: bool,
}

/// Verbatim text around the entries of a recognized table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TableFrame {
    /// Leading trivia, key, `=` and everything up to and including the `{`
    /// that opens the entry list.
    pub(crate) head: String,
    /// Trailing trivia, closing brace(s) and the entry separator.
    pub(crate) tail: String,
    pub(crate) entry_indent: String,
    pub(crate) closing_indent: String,
    pub(crate) terminated: bool,
}

impl TableFrame {
    /// True when the closing brace shares a line with the last entry (or the
    /// opening brace), so appended entries need a line break before it.
    pub(crate) fn closes_inline(&self) -> bool {
        let before_close = self.tail.split('}').next().unwrap_or_default();
        !before_close.contains('\n')
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SetOutcome {
    Inserted,
    Replaced,
    Unchanged,
}

/// Ordered entries of one recognized table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEntries<K: Hash + Eq, V> {
    pub(crate) slots: IndexMap<SlotKey<K>, Slot<V>>,
    pub(crate) frame: Option<TableFrame>,
    pub(crate) removed: bool,
}

impl<K: Hash + Eq + Clone, V: Clone + PartialEq> TableEntries<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            slots: IndexMap::new(),
            frame: None,
            removed: false,
        }
    }

    pub(crate) fn framed(frame: TableFrame) -> Self {
        Self {
            frame: Some(frame),
            ..Self::new()
        }
    }

    pub(crate) fn push_known(&mut self, key: K, value: V, raw: String, terminated: bool) {
        self.slots.insert(
            SlotKey::Known(key),
            Slot {
                value: Some(value),
                raw: Some(raw),
                terminated,
            },
        );
    }

    pub(crate) fn push_opaque(&mut self, raw: String, terminated: bool) {
        let index = self.slots.len();
        self.slots.insert(
            SlotKey::Opaque(index),
            Slot {
                value: None,
                raw: Some(raw),
                terminated,
            },
        );
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.slots
            .get(&SlotKey::Known(key.clone()))
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn contains(&self, key: &K) -> bool {
        self.slots.contains_key(&SlotKey::Known(key.clone()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.slots.iter().filter_map(|(key, slot)| match key {
            SlotKey::Known(k) => slot.value.as_ref().map(|v| (k, v)),
            SlotKey::Opaque(_) => None,
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(k, _)| k)
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn opaque_len(&self) -> usize {
        self.slots
            .keys()
            .filter(|key| matches!(key, SlotKey::Opaque(_)))
            .count()
    }

    pub(crate) fn has_slots(&self) -> bool {
        !self.slots.is_empty()
    }

    /// Insert at the end, or overwrite in place. An overwrite with an equal
    /// value keeps the captured text.
    pub(crate) fn set(&mut self, key: K, value: V) -> SetOutcome {
        let slot_key = SlotKey::Known(key);
        if let Some(slot) = self.slots.get_mut(&slot_key) {
            if slot.value.as_ref() == Some(&value) {
                return SetOutcome::Unchanged;
            }
            slot.value = Some(value);
            slot.raw = None;
            return SetOutcome::Replaced;
        }
        self.slots.insert(
            slot_key,
            Slot {
                value: Some(value),
                raw: None,
                terminated: true,
            },
        );
        SetOutcome::Inserted
    }

    pub(crate) fn remove(&mut self, key: &K) -> Option<V> {
        let slot = self.slots.shift_remove(&SlotKey::Known(key.clone()))?;
        self.removed = true;
        slot.value
    }

    /// Drop every entry, interpreted or not.
    pub(crate) fn clear(&mut self) -> usize {
        let dropped = self.slots.len();
        if dropped > 0 {
            self.slots.clear();
            self.removed = true;
        }
        dropped
    }

    /// Move the entry under `from` to `to` without changing its position. If
    /// `to` is already taken the entry under `from` is dropped instead.
    pub(crate) fn rekey(&mut self, from: &K, to: K, value: V) -> bool {
        let Some(index) = self.slots.get_index_of(&SlotKey::Known(from.clone())) else {
            return false;
        };
        if self.contains(&to) {
            self.remove(from);
            return true;
        }

        let slots = std::mem::take(&mut self.slots);
        self.slots = slots
            .into_iter()
            .enumerate()
            .map(|(position, (key, slot))| {
                if position == index {
                    (
                        SlotKey::Known(to.clone()),
                        Slot {
                            value: Some(value.clone()),
                            raw: None,
                            terminated: true,
                        },
                    )
                } else {
                    (key, slot)
                }
            })
            .collect();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TableEntries<&'static str, u32> {
        let mut table = TableEntries::new();
        table.push_known("a", 1, "\n\t[\"a\"] = 1,".to_string(), true);
        table.push_opaque("\n\ttrue,".to_string(), true);
        table.push_known("b", 2, "\n\t[\"b\"] = 2,".to_string(), true);
        table
    }

    #[test]
    fn equal_overwrite_keeps_raw_text() {
        let mut table = table();
        assert_eq!(table.set("a", 1), SetOutcome::Unchanged);
        assert!(table.slots[0].raw.is_some());
        assert_eq!(table.set("a", 5), SetOutcome::Replaced);
        assert!(table.slots[0].raw.is_none());
        assert_eq!(table.get(&"a"), Some(&5));
    }

    #[test]
    fn rekey_keeps_position() {
        let mut table = table();
        assert!(table.rekey(&"a", "z", 1));
        let keys: Vec<_> = table.keys().copied().collect();
        assert_eq!(keys, ["z", "b"]);
        assert_eq!(table.opaque_len(), 1);
    }

    #[test]
    fn removal_marks_table() {
        let mut table = table();
        assert!(!table.removed);
        assert_eq!(table.remove(&"b"), Some(2));
        assert!(table.removed);
        assert_eq!(table.len(), 1);
    }
}
