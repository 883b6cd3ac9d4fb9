use std::hash::Hash;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core_api::{CoreError, CoreErrorCode};
use crate::group_path::{GroupPath, TreeStatusKey};
use crate::item_string;
use crate::layout::{ByteRange, FileLayout, SectionId, SectionLayout};
use crate::reader::{EntrySpan, KeyLiteral, LuaReader, TableSpan, bool_literal, string_literal};

use super::model::{
    GroupMeta, ItemAssignment, OtherKey, ProfileLayout, ProfileModel, Section, TableKind,
};
use super::table::{TableEntries, TableFrame};

pub const DEFAULT_PROFILE: &str = "Default";

/// Which profile of which SavedVariables global to load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSelector {
    pub profile: String,
    /// Global table name, e.g. `AscensionTSMDB`. `None` takes the first global
    /// that has the profile.
    pub database: Option<String>,
}

impl Default for ProfileSelector {
    fn default() -> Self {
        Self {
            profile: DEFAULT_PROFILE.to_string(),
            database: None,
        }
    }
}

pub fn read(text: &str, selector: &ProfileSelector) -> Result<ProfileModel, CoreError> {
    let profile = locate_profile(text, selector)?;
    let body_end = profile.last_entry_end();

    let mut sections = Vec::with_capacity(profile.entries.len() + 2);
    sections.push(SectionLayout {
        id: SectionId::Prelude,
        range: ByteRange {
            start: 0,
            end: profile.body_start,
        },
    });
    for (index, entry) in profile.entries.iter().enumerate() {
        sections.push(SectionLayout {
            id: SectionId::Entry(index),
            range: entry.range,
        });
    }
    sections.push(SectionLayout {
        id: SectionId::Trailer,
        range: ByteRange {
            start: body_end,
            end: text.len(),
        },
    });
    FileLayout {
        file_len: text.len(),
        sections,
    }
    .validate()?;

    let prelude = &text[..profile.body_start];
    let trailer = &text[body_end..];
    let closing_indent = line_indent(prelude);
    let entry_indent = profile
        .entries
        .first()
        .and_then(|entry| leading_indent(&text[entry.range.start..entry.range.end]))
        .unwrap_or_else(|| format!("{closing_indent}\t"));

    let mut model = ProfileModel {
        groups: TableEntries::new(),
        items: TableEntries::new(),
        tree_status: TableEntries::new(),
        collapsed_status: TableEntries::new(),
        other_keys: Vec::new(),
        layout: ProfileLayout {
            prelude: prelude.to_string(),
            sections: Vec::with_capacity(profile.entries.len()),
            trailer: trailer.to_string(),
            newline: if text.contains("\r\n") { "\r\n" } else { "\n" },
            entry_indent,
            closing_indent,
            closes_inline: !trailer.split('}').next().unwrap_or_default().contains('\n'),
        },
    };

    for entry in &profile.entries {
        let name = entry.key.as_ref().and_then(KeyLiteral::as_str);
        match name.and_then(TableKind::from_key) {
            Some(kind) => {
                if model.has_table(kind) {
                    return Err(malformed(format!(
                        "profile key {:?} appears more than once",
                        kind.key()
                    )));
                }
                read_recognized(text, entry, kind, &mut model)?;
                model.layout.sections.push(Section::Table(kind));
            }
            None => {
                model.layout.sections.push(Section::Other(model.other_keys.len()));
                model.other_keys.push(OtherKey {
                    name: name.map(str::to_string),
                    raw: text[entry.range.start..entry.range.end].to_string(),
                    terminated: entry.terminated,
                });
            }
        }
    }

    debug!(
        groups = model.groups.len(),
        items = model.items.len(),
        tree_status = model.tree_status.len(),
        other_keys = model.other_keys.len(),
        "read profile {:?}",
        selector.profile
    );
    Ok(model)
}

fn locate_profile(text: &str, selector: &ProfileSelector) -> Result<TableSpan, CoreError> {
    let mut globals = LuaReader::new(text);
    while let Some(global) = globals.read_global()? {
        if selector
            .database
            .as_deref()
            .is_some_and(|database| database != global.name)
        {
            continue;
        }
        if let Some(profile) = profile_table(text, global.value, &selector.profile)? {
            debug!(database = %global.name, "found profile {:?}", selector.profile);
            return Ok(profile);
        }
    }

    let scope = match &selector.database {
        Some(database) => format!(" in {database}"),
        None => String::new(),
    };
    Err(CoreError::new(
        CoreErrorCode::ProfileNotFound,
        format!("profile {:?} not found{scope}", selector.profile),
    ))
}

fn profile_table(
    text: &str,
    value: ByteRange,
    profile: &str,
) -> Result<Option<TableSpan>, CoreError> {
    let mut reader = LuaReader::new(text);
    let Some(db) = nested_table(&mut reader, text, value)? else {
        return Ok(None);
    };
    let Some(profiles) = db.find("profiles") else {
        return Ok(None);
    };
    let Some(profiles) = nested_table(&mut reader, text, profiles.value)? else {
        return Ok(None);
    };
    let Some(entry) = profiles.find(profile) else {
        return Ok(None);
    };
    nested_table(&mut reader, text, entry.value)
}

fn nested_table(
    reader: &mut LuaReader<'_>,
    text: &str,
    value: ByteRange,
) -> Result<Option<TableSpan>, CoreError> {
    if !text[value.start..value.end].starts_with('{') {
        return Ok(None);
    }
    reader.seek_to(value.start);
    Ok(Some(reader.read_table()?))
}

fn read_recognized(
    text: &str,
    entry: &EntrySpan,
    kind: TableKind,
    model: &mut ProfileModel,
) -> Result<(), CoreError> {
    let mut reader = LuaReader::new(text);
    let Some(table) = nested_table(&mut reader, text, entry.value)? else {
        return Err(malformed(format!(
            "profile key {:?} does not hold a table",
            kind.key()
        )));
    };
    let nested = match table.find("groups") {
        Some(sub) if kind.is_status() => Some(sub.value),
        _ => None,
    };
    let inner = match nested {
        Some(value) => nested_table(&mut reader, text, value)?.unwrap_or(table),
        None => table,
    };

    let head = &text[entry.range.start..inner.body_start];
    let closing_indent = line_indent(head);
    let entry_indent = inner
        .entries
        .first()
        .and_then(|first| leading_indent(&text[first.range.start..first.range.end]))
        .unwrap_or_else(|| format!("{closing_indent}\t"));
    let frame = TableFrame {
        head: head.to_string(),
        tail: text[inner.last_entry_end()..entry.range.end].to_string(),
        entry_indent,
        closing_indent,
        terminated: entry.terminated,
    };

    match kind {
        TableKind::Groups => {
            model.groups = collect(text, &inner, frame, |span| {
                let path = parse_group_key(span)?;
                let value = text[span.value.start..span.value.end].to_string();
                Some((path, GroupMeta::Raw(value)))
            });
        }
        TableKind::Items => {
            model.items = collect(text, &inner, frame, |span| parse_item_entry(text, span));
        }
        TableKind::TreeStatus => {
            model.tree_status =
                collect(text, &inner, frame, |span| parse_status_entry(text, span));
        }
        TableKind::CollapsedStatus => {
            model.collapsed_status =
                collect(text, &inner, frame, |span| parse_status_entry(text, span));
        }
    }
    Ok(())
}

/// Build a table from parsed entries. Entries `interpret` cannot map, and
/// repeats of a key already seen, stay in place as opaque text.
fn collect<K, V, F>(
    text: &str,
    table: &TableSpan,
    frame: TableFrame,
    interpret: F,
) -> TableEntries<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone + PartialEq,
    F: Fn(&EntrySpan) -> Option<(K, V)>,
{
    let mut entries = TableEntries::framed(frame);
    for span in &table.entries {
        let raw = text[span.range.start..span.range.end].to_string();
        match interpret(span) {
            Some((key, value)) if !entries.contains(&key) => {
                entries.push_known(key, value, raw, span.terminated)
            }
            _ => entries.push_opaque(raw, span.terminated),
        }
    }
    entries
}

fn parse_group_key(span: &EntrySpan) -> Option<GroupPath> {
    let key = span.key.as_ref()?.as_str()?;
    match GroupPath::parse(key) {
        Ok(path) => Some(path),
        Err(err) => {
            warn!("keeping unreadable group key {key:?} as is: {err}");
            None
        }
    }
}

fn parse_item_entry(
    text: &str,
    span: &EntrySpan,
) -> Option<(item_string::ItemIdentity, ItemAssignment)> {
    let key = span.key.as_ref()?.as_str()?;
    let identity = match item_string::parse(key) {
        Ok(identity) => identity,
        Err(err) => {
            warn!("keeping item entry as is: {err}");
            return None;
        }
    };
    let value = string_literal(&text[span.value.start..span.value.end])?;
    match GroupPath::parse(&value) {
        Ok(path) => Some((
            identity,
            ItemAssignment {
                key_text: key.to_string(),
                path,
            },
        )),
        Err(err) => {
            warn!("keeping item {key:?} as is, its group is unreadable: {err}");
            None
        }
    }
}

fn parse_status_entry(text: &str, span: &EntrySpan) -> Option<(TreeStatusKey, bool)> {
    let key = span.key.as_ref()?.as_str()?;
    let status = TreeStatusKey::decode(key)?;
    let value = bool_literal(&text[span.value.start..span.value.end])?;
    Some((status, value))
}

/// Indentation of the line an entry's first token sits on, if the entry starts
/// on a fresh line.
fn leading_indent(raw: &str) -> Option<String> {
    let content_start = raw.len() - raw.trim_start().len();
    let leading = &raw[..content_start];
    let line_start = leading.rfind('\n')? + 1;
    Some(leading[line_start..].to_string())
}

fn line_indent(text: &str) -> String {
    let line = match text.rfind('\n') {
        Some(pos) => &text[pos + 1..],
        None => text,
    };
    line.chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .collect()
}

fn malformed(message: impl Into<String>) -> CoreError {
    CoreError::new(CoreErrorCode::MalformedProfile, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indent_helpers() {
        assert_eq!(leading_indent("\n\t\t[\"a\"] = 1,").as_deref(), Some("\t\t"));
        assert_eq!(leading_indent(" [\"a\"] = 1,"), None);
        assert_eq!(line_indent("x = {\n\t\t[\"Default\"] = {"), "\t\t");
    }
}
