//! Serialize a [`ProfileModel`] back to SavedVariables text.
//!
//! Captured text is written back as is. Only entries that are new or changed
//! are rendered, in the client's dump style: one `["key"] = value,` per line.

use std::hash::Hash;

use crate::group_path::{GroupPath, TreeStatusKey};
use crate::item_string::ItemIdentity;
use crate::lua;
use crate::profile::{
    GroupMeta, ItemAssignment, ProfileModel, Section, SlotKey, TableEntries, TableKind,
};

pub fn write(model: &ProfileModel) -> String {
    let layout = &model.layout;
    let newline = layout.newline;
    let mut out = String::with_capacity(layout.prelude.len() + layout.trailer.len() + 4096);
    out.push_str(&layout.prelude);

    let mut pending_comma = false;
    for section in &layout.sections {
        if pending_comma {
            out.push(',');
        }
        match section {
            Section::Other(index) => {
                let other = &model.other_keys[*index];
                out.push_str(&other.raw);
                pending_comma = !other.terminated;
            }
            Section::Table(kind) => {
                let terminated = write_framed(&mut out, model, *kind);
                pending_comma = !terminated;
            }
        }
    }

    let mut appended = false;
    for kind in [TableKind::Groups, TableKind::Items, TableKind::TreeStatus] {
        if model.has_table(kind) || table_is_empty(model, kind) {
            continue;
        }
        if pending_comma {
            out.push(',');
            pending_comma = false;
        }
        write_synthesized(&mut out, model, kind);
        appended = true;
    }

    if appended && layout.closes_inline {
        out.push_str(newline);
        out.push_str(&layout.closing_indent);
    }
    out.push_str(&layout.trailer);
    out
}

fn table_is_empty(model: &ProfileModel, kind: TableKind) -> bool {
    match kind {
        TableKind::Groups => model.groups.is_empty(),
        TableKind::Items => model.items.is_empty(),
        TableKind::TreeStatus => model.tree_status.is_empty(),
        TableKind::CollapsedStatus => model.collapsed_status.is_empty(),
    }
}

/// Write a table that exists in the file. Returns whether its entry carries a
/// separator.
fn write_framed(out: &mut String, model: &ProfileModel, kind: TableKind) -> bool {
    let newline = model.layout.newline;
    match kind {
        TableKind::Groups => framed(out, &model.groups, newline, |indent, path, meta| {
            render_group(path, meta, indent, newline)
        }),
        TableKind::Items => framed(out, &model.items, newline, |_, _, assignment| {
            render_item(assignment)
        }),
        TableKind::TreeStatus => framed(out, &model.tree_status, newline, |_, key, value| {
            render_status(key, *value)
        }),
        TableKind::CollapsedStatus => {
            framed(out, &model.collapsed_status, newline, |_, key, value| {
                render_status(key, *value)
            })
        }
    }
}

fn framed<K, V, F>(out: &mut String, table: &TableEntries<K, V>, newline: &str, render: F) -> bool
where
    K: Hash + Eq + Clone,
    V: Clone + PartialEq,
    F: Fn(&str, &K, &V) -> String,
{
    let Some(frame) = &table.frame else {
        return true;
    };

    out.push_str(&frame.head);
    let rendered_any = write_entries(out, table, &frame.entry_indent, newline, &render);
    if rendered_any && frame.closes_inline() {
        out.push_str(newline);
        out.push_str(&frame.closing_indent);
    }
    if table.removed {
        let (gap, rest) = split_gap(&frame.tail);
        out.push_str(&collapse_gap(gap, true));
        out.push_str(rest);
    } else {
        out.push_str(&frame.tail);
    }
    frame.terminated
}

/// Returns true when at least one entry had to be rendered.
fn write_entries<K, V, F>(
    out: &mut String,
    table: &TableEntries<K, V>,
    indent: &str,
    newline: &str,
    render: &F,
) -> bool
where
    K: Hash + Eq + Clone,
    V: Clone + PartialEq,
    F: Fn(&str, &K, &V) -> String,
{
    let mut pending_comma = false;
    let mut rendered_any = false;
    for (position, (key, slot)) in table.slots.iter().enumerate() {
        if pending_comma {
            out.push(',');
        }
        match (&slot.raw, key, &slot.value) {
            (Some(raw), _, _) if table.removed => {
                let (gap, rest) = split_gap(raw);
                out.push_str(&collapse_gap(gap, position == 0));
                out.push_str(rest);
                pending_comma = !slot.terminated;
            }
            (Some(raw), _, _) => {
                out.push_str(raw);
                pending_comma = !slot.terminated;
            }
            (None, SlotKey::Known(key), Some(value)) => {
                out.push_str(newline);
                out.push_str(indent);
                out.push_str(&render(indent, key, value));
                pending_comma = false;
                rendered_any = true;
            }
            _ => pending_comma = false,
        }
    }
    rendered_any
}

fn write_synthesized(out: &mut String, model: &ProfileModel, kind: TableKind) {
    let newline = model.layout.newline;
    let outer = &model.layout.entry_indent;
    let inner = format!("{outer}\t");

    out.push_str(newline);
    out.push_str(outer);
    out.push_str(&lua::key(kind.key()));
    out.push_str(" = {");
    match kind {
        TableKind::Groups => {
            let render = |indent: &str, path: &GroupPath, meta: &GroupMeta| {
                render_group(path, meta, indent, newline)
            };
            write_entries(out, &model.groups, &inner, newline, &render);
        }
        TableKind::Items => {
            let render =
                |_: &str, _: &ItemIdentity, assignment: &ItemAssignment| render_item(assignment);
            write_entries(out, &model.items, &inner, newline, &render);
        }
        TableKind::TreeStatus | TableKind::CollapsedStatus => {
            let table = if kind == TableKind::TreeStatus {
                &model.tree_status
            } else {
                &model.collapsed_status
            };
            let nested = format!("{inner}\t");
            out.push_str(newline);
            out.push_str(&inner);
            out.push_str(&lua::key("groups"));
            out.push_str(" = {");
            let render = |_: &str, key: &TreeStatusKey, value: &bool| render_status(key, *value);
            write_entries(out, table, &nested, newline, &render);
            out.push_str(newline);
            out.push_str(&inner);
            out.push_str("},");
        }
    }
    out.push_str(newline);
    out.push_str(outer);
    out.push_str("},");
}

fn render_group(path: &GroupPath, meta: &GroupMeta, indent: &str, newline: &str) -> String {
    let value = match meta {
        GroupMeta::Raw(text) => text.clone(),
        GroupMeta::Template(modules) => render_template(modules, indent, newline),
    };
    format!("{} = {value},", lua::key(&path.encode()))
}

/// `{ ["Mailing"] = { "", -- [1] }, ... }` spread over lines like the client
/// writes it.
fn render_template(modules: &[String], indent: &str, newline: &str) -> String {
    let mut out = String::from("{");
    for module in modules {
        out.push_str(&format!(
            "{newline}{indent}\t{} = {{{newline}{indent}\t\t\"\", -- [1]{newline}{indent}\t}},",
            lua::key(module)
        ));
    }
    out.push_str(newline);
    out.push_str(indent);
    out.push('}');
    out
}

fn render_item(assignment: &ItemAssignment) -> String {
    format!(
        "{} = {},",
        lua::key(&assignment.key_text),
        lua::quote(&assignment.path.encode())
    )
}

fn render_status(key: &TreeStatusKey, value: bool) -> String {
    format!("{} = {},", lua::key(&key.encode()), lua::boolean(value))
}

/// Leading whitespace of an entry or table tail, and the text after it.
fn split_gap(text: &str) -> (&str, &str) {
    let end = text
        .find(|c: char| !matches!(c, ' ' | '\t' | '\r' | '\n'))
        .unwrap_or(text.len());
    text.split_at(end)
}

/// Keep at most one blank line in a gap between entries, and none in a gap
/// that touches the table's braces.
fn collapse_gap(gap: &str, at_brace: bool) -> String {
    let pieces: Vec<&str> = gap.split('\n').collect();
    if pieces.len() < 3 {
        return gap.to_string();
    }
    let blank_lines = if at_brace { 0 } else { 1 };
    let last = pieces.len() - 1;
    let mut kept = Vec::with_capacity(blank_lines + 2);
    kept.push(pieces[0]);
    kept.extend_from_slice(&pieces[1..last][..blank_lines.min(last - 1)]);
    kept.push(pieces[last]);
    kept.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gaps_keep_at_most_one_blank_line() {
        assert_eq!(collapse_gap("\n\n\n\t", false), "\n\n\t");
        assert_eq!(collapse_gap("\r\n\r\n\r\n\t", false), "\r\n\r\n\t");
        assert_eq!(collapse_gap("\n\n\t", true), "\n\t");
        assert_eq!(collapse_gap("\n\t", true), "\n\t");
        assert_eq!(collapse_gap(" ", true), " ");
        assert_eq!(split_gap("\n\n\t[\"a\"] = 1,"), ("\n\n\t", "[\"a\"] = 1,"));
        assert_eq!(split_gap("\n\t-- note\n}"), ("\n\t", "-- note\n}"));
    }

    #[test]
    fn template_spans_lines() {
        let rendered = render_template(&["Mailing".to_string()], "\t", "\n");
        assert_eq!(rendered, "{\n\t\t[\"Mailing\"] = {\n\t\t\t\"\", -- [1]\n\t\t},\n\t}");
    }
}
