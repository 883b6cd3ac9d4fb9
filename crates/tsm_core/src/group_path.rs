//! Group paths and the tree-status chain keys derived from them.
//!
//! A group path is serialized with a backtick between segments (`A`B`C`). A
//! backtick inside a segment is escaped with a backslash. Backslashes are only
//! escaped (doubled) when they run into a backtick or the end of the path, so
//! any other backslash is literal and every key decodes and re-encodes to the
//! same text.
//!
//! Tree-status keys are a different encoding: the expanded marker `1`, then every
//! ancestor's serialized path, each preceded by SOH (0x01). For `A`B` that is
//! `"1\x01A\x01A`B"`.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const PATH_DELIMITER: char = '`';
pub const PATH_ESCAPE: char = '\\';
pub const CHAIN_SEPARATOR: char = '\u{1}';
pub const EXPANDED_MARKER: &str = "1";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GroupPathError {
    #[error("group path is empty")]
    Empty,
    #[error("group path {0:?} contains an empty segment")]
    EmptySegment(String),
    #[error("group path {0:?} ends with a dangling escape")]
    DanglingEscape(String),
    #[error("group path segment {0:?} contains a control character")]
    ControlCharacter(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupPath {
    segments: Vec<String>,
}

impl GroupPath {
    pub fn from_segments<I, S>(segments: I) -> Result<Self, GroupPathError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(GroupPathError::Empty);
        }
        for segment in &segments {
            if segment.is_empty() {
                return Err(GroupPathError::EmptySegment(segments.join("`")));
            }
            if segment.chars().any(char::is_control) {
                return Err(GroupPathError::ControlCharacter(segment.clone()));
            }
        }
        Ok(Self { segments })
    }

    /// Decode the serialized (backtick-delimited) form.
    pub fn parse(serialized: &str) -> Result<Self, GroupPathError> {
        if serialized.is_empty() {
            return Err(GroupPathError::Empty);
        }

        let mut segments = Vec::new();
        let mut current = String::new();
        let mut chars = serialized.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                PATH_ESCAPE => {
                    let mut run = 1;
                    while chars.next_if_eq(&PATH_ESCAPE).is_some() {
                        run += 1;
                    }
                    match chars.peek() {
                        Some(&PATH_DELIMITER) => {
                            push_backslashes(&mut current, run / 2);
                            if run % 2 == 1 {
                                chars.next();
                                current.push(PATH_DELIMITER);
                            }
                        }
                        None if run % 2 == 1 => {
                            return Err(GroupPathError::DanglingEscape(serialized.to_string()));
                        }
                        None => push_backslashes(&mut current, run / 2),
                        Some(_) => push_backslashes(&mut current, run),
                    }
                }
                PATH_DELIMITER => {
                    if current.is_empty() {
                        return Err(GroupPathError::EmptySegment(serialized.to_string()));
                    }
                    segments.push(std::mem::take(&mut current));
                }
                other => current.push(other),
            }
        }
        if current.is_empty() {
            return Err(GroupPathError::EmptySegment(serialized.to_string()));
        }
        segments.push(current);

        Self::from_segments(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn name(&self) -> &str {
        // from_segments guarantees at least one segment
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    pub fn parent(&self) -> Option<GroupPath> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn child(&self, segment: impl Into<String>) -> Result<GroupPath, GroupPathError> {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self::from_segments(segments)
    }

    /// Every non-empty prefix, root first, ending with `self`.
    pub fn ancestors(&self) -> Vec<GroupPath> {
        (1..=self.segments.len())
            .map(|len| Self {
                segments: self.segments[..len].to_vec(),
            })
            .collect()
    }

    pub fn is_ancestor_of(&self, other: &GroupPath) -> bool {
        other.segments.len() >= self.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }

    /// Replace the `from` prefix of this path with `to`.
    pub fn rebase(&self, from: &GroupPath, to: &GroupPath) -> Option<GroupPath> {
        if !from.is_ancestor_of(self) {
            return None;
        }
        let mut segments = to.segments.clone();
        segments.extend_from_slice(&self.segments[from.segments.len()..]);
        Some(Self { segments })
    }

    pub fn encode(&self) -> String {
        let mut out = String::new();
        for (index, segment) in self.segments.iter().enumerate() {
            if index > 0 {
                out.push(PATH_DELIMITER);
            }
            let mut run = 0;
            for c in segment.chars() {
                match c {
                    PATH_ESCAPE => run += 1,
                    PATH_DELIMITER => {
                        push_backslashes(&mut out, run * 2 + 1);
                        out.push(PATH_DELIMITER);
                        run = 0;
                    }
                    other => {
                        push_backslashes(&mut out, run);
                        out.push(other);
                        run = 0;
                    }
                }
            }
            // a trailing run is followed by a delimiter or the end of the key
            push_backslashes(&mut out, run * 2);
        }
        out
    }
}

fn push_backslashes(out: &mut String, count: usize) {
    out.extend(std::iter::repeat_n(PATH_ESCAPE, count));
}

impl fmt::Display for GroupPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl std::str::FromStr for GroupPath {
    type Err = GroupPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for GroupPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for GroupPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        GroupPath::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Key of a `groupTreeStatus` / `groupTreeCollapsedStatus` entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreeStatusKey {
    path: GroupPath,
}

impl TreeStatusKey {
    pub fn for_path(path: &GroupPath) -> Self {
        Self { path: path.clone() }
    }

    pub fn path(&self) -> &GroupPath {
        &self.path
    }

    pub fn encode(&self) -> String {
        let mut out = String::from(EXPANDED_MARKER);
        for ancestor in self.path.ancestors() {
            out.push(CHAIN_SEPARATOR);
            out.push_str(&ancestor.encode());
        }
        out
    }

    /// Decode a chain key. Returns `None` for keys that are not a well-formed
    /// cumulative chain (the bare root marker, positional flags, foreign keys).
    pub fn decode(raw: &str) -> Option<Self> {
        let mut parts = raw.split(CHAIN_SEPARATOR);
        if parts.next()? != EXPANDED_MARKER {
            return None;
        }

        let mut last: Option<GroupPath> = None;
        for part in parts {
            let path = GroupPath::parse(part).ok()?;
            match &last {
                None if path.depth() != 1 => return None,
                Some(prev) if path.parent().as_ref() != Some(prev) => return None,
                _ => {}
            }
            last = Some(path);
        }

        last.map(|path| Self { path })
    }
}

impl fmt::Display for TreeStatusKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode().replace(CHAIN_SEPARATOR, "\\001"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(raw: &str) -> GroupPath {
        GroupPath::parse(raw).expect("valid path")
    }

    #[test]
    fn escaped_delimiter_stays_inside_segment() {
        let p = path("Gear`Odd\\`Name");
        assert_eq!(p.segments(), ["Gear", "Odd`Name"]);
        assert_eq!(p.encode(), "Gear`Odd\\`Name");
    }

    #[test]
    fn bare_backslashes_are_literal() {
        for raw in ["Foo\\Bar", "A\\\\B", "Tools`C:\\x", "Odd\\\\\\`Name", "Trail\\\\"] {
            assert_eq!(path(raw).encode(), raw, "{raw:?}");
        }
        assert_eq!(path("Foo\\Bar").segments(), ["Foo\\Bar"]);
        assert_eq!(path("A\\\\`B").segments(), ["A\\", "B"]);
        assert_eq!(path("Odd\\\\\\`Name").segments(), ["Odd\\`Name"]);
        assert_eq!(path("Trail\\\\").segments(), ["Trail\\"]);

        let built = GroupPath::from_segments(["Back\\", "Tick`\\x"]).expect("valid segments");
        assert_eq!(GroupPath::parse(&built.encode()), Ok(built));
    }

    #[test]
    fn empty_segments_are_rejected() {
        assert!(matches!(
            GroupPath::parse("A``B"),
            Err(GroupPathError::EmptySegment(_))
        ));
        assert!(matches!(
            GroupPath::parse("A`"),
            Err(GroupPathError::EmptySegment(_))
        ));
        assert!(matches!(GroupPath::parse(""), Err(GroupPathError::Empty)));
        assert!(matches!(
            GroupPath::parse("A\\"),
            Err(GroupPathError::DanglingEscape(_))
        ));
    }

    #[test]
    fn chain_key_is_cumulative() {
        let key = TreeStatusKey::for_path(&path("A`B"));
        assert_eq!(key.encode(), "1\u{1}A\u{1}A`B");
        assert_eq!(TreeStatusKey::decode("1\u{1}A\u{1}A`B"), Some(key));
    }

    #[test]
    fn malformed_chains_are_not_keys() {
        assert_eq!(TreeStatusKey::decode("1"), None);
        assert_eq!(TreeStatusKey::decode("1\u{1}A\u{1}B"), None);
        assert_eq!(TreeStatusKey::decode("1\u{1}A`B"), None);
        assert_eq!(TreeStatusKey::decode("1 A A`B"), None);
        assert_eq!(TreeStatusKey::decode("2\u{1}A"), None);
    }

    #[test]
    fn rebase_moves_descendants() {
        let moved = path("A`B`C").rebase(&path("A`B"), &path("X")).expect("rebased");
        assert_eq!(moved, path("X`C"));
        assert_eq!(path("A`C").rebase(&path("A`B"), &path("X")), None);
    }
}
