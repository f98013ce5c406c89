//! Node paths and permission keys.
//!
//! A [`NodePath`] names one node of the feature hierarchy by its normalized
//! segments. A [`PermissionId`] pairs a path with an [`Action`]. Both have a
//! canonical string form with backslash escaping, so a key always decodes
//! back to exactly one (path, action) pair.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Action;

/// Module, submodule, popup.
pub const MAX_DEPTH: usize = 3;

const ESCAPE: char = '\\';
const VISIBILITY_SEPARATOR: char = ':';
const SEGMENT_SEPARATOR: char = '/';
const ACTION_SEPARATOR: char = '#';

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("path has no segments")]
    EmptyPath,
    #[error("segment {index} is empty after normalization")]
    EmptySegment { index: usize },
    #[error("path has {depth} segments, at most {} allowed", MAX_DEPTH)]
    TooDeep { depth: usize },
    #[error("malformed key '{key}': {reason}")]
    Malformed { key: String, reason: &'static str },
    #[error("unknown action: {0}")]
    UnknownAction(String),
    #[error("unknown role: {0}")]
    UnknownRole(String),
}

/// Trim, lowercase and collapse whitespace runs to one space.
///
/// Inner whitespace is kept, so "HR Setup" and "HRSetup" stay distinct.
pub fn normalize_segment(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Normalized path of one hierarchy node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodePath(Vec<String>);

impl NodePath {
    pub fn new<I, S>(segments: I) -> Result<Self, KeyError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let segments = segments
            .into_iter()
            .enumerate()
            .map(|(index, raw)| {
                let segment = normalize_segment(raw.as_ref());
                if segment.is_empty() {
                    Err(KeyError::EmptySegment { index })
                } else {
                    Ok(segment)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        match segments.len() {
            0 => Err(KeyError::EmptyPath),
            depth if depth > MAX_DEPTH => Err(KeyError::TooDeep { depth }),
            _ => Ok(Self(segments)),
        }
    }

    pub fn module(name: &str) -> Result<Self, KeyError> {
        Self::new([name])
    }

    pub fn child(&self, name: &str) -> Result<Self, KeyError> {
        Self::new(self.0.iter().map(String::as_str).chain([name]))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Last normalized segment.
    pub fn name(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    pub fn parent(&self) -> Option<NodePath> {
        if self.0.len() > 1 {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        } else {
            None
        }
    }

    pub fn is_child_of(&self, other: &NodePath) -> bool {
        self.0.len() == other.0.len() + 1 && self.0.starts_with(&other.0)
    }

    /// `module`, `module:submodule` or `module:submodule:popup`.
    pub fn visibility_key(&self) -> String {
        join_escaped(&self.0, VISIBILITY_SEPARATOR)
    }

    pub fn parse_visibility_key(key: &str) -> Result<Self, KeyError> {
        let (segments, _) = split_escaped(key, VISIBILITY_SEPARATOR, None)?;
        Self::new(segments)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.visibility_key())
    }
}

impl FromStr for NodePath {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_visibility_key(s)
    }
}

impl TryFrom<String> for NodePath {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NodePath> for String {
    fn from(path: NodePath) -> Self {
        path.visibility_key()
    }
}

/// Key of one grant: a hierarchy node plus an action.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionId {
    path: NodePath,
    action: Action,
}

impl PermissionId {
    pub fn new(path: NodePath, action: Action) -> Self {
        Self { path, action }
    }

    pub fn path(&self) -> &NodePath {
        &self.path
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn parse(key: &str) -> Result<Self, KeyError> {
        let (segments, action) = split_escaped(key, SEGMENT_SEPARATOR, Some(ACTION_SEPARATOR))?;
        let action = action.ok_or_else(|| KeyError::Malformed {
            key: key.to_string(),
            reason: "missing action",
        })?;
        Ok(Self {
            path: NodePath::new(segments)?,
            action: action.parse()?,
        })
    }
}

impl fmt::Display for PermissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            join_escaped(self.path.segments(), SEGMENT_SEPARATOR),
            ACTION_SEPARATOR,
            self.action.as_str()
        )
    }
}

impl FromStr for PermissionId {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PermissionId {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PermissionId> for String {
    fn from(id: PermissionId) -> Self {
        id.to_string()
    }
}

fn join_escaped(segments: &[String], separator: char) -> String {
    let mut out = String::new();
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            out.push(separator);
        }
        for c in segment.chars() {
            if c == ESCAPE || c == separator || c == ACTION_SEPARATOR {
                out.push(ESCAPE);
            }
            out.push(c);
        }
    }
    out
}

/// Splits on unescaped `separator`. Stops at the first unescaped
/// `terminator` and returns the remainder verbatim.
fn split_escaped(
    input: &str,
    separator: char,
    terminator: Option<char>,
) -> Result<(Vec<String>, Option<&str>), KeyError> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = input.char_indices();

    while let Some((i, c)) = chars.next() {
        if c == ESCAPE {
            match chars.next() {
                Some((_, escaped)) => current.push(escaped),
                None => {
                    return Err(KeyError::Malformed {
                        key: input.to_string(),
                        reason: "dangling escape",
                    })
                }
            }
        } else if c == separator {
            segments.push(std::mem::take(&mut current));
        } else if Some(c) == terminator {
            segments.push(current);
            return Ok((segments, Some(&input[i + c.len_utf8()..])));
        } else {
            current.push(c);
        }
    }

    segments.push(current);
    Ok((segments, None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_keeps_inner_spaces() {
        assert_eq!(normalize_segment("  HR   Setup "), "hr setup");
        let spaced = NodePath::module("HR Setup").unwrap();
        let joined = NodePath::module("HRSetup").unwrap();
        assert_ne!(spaced, joined);
        assert_ne!(
            PermissionId::new(spaced, Action::View).to_string(),
            PermissionId::new(joined, Action::View).to_string()
        );
    }

    #[test]
    fn permission_key_format() {
        let path = NodePath::new(["HRMS", "Attendance", "Attendance Record"]).unwrap();
        let id = PermissionId::new(path, Action::Edit);
        assert_eq!(id.to_string(), "hrms/attendance/attendance record#edit");
        assert_eq!(PermissionId::parse("hrms/attendance/attendance record#edit").unwrap(), id);
    }

    #[test]
    fn separators_inside_names_are_escaped() {
        let path = NodePath::new(["Sales/Invoicing", "Credit #Notes", "a\\b:c"]).unwrap();
        let id = PermissionId::new(path.clone(), Action::Delete);
        let key = id.to_string();
        assert_eq!(key, "sales\\/invoicing/credit \\#notes/a\\\\b:c#delete");
        assert_eq!(PermissionId::parse(&key).unwrap(), id);

        let vis = path.visibility_key();
        assert_eq!(NodePath::parse_visibility_key(&vis).unwrap(), path);
    }

    #[test]
    fn rejects_bad_paths() {
        assert_eq!(NodePath::new(Vec::<String>::new()), Err(KeyError::EmptyPath));
        assert_eq!(NodePath::new(["HRMS", "  "]), Err(KeyError::EmptySegment { index: 1 }));
        assert_eq!(
            NodePath::new(["a", "b", "c", "d"]),
            Err(KeyError::TooDeep { depth: 4 })
        );
        assert!(matches!(
            PermissionId::parse("inventory"),
            Err(KeyError::Malformed { reason: "missing action", .. })
        ));
        assert!(matches!(
            PermissionId::parse("inventory\\"),
            Err(KeyError::Malformed { reason: "dangling escape", .. })
        ));
        assert_eq!(
            PermissionId::parse("inventory#approve"),
            Err(KeyError::UnknownAction("approve".to_string()))
        );
    }

    #[test]
    fn parent_and_child_relations() {
        let sub = NodePath::new(["HRMS", "Attendance"]).unwrap();
        let popup = sub.child("Attendance Record").unwrap();
        assert_eq!(popup.depth(), 3);
        assert_eq!(popup.parent(), Some(sub.clone()));
        assert!(popup.is_child_of(&sub));
        assert!(!popup.is_child_of(&NodePath::module("HRMS").unwrap()));
        assert_eq!(popup.visibility_key(), "hrms:attendance:attendance record");
        assert!(sub.child("x").unwrap().child("too deep").is_err());
    }

    #[test]
    fn serializes_as_strings() {
        let id = PermissionId::new(NodePath::module("Inventory").unwrap(), Action::View);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"inventory#view\"");
        let back: PermissionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
