use std::fmt;

use serde::{Deserialize, Serialize};

use crate::PATH_SEPARATOR;

/// TreePath - the primary key of a node in the token hierarchy
///
/// A TreePath is an ordered sequence of name segments. Equality is
/// sequence equality, and the stringified form (segments joined by the
/// path separator) keys the tree-node registry. Segments must not contain
/// the separator character; the parser rejects documents that would
/// produce such a segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TreePath {
    segments: Vec<String>,
}

impl TreePath {
    /// Create a TreePath from its segments
    pub fn new(segments: Vec<String>) -> Self {
        Self { segments }
    }

    /// Parse a TreePath from its stringified form
    ///
    /// The inverse of `to_string()`: splits on the path separator.
    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() {
            return Self { segments: Vec::new() };
        }
        Self {
            segments: raw.split(PATH_SEPARATOR).map(str::to_string).collect(),
        }
    }

    /// The path segments, in root-to-leaf order
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The node's own name (last segment)
    ///
    /// Returns an empty string for the (invalid as a node key) empty path.
    pub fn name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    /// Number of segments
    ///
    /// This is also the node's depth: root-level nodes are at depth 1.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// True for the empty path (the tree root itself, never a node key)
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// True when the node sits directly under the tree root
    pub fn is_root_level(&self) -> bool {
        self.segments.len() == 1
    }

    /// Parent path, or None for root-level and empty paths
    pub fn parent(&self) -> Option<TreePath> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(TreePath {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Extend the path with one more segment
    pub fn child(&self, name: &str) -> TreePath {
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        TreePath { segments }
    }

    /// True when `self` is a strict ancestor of `other`
    ///
    /// A path is never its own ancestor.
    pub fn is_strict_ancestor_of(&self, other: &TreePath) -> bool {
        other.segments.len() > self.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }

    /// True when `self` equals `prefix` or descends from it
    pub fn is_within(&self, prefix: &TreePath) -> bool {
        self == prefix || prefix.is_strict_ancestor_of(self)
    }

    /// Rebase the path from `old_prefix` onto `new_prefix`
    ///
    /// Returns None when the path is not within `old_prefix`. Used by the
    /// rename commands to move a whole subtree.
    pub fn rebased(&self, old_prefix: &TreePath, new_prefix: &TreePath) -> Option<TreePath> {
        if !self.is_within(old_prefix) {
            return None;
        }
        let mut segments = new_prefix.segments.clone();
        segments.extend(self.segments[old_prefix.segments.len()..].iter().cloned());
        Some(TreePath { segments })
    }

    /// Replace the last segment, keeping the location in the tree
    pub fn renamed(&self, name: &str) -> TreePath {
        let mut segments = self.segments.clone();
        if let Some(last) = segments.last_mut() {
            *last = name.to_string();
        }
        TreePath { segments }
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join(&PATH_SEPARATOR.to_string()))
    }
}

impl From<Vec<String>> for TreePath {
    fn from(segments: Vec<String>) -> Self {
        Self { segments }
    }
}

impl From<&[&str]> for TreePath {
    fn from(segments: &[&str]) -> Self {
        Self {
            segments: segments.iter().map(|s| s.to_string()).collect(),
        }
    }
}
