use serde::{Deserialize, Serialize};
use tokenweave_core_types::TreePath;

use super::extensions::Extensions;
use super::token::{TokenSlot, TokenState, UnresolvableTokenState};

/// Fields shared by every node kind
///
/// Node kinds are a tagged union over this base contract, not an
/// inheritance hierarchy: each concrete state struct embeds a
/// `NodeCommon` and the registry discriminates by which collection a
/// path is registered in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeCommon {
    /// Location of the node; primary key inside the registry
    pub path: TreePath,
    /// Optional human-readable description
    pub description: Option<String>,
    /// Optional vendor extensions
    pub extensions: Option<Extensions>,
}

impl NodeCommon {
    /// Create the common fields for a node at `path`
    pub fn new(path: TreePath, description: Option<String>, extensions: Option<Extensions>) -> Self {
        Self {
            path,
            description,
            extensions,
        }
    }

    /// The node's own name (last path segment)
    pub fn name(&self) -> &str {
        self.path.name()
    }
}

/// Group - a non-leaf organizational node with no mode semantics of its own
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupState {
    pub common: NodeCommon,
}

impl GroupState {
    pub fn new(common: NodeCommon) -> Self {
        Self { common }
    }
}

/// Collection - a group that declares the allowed mode set for its subtree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionState {
    pub common: NodeCommon,
    /// Non-empty ordered list of mode names descendants may use
    pub allowed_modes: Vec<String>,
}

impl CollectionState {
    pub fn new(common: NodeCommon, allowed_modes: Vec<String>) -> Self {
        Self {
            common,
            allowed_modes,
        }
    }

    /// Check whether a mode name is usable by descendants
    pub fn allows_mode(&self, mode: &str) -> bool {
        self.allowed_modes.iter().any(|m| m == mode)
    }
}

/// Discriminant for the node kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    Token,
    UnresolvableToken,
    Group,
    Collection,
}

/// Borrowed view over any node in the registry
///
/// Query evaluation and rendering work on this union so they never care
/// which of the three disjoint collections a node came from.
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Token(&'a TokenState),
    UnresolvableToken(&'a UnresolvableTokenState),
    Group(&'a GroupState),
    Collection(&'a CollectionState),
}

impl<'a> NodeRef<'a> {
    /// The shared base fields of the node
    pub fn common(&self) -> &'a NodeCommon {
        match self {
            NodeRef::Token(token) => &token.common,
            NodeRef::UnresolvableToken(token) => &token.common,
            NodeRef::Group(group) => &group.common,
            NodeRef::Collection(collection) => &collection.common,
        }
    }

    /// The node's path
    pub fn path(&self) -> &'a TreePath {
        &self.common().path
    }

    /// The node's own name
    pub fn name(&self) -> &'a str {
        self.common().name()
    }

    /// The kind discriminant
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeRef::Token(_) => NodeKind::Token,
            NodeRef::UnresolvableToken(_) => NodeKind::UnresolvableToken,
            NodeRef::Group(_) => NodeKind::Group,
            NodeRef::Collection(_) => NodeKind::Collection,
        }
    }

    /// True for both resolvable and unresolvable tokens
    pub fn is_token(&self) -> bool {
        matches!(self, NodeRef::Token(_) | NodeRef::UnresolvableToken(_))
    }
}

impl<'a> From<&'a TokenSlot> for NodeRef<'a> {
    fn from(slot: &'a TokenSlot) -> Self {
        match slot {
            TokenSlot::Token(token) => NodeRef::Token(token),
            TokenSlot::UnresolvableToken(token) => NodeRef::UnresolvableToken(token),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_name_is_last_segment() {
        let common = NodeCommon::new(TreePath::parse("colors.primary"), None, None);
        assert_eq!(common.name(), "primary");
    }

    #[test]
    fn test_collection_allows_mode() {
        let collection = CollectionState::new(
            NodeCommon::new(TreePath::parse("theme"), None, None),
            vec!["light".to_string(), "dark".to_string()],
        );
        assert!(collection.allows_mode("light"));
        assert!(!collection.allows_mode("sepia"));
    }
}
