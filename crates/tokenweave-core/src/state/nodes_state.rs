use std::collections::HashMap;

use tokenweave_core_types::TreePath;

use crate::errors::{Result, TokenTreeError};
use crate::model::{CollectionState, GroupState, NodeRef, TokenSlot};

/// In-memory registry of built tree nodes
///
/// Three disjoint collections keyed by stringified `TreePath`. Not
/// thread-safe (no Arc/RwLock) - designed for single-threaded use; one
/// instance is owned by exactly one engine and passed explicitly to every
/// builder, query, and mutation call.
#[derive(Debug, Clone, Default)]
pub struct TreeNodesState {
    /// Tokens (live or unresolvable) by stringified path
    tokens: HashMap<String, TokenSlot>,
    /// Groups by stringified path
    groups: HashMap<String, GroupState>,
    /// Collections by stringified path
    collections: HashMap<String, CollectionState>,
}

impl TreeNodesState {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token
    ///
    /// # Errors
    ///
    /// Returns `InternalDesign` for the empty path (the tree root is not
    /// a node) and `DuplicateNode` when any kind of node already occupies
    /// the path.
    pub fn add_token(&mut self, token: TokenSlot) -> Result<()> {
        let key = self.claim(token.path())?;
        self.tokens.insert(key, token);
        Ok(())
    }

    /// Register a group
    ///
    /// # Errors
    ///
    /// Same contract as [`TreeNodesState::add_token`].
    pub fn add_group(&mut self, group: GroupState) -> Result<()> {
        let key = self.claim(&group.common.path)?;
        self.groups.insert(key, group);
        Ok(())
    }

    /// Register a collection
    ///
    /// # Errors
    ///
    /// Same contract as [`TreeNodesState::add_token`].
    pub fn add_collection(&mut self, collection: CollectionState) -> Result<()> {
        let key = self.claim(&collection.common.path)?;
        self.collections.insert(key, collection);
        Ok(())
    }

    fn claim(&self, path: &TreePath) -> Result<String> {
        if path.is_empty() {
            return Err(TokenTreeError::InternalDesign {
                message: "cannot register a node at the tree root".to_string(),
            });
        }
        let key = path.to_string();
        if self.contains(path) {
            return Err(TokenTreeError::DuplicateNode { path: key });
        }
        Ok(key)
    }

    /// Look up a token by path
    pub fn token(&self, path: &TreePath) -> Option<&TokenSlot> {
        self.tokens.get(&path.to_string())
    }

    /// Look up a token by path, mutably
    pub fn token_mut(&mut self, path: &TreePath) -> Option<&mut TokenSlot> {
        self.tokens.get_mut(&path.to_string())
    }

    /// Get a token by path
    ///
    /// # Errors
    ///
    /// Returns `ReferenceNotFound` when no token is registered there.
    pub fn get_token(&self, path: &TreePath) -> Result<&TokenSlot> {
        self.token(path)
            .ok_or_else(|| TokenTreeError::ReferenceNotFound {
                path: path.to_string(),
            })
    }

    /// Look up a group by path
    pub fn group(&self, path: &TreePath) -> Option<&GroupState> {
        self.groups.get(&path.to_string())
    }

    /// Look up a group by path, mutably
    pub fn group_mut(&mut self, path: &TreePath) -> Option<&mut GroupState> {
        self.groups.get_mut(&path.to_string())
    }

    /// Get a group by path
    ///
    /// # Errors
    ///
    /// Returns `ReferenceNotFound` when no group is registered there.
    pub fn get_group(&self, path: &TreePath) -> Result<&GroupState> {
        self.group(path)
            .ok_or_else(|| TokenTreeError::ReferenceNotFound {
                path: path.to_string(),
            })
    }

    /// Look up a collection by path
    pub fn collection(&self, path: &TreePath) -> Option<&CollectionState> {
        self.collections.get(&path.to_string())
    }

    /// Look up a collection by path, mutably
    pub fn collection_mut(&mut self, path: &TreePath) -> Option<&mut CollectionState> {
        self.collections.get_mut(&path.to_string())
    }

    /// Get a collection by path
    ///
    /// # Errors
    ///
    /// Returns `ReferenceNotFound` when no collection is registered there.
    pub fn get_collection(&self, path: &TreePath) -> Result<&CollectionState> {
        self.collection(path)
            .ok_or_else(|| TokenTreeError::ReferenceNotFound {
                path: path.to_string(),
            })
    }

    /// Look up a node of any kind by path
    pub fn node(&self, path: &TreePath) -> Option<NodeRef<'_>> {
        let key = path.to_string();
        if let Some(token) = self.tokens.get(&key) {
            return Some(NodeRef::from(token));
        }
        if let Some(group) = self.groups.get(&key) {
            return Some(NodeRef::Group(group));
        }
        self.collections.get(&key).map(NodeRef::Collection)
    }

    /// Check if any node occupies a path
    pub fn contains(&self, path: &TreePath) -> bool {
        let key = path.to_string();
        self.tokens.contains_key(&key)
            || self.groups.contains_key(&key)
            || self.collections.contains_key(&key)
    }

    /// Remove a token, returning it
    pub fn remove_token(&mut self, path: &TreePath) -> Option<TokenSlot> {
        self.tokens.remove(&path.to_string())
    }

    /// Remove a group, returning it
    pub fn remove_group(&mut self, path: &TreePath) -> Option<GroupState> {
        self.groups.remove(&path.to_string())
    }

    /// Remove a collection, returning it
    pub fn remove_collection(&mut self, path: &TreePath) -> Option<CollectionState> {
        self.collections.remove(&path.to_string())
    }

    /// Remove whatever node occupies a path; true when something was
    /// removed
    pub fn remove_node(&mut self, path: &TreePath) -> bool {
        let key = path.to_string();
        self.tokens.remove(&key).is_some()
            || self.groups.remove(&key).is_some()
            || self.collections.remove(&key).is_some()
    }

    /// Drop every node
    pub fn clear(&mut self) {
        self.tokens.clear();
        self.groups.clear();
        self.collections.clear();
    }

    /// All tokens, path-sorted
    pub fn list_tokens(&self) -> Vec<&TokenSlot> {
        let mut tokens: Vec<&TokenSlot> = self.tokens.values().collect();
        tokens.sort_by(|a, b| a.path().cmp(b.path()));
        tokens
    }

    /// All groups, path-sorted
    pub fn list_groups(&self) -> Vec<&GroupState> {
        let mut groups: Vec<&GroupState> = self.groups.values().collect();
        groups.sort_by(|a, b| a.common.path.cmp(&b.common.path));
        groups
    }

    /// All collections, path-sorted
    pub fn list_collections(&self) -> Vec<&CollectionState> {
        let mut collections: Vec<&CollectionState> = self.collections.values().collect();
        collections.sort_by(|a, b| a.common.path.cmp(&b.common.path));
        collections
    }

    /// Every node of every kind, path-sorted
    pub fn list_nodes(&self) -> Vec<NodeRef<'_>> {
        let mut nodes: Vec<NodeRef<'_>> = self
            .tokens
            .values()
            .map(NodeRef::from)
            .chain(self.groups.values().map(NodeRef::Group))
            .chain(self.collections.values().map(NodeRef::Collection))
            .collect();
        nodes.sort_by(|a, b| a.path().cmp(b.path()));
        nodes
    }

    /// Paths of every node, sorted
    pub fn paths(&self) -> Vec<TreePath> {
        self.list_nodes()
            .into_iter()
            .map(|node| node.path().clone())
            .collect()
    }

    /// Paths of the strict descendants of `prefix`, sorted
    pub fn descendants_of(&self, prefix: &TreePath) -> Vec<TreePath> {
        self.paths()
            .into_iter()
            .filter(|path| prefix.is_strict_ancestor_of(path))
            .collect()
    }

    /// The nearest collection on a node's ancestor chain, if any
    ///
    /// This is the collection whose mode set governs the node.
    pub fn nearest_collection(&self, path: &TreePath) -> Option<&CollectionState> {
        let mut current = path.parent();
        while let Some(ancestor) = current {
            if let Some(collection) = self.collection(&ancestor) {
                return Some(collection);
            }
            current = ancestor.parent();
        }
        None
    }

    /// Total number of registered nodes
    pub fn len(&self) -> usize {
        self.tokens.len() + self.groups.len() + self.collections.len()
    }

    /// Check if the registry holds no nodes
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty() && self.groups.is_empty() && self.collections.is_empty()
    }
}
