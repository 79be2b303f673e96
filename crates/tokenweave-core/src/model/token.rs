use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokenweave_core_types::{TreePath, ValuePath};

use super::node::NodeCommon;

/// A concrete leaf inside a token's value for one mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimitivePart {
    /// Mode the part belongs to
    pub mode: String,
    /// Position inside the mode's value
    pub value_path: ValuePath,
    /// The literal at that position
    pub value: serde_json::Value,
}

/// A reference inside a token's value to another token at a specific mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliasPart {
    /// Mode the part belongs to
    pub mode: String,
    /// Position inside the mode's value; the root path marks a top-level
    /// alias (the whole mode value is this one reference)
    pub value_path: ValuePath,
    /// Path of the referenced token
    pub target_path: TreePath,
    /// Mode requested from the referenced token
    pub target_mode: String,
}

/// Token - a leaf node carrying a typed, per-mode value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenState {
    pub common: NodeCommon,
    /// Declared type name, resolved through the type registry
    pub token_type: String,
    /// Raw value per mode, aliases still embedded
    pub values: BTreeMap<String, serde_json::Value>,
    /// Concrete leaves across all modes, flattened
    pub primitive_parts: Vec<PrimitivePart>,
    /// References across all modes, flattened
    pub alias_parts: Vec<AliasPart>,
    /// True when every declared mode's value is a single whole-value alias
    pub is_top_level_alias: bool,
    /// Per-mode resolvability of the alias chain
    pub modes_resolvability: BTreeMap<String, bool>,
}

impl TokenState {
    /// The declared modes, in value order
    pub fn modes(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    /// Conjunction of per-mode resolvability over all declared modes
    pub fn is_fully_resolvable(&self) -> bool {
        self.modes_resolvability.values().all(|resolvable| *resolvable)
    }

    /// The alias parts declared for one mode
    pub fn alias_parts_for_mode<'a>(&'a self, mode: &'a str) -> impl Iterator<Item = &'a AliasPart> {
        self.alias_parts.iter().filter(move |part| part.mode == mode)
    }
}

/// UnresolvableToken - replaces a token whose alias chain references a
/// missing target
///
/// The raw values and decomposed parts are kept so the node can be
/// promoted back to a `Token` when a later mutation restores the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvableTokenState {
    pub common: NodeCommon,
    pub token_type: String,
    pub values: BTreeMap<String, serde_json::Value>,
    pub primitive_parts: Vec<PrimitivePart>,
    pub alias_parts: Vec<AliasPart>,
    pub is_top_level_alias: bool,
    /// Why the token cannot resolve
    pub reason: String,
    /// The referenced path that does not exist
    pub broken_target: TreePath,
}

/// The tokens collection stores either a live token or its unresolvable
/// replacement under the same path key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TokenSlot {
    Token(TokenState),
    UnresolvableToken(UnresolvableTokenState),
}

impl TokenSlot {
    /// The shared base fields
    pub fn common(&self) -> &NodeCommon {
        match self {
            TokenSlot::Token(token) => &token.common,
            TokenSlot::UnresolvableToken(token) => &token.common,
        }
    }

    /// Mutable access to the shared base fields
    pub fn common_mut(&mut self) -> &mut NodeCommon {
        match self {
            TokenSlot::Token(token) => &mut token.common,
            TokenSlot::UnresolvableToken(token) => &mut token.common,
        }
    }

    /// The node's path
    pub fn path(&self) -> &TreePath {
        &self.common().path
    }

    /// The declared type name
    pub fn token_type(&self) -> &str {
        match self {
            TokenSlot::Token(token) => &token.token_type,
            TokenSlot::UnresolvableToken(token) => &token.token_type,
        }
    }

    /// Raw per-mode values
    pub fn values(&self) -> &BTreeMap<String, serde_json::Value> {
        match self {
            TokenSlot::Token(token) => &token.values,
            TokenSlot::UnresolvableToken(token) => &token.values,
        }
    }

    /// All alias parts, regardless of resolvability
    pub fn alias_parts(&self) -> &[AliasPart] {
        match self {
            TokenSlot::Token(token) => &token.alias_parts,
            TokenSlot::UnresolvableToken(token) => &token.alias_parts,
        }
    }

    /// Mutable access to the alias parts
    pub fn alias_parts_mut(&mut self) -> &mut Vec<AliasPart> {
        match self {
            TokenSlot::Token(token) => &mut token.alias_parts,
            TokenSlot::UnresolvableToken(token) => &mut token.alias_parts,
        }
    }

    /// Mutable access to the primitive parts
    pub fn primitive_parts_mut(&mut self) -> &mut Vec<PrimitivePart> {
        match self {
            TokenSlot::Token(token) => &mut token.primitive_parts,
            TokenSlot::UnresolvableToken(token) => &mut token.primitive_parts,
        }
    }

    /// Mutable access to the raw per-mode values
    pub fn values_mut(&mut self) -> &mut BTreeMap<String, serde_json::Value> {
        match self {
            TokenSlot::Token(token) => &mut token.values,
            TokenSlot::UnresolvableToken(token) => &mut token.values,
        }
    }

    /// True when the slot holds a live, fully analyzable token
    pub fn is_resolvable_token(&self) -> bool {
        matches!(self, TokenSlot::Token(_))
    }
}
