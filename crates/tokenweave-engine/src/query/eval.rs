//! Query evaluation
//!
//! Each top-level clause is evaluated against the full node set, narrowed
//! by kind + regex + depth + property filters. An `andWhere` evaluates
//! its nested clause only against strict path-descendants of the current
//! match set. The final selection is the union of all clauses marked
//! `select: true` anywhere in the recursion, in path order.

use std::collections::{BTreeSet, HashSet};

use regex::Regex;
use tokenweave_core::errors::{Result, TokenTreeError};
use tokenweave_core::model::NodeRef;
use tokenweave_core::state::TreeNodesState;
use tokenweave_core_types::TreePath;

use crate::query::ast::{Clause, ClauseKind, IncludeExclude, TimeRange, TokensQuery};

/// Extension key holding a token's source identifiers
pub const EXT_SOURCE_IDS: &str = "sourceIds";
/// Extension key holding a token's creation timestamp (RFC 3339)
pub const EXT_CREATED_AT: &str = "createdAt";
/// Extension key holding a token's last-update timestamp (RFC 3339)
pub const EXT_UPDATED_AT: &str = "updatedAt";

/// Evaluate a query, returning the selected node paths in path order
///
/// # Errors
///
/// Returns `QueryStructure` for an invalid AST; an empty result is not an
/// error.
pub fn run_query(state: &TreeNodesState, query: &TokensQuery) -> Result<Vec<TreePath>> {
    query.validate()?;
    let all: Vec<NodeRef<'_>> = state.list_nodes();
    let mut selected: BTreeSet<TreePath> = BTreeSet::new();
    for clause in query.where_clauses.clauses() {
        eval_clause(state, clause, &all, &mut selected)?;
    }
    Ok(selected.into_iter().collect())
}

fn eval_clause<'a>(
    state: &'a TreeNodesState,
    clause: &Clause,
    pool: &[NodeRef<'a>],
    selected: &mut BTreeSet<TreePath>,
) -> Result<Vec<NodeRef<'a>>> {
    let compiled = CompiledClause::new(clause)?;
    let matches: Vec<NodeRef<'a>> = pool
        .iter()
        .copied()
        .filter(|node| compiled.matches(node))
        .collect();

    if clause.select == Some(true) {
        selected.extend(matches.iter().map(|node| node.path().clone()));
    }

    if let Some(nested) = &clause.and_where {
        let ancestors: Vec<&TreePath> = matches.iter().map(|node| node.path()).collect();
        let descendants: Vec<NodeRef<'a>> = state
            .list_nodes()
            .into_iter()
            .filter(|node| {
                ancestors
                    .iter()
                    .any(|ancestor| ancestor.is_strict_ancestor_of(node.path()))
            })
            .collect();
        eval_clause(state, nested, &descendants, selected)?;
    }

    Ok(matches)
}

struct CompiledClause<'c> {
    kind: ClauseKind,
    kind_regex: Regex,
    clause: &'c Clause,
    name_regex: Option<Regex>,
    description_regex: Option<Regex>,
}

impl<'c> CompiledClause<'c> {
    fn new(clause: &'c Clause) -> Result<Self> {
        let (kind, pattern) = clause.kind()?;
        Ok(Self {
            kind,
            kind_regex: compile(pattern)?,
            clause,
            name_regex: clause.name.as_deref().map(compile).transpose()?,
            description_regex: clause.description.as_deref().map(compile).transpose()?,
        })
    }

    fn matches(&self, node: &NodeRef<'_>) -> bool {
        let kind_matches = match self.kind {
            ClauseKind::Group => matches!(node, NodeRef::Group(_)),
            ClauseKind::Collection => matches!(node, NodeRef::Collection(_)),
            ClauseKind::Token => node.is_token(),
        };
        if !kind_matches || !self.kind_regex.is_match(node.name()) {
            return false;
        }
        if let Some(at_depth) = &self.clause.at_depth {
            if !at_depth.matches(node.path().depth()) {
                return false;
            }
        }
        if let Some(name_regex) = &self.name_regex {
            if !name_regex.is_match(node.name()) {
                return false;
            }
        }
        if let Some(description_regex) = &self.description_regex {
            match &node.common().description {
                Some(description) if description_regex.is_match(description) => {}
                _ => return false,
            }
        }
        if let Some(modes) = &self.clause.modes {
            if !modes_match(node, modes) {
                return false;
            }
        }
        if let Some(types) = &self.clause.types {
            if !types_match(node, types) {
                return false;
            }
        }
        if let Some(source_ids) = &self.clause.source_ids {
            if !source_ids_match(node, source_ids) {
                return false;
            }
        }
        if let Some(created) = &self.clause.created {
            if !timestamp_matches(node, EXT_CREATED_AT, created) {
                return false;
            }
        }
        if let Some(updated) = &self.clause.updated {
            if !timestamp_matches(node, EXT_UPDATED_AT, updated) {
                return false;
            }
        }
        true
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|err| TokenTreeError::QueryStructure {
        reason: format!("invalid regex '{}': {}", pattern, err),
    })
}

fn node_modes(node: &NodeRef<'_>) -> Option<Vec<String>> {
    match node {
        NodeRef::Token(token) => Some(token.values.keys().cloned().collect()),
        NodeRef::UnresolvableToken(token) => Some(token.values.keys().cloned().collect()),
        NodeRef::Collection(collection) => Some(collection.allowed_modes.clone()),
        NodeRef::Group(_) => None,
    }
}

fn modes_match(node: &NodeRef<'_>, filter: &IncludeExclude) -> bool {
    let Some(modes) = node_modes(node) else {
        // Groups carry no mode semantics; a modes filter never matches
        // them.
        return false;
    };
    if let Some(include) = &filter.include {
        if !include.iter().all(|wanted| modes.contains(wanted)) {
            return false;
        }
    }
    if let Some(exclude) = &filter.exclude {
        if exclude.iter().any(|unwanted| modes.contains(unwanted)) {
            return false;
        }
    }
    true
}

fn node_token_type<'a>(node: &NodeRef<'a>) -> Option<&'a str> {
    match node {
        NodeRef::Token(token) => Some(&token.token_type),
        NodeRef::UnresolvableToken(token) => Some(&token.token_type),
        _ => None,
    }
}

fn types_match(node: &NodeRef<'_>, filter: &IncludeExclude) -> bool {
    let Some(token_type) = node_token_type(node) else {
        return false;
    };
    if let Some(include) = &filter.include {
        if !include.iter().any(|wanted| wanted == token_type) {
            return false;
        }
    }
    if let Some(exclude) = &filter.exclude {
        if exclude.iter().any(|unwanted| unwanted == token_type) {
            return false;
        }
    }
    true
}

fn node_source_ids(node: &NodeRef<'_>) -> Vec<String> {
    node.common()
        .extensions
        .as_ref()
        .and_then(|extensions| extensions.get(EXT_SOURCE_IDS))
        .and_then(|value| value.as_array())
        .map(|ids| {
            ids.iter()
                .filter_map(|id| id.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn source_ids_match(node: &NodeRef<'_>, filter: &IncludeExclude) -> bool {
    let ids = node_source_ids(node);
    if let Some(include) = &filter.include {
        if !include.iter().any(|wanted| ids.contains(wanted)) {
            return false;
        }
    }
    if let Some(exclude) = &filter.exclude {
        if exclude.iter().any(|unwanted| ids.contains(unwanted)) {
            return false;
        }
    }
    true
}

fn timestamp_matches(node: &NodeRef<'_>, key: &str, range: &TimeRange) -> bool {
    let Some(raw) = node
        .common()
        .extensions
        .as_ref()
        .and_then(|extensions| extensions.get(key))
        .and_then(|value| value.as_str())
    else {
        return false;
    };
    match chrono::DateTime::parse_from_rfc3339(raw) {
        Ok(at) => range.contains(at.with_timezone(&chrono::Utc)),
        Err(_) => false,
    }
}

/// Check the continuity invariant over a result set
///
/// A set is continuous iff every node's parent path is also present, or
/// the node is itself root-level. Serializing a subtree from a
/// discontinuous set would fabricate or drop ancestors, so callers
/// composing raw filters must re-establish continuity first.
pub fn compute_is_continuous_nodes_graph(paths: &[TreePath]) -> bool {
    let present: HashSet<String> = paths.iter().map(ToString::to_string).collect();
    paths.iter().all(|path| {
        path.is_root_level()
            || path
                .parent()
                .map(|parent| present.contains(&parent.to_string()))
                .unwrap_or(false)
    })
}

/// Materialize the nodes behind a path list, skipping paths that vanished
pub fn nodes_at<'a>(state: &'a TreeNodesState, paths: &[TreePath]) -> Vec<NodeRef<'a>> {
    paths.iter().filter_map(|path| state.node(path)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(raw: &[&str]) -> Vec<TreePath> {
        raw.iter().map(|p| TreePath::parse(p)).collect()
    }

    #[test]
    fn test_continuity_missing_intermediate_is_false() {
        assert!(!compute_is_continuous_nodes_graph(&paths(&["a", "a.c.d"])));
    }

    #[test]
    fn test_continuity_parent_and_child_is_true() {
        assert!(compute_is_continuous_nodes_graph(&paths(&["a", "a.b"])));
    }

    #[test]
    fn test_continuity_root_level_only_is_true() {
        assert!(compute_is_continuous_nodes_graph(&paths(&["a", "b"])));
        assert!(compute_is_continuous_nodes_graph(&[]));
    }

    #[test]
    fn test_continuity_orphan_subtree_is_false() {
        assert!(!compute_is_continuous_nodes_graph(&paths(&["x.y"])));
    }
}
