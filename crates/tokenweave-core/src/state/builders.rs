//! Node builders
//!
//! Builders turn analyzed parameters into concrete nodes bound to the
//! owning tree state. Tokens are materialized lazily out of the analyzed
//! pool: `find_or_register_token_state` builds a path on first demand,
//! whatever order alias chains are walked in, and guarantees each path is
//! materialized at most once.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tokenweave_core_types::TreePath;

use crate::errors::{Result, TokenTreeError, Violation};
use crate::model::{
    CollectionState, GroupState, NodeCommon, TokenSlot, TokenState, UnresolvableTokenState,
};
use crate::parse::document::{AnalyzedToken, CollectionParams, GroupParams};
use crate::parse::resolvability::ResolvabilityGraph;
use crate::registry::TypeRegistry;
use crate::state::nodes_state::TreeNodesState;
use crate::values;

/// Build a group node from its analyzed parameters
pub fn build_group_state(params: GroupParams) -> GroupState {
    GroupState::new(NodeCommon::new(params.path, params.description, params.extensions))
}

/// Build a collection node from its analyzed parameters
pub fn build_collection_state(params: CollectionParams) -> CollectionState {
    CollectionState::new(
        NodeCommon::new(params.path, params.description, params.extensions),
        params.allowed_modes,
    )
}

/// Build a token node from its analyzed parameters
///
/// A token whose analysis recorded a missing alias target is built as its
/// `UnresolvableToken` replacement; everything else becomes a live token
/// carrying the analyzer's resolvability map.
pub fn build_token_state(analyzed: AnalyzedToken) -> TokenSlot {
    let common = NodeCommon::new(analyzed.path, analyzed.description, analyzed.extensions);
    match analyzed.broken_target {
        Some(broken_target) => TokenSlot::UnresolvableToken(UnresolvableTokenState {
            common,
            token_type: analyzed.token_type,
            values: analyzed.values,
            primitive_parts: analyzed.primitive_parts,
            alias_parts: analyzed.alias_parts,
            is_top_level_alias: analyzed.is_top_level_alias,
            reason: format!("alias target '{}' does not exist", broken_target),
            broken_target,
        }),
        None => TokenSlot::Token(TokenState {
            common,
            token_type: analyzed.token_type,
            values: analyzed.values,
            primitive_parts: analyzed.primitive_parts,
            alias_parts: analyzed.alias_parts,
            is_top_level_alias: analyzed.is_top_level_alias,
            modes_resolvability: analyzed.modes_resolvability,
        }),
    }
}

/// Return the token registered at `path`, building it on demand
///
/// Looks the path up in the registry first; if absent, builds and
/// registers it from the analyzed-but-unbuilt pool. This is what lets an
/// alias target be materialized regardless of the order tokens appear in
/// the source document.
///
/// # Errors
///
/// - `ReferenceNotFound` - the path is in neither the registry nor the
///   pool
/// - `UnknownType` - the pooled token's type has vanished from the type
///   registry (a catalog wiring error)
pub fn find_or_register_token_state<'a>(
    path: &TreePath,
    registry: &dyn TypeRegistry,
    analyzed_tokens: &mut HashMap<String, AnalyzedToken>,
    tree_state: &'a mut TreeNodesState,
) -> Result<&'a TokenSlot> {
    if tree_state.token(path).is_none() {
        let analyzed = analyzed_tokens.remove(&path.to_string()).ok_or_else(|| {
            TokenTreeError::ReferenceNotFound {
                path: path.to_string(),
            }
        })?;
        if registry.definition(&analyzed.token_type).is_none() {
            return Err(TokenTreeError::UnknownType {
                type_name: analyzed.token_type,
            });
        }
        tracing::trace!(path = %path, "materializing token");
        tree_state.add_token(build_token_state(analyzed))?;
    }
    tree_state
        .token(path)
        .ok_or_else(|| TokenTreeError::InternalDesign {
            message: format!("token at '{}' vanished after registration", path),
        })
}

/// Compute a token's resolved value for one mode
///
/// Substitutes every alias part with the target token's resolved value
/// (the whole value for a top-level alias, a deep set at the part's
/// `ValuePath` otherwise), materializing targets on demand, then checks
/// the result against the type's resolved schema.
///
/// # Errors
///
/// - `Unresolvable` - the pair's alias chain has a missing target, a
///   missing mode, or a cycle
/// - `SchemaValidation` - the substituted value fails the resolved schema
pub fn resolved_token_value(
    path: &TreePath,
    mode: &str,
    registry: &dyn TypeRegistry,
    analyzed_tokens: &mut HashMap<String, AnalyzedToken>,
    tree_state: &mut TreeNodesState,
) -> Result<Value> {
    let mut visiting = HashSet::new();
    resolve_inner(path, mode, registry, analyzed_tokens, tree_state, &mut visiting)
}

fn resolve_inner(
    path: &TreePath,
    mode: &str,
    registry: &dyn TypeRegistry,
    analyzed_tokens: &mut HashMap<String, AnalyzedToken>,
    tree_state: &mut TreeNodesState,
    visiting: &mut HashSet<(String, String)>,
) -> Result<Value> {
    let pair = (path.to_string(), mode.to_string());
    if !visiting.insert(pair.clone()) {
        // Revisited on its own active resolution path: cyclic chain.
        return Err(TokenTreeError::Unresolvable {
            path: path.to_string(),
            mode: mode.to_string(),
        });
    }

    let slot = match find_or_register_token_state(path, registry, analyzed_tokens, tree_state) {
        Ok(slot) => slot,
        Err(err) => {
            visiting.remove(&pair);
            return Err(err);
        }
    };
    let (token_type, mut value, alias_parts) = match slot {
        TokenSlot::UnresolvableToken(_) => {
            visiting.remove(&pair);
            return Err(TokenTreeError::Unresolvable {
                path: path.to_string(),
                mode: mode.to_string(),
            });
        }
        TokenSlot::Token(token) => {
            let Some(value) = token.values.get(mode) else {
                visiting.remove(&pair);
                return Err(TokenTreeError::Unresolvable {
                    path: path.to_string(),
                    mode: mode.to_string(),
                });
            };
            let parts: Vec<_> = token.alias_parts_for_mode(mode).cloned().collect();
            (token.token_type.clone(), value.clone(), parts)
        }
    };

    for part in &alias_parts {
        let target = resolve_inner(
            &part.target_path,
            &part.target_mode,
            registry,
            analyzed_tokens,
            tree_state,
            visiting,
        );
        let target = match target {
            Ok(target) => target,
            Err(err) => {
                visiting.remove(&pair);
                return Err(err);
            }
        };
        if part.value_path.is_root() {
            value = target;
        } else if let Err(err) = values::set_value_at_path(&mut value, &part.value_path, target) {
            visiting.remove(&pair);
            return Err(err);
        }
    }
    visiting.remove(&pair);

    let definition =
        registry
            .definition(&token_type)
            .ok_or_else(|| TokenTreeError::UnknownType {
                type_name: token_type.clone(),
            })?;
    let findings = definition.check_resolved(&value);
    if !findings.is_empty() {
        return Err(TokenTreeError::schema_validation(
            findings
                .into_iter()
                .map(|finding| {
                    Violation::new(path.to_string(), format!("mode '{}': {}", mode, finding))
                })
                .collect(),
        ));
    }
    Ok(value)
}

/// Recompute resolvability for every token from the current alias graph
///
/// Runs after structural mutations. Tokens whose alias parts now
/// reference a missing path are demoted to `UnresolvableToken`; demoted
/// tokens whose targets exist again are promoted back, with their
/// per-mode resolvability maps refreshed from the solved graph.
pub fn recompute_state_resolvability(tree_state: &mut TreeNodesState) {
    let token_paths: Vec<TreePath> = tree_state
        .list_tokens()
        .iter()
        .map(|slot| slot.path().clone())
        .collect();
    let known: HashSet<String> = token_paths.iter().map(ToString::to_string).collect();

    let mut graph = ResolvabilityGraph::new();
    for path in &token_paths {
        if let Some(slot) = tree_state.token(path) {
            let key = path.to_string();
            for mode in slot.values().keys() {
                graph.add_pair(key.clone(), mode.clone());
            }
            for part in slot.alias_parts() {
                graph.add_edge(
                    (key.clone(), part.mode.clone()),
                    (part.target_path.to_string(), part.target_mode.clone()),
                );
            }
        }
    }
    let solved = graph.solve();

    for path in &token_paths {
        let Some(slot) = tree_state.token_mut(path) else {
            continue;
        };
        let key = path.to_string();
        let broken_target = slot
            .alias_parts()
            .iter()
            .find(|part| !known.contains(&part.target_path.to_string()))
            .map(|part| part.target_path.clone());
        let resolvability = |values: &std::collections::BTreeMap<String, Value>| {
            values
                .keys()
                .map(|mode| {
                    let resolvable = solved
                        .get(&(key.clone(), mode.clone()))
                        .copied()
                        .unwrap_or(false);
                    (mode.clone(), resolvable)
                })
                .collect()
        };

        *slot = match (slot.clone(), broken_target) {
            (TokenSlot::Token(mut token), None) => {
                token.modes_resolvability = resolvability(&token.values);
                TokenSlot::Token(token)
            }
            (TokenSlot::Token(token), Some(broken)) => {
                tracing::debug!(path = %key, target = %broken, "demoting token: alias target gone");
                TokenSlot::UnresolvableToken(UnresolvableTokenState {
                    common: token.common,
                    token_type: token.token_type,
                    values: token.values,
                    primitive_parts: token.primitive_parts,
                    alias_parts: token.alias_parts,
                    is_top_level_alias: token.is_top_level_alias,
                    reason: format!("alias target '{}' does not exist", broken),
                    broken_target: broken,
                })
            }
            (TokenSlot::UnresolvableToken(token), None) => {
                tracing::debug!(path = %key, "promoting token: alias targets restored");
                let modes_resolvability = resolvability(&token.values);
                TokenSlot::Token(TokenState {
                    common: token.common,
                    token_type: token.token_type,
                    values: token.values,
                    primitive_parts: token.primitive_parts,
                    alias_parts: token.alias_parts,
                    is_top_level_alias: token.is_top_level_alias,
                    modes_resolvability,
                })
            }
            (TokenSlot::UnresolvableToken(mut token), Some(broken)) => {
                token.reason = format!("alias target '{}' does not exist", broken);
                token.broken_target = broken;
                TokenSlot::UnresolvableToken(token)
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_document;
    use crate::registry::test_support::registry_with_color_and_dimension;
    use serde_json::json;

    fn analyzed_pool(raw: serde_json::Value) -> HashMap<String, AnalyzedToken> {
        let registry = registry_with_color_and_dimension();
        parse_document(&raw, &registry).unwrap().tokens
    }

    #[test]
    fn test_find_or_register_builds_once() {
        let registry = registry_with_color_and_dimension();
        let mut pool = analyzed_pool(json!({
            "a": {"$type": "color", "$value": {"default": "#ffffff"}}
        }));
        let mut state = TreeNodesState::new();
        let path = TreePath::parse("a");

        find_or_register_token_state(&path, &registry, &mut pool, &mut state).unwrap();
        assert!(pool.is_empty());
        // Second call must hit the registry, not the (now empty) pool.
        let slot = find_or_register_token_state(&path, &registry, &mut pool, &mut state).unwrap();
        assert!(slot.is_resolvable_token());
    }

    #[test]
    fn test_find_or_register_missing_path_names_it() {
        let registry = registry_with_color_and_dimension();
        let mut pool = HashMap::new();
        let mut state = TreeNodesState::new();
        let result = find_or_register_token_state(
            &TreePath::parse("ghost"),
            &registry,
            &mut pool,
            &mut state,
        );
        match result {
            Err(TokenTreeError::ReferenceNotFound { path }) => assert_eq!(path, "ghost"),
            other => panic!("expected ReferenceNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_resolved_value_follows_chain_in_any_build_order() {
        let registry = registry_with_color_and_dimension();
        // "b" aliases "a", but "b" is resolved first.
        let mut pool = analyzed_pool(json!({
            "a": {"$type": "color", "$value": {"default": "#112233"}},
            "b": {"$type": "color", "$value": {"default": {"$alias": "a"}}}
        }));
        let mut state = TreeNodesState::new();
        let value = resolved_token_value(
            &TreePath::parse("b"),
            "default",
            &registry,
            &mut pool,
            &mut state,
        )
        .unwrap();
        assert_eq!(value, json!("#112233"));
        assert!(state.token(&TreePath::parse("a")).is_some());
    }

    #[test]
    fn test_resolved_value_rejects_cycles() {
        let registry = registry_with_color_and_dimension();
        let mut pool = analyzed_pool(json!({
            "a": {"$type": "color", "$value": {"default": {"$alias": "b"}}},
            "b": {"$type": "color", "$value": {"default": {"$alias": "a"}}}
        }));
        let mut state = TreeNodesState::new();
        let result = resolved_token_value(
            &TreePath::parse("a"),
            "default",
            &registry,
            &mut pool,
            &mut state,
        );
        assert!(matches!(result, Err(TokenTreeError::Unresolvable { .. })));
    }

    #[test]
    fn test_broken_target_builds_unresolvable_token() {
        let registry = registry_with_color_and_dimension();
        let mut pool = analyzed_pool(json!({
            "broken": {"$type": "color", "$value": {"default": {"$alias": "ghost"}}}
        }));
        let mut state = TreeNodesState::new();
        let slot = find_or_register_token_state(
            &TreePath::parse("broken"),
            &registry,
            &mut pool,
            &mut state,
        )
        .unwrap();
        match slot {
            TokenSlot::UnresolvableToken(token) => {
                assert_eq!(token.broken_target, TreePath::parse("ghost"));
                assert!(token.reason.contains("ghost"));
            }
            other => panic!("expected UnresolvableToken, got {:?}", other),
        }
    }

    #[test]
    fn test_recompute_promotes_when_target_appears() {
        let registry = registry_with_color_and_dimension();
        let mut pool = analyzed_pool(json!({
            "broken": {"$type": "color", "$value": {"default": {"$alias": "late"}}}
        }));
        let mut state = TreeNodesState::new();
        find_or_register_token_state(&TreePath::parse("broken"), &registry, &mut pool, &mut state)
            .unwrap();

        // The missing target arrives through a separate load.
        let mut late_pool = analyzed_pool(json!({
            "late": {"$type": "color", "$value": {"default": "#000000"}}
        }));
        find_or_register_token_state(&TreePath::parse("late"), &registry, &mut late_pool, &mut state)
            .unwrap();

        recompute_state_resolvability(&mut state);
        let slot = state.token(&TreePath::parse("broken")).unwrap();
        match slot {
            TokenSlot::Token(token) => {
                assert_eq!(token.modes_resolvability.get("default"), Some(&true));
            }
            other => panic!("expected promotion to Token, got {:?}", other),
        }
    }
}
