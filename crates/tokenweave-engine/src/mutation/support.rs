//! Shared command plumbing
//!
//! Every structural command follows the same discipline: validate the
//! payload and every referenced path first, apply the change, rewrite or
//! demote affected aliases, then recompute resolvability over the
//! mutated tree.

use std::collections::BTreeMap;

use serde_json::Value;
use tokenweave_core::errors::{Result, TokenTreeError};
use tokenweave_core::model::{AliasPart, Extensions, PrimitivePart};
use tokenweave_core::parse::analyze::analyze_mode_value;
use tokenweave_core::parse::document::{mode_name_violation, node_name_violation};
use tokenweave_core::state::recompute_state_resolvability;
use tokenweave_core::values;
use tokenweave_core_types::TreePath;

use crate::engine::TokenTreeEngine;

/// Parse a required node path out of a payload string
pub(crate) fn required_path(mutation: &str, raw: &str) -> Result<TreePath> {
    if raw.is_empty() {
        return Err(TokenTreeError::InvalidMutation {
            name: mutation.to_string(),
            reason: "path must not be empty".to_string(),
        });
    }
    Ok(TreePath::parse(raw))
}

/// Parse an optional parent path; absent means the tree root
pub(crate) fn parent_path(raw: Option<&str>) -> TreePath {
    match raw {
        Some(raw) if !raw.is_empty() => TreePath::parse(raw),
        _ => TreePath::new(Vec::new()),
    }
}

/// Check that a payload-supplied node name is legal
pub(crate) fn ensure_valid_node_name(mutation: &str, name: &str) -> Result<()> {
    match node_name_violation(name) {
        Some(reason) => Err(TokenTreeError::InvalidMutation {
            name: mutation.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Check that a payload-supplied mode name is legal
pub(crate) fn ensure_valid_mode_name(mutation: &str, mode: &str) -> Result<()> {
    match mode_name_violation(mode) {
        Some(reason) => Err(TokenTreeError::InvalidMutation {
            name: mutation.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Check that a parent path can hold children
///
/// The root always can; otherwise a group or collection must sit there.
pub(crate) fn ensure_parent_container(
    engine: &TokenTreeEngine,
    mutation: &str,
    parent: &TreePath,
) -> Result<()> {
    if parent.is_empty() {
        return Ok(());
    }
    if engine.state.group(parent).is_some() || engine.state.collection(parent).is_some() {
        return Ok(());
    }
    if engine.state.token(parent).is_some() {
        return Err(TokenTreeError::InvalidMutation {
            name: mutation.to_string(),
            reason: format!("parent '{}' is a token and cannot hold children", parent),
        });
    }
    Err(TokenTreeError::ReferenceNotFound {
        path: parent.to_string(),
    })
}

/// Check that no node occupies a path yet
pub(crate) fn ensure_path_free(engine: &TokenTreeEngine, path: &TreePath) -> Result<()> {
    if engine.state.contains(path) {
        return Err(TokenTreeError::DuplicateNode {
            path: path.to_string(),
        });
    }
    Ok(())
}

/// Convert a payload `extensions` value (`object | null`) into the model
/// wrapper
pub(crate) fn extensions_from_payload(raw: Option<&Value>) -> Option<Extensions> {
    match raw {
        Some(Value::Object(entries)) => Some(Extensions::from(
            entries
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect::<BTreeMap<_, _>>(),
        )),
        _ => None,
    }
}

/// Set the description on the node at `path`, whatever its kind
pub(crate) fn set_description(
    engine: &mut TokenTreeEngine,
    path: &TreePath,
    description: Option<String>,
) -> Result<()> {
    if let Some(slot) = engine.state.token_mut(path) {
        slot.common_mut().description = description;
        return Ok(());
    }
    if let Some(group) = engine.state.group_mut(path) {
        group.common.description = description;
        return Ok(());
    }
    if let Some(collection) = engine.state.collection_mut(path) {
        collection.common.description = description;
        return Ok(());
    }
    Err(TokenTreeError::ReferenceNotFound {
        path: path.to_string(),
    })
}

/// Set the extensions on the node at `path`, whatever its kind
pub(crate) fn set_extensions(
    engine: &mut TokenTreeEngine,
    path: &TreePath,
    extensions: Option<Extensions>,
) -> Result<()> {
    if let Some(slot) = engine.state.token_mut(path) {
        slot.common_mut().extensions = extensions;
        return Ok(());
    }
    if let Some(group) = engine.state.group_mut(path) {
        group.common.extensions = extensions;
        return Ok(());
    }
    if let Some(collection) = engine.state.collection_mut(path) {
        collection.common.extensions = extensions;
        return Ok(());
    }
    Err(TokenTreeError::ReferenceNotFound {
        path: path.to_string(),
    })
}

/// Move a node and its whole subtree from `old_root` to `new_root`
///
/// Callers validate the target before this runs; the move itself cannot
/// collide because only the renamed segment changes.
pub(crate) fn move_subtree(
    engine: &mut TokenTreeEngine,
    old_root: &TreePath,
    new_root: &TreePath,
) -> Result<()> {
    let mut moved = vec![old_root.clone()];
    moved.extend(engine.state.descendants_of(old_root));
    for path in moved {
        let new_path = path
            .rebased(old_root, new_root)
            .unwrap_or_else(|| path.clone());
        if let Some(mut slot) = engine.state.remove_token(&path) {
            slot.common_mut().path = new_path;
            engine.state.add_token(slot)?;
        } else if let Some(mut group) = engine.state.remove_group(&path) {
            group.common.path = new_path;
            engine.state.add_group(group)?;
        } else if let Some(mut collection) = engine.state.remove_collection(&path) {
            collection.common.path = new_path;
            engine.state.add_collection(collection)?;
        }
    }
    Ok(())
}

/// Rewrite every alias part (and its raw `$alias` string) whose target
/// lies within `old_prefix` so it points into `new_prefix`
pub(crate) fn rewrite_alias_targets(
    engine: &mut TokenTreeEngine,
    old_prefix: &TreePath,
    new_prefix: &TreePath,
) -> Result<()> {
    let token_paths: Vec<TreePath> = engine
        .state
        .list_tokens()
        .iter()
        .map(|slot| slot.path().clone())
        .collect();
    for path in token_paths {
        let Some(slot) = engine.state.token_mut(&path) else {
            continue;
        };
        let updates: Vec<(usize, TreePath)> = slot
            .alias_parts()
            .iter()
            .enumerate()
            .filter(|(_, part)| part.target_path.is_within(old_prefix))
            .map(|(index, part)| {
                let rebased = part
                    .target_path
                    .rebased(old_prefix, new_prefix)
                    .unwrap_or_else(|| part.target_path.clone());
                (index, rebased)
            })
            .collect();
        for (index, new_target) in updates {
            let (mode, value_path) = {
                let part = &slot.alias_parts()[index];
                (part.mode.clone(), part.value_path.clone())
            };
            slot.alias_parts_mut()[index].target_path = new_target.clone();
            if let Some(value) = slot.values_mut().get_mut(&mode) {
                let signature =
                    values::value_at_path(&*value, &value_path).and_then(values::as_alias_signature);
                if let Some(mut signature) = signature {
                    signature.target_path = new_target;
                    values::set_value_at_path(value, &value_path, signature.to_value())?;
                }
            }
        }
    }
    Ok(())
}

/// Rename a node in place (last path segment), moving its subtree and
/// rewriting aliases that point into it
pub(crate) fn rename_node(
    engine: &mut TokenTreeEngine,
    mutation: &str,
    path: &TreePath,
    new_name: &str,
) -> Result<TreePath> {
    ensure_valid_node_name(mutation, new_name)?;
    if engine.state.node(path).is_none() {
        return Err(TokenTreeError::ReferenceNotFound {
            path: path.to_string(),
        });
    }
    let new_path = path.renamed(new_name);
    if &new_path == path {
        return Ok(new_path);
    }
    ensure_path_free(engine, &new_path)?;

    move_subtree(engine, path, &new_path)?;
    rewrite_alias_targets(engine, path, &new_path)?;
    recompute_state_resolvability(&mut engine.state);
    tracing::debug!(from = %path, to = %new_path, "node renamed");
    Ok(new_path)
}

/// Delete a subtree (optionally keeping the root node), demoting every
/// token that aliased into it
pub(crate) fn delete_subtree(
    engine: &mut TokenTreeEngine,
    root: &TreePath,
    include_root: bool,
) -> usize {
    let mut targets = engine.state.descendants_of(root);
    if include_root {
        targets.push(root.clone());
    }
    for path in &targets {
        engine.state.remove_node(path);
        engine.analyzed.remove(&path.to_string());
    }
    recompute_state_resolvability(&mut engine.state);
    tracing::debug!(root = %root, removed = targets.len(), "subtree deleted");
    targets.len()
}

/// Validate a token's mode names against the naming rules and the
/// nearest ancestor collection
pub(crate) fn ensure_modes_allowed<'a>(
    engine: &TokenTreeEngine,
    mutation: &str,
    token_path: &TreePath,
    modes: impl Iterator<Item = &'a String>,
) -> Result<()> {
    let collection = engine.state.nearest_collection(token_path);
    for mode in modes {
        ensure_valid_mode_name(mutation, mode)?;
        if let Some(collection) = collection {
            if !collection.allows_mode(mode) {
                return Err(TokenTreeError::InvalidMutation {
                    name: mutation.to_string(),
                    reason: format!(
                        "mode '{}' is not allowed by collection '{}'",
                        mode, collection.common.path
                    ),
                });
            }
        }
    }
    Ok(())
}

/// Analyze a full per-mode value map for a token at `path`
///
/// Returns the decomposed parts and the top-level-alias flag, or the
/// aggregated violations when the values fail the aliasable schema or
/// the structural mapping.
pub(crate) fn analyze_values(
    engine: &TokenTreeEngine,
    path: &TreePath,
    token_type: &str,
    values: &BTreeMap<String, Value>,
) -> Result<(Vec<PrimitivePart>, Vec<AliasPart>, bool)> {
    let definition = engine.registry.definition(token_type).ok_or_else(|| {
        TokenTreeError::UnknownType {
            type_name: token_type.to_string(),
        }
    })?;
    let lookup = |target: &TreePath| -> Option<String> {
        engine
            .state
            .token(target)
            .map(|slot| slot.token_type().to_string())
            .or_else(|| {
                engine
                    .analyzed
                    .get(&target.to_string())
                    .map(|token| token.token_type.clone())
            })
    };

    let mut violations = Vec::new();
    let mut primitive_parts = Vec::new();
    let mut alias_parts = Vec::new();
    let mut all_modes_top_level = !values.is_empty();
    for (mode, value) in values {
        let analysis = analyze_mode_value(definition, path, mode, value, &lookup, &mut violations);
        all_modes_top_level &= analysis.is_top_level_alias;
        primitive_parts.extend(analysis.primitive_parts);
        alias_parts.extend(analysis.alias_parts);
    }
    if !violations.is_empty() {
        return Err(TokenTreeError::schema_validation(violations));
    }
    Ok((primitive_parts, alias_parts, all_modes_top_level))
}

/// Rename a mode on the tokens at `paths`: value keys, part modes,
/// resolvability keys, and the implicit target modes that mirror the
/// referring mode
///
/// Explicit `$mode` references from elsewhere in the tree are handled
/// separately by [`rewrite_explicit_mode_references`].
pub(crate) fn rename_mode_on_paths(
    engine: &mut TokenTreeEngine,
    paths: &[TreePath],
    old: &str,
    new: &str,
) -> Result<()> {
    use tokenweave_core::model::TokenSlot;

    for path in paths {
        let Some(slot) = engine.state.token_mut(path) else {
            continue;
        };
        let token_values = slot.values_mut();
        if let Some(value) = token_values.remove(old) {
            token_values.insert(new.to_string(), value);
        }
        if let TokenSlot::Token(token) = &mut *slot {
            if let Some(resolvable) = token.modes_resolvability.remove(old) {
                token.modes_resolvability.insert(new.to_string(), resolvable);
            }
        }
        // An implicit alias (no '$mode' in the raw signature) requests
        // the referring mode, so its target mode renames with it.
        let implicit: Vec<usize> = slot
            .alias_parts()
            .iter()
            .enumerate()
            .filter(|(_, part)| part.mode == old)
            .filter(|(_, part)| {
                let raw = slot
                    .values()
                    .get(new)
                    .and_then(|value| values::value_at_path(value, &part.value_path))
                    .and_then(values::as_alias_signature);
                matches!(raw, Some(signature) if signature.target_mode.is_none())
            })
            .map(|(index, _)| index)
            .collect();
        for part in slot.primitive_parts_mut() {
            if part.mode == old {
                part.mode = new.to_string();
            }
        }
        for (index, part) in slot.alias_parts_mut().iter_mut().enumerate() {
            if part.mode == old {
                part.mode = new.to_string();
                if implicit.contains(&index) && part.target_mode == old {
                    part.target_mode = new.to_string();
                }
            }
        }
    }
    Ok(())
}

/// Rewrite alias parts anywhere in the tree whose explicit `$mode` names
/// a renamed mode of a token within `scope`
pub(crate) fn rewrite_explicit_mode_references(
    engine: &mut TokenTreeEngine,
    scope: &TreePath,
    old: &str,
    new: &str,
) -> Result<()> {
    let token_paths: Vec<TreePath> = engine
        .state
        .list_tokens()
        .iter()
        .map(|slot| slot.path().clone())
        .collect();
    for path in token_paths {
        let Some(slot) = engine.state.token_mut(&path) else {
            continue;
        };
        let updates: Vec<(usize, String, tokenweave_core_types::ValuePath)> = slot
            .alias_parts()
            .iter()
            .enumerate()
            .filter(|(_, part)| part.target_mode == old && part.target_path.is_within(scope))
            .filter(|(_, part)| {
                let raw = slot
                    .values()
                    .get(&part.mode)
                    .and_then(|value| values::value_at_path(value, &part.value_path))
                    .and_then(values::as_alias_signature);
                matches!(raw, Some(signature) if signature.target_mode.is_some())
            })
            .map(|(index, part)| (index, part.mode.clone(), part.value_path.clone()))
            .collect();
        for (index, mode, value_path) in updates {
            slot.alias_parts_mut()[index].target_mode = new.to_string();
            if let Some(value) = slot.values_mut().get_mut(&mode) {
                let signature =
                    values::value_at_path(&*value, &value_path).and_then(values::as_alias_signature);
                if let Some(mut signature) = signature {
                    signature.target_mode = Some(new.to_string());
                    values::set_value_at_path(value, &value_path, signature.to_value())?;
                }
            }
        }
    }
    Ok(())
}

/// First alias target that exists nowhere in the tree or the analyzed
/// pool, if any
pub(crate) fn first_broken_target(
    engine: &TokenTreeEngine,
    alias_parts: &[AliasPart],
) -> Option<TreePath> {
    alias_parts
        .iter()
        .find(|part| {
            engine.state.token(&part.target_path).is_none()
                && !engine.analyzed.contains_key(&part.target_path.to_string())
        })
        .map(|part| part.target_path.clone())
}
