//! Token lifecycle commands

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Value};
use tokenweave_core::errors::{Result, TokenTreeError};
use tokenweave_core::model::{
    AliasPart, NodeCommon, PrimitivePart, TokenSlot, TokenState, UnresolvableTokenState,
};
use tokenweave_core::state::recompute_state_resolvability;
use tokenweave_core_types::TreePath;

use crate::engine::TokenTreeEngine;
use crate::mutation::collections::rename_mode_schema;
use crate::mutation::groups::{
    description_schema, extensions_schema, path_schema, rename_schema, DescriptionParams,
    ExtensionsParams, PathParams, RenameParams,
};
use crate::mutation::support::{
    analyze_values, delete_subtree, ensure_modes_allowed, ensure_parent_container,
    ensure_path_free, ensure_valid_mode_name, ensure_valid_node_name, extensions_from_payload,
    first_broken_target, parent_path, rename_mode_on_paths, rename_node, required_path,
    rewrite_explicit_mode_references, set_description, set_extensions,
};
use crate::mutation::{remap, MutationDefinition};

/// The token command definitions
pub fn definitions() -> Vec<MutationDefinition> {
    vec![
        MutationDefinition {
            name: "addToken",
            schema: add_token_schema,
            execute: add_token,
        },
        MutationDefinition {
            name: "renameToken",
            schema: rename_schema,
            execute: rename_token,
        },
        MutationDefinition {
            name: "updateTokenDescription",
            schema: description_schema,
            execute: update_token_description,
        },
        MutationDefinition {
            name: "updateTokenExtensions",
            schema: extensions_schema,
            execute: update_token_extensions,
        },
        MutationDefinition {
            name: "updateTokenValue",
            schema: value_schema,
            execute: update_token_value,
        },
        MutationDefinition {
            name: "resolveTokenValueAliases",
            schema: path_schema,
            execute: resolve_token_value_aliases,
        },
        MutationDefinition {
            name: "updateTokenModeValue",
            schema: mode_value_schema,
            execute: update_token_mode_value,
        },
        MutationDefinition {
            name: "renameTokenMode",
            schema: rename_mode_schema,
            execute: rename_token_mode,
        },
        MutationDefinition {
            name: "createTokenModeValue",
            schema: mode_value_schema,
            execute: create_token_mode_value,
        },
        MutationDefinition {
            name: "deleteTokenModeValue",
            schema: mode_schema,
            execute: delete_token_mode_value,
        },
        MutationDefinition {
            name: "deleteToken",
            schema: path_schema,
            execute: delete_token,
        },
    ]
}

fn add_token_schema() -> Value {
    json!({
        "type": "object",
        "required": ["name", "tokenType", "value"],
        "properties": {
            "parentPath": {"type": "string"},
            "name": {"type": "string", "minLength": 1},
            "tokenType": {"type": "string", "minLength": 1},
            "value": {"type": "object", "minProperties": 1},
            "description": {"type": "string"},
            "extensions": {"type": "object"}
        },
        "additionalProperties": false
    })
}

fn value_schema() -> Value {
    json!({
        "type": "object",
        "required": ["path", "value"],
        "properties": {
            "path": {"type": "string", "minLength": 1},
            "value": {"type": "object", "minProperties": 1}
        },
        "additionalProperties": false
    })
}

fn mode_value_schema() -> Value {
    json!({
        "type": "object",
        "required": ["path", "mode", "value"],
        "properties": {
            "path": {"type": "string", "minLength": 1},
            "mode": {"type": "string", "minLength": 1},
            "value": {}
        },
        "additionalProperties": false
    })
}

fn mode_schema() -> Value {
    json!({
        "type": "object",
        "required": ["path", "mode"],
        "properties": {
            "path": {"type": "string", "minLength": 1},
            "mode": {"type": "string", "minLength": 1}
        },
        "additionalProperties": false
    })
}

/// Build the slot for analyzed token parameters, demoting on a missing
/// alias target
fn make_slot(
    engine: &TokenTreeEngine,
    common: NodeCommon,
    token_type: String,
    values: BTreeMap<String, Value>,
    primitive_parts: Vec<PrimitivePart>,
    alias_parts: Vec<AliasPart>,
    is_top_level_alias: bool,
) -> TokenSlot {
    match first_broken_target(engine, &alias_parts) {
        Some(broken_target) => TokenSlot::UnresolvableToken(UnresolvableTokenState {
            common,
            token_type,
            values,
            primitive_parts,
            alias_parts,
            is_top_level_alias,
            reason: format!("alias target '{}' does not exist", broken_target),
            broken_target,
        }),
        None => TokenSlot::Token(TokenState {
            common,
            token_type,
            values,
            primitive_parts,
            alias_parts,
            is_top_level_alias,
            // Filled by the recompute pass that follows every token
            // mutation.
            modes_resolvability: BTreeMap::new(),
        }),
    }
}

/// Replace the token at `path` with a freshly analyzed value map,
/// keeping its identity (path, description, extensions, type)
fn rebuild_token(
    engine: &mut TokenTreeEngine,
    mutation: &str,
    path: &TreePath,
    values: BTreeMap<String, Value>,
) -> Result<()> {
    let token_type = engine.state.get_token(path)?.token_type().to_string();
    ensure_modes_allowed(engine, mutation, path, values.keys())?;
    let (primitive_parts, alias_parts, is_top_level_alias) =
        analyze_values(engine, path, &token_type, &values)?;

    let common = engine.state.get_token(path)?.common().clone();
    let slot = make_slot(
        engine,
        common,
        token_type,
        values,
        primitive_parts,
        alias_parts,
        is_top_level_alias,
    );
    if let Some(current) = engine.state.token_mut(path) {
        *current = slot;
    }
    recompute_state_resolvability(&mut engine.state);
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddTokenParams {
    parent_path: Option<String>,
    name: String,
    token_type: String,
    value: BTreeMap<String, Value>,
    description: Option<String>,
    extensions: Option<Value>,
}

fn add_token(engine: &mut TokenTreeEngine, payload: &Value) -> Result<Value> {
    let params: AddTokenParams = remap(payload)?;
    ensure_valid_node_name("addToken", &params.name)?;
    let parent = parent_path(params.parent_path.as_deref());
    ensure_parent_container(engine, "addToken", &parent)?;
    let path = parent.child(&params.name);
    ensure_path_free(engine, &path)?;
    if engine.registry.definition(&params.token_type).is_none() {
        return Err(TokenTreeError::UnknownType {
            type_name: params.token_type,
        });
    }
    ensure_modes_allowed(engine, "addToken", &path, params.value.keys())?;
    let (primitive_parts, alias_parts, is_top_level_alias) =
        analyze_values(engine, &path, &params.token_type, &params.value)?;

    let common = NodeCommon::new(
        path.clone(),
        params.description,
        extensions_from_payload(params.extensions.as_ref()),
    );
    let slot = make_slot(
        engine,
        common,
        params.token_type,
        params.value,
        primitive_parts,
        alias_parts,
        is_top_level_alias,
    );
    engine.state.add_token(slot)?;
    recompute_state_resolvability(&mut engine.state);
    Ok(json!({"path": path.to_string()}))
}

fn rename_token(engine: &mut TokenTreeEngine, payload: &Value) -> Result<Value> {
    let params: RenameParams = remap(payload)?;
    let path = required_path("renameToken", &params.path)?;
    engine.state.get_token(&path)?;
    let new_path = rename_node(engine, "renameToken", &path, &params.new_name)?;
    Ok(json!({"path": new_path.to_string()}))
}

fn update_token_description(engine: &mut TokenTreeEngine, payload: &Value) -> Result<Value> {
    let params: DescriptionParams = remap(payload)?;
    let path = required_path("updateTokenDescription", &params.path)?;
    engine.state.get_token(&path)?;
    set_description(engine, &path, params.description)?;
    Ok(json!({"path": params.path}))
}

fn update_token_extensions(engine: &mut TokenTreeEngine, payload: &Value) -> Result<Value> {
    let params: ExtensionsParams = remap(payload)?;
    let path = required_path("updateTokenExtensions", &params.path)?;
    engine.state.get_token(&path)?;
    set_extensions(engine, &path, extensions_from_payload(params.extensions.as_ref()))?;
    Ok(json!({"path": params.path}))
}

#[derive(Debug, Deserialize)]
struct ValueParams {
    path: String,
    value: BTreeMap<String, Value>,
}

fn update_token_value(engine: &mut TokenTreeEngine, payload: &Value) -> Result<Value> {
    let params: ValueParams = remap(payload)?;
    let path = required_path("updateTokenValue", &params.path)?;
    rebuild_token(engine, "updateTokenValue", &path, params.value)?;
    Ok(json!({"path": params.path}))
}

fn resolve_token_value_aliases(engine: &mut TokenTreeEngine, payload: &Value) -> Result<Value> {
    let params: PathParams = remap(payload)?;
    let path = required_path("resolveTokenValueAliases", &params.path)?;
    let modes: Vec<String> = engine.state.get_token(&path)?.values().keys().cloned().collect();

    let mut resolved = BTreeMap::new();
    for mode in modes {
        let value = engine.resolved_value(&path, &mode)?;
        resolved.insert(mode, value);
    }
    rebuild_token(engine, "resolveTokenValueAliases", &path, resolved)?;
    Ok(json!({"path": params.path}))
}

#[derive(Debug, Deserialize)]
struct ModeValueParams {
    path: String,
    mode: String,
    value: Value,
}

fn update_token_mode_value(engine: &mut TokenTreeEngine, payload: &Value) -> Result<Value> {
    let params: ModeValueParams = remap(payload)?;
    let path = required_path("updateTokenModeValue", &params.path)?;
    let slot = engine.state.get_token(&path)?;
    if !slot.values().contains_key(&params.mode) {
        return Err(TokenTreeError::InvalidMutation {
            name: "updateTokenModeValue".to_string(),
            reason: format!("mode '{}' is not declared by '{}'", params.mode, path),
        });
    }
    let mut values = slot.values().clone();
    values.insert(params.mode, params.value);
    rebuild_token(engine, "updateTokenModeValue", &path, values)?;
    Ok(json!({"path": params.path}))
}

fn create_token_mode_value(engine: &mut TokenTreeEngine, payload: &Value) -> Result<Value> {
    let params: ModeValueParams = remap(payload)?;
    let path = required_path("createTokenModeValue", &params.path)?;
    ensure_valid_mode_name("createTokenModeValue", &params.mode)?;
    let slot = engine.state.get_token(&path)?;
    if slot.values().contains_key(&params.mode) {
        return Err(TokenTreeError::InvalidMutation {
            name: "createTokenModeValue".to_string(),
            reason: format!("mode '{}' is already declared by '{}'", params.mode, path),
        });
    }
    let mut values = slot.values().clone();
    values.insert(params.mode, params.value);
    rebuild_token(engine, "createTokenModeValue", &path, values)?;
    Ok(json!({"path": params.path}))
}

#[derive(Debug, Deserialize)]
struct ModeParams {
    path: String,
    mode: String,
}

fn delete_token_mode_value(engine: &mut TokenTreeEngine, payload: &Value) -> Result<Value> {
    let params: ModeParams = remap(payload)?;
    let path = required_path("deleteTokenModeValue", &params.path)?;
    let slot = engine.state.get_token(&path)?;
    if !slot.values().contains_key(&params.mode) {
        return Err(TokenTreeError::InvalidMutation {
            name: "deleteTokenModeValue".to_string(),
            reason: format!("mode '{}' is not declared by '{}'", params.mode, path),
        });
    }
    if slot.values().len() == 1 {
        return Err(TokenTreeError::InvalidMutation {
            name: "deleteTokenModeValue".to_string(),
            reason: "a token must keep at least one mode".to_string(),
        });
    }
    let mut values = slot.values().clone();
    values.remove(&params.mode);
    rebuild_token(engine, "deleteTokenModeValue", &path, values)?;
    Ok(json!({"path": params.path}))
}

fn rename_token_mode(engine: &mut TokenTreeEngine, payload: &Value) -> Result<Value> {
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct RenameTokenModeParams {
        path: String,
        mode: String,
        new_name: String,
    }

    let params: RenameTokenModeParams = remap(payload)?;
    let path = required_path("renameTokenMode", &params.path)?;
    let slot = engine.state.get_token(&path)?;
    if !slot.values().contains_key(&params.mode) {
        return Err(TokenTreeError::InvalidMutation {
            name: "renameTokenMode".to_string(),
            reason: format!("mode '{}' is not declared by '{}'", params.mode, path),
        });
    }
    if slot.values().contains_key(&params.new_name) {
        return Err(TokenTreeError::InvalidMutation {
            name: "renameTokenMode".to_string(),
            reason: format!("mode '{}' is already declared by '{}'", params.new_name, path),
        });
    }
    ensure_modes_allowed(
        engine,
        "renameTokenMode",
        &path,
        std::iter::once(&params.new_name),
    )?;

    rename_mode_on_paths(engine, std::slice::from_ref(&path), &params.mode, &params.new_name)?;
    rewrite_explicit_mode_references(engine, &path, &params.mode, &params.new_name)?;
    recompute_state_resolvability(&mut engine.state);
    Ok(json!({"path": params.path, "mode": params.new_name}))
}

fn delete_token(engine: &mut TokenTreeEngine, payload: &Value) -> Result<Value> {
    let params: PathParams = remap(payload)?;
    let path = required_path("deleteToken", &params.path)?;
    engine.state.get_token(&path)?;
    let removed = delete_subtree(engine, &path, true);
    Ok(json!({"removed": removed}))
}
