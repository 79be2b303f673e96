//! Collection lifecycle commands

use serde::Deserialize;
use serde_json::{json, Value};
use tokenweave_core::errors::{Result, TokenTreeError};
use tokenweave_core::model::{CollectionState, NodeCommon, TokenSlot};
use tokenweave_core::state::recompute_state_resolvability;

use crate::engine::TokenTreeEngine;
use crate::mutation::groups::{
    description_schema, extensions_schema, path_schema, rename_schema, DescriptionParams,
    ExtensionsParams, PathParams, RenameParams,
};
use crate::mutation::support::{
    delete_subtree, ensure_parent_container, ensure_path_free, ensure_valid_mode_name,
    ensure_valid_node_name, extensions_from_payload, parent_path, rename_mode_on_paths,
    rename_node, required_path, rewrite_explicit_mode_references, set_description, set_extensions,
};
use crate::mutation::{remap, MutationDefinition};

/// The collection command definitions
pub fn definitions() -> Vec<MutationDefinition> {
    vec![
        MutationDefinition {
            name: "addCollection",
            schema: add_collection_schema,
            execute: add_collection,
        },
        MutationDefinition {
            name: "renameCollection",
            schema: rename_schema,
            execute: rename_collection,
        },
        MutationDefinition {
            name: "updateCollectionDescription",
            schema: description_schema,
            execute: update_collection_description,
        },
        MutationDefinition {
            name: "updateCollectionExtensions",
            schema: extensions_schema,
            execute: update_collection_extensions,
        },
        MutationDefinition {
            name: "renameCollectionMode",
            schema: rename_mode_schema,
            execute: rename_collection_mode,
        },
        MutationDefinition {
            name: "truncateCollection",
            schema: path_schema,
            execute: truncate_collection,
        },
        MutationDefinition {
            name: "deleteCollection",
            schema: path_schema,
            execute: delete_collection,
        },
        MutationDefinition {
            name: "deleteCollectionMode",
            schema: delete_mode_schema,
            execute: delete_collection_mode,
        },
    ]
}

fn add_collection_schema() -> Value {
    json!({
        "type": "object",
        "required": ["name", "modes"],
        "properties": {
            "parentPath": {"type": "string"},
            "name": {"type": "string", "minLength": 1},
            "modes": {
                "type": "array",
                "items": {"type": "string", "minLength": 1},
                "minItems": 1
            },
            "description": {"type": "string"},
            "extensions": {"type": "object"}
        },
        "additionalProperties": false
    })
}

pub(crate) fn rename_mode_schema() -> Value {
    json!({
        "type": "object",
        "required": ["path", "mode", "newName"],
        "properties": {
            "path": {"type": "string", "minLength": 1},
            "mode": {"type": "string", "minLength": 1},
            "newName": {"type": "string", "minLength": 1}
        },
        "additionalProperties": false
    })
}

fn delete_mode_schema() -> Value {
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

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddCollectionParams {
    parent_path: Option<String>,
    name: String,
    modes: Vec<String>,
    description: Option<String>,
    extensions: Option<Value>,
}

fn add_collection(engine: &mut TokenTreeEngine, payload: &Value) -> Result<Value> {
    let params: AddCollectionParams = remap(payload)?;
    ensure_valid_node_name("addCollection", &params.name)?;
    let parent = parent_path(params.parent_path.as_deref());
    ensure_parent_container(engine, "addCollection", &parent)?;
    let path = parent.child(&params.name);
    ensure_path_free(engine, &path)?;
    if engine.state.nearest_collection(&path).is_some() {
        return Err(TokenTreeError::InvalidMutation {
            name: "addCollection".to_string(),
            reason: "collections cannot nest inside collections".to_string(),
        });
    }
    let mut seen = std::collections::HashSet::new();
    for mode in &params.modes {
        ensure_valid_mode_name("addCollection", mode)?;
        if !seen.insert(mode.as_str()) {
            return Err(TokenTreeError::InvalidMutation {
                name: "addCollection".to_string(),
                reason: format!("duplicate mode '{}'", mode),
            });
        }
    }

    engine.state.add_collection(CollectionState::new(
        NodeCommon::new(
            path.clone(),
            params.description,
            extensions_from_payload(params.extensions.as_ref()),
        ),
        params.modes,
    ))?;
    Ok(json!({"path": path.to_string()}))
}

fn rename_collection(engine: &mut TokenTreeEngine, payload: &Value) -> Result<Value> {
    let params: RenameParams = remap(payload)?;
    let path = required_path("renameCollection", &params.path)?;
    engine.state.get_collection(&path)?;
    let new_path = rename_node(engine, "renameCollection", &path, &params.new_name)?;
    Ok(json!({"path": new_path.to_string()}))
}

fn update_collection_description(engine: &mut TokenTreeEngine, payload: &Value) -> Result<Value> {
    let params: DescriptionParams = remap(payload)?;
    let path = required_path("updateCollectionDescription", &params.path)?;
    engine.state.get_collection(&path)?;
    set_description(engine, &path, params.description)?;
    Ok(json!({"path": params.path}))
}

fn update_collection_extensions(engine: &mut TokenTreeEngine, payload: &Value) -> Result<Value> {
    let params: ExtensionsParams = remap(payload)?;
    let path = required_path("updateCollectionExtensions", &params.path)?;
    engine.state.get_collection(&path)?;
    set_extensions(engine, &path, extensions_from_payload(params.extensions.as_ref()))?;
    Ok(json!({"path": params.path}))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RenameModeParams {
    pub(crate) path: String,
    pub(crate) mode: String,
    pub(crate) new_name: String,
}

fn rename_collection_mode(engine: &mut TokenTreeEngine, payload: &Value) -> Result<Value> {
    let params: RenameModeParams = remap(payload)?;
    let path = required_path("renameCollectionMode", &params.path)?;
    let collection = engine.state.get_collection(&path)?;
    if !collection.allows_mode(&params.mode) {
        return Err(TokenTreeError::InvalidMutation {
            name: "renameCollectionMode".to_string(),
            reason: format!("mode '{}' is not declared by '{}'", params.mode, path),
        });
    }
    ensure_valid_mode_name("renameCollectionMode", &params.new_name)?;
    if collection.allows_mode(&params.new_name) {
        return Err(TokenTreeError::InvalidMutation {
            name: "renameCollectionMode".to_string(),
            reason: format!("mode '{}' is already declared by '{}'", params.new_name, path),
        });
    }

    if let Some(collection) = engine.state.collection_mut(&path) {
        for mode in &mut collection.allowed_modes {
            if mode == &params.mode {
                *mode = params.new_name.clone();
            }
        }
    }
    let descendants = engine.state.descendants_of(&path);
    rename_mode_on_paths(engine, &descendants, &params.mode, &params.new_name)?;
    rewrite_explicit_mode_references(engine, &path, &params.mode, &params.new_name)?;
    recompute_state_resolvability(&mut engine.state);
    Ok(json!({"path": params.path, "mode": params.new_name}))
}

fn truncate_collection(engine: &mut TokenTreeEngine, payload: &Value) -> Result<Value> {
    let params: PathParams = remap(payload)?;
    let path = required_path("truncateCollection", &params.path)?;
    engine.state.get_collection(&path)?;
    let removed = delete_subtree(engine, &path, false);
    Ok(json!({"removed": removed}))
}

fn delete_collection(engine: &mut TokenTreeEngine, payload: &Value) -> Result<Value> {
    let params: PathParams = remap(payload)?;
    let path = required_path("deleteCollection", &params.path)?;
    engine.state.get_collection(&path)?;
    let removed = delete_subtree(engine, &path, true);
    Ok(json!({"removed": removed}))
}

#[derive(Debug, Deserialize)]
struct DeleteModeParams {
    path: String,
    mode: String,
}

fn delete_collection_mode(engine: &mut TokenTreeEngine, payload: &Value) -> Result<Value> {
    let params: DeleteModeParams = remap(payload)?;
    let path = required_path("deleteCollectionMode", &params.path)?;
    let collection = engine.state.get_collection(&path)?;
    if !collection.allows_mode(&params.mode) {
        return Err(TokenTreeError::InvalidMutation {
            name: "deleteCollectionMode".to_string(),
            reason: format!("mode '{}' is not declared by '{}'", params.mode, path),
        });
    }
    if collection.allowed_modes.len() == 1 {
        return Err(TokenTreeError::InvalidMutation {
            name: "deleteCollectionMode".to_string(),
            reason: "a collection's mode list must stay non-empty".to_string(),
        });
    }

    if let Some(collection) = engine.state.collection_mut(&path) {
        collection.allowed_modes.retain(|mode| mode != &params.mode);
    }
    // Strip the mode from descendant tokens; a token declaring only this
    // mode disappears with it.
    let mut emptied = Vec::new();
    for token_path in engine.state.descendants_of(&path) {
        let Some(slot) = engine.state.token_mut(&token_path) else {
            continue;
        };
        slot.values_mut().remove(&params.mode);
        slot.primitive_parts_mut().retain(|part| part.mode != params.mode);
        slot.alias_parts_mut().retain(|part| part.mode != params.mode);
        if let TokenSlot::Token(token) = slot {
            token.modes_resolvability.remove(&params.mode);
        }
        if slot.values().is_empty() {
            emptied.push(token_path);
        }
    }
    for token_path in &emptied {
        engine.state.remove_token(token_path);
    }
    recompute_state_resolvability(&mut engine.state);
    Ok(json!({"path": params.path, "removedTokens": emptied.len()}))
}
