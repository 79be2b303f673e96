//! Group lifecycle commands

use serde::Deserialize;
use serde_json::{json, Value};
use tokenweave_core::errors::Result;
use tokenweave_core::model::{GroupState, NodeCommon};

use crate::engine::TokenTreeEngine;
use crate::mutation::support::{
    delete_subtree, ensure_parent_container, ensure_path_free, ensure_valid_node_name,
    extensions_from_payload, parent_path, rename_node, required_path, set_description,
    set_extensions,
};
use crate::mutation::{remap, MutationDefinition};

/// The group command definitions
pub fn definitions() -> Vec<MutationDefinition> {
    vec![
        MutationDefinition {
            name: "addGroup",
            schema: add_group_schema,
            execute: add_group,
        },
        MutationDefinition {
            name: "renameGroup",
            schema: rename_schema,
            execute: rename_group,
        },
        MutationDefinition {
            name: "updateGroupDescription",
            schema: description_schema,
            execute: update_group_description,
        },
        MutationDefinition {
            name: "updateGroupExtensions",
            schema: extensions_schema,
            execute: update_group_extensions,
        },
        MutationDefinition {
            name: "truncateGroup",
            schema: path_schema,
            execute: truncate_group,
        },
        MutationDefinition {
            name: "deleteGroup",
            schema: path_schema,
            execute: delete_group,
        },
    ]
}

fn add_group_schema() -> Value {
    json!({
        "type": "object",
        "required": ["name"],
        "properties": {
            "parentPath": {"type": "string"},
            "name": {"type": "string", "minLength": 1},
            "description": {"type": "string"},
            "extensions": {"type": "object"}
        },
        "additionalProperties": false
    })
}

pub(crate) fn rename_schema() -> Value {
    json!({
        "type": "object",
        "required": ["path", "newName"],
        "properties": {
            "path": {"type": "string", "minLength": 1},
            "newName": {"type": "string", "minLength": 1}
        },
        "additionalProperties": false
    })
}

pub(crate) fn description_schema() -> Value {
    json!({
        "type": "object",
        "required": ["path", "description"],
        "properties": {
            "path": {"type": "string", "minLength": 1},
            "description": {"type": ["string", "null"]}
        },
        "additionalProperties": false
    })
}

pub(crate) fn extensions_schema() -> Value {
    json!({
        "type": "object",
        "required": ["path", "extensions"],
        "properties": {
            "path": {"type": "string", "minLength": 1},
            "extensions": {"type": ["object", "null"]}
        },
        "additionalProperties": false
    })
}

pub(crate) fn path_schema() -> Value {
    json!({
        "type": "object",
        "required": ["path"],
        "properties": {
            "path": {"type": "string", "minLength": 1}
        },
        "additionalProperties": false
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddGroupParams {
    parent_path: Option<String>,
    name: String,
    description: Option<String>,
    extensions: Option<Value>,
}

fn add_group(engine: &mut TokenTreeEngine, payload: &Value) -> Result<Value> {
    let params: AddGroupParams = remap(payload)?;
    ensure_valid_node_name("addGroup", &params.name)?;
    let parent = parent_path(params.parent_path.as_deref());
    ensure_parent_container(engine, "addGroup", &parent)?;
    let path = parent.child(&params.name);
    ensure_path_free(engine, &path)?;

    engine.state.add_group(GroupState::new(NodeCommon::new(
        path.clone(),
        params.description,
        extensions_from_payload(params.extensions.as_ref()),
    )))?;
    Ok(json!({"path": path.to_string()}))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RenameParams {
    pub(crate) path: String,
    pub(crate) new_name: String,
}

fn rename_group(engine: &mut TokenTreeEngine, payload: &Value) -> Result<Value> {
    let params: RenameParams = remap(payload)?;
    let path = required_path("renameGroup", &params.path)?;
    engine.state.get_group(&path)?;
    let new_path = rename_node(engine, "renameGroup", &path, &params.new_name)?;
    Ok(json!({"path": new_path.to_string()}))
}

#[derive(Debug, Deserialize)]
pub(crate) struct DescriptionParams {
    pub(crate) path: String,
    pub(crate) description: Option<String>,
}

fn update_group_description(engine: &mut TokenTreeEngine, payload: &Value) -> Result<Value> {
    let params: DescriptionParams = remap(payload)?;
    let path = required_path("updateGroupDescription", &params.path)?;
    engine.state.get_group(&path)?;
    set_description(engine, &path, params.description)?;
    Ok(json!({"path": params.path}))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExtensionsParams {
    pub(crate) path: String,
    pub(crate) extensions: Option<Value>,
}

fn update_group_extensions(engine: &mut TokenTreeEngine, payload: &Value) -> Result<Value> {
    let params: ExtensionsParams = remap(payload)?;
    let path = required_path("updateGroupExtensions", &params.path)?;
    engine.state.get_group(&path)?;
    set_extensions(engine, &path, extensions_from_payload(params.extensions.as_ref()))?;
    Ok(json!({"path": params.path}))
}

#[derive(Debug, Deserialize)]
pub(crate) struct PathParams {
    pub(crate) path: String,
}

fn truncate_group(engine: &mut TokenTreeEngine, payload: &Value) -> Result<Value> {
    let params: PathParams = remap(payload)?;
    let path = required_path("truncateGroup", &params.path)?;
    engine.state.get_group(&path)?;
    let removed = delete_subtree(engine, &path, false);
    Ok(json!({"removed": removed}))
}

fn delete_group(engine: &mut TokenTreeEngine, payload: &Value) -> Result<Value> {
    let params: PathParams = remap(payload)?;
    let path = required_path("deleteGroup", &params.path)?;
    engine.state.get_group(&path)?;
    let removed = delete_subtree(engine, &path, true);
    Ok(json!({"removed": removed}))
}
