//! View lifecycle commands

use serde::Deserialize;
use serde_json::{json, Value};
use tokenweave_core::errors::{Result, TokenTreeError};

use crate::engine::TokenTreeEngine;
use crate::mutation::{remap, MutationDefinition};
use crate::query::TokensQuery;

/// The view command definitions
pub fn definitions() -> Vec<MutationDefinition> {
    vec![
        MutationDefinition {
            name: "registerView",
            schema: named_query_schema,
            execute: register_view,
        },
        MutationDefinition {
            name: "updateView",
            schema: named_query_schema,
            execute: update_view,
        },
        MutationDefinition {
            name: "setActiveView",
            schema: set_active_view_schema,
            execute: set_active_view,
        },
        MutationDefinition {
            name: "deleteView",
            schema: view_name_schema,
            execute: delete_view,
        },
        MutationDefinition {
            name: "deleteAllViews",
            schema: empty_schema,
            execute: delete_all_views,
        },
    ]
}

fn named_query_schema() -> Value {
    json!({
        "type": "object",
        "required": ["name", "query"],
        "properties": {
            "name": {"type": "string", "minLength": 1},
            "query": {"type": "object"}
        },
        "additionalProperties": false
    })
}

fn set_active_view_schema() -> Value {
    json!({
        "type": "object",
        "required": ["name"],
        "properties": {
            "name": {"type": ["string", "null"], "minLength": 1}
        },
        "additionalProperties": false
    })
}

fn view_name_schema() -> Value {
    json!({
        "type": "object",
        "required": ["name"],
        "properties": {
            "name": {"type": "string", "minLength": 1}
        },
        "additionalProperties": false
    })
}

fn empty_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false
    })
}

#[derive(Debug, Deserialize)]
struct NamedQueryParams {
    name: String,
    query: Value,
}

fn parse_query(raw: Value) -> Result<TokensQuery> {
    let query: TokensQuery =
        serde_json::from_value(raw).map_err(|err| TokenTreeError::QueryStructure {
            reason: err.to_string(),
        })?;
    query.validate()?;
    Ok(query)
}

fn register_view(engine: &mut TokenTreeEngine, payload: &Value) -> Result<Value> {
    let params: NamedQueryParams = remap(payload)?;
    let query = parse_query(params.query)?;
    engine.views.register(params.name.clone(), query, &engine.state)?;
    Ok(json!({"name": params.name}))
}

fn update_view(engine: &mut TokenTreeEngine, payload: &Value) -> Result<Value> {
    let params: NamedQueryParams = remap(payload)?;
    let query = parse_query(params.query)?;
    engine.views.update(&params.name, query, &engine.state)?;
    Ok(json!({"name": params.name}))
}

#[derive(Debug, Deserialize)]
struct SetActiveViewParams {
    name: Option<String>,
}

fn set_active_view(engine: &mut TokenTreeEngine, payload: &Value) -> Result<Value> {
    let params: SetActiveViewParams = remap(payload)?;
    engine.views.set_active(params.name)?;
    Ok(json!({"activeViewName": engine.views.active_view_name()}))
}

#[derive(Debug, Deserialize)]
struct ViewNameParams {
    name: String,
}

fn delete_view(engine: &mut TokenTreeEngine, payload: &Value) -> Result<Value> {
    let params: ViewNameParams = remap(payload)?;
    engine.views.delete(&params.name)?;
    Ok(json!({"name": params.name}))
}

fn delete_all_views(engine: &mut TokenTreeEngine, _payload: &Value) -> Result<Value> {
    engine.views.delete_all();
    Ok(Value::Null)
}
