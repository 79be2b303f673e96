//! Bulk commands: full tree reset and reload

use serde::Deserialize;
use serde_json::{json, Value};
use tokenweave_core::errors::Result;

use crate::engine::TokenTreeEngine;
use crate::mutation::{remap, MutationDefinition};

/// The bulk command definitions
pub fn definitions() -> Vec<MutationDefinition> {
    vec![
        MutationDefinition {
            name: "resetTokenTree",
            schema: empty_schema,
            execute: reset_token_tree,
        },
        MutationDefinition {
            name: "loadTokenTree",
            schema: load_token_tree_schema,
            execute: load_token_tree,
        },
    ]
}

fn empty_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false
    })
}

fn load_token_tree_schema() -> Value {
    json!({
        "type": "object",
        "required": ["document"],
        "properties": {
            "document": {"type": "object"}
        },
        "additionalProperties": false
    })
}

fn reset_token_tree(engine: &mut TokenTreeEngine, _payload: &Value) -> Result<Value> {
    engine.reset()?;
    Ok(Value::Null)
}

#[derive(Debug, Deserialize)]
struct LoadTokenTreeParams {
    document: Value,
}

fn load_token_tree(engine: &mut TokenTreeEngine, payload: &Value) -> Result<Value> {
    let params: LoadTokenTreeParams = remap(payload)?;
    engine.load_document(&params.document)?;
    Ok(json!({"nodes": engine.state.len()}))
}
