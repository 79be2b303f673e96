//! Mutation engine
//!
//! Mutations are named commands over the tree. Each `MutationDefinition`
//! couples a unique name, a payload schema, and an executor; dispatching
//! validates the raw payload against the schema (fail fast, one
//! structured violation per failing field), remaps it into typed
//! arguments, and pipes those into the executor. Validation completes
//! before any state write, so a failed command leaves the tree unchanged.

pub mod bulk;
pub mod collections;
pub mod groups;
mod support;
pub mod tokens;
pub mod views;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokenweave_core::errors::{Result, TokenTreeError, Violation};

use crate::engine::TokenTreeEngine;

/// A named, schema-validated command over the tree
pub struct MutationDefinition {
    /// Unique command name, the dispatch key
    pub name: &'static str,
    /// Payload schema producer (static `json!` literal)
    pub schema: fn() -> Value,
    /// Executor invoked with the validated payload
    pub execute: fn(&mut TokenTreeEngine, &Value) -> Result<Value>,
}

impl MutationDefinition {
    /// Validate the payload and run the executor
    ///
    /// # Errors
    ///
    /// Returns `SchemaValidation` with per-field violations before the
    /// executor is reached.
    pub fn run(&self, engine: &mut TokenTreeEngine, payload: &Value) -> Result<Value> {
        validate_payload(self.name, &(self.schema)(), payload)?;
        (self.execute)(engine, payload)
    }
}

impl std::fmt::Debug for MutationDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationDefinition")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Validate a raw payload against a command's schema
///
/// # Errors
///
/// Returns `SchemaValidation` with one violation per failing payload
/// field, tagged with its JSON pointer.
pub fn validate_payload(name: &str, schema: &Value, payload: &Value) -> Result<()> {
    let validator =
        jsonschema::validator_for(schema).map_err(|err| TokenTreeError::InternalDesign {
            message: format!("invalid schema for mutation '{}': {}", name, err),
        })?;
    let violations: Vec<Violation> = validator
        .iter_errors(payload)
        .map(|err| Violation::new(err.instance_path().to_string(), err.to_string()))
        .collect();
    if violations.is_empty() {
        Ok(())
    } else {
        Err(TokenTreeError::schema_validation(violations))
    }
}

/// Remap a schema-validated payload into typed executor arguments
///
/// # Errors
///
/// Returns `Serialization` when the payload does not fit the argument
/// shape; the payload schema is expected to make that unreachable.
pub fn remap<P: DeserializeOwned>(payload: &Value) -> Result<P> {
    serde_json::from_value(payload.clone()).map_err(Into::into)
}

/// The fixed command catalog
pub fn catalog() -> Vec<MutationDefinition> {
    let mut definitions = Vec::new();
    definitions.extend(views::definitions());
    definitions.extend(collections::definitions());
    definitions.extend(groups::definitions());
    definitions.extend(tokens::definitions());
    definitions.extend(bulk::definitions());
    definitions
}

/// Dispatch a mutation by name
///
/// After a successful command the registered views are rematerialized
/// against the mutated tree.
///
/// # Errors
///
/// Returns `UnknownMutation` for an unregistered name; otherwise
/// whatever the command raises.
pub fn dispatch(engine: &mut TokenTreeEngine, name: &str, payload: &Value) -> Result<Value> {
    let definitions = catalog();
    let definition = definitions
        .iter()
        .find(|definition| definition.name == name)
        .ok_or_else(|| TokenTreeError::UnknownMutation {
            name: name.to_string(),
        })?;
    tracing::debug!(mutation = name, "applying mutation");
    let result = definition.run(engine, payload)?;
    engine.views.rematerialize(&engine.state)?;
    Ok(result)
}
