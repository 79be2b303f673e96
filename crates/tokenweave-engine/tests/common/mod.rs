// Shared fixtures for the engine integration suites.
// Each suite pulls in the subset it needs.
#![allow(dead_code)]

use serde_json::{json, Value};
use tokenweave_core::registry::test_support::full_registry;
use tokenweave_engine::{TokenTreeEngine, TokensQuery};

/// Engine over the color/dimension/shadow test catalog, tree empty
pub fn empty_engine() -> TokenTreeEngine {
    TokenTreeEngine::new(Box::new(full_registry()))
}

/// Engine loaded with `document`
pub fn engine_with(document: Value) -> TokenTreeEngine {
    let mut engine = empty_engine();
    engine
        .load_document(&document)
        .expect("fixture document loads");
    engine
}

/// A small tree exercising every node kind:
/// a collection with two modes, a group inside it, aliased tokens, and a
/// loose root-level group
pub fn sample_document() -> Value {
    json!({
        "theme": {
            "$modes": ["light", "dark"],
            "colors": {
                "base": {
                    "$type": "color",
                    "$value": {"light": "#ffffff", "dark": "#111111"}
                },
                "surface": {
                    "$type": "color",
                    "$value": {
                        "light": {"$alias": "theme.colors.base"},
                        "dark": {"$alias": "theme.colors.base", "$mode": "dark"}
                    },
                    "$extensions": {
                        "sourceIds": ["figma-12"],
                        "createdAt": "2024-03-01T10:00:00Z",
                        "updatedAt": "2024-06-01T10:00:00Z"
                    }
                }
            }
        },
        "spacing": {
            "s": {"$type": "dimension", "$value": {"default": 8}},
            "m": {"$type": "dimension", "$value": {"default": 16}}
        }
    })
}

/// Parse a query AST literal
pub fn query(raw: Value) -> TokensQuery {
    serde_json::from_value(raw).expect("query literal parses")
}

/// The selected paths of a query as dotted strings
pub fn selected_paths(engine: &TokenTreeEngine, raw: Value) -> Vec<String> {
    engine
        .query_paths(&query(raw))
        .expect("query evaluates")
        .iter()
        .map(ToString::to_string)
        .collect()
}
