// Integration tests for the query engine.
// Covers clause discrimination, andWhere narrowing, select union, depth,
// property filters, and the continuity check.

mod common;

use common::{engine_with, query, sample_document, selected_paths};
use serde_json::json;
use tokenweave_core::errors::TokenTreeError;
use tokenweave_core_types::TreePath;
use tokenweave_engine::compute_is_continuous_nodes_graph;

// ---------------------------------------------------------------------------
// clause evaluation
// ---------------------------------------------------------------------------

#[test]
fn test_and_where_selects_only_descendants() {
    let engine = engine_with(json!({
        "g": {"t": {"$type": "color", "$value": {"default": "#000000"}}},
        "other": {"t2": {"$type": "color", "$value": {"default": "#ffffff"}}}
    }));
    let selected = selected_paths(
        &engine,
        json!({"where": {"group": "^g$", "andWhere": {"token": ".*", "select": true}}}),
    );
    assert_eq!(selected, vec!["g.t"]);
}

#[test]
fn test_select_union_over_recursion_levels() {
    let engine = engine_with(sample_document());
    let selected = selected_paths(
        &engine,
        json!({"where": {
            "collection": "^theme$",
            "select": true,
            "andWhere": {"token": ".*", "select": true}
        }}),
    );
    assert_eq!(selected, vec!["theme", "theme.colors.base", "theme.colors.surface"]);
}

#[test]
fn test_array_where_unions_clause_matches() {
    let engine = engine_with(sample_document());
    let selected = selected_paths(
        &engine,
        json!({"where": [
            {"group": "^spacing$", "select": true},
            {"collection": "^theme$", "select": true}
        ]}),
    );
    assert_eq!(selected, vec!["spacing", "theme"]);
}

#[test]
fn test_no_match_returns_empty_not_error() {
    let engine = engine_with(sample_document());
    let selected = selected_paths(
        &engine,
        json!({"where": {"token": "^does-not-exist$", "select": true}}),
    );
    assert!(selected.is_empty());
}

#[test]
fn test_unselected_clauses_contribute_nothing() {
    let engine = engine_with(sample_document());
    let selected = selected_paths(&engine, json!({"where": {"token": ".*"}}));
    assert!(selected.is_empty());
}

// ---------------------------------------------------------------------------
// structural validation
// ---------------------------------------------------------------------------

#[test]
fn test_collection_nested_in_collection_raises() {
    let engine = engine_with(sample_document());
    let result = engine.query_paths(&query(json!({
        "where": {
            "collection": "a",
            "andWhere": {"collection": "b", "andWhere": {"token": ".*", "select": true}}
        }
    })));
    match result {
        Err(TokenTreeError::QueryStructure { reason }) => {
            assert!(reason.contains("collection clause cannot nest"));
        }
        other => panic!("expected QueryStructure, got {:?}", other),
    }
}

// ---------------------------------------------------------------------------
// depth
// ---------------------------------------------------------------------------

// Pins the convention: depth is the number of path segments, so
// root-level nodes are at depth 1.
#[test]
fn test_at_depth_equal_to_root_level() {
    let engine = engine_with(sample_document());
    let selected = selected_paths(
        &engine,
        json!({"where": {"group": ".*", "atDepth": {"equalTo": 1}, "select": true}}),
    );
    assert_eq!(selected, vec!["spacing"]);
}

#[test]
fn test_at_depth_up_to_excludes_deeper_nodes() {
    let engine = engine_with(sample_document());
    let selected = selected_paths(
        &engine,
        json!({"where": {"token": ".*", "atDepth": {"upTo": 2}, "select": true}}),
    );
    assert_eq!(selected, vec!["spacing.m", "spacing.s"]);
}

// ---------------------------------------------------------------------------
// property filters
// ---------------------------------------------------------------------------

#[test]
fn test_types_filter_narrows_tokens() {
    let engine = engine_with(sample_document());
    let selected = selected_paths(
        &engine,
        json!({"where": {"token": ".*", "types": {"include": ["dimension"]}, "select": true}}),
    );
    assert_eq!(selected, vec!["spacing.m", "spacing.s"]);

    let excluded = selected_paths(
        &engine,
        json!({"where": {"token": ".*", "types": {"exclude": ["dimension"]}, "select": true}}),
    );
    assert_eq!(excluded, vec!["theme.colors.base", "theme.colors.surface"]);
}

#[test]
fn test_modes_filter_on_tokens_and_collections() {
    let engine = engine_with(sample_document());
    let tokens = selected_paths(
        &engine,
        json!({"where": {"token": ".*", "modes": {"include": ["dark"]}, "select": true}}),
    );
    assert_eq!(tokens, vec!["theme.colors.base", "theme.colors.surface"]);

    let collections = selected_paths(
        &engine,
        json!({"where": {"collection": ".*", "modes": {"include": ["light", "dark"]}, "select": true}}),
    );
    assert_eq!(collections, vec!["theme"]);
}

#[test]
fn test_source_ids_selector_reads_extensions() {
    let engine = engine_with(sample_document());
    let selected = selected_paths(
        &engine,
        json!({"where": {"token": ".*", "sourceIds": {"include": ["figma-12"]}, "select": true}}),
    );
    assert_eq!(selected, vec!["theme.colors.surface"]);
}

#[test]
fn test_created_selector_reads_extensions() {
    let engine = engine_with(sample_document());
    let within = selected_paths(
        &engine,
        json!({"where": {"token": ".*", "created": {"from": "2024-01-01T00:00:00Z", "to": "2024-12-31T00:00:00Z"}, "select": true}}),
    );
    assert_eq!(within, vec!["theme.colors.surface"]);

    let outside = selected_paths(
        &engine,
        json!({"where": {"token": ".*", "created": {"from": "2025-01-01T00:00:00Z"}, "select": true}}),
    );
    assert!(outside.is_empty());
}

#[test]
fn test_description_filter_matches_regex() {
    let engine = engine_with(json!({
        "a": {"$type": "color", "$value": {"default": "#000000"}, "$description": "Primary brand color"},
        "b": {"$type": "color", "$value": {"default": "#ffffff"}}
    }));
    let selected = selected_paths(
        &engine,
        json!({"where": {"token": ".*", "description": "brand", "select": true}}),
    );
    assert_eq!(selected, vec!["a"]);
}

// ---------------------------------------------------------------------------
// projections
// ---------------------------------------------------------------------------

#[test]
fn test_query_output_shapes_per_kind() {
    let engine = engine_with(sample_document());
    let projections = engine
        .query(&query(json!({"where": [
            {"collection": "^theme$", "select": true},
            {"group": "^spacing$", "select": true},
            {"token": "^s$", "select": true}
        ]})))
        .unwrap();
    assert_eq!(projections.len(), 3);
    assert_eq!(projections[0], json!({}));
    assert_eq!(
        projections[1],
        json!({"$type": "dimension", "$value": {"default": 8}})
    );
    assert_eq!(projections[2]["$modes"], json!(["light", "dark"]));
}

#[test]
fn test_unresolvable_token_projects_as_null() {
    let engine = engine_with(json!({
        "broken": {"$type": "color", "$value": {"default": {"$alias": "ghost"}}}
    }));
    let projections = engine
        .query(&query(json!({"where": {"token": ".*", "select": true}})))
        .unwrap();
    assert_eq!(projections, vec![json!(null)]);
}

// ---------------------------------------------------------------------------
// continuity
// ---------------------------------------------------------------------------

#[test]
fn test_continuity_check_spots_missing_intermediate() {
    let discontinuous = [TreePath::parse("a"), TreePath::parse("a.c.d")];
    assert!(!compute_is_continuous_nodes_graph(&discontinuous));

    let continuous = [TreePath::parse("a"), TreePath::parse("a.b")];
    assert!(compute_is_continuous_nodes_graph(&continuous));
}

#[test]
fn test_and_where_chains_produce_discontinuous_sets() {
    // Selecting leaves without their ancestors is legal; the continuity
    // check is what callers consult before serializing a subtree.
    let engine = engine_with(sample_document());
    let selected = engine
        .query_paths(&query(json!({
            "where": {"collection": "^theme$", "andWhere": {"token": ".*", "select": true}}
        })))
        .unwrap();
    assert!(!compute_is_continuous_nodes_graph(&selected));
}
