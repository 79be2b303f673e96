// Integration tests for the mutation catalog.
// Covers payload validation, reference checks, rename/delete cascades,
// alias demotion and re-promotion, and mode commands.

mod common;

use common::{engine_with, sample_document, selected_paths};
use serde_json::json;
use tokenweave_core::errors::TokenTreeError;
use tokenweave_core::model::TokenSlot;
use tokenweave_core_types::TreePath;

// ---------------------------------------------------------------------------
// dispatch and payload validation
// ---------------------------------------------------------------------------

#[test]
fn test_unknown_mutation_name_is_rejected() {
    let mut engine = engine_with(sample_document());
    let result = engine.run_mutation("frobnicateTree", &json!({}));
    assert!(matches!(
        result,
        Err(TokenTreeError::UnknownMutation { .. })
    ));
}

#[test]
fn test_payload_schema_failure_names_field_and_leaves_state_untouched() {
    let mut engine = engine_with(sample_document());
    let before = engine.render();
    let result = engine.run_mutation("addGroup", &json!({"name": 42}));
    match result {
        Err(TokenTreeError::SchemaValidation { violations }) => {
            assert!(violations.iter().any(|v| v.path == "/name"));
        }
        other => panic!("expected SchemaValidation, got {:?}", other),
    }
    assert_eq!(engine.render(), before);
}

#[test]
fn test_rename_of_missing_path_leaves_state_unchanged() {
    let mut engine = engine_with(sample_document());
    let before = engine.render();
    let result = engine.run_mutation(
        "renameGroup",
        &json!({"path": "does.not.exist", "newName": "anything"}),
    );
    assert!(matches!(
        result,
        Err(TokenTreeError::ReferenceNotFound { .. })
    ));
    assert_eq!(engine.render(), before);
}

// ---------------------------------------------------------------------------
// add commands
// ---------------------------------------------------------------------------

#[test]
fn test_add_group_and_token_then_query() {
    let mut engine = engine_with(sample_document());
    engine
        .run_mutation("addGroup", &json!({"name": "radius"}))
        .unwrap();
    engine
        .run_mutation(
            "addToken",
            &json!({
                "parentPath": "radius",
                "name": "card",
                "tokenType": "dimension",
                "value": {"default": 12}
            }),
        )
        .unwrap();
    let selected = selected_paths(
        &engine,
        json!({"where": {"group": "^radius$", "andWhere": {"token": ".*", "select": true}}}),
    );
    assert_eq!(selected, vec!["radius.card"]);
}

#[test]
fn test_add_token_on_occupied_path_is_rejected() {
    let mut engine = engine_with(sample_document());
    let result = engine.run_mutation(
        "addToken",
        &json!({
            "parentPath": "spacing",
            "name": "s",
            "tokenType": "dimension",
            "value": {"default": 1}
        }),
    );
    assert!(matches!(result, Err(TokenTreeError::DuplicateNode { .. })));
}

#[test]
fn test_add_token_with_disallowed_mode_is_rejected() {
    let mut engine = engine_with(sample_document());
    let result = engine.run_mutation(
        "addToken",
        &json!({
            "parentPath": "theme.colors",
            "name": "accent",
            "tokenType": "color",
            "value": {"sepia": "#704214"}
        }),
    );
    assert!(matches!(
        result,
        Err(TokenTreeError::InvalidMutation { .. })
    ));
}

#[test]
fn test_add_token_restores_broken_referrers() {
    let mut engine = engine_with(json!({
        "broken": {"$type": "color", "$value": {"default": {"$alias": "late"}}}
    }));
    assert!(matches!(
        engine.state().token(&TreePath::parse("broken")),
        Some(TokenSlot::UnresolvableToken(_))
    ));

    engine
        .run_mutation(
            "addToken",
            &json!({"name": "late", "tokenType": "color", "value": {"default": "#224466"}}),
        )
        .unwrap();
    match engine.state().token(&TreePath::parse("broken")).unwrap() {
        TokenSlot::Token(token) => assert!(token.is_fully_resolvable()),
        other => panic!("expected promotion back to Token, got {:?}", other),
    }
}

#[test]
fn test_nested_collection_is_rejected() {
    let mut engine = engine_with(sample_document());
    let result = engine.run_mutation(
        "addCollection",
        &json!({"parentPath": "theme.colors", "name": "inner", "modes": ["a"]}),
    );
    assert!(matches!(
        result,
        Err(TokenTreeError::InvalidMutation { .. })
    ));
}

// ---------------------------------------------------------------------------
// rename commands
// ---------------------------------------------------------------------------

#[test]
fn test_rename_collection_moves_descendants_and_rewrites_aliases() {
    let mut engine = engine_with(sample_document());
    engine
        .run_mutation("renameCollection", &json!({"path": "theme", "newName": "brand"}))
        .unwrap();

    assert!(engine.state().collection(&TreePath::parse("brand")).is_some());
    assert!(engine.state().collection(&TreePath::parse("theme")).is_none());
    assert!(engine
        .state()
        .token(&TreePath::parse("brand.colors.surface"))
        .is_some());

    // Aliases into the renamed subtree follow it; the tree stays fully
    // resolvable.
    match engine
        .state()
        .token(&TreePath::parse("brand.colors.surface"))
        .unwrap()
    {
        TokenSlot::Token(token) => {
            assert!(token.is_fully_resolvable());
            assert!(token
                .alias_parts
                .iter()
                .all(|part| part.target_path == TreePath::parse("brand.colors.base")));
        }
        other => panic!("expected live token, got {:?}", other),
    }
    // The raw value's alias string was rewritten too.
    let rendered = engine.render();
    assert_eq!(
        rendered["brand"]["colors"]["surface"]["$value"]["light"],
        json!({"$alias": "brand.colors.base"})
    );
}

#[test]
fn test_rename_token_updates_referrers() {
    let mut engine = engine_with(sample_document());
    engine
        .run_mutation(
            "renameToken",
            &json!({"path": "theme.colors.base", "newName": "root"}),
        )
        .unwrap();
    match engine
        .state()
        .token(&TreePath::parse("theme.colors.surface"))
        .unwrap()
    {
        TokenSlot::Token(token) => {
            assert!(token.is_fully_resolvable());
            assert!(token
                .alias_parts
                .iter()
                .all(|part| part.target_path == TreePath::parse("theme.colors.root")));
        }
        other => panic!("expected live token, got {:?}", other),
    }
}

#[test]
fn test_rename_to_occupied_name_is_rejected() {
    let mut engine = engine_with(sample_document());
    let result = engine.run_mutation(
        "renameToken",
        &json!({"path": "spacing.s", "newName": "m"}),
    );
    assert!(matches!(result, Err(TokenTreeError::DuplicateNode { .. })));
}

// ---------------------------------------------------------------------------
// delete commands
// ---------------------------------------------------------------------------

#[test]
fn test_delete_token_demotes_referrers() {
    let mut engine = engine_with(sample_document());
    engine
        .run_mutation("deleteToken", &json!({"path": "theme.colors.base"}))
        .unwrap();
    match engine
        .state()
        .token(&TreePath::parse("theme.colors.surface"))
        .unwrap()
    {
        TokenSlot::UnresolvableToken(token) => {
            assert_eq!(token.broken_target, TreePath::parse("theme.colors.base"));
        }
        other => panic!("expected demotion, got {:?}", other),
    }
}

#[test]
fn test_delete_collection_cascades_to_descendants() {
    let mut engine = engine_with(sample_document());
    engine
        .run_mutation("deleteCollection", &json!({"path": "theme"}))
        .unwrap();
    assert!(engine.state().node(&TreePath::parse("theme")).is_none());
    assert!(engine
        .state()
        .node(&TreePath::parse("theme.colors.base"))
        .is_none());
    // The loose group survives.
    assert!(engine.state().group(&TreePath::parse("spacing")).is_some());
}

#[test]
fn test_truncate_group_keeps_the_node() {
    let mut engine = engine_with(sample_document());
    engine
        .run_mutation("truncateGroup", &json!({"path": "spacing"}))
        .unwrap();
    assert!(engine.state().group(&TreePath::parse("spacing")).is_some());
    assert!(engine.state().token(&TreePath::parse("spacing.s")).is_none());
}

// ---------------------------------------------------------------------------
// value and mode commands
// ---------------------------------------------------------------------------

#[test]
fn test_update_token_value_revalidates_schema() {
    let mut engine = engine_with(sample_document());
    let result = engine.run_mutation(
        "updateTokenValue",
        &json!({"path": "spacing.s", "value": {"default": "not-a-number"}}),
    );
    assert!(matches!(
        result,
        Err(TokenTreeError::SchemaValidation { .. })
    ));

    engine
        .run_mutation(
            "updateTokenValue",
            &json!({"path": "spacing.s", "value": {"default": 10}}),
        )
        .unwrap();
    assert_eq!(
        engine.render()["spacing"]["s"]["$value"]["default"],
        json!(10)
    );
}

#[test]
fn test_resolve_token_value_aliases_inlines_targets() {
    let mut engine = engine_with(sample_document());
    engine
        .run_mutation(
            "resolveTokenValueAliases",
            &json!({"path": "theme.colors.surface"}),
        )
        .unwrap();
    let rendered = engine.render();
    assert_eq!(
        rendered["theme"]["colors"]["surface"]["$value"],
        json!({"light": "#ffffff", "dark": "#111111"})
    );
}

#[test]
fn test_resolve_aliases_on_unresolvable_token_fails() {
    let mut engine = engine_with(json!({
        "broken": {"$type": "color", "$value": {"default": {"$alias": "ghost"}}}
    }));
    let result = engine.run_mutation("resolveTokenValueAliases", &json!({"path": "broken"}));
    assert!(matches!(result, Err(TokenTreeError::Unresolvable { .. })));
}

#[test]
fn test_create_and_delete_token_mode_value() {
    let mut engine = engine_with(sample_document());
    engine
        .run_mutation(
            "createTokenModeValue",
            &json!({"path": "spacing.s", "mode": "compact", "value": 4}),
        )
        .unwrap();
    assert_eq!(
        engine.render()["spacing"]["s"]["$value"],
        json!({"compact": 4, "default": 8})
    );

    engine
        .run_mutation(
            "deleteTokenModeValue",
            &json!({"path": "spacing.s", "mode": "compact"}),
        )
        .unwrap();
    assert_eq!(
        engine.render()["spacing"]["s"]["$value"],
        json!({"default": 8})
    );

    // The last mode cannot be deleted.
    let result = engine.run_mutation(
        "deleteTokenModeValue",
        &json!({"path": "spacing.s", "mode": "default"}),
    );
    assert!(matches!(
        result,
        Err(TokenTreeError::InvalidMutation { .. })
    ));
}

#[test]
fn test_rename_collection_mode_updates_tokens_and_references() {
    let mut engine = engine_with(sample_document());
    engine
        .run_mutation(
            "renameCollectionMode",
            &json!({"path": "theme", "mode": "dark", "newName": "night"}),
        )
        .unwrap();

    let collection = engine.state().collection(&TreePath::parse("theme")).unwrap();
    assert_eq!(collection.allowed_modes, vec!["light", "night"]);

    match engine
        .state()
        .token(&TreePath::parse("theme.colors.surface"))
        .unwrap()
    {
        TokenSlot::Token(token) => {
            assert!(token.values.contains_key("night"));
            assert!(!token.values.contains_key("dark"));
            assert!(token.is_fully_resolvable());
        }
        other => panic!("expected live token, got {:?}", other),
    }
    // The explicit "$mode" reference followed the rename.
    assert_eq!(
        engine.render()["theme"]["colors"]["surface"]["$value"]["night"],
        json!({"$alias": "theme.colors.base", "$mode": "night"})
    );
}

#[test]
fn test_delete_collection_mode_strips_token_values() {
    let mut engine = engine_with(sample_document());
    engine
        .run_mutation(
            "deleteCollectionMode",
            &json!({"path": "theme", "mode": "dark"}),
        )
        .unwrap();
    let collection = engine.state().collection(&TreePath::parse("theme")).unwrap();
    assert_eq!(collection.allowed_modes, vec!["light"]);
    match engine
        .state()
        .token(&TreePath::parse("theme.colors.base"))
        .unwrap()
    {
        TokenSlot::Token(token) => {
            assert!(!token.values.contains_key("dark"));
            assert!(token.values.contains_key("light"));
        }
        other => panic!("expected live token, got {:?}", other),
    }
    // The last mode is protected.
    let result = engine.run_mutation(
        "deleteCollectionMode",
        &json!({"path": "theme", "mode": "light"}),
    );
    assert!(matches!(
        result,
        Err(TokenTreeError::InvalidMutation { .. })
    ));
}

#[test]
fn test_update_description_and_extensions() {
    let mut engine = engine_with(sample_document());
    engine
        .run_mutation(
            "updateTokenDescription",
            &json!({"path": "spacing.s", "description": "Small step"}),
        )
        .unwrap();
    engine
        .run_mutation(
            "updateGroupExtensions",
            &json!({"path": "spacing", "extensions": {"sourceIds": ["sketch-7"]}}),
        )
        .unwrap();
    let rendered = engine.render();
    assert_eq!(rendered["spacing"]["s"]["$description"], json!("Small step"));
    assert_eq!(
        rendered["spacing"]["$extensions"],
        json!({"sourceIds": ["sketch-7"]})
    );

    // Clearing with null removes the key from the rendered document.
    engine
        .run_mutation(
            "updateTokenDescription",
            &json!({"path": "spacing.s", "description": null}),
        )
        .unwrap();
    assert!(engine.render()["spacing"]["s"].get("$description").is_none());
}
