//! Per-token value analysis
//!
//! Decomposes each mode value into primitive parts (concrete leaves) and
//! alias parts (references to other tokens), validates the raw value
//! against the type's aliasable schema, and checks every alias position
//! against the type's structural mapping.

use std::collections::HashMap;

use serde_json::Value;
use tokenweave_core_types::{TreePath, ValuePath, RESERVED_PREFIX};

use crate::errors::Violation;
use crate::model::{AliasPart, PrimitivePart};
use crate::parse::document::AnalyzedDocument;
use crate::registry::{TypeDefinition, TypeRegistry};
use crate::values;

/// Decomposition of one mode's value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModeAnalysis {
    pub primitive_parts: Vec<PrimitivePart>,
    pub alias_parts: Vec<AliasPart>,
    /// True when the whole mode value is a single alias signature
    pub is_top_level_alias: bool,
}

/// Analyze every token of a parsed document in place
///
/// Returns the violations found; an empty vector means every token value
/// conforms to its aliasable schema and structural mapping.
pub fn analyze_tokens(doc: &mut AnalyzedDocument, registry: &dyn TypeRegistry) -> Vec<Violation> {
    let declared_types: HashMap<String, String> = doc
        .tokens
        .iter()
        .map(|(key, token)| (key.clone(), token.token_type.clone()))
        .collect();
    let lookup_type =
        |path: &TreePath| -> Option<String> { declared_types.get(&path.to_string()).cloned() };

    let mut violations = Vec::new();
    for token in doc.tokens.values_mut() {
        let Some(definition) = registry.definition(&token.token_type) else {
            // Unknown types were already reported by the document walk.
            continue;
        };

        let mut primitive_parts = Vec::new();
        let mut alias_parts = Vec::new();
        let mut all_modes_top_level = !token.values.is_empty();
        for (mode, value) in &token.values {
            let analysis = analyze_mode_value(
                definition,
                &token.path,
                mode,
                value,
                &lookup_type,
                &mut violations,
            );
            all_modes_top_level &= analysis.is_top_level_alias;
            primitive_parts.extend(analysis.primitive_parts);
            alias_parts.extend(analysis.alias_parts);
        }
        token.primitive_parts = primitive_parts;
        token.alias_parts = alias_parts;
        token.is_top_level_alias = all_modes_top_level;
    }
    violations
}

/// Analyze one mode's raw value against a type definition
///
/// `lookup_type` maps a target path to its declared type so alias
/// positions can be checked against the structural mapping; targets it
/// cannot resolve are left to the resolvability pass.
pub fn analyze_mode_value(
    definition: &TypeDefinition,
    token_path: &TreePath,
    mode: &str,
    value: &Value,
    lookup_type: &dyn Fn(&TreePath) -> Option<String>,
    violations: &mut Vec<Violation>,
) -> ModeAnalysis {
    for finding in definition.check_aliasable(value) {
        violations.push(Violation::new(
            token_path.to_string(),
            format!("mode '{}': {}", mode, finding),
        ));
    }

    let mut analysis = ModeAnalysis {
        is_top_level_alias: values::as_alias_signature(value).is_some(),
        ..ModeAnalysis::default()
    };
    decompose(
        definition,
        token_path,
        mode,
        value,
        &ValuePath::root(),
        lookup_type,
        &mut analysis,
        violations,
    );
    analysis
}

#[allow(clippy::too_many_arguments)]
fn decompose(
    definition: &TypeDefinition,
    token_path: &TreePath,
    mode: &str,
    value: &Value,
    value_path: &ValuePath,
    lookup_type: &dyn Fn(&TreePath) -> Option<String>,
    analysis: &mut ModeAnalysis,
    violations: &mut Vec<Violation>,
) {
    if let Some(signature) = values::as_alias_signature(value) {
        let target_mode = signature.target_mode.clone().unwrap_or_else(|| mode.to_string());
        if let Some(target_type) = lookup_type(&signature.target_path) {
            if !definition.match_type_against_mapping(&target_type, value_path) {
                violations.push(Violation::new(
                    token_path.to_string(),
                    format!(
                        "mode '{}': alias at '{}' targets '{}' of type '{}', which does not match the expected type at that position",
                        mode, value_path, signature.target_path, target_type
                    ),
                ));
            }
        }
        analysis.alias_parts.push(AliasPart {
            mode: mode.to_string(),
            value_path: value_path.clone(),
            target_path: signature.target_path,
            target_mode,
        });
        return;
    }
    if values::is_malformed_signature(value) {
        violations.push(Violation::new(
            token_path.to_string(),
            format!("mode '{}': malformed alias signature at '{}'", mode, value_path),
        ));
        return;
    }

    match value {
        Value::Object(members) => {
            for (key, member) in members {
                if key.starts_with(RESERVED_PREFIX) {
                    violations.push(Violation::new(
                        token_path.to_string(),
                        format!(
                            "mode '{}': reserved key '{}' inside value at '{}'",
                            mode, key, value_path
                        ),
                    ));
                    continue;
                }
                decompose(
                    definition,
                    token_path,
                    mode,
                    member,
                    &value_path.join(key.as_str()),
                    lookup_type,
                    analysis,
                    violations,
                );
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                decompose(
                    definition,
                    token_path,
                    mode,
                    item,
                    &value_path.join(index),
                    lookup_type,
                    analysis,
                    violations,
                );
            }
        }
        leaf => analysis.primitive_parts.push(PrimitivePart {
            mode: mode.to_string(),
            value_path: value_path.clone(),
            value: leaf.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::test_support::{full_registry, shadow_definition};
    use crate::registry::TypeRegistry;
    use serde_json::json;

    fn no_types(_: &TreePath) -> Option<String> {
        None
    }

    #[test]
    fn test_scalar_value_is_one_primitive_part() {
        let registry = full_registry();
        let definition = registry.definition("color").unwrap();
        let mut violations = Vec::new();
        let analysis = analyze_mode_value(
            definition,
            &TreePath::parse("a"),
            "light",
            &json!("#ffffff"),
            &no_types,
            &mut violations,
        );
        assert!(violations.is_empty());
        assert_eq!(analysis.primitive_parts.len(), 1);
        assert!(analysis.alias_parts.is_empty());
        assert!(!analysis.is_top_level_alias);
        assert!(analysis.primitive_parts[0].value_path.is_root());
    }

    #[test]
    fn test_top_level_alias_has_root_value_path() {
        let registry = full_registry();
        let definition = registry.definition("color").unwrap();
        let mut violations = Vec::new();
        let analysis = analyze_mode_value(
            definition,
            &TreePath::parse("a"),
            "light",
            &json!({"$alias": "b", "$mode": "dark"}),
            &no_types,
            &mut violations,
        );
        assert!(violations.is_empty());
        assert!(analysis.is_top_level_alias);
        assert_eq!(analysis.alias_parts.len(), 1);
        assert!(analysis.alias_parts[0].value_path.is_root());
        assert_eq!(analysis.alias_parts[0].target_mode, "dark");
    }

    #[test]
    fn test_alias_mode_defaults_to_referring_mode() {
        let registry = full_registry();
        let definition = registry.definition("color").unwrap();
        let mut violations = Vec::new();
        let analysis = analyze_mode_value(
            definition,
            &TreePath::parse("a"),
            "dark",
            &json!({"$alias": "b"}),
            &no_types,
            &mut violations,
        );
        assert_eq!(analysis.alias_parts[0].target_mode, "dark");
    }

    #[test]
    fn test_composite_value_decomposes_into_mixed_parts() {
        let definition = shadow_definition();
        let mut violations = Vec::new();
        let lookup = |path: &TreePath| -> Option<String> {
            (path == &TreePath::parse("colors.primary")).then(|| "color".to_string())
        };
        let analysis = analyze_mode_value(
            &definition,
            &TreePath::parse("elevation.low"),
            "light",
            &json!({"color": {"$alias": "colors.primary"}, "blur": 4}),
            &lookup,
            &mut violations,
        );
        assert!(violations.is_empty(), "unexpected: {:?}", violations);
        assert_eq!(analysis.alias_parts.len(), 1);
        assert_eq!(analysis.primitive_parts.len(), 1);
        assert_eq!(analysis.alias_parts[0].value_path.to_string(), "color");
        assert!(!analysis.is_top_level_alias);
    }

    #[test]
    fn test_alias_with_mismatched_target_type_is_a_violation() {
        let definition = shadow_definition();
        let mut violations = Vec::new();
        let lookup = |path: &TreePath| -> Option<String> {
            (path == &TreePath::parse("space.m")).then(|| "dimension".to_string())
        };
        analyze_mode_value(
            &definition,
            &TreePath::parse("elevation.low"),
            "light",
            &json!({"color": {"$alias": "space.m"}, "blur": 4}),
            &lookup,
            &mut violations,
        );
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("does not match"));
    }

    #[test]
    fn test_aliasable_schema_failures_are_tagged_with_mode() {
        let registry = full_registry();
        let definition = registry.definition("color").unwrap();
        let mut violations = Vec::new();
        analyze_mode_value(
            definition,
            &TreePath::parse("a"),
            "light",
            &json!(42),
            &no_types,
            &mut violations,
        );
        assert!(!violations.is_empty());
        assert!(violations[0].message.starts_with("mode 'light'"));
    }
}
