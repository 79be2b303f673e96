//! Raw document parsing
//!
//! Walks the nested document, classifies each entry as token, collection,
//! or group, and validates names, mode lists, and reserved keys. Every
//! violation found anywhere in the document is collected and reported in
//! one aggregated error; nothing is parsed partially.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde_json::Value;
use tokenweave_core_types::{TreePath, PATH_SEPARATOR, RESERVED_PREFIX};

use crate::errors::{Result, TokenTreeError, Violation};
use crate::model::{AliasPart, Extensions, PrimitivePart};
use crate::parse::analyze;
use crate::parse::resolvability::ResolvabilityGraph;
use crate::registry::TypeRegistry;

/// Reserved key declaring a token's type
pub const TYPE_KEY: &str = "$type";
/// Reserved key holding a token's per-mode value map
pub const VALUE_KEY: &str = "$value";
/// Reserved key declaring a collection's allowed modes
pub const MODES_KEY: &str = "$modes";
/// Reserved key for a node description
pub const DESCRIPTION_KEY: &str = "$description";
/// Reserved key for node vendor extensions
pub const EXTENSIONS_KEY: &str = "$extensions";

/// Analyzed parameters of a group entry
#[derive(Debug, Clone, PartialEq)]
pub struct GroupParams {
    pub path: TreePath,
    pub description: Option<String>,
    pub extensions: Option<Extensions>,
}

/// Analyzed parameters of a collection entry
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionParams {
    pub path: TreePath,
    pub allowed_modes: Vec<String>,
    pub description: Option<String>,
    pub extensions: Option<Extensions>,
}

/// Analyzed-but-unbuilt token parameters
///
/// This is the pool the builders materialize nodes from; a token stays
/// here until `find_or_register_token_state` is asked for its path.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzedToken {
    pub path: TreePath,
    pub token_type: String,
    pub values: BTreeMap<String, Value>,
    pub description: Option<String>,
    pub extensions: Option<Extensions>,
    pub primitive_parts: Vec<PrimitivePart>,
    pub alias_parts: Vec<AliasPart>,
    pub is_top_level_alias: bool,
    pub modes_resolvability: BTreeMap<String, bool>,
    /// Set when an alias part references a path absent from the document;
    /// the builders demote such a token to `UnresolvableToken`
    pub broken_target: Option<TreePath>,
}

/// Output of a successful parse: analyzed parameters for every node
#[derive(Debug, Clone, Default)]
pub struct AnalyzedDocument {
    /// Tokens keyed by stringified path
    pub tokens: HashMap<String, AnalyzedToken>,
    pub groups: Vec<GroupParams>,
    pub collections: Vec<CollectionParams>,
}

/// Check a mode name against the naming rules
///
/// Returns the reason the name is illegal, or None for a valid name.
pub fn mode_name_violation(mode: &str) -> Option<String> {
    if mode.is_empty() {
        Some("mode name must not be empty".to_string())
    } else if mode.starts_with(RESERVED_PREFIX) {
        Some(format!(
            "mode name '{}' must not start with '{}'",
            mode, RESERVED_PREFIX
        ))
    } else {
        None
    }
}

/// Check a node name against the naming rules
pub fn node_name_violation(name: &str) -> Option<String> {
    if name.is_empty() {
        Some("node name must not be empty".to_string())
    } else if name.contains(PATH_SEPARATOR) {
        Some(format!(
            "node name '{}' contains the path separator '{}'",
            name, PATH_SEPARATOR
        ))
    } else {
        None
    }
}

/// Parse and analyze a raw document
///
/// Runs classification, naming/mode validation, per-token alias analysis,
/// and the resolvability pass. Any schema or naming violation aborts the
/// whole parse and reports **every** violation found, each tagged with
/// its tree path. Unresolvable aliases do not abort parsing; they are
/// recorded on the analyzed token instead.
///
/// # Errors
///
/// Returns `SchemaValidation` carrying the aggregated violations.
pub fn parse_document(raw: &Value, registry: &dyn TypeRegistry) -> Result<AnalyzedDocument> {
    let Some(root) = raw.as_object() else {
        return Err(TokenTreeError::schema_validation(vec![Violation::new(
            "",
            "document root must be an object",
        )]));
    };

    let mut doc = AnalyzedDocument::default();
    let mut violations = Vec::new();

    for key in root.keys().filter(|key| key.starts_with(RESERVED_PREFIX)) {
        violations.push(Violation::new(
            "",
            format!("reserved key '{}' is not allowed at the document root", key),
        ));
    }

    walk_children(root, &TreePath::new(Vec::new()), None, registry, &mut doc, &mut violations);
    violations.extend(analyze::analyze_tokens(&mut doc, registry));

    if !violations.is_empty() {
        violations.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.message.cmp(&b.message)));
        tracing::debug!(count = violations.len(), "document rejected");
        return Err(TokenTreeError::schema_validation(violations));
    }

    apply_resolvability(&mut doc);
    tracing::debug!(
        tokens = doc.tokens.len(),
        groups = doc.groups.len(),
        collections = doc.collections.len(),
        "document analyzed"
    );
    Ok(doc)
}

fn walk_children(
    object: &serde_json::Map<String, Value>,
    parent_path: &TreePath,
    collection: Option<&CollectionParams>,
    registry: &dyn TypeRegistry,
    doc: &mut AnalyzedDocument,
    violations: &mut Vec<Violation>,
) {
    for (name, entry) in object {
        if name.starts_with(RESERVED_PREFIX) {
            continue;
        }
        walk_entry(name, entry, parent_path, collection, registry, doc, violations);
    }
}

fn walk_entry(
    name: &str,
    entry: &Value,
    parent_path: &TreePath,
    collection: Option<&CollectionParams>,
    registry: &dyn TypeRegistry,
    doc: &mut AnalyzedDocument,
    violations: &mut Vec<Violation>,
) {
    let path = parent_path.child(name);
    if let Some(reason) = node_name_violation(name) {
        violations.push(Violation::new(path.to_string(), reason));
        return;
    }
    let Some(object) = entry.as_object() else {
        violations.push(Violation::new(path.to_string(), "node entry must be an object"));
        return;
    };

    let is_token = object.contains_key(TYPE_KEY) || object.contains_key(VALUE_KEY);
    let is_collection = object.contains_key(MODES_KEY);
    if is_token && is_collection {
        violations.push(Violation::new(
            path.to_string(),
            "node cannot declare both a token value and a collection mode list",
        ));
        return;
    }

    let description = parse_description(object, &path, violations);
    let extensions = parse_extensions(object, &path, violations);

    if is_token {
        parse_token(object, path, collection, registry, doc, violations, description, extensions);
    } else if is_collection {
        parse_collection(
            object, path, collection, registry, doc, violations, description, extensions,
        );
    } else {
        check_reserved_keys(object, &path, &[DESCRIPTION_KEY, EXTENSIONS_KEY], violations);
        doc.groups.push(GroupParams {
            path: path.clone(),
            description,
            extensions,
        });
        walk_children(object, &path, collection, registry, doc, violations);
    }
}

#[allow(clippy::too_many_arguments)]
fn parse_token(
    object: &serde_json::Map<String, Value>,
    path: TreePath,
    collection: Option<&CollectionParams>,
    registry: &dyn TypeRegistry,
    doc: &mut AnalyzedDocument,
    violations: &mut Vec<Violation>,
    description: Option<String>,
    extensions: Option<Extensions>,
) {
    check_reserved_keys(
        object,
        &path,
        &[TYPE_KEY, VALUE_KEY, DESCRIPTION_KEY, EXTENSIONS_KEY],
        violations,
    );
    for key in object.keys() {
        if !key.starts_with(RESERVED_PREFIX) {
            violations.push(Violation::new(
                path.to_string(),
                format!("token cannot have child entries ('{}')", key),
            ));
        }
    }

    let before = violations.len();

    let token_type = match object.get(TYPE_KEY) {
        Some(Value::String(token_type)) => {
            if registry.definition(token_type).is_none() {
                violations.push(Violation::new(
                    path.to_string(),
                    format!("unknown token type: {}", token_type),
                ));
            }
            Some(token_type.clone())
        }
        Some(_) => {
            violations.push(Violation::new(path.to_string(), "'$type' must be a string"));
            None
        }
        None => {
            violations.push(Violation::new(path.to_string(), "token is missing '$type'"));
            None
        }
    };

    let values = match object.get(VALUE_KEY) {
        Some(Value::Object(modes)) if !modes.is_empty() => {
            let mut values = BTreeMap::new();
            for (mode, value) in modes {
                if let Some(reason) = mode_name_violation(mode) {
                    violations.push(Violation::new(path.to_string(), reason));
                    continue;
                }
                if let Some(ctx) = collection {
                    if !ctx.allowed_modes.iter().any(|allowed| allowed == mode) {
                        violations.push(Violation::new(
                            path.to_string(),
                            format!(
                                "mode '{}' is not allowed by collection '{}'",
                                mode, ctx.path
                            ),
                        ));
                        continue;
                    }
                }
                values.insert(mode.clone(), value.clone());
            }
            Some(values)
        }
        Some(_) => {
            violations.push(Violation::new(
                path.to_string(),
                "'$value' must be a non-empty object keyed by mode",
            ));
            None
        }
        None => {
            violations.push(Violation::new(path.to_string(), "token is missing '$value'"));
            None
        }
    };

    if violations.len() != before {
        return;
    }
    let (Some(token_type), Some(values)) = (token_type, values) else {
        return;
    };

    doc.tokens.insert(
        path.to_string(),
        AnalyzedToken {
            path,
            token_type,
            values,
            description,
            extensions,
            primitive_parts: Vec::new(),
            alias_parts: Vec::new(),
            is_top_level_alias: false,
            modes_resolvability: BTreeMap::new(),
            broken_target: None,
        },
    );
}

#[allow(clippy::too_many_arguments)]
fn parse_collection(
    object: &serde_json::Map<String, Value>,
    path: TreePath,
    enclosing: Option<&CollectionParams>,
    registry: &dyn TypeRegistry,
    doc: &mut AnalyzedDocument,
    violations: &mut Vec<Violation>,
    description: Option<String>,
    extensions: Option<Extensions>,
) {
    check_reserved_keys(
        object,
        &path,
        &[MODES_KEY, DESCRIPTION_KEY, EXTENSIONS_KEY],
        violations,
    );
    if enclosing.is_some() {
        violations.push(Violation::new(
            path.to_string(),
            "collections cannot nest inside collections",
        ));
        return;
    }

    let mut allowed_modes = Vec::new();
    match object.get(MODES_KEY) {
        Some(Value::Array(modes)) if !modes.is_empty() => {
            let mut seen: HashSet<&str> = HashSet::new();
            for (index, mode) in modes.iter().enumerate() {
                match mode.as_str() {
                    None => violations.push(Violation::new(
                        path.to_string(),
                        format!("mode at index {} must be a string", index),
                    )),
                    Some(mode) => {
                        if let Some(reason) = mode_name_violation(mode) {
                            violations.push(Violation::new(
                                path.to_string(),
                                format!("mode at index {}: {}", index, reason),
                            ));
                        } else if !seen.insert(mode) {
                            violations.push(Violation::new(
                                path.to_string(),
                                format!("duplicate mode '{}' at index {}", mode, index),
                            ));
                        } else {
                            allowed_modes.push(mode.to_string());
                        }
                    }
                }
            }
        }
        Some(_) | None => violations.push(Violation::new(
            path.to_string(),
            "'$modes' must be a non-empty array of mode names",
        )),
    }

    if allowed_modes.is_empty() {
        return;
    }

    let params = CollectionParams {
        path: path.clone(),
        allowed_modes,
        description,
        extensions,
    };
    walk_children(object, &path, Some(&params), registry, doc, violations);
    doc.collections.push(params);
}

fn parse_description(
    object: &serde_json::Map<String, Value>,
    path: &TreePath,
    violations: &mut Vec<Violation>,
) -> Option<String> {
    match object.get(DESCRIPTION_KEY) {
        None => None,
        Some(Value::String(description)) => Some(description.clone()),
        Some(_) => {
            violations.push(Violation::new(
                path.to_string(),
                "'$description' must be a string",
            ));
            None
        }
    }
}

fn parse_extensions(
    object: &serde_json::Map<String, Value>,
    path: &TreePath,
    violations: &mut Vec<Violation>,
) -> Option<Extensions> {
    match object.get(EXTENSIONS_KEY) {
        None => None,
        Some(Value::Object(entries)) => Some(Extensions::from(
            entries
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect::<BTreeMap<_, _>>(),
        )),
        Some(_) => {
            violations.push(Violation::new(
                path.to_string(),
                "'$extensions' must be an object",
            ));
            None
        }
    }
}

fn check_reserved_keys(
    object: &serde_json::Map<String, Value>,
    path: &TreePath,
    allowed: &[&str],
    violations: &mut Vec<Violation>,
) {
    for key in object.keys() {
        if key.starts_with(RESERVED_PREFIX) && !allowed.contains(&key.as_str()) {
            violations.push(Violation::new(
                path.to_string(),
                format!("unknown reserved key '{}'", key),
            ));
        }
    }
}

fn apply_resolvability(doc: &mut AnalyzedDocument) {
    let known: HashSet<String> = doc.tokens.keys().cloned().collect();
    let mut graph = ResolvabilityGraph::new();
    for (key, token) in &doc.tokens {
        for mode in token.values.keys() {
            graph.add_pair(key.clone(), mode.clone());
        }
        for part in &token.alias_parts {
            graph.add_edge(
                (key.clone(), part.mode.clone()),
                (part.target_path.to_string(), part.target_mode.clone()),
            );
        }
    }
    let solved = graph.solve();

    for (key, token) in doc.tokens.iter_mut() {
        token.modes_resolvability = token
            .values
            .keys()
            .map(|mode| {
                let resolvable = solved
                    .get(&(key.clone(), mode.clone()))
                    .copied()
                    .unwrap_or(false);
                (mode.clone(), resolvable)
            })
            .collect();
        token.broken_target = token
            .alias_parts
            .iter()
            .find(|part| !known.contains(&part.target_path.to_string()))
            .map(|part| part.target_path.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::test_support::registry_with_color_and_dimension;
    use serde_json::json;

    fn violations_of(result: Result<AnalyzedDocument>) -> Vec<Violation> {
        match result {
            Err(TokenTreeError::SchemaValidation { violations }) => violations,
            other => panic!("expected SchemaValidation, got {:?}", other),
        }
    }

    #[test]
    fn test_parses_token_group_collection() {
        let registry = registry_with_color_and_dimension();
        let raw = json!({
            "theme": {
                "$modes": ["light", "dark"],
                "colors": {
                    "primary": {
                        "$type": "color",
                        "$value": {"light": "#ffffff", "dark": "#000000"}
                    }
                }
            }
        });
        let doc = parse_document(&raw, &registry).unwrap();
        assert_eq!(doc.collections.len(), 1);
        assert_eq!(doc.groups.len(), 1);
        assert!(doc.tokens.contains_key("theme.colors.primary"));
    }

    #[test]
    fn test_name_with_separator_is_rejected_with_path() {
        let registry = registry_with_color_and_dimension();
        let raw = json!({
            "bad.name": {
                "$type": "color",
                "$value": {"default": "#ffffff"}
            }
        });
        let violations = violations_of(parse_document(&raw, &registry));
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("path separator"));
    }

    #[test]
    fn test_collection_mode_violations_reported_per_index() {
        let registry = registry_with_color_and_dimension();
        let raw = json!({
            "theme": {
                "$modes": ["light", "", "$internal", 4]
            }
        });
        let violations = violations_of(parse_document(&raw, &registry));
        let messages: Vec<&str> = violations.iter().map(|v| v.message.as_str()).collect();
        assert!(messages.iter().any(|m| m.contains("index 1")));
        assert!(messages.iter().any(|m| m.contains("index 2")));
        assert!(messages.iter().any(|m| m.contains("index 3")));
    }

    #[test]
    fn test_token_using_mode_outside_collection_set_fails() {
        let registry = registry_with_color_and_dimension();
        let raw = json!({
            "theme": {
                "$modes": ["light", "dark"],
                "accent": {
                    "$type": "color",
                    "$value": {"sepia": "#704214"}
                }
            }
        });
        let violations = violations_of(parse_document(&raw, &registry));
        assert!(violations
            .iter()
            .any(|v| v.path == "theme.accent" && v.message.contains("sepia")));
    }

    #[test]
    fn test_every_violation_is_reported_not_just_the_first() {
        let registry = registry_with_color_and_dimension();
        let raw = json!({
            "a": {"$type": "gradient", "$value": {"default": 1}},
            "b": {"$type": "color", "$value": {}},
            "c.d": {"$type": "color", "$value": {"default": "#ffffff"}}
        });
        let violations = violations_of(parse_document(&raw, &registry));
        assert!(violations.len() >= 3);
        let paths: Vec<&str> = violations.iter().map(|v| v.path.as_str()).collect();
        assert!(paths.contains(&"a"));
        assert!(paths.contains(&"b"));
        assert!(paths.contains(&"c.d"));
    }

    #[test]
    fn test_nested_collection_is_rejected() {
        let registry = registry_with_color_and_dimension();
        let raw = json!({
            "outer": {
                "$modes": ["light"],
                "inner": {
                    "$modes": ["dark"]
                }
            }
        });
        let violations = violations_of(parse_document(&raw, &registry));
        assert!(violations
            .iter()
            .any(|v| v.path == "outer.inner" && v.message.contains("nest")));
    }

    #[test]
    fn test_unresolvable_alias_does_not_abort_parse() {
        let registry = registry_with_color_and_dimension();
        let raw = json!({
            "broken": {
                "$type": "color",
                "$value": {"default": {"$alias": "ghost.token"}}
            }
        });
        let doc = parse_document(&raw, &registry).unwrap();
        let token = &doc.tokens["broken"];
        assert_eq!(token.modes_resolvability.get("default"), Some(&false));
        assert_eq!(token.broken_target, Some(TreePath::parse("ghost.token")));
    }

    #[test]
    fn test_alias_cycle_is_marked_unresolvable_without_looping() {
        let registry = registry_with_color_and_dimension();
        let raw = json!({
            "a": {"$type": "color", "$value": {"default": {"$alias": "b"}}},
            "b": {"$type": "color", "$value": {"default": {"$alias": "a"}}}
        });
        let doc = parse_document(&raw, &registry).unwrap();
        assert_eq!(doc.tokens["a"].modes_resolvability.get("default"), Some(&false));
        assert_eq!(doc.tokens["b"].modes_resolvability.get("default"), Some(&false));
        // Both targets exist, so neither token is demoted.
        assert_eq!(doc.tokens["a"].broken_target, None);
        assert_eq!(doc.tokens["b"].broken_target, None);
    }
}
