//! Type registry contract
//!
//! The catalog of per-type value schemas (~40 token types) is an external
//! collaborator. The engine consumes it through the `TypeRegistry` trait
//! only: one definition per type name, carrying the aliasable and
//! resolved value schemas plus the structural mapping of value sub-paths
//! to nested types.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use jsonschema::Validator;
use serde::{Deserialize, Serialize};
use tokenweave_core_types::{ValuePath, ValueSegment};

use crate::errors::{Result, TokenTreeError};

/// Wildcard key in a type mapping, matching any object key or array index
pub const MAPPING_WILDCARD: &str = "*";

/// Structural mapping of value sub-paths to nested token types
///
/// A composite type (e.g. a shadow embedding a color and a dimension)
/// declares which token type is expected at each position of its value,
/// so the analyzer can check that an alias placed at a sub-path targets a
/// token of the matching type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeMapping {
    /// Leaf: the expected token type at this position
    Type(String),
    /// Composite: one mapping per member key; the `*` key matches any
    /// member or array index
    Object(BTreeMap<String, TypeMapping>),
}

impl TypeMapping {
    fn descend(&self, segment: &ValueSegment) -> Option<&TypeMapping> {
        match self {
            TypeMapping::Type(_) => None,
            TypeMapping::Object(members) => match segment {
                ValueSegment::Key(key) => {
                    members.get(key).or_else(|| members.get(MAPPING_WILDCARD))
                }
                ValueSegment::Index(_) => members.get(MAPPING_WILDCARD),
            },
        }
    }
}

/// One entry of the external type catalog, as consumed by the engine
pub struct TypeDefinition {
    type_name: String,
    aliasable_schema: Validator,
    resolved_schema: Validator,
    type_mapping: TypeMapping,
}

impl fmt::Debug for TypeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDefinition")
            .field("type_name", &self.type_name)
            .field("type_mapping", &self.type_mapping)
            .finish_non_exhaustive()
    }
}

impl TypeDefinition {
    /// Compile a definition from its raw schemas
    ///
    /// # Errors
    ///
    /// Returns `Serialization` when either schema is not a valid JSON
    /// schema.
    pub fn new(
        type_name: impl Into<String>,
        aliasable_schema: &serde_json::Value,
        resolved_schema: &serde_json::Value,
        type_mapping: TypeMapping,
    ) -> Result<Self> {
        let type_name = type_name.into();
        let aliasable_schema = compile_schema(&type_name, aliasable_schema)?;
        let resolved_schema = compile_schema(&type_name, resolved_schema)?;
        Ok(Self {
            type_name,
            aliasable_schema,
            resolved_schema,
            type_mapping,
        })
    }

    /// The type name this definition describes
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The structural mapping of value sub-paths to nested types
    pub fn type_mapping(&self) -> &TypeMapping {
        &self.type_mapping
    }

    /// Validate a raw mode value that may still contain alias signatures
    ///
    /// Returns one formatted finding per failing position, empty when the
    /// value conforms.
    pub fn check_aliasable(&self, value: &serde_json::Value) -> Vec<String> {
        collect_schema_errors(&self.aliasable_schema, value)
    }

    /// Validate a mode value after every alias was substituted
    pub fn check_resolved(&self, value: &serde_json::Value) -> Vec<String> {
        collect_schema_errors(&self.resolved_schema, value)
    }

    /// Check that a token of type `type_name` may be referenced at
    /// `value_path` inside a value of this definition's type
    ///
    /// The root path expects the definition's own type; deeper paths walk
    /// the structural mapping.
    pub fn match_type_against_mapping(&self, type_name: &str, value_path: &ValuePath) -> bool {
        let mut mapping = &self.type_mapping;
        for segment in value_path.segments() {
            match mapping.descend(segment) {
                Some(next) => mapping = next,
                None => return false,
            }
        }
        match mapping {
            TypeMapping::Type(expected) => expected == type_name,
            // A whole composite value may only be aliased to a token of
            // the same composite type.
            TypeMapping::Object(_) => type_name == self.type_name,
        }
    }
}

fn compile_schema(type_name: &str, schema: &serde_json::Value) -> Result<Validator> {
    jsonschema::validator_for(schema).map_err(|err| TokenTreeError::Serialization {
        message: format!("invalid schema for type '{}': {}", type_name, err),
    })
}

fn collect_schema_errors(validator: &Validator, value: &serde_json::Value) -> Vec<String> {
    validator
        .iter_errors(value)
        .map(|err| {
            let pointer = err.instance_path().to_string();
            if pointer.is_empty() {
                err.to_string()
            } else {
                format!("at '{}': {}", pointer, err)
            }
        })
        .collect()
}

/// The type catalog contract consumed by the engine
pub trait TypeRegistry {
    /// Look up the definition of a type name, None when unknown
    fn definition(&self, type_name: &str) -> Option<&TypeDefinition>;
}

/// HashMap-backed registry, the stock `TypeRegistry` implementation
///
/// The production catalog lives outside this crate; this container is
/// what callers populate with the definitions their documents need.
#[derive(Debug, Default)]
pub struct InMemoryTypeRegistry {
    definitions: HashMap<String, TypeDefinition>,
}

impl InMemoryTypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition under its type name
    pub fn register(&mut self, definition: TypeDefinition) {
        self.definitions
            .insert(definition.type_name().to_string(), definition);
    }

    /// Number of registered definitions
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl TypeRegistry for InMemoryTypeRegistry {
    fn definition(&self, type_name: &str) -> Option<&TypeDefinition> {
        self.definitions.get(type_name)
    }
}

/// Ready-made definitions for tests and examples
///
/// The production catalog is an external collaborator; these fixtures
/// give the test suites a small, representative slice of it: two
/// primitive types and one composite type with a structural mapping.
pub mod test_support {
    use serde_json::json;

    use super::{InMemoryTypeRegistry, TypeDefinition, TypeMapping};

    /// Schema fragment accepting either a concrete value or an alias
    /// signature
    fn aliasable(concrete: serde_json::Value) -> serde_json::Value {
        json!({
            "anyOf": [
                concrete,
                {
                    "type": "object",
                    "required": ["$alias"],
                    "properties": {
                        "$alias": {"type": "string", "minLength": 1},
                        "$mode": {"type": "string", "minLength": 1}
                    },
                    "additionalProperties": false
                }
            ]
        })
    }

    /// A `color` definition: resolved values are `#rrggbb` strings
    pub fn color_definition() -> TypeDefinition {
        let resolved = json!({"type": "string", "pattern": "^#[0-9a-fA-F]{6}$"});
        TypeDefinition::new(
            "color",
            &aliasable(resolved.clone()),
            &resolved,
            TypeMapping::Type("color".to_string()),
        )
        .expect("static color schema compiles")
    }

    /// A `dimension` definition: resolved values are numbers
    pub fn dimension_definition() -> TypeDefinition {
        let resolved = json!({"type": "number"});
        TypeDefinition::new(
            "dimension",
            &aliasable(resolved.clone()),
            &resolved,
            TypeMapping::Type("dimension".to_string()),
        )
        .expect("static dimension schema compiles")
    }

    /// A composite `shadow` definition embedding a color and a dimension
    pub fn shadow_definition() -> TypeDefinition {
        let resolved = json!({
            "type": "object",
            "required": ["color", "blur"],
            "properties": {
                "color": {"type": "string", "pattern": "^#[0-9a-fA-F]{6}$"},
                "blur": {"type": "number"}
            },
            "additionalProperties": false
        });
        let aliasable_schema = json!({
            "type": "object",
            "required": ["color", "blur"],
            "additionalProperties": false,
            "properties": {
                "color": aliasable(json!({"type": "string", "pattern": "^#[0-9a-fA-F]{6}$"})),
                "blur": aliasable(json!({"type": "number"}))
            }
        });
        let mapping = [
            ("color".to_string(), TypeMapping::Type("color".to_string())),
            ("blur".to_string(), TypeMapping::Type("dimension".to_string())),
        ]
        .into_iter()
        .collect();
        TypeDefinition::new(
            "shadow",
            &aliasable_schema,
            &resolved,
            TypeMapping::Object(mapping),
        )
        .expect("static shadow schema compiles")
    }

    /// Registry holding the color and dimension definitions
    pub fn registry_with_color_and_dimension() -> InMemoryTypeRegistry {
        let mut registry = InMemoryTypeRegistry::new();
        registry.register(color_definition());
        registry.register(dimension_definition());
        registry
    }

    /// Registry holding color, dimension, and the composite shadow
    pub fn full_registry() -> InMemoryTypeRegistry {
        let mut registry = registry_with_color_and_dimension();
        registry.register(shadow_definition());
        registry
    }
}
