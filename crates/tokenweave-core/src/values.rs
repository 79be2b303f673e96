//! Token value plumbing
//!
//! Helpers shared by the analyzer, the builders, and the mutation
//! catalog: alias-signature detection inside raw values, and deep
//! get/set along a `ValuePath` restricted to owned JSON containers.

use serde_json::Value;
use tokenweave_core_types::{TreePath, ValuePath, ValueSegment};

use crate::errors::{Result, TokenTreeError};

/// Key of an alias signature object
pub const ALIAS_KEY: &str = "$alias";
/// Optional mode key of an alias signature object
pub const ALIAS_MODE_KEY: &str = "$mode";

/// Keys the deep setter refuses outright, whatever the document says
const FORBIDDEN_KEYS: [&str; 3] = ["__proto__", "prototype", "constructor"];

/// A detected alias signature inside a token value
#[derive(Debug, Clone, PartialEq)]
pub struct AliasSignature {
    /// Path of the referenced token
    pub target_path: TreePath,
    /// Requested mode; None means "same mode as the referrer"
    pub target_mode: Option<String>,
}

impl AliasSignature {
    /// Serialize the signature back into its document form
    pub fn to_value(&self) -> Value {
        let mut object = serde_json::Map::new();
        object.insert(
            ALIAS_KEY.to_string(),
            Value::String(self.target_path.to_string()),
        );
        if let Some(mode) = &self.target_mode {
            object.insert(ALIAS_MODE_KEY.to_string(), Value::String(mode.clone()));
        }
        Value::Object(object)
    }
}

/// Detect a well-formed alias signature: `{"$alias": "<path>"}` with an
/// optional `"$mode"` and nothing else
///
/// Returns None for every other shape, including malformed signatures;
/// the analyzer reports those separately via [`is_malformed_signature`].
pub fn as_alias_signature(value: &Value) -> Option<AliasSignature> {
    let object = value.as_object()?;
    let target = object.get(ALIAS_KEY)?.as_str()?;
    if target.is_empty() {
        return None;
    }
    let target_mode = match object.get(ALIAS_MODE_KEY) {
        None => None,
        Some(Value::String(mode)) if !mode.is_empty() => Some(mode.clone()),
        Some(_) => return None,
    };
    let expected_len = 1 + usize::from(target_mode.is_some());
    if object.len() != expected_len {
        return None;
    }
    Some(AliasSignature {
        target_path: TreePath::parse(target),
        target_mode,
    })
}

/// True when an object mentions the alias key without forming a valid
/// signature (stray members, non-string target, empty path)
pub fn is_malformed_signature(value: &Value) -> bool {
    match value.as_object() {
        Some(object) => object.contains_key(ALIAS_KEY) && as_alias_signature(value).is_none(),
        None => false,
    }
}

/// Read the value at a position, None when the path does not exist
pub fn value_at_path<'a>(value: &'a Value, path: &ValuePath) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.segments() {
        current = match segment {
            ValueSegment::Key(key) => current.as_object()?.get(key)?,
            ValueSegment::Index(index) => current.as_array()?.get(*index)?,
        };
    }
    Some(current)
}

/// Replace the value at a position, recursing only through owned JSON
/// containers
///
/// The root path replaces the whole value. Reserved, prototype-like keys
/// are rejected outright, as is any attempt to traverse a scalar or an
/// absent position — those are design errors in the caller, never
/// repaired in place.
///
/// # Errors
///
/// Returns `InternalDesign` on a forbidden key, a missing position, or a
/// traversal through a non-container.
pub fn set_value_at_path(value: &mut Value, path: &ValuePath, new_value: Value) -> Result<()> {
    let Some((first, rest)) = path.segments().split_first() else {
        *value = new_value;
        return Ok(());
    };

    match first {
        ValueSegment::Key(key) => {
            if FORBIDDEN_KEYS.contains(&key.as_str()) {
                return Err(TokenTreeError::InternalDesign {
                    message: format!("refusing to set reserved key '{}'", key),
                });
            }
            let object = value
                .as_object_mut()
                .ok_or_else(|| traversal_error(path, "an object"))?;
            let slot = object
                .get_mut(key)
                .ok_or_else(|| missing_error(path, key))?;
            set_value_at_path(slot, &ValuePath::new(rest.to_vec()), new_value)
        }
        ValueSegment::Index(index) => {
            let array = value
                .as_array_mut()
                .ok_or_else(|| traversal_error(path, "an array"))?;
            let slot = array
                .get_mut(*index)
                .ok_or_else(|| missing_error(path, &index.to_string()))?;
            set_value_at_path(slot, &ValuePath::new(rest.to_vec()), new_value)
        }
    }
}

fn traversal_error(path: &ValuePath, expected: &str) -> TokenTreeError {
    TokenTreeError::InternalDesign {
        message: format!("cannot descend '{}': not {}", path, expected),
    }
}

fn missing_error(path: &ValuePath, segment: &str) -> TokenTreeError {
    TokenTreeError::InternalDesign {
        message: format!("cannot descend '{}': '{}' is absent", path, segment),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_detects_plain_signature() {
        let signature = as_alias_signature(&json!({"$alias": "colors.primary"})).unwrap();
        assert_eq!(signature.target_path, TreePath::parse("colors.primary"));
        assert_eq!(signature.target_mode, None);
    }

    #[test]
    fn test_detects_signature_with_mode() {
        let signature =
            as_alias_signature(&json!({"$alias": "colors.primary", "$mode": "dark"})).unwrap();
        assert_eq!(signature.target_mode.as_deref(), Some("dark"));
    }

    #[test]
    fn test_rejects_non_signatures() {
        assert!(as_alias_signature(&json!("#ffffff")).is_none());
        assert!(as_alias_signature(&json!({"$alias": ""})).is_none());
        assert!(as_alias_signature(&json!({"$alias": "a", "extra": 1})).is_none());
        assert!(as_alias_signature(&json!({"$alias": "a", "$mode": 2})).is_none());
    }

    #[test]
    fn test_malformed_signature_detection() {
        assert!(is_malformed_signature(&json!({"$alias": "a", "extra": 1})));
        assert!(is_malformed_signature(&json!({"$alias": 42})));
        assert!(!is_malformed_signature(&json!({"$alias": "a"})));
        assert!(!is_malformed_signature(&json!({"color": "#fff"})));
    }

    #[test]
    fn test_signature_round_trip() {
        let raw = json!({"$alias": "a.b", "$mode": "dark"});
        assert_eq!(as_alias_signature(&raw).unwrap().to_value(), raw);
    }

    #[test]
    fn test_value_at_path_mixed() {
        let value = json!({"shadows": [{"color": "#000000"}]});
        let path = ValuePath::root().join("shadows").join(0).join("color");
        assert_eq!(value_at_path(&value, &path), Some(&json!("#000000")));
        assert_eq!(value_at_path(&value, &ValuePath::root().join("blur")), None);
    }

    #[test]
    fn test_set_value_at_root_replaces_whole_value() {
        let mut value = json!({"a": 1});
        set_value_at_path(&mut value, &ValuePath::root(), json!("x")).unwrap();
        assert_eq!(value, json!("x"));
    }

    #[test]
    fn test_set_value_deep() {
        let mut value = json!({"shadows": [{"color": "#000000"}]});
        let path = ValuePath::root().join("shadows").join(0).join("color");
        set_value_at_path(&mut value, &path, json!("#ffffff")).unwrap();
        assert_eq!(value, json!({"shadows": [{"color": "#ffffff"}]}));
    }

    #[test]
    fn test_set_value_rejects_reserved_keys() {
        let mut value = json!({"__proto__": {}});
        let result =
            set_value_at_path(&mut value, &ValuePath::root().join("__proto__"), json!(1));
        assert!(matches!(
            result,
            Err(TokenTreeError::InternalDesign { .. })
        ));
    }

    #[test]
    fn test_set_value_rejects_scalar_traversal() {
        let mut value = json!("scalar");
        let result = set_value_at_path(&mut value, &ValuePath::root().join("a"), json!(1));
        assert!(matches!(
            result,
            Err(TokenTreeError::InternalDesign { .. })
        ));
    }
}
