//! Node projections and document rendering
//!
//! Two projections exist for token-shaped output: the *common* projection
//! used when reassembling a document (an `UnresolvableToken` serializes
//! distinctly, as `{"$alias": "<broken target path>"}`), and the
//! *token-shaped* projection used in query results (an
//! `UnresolvableToken` serializes as `null`).

use serde_json::{Map, Value};

use crate::model::{CollectionState, Extensions, GroupState, NodeRef, TokenSlot, TokenState};
use crate::parse::document::{DESCRIPTION_KEY, EXTENSIONS_KEY, MODES_KEY, TYPE_KEY, VALUE_KEY};
use crate::state::TreeNodesState;
use crate::values::ALIAS_KEY;

fn extensions_value(extensions: &Extensions) -> Value {
    Value::Object(
        extensions
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
    )
}

fn push_common_keys(object: &mut Map<String, Value>, description: &Option<String>, extensions: &Option<Extensions>) {
    if let Some(description) = description {
        object.insert(DESCRIPTION_KEY.to_string(), Value::String(description.clone()));
    }
    if let Some(extensions) = extensions {
        object.insert(EXTENSIONS_KEY.to_string(), extensions_value(extensions));
    }
}

fn token_object(token: &TokenState) -> Value {
    let mut object = Map::new();
    object.insert(TYPE_KEY.to_string(), Value::String(token.token_type.clone()));
    object.insert(
        VALUE_KEY.to_string(),
        Value::Object(
            token
                .values
                .iter()
                .map(|(mode, value)| (mode.clone(), value.clone()))
                .collect(),
        ),
    );
    push_common_keys(&mut object, &token.common.description, &token.common.extensions);
    Value::Object(object)
}

fn group_object(group: &GroupState) -> Value {
    let mut object = Map::new();
    push_common_keys(&mut object, &group.common.description, &group.common.extensions);
    Value::Object(object)
}

fn collection_object(collection: &CollectionState) -> Value {
    let mut object = Map::new();
    object.insert(
        MODES_KEY.to_string(),
        Value::Array(
            collection
                .allowed_modes
                .iter()
                .map(|mode| Value::String(mode.clone()))
                .collect(),
        ),
    );
    push_common_keys(
        &mut object,
        &collection.common.description,
        &collection.common.extensions,
    );
    Value::Object(object)
}

/// The projection used when reassembling a document
///
/// An `UnresolvableToken` keeps only a pointer at its broken target.
pub fn common_projection(node: NodeRef<'_>) -> Value {
    match node {
        NodeRef::Token(token) => token_object(token),
        NodeRef::UnresolvableToken(token) => {
            let mut object = Map::new();
            object.insert(
                ALIAS_KEY.to_string(),
                Value::String(token.broken_target.to_string()),
            );
            Value::Object(object)
        }
        NodeRef::Group(group) => group_object(group),
        NodeRef::Collection(collection) => collection_object(collection),
    }
}

/// The token-shaped projection used in query results
///
/// An `UnresolvableToken` serializes as `null`.
pub fn token_projection(slot: &TokenSlot) -> Value {
    match slot {
        TokenSlot::Token(token) => token_object(token),
        TokenSlot::UnresolvableToken(_) => Value::Null,
    }
}

/// The projection of any node for query output
pub fn node_projection(node: NodeRef<'_>) -> Value {
    match node {
        NodeRef::Token(token) => token_object(token),
        NodeRef::UnresolvableToken(_) => Value::Null,
        NodeRef::Group(group) => group_object(group),
        NodeRef::Collection(collection) => collection_object(collection),
    }
}

/// Reassemble the nested document from the current node set
///
/// For any alias-free valid document, parsing and rendering round-trips
/// modulo key ordering.
pub fn render_document(state: &TreeNodesState) -> Value {
    let mut root = Map::new();
    for node in state.list_nodes() {
        let Value::Object(projection) = common_projection(node) else {
            continue;
        };
        insert_at(&mut root, node.path().segments(), projection);
    }
    Value::Object(root)
}

fn insert_at(root: &mut Map<String, Value>, segments: &[String], projection: Map<String, Value>) {
    let Some((name, ancestors)) = segments.split_last() else {
        return;
    };
    let mut current = root;
    for segment in ancestors {
        let entry = current
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        match entry.as_object_mut() {
            Some(next) => current = next,
            // A non-container ancestor cannot hold children; nodes are
            // inserted parents-first so this only happens on a
            // discontinuous set, where the child is dropped.
            None => return,
        }
    }
    match current.get_mut(name).and_then(Value::as_object_mut) {
        Some(existing) => existing.extend(projection),
        None => {
            current.insert(name.clone(), Value::Object(projection));
        }
    }
}
