//! Tokenweave Core - in-memory design-token tree kernel
//!
//! This crate provides the foundational data structures and operations
//! for Tokenweave, including:
//! - Token, Group, Collection, and UnresolvableToken models as a tagged
//!   union over a shared base contract
//! - The type-registry contract consumed from the external type catalog
//! - Document parsing with aggregated, path-tagged violation reporting
//! - Per-token, per-mode alias analysis and cycle-safe resolvability
//! - The tree-node registry with lazy, memoized token construction
//! - Resolved-value computation and document rendering
//!
//! Everything is synchronous and single-threaded; the tree state is a
//! plain mutable object graph owned by one engine instance.

pub mod errors;
pub mod logging_facility;
pub mod model;
pub mod parse;
pub mod registry;
pub mod render;
pub mod state;
pub mod values;

// Re-export commonly used types
pub use errors::{Result, TokenTreeError, Violation};
pub use model::{
    AliasPart, CollectionState, Extensions, GroupState, NodeCommon, NodeKind, NodeRef,
    PrimitivePart, TokenSlot, TokenState, UnresolvableTokenState,
};
pub use parse::{parse_document, AnalyzedDocument, AnalyzedToken};
pub use registry::{InMemoryTypeRegistry, TypeDefinition, TypeMapping, TypeRegistry};
pub use state::{find_or_register_token_state, TreeNodesState};
pub use tokenweave_core_types::{TreePath, ValuePath, ValueSegment, PATH_SEPARATOR, RESERVED_PREFIX};
