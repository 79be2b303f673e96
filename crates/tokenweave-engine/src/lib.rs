//! Tokenweave Engine - queries, mutations, and views over the core tree
//!
//! This crate layers the interactive surfaces on top of
//! `tokenweave-core`:
//! - The declarative query engine (`{where: ...}` ASTs with recursive
//!   `andWhere` narrowing and a continuity check)
//! - The mutation engine (a fixed catalog of named, schema-validated
//!   commands with validate-then-apply atomicity)
//! - View state (named, persisted queries with one active view) and the
//!   engine metadata persistence shape
//! - The `TokenTreeEngine` facade owning one tree

pub mod engine;
pub mod mutation;
pub mod query;
pub mod views;

// Re-export commonly used types
pub use engine::TokenTreeEngine;
pub use mutation::{catalog, MutationDefinition};
pub use query::{compute_is_continuous_nodes_graph, run_query, TokensQuery};
pub use views::{EngineMetadata, ViewMetadata, ViewsState};
