//! Core types shared across Tokenweave facilities
//!
//! This crate provides the foundational coordinate types used by the
//! parser, the tree-node registry, the query engine, and the mutation
//! catalog:
//!
//! - **TreePath**: location of a node in the token hierarchy
//! - **ValuePath**: location inside a token's value sub-structure
//! - **Reserved characters**: the path separator and the mode prefix

pub mod tree_path;
pub mod value_path;

pub use tree_path::TreePath;
pub use value_path::{ValuePath, ValueSegment};

/// Separator between path segments in the stringified form of a `TreePath`.
///
/// Node names must never contain this character.
pub const PATH_SEPARATOR: char = '.';

/// Reserved prefix for keys of the document format (`$type`, `$value`,
/// `$modes`, ...). Mode names must never start with this character.
pub const RESERVED_PREFIX: char = '$';
