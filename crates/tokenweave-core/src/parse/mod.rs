//! Parser & analyzer
//!
//! Turns a raw nested document into analyzed node parameters:
//!
//! - `document` — classification, naming/mode validation, aggregated
//!   violation reporting
//! - `analyze` — per-token, per-mode decomposition into primitive and
//!   alias parts, schema and mapping checks
//! - `resolvability` — the cycle-safe dependency walk populating the
//!   per-mode resolvability maps

pub mod analyze;
pub mod document;
pub mod resolvability;

pub use document::{
    parse_document, AnalyzedDocument, AnalyzedToken, CollectionParams, GroupParams,
};
pub use resolvability::{PairKey, ResolvabilityGraph};
