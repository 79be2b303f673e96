pub mod ast;
pub mod eval;

pub use ast::{Clause, ClauseKind, DepthSelector, IncludeExclude, TimeRange, TokensQuery, WhereClauses};
pub use eval::{compute_is_continuous_nodes_graph, nodes_at, run_query};
