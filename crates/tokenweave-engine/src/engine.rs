//! Engine facade
//!
//! `TokenTreeEngine` owns the registry handle, the analyzed token pool,
//! the tree-node registry, and the view state, and exposes the load /
//! query / mutate / render entry points. One engine owns one tree; the
//! state is never shared behind a process-wide singleton.

use std::collections::HashMap;

use serde_json::Value;
use tokenweave_core::errors::Result;
use tokenweave_core::parse::{parse_document, AnalyzedToken};
use tokenweave_core::registry::TypeRegistry;
use tokenweave_core::render::{node_projection, render_document};
use tokenweave_core::state::{
    build_collection_state, build_group_state, find_or_register_token_state,
    resolved_token_value, TreeNodesState,
};
use tokenweave_core_types::TreePath;

use crate::mutation;
use crate::query::{nodes_at, run_query, TokensQuery};
use crate::views::{EngineMetadata, ViewsState};

/// The in-memory document engine
pub struct TokenTreeEngine {
    pub(crate) registry: Box<dyn TypeRegistry>,
    /// Analyzed-but-unbuilt tokens, drained by lazy materialization
    pub(crate) analyzed: HashMap<String, AnalyzedToken>,
    pub(crate) state: TreeNodesState,
    pub(crate) views: ViewsState,
}

impl std::fmt::Debug for TokenTreeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenTreeEngine")
            .field("analyzed", &self.analyzed.len())
            .field("state", &self.state)
            .field("views", &self.views)
            .finish_non_exhaustive()
    }
}

impl TokenTreeEngine {
    /// Create an engine over a type registry, with an empty tree
    pub fn new(registry: Box<dyn TypeRegistry>) -> Self {
        Self {
            registry,
            analyzed: HashMap::new(),
            state: TreeNodesState::new(),
            views: ViewsState::new(),
        }
    }

    /// Replace the tree with a parsed document
    ///
    /// Parses and analyzes the raw document (reporting every violation on
    /// failure, with the previous tree left untouched), then materializes
    /// every node and rematerializes the registered views.
    ///
    /// # Errors
    ///
    /// Returns `SchemaValidation` with the aggregated violations.
    pub fn load_document(&mut self, raw: &Value) -> Result<()> {
        let mut doc = parse_document(raw, self.registry.as_ref())?;

        self.state.clear();
        self.analyzed.clear();
        for collection in doc.collections.drain(..) {
            self.state.add_collection(build_collection_state(collection))?;
        }
        for group in doc.groups.drain(..) {
            self.state.add_group(build_group_state(group))?;
        }
        let token_paths: Vec<TreePath> = doc.tokens.values().map(|token| token.path.clone()).collect();
        self.analyzed = doc.tokens;
        for path in token_paths {
            find_or_register_token_state(
                &path,
                self.registry.as_ref(),
                &mut self.analyzed,
                &mut self.state,
            )?;
        }
        self.views.rematerialize(&self.state)?;
        tracing::info!(nodes = self.state.len(), "document loaded");
        Ok(())
    }

    /// Drop every node, keeping registered views (rematerialized empty)
    pub fn reset(&mut self) -> Result<()> {
        self.state.clear();
        self.analyzed.clear();
        self.views.rematerialize(&self.state)?;
        tracing::info!("tree reset");
        Ok(())
    }

    /// The current tree-node registry
    pub fn state(&self) -> &TreeNodesState {
        &self.state
    }

    /// The current view state
    pub fn views(&self) -> &ViewsState {
        &self.views
    }

    /// The type registry the engine was built over
    pub fn registry(&self) -> &dyn TypeRegistry {
        self.registry.as_ref()
    }

    /// Evaluate a query, returning the selected paths in path order
    ///
    /// # Errors
    ///
    /// Returns `QueryStructure` for an invalid AST.
    pub fn query_paths(&self, query: &TokensQuery) -> Result<Vec<TreePath>> {
        run_query(&self.state, query)
    }

    /// Evaluate a query, returning node projections in path order
    ///
    /// Tokens serialize token-shaped (`null` for an unresolvable token),
    /// collections carry their modes, groups their common fields.
    ///
    /// # Errors
    ///
    /// Returns `QueryStructure` for an invalid AST.
    pub fn query(&self, query: &TokensQuery) -> Result<Vec<Value>> {
        let paths = self.query_paths(query)?;
        Ok(nodes_at(&self.state, &paths)
            .into_iter()
            .map(node_projection)
            .collect())
    }

    /// Apply a named mutation to the tree
    ///
    /// The payload is validated against the mutation's schema before any
    /// state is touched; a failed command leaves the tree unchanged.
    ///
    /// # Errors
    ///
    /// Returns `UnknownMutation` for an unregistered name and whatever
    /// the command's validation raises.
    pub fn run_mutation(&mut self, name: &str, payload: &Value) -> Result<Value> {
        mutation::dispatch(self, name, payload)
    }

    /// Reassemble the nested document from the current tree
    pub fn render(&self) -> Value {
        render_document(&self.state)
    }

    /// Compute a token's resolved value for one mode
    ///
    /// # Errors
    ///
    /// Returns `Unresolvable` when the pair's alias chain cannot resolve.
    pub fn resolved_value(&mut self, path: &TreePath, mode: &str) -> Result<Value> {
        resolved_token_value(
            path,
            mode,
            self.registry.as_ref(),
            &mut self.analyzed,
            &mut self.state,
        )
    }

    /// Export the persisted engine metadata
    pub fn metadata(&self) -> EngineMetadata {
        self.views.metadata()
    }

    /// Replace the view state from persisted metadata
    ///
    /// # Errors
    ///
    /// Returns `InvalidMetadata` when the metadata violates the view
    /// invariants.
    pub fn import_metadata(&mut self, metadata: EngineMetadata) -> Result<()> {
        self.views = ViewsState::from_metadata(metadata, &self.state)?;
        Ok(())
    }
}
