//! View state
//!
//! A view is a named, persisted query defining a reusable subset of the
//! tree. The engine keeps one active view at a time, under the
//! invariants: `active_view_name` is null iff no views are registered,
//! otherwise it names one registered view; view names are unique.

use serde::{Deserialize, Serialize};
use tokenweave_core::errors::{Result, TokenTreeError};
use tokenweave_core::state::TreeNodesState;
use tokenweave_core_types::TreePath;

use crate::query::{run_query, TokensQuery};

/// A registered view and its last materialization
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    /// Unique view name
    pub name: String,
    /// The persisted query
    pub query: TokensQuery,
    /// Node paths the query selected at the last materialization
    pub materialized: Vec<TreePath>,
}

/// All registered views plus the active-view pointer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewsState {
    views: Vec<ViewState>,
    active_view_name: Option<String>,
}

impl ViewsState {
    /// Create an empty view state
    pub fn new() -> Self {
        Self::default()
    }

    /// The registered views, in registration order
    pub fn views(&self) -> &[ViewState] {
        &self.views
    }

    /// The active view's name, None when no views are registered
    pub fn active_view_name(&self) -> Option<&str> {
        self.active_view_name.as_deref()
    }

    /// Look up a view by name
    pub fn view(&self, name: &str) -> Option<&ViewState> {
        self.views.iter().find(|view| view.name == name)
    }

    /// Register a view
    ///
    /// The first registered view becomes active, keeping the activation
    /// invariant without a separate call.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateView` when the name is taken.
    pub fn register(&mut self, name: String, query: TokensQuery, state: &TreeNodesState) -> Result<()> {
        if self.view(&name).is_some() {
            return Err(TokenTreeError::DuplicateView { name });
        }
        let materialized = run_query(state, &query)?;
        tracing::debug!(view = %name, nodes = materialized.len(), "view registered");
        self.views.push(ViewState {
            name: name.clone(),
            query,
            materialized,
        });
        if self.active_view_name.is_none() {
            self.active_view_name = Some(name);
        }
        Ok(())
    }

    /// Replace a view's query and rematerialize it
    ///
    /// # Errors
    ///
    /// Returns `ViewNotFound` for an unregistered name.
    pub fn update(&mut self, name: &str, query: TokensQuery, state: &TreeNodesState) -> Result<()> {
        let materialized = run_query(state, &query)?;
        let view = self
            .views
            .iter_mut()
            .find(|view| view.name == name)
            .ok_or_else(|| TokenTreeError::ViewNotFound {
                name: name.to_string(),
            })?;
        view.query = query;
        view.materialized = materialized;
        Ok(())
    }

    /// Point the active view at a registered name
    ///
    /// `None` is only legal when no views are registered.
    ///
    /// # Errors
    ///
    /// Returns `ViewNotFound` for an unregistered name and
    /// `InvalidMetadata` for a null that would break the activation
    /// invariant.
    pub fn set_active(&mut self, name: Option<String>) -> Result<()> {
        match name {
            Some(name) => {
                if self.view(&name).is_none() {
                    return Err(TokenTreeError::ViewNotFound { name });
                }
                self.active_view_name = Some(name);
            }
            None => {
                if !self.views.is_empty() {
                    return Err(TokenTreeError::InvalidMetadata {
                        reason: "activeViewName must name a view while views are registered"
                            .to_string(),
                    });
                }
                self.active_view_name = None;
            }
        }
        Ok(())
    }

    /// Delete a view; the active pointer moves to the first remaining
    /// view (or null when none are left)
    ///
    /// # Errors
    ///
    /// Returns `ViewNotFound` for an unregistered name.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        let index = self
            .views
            .iter()
            .position(|view| view.name == name)
            .ok_or_else(|| TokenTreeError::ViewNotFound {
                name: name.to_string(),
            })?;
        self.views.remove(index);
        if self.active_view_name.as_deref() == Some(name) || self.views.is_empty() {
            self.active_view_name = self.views.first().map(|view| view.name.clone());
        }
        Ok(())
    }

    /// Drop every view and the active pointer
    pub fn delete_all(&mut self) {
        self.views.clear();
        self.active_view_name = None;
    }

    /// Re-run every view's query against the current tree
    ///
    /// # Errors
    ///
    /// Propagates `QueryStructure` failures; registered queries were
    /// validated at registration, so this only fires on a corrupted
    /// import.
    pub fn rematerialize(&mut self, state: &TreeNodesState) -> Result<()> {
        for view in &mut self.views {
            view.materialized = run_query(state, &view.query)?;
        }
        Ok(())
    }

    /// Export the persisted metadata shape
    pub fn metadata(&self) -> EngineMetadata {
        EngineMetadata {
            active_view_name: self.active_view_name.clone(),
            views: self
                .views
                .iter()
                .map(|view| ViewMetadata {
                    name: view.name.clone(),
                    query: view.query.clone(),
                })
                .collect(),
        }
    }

    /// Rebuild view state from persisted metadata
    ///
    /// # Errors
    ///
    /// Returns `InvalidMetadata` when the metadata violates the view
    /// invariants, `QueryStructure` when a persisted query is invalid.
    pub fn from_metadata(metadata: EngineMetadata, state: &TreeNodesState) -> Result<Self> {
        metadata.validate()?;
        let mut views = Vec::with_capacity(metadata.views.len());
        for view in metadata.views {
            view.query.validate()?;
            let materialized = run_query(state, &view.query)?;
            views.push(ViewState {
                name: view.name,
                query: view.query,
                materialized,
            });
        }
        Ok(Self {
            views,
            active_view_name: metadata.active_view_name,
        })
    }
}

/// Persisted engine metadata: `{"activeViewName": ..., "views": [...]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EngineMetadata {
    pub active_view_name: Option<String>,
    pub views: Vec<ViewMetadata>,
}

/// One persisted view entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ViewMetadata {
    pub name: String,
    pub query: TokensQuery,
}

impl EngineMetadata {
    /// Check the uniqueness and activation invariants
    ///
    /// # Errors
    ///
    /// Returns `InvalidMetadata` naming the violated invariant.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for view in &self.views {
            if !seen.insert(view.name.as_str()) {
                return Err(TokenTreeError::InvalidMetadata {
                    reason: format!("view names must be unique ('{}')", view.name),
                });
            }
        }
        match &self.active_view_name {
            Some(active) if self.views.is_empty() => Err(TokenTreeError::InvalidMetadata {
                reason: format!(
                    "activeViewName '{}' must be null when no views are registered",
                    active
                ),
            }),
            Some(active) if !self.views.iter().any(|view| &view.name == active) => {
                Err(TokenTreeError::InvalidMetadata {
                    reason: "activeViewName must be null or one of the view names".to_string(),
                })
            }
            None if !self.views.is_empty() => Err(TokenTreeError::InvalidMetadata {
                reason: "activeViewName must name a view while views are registered".to_string(),
            }),
            _ => Ok(()),
        }
    }
}
