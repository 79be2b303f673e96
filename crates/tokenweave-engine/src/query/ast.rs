//! Query AST
//!
//! A query is `{where: Clause | Clause[]}`. Each clause discriminates on
//! exactly one node kind (a regex matched against node names), may narrow
//! by depth and node properties, recurse into descendants via `andWhere`,
//! and marks its matches for the final selection with `select: true`.

use serde::{Deserialize, Serialize};

use tokenweave_core::errors::{Result, TokenTreeError};

/// A declarative query over the tree-node registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokensQuery {
    /// One clause or a union of clauses
    #[serde(rename = "where")]
    pub where_clauses: WhereClauses,
}

impl TokensQuery {
    /// Validate the whole AST
    ///
    /// # Errors
    ///
    /// Returns `QueryStructure` for any structural rule violation; the
    /// query engine refuses to evaluate an invalid AST.
    pub fn validate(&self) -> Result<()> {
        for clause in self.where_clauses.clauses() {
            clause.validate(false)?;
        }
        Ok(())
    }
}

/// The `where` payload: a single clause or an array unioning clauses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WhereClauses {
    One(Box<Clause>),
    Many(Vec<Clause>),
}

impl WhereClauses {
    /// The top-level clauses in evaluation order
    pub fn clauses(&self) -> &[Clause] {
        match self {
            WhereClauses::One(clause) => std::slice::from_ref(clause.as_ref()),
            WhereClauses::Many(clauses) => clauses,
        }
    }
}

/// One query clause
///
/// Exactly one of `group`, `collection`, `token` must be set; everything
/// else is optional narrowing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct Clause {
    /// Match groups whose name matches this regex
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Match collections whose name matches this regex
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    /// Match tokens (resolvable or not) whose name matches this regex
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Narrow matches to a depth
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at_depth: Option<DepthSelector>,
    /// Evaluate a nested clause against descendants of this clause's
    /// matches
    #[serde(skip_serializing_if = "Option::is_none")]
    pub and_where: Option<Box<Clause>>,
    /// Add this clause's matches to the final selection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub select: Option<bool>,

    /// Name regex property filter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description regex property filter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Declared (token) or allowed (collection) mode filter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modes: Option<IncludeExclude>,
    /// Token type filter; token clauses only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub types: Option<IncludeExclude>,
    /// Source-id selector reading token extensions; token clauses only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ids: Option<IncludeExclude>,
    /// Creation-time selector reading token extensions; token clauses only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<TimeRange>,
    /// Update-time selector reading token extensions; token clauses only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<TimeRange>,
}

/// The node kind a clause discriminates on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseKind {
    Group,
    Collection,
    Token,
}

impl Clause {
    /// The kind this clause discriminates on and its name regex
    ///
    /// # Errors
    ///
    /// Returns `QueryStructure` unless exactly one kind is named.
    pub fn kind(&self) -> Result<(ClauseKind, &str)> {
        let mut kinds = Vec::new();
        if let Some(pattern) = &self.group {
            kinds.push((ClauseKind::Group, pattern.as_str()));
        }
        if let Some(pattern) = &self.collection {
            kinds.push((ClauseKind::Collection, pattern.as_str()));
        }
        if let Some(pattern) = &self.token {
            kinds.push((ClauseKind::Token, pattern.as_str()));
        }
        match kinds.as_slice() {
            [only] => Ok(*only),
            _ => Err(TokenTreeError::QueryStructure {
                reason: "a clause must name exactly one of group, collection, token".to_string(),
            }),
        }
    }

    fn validate(&self, inside_collection: bool) -> Result<()> {
        let (kind, pattern) = self.kind()?;

        if kind == ClauseKind::Collection && inside_collection {
            return Err(TokenTreeError::QueryStructure {
                reason: "a collection clause cannot nest inside a collection clause".to_string(),
            });
        }

        check_regex(pattern)?;
        if let Some(name) = &self.name {
            check_regex(name)?;
        }
        if let Some(description) = &self.description {
            check_regex(description)?;
        }
        if let Some(at_depth) = &self.at_depth {
            at_depth.validate()?;
        }
        if let Some(modes) = &self.modes {
            modes.validate("modes")?;
        }

        if kind != ClauseKind::Token {
            for (field, used) in [
                ("types", self.types.is_some()),
                ("sourceIds", self.source_ids.is_some()),
                ("created", self.created.is_some()),
                ("updated", self.updated.is_some()),
            ] {
                if used {
                    return Err(TokenTreeError::QueryStructure {
                        reason: format!("the '{}' filter applies to token clauses only", field),
                    });
                }
            }
        }
        if let Some(types) = &self.types {
            types.validate("types")?;
        }
        if let Some(source_ids) = &self.source_ids {
            source_ids.validate("sourceIds")?;
        }

        if let Some(nested) = &self.and_where {
            nested.validate(inside_collection || kind == ClauseKind::Collection)?;
        }
        Ok(())
    }
}

fn check_regex(pattern: &str) -> Result<()> {
    regex::Regex::new(pattern)
        .map(|_| ())
        .map_err(|err| TokenTreeError::QueryStructure {
            reason: format!("invalid regex '{}': {}", pattern, err),
        })
}

/// Depth narrowing: `{equalTo: n}` or `{upTo: n}`
///
/// Depth is the number of path segments; root-level nodes are at depth 1.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct DepthSelector {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equal_to: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub up_to: Option<usize>,
}

impl DepthSelector {
    fn validate(&self) -> Result<()> {
        match (self.equal_to, self.up_to) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            _ => Err(TokenTreeError::QueryStructure {
                reason: "atDepth must set exactly one of equalTo, upTo".to_string(),
            }),
        }
    }

    /// Check a node depth against the selector
    pub fn matches(&self, depth: usize) -> bool {
        match (self.equal_to, self.up_to) {
            (Some(equal_to), _) => depth == equal_to,
            (_, Some(up_to)) => depth <= up_to,
            _ => false,
        }
    }
}

/// Include/exclude lists over a string-valued node property
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct IncludeExclude {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,
}

impl IncludeExclude {
    fn validate(&self, field: &str) -> Result<()> {
        if self.include.is_none() && self.exclude.is_none() {
            return Err(TokenTreeError::QueryStructure {
                reason: format!("'{}' must set include and/or exclude", field),
            });
        }
        Ok(())
    }
}

/// Half-open timestamp range over an extension-carried RFC 3339 value
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct TimeRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<chrono::DateTime<chrono::Utc>>,
}

impl TimeRange {
    /// Check a timestamp against the range
    pub fn contains(&self, at: chrono::DateTime<chrono::Utc>) -> bool {
        self.from.is_none_or(|from| at >= from) && self.to.is_none_or(|to| at <= to)
    }
}
