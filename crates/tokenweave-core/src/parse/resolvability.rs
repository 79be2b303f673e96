//! Cycle-safe resolvability computation
//!
//! Resolvability is a property of `(token, mode)` pairs: a pair is
//! resolvable iff every alias part's target pair exists and is itself
//! resolvable. The walk keeps a per-traversal in-progress set, so a pair
//! revisited on its own active resolution path is reported unresolvable
//! instead of looping, and a memo map, so shared dependency chains are
//! walked once.

use std::collections::{HashMap, HashSet};

/// A `(stringified token path, mode)` pair — the unit resolvability is
/// computed for
pub type PairKey = (String, String);

/// Dependency graph over `(token, mode)` pairs
#[derive(Debug, Clone, Default)]
pub struct ResolvabilityGraph {
    /// Every declared pair
    pairs: HashSet<PairKey>,
    /// Alias edges: referrer pair -> target pairs
    edges: HashMap<PairKey, Vec<PairKey>>,
}

impl ResolvabilityGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare that a `(token, mode)` pair exists
    pub fn add_pair(&mut self, path: impl Into<String>, mode: impl Into<String>) {
        self.pairs.insert((path.into(), mode.into()));
    }

    /// Record one alias dependency edge
    pub fn add_edge(&mut self, from: PairKey, to: PairKey) {
        self.edges.entry(from).or_default().push(to);
    }

    /// Solve resolvability for every declared pair
    pub fn solve(&self) -> HashMap<PairKey, bool> {
        let mut memo: HashMap<PairKey, bool> = HashMap::new();
        let mut in_progress: HashSet<PairKey> = HashSet::new();
        for pair in &self.pairs {
            self.resolve(pair, &mut memo, &mut in_progress);
        }
        memo
    }

    fn resolve(
        &self,
        pair: &PairKey,
        memo: &mut HashMap<PairKey, bool>,
        in_progress: &mut HashSet<PairKey>,
    ) -> bool {
        if let Some(&known) = memo.get(pair) {
            return known;
        }
        // Revisiting a pair on its own active resolution path means the
        // alias chain is cyclic; the pair cannot resolve.
        if in_progress.contains(pair) {
            return false;
        }
        if !self.pairs.contains(pair) {
            // Missing target: the referenced token or mode does not exist.
            return false;
        }

        in_progress.insert(pair.clone());
        let resolvable = match self.edges.get(pair) {
            None => true,
            Some(targets) => {
                let mut all = true;
                for target in targets {
                    if !self.resolve(target, memo, in_progress) {
                        all = false;
                    }
                }
                all
            }
        };
        in_progress.remove(pair);
        memo.insert(pair.clone(), resolvable);
        resolvable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(path: &str, mode: &str) -> PairKey {
        (path.to_string(), mode.to_string())
    }

    #[test]
    fn test_primitive_pairs_resolve() {
        let mut graph = ResolvabilityGraph::new();
        graph.add_pair("a", "light");
        let solved = graph.solve();
        assert_eq!(solved.get(&pair("a", "light")), Some(&true));
    }

    #[test]
    fn test_chain_resolves_through_targets() {
        let mut graph = ResolvabilityGraph::new();
        graph.add_pair("a", "light");
        graph.add_pair("b", "light");
        graph.add_pair("c", "light");
        graph.add_edge(pair("c", "light"), pair("b", "light"));
        graph.add_edge(pair("b", "light"), pair("a", "light"));
        let solved = graph.solve();
        assert_eq!(solved.get(&pair("c", "light")), Some(&true));
    }

    #[test]
    fn test_missing_target_is_unresolvable() {
        let mut graph = ResolvabilityGraph::new();
        graph.add_pair("a", "light");
        graph.add_edge(pair("a", "light"), pair("ghost", "light"));
        let solved = graph.solve();
        assert_eq!(solved.get(&pair("a", "light")), Some(&false));
    }

    #[test]
    fn test_missing_mode_on_existing_target_is_unresolvable() {
        let mut graph = ResolvabilityGraph::new();
        graph.add_pair("a", "light");
        graph.add_pair("b", "dark");
        graph.add_edge(pair("a", "light"), pair("b", "light"));
        let solved = graph.solve();
        assert_eq!(solved.get(&pair("a", "light")), Some(&false));
    }

    #[test]
    fn test_cycle_terminates_and_is_unresolvable() {
        let mut graph = ResolvabilityGraph::new();
        graph.add_pair("a", "light");
        graph.add_pair("b", "light");
        graph.add_edge(pair("a", "light"), pair("b", "light"));
        graph.add_edge(pair("b", "light"), pair("a", "light"));
        let solved = graph.solve();
        assert_eq!(solved.get(&pair("a", "light")), Some(&false));
        assert_eq!(solved.get(&pair("b", "light")), Some(&false));
    }

    #[test]
    fn test_self_reference_is_unresolvable() {
        let mut graph = ResolvabilityGraph::new();
        graph.add_pair("a", "light");
        graph.add_edge(pair("a", "light"), pair("a", "light"));
        let solved = graph.solve();
        assert_eq!(solved.get(&pair("a", "light")), Some(&false));
    }

    #[test]
    fn test_cross_mode_edges_resolve_independently() {
        let mut graph = ResolvabilityGraph::new();
        graph.add_pair("a", "light");
        graph.add_pair("a", "dark");
        graph.add_edge(pair("a", "dark"), pair("a", "light"));
        let solved = graph.solve();
        assert_eq!(solved.get(&pair("a", "dark")), Some(&true));
        assert_eq!(solved.get(&pair("a", "light")), Some(&true));
    }
}
