//! Graph Edges
//!
//! An edge `(dependency, dependent)` records one fact: the dependent's rule
//! read the dependency's value during some evaluation attempt. The relation
//! must stay acyclic, otherwise two rules could wait on each other and
//! stabilization would never drain.

use std::collections::HashSet;

use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::error::WorldError;
use crate::world::Key;

/// Forward and backward adjacency over keys.
///
/// `forward[dependent]` is the set of keys the dependent reads;
/// `backward[dependency]` is the set of keys that read it. Insertion order
/// is preserved in both directions so traversal (and therefore propagation)
/// is deterministic.
#[derive(Debug, Default)]
pub struct DepGraph {
    forward: IndexMap<Key, IndexSet<Key>>,
    backward: IndexMap<Key, IndexSet<Key>>,
}

impl DepGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `dependent` reads `dependency`.
    ///
    /// Returns `Ok(false)` if the edge was already present. Fails with
    /// [`WorldError::Cycle`] if the insertion would close a cycle; in that
    /// case nothing is stored.
    pub fn add_edge(&mut self, dependency: &Key, dependent: &Key) -> Result<bool, WorldError> {
        if self.contains_edge(dependency, dependent) {
            return Ok(false);
        }

        let mut path = SmallVec::new();
        let mut seen = HashSet::new();
        if self.hunt(dependent, dependency, &mut seen, &mut path) {
            debug!(
                dependency = %dependency,
                dependent = %dependent,
                "edge rejected: would close a cycle"
            );
            return Err(WorldError::Cycle {
                path: path.into_vec(),
            });
        }

        self.forward
            .entry(dependent.clone())
            .or_default()
            .insert(dependency.clone());
        self.backward
            .entry(dependency.clone())
            .or_default()
            .insert(dependent.clone());
        trace!(dependency = %dependency, dependent = %dependent, "edge recorded");
        Ok(true)
    }

    /// Depth-first search for `target` starting at `at`, following forward
    /// (reads) edges. On a hit, `path` holds the chain from the starting
    /// key to `target`.
    fn hunt(
        &self,
        target: &Key,
        at: &Key,
        seen: &mut HashSet<Key>,
        path: &mut SmallVec<[Key; 8]>,
    ) -> bool {
        path.push(at.clone());
        if at == target {
            return true;
        }
        if seen.insert(at.clone()) {
            if let Some(deps) = self.forward.get(at) {
                for next in deps {
                    if self.hunt(target, next, seen, path) {
                        return true;
                    }
                }
            }
        }
        path.pop();
        false
    }

    /// Whether `dependent` has `dependency` in its recorded set.
    pub fn contains_edge(&self, dependency: &Key, dependent: &Key) -> bool {
        self.forward
            .get(dependent)
            .map_or(false, |deps| deps.contains(dependency))
    }

    /// The recorded dependency set of `key`, if it has one.
    pub fn dependency_set(&self, key: &str) -> Option<&IndexSet<Key>> {
        self.forward.get(key)
    }

    /// Keys that `key` reads.
    pub fn dependencies_of(&self, key: &str) -> impl Iterator<Item = &Key> {
        self.forward.get(key).into_iter().flatten()
    }

    /// Keys that read `key`.
    pub fn dependents_of(&self, key: &str) -> impl Iterator<Item = &Key> {
        self.backward.get(key).into_iter().flatten()
    }

    /// Drop every edge in which `key` is the dependent.
    ///
    /// Used when the key's rule is replaced or the key becomes an input:
    /// the recorded reads belonged to the old rule. Edges in which `key` is
    /// the dependency are untouched, those describe other keys' reads.
    pub fn clear_dependencies_of(&mut self, key: &str) {
        if let Some(deps) = self.forward.shift_remove(key) {
            for dep in &deps {
                if let Some(readers) = self.backward.get_mut(dep) {
                    readers.shift_remove(key);
                }
            }
            trace!(key = %key, dropped = deps.len(), "recorded dependencies cleared");
        }
    }

    /// Total number of distinct edges.
    pub fn edge_count(&self) -> usize {
        self.forward.values().map(IndexSet::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> Key {
        Key::from(name)
    }

    #[test]
    fn add_edge_records_both_directions() {
        let mut graph = DepGraph::new();

        assert!(graph.add_edge(&key("a"), &key("c")).unwrap());

        assert!(graph.contains_edge(&key("a"), &key("c")));
        assert_eq!(
            graph.dependencies_of("c").collect::<Vec<_>>(),
            vec![&key("a")]
        );
        assert_eq!(
            graph.dependents_of("a").collect::<Vec<_>>(),
            vec![&key("c")]
        );
    }

    #[test]
    fn duplicate_edge_is_not_recorded_twice() {
        let mut graph = DepGraph::new();

        assert!(graph.add_edge(&key("a"), &key("c")).unwrap());
        assert!(!graph.add_edge(&key("a"), &key("c")).unwrap());
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn direct_cycle_is_rejected_with_path() {
        let mut graph = DepGraph::new();

        graph.add_edge(&key("c"), &key("d")).unwrap();

        let err = graph.add_edge(&key("d"), &key("c")).unwrap_err();
        match err {
            WorldError::Cycle { path } => {
                assert_eq!(path, vec![key("d"), key("c")]);
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
        assert!(!graph.contains_edge(&key("d"), &key("c")));
    }

    #[test]
    fn transitive_cycle_is_rejected() {
        let mut graph = DepGraph::new();

        // b reads a, c reads b; closing a -> reads -> c must fail.
        graph.add_edge(&key("a"), &key("b")).unwrap();
        graph.add_edge(&key("b"), &key("c")).unwrap();

        let err = graph.add_edge(&key("c"), &key("a")).unwrap_err();
        match err {
            WorldError::Cycle { path } => {
                assert_eq!(path, vec![key("c"), key("b"), key("a")]);
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn self_edge_is_rejected() {
        let mut graph = DepGraph::new();

        let err = graph.add_edge(&key("c"), &key("c")).unwrap_err();
        match err {
            WorldError::Cycle { path } => assert_eq!(path, vec![key("c")]),
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn clearing_dependencies_unlinks_reverse_entries() {
        let mut graph = DepGraph::new();

        graph.add_edge(&key("a"), &key("c")).unwrap();
        graph.add_edge(&key("b"), &key("c")).unwrap();
        graph.add_edge(&key("a"), &key("d")).unwrap();

        graph.clear_dependencies_of("c");

        assert_eq!(graph.dependencies_of("c").count(), 0);
        assert_eq!(
            graph.dependents_of("a").collect::<Vec<_>>(),
            vec![&key("d")]
        );
        assert_eq!(graph.dependents_of("b").count(), 0);
        assert_eq!(graph.edge_count(), 1);
    }
}
