//! Store Facade
//!
//! [`World`] is the externally visible key-value interface. Writes either
//! store an input or register a rule, and mark the key dirty; reads and
//! snapshots first drain the dirty queue so the caller always observes a
//! stable store.
//!
//! The world exclusively owns its state map, rule registry, dependency
//! graph, and dirty queue. All methods take `&mut self` or `&self`; there
//! is no sharing between instances and no locking.

use std::fmt;

use indexmap::IndexMap;

use crate::error::{RuleError, WorldError};
use crate::graph::{DepGraph, DirtyQueue};
use crate::world::context::EvalCtx;
use crate::world::key::Key;
use crate::world::rules::{Rule, RuleRegistry};
use crate::world::slot::Slot;

/// Payload of a write: a plain input value or a rule.
pub enum Update<V> {
    /// Store as an input value.
    Value(V),
    /// Register as the key's rule.
    Rule(Rule<V>),
}

impl<V> Update<V> {
    /// An input-value write.
    pub fn value(value: V) -> Self {
        Self::Value(value)
    }

    /// A rule write.
    pub fn rule<F>(body: F) -> Self
    where
        F: Fn(&EvalCtx<'_, V>) -> Result<V, RuleError> + 'static,
    {
        Self::Rule(Box::new(body))
    }
}

impl<V> From<V> for Update<V> {
    fn from(value: V) -> Self {
        Self::Value(value)
    }
}

/// An incremental dataflow store.
///
/// Every key is either an input (value written directly) or computed
/// (value derived by a rule whose dependencies are discovered at run
/// time). See the crate docs for an end-to-end example.
pub struct World<V>
where
    V: Clone + PartialEq,
{
    pub(super) state: IndexMap<Key, Slot<V>>,
    pub(super) rules: RuleRegistry<V>,
    pub(super) graph: DepGraph,
    pub(super) dirty: DirtyQueue,
}

impl<V> World<V>
where
    V: Clone + PartialEq,
{
    /// Create an empty world.
    pub fn new() -> Self {
        Self {
            state: IndexMap::new(),
            rules: RuleRegistry::new(),
            graph: DepGraph::new(),
            dirty: DirtyQueue::new(),
        }
    }

    /// Create a world from an initial mapping, applied as an ordered
    /// sequence of ordinary writes.
    pub fn seeded<K, I>(entries: I) -> Self
    where
        K: Into<Key>,
        I: IntoIterator<Item = (K, Update<V>)>,
    {
        let mut world = Self::new();
        for (key, update) in entries {
            world.write(key, update);
        }
        world
    }

    /// Read a key's value, stabilizing first.
    ///
    /// Returns `Ok(None)` when the key has never produced a value.
    pub fn read(&mut self, key: impl AsRef<str>) -> Result<Option<V>, WorldError> {
        self.stabilize()?;
        Ok(self.state.get(key.as_ref()).and_then(Slot::value).cloned())
    }

    /// Write a key.
    ///
    /// A value equal to the key's current stored value is a no-op. A rule
    /// registers the key as computed and marks it dirty; any other value
    /// stores an input and marks the key dirty. Writing a value over a
    /// computed key converts it to an input: the rule is dropped and its
    /// recorded dependencies are cleared.
    pub fn write(&mut self, key: impl Into<Key>, update: impl Into<Update<V>>) {
        let key = key.into();
        match update.into() {
            Update::Rule(rule) => {
                let id = self.rules.register(key.clone(), rule);
                // The recorded reads belonged to the displaced rule; the
                // new one rediscovers its own set.
                self.graph.clear_dependencies_of(key.as_str());
                match self.state.get_mut(&key) {
                    Some(slot) => {
                        let prior = slot.value().cloned();
                        *slot = Slot::Computed {
                            rule: id,
                            value: prior,
                        };
                    }
                    None => {
                        self.state
                            .insert(key.clone(), Slot::Computed { rule: id, value: None });
                    }
                }
                self.dirty.mark(key);
            }
            Update::Value(value) => {
                match self.state.get_mut(&key) {
                    Some(slot) => {
                        if slot.value() == Some(&value) {
                            return;
                        }
                        if slot.is_computed() {
                            self.rules.remove(key.as_str());
                            self.graph.clear_dependencies_of(key.as_str());
                        }
                        *slot = Slot::Input(value);
                    }
                    None => {
                        self.state.insert(key.clone(), Slot::Input(value));
                    }
                }
                self.dirty.mark(key);
            }
        }
    }

    /// Snapshot every key that has a value, stabilizing first.
    ///
    /// The snapshot preserves key insertion order and serializes directly
    /// when `V` does.
    pub fn materialize(&mut self) -> Result<IndexMap<Key, V>, WorldError> {
        self.stabilize()?;
        Ok(self
            .state
            .iter()
            .filter_map(|(key, slot)| slot.value().map(|value| (key.clone(), value.clone())))
            .collect())
    }

    /// The current value of a key without stabilizing.
    ///
    /// Useful for inspecting what an aborted pass left behind; prefer
    /// [`World::read`] everywhere else.
    pub fn peek(&self, key: impl AsRef<str>) -> Option<&V> {
        self.state.get(key.as_ref()).and_then(Slot::value)
    }

    /// Whether `key` is waiting to be re-evaluated.
    pub fn is_pending(&self, key: impl AsRef<str>) -> bool {
        self.dirty.contains(key.as_ref())
    }

    /// Number of known keys.
    pub fn len(&self) -> usize {
        self.state.len()
    }

    /// Whether no keys exist.
    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    /// Whether `key` exists.
    pub fn contains(&self, key: impl AsRef<str>) -> bool {
        self.state.contains_key(key.as_ref())
    }

    /// All known keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.state.keys()
    }

    /// Recorded keys that `key` reads.
    pub fn dependencies_of(&self, key: impl AsRef<str>) -> Vec<Key> {
        self.graph
            .dependencies_of(key.as_ref())
            .cloned()
            .collect()
    }

    /// Recorded keys that read `key`.
    pub fn dependents_of(&self, key: impl AsRef<str>) -> Vec<Key> {
        self.graph.dependents_of(key.as_ref()).cloned().collect()
    }
}

impl<V> Default for World<V>
where
    V: Clone + PartialEq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for World<V>
where
    V: Clone + PartialEq,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("keys", &self.state.len())
            .field("rules", &self.rules.len())
            .field("edges", &self.graph.edge_count())
            .field("pending", &self.dirty.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn written_input_reads_back() {
        let mut world: World<i64> = World::new();
        world.write("a", 5);

        assert_eq!(world.read("a").unwrap(), Some(5));
        assert_eq!(world.read("missing").unwrap(), None);
    }

    #[test]
    fn same_value_write_marks_nothing_dirty() {
        let mut world: World<i64> = World::new();
        world.write("a", 5);
        world.read("a").unwrap();

        world.write("a", 5);
        assert!(!world.is_pending("a"));

        world.write("a", 6);
        assert!(world.is_pending("a"));
    }

    #[test]
    fn seeding_applies_entries_in_order() {
        let mut world: World<i64> = World::seeded([
            ("a", Update::value(1)),
            ("a", Update::value(2)),
            ("b", Update::value(10)),
        ]);

        assert_eq!(world.read("a").unwrap(), Some(2));
        assert_eq!(world.read("b").unwrap(), Some(10));
        assert_eq!(world.len(), 2);
    }

    #[test]
    fn rule_write_marks_the_key_dirty() {
        let mut world: World<i64> = World::new();
        world.write("c", Update::rule(|_| Ok(1)));

        assert!(world.is_pending("c"));
        assert!(world.contains("c"));
        assert_eq!(world.peek("c"), None);
    }

    #[test]
    fn debug_reports_counts() {
        let mut world: World<i64> = World::new();
        world.write("a", 1);

        let rendered = format!("{world:?}");
        assert!(rendered.contains("keys: 1"));
        assert!(rendered.contains("pending: 1"));
    }
}
