//! Rule Registry
//!
//! A rule is a user-supplied computation registered under a key; at most
//! one rule is active per key at a time. The registry keeps the
//! bidirectional association between keys and rules: the stabilizer
//! resolves a key's rule before invoking it, and resolves the rule's key
//! back to scope the evaluation context.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use crate::error::RuleError;
use crate::world::context::EvalCtx;
use crate::world::key::Key;

/// Unique identifier for a registered rule.
///
/// Every registration gets a fresh id, so replacing a key's rule never
/// confuses the old closure with the new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleId(u64);

impl RuleId {
    /// Generate a new unique rule ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for RuleId {
    fn default() -> Self {
        Self::new()
    }
}

/// A boxed rule body. Receives the restricted evaluation view and returns
/// the computed value or a [`RuleError`] signal.
pub type Rule<V> = Box<dyn Fn(&EvalCtx<'_, V>) -> Result<V, RuleError>>;

/// Key-to-rule and rule-to-key maps plus the rule storage itself.
pub struct RuleRegistry<V> {
    by_key: IndexMap<Key, RuleId>,
    by_id: HashMap<RuleId, Key>,
    rules: HashMap<RuleId, Rule<V>>,
}

impl<V> RuleRegistry<V> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            by_key: IndexMap::new(),
            by_id: HashMap::new(),
            rules: HashMap::new(),
        }
    }

    /// Register `rule` for `key`, displacing and dropping any previous
    /// rule for that key. Returns the new rule's id.
    pub fn register(&mut self, key: Key, rule: Rule<V>) -> RuleId {
        let id = RuleId::new();
        if let Some(old) = self.by_key.insert(key.clone(), id) {
            self.by_id.remove(&old);
            self.rules.remove(&old);
        }
        self.by_id.insert(id, key);
        self.rules.insert(id, rule);
        id
    }

    /// Remove the rule registered for `key`, if any.
    pub fn remove(&mut self, key: &str) -> Option<RuleId> {
        let id = self.by_key.shift_remove(key)?;
        self.by_id.remove(&id);
        self.rules.remove(&id);
        Some(id)
    }

    /// The rule currently assigned to `key`.
    pub fn rule_for(&self, key: &str) -> Option<RuleId> {
        self.by_key.get(key).copied()
    }

    /// The key a rule computes, used to scope its evaluation context.
    pub fn key_of(&self, id: RuleId) -> Option<&Key> {
        self.by_id.get(&id)
    }

    /// The rule body for `id`.
    pub fn get(&self, id: RuleId) -> Option<&Rule<V>> {
        self.rules.get(&id)
    }

    /// Number of registered rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no rules are registered.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<V> Default for RuleRegistry<V> {
    fn default() -> Self {
        Self::new()
    }
}
