//! Evaluation Context
//!
//! The restricted view of the store a rule evaluates against. One context
//! is constructed per invocation attempt, scoped to the key being
//! computed.
//!
//! Reads succeed only for keys already in the evaluating key's recorded
//! dependency set; anything else aborts the attempt with an
//! unsatisfied-dependency signal. That signal is how dependencies are
//! discovered without being declared: the stabilizer records the edge and
//! retries the rule once the dependency is available.
//!
//! Writes are rejected unconditionally. Rules are pure with respect to the
//! store while they run.
//!
//! Only the stabilizer can construct a context, so a rule can never
//! re-enter stabilization or evaluate another rule from inside its own
//! run.

use indexmap::{IndexMap, IndexSet};

use crate::error::RuleError;
use crate::world::key::Key;
use crate::world::slot::Slot;

/// Per-attempt view of the store, bound to the evaluating key.
pub struct EvalCtx<'w, V> {
    key: &'w Key,
    state: &'w IndexMap<Key, Slot<V>>,
    recorded: Option<&'w IndexSet<Key>>,
}

impl<'w, V> EvalCtx<'w, V> {
    pub(crate) fn new(
        key: &'w Key,
        state: &'w IndexMap<Key, Slot<V>>,
        recorded: Option<&'w IndexSet<Key>>,
    ) -> Self {
        Self {
            key,
            state,
            recorded,
        }
    }

    /// The key this evaluation computes.
    pub fn key(&self) -> &Key {
        self.key
    }
}

impl<'w, V> EvalCtx<'w, V>
where
    V: Clone,
{
    /// Read a dependency's materialized value.
    ///
    /// Fails with [`RuleError::Unsatisfied`] when `key` is not yet in the
    /// recorded dependency set, or is recorded but has not produced a
    /// value. Either way the stabilizer retries this rule after the
    /// dependency is available.
    pub fn get(&self, key: impl AsRef<str>) -> Result<V, RuleError> {
        let name = key.as_ref();
        let recorded = self
            .recorded
            .map_or(false, |deps| deps.contains(name));
        if !recorded {
            return Err(RuleError::Unsatisfied(Key::from(name)));
        }
        match self.state.get(name).and_then(Slot::value) {
            Some(value) => Ok(value.clone()),
            None => Err(RuleError::Unsatisfied(Key::from(name))),
        }
    }

    /// Attempt a store write. Always fails with
    /// [`RuleError::WriteRejected`].
    pub fn set(&self, key: impl AsRef<str>, _value: V) -> Result<(), RuleError> {
        Err(RuleError::WriteRejected(Key::from(key.as_ref())))
    }
}
