//! Stabilization
//!
//! The loop that drains the dirty queue and brings the store back to
//! internal consistency.
//!
//! # Algorithm
//!
//! Until the queue is empty, pop the most recently marked key `d`:
//!
//! 1. If `d` is an input, skip recomputation but still mark its dependents
//!    dirty (an input write must flow downstream).
//!
//! 2. If `d` is computed, build an evaluation context scoped to `d` and
//!    invoke its rule, then branch on the result:
//!    - A value equal to the stored one suppresses propagation; nothing
//!      downstream can have observed a change.
//!    - A different value is stored and `d`'s dependents are marked dirty.
//!    - An unsatisfied-dependency signal naming `m` records the edge
//!      `(m, d)` through the cycle detector, re-marks `d`, then marks `m`.
//!      Marking `m` second puts it above `d` in the stack, so `m`
//!      materializes before `d` retries. Each retry either grows `d`'s
//!      recorded set or follows a completed dependency, and the recorded
//!      set is bounded by the key count, so the queue drains in finitely
//!      many steps.
//!    - Any other failure aborts the pass.
//!
//! # Failure
//!
//! A pass is not atomic. On a fatal error, keys recomputed earlier in the
//! pass keep their new values, keys not yet reached stay dirty, and the
//! failing key is re-marked dirty so the next triggering call retries it.

use tracing::{debug, trace};

use crate::error::{RuleError, WorldError};
use crate::world::context::EvalCtx;
use crate::world::key::Key;
use crate::world::rules::RuleId;
use crate::world::slot::Slot;
use crate::world::store::World;

impl<V> World<V>
where
    V: Clone + PartialEq,
{
    /// Drain every pending recomputation obligation.
    ///
    /// Called implicitly by [`World::read`] and [`World::materialize`];
    /// public so callers can force quiescence explicitly.
    pub fn stabilize(&mut self) -> Result<(), WorldError> {
        if self.dirty.is_empty() {
            return Ok(());
        }
        debug!(pending = self.dirty.len(), "stabilizing");

        while let Some(key) = self.dirty.pop() {
            let Some(slot) = self.state.get(&key) else {
                continue;
            };
            match slot.rule() {
                None => {
                    trace!(key = %key, "input changed, propagating");
                    self.propagate(&key);
                }
                Some(rule_id) => self.evaluate(&key, rule_id)?,
            }
        }

        debug!("stable");
        Ok(())
    }

    /// Run one evaluation attempt for a computed key.
    fn evaluate(&mut self, key: &Key, rule_id: RuleId) -> Result<(), WorldError> {
        // The registry resolves which key the rule computes; that key
        // scopes the context the rule runs against.
        let scope = self
            .rules
            .key_of(rule_id)
            .cloned()
            .expect("registered rule has no key");

        let outcome = {
            let recorded = self.graph.dependency_set(scope.as_str());
            let ctx = EvalCtx::new(&scope, &self.state, recorded);
            let rule = self
                .rules
                .get(rule_id)
                .expect("slot references an unregistered rule");
            rule(&ctx)
        };

        match outcome {
            Ok(value) => {
                let changed = self.store(key, value);
                trace!(key = %key, changed, "rule completed");
                if changed {
                    self.propagate(key);
                }
                Ok(())
            }
            Err(RuleError::Unsatisfied(missing)) => {
                if !self.state.contains_key(&missing) {
                    // The rule read a key that does not exist at all, so
                    // there is nothing to wait for. Surface it instead of
                    // retrying forever.
                    self.dirty.mark(key.clone());
                    return Err(WorldError::RuleFailed {
                        key: key.clone(),
                        source: format!("depends on unknown key `{missing}`").into(),
                    });
                }
                if let Err(err) = self.graph.add_edge(&missing, key) {
                    self.dirty.mark(key.clone());
                    return Err(err);
                }
                trace!(key = %key, missing = %missing, "dependency discovered, will retry");
                // Retry after the dependency: marking `missing` second
                // places it above `key` in the stack.
                self.dirty.mark(key.clone());
                self.dirty.mark(missing);
                Ok(())
            }
            Err(RuleError::WriteRejected(target)) => {
                debug!(key = %key, target = %target, "rule attempted a write, aborting");
                self.dirty.mark(key.clone());
                Err(WorldError::WriteDuringEval {
                    key: key.clone(),
                    target,
                })
            }
            Err(RuleError::Fault(source)) => {
                debug!(key = %key, %source, "rule failed, aborting");
                self.dirty.mark(key.clone());
                Err(WorldError::RuleFailed {
                    key: key.clone(),
                    source,
                })
            }
        }
    }

    /// Store a freshly computed value. Returns whether it differs from the
    /// previous one.
    fn store(&mut self, key: &Key, value: V) -> bool {
        match self.state.get_mut(key) {
            Some(Slot::Computed { value: cached, .. }) => {
                if cached.as_ref() == Some(&value) {
                    false
                } else {
                    *cached = Some(value);
                    true
                }
            }
            // The slot kind cannot change mid-pass; nothing to store.
            _ => false,
        }
    }

    /// Mark every current dependent of `key` dirty.
    fn propagate(&mut self, key: &Key) {
        for dependent in self.graph.dependents_of(key.as_str()) {
            self.dirty.mark(dependent.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::world::store::Update;

    #[test]
    fn rule_discovers_dependencies_by_retrying() {
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();

        let mut world: World<i64> = World::new();
        world.write("a", 5);
        world.write("b", 10);
        world.write(
            "c",
            Update::rule(move |ctx| {
                seen.set(seen.get() + 1);
                Ok(ctx.get("a")? + ctx.get("b")?)
            }),
        );

        assert_eq!(world.read("c").unwrap(), Some(15));
        // Two discovery attempts plus the completing one.
        assert_eq!(calls.get(), 3);
        assert_eq!(
            world.dependencies_of("c"),
            vec![Key::from("a"), Key::from("b")]
        );
    }

    #[test]
    fn settled_rule_stabilizes_in_one_attempt() {
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();

        let mut world: World<i64> = World::new();
        world.write("a", 5);
        world.write("b", 10);
        world.write(
            "c",
            Update::rule(move |ctx| {
                seen.set(seen.get() + 1);
                Ok(ctx.get("a")? + ctx.get("b")?)
            }),
        );
        world.read("c").unwrap();

        calls.set(0);
        world.write("a", 7);
        assert_eq!(world.read("c").unwrap(), Some(17));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn unchanged_result_suppresses_propagation() {
        let downstream_calls = Rc::new(Cell::new(0));
        let seen = downstream_calls.clone();

        let mut world: World<i64> = World::new();
        world.write("a", 5);
        // Clamps to a constant, so upstream changes never alter it.
        world.write(
            "floor",
            Update::rule(|ctx: &EvalCtx<'_, i64>| Ok(ctx.get("a")?.min(0))),
        );
        world.write(
            "below",
            Update::rule(move |ctx| {
                seen.set(seen.get() + 1);
                ctx.get("floor")
            }),
        );
        assert_eq!(world.read("below").unwrap(), Some(0));

        downstream_calls.set(0);
        world.write("a", 9);
        assert_eq!(world.read("below").unwrap(), Some(0));
        // The floor recomputed to the same value, so its dependent was
        // never re-invoked.
        assert_eq!(downstream_calls.get(), 0);
    }

    #[test]
    fn reading_an_unknown_key_is_a_rule_failure() {
        let mut world: World<i64> = World::new();
        world.write("e", Update::rule(|ctx| ctx.get("ghost")));

        let err = world.read("e").unwrap_err();
        match err {
            WorldError::RuleFailed { key, source } => {
                assert_eq!(key, Key::from("e"));
                assert!(source.to_string().contains("ghost"));
            }
            other => panic!("expected rule failure, got {other:?}"),
        }
        assert!(world.is_pending("e"));

        // Once the key exists the retried rule completes.
        world.write("ghost", 7);
        assert_eq!(world.read("e").unwrap(), Some(7));
    }
}
