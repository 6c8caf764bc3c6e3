//! Per-key storage state.

use crate::world::rules::RuleId;

/// What a key holds. Exactly one of the two kinds at any time.
#[derive(Debug)]
pub enum Slot<V> {
    /// A value written directly from outside.
    Input(V),
    /// A rule-derived value. `value` is `None` until the rule first
    /// completes; it then caches the last successful evaluation.
    Computed { rule: RuleId, value: Option<V> },
}

impl<V> Slot<V> {
    /// The materialized value, if any.
    pub fn value(&self) -> Option<&V> {
        match self {
            Slot::Input(value) => Some(value),
            Slot::Computed { value, .. } => value.as_ref(),
        }
    }

    /// The registered rule, for computed slots.
    pub fn rule(&self) -> Option<RuleId> {
        match self {
            Slot::Input(_) => None,
            Slot::Computed { rule, .. } => Some(*rule),
        }
    }

    /// Whether this slot holds a directly written value.
    pub fn is_input(&self) -> bool {
        matches!(self, Slot::Input(_))
    }

    /// Whether this slot is rule-derived.
    pub fn is_computed(&self) -> bool {
        matches!(self, Slot::Computed { .. })
    }
}
