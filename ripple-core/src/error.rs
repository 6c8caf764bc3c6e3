//! Error taxonomy for the dataflow engine.
//!
//! Two layers exist. [`RuleError`] is the per-attempt result a rule hands
//! back to the stabilizer; its `Unsatisfied` variant is consumed internally
//! to drive dependency discovery and never reaches the caller. [`WorldError`]
//! is what escapes from `read`/`materialize` when a stabilization pass
//! aborts.

use std::error::Error as StdError;

use thiserror::Error;

use crate::world::Key;

/// Boxed payload for arbitrary rule failures.
pub type BoxedFault = Box<dyn StdError + Send + Sync + 'static>;

/// Fatal faults surfaced by the operations that trigger stabilization.
#[derive(Debug, Error)]
pub enum WorldError {
    /// Recording a dependency edge would close a cycle. Carries the
    /// already-recorded chain from the dependency to the dependent; the
    /// rejected edge would have completed the loop.
    #[error("dependency cycle: {}", render_path(.path))]
    Cycle { path: Vec<Key> },

    /// A rule attempted to write a key while it was executing.
    #[error("rule for `{key}` attempted to write `{target}` during evaluation")]
    WriteDuringEval { key: Key, target: Key },

    /// A rule failed for any reason other than a missing dependency.
    #[error("rule for `{key}` failed: {source}")]
    RuleFailed {
        key: Key,
        #[source]
        source: BoxedFault,
    },
}

/// Outcome signal for a single rule invocation attempt.
///
/// Rules return `Result<V, RuleError>`; the stabilizer branches on the
/// variant.
#[derive(Debug, Error)]
pub enum RuleError {
    /// The rule read a key that is not yet available to it. The stabilizer
    /// records the edge and retries the rule later.
    #[error("dependency `{0}` is not yet available")]
    Unsatisfied(Key),

    /// The rule attempted a store write. Always fatal.
    #[error("write to `{0}` rejected during evaluation")]
    WriteRejected(Key),

    /// Any other failure raised by the rule body. Always fatal.
    #[error("{0}")]
    Fault(BoxedFault),
}

impl RuleError {
    /// Wrap an arbitrary error as a fatal rule fault.
    pub fn fault(err: impl Into<BoxedFault>) -> Self {
        Self::Fault(err.into())
    }
}

impl From<String> for RuleError {
    fn from(msg: String) -> Self {
        Self::Fault(msg.into())
    }
}

impl From<&str> for RuleError {
    fn from(msg: &str) -> Self {
        Self::Fault(msg.into())
    }
}

fn render_path(path: &[Key]) -> String {
    path.iter()
        .map(Key::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}
