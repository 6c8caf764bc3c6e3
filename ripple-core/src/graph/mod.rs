//! Dependency Graph
//!
//! This module implements the dependency bookkeeping behind the store:
//!
//! - [`DepGraph`]: which keys each key reads (forward) and which keys read
//!   it (backward), with cycle rejection on every edge insertion
//! - [`DirtyQueue`]: the pending set of keys that must be re-evaluated
//!   before the next externally observed read
//!
//! # Design Decisions
//!
//! 1. Edges are discovered one at a time while rules run, so the graph is
//!    built incrementally and never cleared wholesale. The only removal
//!    operation is dropping a key's own recorded reads when its rule is
//!    replaced.
//!
//! 2. Both directions are maintained explicitly. The forward index scopes
//!    what a running rule may read; the backward index drives dirtiness
//!    propagation.
//!
//! 3. Cycle checking happens before an edge is stored, so an invalid edge
//!    is never observable. The check walks only the subgraph reachable from
//!    the new dependency and runs at most once per distinct edge.

mod deps;
mod dirty;

pub use deps::DepGraph;
pub use dirty::DirtyQueue;
