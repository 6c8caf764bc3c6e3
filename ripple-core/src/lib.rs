//! Ripple Core
//!
//! This crate provides the core engine for the Ripple incremental dataflow
//! store. It implements:
//!
//! - A key-value store in which a key holds either a plain input value or a
//!   rule deriving its value from other keys
//! - Run-time dependency discovery (rules never declare what they read)
//! - A cycle-checked dependency graph
//! - A dirty-propagation scheduler that recomputes only what changed
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `world`: the store facade, the key/slot model, the rule registry, and
//!   the stabilization loop
//! - `graph`: the dependency graph and the dirty queue
//! - `error`: the error taxonomy
//!
//! # Example
//!
//! ```rust,ignore
//! use ripple_core::{Update, World};
//!
//! let mut world: World<i64> = World::new();
//!
//! // Inputs are written directly.
//! world.write("a", 5);
//! world.write("b", 10);
//!
//! // Computed keys are written as rules. A rule's dependencies are
//! // discovered while it runs, not declared up front.
//! world.write("c", Update::rule(|ctx| Ok(ctx.get("a")? + ctx.get("b")?)));
//!
//! assert_eq!(world.read("c")?, Some(15));
//!
//! // Re-assigning an input recomputes its dependents on the next read.
//! world.write("a", 20);
//! assert_eq!(world.read("c")?, Some(30));
//! ```

pub mod error;
pub mod graph;
pub mod world;

pub use error::{RuleError, WorldError};
pub use world::{EvalCtx, Key, Update, World};
