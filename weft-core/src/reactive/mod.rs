//! Reactive Engine
//!
//! This module implements the runtime layer over the cell graph: glitch-free
//! propagation, transactions, watchers, sequence reconciliation, and
//! destructuring projection.
//!
//! # Concepts
//!
//! ## Inputs and formulas
//!
//! An input cell holds an externally-set value. A formula cell derives its
//! value from an explicit, ordered list of dependency cells through a pure
//! update function. There is no implicit dependency tracking: the caller
//! declares what a formula reads, and the declaration is the contract.
//!
//! ## Propagation
//!
//! Setting an input recomputes every transitively affected formula exactly
//! once, in dependency (rank) order, against fully settled upstream values.
//! A formula depending on one input through two paths sees a single
//! consistent view and recomputes once.
//!
//! ## Transactions
//!
//! A transaction defers propagation so several input changes settle as one
//! atomic round. Transactions nest; only the outermost commit flushes.
//!
//! ## Watchers, reconciliation, projection
//!
//! Watchers observe (old, new) per settled change. The sequence reconciler
//! maintains stable per-index cells over a variable-length sequence. The
//! projector splits a compound value into per-binding cells that update in
//! lockstep.

mod project;
mod runtime;
mod sequence;
mod transaction;
pub(crate) mod watcher;

pub use project::Pattern;
pub use runtime::Runtime;
pub use sequence::Reconciler;
pub use watcher::{WatchHandle, WatcherId};
