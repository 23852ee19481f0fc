//! Dependency Graph
//!
//! This module implements the cell arena and the dependency edges between
//! cells.
//!
//! # Overview
//!
//! The graph is a DAG where:
//!
//! - Nodes are cells: inputs (externally-set values) or formulas (derived
//!   values with declared dependencies)
//! - Edges are dependencies: if A depends on B, B's record lists A as a
//!   dependent
//!
//! # Design Decisions
//!
//! 1. Cells live in a flat arena and identify each other by index, not by
//!    reference, avoiding ownership cycles between dependents and
//!    dependencies. Records are never removed, so indices stay stable.
//!
//! 2. Each record carries its topological depth (rank), maintained on every
//!    edge change. Rank ordering replaces a per-round topological sort.
//!
//! 3. We maintain both forward (dependencies) and reverse (dependents)
//!    edges to enable efficient traversal in both directions.

mod cell;
mod store;

pub use cell::{Cell, CellId, CellKind};
pub(crate) use cell::{CellRecord, UpdateFn};
pub(crate) use store::CellStore;
