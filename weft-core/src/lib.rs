//! Weft Core
//!
//! This crate provides the core engine for the weft reactive dataflow
//! library. It implements:
//!
//! - Input and formula cells with explicit dependency declaration
//! - Glitch-free, rank-ordered propagation
//! - Transactional batching of input mutations
//! - Incremental reconciliation of sequence-valued cells
//! - Destructuring projection of compound values
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: the cell arena and dependency edges
//! - `reactive`: the runtime, propagation, transactions, watchers, and the
//!   reconciler/projector built on top
//! - `value`: the dynamic value model cells hold
//! - `error`: the error taxonomy
//!
//! # Example
//!
//! ```rust
//! use weft_core::{Runtime, Value};
//!
//! let rt = Runtime::new();
//!
//! // Two inputs and a formula over both.
//! let a = rt.input(1i64);
//! let b = rt.input(2i64);
//! let sum = rt
//!     .formula(&[a, b], |vals| {
//!         Ok(Value::Int(
//!             vals[0].as_int().unwrap_or(0) + vals[1].as_int().unwrap_or(0),
//!         ))
//!     })
//!     .unwrap();
//!
//! assert_eq!(rt.get(sum), Value::Int(3));
//!
//! // Both changes settle as one propagation round.
//! rt.transaction(|| {
//!     rt.set(a, 10i64).unwrap();
//!     rt.set(b, 20i64).unwrap();
//! })
//! .unwrap();
//! assert_eq!(rt.get(sum), Value::Int(30));
//! ```

pub mod error;
pub mod graph;
pub mod reactive;
pub mod value;

pub use error::{ComputeError, FlowError, PatternError};
pub use graph::{Cell, CellId, CellKind};
pub use reactive::{Pattern, Reconciler, Runtime, WatchHandle, WatcherId};
pub use value::Value;
