//! Error types for weft-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! failure modes of graph construction and propagation. All errors surface
//! synchronously to the call that triggered them; nothing is retried.

use thiserror::Error;

use crate::graph::CellId;

/// Errors produced by the dataflow engine.
#[derive(Debug, Error)]
pub enum FlowError {
    /// The requested dependency edges would make the graph cyclic.
    #[error("dependency cycle through cell {cell:?}")]
    Cycle { cell: CellId },

    /// `set` was applied to a cell that is not an input cell.
    #[error("cell {cell:?} is not an input cell")]
    NotAnInput { cell: CellId },

    /// `set_formula` was applied to a cell that is not a formula cell.
    #[error("cell {cell:?} is not a formula cell")]
    NotAFormula { cell: CellId },

    /// An update function failed during propagation. The failing cell and
    /// its transitive dependents keep their last good values.
    #[error("update function for cell {cell:?} failed: {source}")]
    Compute {
        cell: CellId,
        source: ComputeError,
    },

    /// A destructuring pattern did not match the source value's shape.
    #[error(transparent)]
    Pattern(#[from] PatternError),
}

/// Failure of a formula's update function.
///
/// Update functions return this directly; the propagator wraps it into
/// [`FlowError::Compute`] together with the failing cell.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ComputeError {
    message: String,
}

impl ComputeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<PatternError> for ComputeError {
    fn from(err: PatternError) -> Self {
        Self::new(err.to_string())
    }
}

/// Shape mismatch between a destructuring pattern and a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    /// A sequence pattern was applied to a non-sequence value.
    #[error("pattern expects a sequence, found {found}")]
    NotASeq { found: &'static str },

    /// A sequence pattern needs more elements than the value provides.
    #[error("pattern expects at least {expected} elements, found {found}")]
    SeqArity { expected: usize, found: usize },

    /// A map pattern was applied to a non-map value.
    #[error("pattern expects a map, found {found}")]
    NotAMap { found: &'static str },

    /// A map pattern names a key the value does not contain.
    #[error("missing key {key:?} in map")]
    MissingKey { key: String },

    /// The same name is bound more than once in one pattern.
    #[error("duplicate binding {name:?} in pattern")]
    DuplicateBinding { name: String },
}
