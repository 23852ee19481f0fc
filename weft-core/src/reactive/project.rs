//! Destructuring Projector
//!
//! Projects a compound source cell through a binding pattern into one
//! derived cell per bound name.
//!
//! The projection is built as a single hidden formula that evaluates the
//! pattern against the source value and yields the bound values as a
//! fixed-order tuple, plus one trivial slot-selecting formula per name.
//! Because every per-name cell depends on the same tuple formula, all of
//! them settle within the same propagation round as the source; no bound
//! name is ever observed ahead of or behind another for the same change.
//!
//! Pattern evaluation fails loudly: a source value whose shape does not
//! match the pattern produces an error that freezes the projection cells at
//! their last good values, surfaced to whichever call mutated the source.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{FlowError, PatternError};
use crate::graph::Cell;
use crate::reactive::runtime::Runtime;
use crate::value::Value;

/// A binding pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Pattern {
    /// Bind the matched value to a name.
    Bind(String),

    /// Match anything, bind nothing.
    Ignore,

    /// Positionally match a sequence. The value must be a sequence with at
    /// least as many elements as there are sub-patterns; extra elements are
    /// ignored.
    Seq(Vec<Pattern>),

    /// Match map entries by key. Every named key must be present.
    Map(Vec<(String, Pattern)>),
}

impl Pattern {
    /// Convenience constructor for a binding.
    pub fn bind(name: impl Into<String>) -> Self {
        Pattern::Bind(name.into())
    }

    /// Names bound by this pattern, in evaluation order.
    ///
    /// Fails if the same name is bound twice.
    pub fn bound_names(&self) -> Result<Vec<String>, PatternError> {
        let mut names = Vec::new();
        self.collect_names(&mut names)?;
        Ok(names)
    }

    fn collect_names(&self, names: &mut Vec<String>) -> Result<(), PatternError> {
        match self {
            Pattern::Bind(name) => {
                if names.iter().any(|n| n == name) {
                    return Err(PatternError::DuplicateBinding { name: name.clone() });
                }
                names.push(name.clone());
            }
            Pattern::Ignore => {}
            Pattern::Seq(items) => {
                for item in items {
                    item.collect_names(names)?;
                }
            }
            Pattern::Map(entries) => {
                for (_, sub) in entries {
                    sub.collect_names(names)?;
                }
            }
        }
        Ok(())
    }

    /// Evaluate the pattern against `value`, pushing bound values in the
    /// same order `bound_names` reports them.
    pub fn eval(&self, value: &Value, out: &mut Vec<Value>) -> Result<(), PatternError> {
        match self {
            Pattern::Bind(_) => out.push(value.clone()),
            Pattern::Ignore => {}
            Pattern::Seq(items) => {
                let seq = value.as_seq().ok_or(PatternError::NotASeq {
                    found: value.kind_name(),
                })?;
                if seq.len() < items.len() {
                    return Err(PatternError::SeqArity {
                        expected: items.len(),
                        found: seq.len(),
                    });
                }
                for (item, element) in items.iter().zip(seq) {
                    item.eval(element, out)?;
                }
            }
            Pattern::Map(entries) => {
                let map = value.as_map().ok_or(PatternError::NotAMap {
                    found: value.kind_name(),
                })?;
                for (key, sub) in entries {
                    let element = map.get(key).ok_or_else(|| PatternError::MissingKey {
                        key: key.clone(),
                    })?;
                    sub.eval(element, out)?;
                }
            }
        }
        Ok(())
    }
}

impl Runtime {
    /// Project `source` through `pattern`, returning one derived cell per
    /// bound name in pattern order.
    ///
    /// The pattern is checked against the source's current value, so a
    /// projection never starts out frozen; later mismatches surface as
    /// compute errors to the mutating caller.
    pub fn project(
        &self,
        pattern: &Pattern,
        source: Cell,
    ) -> Result<IndexMap<String, Cell>, FlowError> {
        let names = pattern.bound_names()?;

        let mut bound = Vec::with_capacity(names.len());
        pattern.eval(&self.get(source), &mut bound)?;

        let tuple_pattern = pattern.clone();
        let tuple = self.formula(&[source], move |vals| {
            let mut out = Vec::new();
            tuple_pattern.eval(&vals[0], &mut out)?;
            Ok(Value::Seq(out))
        })?;

        let mut cells = IndexMap::with_capacity(names.len());
        for (slot, name) in names.into_iter().enumerate() {
            let cell = self.formula(&[tuple], move |vals| {
                Ok(vals[0]
                    .as_seq()
                    .and_then(|s| s.get(slot))
                    .cloned()
                    .unwrap_or(Value::Nil))
            })?;
            cells.insert(name, cell);
        }
        Ok(cells)
    }
}
