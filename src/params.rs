//! Capture of positional bind-parameter values.
//!
//! Prepared-statement APIs bind parameters through a series of setter calls
//! before the statement executes. The store accumulates those values per
//! execution context so the eventual request record can carry them. Values
//! are keyed by positional index only; the store knows nothing about
//! statement identity, so rebinding an index before re-execution simply
//! overwrites the previous value.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;

/// A bound parameter value, reduced to the forms that matter for telemetry.
/// Driver-specific types that do not map onto a primitive are carried as
/// their textual form in `Other`.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Other(String),
}

impl fmt::Display for ParamValue {
    /// Strings and characters render single-quoted (embedded quotes
    /// doubled); everything else renders in its natural textual form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Null => f.write_str("NULL"),
            ParamValue::Bool(value) => write!(f, "{value}"),
            ParamValue::Int(value) => write!(f, "{value}"),
            ParamValue::UInt(value) => write!(f, "{value}"),
            ParamValue::Float(value) => write!(f, "{value}"),
            ParamValue::Text(value) => write!(f, "'{}'", value.replace('\'', "''")),
            ParamValue::Other(value) => f.write_str(value),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(value.into())
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<u64> for ParamValue {
    fn from(value: u64) -> Self {
        ParamValue::UInt(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

/// Immutable snapshot of the values bound at one point in time, keyed by
/// 1-based positional index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapturedParams(BTreeMap<usize, ParamValue>);

impl CapturedParams {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, index: usize) -> Option<&ParamValue> {
        self.0.get(&index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &ParamValue)> {
        self.0.iter().map(|(index, value)| (*index, value))
    }

    /// Renders the captured values as one bracketed, comma-separated list
    /// spanning the full observed index range. An index that was never
    /// bound shows up as an omitted slot rather than an error:
    /// `{1: "abc", 3: 42}` renders as `['abc', , 42]`.
    ///
    /// Returns `None` when nothing was captured.
    pub fn render(&self) -> Option<String> {
        let first = *self.0.keys().next()?;
        let last = *self.0.keys().next_back()?;

        let mut out = String::from("[");
        for index in first..=last {
            if index > first {
                out.push_str(", ");
            }
            if let Some(value) = self.0.get(&index) {
                // Writing into a String cannot fail.
                let _ = write!(out, "{value}");
            }
        }
        out.push(']');
        Some(out)
    }
}

impl FromIterator<(usize, ParamValue)> for CapturedParams {
    fn from_iter<I: IntoIterator<Item = (usize, ParamValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

thread_local! {
    static PARAMS: RefCell<BTreeMap<usize, ParamValue>> = RefCell::new(BTreeMap::new());
}

/// The execution-context-scoped accumulation point for bind calls.
///
/// Scope is one logical statement-execution cycle on one execution context:
/// values accumulate across binding calls and are cleared unconditionally
/// when the outermost execute call of that context completes, success or
/// failure. Values deliberately survive individual execute boundaries until
/// then; bind state tracks the statement, not the call.
#[derive(Debug)]
pub struct ParamStore;

impl ParamStore {
    /// Records a value for a positional index, overwriting any value the
    /// index already carried.
    pub fn bind(index: usize, value: ParamValue) {
        PARAMS.with(|params| {
            params.borrow_mut().insert(index, value);
        });
    }

    /// Takes a defensive copy of the currently bound values. Later binds or
    /// clears do not affect a snapshot already taken.
    pub fn snapshot() -> CapturedParams {
        PARAMS.with(|params| CapturedParams(params.borrow().clone()))
    }

    /// Drops all captured values for this execution context.
    pub fn clear() {
        PARAMS.with(|params| params.borrow_mut().clear());
    }
}
