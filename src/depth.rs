//! Re-entrancy suppression for intercepted driver calls.
//!
//! Drivers routinely re-enter their own statement machinery while a call is
//! in flight (metadata lookups are the classic case). Without a depth gate,
//! each re-entry would be intercepted again, producing duplicated telemetry
//! or unbounded recursion. The counter is scoped to the current execution
//! context and to a call class, so unrelated guarded operations never
//! interfere with each other.

use std::cell::Cell;

/// Classes of guarded driver calls. Each class owns an independent depth
/// counter per execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallClass {
    /// Statement execution (queries, updates, prepared-statement executes).
    Statement,
    /// Transaction lifecycle calls (begin, commit, rollback).
    Transaction,
}

const CLASS_COUNT: usize = 2;

impl CallClass {
    fn index(self) -> usize {
        match self {
            CallClass::Statement => 0,
            CallClass::Transaction => 1,
        }
    }
}

thread_local! {
    static DEPTHS: [Cell<usize>; CLASS_COUNT] = [Cell::new(0), Cell::new(0)];
}

/// Handle onto the depth counter of one call class in the current
/// execution context.
///
/// `get_and_increment` returning `0` marks the top-level call of its class;
/// deeper calls are suppressed for interception purposes but must still be
/// balanced with `decrement_and_get` on exit.
#[derive(Debug, Clone, Copy)]
pub struct CallDepth {
    class: CallClass,
}

impl CallDepth {
    pub fn for_class(class: CallClass) -> Self {
        Self { class }
    }

    /// Returns the depth before the increment. Zero means top-level.
    pub fn get_and_increment(&self) -> usize {
        DEPTHS.with(|depths| {
            let cell = &depths[self.class.index()];
            let depth = cell.get();
            cell.set(depth + 1);
            depth
        })
    }

    /// Returns the depth after the decrement. Zero means the outermost call
    /// of this class is completing. Saturates at zero so an unbalanced exit
    /// cannot poison the counter for later calls.
    pub fn decrement_and_get(&self) -> usize {
        DEPTHS.with(|depths| {
            let cell = &depths[self.class.index()];
            let depth = cell.get().saturating_sub(1);
            cell.set(depth);
            depth
        })
    }
}
