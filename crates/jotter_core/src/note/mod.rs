//! Note editing: staged field diffs, the commit engine and the working
//! projection callers edit through.
//!
//! # Responsibility
//! - Coalesce field edits of one note into a single commit.
//! - Translate a commit into container and fragment store writes.
//!
//! # Invariants
//! - A diff buffer is owned by exactly one working note.
//! - Failed commit pieces stay pending; committed pieces are cleared.

pub mod commit;
pub mod diff;
pub mod working;

use std::time::{SystemTime, UNIX_EPOCH};

/// Wall clock in epoch milliseconds. Clocks before the epoch read as 0.
pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
        })
}
