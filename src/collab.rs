//! External collaborator traits (spec.md §6): the callback surface the core
//! calls out through rather than owning directly — column allocation,
//! progress, and diagnostics. Grounded on the teacher's `resource.rs`
//! ResourceArc-owns-state pattern, generalized from "owned by the BEAM" to
//! "owned by whatever embeds this crate."

use crate::error::ReadResult;
use crate::types::{Column, ColumnType};

/// Called once, after the header resolver and sampler agree on column
/// names/types, and again if the reread controller needs to widen a column
/// (spec.md §6: `allocateDT`, `reallocColType`).
pub trait ColumnSink {
    /// Allocate `n_cols` columns of the given names/types with `capacity`
    /// rows. Called once per read, before any worker starts pushing rows.
    fn allocate(&mut self, names: Vec<String>, types: Vec<ColumnType>, capacity: usize);

    /// Widen column `col` to `new_type` in place (spec.md §3: only ever
    /// widens). Called from the single-threaded reread controller, never
    /// concurrently with `push`.
    fn realloc_col_type(&mut self, col: usize, new_type: ColumnType);

    /// Trim every column down to its true final row count once the last
    /// chunk has been merged (spec.md §6: `setFinalNrow`).
    fn set_final_nrow(&mut self, nrow: usize);

    /// Called by body-reader workers (spec.md §4.5's disjoint push step) to
    /// commit one thread's fully-typed chunk into the shared table at
    /// `[row_offset, row_offset + chunk.len())`. Row ranges never overlap
    /// across calls, so implementations needn't serialize against
    /// themselves beyond what interior mutability already requires.
    fn push_buffer(&mut self, col: usize, row_offset: usize, chunk: &Column);
}

/// Optional progress reporting (spec.md §6: `progress`). Default no-op.
pub trait ProgressSink: Send + Sync {
    fn progress(&self, fraction_done: f64) {
        let _ = fraction_done;
    }
}

/// Diagnostic sinks (spec.md §6: `DTPRINT`/`DTWARN`/`DTERROR`). The default
/// implementation routes through the `log` facade rather than stdio, so a
/// library consumer controls where these actually land.
pub trait Diagnostics: Send + Sync {
    fn print(&self, message: &str) {
        log::info!("{message}");
    }

    fn warn(&self, message: &str) {
        log::warn!("{message}");
    }

    fn error(&self, message: &str) {
        log::error!("{message}");
    }
}

/// `userOverride` (spec.md §6): inspected once, after the header resolver
/// and sampler produce their best guess at names/types, immediately before
/// allocation. Spec.md models this callback as returning a bool where
/// `false` aborts the read; here that abort path is expressed by returning
/// `Err(`[`crate::error::ReadError::Cancelled`]`)` instead, so cancellation
/// flows through the same `?` the rest of the pipeline already uses.
/// Returning `Ok(Some((names, types)))` lets the caller rename columns or
/// force `ColumnType::Drop`; `Ok(None)` accepts the sampler's guess as-is.
pub trait UserOverride {
    fn user_override(&self, names: &[String], types: &[ColumnType]) -> ReadResult<Option<(Vec<String>, Vec<ColumnType>)>> {
        let _ = (names, types);
        Ok(None)
    }
}

/// Silent no-op diagnostics and progress, for tests and callers that don't
/// care (log-facade `Diagnostics` is the library default used elsewhere;
/// this is for callers who want neither).
pub struct NullSink;

impl ProgressSink for NullSink {}
impl Diagnostics for NullSink {}
impl UserOverride for NullSink {}

/// Log-facade-backed diagnostics/progress, the crate's default.
pub struct LogSink;

impl ProgressSink for LogSink {
    fn progress(&self, fraction_done: f64) {
        log::debug!("read progress: {:.1}%", fraction_done * 100.0);
    }
}
impl Diagnostics for LogSink {}
impl UserOverride for LogSink {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_sink_user_override_is_transparent() {
        let sink = NullSink;
        let names = vec!["a".to_string()];
        let types = vec![ColumnType::Int32];
        assert!(sink.user_override(&names, &types).unwrap().is_none());
    }
}
