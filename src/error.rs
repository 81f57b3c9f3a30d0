//! Error kinds for the reader, modeled as contracts rather than raw string
//! messages (spec.md §7). Every terminal error carries enough context
//! (byte offsets, line numbers) for a caller to report a precise diagnostic.

use std::path::PathBuf;

/// Up to this many bytes of surrounding input are quoted in diagnostics.
pub const ERROR_CONTEXT_BYTES: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("input path {0:?} does not exist or could not be opened: {1}")]
    PathNotFound(PathBuf, std::io::Error),

    #[error("input is empty")]
    EmptyInput,

    #[error("failed to memory-map input: {0}")]
    Mmap(std::io::Error),

    #[error("thread count must be >= 1, got {0}")]
    ZeroThreads(usize),

    #[error(
        "no (separator, quote rule) pair produced a consistent field count \
         in the first {rows_tried} candidate rows"
    )]
    DialectNotDetected { rows_tried: usize },

    #[error("separator, quote, and decimal point must be pairwise distinct (got sep={sep:?} quote={quote:?} dec={dec:?})")]
    DialectCollision { sep: u8, quote: u8, dec: u8 },

    #[error("skipString {0:?} was not found in the input")]
    SkipStringNotFound(String),

    #[error("invalid NA string {0:?}: must not have leading/trailing whitespace and must not collide with a boolean literal")]
    InvalidNaString(String),

    #[error("skipNrow and skipString are mutually exclusive")]
    ConflictingSkip,

    #[error(
        "line {line}: expected {expected} fields, found {found} and fill=false (context: {context:?})"
    )]
    TooFewFields {
        line: usize,
        expected: usize,
        found: usize,
        context: String,
    },

    #[error("line {line}: found {found} fields, expected at most {expected} (context: {context:?})")]
    TooManyFields {
        line: usize,
        expected: usize,
        found: usize,
        context: String,
    },

    #[error("line {line}: unterminated quoted field at end of file (context: {context:?})")]
    UnterminatedQuote { line: usize, context: String },

    #[error(
        "chunk desync: chunk {prev_chunk} ended at byte {prev_end}, but chunk {next_chunk} \
         began nextGoodLine search at {next_start} (context before: {before:?}, after: {after:?})"
    )]
    ChunkDesync {
        prev_chunk: usize,
        prev_end: usize,
        next_chunk: usize,
        next_start: usize,
        before: String,
        after: String,
    },

    #[error("a reread encountered a type exception that sampling/body reading did not: {0}")]
    ReadTypeInvariantViolated(String),

    /// `userOverride` returned false: a clean cancellation, not a failure.
    #[error("read cancelled by caller override")]
    Cancelled,
}

pub type ReadResult<T> = Result<T, ReadError>;

/// Render up to [`ERROR_CONTEXT_BYTES`] of `input` around `pos` as a lossy
/// string for inclusion in a diagnostic.
pub fn context_snippet(input: &[u8], pos: usize) -> String {
    let start = pos.saturating_sub(ERROR_CONTEXT_BYTES / 2);
    let end = (pos + ERROR_CONTEXT_BYTES / 2).min(input.len());
    String::from_utf8_lossy(&input[start..end]).into_owned()
}
