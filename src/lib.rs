//! A high-throughput delimited-text (CSV-family) reader.
//!
//! Given a bytestream, this crate auto-detects the dialect (separator,
//! quote rule, end-of-line style), infers a type for each column from a
//! sparse sample of rows, allocates columnar storage once, and parses the
//! body in parallel across chunks of the file — widening a column's type
//! and selectively rereading the chunks that needed it if a value outside
//! the sample turns out to need more room than the sample predicted.
//!
//! ```no_run
//! use fastframe::{ReadOptions, read_table};
//!
//! let table = read_table(ReadOptions::from_path("data.csv")).unwrap();
//! println!("{} rows x {} cols", table.nrow(), table.ncol());
//! ```
//!
//! The pipeline's stages are exposed individually in [`dialect`],
//! [`header`], [`sampler`], and [`parallel`] for callers who want to supply
//! their own [`collab::ColumnSink`] rather than use the built-in [`Table`].

// `expect_used` is allowed outside tests for the handful of lock-poisoning
// `.expect()` calls in `parallel.rs` — a poisoned mutex there means another
// worker thread already panicked, so the message is genuinely for a human
// debugging a panic, not a reachable data-dependent failure.
#![cfg_attr(not(test), deny(clippy::unwrap_used))]

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod collab;
pub mod dialect;
pub mod error;
pub mod header;
pub mod mmap;
pub mod options;
pub mod parallel;
pub mod sampler;
pub mod scanners;
pub mod types;

mod reader;

pub use error::{ReadError, ReadResult};
pub use options::{DecOverride, HeaderMode, Input, QuoteOverride, ReadOptions, SepOverride};
pub use reader::{read_table, read_table_with_sinks, Table};
pub use types::{Column, ColumnType};
