//! Column type total order and the default in-memory column storage
//! (spec.md §3: "DROP < BOOL8 < INT32 < INT64 < FLOAT64 < STRING, total,
//! used only to widen, never narrow"). Grounded on `SamedhG-sorer`'s
//! `DataType`/`Column`/`Data` enums, reordered to the spec's precedence and
//! extended with a `Drop` member for columns the caller excludes entirely.

use crate::scanners::{is_na_float64, NA_BOOL8, NA_INT32, NA_INT64};

/// A column's current or final type. Ordered so that `max(a, b)` is always
/// a type wide enough to hold both (spec.md §3's widening invariant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ColumnType {
    Drop,
    Bool8,
    Int32,
    Int64,
    Float64,
    Str,
}

impl ColumnType {
    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::Drop => "drop",
            ColumnType::Bool8 => "bool8",
            ColumnType::Int32 => "int32",
            ColumnType::Int64 => "int64",
            ColumnType::Float64 => "float64",
            ColumnType::Str => "string",
        }
    }
}

/// One materialized column. `String` fields are stored resolved (allocated)
/// here since this is the *default* collaborator — spec.md §4.1 forbids the
/// scanner itself from copying, not the sink from choosing to.
#[derive(Debug, Clone)]
pub enum Column {
    Bool8(Vec<Option<bool>>),
    Int32(Vec<Option<i32>>),
    Int64(Vec<Option<i64>>),
    Float64(Vec<Option<f64>>),
    Str(Vec<Option<String>>),
}

impl Column {
    pub fn column_type(&self) -> ColumnType {
        match self {
            Column::Bool8(_) => ColumnType::Bool8,
            Column::Int32(_) => ColumnType::Int32,
            Column::Int64(_) => ColumnType::Int64,
            Column::Float64(_) => ColumnType::Float64,
            Column::Str(_) => ColumnType::Str,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Bool8(v) => v.len(),
            Column::Int32(v) => v.len(),
            Column::Int64(v) => v.len(),
            Column::Float64(v) => v.len(),
            Column::Str(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn with_capacity(ty: ColumnType, cap: usize) -> Self {
        match ty {
            ColumnType::Drop => Column::Bool8(Vec::new()),
            ColumnType::Bool8 => Column::Bool8(Vec::with_capacity(cap)),
            ColumnType::Int32 => Column::Int32(Vec::with_capacity(cap)),
            ColumnType::Int64 => Column::Int64(Vec::with_capacity(cap)),
            ColumnType::Float64 => Column::Float64(Vec::with_capacity(cap)),
            ColumnType::Str => Column::Str(Vec::with_capacity(cap)),
        }
    }

    pub fn resize_nulls(&mut self, n: usize) {
        match self {
            Column::Bool8(v) => v.resize(n, None),
            Column::Int32(v) => v.resize(n, None),
            Column::Int64(v) => v.resize(n, None),
            Column::Float64(v) => v.resize(n, None),
            Column::Str(v) => v.resize(n, None),
        }
    }
}

/// A per-thread, per-column contiguous buffer of the column's *current*
/// type (spec.md §3: "Thread chunk state"). Grows geometrically (x1.5) as a
/// chunk turns out to hold more rows than estimated.
#[derive(Debug, Clone)]
pub enum RowBuffer {
    Bool8(Vec<i8>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float64(Vec<f64>),
    /// (offset, len) spans into the chunk's input slice; materialized to a
    /// `String` only when pushed into the final `Column`.
    Str(Vec<(u32, u32)>),
    /// A column the caller marked [`ColumnType::Drop`] via `userOverride`:
    /// its bytes are still stepped through so column indexing stays aligned
    /// (spec.md §4.6), but nothing is stored — just a row count.
    Dropped(usize),
}

const GROWTH_FACTOR: f64 = 1.5;

impl RowBuffer {
    pub fn with_capacity(ty: ColumnType, cap: usize) -> Self {
        match ty {
            ColumnType::Drop => RowBuffer::Dropped(0),
            ColumnType::Bool8 => RowBuffer::Bool8(Vec::with_capacity(cap)),
            ColumnType::Int32 => RowBuffer::Int32(Vec::with_capacity(cap)),
            ColumnType::Int64 => RowBuffer::Int64(Vec::with_capacity(cap)),
            ColumnType::Float64 => RowBuffer::Float64(Vec::with_capacity(cap)),
            ColumnType::Str => RowBuffer::Str(Vec::with_capacity(cap)),
        }
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            RowBuffer::Bool8(_) => ColumnType::Bool8,
            RowBuffer::Int32(_) => ColumnType::Int32,
            RowBuffer::Int64(_) => ColumnType::Int64,
            RowBuffer::Float64(_) => ColumnType::Float64,
            RowBuffer::Str(_) => ColumnType::Str,
            RowBuffer::Dropped(_) => ColumnType::Drop,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RowBuffer::Bool8(v) => v.len(),
            RowBuffer::Int32(v) => v.len(),
            RowBuffer::Int64(v) => v.len(),
            RowBuffer::Float64(v) => v.len(),
            RowBuffer::Str(v) => v.len(),
            RowBuffer::Dropped(n) => *n,
        }
    }

    /// Step past one field without storing it (dropped columns only).
    pub fn push_dropped(&mut self) {
        if let RowBuffer::Dropped(n) = self {
            *n += 1;
        }
    }

    /// Grow capacity by [`GROWTH_FACTOR`] (spec.md §4.5: "a thread chunk
    /// whose row count exceeds the sampler's estimate grows its row buffer
    /// geometrically rather than reallocating per row").
    pub fn grow(&mut self) {
        fn next_cap(len: usize) -> usize {
            ((len as f64 * GROWTH_FACTOR).ceil() as usize).max(len + 1)
        }
        match self {
            RowBuffer::Bool8(v) => v.reserve(next_cap(v.len()) - v.len()),
            RowBuffer::Int32(v) => v.reserve(next_cap(v.len()) - v.len()),
            RowBuffer::Int64(v) => v.reserve(next_cap(v.len()) - v.len()),
            RowBuffer::Float64(v) => v.reserve(next_cap(v.len()) - v.len()),
            RowBuffer::Str(v) => v.reserve(next_cap(v.len()) - v.len()),
            RowBuffer::Dropped(_) => {}
        }
    }

    /// Materialize this thread-local buffer's values into rows
    /// `[row_offset, row_offset + len)` of `column`, resolving `Str` spans
    /// against `source` and unescaping per the dialect's quote rule.
    pub fn push_into(
        &self,
        column: &mut Column,
        row_offset: usize,
        source: &[u8],
        quote: u8,
        quote_rule: u8,
    ) {
        match (self, column) {
            (RowBuffer::Bool8(vals), Column::Bool8(out)) => {
                for (i, &v) in vals.iter().enumerate() {
                    out[row_offset + i] = if v == NA_BOOL8 { None } else { Some(v != 0) };
                }
            }
            (RowBuffer::Int32(vals), Column::Int32(out)) => {
                for (i, &v) in vals.iter().enumerate() {
                    out[row_offset + i] = if v == NA_INT32 { None } else { Some(v) };
                }
            }
            (RowBuffer::Int64(vals), Column::Int64(out)) => {
                for (i, &v) in vals.iter().enumerate() {
                    out[row_offset + i] = if v == NA_INT64 { None } else { Some(v) };
                }
            }
            (RowBuffer::Float64(vals), Column::Float64(out)) => {
                for (i, &v) in vals.iter().enumerate() {
                    out[row_offset + i] = if is_na_float64(v) { None } else { Some(v) };
                }
            }
            (RowBuffer::Str(spans), Column::Str(out)) => {
                let mut scratch = Vec::new();
                for (i, &(offset, len)) in spans.iter().enumerate() {
                    out[row_offset + i] = if len == crate::scanners::NA_STRING_LEN {
                        None
                    } else {
                        let raw = &source[offset as usize..offset as usize + len as usize];
                        if quote_rule <= 1 && quote != 0 {
                            crate::scanners::unescape_into(raw, quote, quote_rule, &mut scratch);
                            Some(String::from_utf8_lossy(&scratch).into_owned())
                        } else {
                            Some(String::from_utf8_lossy(raw).into_owned())
                        }
                    };
                }
            }
            _ => unreachable!("RowBuffer and Column type mismatch: push step must match types"),
        }
    }
}
