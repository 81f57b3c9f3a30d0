//! Top-level orchestration (spec.md §2): Mapper -> Dialect Detector ->
//! Header Resolver -> Sampler & Type Inferer -> Allocator -> Parallel Body
//! Reader -> Reread Controller, wired into one `read_table` entry point.

use crate::collab::{ColumnSink, Diagnostics, LogSink, ProgressSink, UserOverride};
use crate::dialect::{self, Dialect};
use crate::error::{ReadError, ReadResult};
use crate::header::resolve_header;
use crate::mmap::{AnyMapper, Mapper};
use crate::options::ReadOptions;
use crate::parallel::{finalize, read_body};
use crate::sampler::sample;
use crate::types::{Column, ColumnType};

/// The result of a read: column names alongside their typed storage, in
/// the order they appeared in (or were synthesized for) the input.
#[derive(Debug, Clone)]
pub struct Table {
    pub names: Vec<String>,
    pub columns: Vec<Column>,
}

impl Table {
    pub fn nrow(&self) -> usize {
        self.columns.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn ncol(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.names.iter().position(|n| n == name).map(|i| &self.columns[i])
    }
}

/// The crate's own [`ColumnSink`] (spec.md §6): the concrete, in-memory
/// collaborator implementation SPEC_FULL.md promises alongside the narrow
/// trait. `read_table`'s default pipeline doesn't route through this impl —
/// `parallel::finalize` writes the same `Vec<Column>` directly so the
/// disjoint per-chunk push can run under `rayon` without going through a
/// `&mut dyn ColumnSink` that can't be split across threads — but a caller
/// assembling a `Table` by hand (e.g. from a different source than this
/// crate's own parallel reader) can drive it through this trait exactly as
/// spec.md's collaborator contract describes.
impl ColumnSink for Table {
    fn allocate(&mut self, names: Vec<String>, types: Vec<ColumnType>, capacity: usize) {
        self.names = names;
        self.columns = types
            .iter()
            .map(|&t| {
                let mut c = Column::with_capacity(t, capacity);
                c.resize_nulls(capacity);
                c
            })
            .collect();
    }

    fn realloc_col_type(&mut self, col: usize, new_type: ColumnType) {
        let len = self.columns[col].len();
        let mut replacement = Column::with_capacity(new_type, len);
        replacement.resize_nulls(len);
        self.columns[col] = replacement;
    }

    fn set_final_nrow(&mut self, nrow: usize) {
        for column in &mut self.columns {
            truncate_column(column, nrow);
        }
    }

    fn push_buffer(&mut self, col: usize, row_offset: usize, chunk: &Column) {
        match (&mut self.columns[col], chunk) {
            (Column::Bool8(out), Column::Bool8(vals)) => {
                out[row_offset..row_offset + vals.len()].clone_from_slice(vals);
            }
            (Column::Int32(out), Column::Int32(vals)) => {
                out[row_offset..row_offset + vals.len()].clone_from_slice(vals);
            }
            (Column::Int64(out), Column::Int64(vals)) => {
                out[row_offset..row_offset + vals.len()].clone_from_slice(vals);
            }
            (Column::Float64(out), Column::Float64(vals)) => {
                out[row_offset..row_offset + vals.len()].clone_from_slice(vals);
            }
            (Column::Str(out), Column::Str(vals)) => {
                out[row_offset..row_offset + vals.len()].clone_from_slice(vals);
            }
            _ => unreachable!("push_buffer: chunk type must match the allocated column's type"),
        }
    }
}

/// Keep only the names/columns whose type isn't [`ColumnType::Drop`]
/// (spec.md §3: "Result table: ncol - ndrop columns").
fn drop_filtered_columns(
    names: &[String],
    types: &[ColumnType],
    make: impl Fn(ColumnType) -> Column,
) -> (Vec<String>, Vec<Column>) {
    names
        .iter()
        .zip(types.iter())
        .filter(|&(_, &t)| t != ColumnType::Drop)
        .map(|(n, &t)| (n.clone(), make(t)))
        .unzip()
}

/// Find the byte offset of the line following the first verbatim
/// occurrence of `needle` (spec.md's `skipString`, supplemented from
/// `original_source/src/fread.c`: a non-line-anchored search).
fn resolve_skip_string(input: &[u8], needle: &str) -> ReadResult<usize> {
    let pos = input
        .windows(needle.len().max(1))
        .position(|w| w == needle.as_bytes())
        .ok_or_else(|| ReadError::SkipStringNotFound(needle.to_string()))?;
    let mut i = pos + needle.len();
    while i < input.len() && input[i] != b'\n' && input[i] != b'\r' {
        i += 1;
    }
    if i < input.len() {
        if input[i] == b'\r' && input.get(i + 1) == Some(&b'\n') {
            i += 2;
        } else {
            i += 1;
        }
    }
    Ok(i)
}

fn resolve_skip_nrow(input: &[u8], n: usize) -> usize {
    let mut i = 0;
    for _ in 0..n {
        if i >= input.len() {
            break;
        }
        while i < input.len() && input[i] != b'\n' && input[i] != b'\r' {
            i += 1;
        }
        if i < input.len() {
            if input[i] == b'\r' && input.get(i + 1) == Some(&b'\n') {
                i += 2;
            } else {
                i += 1;
            }
        }
    }
    i
}

fn truncate_column(column: &mut Column, limit: usize) {
    match column {
        Column::Bool8(v) => v.truncate(limit),
        Column::Int32(v) => v.truncate(limit),
        Column::Int64(v) => v.truncate(limit),
        Column::Float64(v) => v.truncate(limit),
        Column::Str(v) => v.truncate(limit),
    }
}

/// Run the full pipeline and return a [`Table`] using the crate's default,
/// in-memory `Column` storage. This is the convenient entry point; callers
/// needing a custom [`crate::collab::ColumnSink`] should compose the
/// individual stages directly (`dialect::detect`, `header::resolve_header`,
/// `sampler::sample`, `parallel::read_body`/`finalize`).
pub fn read_table(opts: ReadOptions) -> ReadResult<Table> {
    read_table_with_sinks(opts, &LogSink, &LogSink, &LogSink)
}

pub fn read_table_with_sinks(
    opts: ReadOptions,
    progress: &dyn ProgressSink,
    diagnostics: &dyn Diagnostics,
    user_override: &dyn UserOverride,
) -> ReadResult<Table> {
    let mapper = AnyMapper::from_input(&opts.input)?;
    let input = mapper.as_bytes();
    if input.is_empty() {
        return Err(ReadError::EmptyInput);
    }

    let mut start = dialect::skip_bom(input);

    if let Some(needle) = opts.skip_string_value() {
        start += resolve_skip_string(&input[start..], needle)?;
    } else if let Some(n) = opts.skip_nrow_value() {
        start += resolve_skip_nrow(&input[start..], n);
    }

    diagnostics.print(&format!("resolving dialect from offset {start}"));
    let dialect: Dialect = dialect::detect(input, start, &opts)?;
    diagnostics.print(&format!(
        "dialect: sep={:?} quote_rule={} eol={:?} dec={:?}",
        dialect.sep as char, dialect.quote_rule, dialect.eol, dialect.dec as char
    ));

    let (mut names, body_start) = resolve_header(input, start, &dialect, &opts);
    let ncol = names.len();

    let sample_result = sample(input, body_start, ncol, &dialect, &opts);
    let mut types = sample_result.types;

    if let Some((override_names, override_types)) = user_override.user_override(&names, &types)? {
        names = override_names;
        types = override_types;
    }

    progress.progress(0.1);

    if body_start >= input.len() {
        // Header-only input: no data rows at all. A column the caller
        // marked Drop still doesn't appear in the result (spec.md §3:
        // "ncol - ndrop columns").
        let (kept_names, columns) = drop_filtered_columns(&names, &types, |t| Column::with_capacity(t, 0));
        return Ok(Table { names: kept_names, columns });
    }

    let body_outcome = read_body(
        input,
        body_start,
        &dialect,
        ncol,
        types,
        sample_result.estimated_nrow,
        &opts,
    )?;
    progress.progress(0.7);

    let total_rows = body_outcome.total_rows;
    let kept: Vec<usize> = body_outcome
        .types
        .iter()
        .enumerate()
        .filter(|&(_, &t)| t != ColumnType::Drop)
        .map(|(i, _)| i)
        .collect();
    let kept_names: Vec<String> = kept.iter().map(|&i| names[i].clone()).collect();
    let mut columns: Vec<Column> = kept
        .iter()
        .map(|&i| {
            let mut c = Column::with_capacity(body_outcome.types[i], total_rows);
            c.resize_nulls(total_rows);
            c
        })
        .collect();
    let names = kept_names;

    finalize(body_outcome, &mut columns, &kept, input, &dialect, &opts)?;

    // `nrowLimit` trims the materialized result to `min(k, total_rows)`
    // (spec.md §8 invariant 7). Chunk planning itself isn't limit-aware —
    // documented in DESIGN.md as a simplification, not a correctness gap:
    // every row through the limit is still exactly the row the full read
    // would have produced.
    if let Some(limit) = opts.nrow_limit {
        if limit < total_rows {
            for column in &mut columns {
                truncate_column(column, limit);
            }
        }
    }

    progress.progress(1.0);

    Ok(Table { names, columns })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{HeaderMode, ReadOptions};

    #[test]
    fn table_as_column_sink_allocates_pushes_and_truncates() {
        let mut table = Table { names: Vec::new(), columns: Vec::new() };
        table.allocate(
            vec!["a".to_string(), "b".to_string()],
            vec![ColumnType::Int32, ColumnType::Str],
            4,
        );
        assert_eq!(table.ncol(), 2);
        assert_eq!(table.nrow(), 4);

        table.push_buffer(0, 0, &Column::Int32(vec![Some(1), Some(2)]));
        table.push_buffer(0, 2, &Column::Int32(vec![Some(3), Some(4)]));
        table.push_buffer(
            1,
            0,
            &Column::Str(vec![
                Some("x".to_string()),
                Some("y".to_string()),
                Some("z".to_string()),
                None,
            ]),
        );

        match table.column("a").unwrap() {
            Column::Int32(v) => assert_eq!(v, &vec![Some(1), Some(2), Some(3), Some(4)]),
            other => panic!("unexpected type: {:?}", other.column_type()),
        }

        table.realloc_col_type(0, ColumnType::Int64);
        assert_eq!(table.columns[0].column_type(), ColumnType::Int64);

        table.set_final_nrow(3);
        assert_eq!(table.nrow(), 3);
    }

    #[test]
    fn reads_simple_csv_with_header() {
        let input = b"name,age\nAlice,30\nBob,40\n".to_vec();
        let opts = ReadOptions::from_bytes(input);
        let table = read_table(opts).unwrap();
        assert_eq!(table.names, vec!["name", "age"]);
        assert_eq!(table.nrow(), 2);
        match table.column("age").unwrap() {
            Column::Int32(v) => assert_eq!(v, &vec![Some(30), Some(40)]),
            other => panic!("unexpected type: {:?}", other.column_type()),
        }
    }

    #[test]
    fn reads_without_header_when_forced() {
        let input = b"1,2\n3,4\n".to_vec();
        let opts = ReadOptions::from_bytes(input).header(HeaderMode::False);
        let table = read_table(opts).unwrap();
        assert_eq!(table.names, vec!["V1", "V2"]);
        assert_eq!(table.nrow(), 2);
    }

    #[test]
    fn skip_nrow_drops_leading_lines() {
        let input = b"junk line\nname,age\nAlice,30\n".to_vec();
        let opts = ReadOptions::from_bytes(input).skip_nrow(1).unwrap();
        let table = read_table(opts).unwrap();
        assert_eq!(table.names, vec!["name", "age"]);
        assert_eq!(table.nrow(), 1);
    }

    #[test]
    fn skip_string_finds_verbatim_marker() {
        let input = b"### BEGIN DATA ###\nname,age\nAlice,30\n".to_vec();
        let opts = ReadOptions::from_bytes(input)
            .skip_string("BEGIN DATA")
            .unwrap();
        let table = read_table(opts).unwrap();
        assert_eq!(table.names, vec!["name", "age"]);
    }

    #[test]
    fn empty_input_is_rejected() {
        let err = read_table(ReadOptions::from_bytes(Vec::new()));
        assert!(matches!(err, Err(ReadError::EmptyInput)));
    }

    struct DropSecondColumn;
    impl crate::collab::UserOverride for DropSecondColumn {
        fn user_override(
            &self,
            names: &[String],
            types: &[ColumnType],
        ) -> ReadResult<Option<(Vec<String>, Vec<ColumnType>)>> {
            let mut types = types.to_vec();
            types[1] = ColumnType::Drop;
            Ok(Some((names.to_vec(), types)))
        }
    }

    #[test]
    fn user_override_drop_excludes_column_from_result() {
        let input = b"name,age,city\nAlice,30,NYC\nBob,40,LA\n".to_vec();
        let opts = ReadOptions::from_bytes(input);
        let table = read_table_with_sinks(
            opts,
            &crate::collab::NullSink,
            &crate::collab::NullSink,
            &DropSecondColumn,
        )
        .unwrap();
        assert_eq!(table.names, vec!["name", "city"]);
        assert_eq!(table.ncol(), 2);
        assert_eq!(table.nrow(), 2);
        match table.column("city").unwrap() {
            Column::Str(v) => {
                assert_eq!(v[0].as_deref(), Some("NYC"));
                assert_eq!(v[1].as_deref(), Some("LA"));
            }
            other => panic!("unexpected type: {:?}", other.column_type()),
        }
    }

    struct CancelRead;
    impl crate::collab::UserOverride for CancelRead {
        fn user_override(
            &self,
            _names: &[String],
            _types: &[ColumnType],
        ) -> ReadResult<Option<(Vec<String>, Vec<ColumnType>)>> {
            Err(ReadError::Cancelled)
        }
    }

    #[test]
    fn user_override_cancel_aborts_cleanly_with_no_data() {
        let input = b"name,age\nAlice,30\n".to_vec();
        let opts = ReadOptions::from_bytes(input);
        let err = read_table_with_sinks(
            opts,
            &crate::collab::NullSink,
            &crate::collab::NullSink,
            &CancelRead,
        )
        .unwrap_err();
        assert!(matches!(err, ReadError::Cancelled));
    }

    #[test]
    fn user_override_drop_on_header_only_input_excludes_column() {
        let input = b"name,age,city\n".to_vec();
        let opts = ReadOptions::from_bytes(input);
        let table = read_table_with_sinks(
            opts,
            &crate::collab::NullSink,
            &crate::collab::NullSink,
            &DropSecondColumn,
        )
        .unwrap();
        assert_eq!(table.names, vec!["name", "city"]);
        assert_eq!(table.nrow(), 0);
    }
}
