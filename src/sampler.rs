//! Sampler & type inferer (spec.md §4.4): reads a sparse sample of rows
//! spread across the file via jump points, infers each column's narrowest
//! sufficient type over that sample, and estimates the total row count from
//! observed line-length statistics. Grounded on
//! `brutusyhy-polars`'s `get_line_stats`/`SequentialReader::find_starting_point`
//! for the row-count estimator and on
//! `other_examples/.../schema_inference.rs`'s `finish_infer_field_schema`
//! for the widen-over-sample shape.

use crate::dialect::Dialect;
use crate::header::split_row;
use crate::options::ReadOptions;
use crate::scanners::{peek_field, scan_bool, scan_float64, scan_int32, scan_int64};
use crate::types::ColumnType;

/// Number of jump points sampled across the file, excluding the first
/// (always-sampled) chunk (spec.md §4.4).
const N_JUMPS: usize = 10;
/// Rows read at each jump point.
const ROWS_PER_JUMP: usize = 10;

#[derive(Debug, Clone)]
pub struct SampleResult {
    pub types: Vec<ColumnType>,
    pub estimated_nrow: usize,
    pub mean_line_len: f64,
}

/// Snap `pos` forward to the start of the next line that tokenizes cleanly
/// under `dialect` with exactly `ncol` fields — the `nextGoodLine`
/// heuristic (spec.md §9's open question; resolved here, see DESIGN.md).
/// Gives up after `max_lines_to_try` candidate starts and returns `pos`
/// unchanged, letting the caller treat that jump point as unusable.
pub(crate) fn next_good_line(
    input: &[u8],
    pos: usize,
    dialect: &Dialect,
    ncol: usize,
    strip: bool,
    max_lines_to_try: usize,
) -> Option<usize> {
    let mut candidate = pos;
    for _ in 0..max_lines_to_try {
        if candidate >= input.len() {
            return None;
        }
        let (fields, next) = split_row(input, candidate, dialect, strip);
        if fields.len() == ncol {
            return Some(candidate);
        }
        if next == candidate {
            return None;
        }
        candidate = next;
    }
    None
}

/// Widen `current` to accommodate `field`, trying types from `current`
/// upward (spec.md §3: type only ever widens).
pub(crate) fn widen_for_field(
    input: &[u8],
    field_start: usize,
    field_end: usize,
    current: ColumnType,
    dialect: &Dialect,
    opts: &ReadOptions,
) -> ColumnType {
    let span = crate::scanners::FieldSpan {
        start: field_start,
        end: field_end,
        next: field_end,
        quoted: false,
        at_eol: true,
        at_eof: false,
    };
    let empty = field_start == field_end;
    if empty {
        return current;
    }
    let is_na = crate::scanners::is_na_string(
        &input[field_start..field_end],
        &opts.na_strings,
    );
    if is_na {
        return current;
    }

    let mut ty = current;
    if ty <= ColumnType::Bool8 && scan_bool(span, input, opts.accept_bare_01_bool).is_some() {
        return ty.max(ColumnType::Bool8);
    }
    ty = ty.max(ColumnType::Bool8);
    if ty <= ColumnType::Int32 && scan_int32(span, input).is_some() {
        return ty.max(ColumnType::Int32);
    }
    ty = ty.max(ColumnType::Int32);
    if ty <= ColumnType::Int64 && scan_int64(span, input).is_some() {
        return ty.max(ColumnType::Int64);
    }
    ty = ty.max(ColumnType::Int64);
    if ty <= ColumnType::Float64 && scan_float64(span, input, dialect.dec).is_some() {
        return ty.max(ColumnType::Float64);
    }
    ColumnType::Str
}

/// Sample the body starting at `body_start` and infer a type per column,
/// plus an estimated total row count (spec.md §4.4).
pub fn sample(
    input: &[u8],
    body_start: usize,
    ncol: usize,
    dialect: &Dialect,
    opts: &ReadOptions,
) -> SampleResult {
    let mut types = vec![ColumnType::Drop; ncol];
    let mut line_lens: Vec<usize> = Vec::new();
    let eof = input.len();

    let body_len = eof.saturating_sub(body_start);
    // Jump points spread evenly across the remaining input; the first
    // chunk (index 0) starts exactly at body_start.
    let jump_size = if N_JUMPS == 0 { body_len } else { body_len / (N_JUMPS + 1) };

    let mut rows_sampled = 0usize;

    for jump in 0..=N_JUMPS {
        let nominal = body_start + jump * jump_size.max(1);
        if nominal >= eof {
            break;
        }
        let start = if jump == 0 {
            Some(nominal)
        } else {
            next_good_line(input, nominal, dialect, ncol, opts.strip_white, 30)
        };
        let Some(mut pos) = start else { continue };

        for _ in 0..ROWS_PER_JUMP {
            if pos >= eof {
                break;
            }
            let row_start = pos;
            let (fields, next) = split_row(input, pos, dialect, opts.strip_white);
            if next == pos {
                break;
            }
            if opts.skip_empty_lines && fields.len() == 1 && fields[0].is_empty() {
                pos = next;
                continue;
            }
            line_lens.push(next - row_start);
            rows_sampled += 1;

            let n = fields.len();
            if n != ncol && !opts.fill {
                // A ragged row during sampling under fill=false is a shape
                // problem the body reader will raise properly; the sampler
                // just stops growing types from it.
                pos = next;
                continue;
            }
            for (col, field) in fields.iter().enumerate().take(ncol) {
                let field_start = field.as_ptr() as usize - input.as_ptr() as usize;
                let field_end = field_start + field.len();
                types[col] = widen_for_field(input, field_start, field_end, types[col], dialect, opts);
            }
            if opts.fill && n > ncol {
                // fread.c's fill-widening: a sampled row wider than the
                // header raises the working column count (supplemented
                // feature, see SPEC_FULL.md).
                for field in fields.iter().skip(ncol) {
                    let field_start = field.as_ptr() as usize - input.as_ptr() as usize;
                    let field_end = field_start + field.len();
                    let ty = widen_for_field(input, field_start, field_end, ColumnType::Drop, dialect, opts);
                    types.push(ty);
                }
            }
            pos = next;
        }
    }

    // Columns nothing was ever sampled for default to STRING (spec.md
    // §4.4: "a type with no successful sample defaults to the widest
    // type", never left at DROP unless the caller explicitly drops it).
    for ty in types.iter_mut() {
        if *ty == ColumnType::Drop {
            *ty = ColumnType::Str;
        }
    }

    let mean_line_len = if line_lens.is_empty() {
        1.0
    } else {
        line_lens.iter().sum::<usize>() as f64 / line_lens.len() as f64
    };

    // Row-count estimate: remaining bytes / mean observed line length,
    // inflated by one standard deviation to bias toward over-allocation
    // (spec.md §4.4; grounds on polars-io's `get_line_stats`, which uses
    // the same mean +/- variance shape to bound a single allocation pass).
    let variance = if line_lens.len() > 1 {
        let mean = mean_line_len;
        line_lens
            .iter()
            .map(|&l| {
                let d = l as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / (line_lens.len() as f64 - 1.0)
    } else {
        0.0
    };
    let stddev = variance.sqrt();
    let safe_mean_len = (mean_line_len - stddev * 0.5).max(1.0);
    let estimated_nrow = ((body_len as f64 / safe_mean_len).ceil() as usize).max(rows_sampled);

    SampleResult {
        types,
        estimated_nrow,
        mean_line_len,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Eol;

    fn comma() -> Dialect {
        Dialect {
            sep: b',',
            eol: Eol::Lf,
            quote: b'"',
            quote_rule: 0,
            dec: b'.',
        }
    }

    #[test]
    fn infers_int_then_widens_to_float_then_string() {
        let input = b"1\n2\n3.5\nhello\n";
        let opts = ReadOptions::from_bytes(Vec::new());
        let result = sample(input, 0, 1, &comma(), &opts);
        assert_eq!(result.types[0], ColumnType::Str);
    }

    #[test]
    fn stays_int32_when_all_sampled_values_are_small_integers() {
        let input = b"1,2\n3,4\n5,6\n";
        let opts = ReadOptions::from_bytes(Vec::new());
        let result = sample(input, 0, 2, &comma(), &opts);
        assert_eq!(result.types[0], ColumnType::Int32);
        assert_eq!(result.types[1], ColumnType::Int32);
    }

    #[test]
    fn na_strings_do_not_widen_type() {
        let input = b"1,NA\n2,3\n4,\n";
        let opts = ReadOptions::from_bytes(Vec::new());
        let result = sample(input, 0, 2, &comma(), &opts);
        assert_eq!(result.types[1], ColumnType::Int32);
    }

    #[test]
    fn estimated_nrow_is_at_least_rows_sampled() {
        let input = b"1,2\n3,4\n5,6\n7,8\n";
        let opts = ReadOptions::from_bytes(Vec::new());
        let result = sample(input, 0, 2, &comma(), &opts);
        assert!(result.estimated_nrow >= 4);
    }
}
