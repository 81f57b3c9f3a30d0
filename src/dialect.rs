//! The Dialect tuple and its detector (spec.md §4.2). Grounded on
//! `examples/other_examples/.../format/character_separated/detection.rs`'s
//! `DetectionScore`/candidate-scoring shape, combined with the teacher's
//! `core::newlines::Newlines` for end-of-line matching.

use crate::error::{ReadError, ReadResult};
use crate::options::{DecOverride, QuoteOverride, ReadOptions, SepOverride};

/// End-of-line style. Matching is tried in byte-length order so `CrLf`
/// (two bytes) is preferred over a lone `Cr` when both would match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eol {
    Lf,
    CrLf,
    Cr,
    /// `\n\r` — legal but unusual (spec.md §9); accepted, never produced.
    LfCr,
}

impl Eol {
    /// Byte length matched at `pos`, or 0 if this variant doesn't match
    /// there.
    #[inline]
    pub fn match_at(&self, input: &[u8], pos: usize) -> usize {
        let rest = &input[pos..];
        match self {
            Eol::Lf => if rest.first() == Some(&b'\n') { 1 } else { 0 },
            Eol::CrLf => if rest.starts_with(b"\r\n") { 2 } else { 0 },
            Eol::Cr => if rest.first() == Some(&b'\r') { 1 } else { 0 },
            Eol::LfCr => if rest.starts_with(b"\n\r") { 2 } else { 0 },
        }
    }
}

/// The fully resolved dialect: everything the field scanners and row
/// tokenizer need, with no further "auto" left in it (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub sep: u8,
    pub eol: Eol,
    /// `0` means "no quote byte" (quote_rule 3 only).
    pub quote: u8,
    /// 0: doubled-quote escaping, 1: backslash escaping, 2: unescaped quote
    /// terminates the field, 3: no quoting at all.
    pub quote_rule: u8,
    pub dec: u8,
}

const SEP_CANDIDATES: &[u8] = &[b',', b'|', b';', b'\t', b' '];

impl Dialect {
    fn validate(&self) -> ReadResult<()> {
        let mut bytes = vec![self.sep, self.dec];
        if self.quote != 0 {
            bytes.push(self.quote);
        }
        let mut sorted = bytes.clone();
        sorted.sort_unstable();
        sorted.dedup();
        if sorted.len() != bytes.len() {
            return Err(ReadError::DialectCollision {
                sep: self.sep,
                quote: self.quote,
                dec: self.dec,
            });
        }
        Ok(())
    }
}

/// Skip a leading UTF-8 BOM, if present (spec.md §4.2).
pub fn skip_bom(input: &[u8]) -> usize {
    if input.starts_with(&[0xEF, 0xBB, 0xBF]) {
        3
    } else {
        0
    }
}

/// Infer the end-of-line style by scanning for the first `\n` or `\r` in the
/// raw byte stream (spec.md §4.2: "inferred before separator search").
/// This is a coarse, quote-unaware scan: by the time a dialect is picked the
/// body reader re-validates every eol it actually consumes, so a stray
/// newline inside an early quoted field only costs a wrong guess that the
/// separator/quote-rule search below will not be able to satisfy, not a
/// silent corruption.
pub fn detect_eol(input: &[u8]) -> Eol {
    match memchr::memchr2(b'\n', b'\r', input) {
        Some(i) => match input[i] {
            b'\n' => {
                if input.get(i + 1) == Some(&b'\r') {
                    Eol::LfCr
                } else {
                    Eol::Lf
                }
            }
            _ => {
                if input.get(i + 1) == Some(&b'\n') {
                    Eol::CrLf
                } else {
                    Eol::Cr
                }
            }
        },
        None => Eol::Lf,
    }
}

const MAX_DETECTION_ROWS: usize = 100;

/// Per-candidate score: the length of the longest run of consecutive rows
/// sharing the same field count, the field count of that run, and whether
/// the separator is a space (penalized in ties, since a space separator is
/// easily confused with field padding).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Score {
    run_len: usize,
    field_count: usize,
    is_space_sep: bool,
}

impl Score {
    fn better_than(&self, other: &Score) -> bool {
        if self.run_len != other.run_len {
            return self.run_len > other.run_len;
        }
        if self.field_count != other.field_count {
            return self.field_count > other.field_count;
        }
        // Favor a non-space separator on a full tie.
        other.is_space_sep && !self.is_space_sep
    }
}

/// Tokenize up to [`MAX_DETECTION_ROWS`] rows starting at `start` under a
/// candidate `(sep, quote, quote_rule)` and score the result. Returns
/// `None` if the quote rule's lookahead bound fails anywhere (the candidate
/// is simply rejected, not fatal).
fn score_candidate(input: &[u8], start: usize, dialect: &Dialect, strip: bool) -> Option<Score> {
    let mut pos = start;
    let mut best_run = 0usize;
    let mut best_run_field_count = 0usize;
    let mut cur_run = 0usize;
    let mut cur_field_count = 0usize;
    let mut rows_seen = 0usize;

    while pos < input.len() && rows_seen < MAX_DETECTION_ROWS {
        let mut field_count = 0usize;
        let row_start = pos;
        loop {
            let span = crate::scanners::peek_field(input, pos, dialect, strip)?;
            field_count += 1;
            let at_eof = span.at_eof;
            pos = span.next;
            if span.at_eol || at_eof {
                break;
            }
        }
        if pos == row_start {
            // Empty line (bare eol): doesn't participate in the run.
            break;
        }
        rows_seen += 1;
        if field_count == cur_field_count {
            cur_run += 1;
        } else {
            cur_field_count = field_count;
            cur_run = 1;
        }
        if cur_run > best_run {
            best_run = cur_run;
            best_run_field_count = cur_field_count;
        }
    }

    if best_run == 0 {
        return None;
    }
    Some(Score {
        run_len: best_run,
        field_count: best_run_field_count,
        is_space_sep: dialect.sep == b' ',
    })
}

/// Run the detector starting at `start` (the caller has already applied BOM
/// skip and any `skipNrow`/`skipString`). Returns the winning dialect.
pub fn detect(input: &[u8], start: usize, opts: &ReadOptions) -> ReadResult<Dialect> {
    let eol = detect_eol(&input[start..]);

    let sep_candidates: Vec<u8> = match opts.sep {
        SepOverride::Byte(b) => vec![b],
        SepOverride::Auto => SEP_CANDIDATES.to_vec(),
    };

    let (quote_byte, quote_rules): (u8, Vec<u8>) = match opts.quote {
        QuoteOverride::None => (0, vec![3]),
        QuoteOverride::Byte(q) => (q, vec![0, 1, 2, 3]),
        QuoteOverride::Auto => (b'"', vec![0, 1, 2, 3]),
    };

    let dec = match opts.dec {
        DecOverride::Dot => b'.',
        DecOverride::Comma => b',',
        DecOverride::Auto => b'.',
    };

    let mut best: Option<(Dialect, Score)> = None;
    let mut rows_tried = 0usize;

    for &sep in &sep_candidates {
        for &quote_rule in &quote_rules {
            let candidate = Dialect {
                sep,
                eol,
                quote: if quote_rule == 3 { 0 } else { quote_byte },
                quote_rule,
                dec,
            };
            if candidate.validate().is_err() {
                continue;
            }
            if let Some(score) = score_candidate(input, start, &candidate, opts.strip_white) {
                rows_tried = rows_tried.max(score.run_len);
                let replace = match &best {
                    None => true,
                    Some((_, best_score)) => score.better_than(best_score),
                };
                if replace {
                    best = Some((candidate, score));
                }
            }
        }
    }

    match best {
        Some((dialect, _)) => {
            dialect.validate()?;
            Ok(dialect)
        }
        None => Err(ReadError::DialectNotDetected {
            rows_tried: rows_tried.max(MAX_DETECTION_ROWS),
        }),
    }
}
