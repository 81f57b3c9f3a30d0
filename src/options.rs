//! The invocation contract (spec.md §6): everything a caller supplies to
//! start a read. Grounded on the teacher's config-struct style
//! (`strategy::streaming::StreamingParser::with_config` /
//! `with_multi_sep`) generalized into a single builder.

use crate::error::{ReadError, ReadResult};

/// Either a literal in-memory byte string or a filesystem path.
#[derive(Debug, Clone)]
pub enum Input {
    Bytes(Vec<u8>),
    Path(std::path::PathBuf),
}

/// Three-valued header preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderMode {
    True,
    False,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SepOverride {
    Auto,
    Byte(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteOverride {
    Auto,
    Byte(u8),
    /// No quoting at all (quote rule 3), equivalent to quote byte `\0`.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecOverride {
    Auto,
    Dot,
    Comma,
}

#[derive(Debug, Clone)]
enum Skip {
    None,
    NRow(usize),
    String(String),
}

/// The invocation contract. Constructed with [`ReadOptions::new`] and tuned
/// with the builder setters; [`ReadOptions::nth`] and the skip setters
/// validate eagerly since those are the two places the contract can be
/// self-contradictory before a single byte is read.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    pub input: Input,
    pub sep: SepOverride,
    pub quote: QuoteOverride,
    pub dec: DecOverride,
    pub na_strings: Vec<String>,
    pub header: HeaderMode,
    skip: Skip,
    pub strip_white: bool,
    pub skip_empty_lines: bool,
    pub fill: bool,
    pub show_progress: bool,
    pub verbose: bool,
    pub nrow_limit: Option<usize>,
    pub nth: usize,
    /// Accept bare `0`/`1` as BOOL8 literals (spec.md §4.1; off by default
    /// so numeric columns aren't mis-inferred as boolean).
    pub accept_bare_01_bool: bool,
}

impl ReadOptions {
    pub fn new(input: Input) -> Self {
        ReadOptions {
            input,
            sep: SepOverride::Auto,
            quote: QuoteOverride::Auto,
            dec: DecOverride::Auto,
            na_strings: vec![String::new(), "NA".to_string()],
            header: HeaderMode::Auto,
            skip: Skip::None,
            strip_white: true,
            skip_empty_lines: true,
            fill: false,
            show_progress: false,
            verbose: false,
            nrow_limit: None,
            nth: 1,
            accept_bare_01_bool: false,
        }
    }

    pub fn from_path(path: impl Into<std::path::PathBuf>) -> Self {
        Self::new(Input::Path(path.into()))
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(Input::Bytes(bytes.into()))
    }

    pub fn sep(mut self, sep: u8) -> Self {
        self.sep = SepOverride::Byte(sep);
        self
    }

    pub fn quote(mut self, quote: QuoteOverride) -> Self {
        self.quote = quote;
        self
    }

    pub fn dec(mut self, dec: DecOverride) -> Self {
        self.dec = dec;
        self
    }

    /// NA strings must not have leading/trailing whitespace and must not
    /// collide with a recognised boolean literal (spec.md §6).
    pub fn na_strings(mut self, strings: Vec<String>) -> ReadResult<Self> {
        const BOOL_LITERALS: &[&str] =
            &["T", "F", "TRUE", "FALSE", "True", "False", "NA"];
        for s in &strings {
            if s.trim() != s {
                return Err(ReadError::InvalidNaString(s.clone()));
            }
            if BOOL_LITERALS.contains(&s.as_str()) && s != "NA" {
                return Err(ReadError::InvalidNaString(s.clone()));
            }
        }
        self.na_strings = strings;
        Ok(self)
    }

    pub fn header(mut self, header: HeaderMode) -> Self {
        self.header = header;
        self
    }

    pub fn skip_nrow(mut self, n: usize) -> ReadResult<Self> {
        if matches!(self.skip, Skip::String(_)) {
            return Err(ReadError::ConflictingSkip);
        }
        self.skip = Skip::NRow(n);
        Ok(self)
    }

    pub fn skip_string(mut self, s: impl Into<String>) -> ReadResult<Self> {
        if matches!(self.skip, Skip::NRow(_)) {
            return Err(ReadError::ConflictingSkip);
        }
        self.skip = Skip::String(s.into());
        Ok(self)
    }

    pub fn strip_white(mut self, v: bool) -> Self {
        self.strip_white = v;
        self
    }

    pub fn skip_empty_lines(mut self, v: bool) -> Self {
        self.skip_empty_lines = v;
        self
    }

    pub fn fill(mut self, v: bool) -> Self {
        self.fill = v;
        self
    }

    pub fn show_progress(mut self, v: bool) -> Self {
        self.show_progress = v;
        self
    }

    pub fn verbose(mut self, v: bool) -> Self {
        self.verbose = v;
        self
    }

    pub fn nrow_limit(mut self, n: usize) -> Self {
        self.nrow_limit = Some(n);
        self
    }

    pub fn nth(mut self, n: usize) -> ReadResult<Self> {
        if n == 0 {
            return Err(ReadError::ZeroThreads(n));
        }
        self.nth = n;
        Ok(self)
    }

    pub fn accept_bare_01_bool(mut self, v: bool) -> Self {
        self.accept_bare_01_bool = v;
        self
    }

    pub(crate) fn skip_nrow_value(&self) -> Option<usize> {
        match self.skip {
            Skip::NRow(n) => Some(n),
            _ => None,
        }
    }

    pub(crate) fn skip_string_value(&self) -> Option<&str> {
        match &self.skip {
            Skip::String(s) => Some(s.as_str()),
            _ => None,
        }
    }
}
