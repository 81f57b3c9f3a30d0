//! The Mapper collaborator (spec.md §2.1, §6): exposes the input as a
//! contiguous, immutable `[sof, eof)` byte range. The core never requires a
//! trailing NUL and never writes into this range.

use std::fs::File;
use std::path::Path;

use crate::error::{ReadError, ReadResult};
use crate::options::Input;

/// A contiguous, read-only view of the input bytes. Implementors must keep
/// the backing storage alive for as long as the returned slice is used;
/// `as_bytes` never reallocates or mutates.
pub trait Mapper {
    fn as_bytes(&self) -> &[u8];
}

/// A real file mapped read-only via `memmap2`.
pub struct MmapInput {
    _file: File,
    map: memmap2::Mmap,
}

impl MmapInput {
    pub fn open(path: &Path) -> ReadResult<Self> {
        let file = File::open(path)
            .map_err(|e| ReadError::PathNotFound(path.to_path_buf(), e))?;
        // SAFETY: the core treats the mapping as read-only for its entire
        // lifetime and never assumes a trailing NUL; external mutation of
        // the file during the read is the same hazard any mmap-based reader
        // accepts (documented, not mitigated).
        let map = unsafe { memmap2::Mmap::map(&file) }.map_err(ReadError::Mmap)?;
        Ok(MmapInput { _file: file, map })
    }
}

impl Mapper for MmapInput {
    fn as_bytes(&self) -> &[u8] {
        &self.map
    }
}

/// A literal in-memory byte string (spec.md §6: "a byte string containing
/// at least one line terminator").
pub struct SliceInput {
    bytes: Vec<u8>,
}

impl SliceInput {
    pub fn new(bytes: Vec<u8>) -> ReadResult<Self> {
        if bytes.is_empty() {
            return Err(ReadError::EmptyInput);
        }
        if !bytes.contains(&b'\n') && !bytes.contains(&b'\r') {
            return Err(ReadError::EmptyInput);
        }
        Ok(SliceInput { bytes })
    }
}

impl Mapper for SliceInput {
    fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Build the right `Mapper` for an [`Input`].
pub enum AnyMapper {
    Mmap(MmapInput),
    Slice(SliceInput),
}

impl AnyMapper {
    pub fn from_input(input: &Input) -> ReadResult<Self> {
        match input {
            Input::Path(p) => Ok(AnyMapper::Mmap(MmapInput::open(p)?)),
            Input::Bytes(b) => Ok(AnyMapper::Slice(SliceInput::new(b.clone())?)),
        }
    }
}

impl Mapper for AnyMapper {
    fn as_bytes(&self) -> &[u8] {
        match self {
            AnyMapper::Mmap(m) => m.as_bytes(),
            AnyMapper::Slice(s) => s.as_bytes(),
        }
    }
}
