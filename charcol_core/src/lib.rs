//! Seekable block codec for nullable character columns.
//!
//! A column is a self-describing byte stream: an 8-byte header, a per-block
//! offset index, and the block payloads in block order. Strings are grouped
//! into fixed-size blocks of cumulative lengths, NA bits and concatenated
//! character bytes, optionally compressed per block. The writer runs blocks
//! through parallel workers under an ordered commit so the file bytes never
//! depend on the thread count; the reader seeks straight to the blocks
//! covering a requested row range and decodes nothing else.
//!
//! Compression algorithms are pluggable through the [`StreamCompressor`] and
//! [`BlockDecompressor`] traits; the companion `charcol_codecs` crate
//! provides the standard LZ4/ZSTD implementations.

pub mod compress;
pub mod error;
pub mod format;
pub mod partition;
pub mod reader;
pub mod strings;
pub mod writer;

pub use compress::{BlockDecompressor, ColumnCompressors, StreamCompressor, VerbatimOnly};
pub use error::ColumnError;
pub use format::{BlockIndexEntry, ColumnHeader, StringEncoding};
pub use reader::read_char_column;
pub use strings::{StringProvider, StringSink, VecStringProvider, VecStringSink};
pub use writer::write_char_column;

/// Process-wide default worker count, derived from the available parallelism.
pub fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
}
