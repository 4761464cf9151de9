use crate::error::ColumnError;
use crate::format::ALGO_VERBATIM;

/// Per-block compression policy used by the writer.
///
/// A stream compressor owns the algorithm choice: for every block it may
/// compress with any registered algorithm or store the bytes verbatim under
/// code [`ALGO_VERBATIM`]. The choice must be a pure function of
/// `(block_nr, src)` — never of scheduling or thread identity — so that the
/// written file bytes are independent of the thread count.
pub trait StreamCompressor: Send + Sync {
    /// Upper bound on the output size of [`compress`](Self::compress) for
    /// `raw_len` input bytes. Must dominate both the algorithm's worst case
    /// and the verbatim fallback (`raw_len` itself).
    fn compress_bound(&self, raw_len: usize) -> usize;

    /// Compress `src` into `dst`, returning the selected algorithm code and
    /// the number of bytes written. `dst` is at least
    /// `compress_bound(src.len())` bytes. Code [`ALGO_VERBATIM`] means `src`
    /// was copied unmodified.
    fn compress(&self, block_nr: u64, src: &[u8], dst: &mut [u8])
        -> Result<(u16, usize), ColumnError>;
}

/// Decode side of the compression registry.
///
/// Maps an on-disk algorithm code to its decompression primitive. Code
/// [`ALGO_VERBATIM`] never reaches a decompressor — the reader copies
/// verbatim parts itself. Implementations must reject codes they do not
/// know with [`ColumnError::Decompressor`] rather than guessing.
pub trait BlockDecompressor: Send + Sync {
    /// Expand `src`, compressed under `algo`, into exactly `dst.len()` bytes.
    /// Returns the number of bytes written, which the reader checks against
    /// the expected uncompressed size.
    fn decompress(&self, algo: u16, src: &[u8], dst: &mut [u8]) -> Result<usize, ColumnError>;
}

/// Stream compressors for the two independently compressed parts of a block:
/// the lengths array and the character payload.
pub struct ColumnCompressors {
    pub lengths: Box<dyn StreamCompressor>,
    pub chars: Box<dyn StreamCompressor>,
}

/// Decompressor for columns that contain only verbatim blocks.
///
/// Any nonzero algorithm code is rejected with a clear error, which is the
/// required behavior for readers that encounter codes they do not implement.
pub struct VerbatimOnly;

impl BlockDecompressor for VerbatimOnly {
    fn decompress(&self, algo: u16, _src: &[u8], _dst: &mut [u8]) -> Result<usize, ColumnError> {
        debug_assert_ne!(algo, ALGO_VERBATIM);
        Err(ColumnError::Decompressor(format!(
            "unknown compression algorithm code {algo}"
        )))
    }
}
