//! Compression algorithms and per-block selection policies for charcol
//! columns.
//!
//! `charcol_core` defines the seams ([`StreamCompressor`],
//! [`BlockDecompressor`]); this crate supplies the standard LZ4 and ZSTD
//! implementations plus the level policy that maps a `[0, 100]` compression
//! level onto them.
//!
//! [`StreamCompressor`]: charcol_core::StreamCompressor

mod lz4_codec;
mod stream;
mod zstd_codec;

pub use lz4_codec::Lz4Codec;
pub use stream::{StreamCompositeCompressor, StreamLinearCompressor};
pub use zstd_codec::ZstdCodec;

use charcol_core::format::{ALGO_LZ4, ALGO_ZSTD};
use charcol_core::{BlockDecompressor, ColumnCompressors, ColumnError};

/// A single compression algorithm, identified by its stable on-disk code.
///
/// Block compressors are wrapped by [`StreamLinearCompressor`] and
/// [`StreamCompositeCompressor`], which own the per-block algorithm choice
/// and the verbatim fallback; a block compressor itself always compresses.
pub trait BlockCompressor: Send + Sync {
    /// On-disk algorithm code written into the block index.
    fn algo(&self) -> u16;

    /// Worst-case compressed size for `raw_len` input bytes.
    fn compress_bound(&self, raw_len: usize) -> usize;

    /// Compress `src` into `dst`, returning the compressed size.
    fn compress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize, ColumnError>;
}

/// Decompressor understanding every bundled algorithm code.
///
/// Codes outside the bundled set are rejected with a clear error; verbatim
/// parts (code 0) never reach a decompressor.
pub struct StandardDecompressor;

impl BlockDecompressor for StandardDecompressor {
    fn decompress(&self, algo: u16, src: &[u8], dst: &mut [u8]) -> Result<usize, ColumnError> {
        match algo {
            ALGO_LZ4 => lz4_codec::decompress(src, dst),
            ALGO_ZSTD => zstd_codec::decompress(src, dst),
            _ => Err(ColumnError::Decompressor(format!(
                "unknown compression algorithm code {algo}"
            ))),
        }
    }
}

/// Map a compression level in `[0, 100]` to the column's stream compressors.
///
/// Level 0 selects the uncompressed column shape. Levels 1–50 compress a
/// growing fraction of blocks with LZ4 and store the rest verbatim; levels
/// 51–100 compress every block, shifting a growing fraction from LZ4 to
/// ZSTD. The block choice depends only on the block number, so the written
/// bytes stay independent of the thread count.
pub fn compressors_for_level(level: u8) -> Option<ColumnCompressors> {
    match level.min(100) {
        0 => None,
        level @ 1..=50 => {
            let pct = 2 * level;
            Some(ColumnCompressors {
                lengths: Box::new(StreamLinearCompressor::new(Lz4Codec, pct)),
                chars: Box::new(StreamLinearCompressor::new(Lz4Codec, pct)),
            })
        }
        level => {
            let pct = 2 * (level - 50);
            Some(ColumnCompressors {
                lengths: Box::new(StreamCompositeCompressor::new(
                    Lz4Codec,
                    ZstdCodec::default(),
                    pct,
                )),
                chars: Box::new(StreamCompositeCompressor::new(
                    Lz4Codec,
                    ZstdCodec::default(),
                    pct,
                )),
            })
        }
    }
}
