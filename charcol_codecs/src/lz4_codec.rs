use charcol_core::format::ALGO_LZ4;
use charcol_core::ColumnError;

use crate::BlockCompressor;

/// LZ4 block compressor.
///
/// Fastest decompression of the bundled algorithms. The raw block API is
/// used without a size prefix: the column format already records both the
/// compressed and the uncompressed size of every block part.
pub struct Lz4Codec;

impl BlockCompressor for Lz4Codec {
    fn algo(&self) -> u16 {
        ALGO_LZ4
    }

    fn compress_bound(&self, raw_len: usize) -> usize {
        lz4_flex::block::get_maximum_output_size(raw_len)
    }

    fn compress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize, ColumnError> {
        lz4_flex::block::compress_into(src, dst)
            .map_err(|e| ColumnError::Compressor(format!("lz4: {e}")))
    }
}

pub(crate) fn decompress(src: &[u8], dst: &mut [u8]) -> Result<usize, ColumnError> {
    lz4_flex::block::decompress_into(src, dst)
        .map_err(|e| ColumnError::Decompressor(format!("lz4: {e}")))
}
