use charcol_core::format::ALGO_VERBATIM;
use charcol_core::{ColumnError, StreamCompressor};

use crate::BlockCompressor;

/// True for a `pct`% fraction of block numbers, spread evenly across the
/// sequence. A pure function of the block number: the same block gets the
/// same decision no matter which worker processes it.
#[inline]
fn schedule_fires(block_nr: u64, pct: u64) -> bool {
    (block_nr + 1) * pct / 100 > block_nr * pct / 100
}

fn store_verbatim(src: &[u8], dst: &mut [u8]) -> (u16, usize) {
    dst[..src.len()].copy_from_slice(src);
    (ALGO_VERBATIM, src.len())
}

fn compress_or_fall_back(
    codec: &dyn BlockCompressor,
    src: &[u8],
    dst: &mut [u8],
) -> Result<(u16, usize), ColumnError> {
    let size = codec.compress(src, dst)?;
    if size >= src.len() {
        Ok(store_verbatim(src, dst))
    } else {
        Ok((codec.algo(), size))
    }
}

/// Linear mix of one algorithm and verbatim storage: a `pct`% fraction of
/// blocks is compressed, the rest stored under code 0.
pub struct StreamLinearCompressor<C> {
    codec: C,
    pct: u64,
}

impl<C: BlockCompressor> StreamLinearCompressor<C> {
    pub fn new(codec: C, pct: u8) -> Self {
        Self {
            codec,
            pct: u64::from(pct.min(100)),
        }
    }
}

impl<C: BlockCompressor> StreamCompressor for StreamLinearCompressor<C> {
    fn compress_bound(&self, raw_len: usize) -> usize {
        self.codec.compress_bound(raw_len).max(raw_len)
    }

    fn compress(
        &self,
        block_nr: u64,
        src: &[u8],
        dst: &mut [u8],
    ) -> Result<(u16, usize), ColumnError> {
        if src.is_empty() || !schedule_fires(block_nr, self.pct) {
            return Ok(store_verbatim(src, dst));
        }
        compress_or_fall_back(&self.codec, src, dst)
    }
}

/// Mix of two algorithms: every block is compressed, a `pct`% fraction with
/// the second (denser) algorithm and the remainder with the first.
pub struct StreamCompositeCompressor<A, B> {
    first: A,
    second: B,
    pct: u64,
}

impl<A: BlockCompressor, B: BlockCompressor> StreamCompositeCompressor<A, B> {
    pub fn new(first: A, second: B, pct: u8) -> Self {
        Self {
            first,
            second,
            pct: u64::from(pct.min(100)),
        }
    }
}

impl<A: BlockCompressor, B: BlockCompressor> StreamCompressor
    for StreamCompositeCompressor<A, B>
{
    fn compress_bound(&self, raw_len: usize) -> usize {
        self.first
            .compress_bound(raw_len)
            .max(self.second.compress_bound(raw_len))
            .max(raw_len)
    }

    fn compress(
        &self,
        block_nr: u64,
        src: &[u8],
        dst: &mut [u8],
    ) -> Result<(u16, usize), ColumnError> {
        if src.is_empty() {
            return Ok(store_verbatim(src, dst));
        }
        if schedule_fires(block_nr, self.pct) {
            compress_or_fall_back(&self.second, src, dst)
        } else {
            compress_or_fall_back(&self.first, src, dst)
        }
    }
}
