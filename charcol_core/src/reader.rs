use std::io::{Read, Seek, SeekFrom};
use std::sync::mpsc;
use std::thread;

use crate::compress::BlockDecompressor;
use crate::error::ColumnError;
use crate::format::{
    le_u32, nr_of_na_ints, BlockIndexEntry, ColumnHeader, BLOCK_OFFSET_SIZE, CHAR_HEADER_SIZE,
    CHAR_INDEX_SIZE,
};
use crate::strings::StringSink;

/// Depth of the decoded-block queue between the helper and the master.
const READ_QUEUE_DEPTH: usize = 4;

/// Read `vec_length` rows starting at `start_row` from the column at
/// `col_pos` into `sink`.
///
/// # Read contract
/// `size` is the column's total row count; `vec_length` is at least 1 and
/// `[start_row, start_row + vec_length)` must lie inside the column (ranges
/// are clipped by the caller). Only the header, the index window covering the
/// selected blocks, and the selected blocks themselves are read; the first
/// and last block may be decoded partially.
///
/// With `helpers == 0` the blocks are decoded in a straight sequential loop.
/// Otherwise a scoped helper thread performs stream I/O and decompression and
/// hands decoded payloads to this thread over a bounded queue; every
/// [`StringSink`] call — the allocation-heavy part — stays on the calling
/// thread, and the final block is loaded there directly.
pub fn read_char_column<R, S>(
    input: &mut R,
    col_pos: u64,
    start_row: u64,
    vec_length: u64,
    size: u64,
    decompressor: &dyn BlockDecompressor,
    sink: &mut S,
    helpers: usize,
) -> Result<(), ColumnError>
where
    R: Read + Seek + Send,
    S: StringSink + ?Sized,
{
    if vec_length == 0 {
        return Err(ColumnError::EmptyInput);
    }
    if start_row + vec_length > size {
        return Err(ColumnError::CorruptFormat(format!(
            "row range [{start_row}, {}) exceeds the column's {size} rows",
            start_row + vec_length
        )));
    }

    input.seek(SeekFrom::Start(col_pos))?;
    let mut header_buf = [0u8; CHAR_HEADER_SIZE as usize];
    input.read_exact(&mut header_buf)?;
    let header = ColumnHeader::from_bytes(&header_buf);
    if header.block_size == 0 {
        return Err(ColumnError::CorruptFormat("block size of zero".into()));
    }
    let block_size = u64::from(header.block_size);

    let last_block = (size - 1) / block_size;
    let start_block = start_row / block_size;
    let start_offset = start_row - start_block * block_size;
    let end_block = (start_row + vec_length - 1) / block_size;
    let end_offset = (start_row + vec_length - 1) - end_block * block_size;
    let nr_of_blocks = 1 + end_block - start_block;

    sink.allocate_vec(vec_length);
    sink.set_encoding(header.encoding);

    let entries =
        load_index_window(input, col_pos, &header, last_block, start_block, nr_of_blocks)?;
    let plan = build_plan(
        &entries,
        block_size,
        size,
        last_block,
        start_block,
        end_block,
        start_offset,
        end_offset,
    )?;

    if helpers == 0 || plan.len() < 2 {
        for block in &plan {
            let decoded = load_block(input, col_pos, header.compressed, decompressor, block)?;
            materialize(sink, decoded);
        }
        return Ok(());
    }

    // Master-plus-helper pipeline: the helper owns the stream and the
    // decompression work, the master drains the queue into the sink.
    let (head, tail) = plan.split_at(plan.len() - 1);
    let mut pipeline_result: Result<(), ColumnError> = Ok(());
    thread::scope(|s| {
        let (tx, rx) = mpsc::sync_channel::<Result<DecodedBlock, ColumnError>>(READ_QUEUE_DEPTH);
        let helper_input = &mut *input;
        let compressed = header.compressed;
        s.spawn(move || {
            for block in head {
                let item = load_block(helper_input, col_pos, compressed, decompressor, block);
                let failed = item.is_err();
                if tx.send(item).is_err() || failed {
                    break;
                }
            }
        });

        for _ in 0..head.len() {
            match rx.recv() {
                Ok(Ok(decoded)) => materialize(sink, decoded),
                Ok(Err(err)) => {
                    pipeline_result = Err(err);
                    break;
                }
                Err(_) => {
                    pipeline_result =
                        Err(std::io::Error::other("block loader thread terminated").into());
                    break;
                }
            }
        }
        drop(rx); // unblocks a helper still sending after an early exit
    });
    pipeline_result?;

    // The tail block is always decoded on the calling thread.
    let decoded = load_block(input, col_pos, header.compressed, decompressor, &tail[0])?;
    materialize(sink, decoded);
    Ok(())
}

/// Decode work for one selected block: where it sits, how many elements it
/// holds, and which element sub-range lands at which output position.
#[derive(Debug, Clone, Copy)]
struct BlockPlan {
    /// Byte offset of the block's first byte, relative to the column start.
    start: u64,
    byte_size: u64,
    nelem: usize,
    start_elem: usize,
    /// Inclusive last element index within the block.
    end_elem: usize,
    dest_offset: u64,
    algo_int: u16,
    algo_char: u16,
    int_buf_size: u32,
}

struct DecodedBlock {
    plan: BlockPlan,
    size_meta: Vec<u32>,
    chars: Vec<u8>,
}

fn materialize<S: StringSink + ?Sized>(sink: &mut S, decoded: DecodedBlock) {
    let plan = decoded.plan;
    sink.buffer_to_vec(
        plan.nelem,
        plan.start_elem,
        plan.end_elem,
        plan.dest_offset,
        &decoded.size_meta,
        &decoded.chars,
    );
}

/// Load the slice of the block index covering the selected blocks, plus the
/// predecessor entry that provides the first block's start offset. For
/// `start_block == 0` the predecessor is synthesized from the header.
fn load_index_window<R: Read + Seek>(
    input: &mut R,
    col_pos: u64,
    header: &ColumnHeader,
    last_block: u64,
    start_block: u64,
    nr_of_blocks: u64,
) -> Result<Vec<BlockIndexEntry>, ColumnError> {
    let entry_size = header.index_entry_size();
    let mut entries = Vec::with_capacity(nr_of_blocks as usize + 1);

    let read_into = |input: &mut R, entries: &mut Vec<BlockIndexEntry>, count: u64| {
        let mut buf = vec![0u8; (count * entry_size) as usize];
        input.read_exact(&mut buf)?;
        for chunk in buf.chunks_exact(entry_size as usize) {
            entries.push(parse_entry(chunk, header.compressed));
        }
        Ok::<(), ColumnError>(())
    };

    if start_block > 0 {
        input.seek(SeekFrom::Start(
            col_pos + CHAR_HEADER_SIZE + (start_block - 1) * entry_size,
        ))?;
        read_into(input, &mut entries, nr_of_blocks + 1)?;
    } else {
        entries.push(BlockIndexEntry {
            end_offset: header.payload_start(last_block + 1),
            ..BlockIndexEntry::default()
        });
        // the header read left the stream at the index start
        read_into(input, &mut entries, nr_of_blocks)?;
    }
    Ok(entries)
}

fn parse_entry(chunk: &[u8], compressed: bool) -> BlockIndexEntry {
    if compressed {
        let mut buf = [0u8; CHAR_INDEX_SIZE as usize];
        buf.copy_from_slice(chunk);
        BlockIndexEntry::from_bytes16(&buf)
    } else {
        let mut buf = [0u8; BLOCK_OFFSET_SIZE as usize];
        buf.copy_from_slice(chunk);
        BlockIndexEntry::from_bytes8(&buf)
    }
}

/// Turn the index window into per-block decode work. Element ranges follow
/// the first/middle/last pattern: the first block starts at `start_offset`,
/// middle blocks are read whole, the last block stops at `end_offset`, and
/// the column's final block holds only the leftover elements.
#[allow(clippy::too_many_arguments)]
fn build_plan(
    entries: &[BlockIndexEntry],
    block_size: u64,
    size: u64,
    last_block: u64,
    start_block: u64,
    end_block: u64,
    start_offset: u64,
    end_offset: u64,
) -> Result<Vec<BlockPlan>, ColumnError> {
    let tail_elements = (size - last_block * block_size) as usize;
    let full = block_size as usize;
    let mut plan = Vec::with_capacity(entries.len() - 1);
    let mut dest = 0u64;

    for (i, pair) in entries.windows(2).enumerate() {
        let block_nr = start_block + i as u64;
        let (prev, cur) = (pair[0], pair[1]);
        if cur.end_offset <= prev.end_offset {
            return Err(ColumnError::CorruptFormat(format!(
                "end offset {} of block {block_nr} does not advance past {}",
                cur.end_offset, prev.end_offset
            )));
        }
        let nelem = if block_nr == last_block {
            tail_elements
        } else {
            full
        };
        let start_elem = if i == 0 { start_offset as usize } else { 0 };
        let end_elem = if block_nr == end_block {
            end_offset as usize
        } else {
            full - 1
        };
        if end_elem >= nelem {
            return Err(ColumnError::CorruptFormat(format!(
                "element range up to {end_elem} exceeds the {nelem} elements of block {block_nr}"
            )));
        }
        plan.push(BlockPlan {
            start: prev.end_offset,
            byte_size: cur.end_offset - prev.end_offset,
            nelem,
            start_elem,
            end_elem,
            dest_offset: dest,
            algo_int: cur.algo_int,
            algo_char: cur.algo_char,
            int_buf_size: cur.int_buf_size,
        });
        dest += (end_elem - start_elem + 1) as u64;
    }
    Ok(plan)
}

/// Read one block from the stream and expand it to its uncompressed parts:
/// cumulative lengths, NA words, and the character payload.
fn load_block<R: Read + Seek>(
    input: &mut R,
    col_pos: u64,
    compressed: bool,
    decompressor: &dyn BlockDecompressor,
    plan: &BlockPlan,
) -> Result<DecodedBlock, ColumnError> {
    input.seek(SeekFrom::Start(col_pos + plan.start))?;

    let nelem = plan.nelem;
    let na_ints = nr_of_na_ints(nelem);
    let byte_size = plan.byte_size as usize;
    let mut size_meta = vec![0u32; nelem + na_ints];

    let int_disk = if compressed {
        plan.int_buf_size as usize
    } else {
        4 * nelem
    };
    let meta_disk = int_disk + 4 * na_ints;
    if byte_size < meta_disk {
        return Err(ColumnError::CorruptFormat(format!(
            "block of {byte_size} bytes cannot hold {meta_disk} bytes of size metadata"
        )));
    }
    let char_disk = byte_size - meta_disk;

    if !compressed || plan.algo_int == 0 {
        if int_disk != 4 * nelem {
            return Err(ColumnError::CorruptFormat(format!(
                "verbatim lengths array of {int_disk} bytes, expected {}",
                4 * nelem
            )));
        }
        let mut buf = vec![0u8; 4 * (nelem + na_ints)];
        input.read_exact(&mut buf)?;
        for (value, chunk) in size_meta.iter_mut().zip(buf.chunks_exact(4)) {
            *value = le_u32(chunk);
        }
    } else {
        let mut int_buf = vec![0u8; int_disk];
        input.read_exact(&mut int_buf)?;
        let mut na_buf = vec![0u8; 4 * na_ints];
        input.read_exact(&mut na_buf)?;
        for (value, chunk) in size_meta[nelem..].iter_mut().zip(na_buf.chunks_exact(4)) {
            *value = le_u32(chunk);
        }

        // NA words stay verbatim; only the lengths array is compressed.
        let mut lengths_bytes = vec![0u8; 4 * nelem];
        let written = decompressor.decompress(plan.algo_int, &int_buf, &mut lengths_bytes)?;
        if written != 4 * nelem {
            return Err(ColumnError::Decompressor(format!(
                "lengths array expanded to {written} bytes, expected {}",
                4 * nelem
            )));
        }
        for (value, chunk) in size_meta[..nelem].iter_mut().zip(lengths_bytes.chunks_exact(4)) {
            *value = le_u32(chunk);
        }
    }

    let mut prev = 0u32;
    for (i, &len) in size_meta[..nelem].iter().enumerate() {
        if len < prev {
            return Err(ColumnError::CorruptFormat(format!(
                "cumulative lengths decrease at element {i}"
            )));
        }
        prev = len;
    }
    let char_uncompressed = prev as usize;

    let mut chars = vec![0u8; char_uncompressed];
    if !compressed || plan.algo_char == 0 {
        if char_disk != char_uncompressed {
            return Err(ColumnError::CorruptFormat(format!(
                "char payload of {char_disk} bytes does not match the {char_uncompressed} bytes the lengths describe"
            )));
        }
        input.read_exact(&mut chars)?;
    } else {
        let mut compressed_chars = vec![0u8; char_disk];
        input.read_exact(&mut compressed_chars)?;
        let written = decompressor.decompress(plan.algo_char, &compressed_chars, &mut chars)?;
        if written != char_uncompressed {
            return Err(ColumnError::Decompressor(format!(
                "char payload expanded to {written} bytes, expected {char_uncompressed}"
            )));
        }
    }

    Ok(DecodedBlock {
        plan: *plan,
        size_meta,
        chars,
    })
}
