use std::io::{Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::thread;

use crate::compress::ColumnCompressors;
use crate::error::ColumnError;
use crate::format::{
    nr_of_na_ints, BlockIndexEntry, ColumnHeader, StringEncoding, BLOCKSIZE_CHAR,
    CHAR_HEADER_SIZE, MAX_BLOCK_BYTES,
};
use crate::partition::JobPlan;
use crate::strings::StringProvider;

/// Write one complete character column at the stream's current position.
///
/// # Write contract
/// The stream must be positioned at the column's start offset. On success the
/// column is complete and valid, the stream is advanced to end-of-column, and
/// the total number of bytes written (header + block index + payloads) is
/// returned. `compression` selects the compressed column shape (`Some`) or
/// the plain shape (`None`); `threads` bounds the worker count.
///
/// The output bytes depend only on the inputs, never on the thread count or
/// scheduling: workers run the compute phase of their jobs in parallel, but
/// each job appends its serialized batch to the stream and publishes its
/// block offsets strictly in ascending job order (cooperative ordered
/// commit). On any failure the stream is left at an unspecified position and
/// the partial column must be discarded by the caller.
///
/// # Column layout written
/// ```text
/// [HEADER: 8 bytes]
/// [BLOCK INDEX placeholder: 8 or 16 bytes × num_blocks]
/// [BLOCK 0] [BLOCK 1] ... [BLOCK N-1]      ← one contiguous write per job
/// ← seek back, overwrite the index with the real end offsets
/// ```
pub fn write_char_column<W, P>(
    out: &mut W,
    provider: &P,
    compression: Option<&ColumnCompressors>,
    encoding: StringEncoding,
    threads: usize,
) -> Result<u64, ColumnError>
where
    W: Write + Seek + Send,
    P: StringProvider + ?Sized,
{
    let vec_length = provider.vec_length();
    if vec_length == 0 {
        return Err(ColumnError::EmptyInput);
    }

    let col_pos = out.stream_position()?;
    let plan = JobPlan::new(vec_length, threads);

    let header = ColumnHeader {
        compressed: compression.is_some(),
        encoding,
        block_size: BLOCKSIZE_CHAR as u32,
    };
    let entry_size = header.index_entry_size() as usize;
    let meta_size = CHAR_HEADER_SIZE as usize + plan.num_blocks * entry_size;

    // Placeholder header and zeroed index; patched once the last job commits.
    let mut meta = vec![0u8; meta_size];
    meta[..CHAR_HEADER_SIZE as usize].copy_from_slice(&header.to_bytes());
    out.write_all(&meta)?;

    let mut entries = vec![BlockIndexEntry::default(); plan.num_blocks];
    let state = Mutex::new(CommitState {
        turn: 0,
        column_size: meta_size as u64,
        out,
        entries: &mut entries,
        error: None,
    });
    let turn_cv = Condvar::new();
    let aborted = AtomicBool::new(false);

    thread::scope(|s| {
        for worker in 0..plan.threads {
            let state = &state;
            let turn_cv = &turn_cv;
            let aborted = &aborted;
            s.spawn(move || run_worker(worker, plan, provider, compression, state, turn_cv, aborted));
        }
    });

    let CommitState {
        column_size,
        out,
        entries,
        error,
        ..
    } = state
        .into_inner()
        .unwrap_or_else(std::sync::PoisonError::into_inner);

    if let Some(err) = error {
        return Err(err);
    }

    // Two-phase write: rewrite the filled block-offset index in place.
    let mut index_bytes = Vec::with_capacity(plan.num_blocks * entry_size);
    for entry in entries.iter() {
        if header.compressed {
            index_bytes.extend_from_slice(&entry.to_bytes16());
        } else {
            index_bytes.extend_from_slice(&entry.to_bytes8());
        }
    }
    out.seek(SeekFrom::Start(col_pos + CHAR_HEADER_SIZE))?;
    out.write_all(&index_bytes)?;
    out.seek(SeekFrom::End(0))?;

    Ok(column_size)
}

/// Shared state behind the ordered-commit barrier. The mutex is the only
/// synchronization around the output stream and the in-memory index: a job
/// may touch either only while `turn` equals its job number.
struct CommitState<'a, W: Write> {
    /// Next job allowed to publish.
    turn: usize,
    /// Bytes of the column written so far, header and index included.
    column_size: u64,
    out: &'a mut W,
    entries: &'a mut [BlockIndexEntry],
    error: Option<ColumnError>,
}

/// Per-block results of a job's compute phase, published during its commit.
#[derive(Clone, Copy, Default)]
struct BlockRecord {
    /// Uncompressed character payload bytes of the block.
    char_size: usize,
    /// Bytes this block occupies in the serialized batch.
    serialized_size: usize,
    algo_int: u16,
    algo_char: u16,
    int_buf_size: u32,
}

fn run_worker<W, P>(
    worker: usize,
    plan: JobPlan,
    provider: &P,
    compression: Option<&ColumnCompressors>,
    state: &Mutex<CommitState<W>>,
    turn_cv: &Condvar,
    aborted: &AtomicBool,
) where
    W: Write,
    P: StringProvider + ?Sized,
{
    // Worker-owned scratch, reused across this worker's jobs and grown
    // monotonically with 10% over-allocation.
    let slot_len = BLOCKSIZE_CHAR + nr_of_na_ints(BLOCKSIZE_CHAR);
    let mut size_meta = vec![0u32; plan.blocks_per_job * slot_len];
    let mut lengths_scratch = vec![0u8; 4 * BLOCKSIZE_CHAR];
    let mut block_buffer: Vec<u8> = Vec::new();
    let mut thread_buffer: Vec<u8> = Vec::new();
    let mut records: Vec<BlockRecord> = Vec::with_capacity(plan.blocks_per_job);

    // Jobs are assigned round-robin, so job j always lands on worker j mod T.
    let mut job_nr = worker;
    while job_nr < plan.num_jobs {
        if aborted.load(Ordering::Acquire) {
            return;
        }
        let batch_size = match run_job(
            job_nr,
            &plan,
            provider,
            compression,
            &mut size_meta,
            &mut lengths_scratch,
            &mut block_buffer,
            &mut thread_buffer,
            &mut records,
        ) {
            Ok(size) => size,
            Err(err) => {
                latch_error(err, state, turn_cv, aborted);
                return;
            }
        };
        if !commit_job(
            job_nr,
            &plan,
            &thread_buffer[..batch_size],
            &records,
            state,
            turn_cv,
            aborted,
        ) {
            return;
        }
        job_nr += plan.threads;
    }
}

/// Compute phase of one job: pure computation on worker-owned buffers, no
/// stream access. Serializes every block of the job into `thread_buffer` and
/// returns the batch size in bytes.
#[allow(clippy::too_many_arguments)]
fn run_job<P>(
    job_nr: usize,
    plan: &JobPlan,
    provider: &P,
    compression: Option<&ColumnCompressors>,
    size_meta: &mut [u32],
    lengths_scratch: &mut [u8],
    block_buffer: &mut Vec<u8>,
    thread_buffer: &mut Vec<u8>,
    records: &mut Vec<BlockRecord>,
) -> Result<usize, ColumnError>
where
    P: StringProvider + ?Sized,
{
    records.clear();
    let blocks = plan.job_blocks(job_nr);
    let slot_len = BLOCKSIZE_CHAR + nr_of_na_ints(BLOCKSIZE_CHAR);

    // First pass: size metadata for every block, to learn the exact batch
    // size before any serialization happens.
    let mut max_char_size = 0usize;
    let mut required = 0usize;
    for (slot, block_nr) in blocks.clone().enumerate() {
        let nelem = plan.block_elements(block_nr);
        let na_ints = nr_of_na_ints(nelem);
        let meta = &mut size_meta[slot * slot_len..slot * slot_len + nelem + na_ints];
        let char_size =
            provider.calculate_sizes(block_nr as u64 * BLOCKSIZE_CHAR as u64, nelem, meta);

        let serialized = char_size + 4 * (nelem + na_ints);
        if serialized > MAX_BLOCK_BYTES {
            return Err(ColumnError::Oversize {
                size: serialized,
                max: MAX_BLOCK_BYTES,
            });
        }
        max_char_size = max_char_size.max(char_size);
        required += match compression {
            None => serialized,
            Some(c) => {
                c.lengths.compress_bound(4 * nelem)
                    + 4 * na_ints
                    + c.chars.compress_bound(char_size)
            }
        };
        records.push(BlockRecord {
            char_size,
            ..BlockRecord::default()
        });
    }

    grow(block_buffer, max_char_size);
    grow(thread_buffer, required);

    // Second pass: serialize each block into the thread buffer in block
    // order — lengths (possibly compressed), NA words, then chars.
    let mut tot_batch_size = 0usize;
    for (slot, block_nr) in blocks.enumerate() {
        let nelem = plan.block_elements(block_nr);
        let na_ints = nr_of_na_ints(nelem);
        let start_elem = block_nr as u64 * BLOCKSIZE_CHAR as u64;
        let slot_meta = &size_meta[slot * slot_len..];
        let lengths = &slot_meta[..nelem];
        let na_words = &slot_meta[nelem..nelem + na_ints];
        let record = &mut records[slot];
        let char_size = record.char_size;

        match compression {
            None => {
                copy_u32s(&mut thread_buffer[tot_batch_size..], lengths);
                tot_batch_size += 4 * nelem;
                copy_u32s(&mut thread_buffer[tot_batch_size..], na_words);
                tot_batch_size += 4 * na_ints;

                provider.serialize_char_block(
                    start_elem,
                    nelem,
                    lengths,
                    &mut block_buffer[..char_size],
                );
                thread_buffer[tot_batch_size..tot_batch_size + char_size]
                    .copy_from_slice(&block_buffer[..char_size]);
                tot_batch_size += char_size;

                record.serialized_size = 4 * (nelem + na_ints) + char_size;
            }
            Some(c) => {
                copy_u32s(lengths_scratch, lengths);
                let bound = c.lengths.compress_bound(4 * nelem);
                let (algo_int, int_buf_size) = c.lengths.compress(
                    block_nr as u64,
                    &lengths_scratch[..4 * nelem],
                    &mut thread_buffer[tot_batch_size..tot_batch_size + bound],
                )?;
                tot_batch_size += int_buf_size;

                copy_u32s(&mut thread_buffer[tot_batch_size..], na_words);
                tot_batch_size += 4 * na_ints;

                provider.serialize_char_block(
                    start_elem,
                    nelem,
                    lengths,
                    &mut block_buffer[..char_size],
                );
                let bound = c.chars.compress_bound(char_size);
                let (algo_char, char_buf_size) = c.chars.compress(
                    block_nr as u64,
                    &block_buffer[..char_size],
                    &mut thread_buffer[tot_batch_size..tot_batch_size + bound],
                )?;
                tot_batch_size += char_buf_size;

                record.algo_int = algo_int;
                record.algo_char = algo_char;
                record.int_buf_size = int_buf_size as u32;
                record.serialized_size = int_buf_size + 4 * na_ints + char_buf_size;
            }
        }
    }

    Ok(tot_batch_size)
}

/// Ordered-commit phase: wait for this job's turn, append the batch to the
/// stream and publish the block end offsets. Returns false when the worker
/// must stop (abort latched or commit failed).
fn commit_job<W: Write>(
    job_nr: usize,
    plan: &JobPlan,
    batch: &[u8],
    records: &[BlockRecord],
    state: &Mutex<CommitState<W>>,
    turn_cv: &Condvar,
    aborted: &AtomicBool,
) -> bool {
    let mut st = match state.lock() {
        Ok(guard) => guard,
        Err(_) => return false,
    };
    while st.turn != job_nr {
        if aborted.load(Ordering::Acquire) {
            return false;
        }
        st = match turn_cv.wait(st) {
            Ok(guard) => guard,
            Err(_) => return false,
        };
    }
    if aborted.load(Ordering::Acquire) {
        return false;
    }

    if let Err(err) = st.out.write_all(batch) {
        if st.error.is_none() {
            st.error = Some(err.into());
        }
        aborted.store(true, Ordering::Release);
        drop(st);
        turn_cv.notify_all();
        return false;
    }

    // Each job writes a disjoint slot range of the shared index.
    for (record, block_nr) in records.iter().zip(plan.job_blocks(job_nr)) {
        st.column_size += record.serialized_size as u64;
        st.entries[block_nr] = BlockIndexEntry {
            end_offset: st.column_size,
            algo_int: record.algo_int,
            algo_char: record.algo_char,
            int_buf_size: record.int_buf_size,
        };
    }
    st.turn += 1;
    drop(st);
    turn_cv.notify_all();
    true
}

/// Record the first failure and wake every waiting worker; later jobs are
/// never committed and the index is never patched.
fn latch_error<W: Write>(
    err: ColumnError,
    state: &Mutex<CommitState<W>>,
    turn_cv: &Condvar,
    aborted: &AtomicBool,
) {
    aborted.store(true, Ordering::Release);
    if let Ok(mut st) = state.lock() {
        if st.error.is_none() {
            st.error = Some(err);
        }
    }
    turn_cv.notify_all();
}

/// Monotonic buffer growth with 10% over-allocation; never shrinks.
fn grow(buf: &mut Vec<u8>, needed: usize) {
    if buf.len() < needed {
        buf.resize(needed + needed / 10, 0);
    }
}

fn copy_u32s(dst: &mut [u8], src: &[u32]) {
    for (chunk, value) in dst[..4 * src.len()].chunks_exact_mut(4).zip(src) {
        chunk.copy_from_slice(&value.to_le_bytes());
    }
}
