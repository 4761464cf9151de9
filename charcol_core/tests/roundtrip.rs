//! End-to-end column tests: byte-exact layout checks, write/read round trips
//! across compression levels and thread counts, mid-block subset reads, and
//! failure handling on corrupt or truncated columns.
use std::io::Cursor;

use charcol_codecs::{compressors_for_level, StandardDecompressor};
use charcol_core::format::{BLOCKSIZE_CHAR, CHAR_INDEX_SIZE};
use charcol_core::{
    read_char_column, write_char_column, ColumnError, StringEncoding, VecStringProvider,
    VecStringSink, VerbatimOnly,
};

// ── helpers ────────────────────────────────────────────────────────────────

/// Deterministic vector of short lowercase words with `null_pct`% nulls,
/// generated from a simple LCG. A sprinkle of multi-byte characters keeps
/// the byte/char distinction honest.
fn sample_strings(len: usize, null_pct: u64, seed: u64) -> Vec<Option<String>> {
    let mut rng = seed;
    let mut step = move || {
        rng = rng
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        rng >> 33
    };
    (0..len)
        .map(|i| {
            if null_pct > 0 && step() % 100 < null_pct {
                return None;
            }
            let word_len = (step() % 12) as usize;
            let mut s = String::with_capacity(word_len + 2);
            for _ in 0..word_len {
                s.push((b'a' + (step() % 26) as u8) as char);
            }
            if i % 97 == 0 {
                s.push('é');
            }
            Some(s)
        })
        .collect()
}

fn strings(values: &[&str]) -> Vec<Option<String>> {
    values.iter().map(|s| Some((*s).to_string())).collect()
}

fn as_bytes(values: &[Option<String>]) -> Vec<Option<Vec<u8>>> {
    values
        .iter()
        .map(|v| v.as_ref().map(|s| s.clone().into_bytes()))
        .collect()
}

/// Write `values` as one column into a fresh in-memory stream.
fn write_column(values: &[Option<String>], level: u8, threads: usize) -> Vec<u8> {
    let provider = VecStringProvider::new(values);
    let mut out = Cursor::new(Vec::new());
    let compressors = compressors_for_level(level);
    let written = write_char_column(
        &mut out,
        &provider,
        compressors.as_ref(),
        StringEncoding::UTF8,
        threads,
    )
    .unwrap();
    let bytes = out.into_inner();
    assert_eq!(written, bytes.len() as u64, "writer must report every byte");
    bytes
}

fn read_range(
    bytes: &[u8],
    start_row: u64,
    vec_length: u64,
    size: u64,
    helpers: usize,
) -> Vec<Option<Vec<u8>>> {
    let mut input = Cursor::new(bytes);
    let mut sink = VecStringSink::new();
    read_char_column(
        &mut input,
        0,
        start_row,
        vec_length,
        size,
        &StandardDecompressor,
        &mut sink,
        helpers,
    )
    .unwrap();
    sink.into_values()
}

fn le_u32_at(bytes: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes(bytes[pos..pos + 4].try_into().unwrap())
}

fn le_u64_at(bytes: &[u8], pos: usize) -> u64 {
    u64::from_le_bytes(bytes[pos..pos + 8].try_into().unwrap())
}

// ── byte-exact layout ──────────────────────────────────────────────────────

#[test]
fn three_small_strings_exact_bytes() {
    let bytes = write_column(&strings(&["a", "b", "c"]), 0, 1);

    let mut expected = Vec::new();
    expected.extend_from_slice(&(2u32 << 1).to_le_bytes()); // UTF8 tag, uncompressed
    expected.extend_from_slice(&2048u32.to_le_bytes());
    expected.extend_from_slice(&35u64.to_le_bytes()); // single block ends the column
    for cumulative in [1u32, 2, 3] {
        expected.extend_from_slice(&cumulative.to_le_bytes());
    }
    expected.extend_from_slice(&0u32.to_le_bytes()); // NA word: no nulls
    expected.extend_from_slice(b"abc");

    assert_eq!(bytes, expected);
}

#[test]
fn null_element_sets_flag_and_element_bit() {
    let values = vec![None, Some("x".to_string())];
    let bytes = write_column(&values, 0, 1);

    // header(8) + index(8), then lengths, NA word, chars
    assert_eq!(le_u32_at(&bytes, 16), 0, "null contributes zero bytes");
    assert_eq!(le_u32_at(&bytes, 20), 1);
    assert_eq!(le_u32_at(&bytes, 24), 0b11, "any-null flag plus element 0 bit");
    assert_eq!(&bytes[28..], b"x");

    assert_eq!(read_range(&bytes, 0, 2, 2, 0), as_bytes(&values));
}

#[test]
fn multibyte_strings_store_byte_lengths() {
    let bytes = write_column(&strings(&["α", "β"]), 0, 1);

    assert_eq!(le_u32_at(&bytes, 16), 2);
    assert_eq!(le_u32_at(&bytes, 20), 4);
    assert_eq!(&bytes[28..], "αβ".as_bytes());
}

#[test]
fn column_splits_into_blocks_past_blocksize() {
    let values = strings(&vec!["abc"; BLOCKSIZE_CHAR + 1]);
    let bytes = write_column(&values, 0, 4);

    // two 8-byte index entries after the header
    let block0_len = 4 * (2048 + 65) + 3 * 2048;
    let end0 = 24 + block0_len as u64;
    assert_eq!(le_u64_at(&bytes, 8), end0);
    assert_eq!(le_u64_at(&bytes, 16), end0 + 4 + 4 + 3);
    assert_eq!(bytes.len() as u64, end0 + 11);

    // block 0: cumulative length of the last full-block element
    assert_eq!(le_u32_at(&bytes, 24 + 2047 * 4), 3 * 2048);
    // block 1: a single element of 3 bytes
    assert_eq!(le_u32_at(&bytes, end0 as usize), 3);
    assert_eq!(&bytes[bytes.len() - 3..], b"abc");

    assert_eq!(read_range(&bytes, 0, 2049, 2049, 0), as_bytes(&values));
    assert_eq!(
        read_range(&bytes, 2048, 1, 2049, 0),
        as_bytes(&values[2048..])
    );
}

// ── round trips and determinism ────────────────────────────────────────────

#[test]
fn roundtrip_across_compression_levels() {
    let values = sample_strings(10_000, 10, 0xC0FFEE);
    let expected = as_bytes(&values);
    for level in [0u8, 1, 50, 100] {
        let bytes = write_column(&values, level, 4);
        assert_eq!(
            read_range(&bytes, 0, 10_000, 10_000, 0),
            expected,
            "level {level}"
        );
    }
}

#[test]
fn file_bytes_independent_of_thread_count() {
    let values = sample_strings(10_000, 10, 0xDEAD_BEEF);
    for level in [0u8, 50, 100] {
        let reference = write_column(&values, level, 1);
        for threads in [2usize, 4, 8] {
            assert_eq!(
                write_column(&values, level, threads),
                reference,
                "level {level}, {threads} threads"
            );
        }
    }
}

#[test]
fn subset_reads_match_the_source_slice() {
    let values = sample_strings(10_000, 10, 0x5EED);
    let expected = as_bytes(&values);
    let bytes = write_column(&values, 50, 4);

    let ranges = [
        (2047u64, 4100u64), // spans a block boundary mid-block on both ends
        (0, 1),
        (2048, 4096),   // exactly aligned to block boundaries
        (100, 200),     // entirely inside one block
        (2000, 2100),   // spans exactly two blocks
        (8192, 10_000), // through the tail block
        (9_999, 10_000),
    ];
    for (a, b) in ranges {
        assert_eq!(
            read_range(&bytes, a, b - a, 10_000, 0),
            expected[a as usize..b as usize],
            "range [{a}, {b})"
        );
    }
}

#[test]
fn repeated_reads_are_identical() {
    let values = sample_strings(5000, 5, 42);
    let bytes = write_column(&values, 100, 2);
    let first = read_range(&bytes, 1000, 3000, 5000, 0);
    let second = read_range(&bytes, 1000, 3000, 5000, 0);
    assert_eq!(first, second);
}

#[test]
fn helper_pipeline_equals_sequential_read() {
    let values = sample_strings(10_000, 10, 7);
    for level in [0u8, 100] {
        let bytes = write_column(&values, level, 4);
        assert_eq!(
            read_range(&bytes, 0, 10_000, 10_000, 1),
            read_range(&bytes, 0, 10_000, 10_000, 0),
            "level {level}"
        );
        assert_eq!(
            read_range(&bytes, 1500, 7000, 10_000, 1),
            read_range(&bytes, 1500, 7000, 10_000, 0),
            "level {level}, partial range"
        );
    }
}

// ── boundary row counts and degenerate contents ────────────────────────────

#[test]
fn boundary_row_counts_roundtrip() {
    for rows in [
        1,
        BLOCKSIZE_CHAR - 1,
        BLOCKSIZE_CHAR,
        BLOCKSIZE_CHAR + 1,
        3 * BLOCKSIZE_CHAR,
    ] {
        let values = sample_strings(rows, 10, rows as u64);
        for level in [0u8, 100] {
            let bytes = write_column(&values, level, 2);
            assert_eq!(
                read_range(&bytes, 0, rows as u64, rows as u64, 0),
                as_bytes(&values),
                "{rows} rows at level {level}"
            );
        }
    }
}

#[test]
fn empty_strings_produce_empty_payload() {
    let values = strings(&[""; 5]);
    let bytes = write_column(&values, 0, 1);
    // header + one index entry + 5 lengths + 1 NA word, no char bytes
    assert_eq!(bytes.len(), 8 + 8 + 5 * 4 + 4);
    assert_eq!(read_range(&bytes, 0, 5, 5, 0), as_bytes(&values));

    let compressed = write_column(&values, 100, 1);
    assert_eq!(read_range(&compressed, 0, 5, 5, 0), as_bytes(&values));
}

#[test]
fn all_null_block_roundtrips() {
    let values: Vec<Option<String>> = vec![None; BLOCKSIZE_CHAR + 3];
    for level in [0u8, 50] {
        let bytes = write_column(&values, level, 2);
        let rows = values.len() as u64;
        assert_eq!(read_range(&bytes, 0, rows, rows, 0), as_bytes(&values));
    }
}

#[test]
fn recorded_encoding_reaches_the_sink() {
    let values = strings(&["latin"]);
    let provider = VecStringProvider::new(&values);
    let mut out = Cursor::new(Vec::new());
    write_char_column(&mut out, &provider, None, StringEncoding::LATIN1, 1).unwrap();

    let bytes = out.into_inner();
    let mut sink = VecStringSink::new();
    read_char_column(
        &mut Cursor::new(&bytes[..]),
        0,
        0,
        1,
        1,
        &StandardDecompressor,
        &mut sink,
        0,
    )
    .unwrap();
    assert_eq!(sink.encoding(), StringEncoding::LATIN1);
}

// ── index shape ────────────────────────────────────────────────────────────

#[test]
fn end_offsets_increase_strictly() {
    let values = sample_strings(5 * BLOCKSIZE_CHAR, 10, 11);
    let rows = values.len() as u64;

    let plain = write_column(&values, 0, 4);
    let mut prev = 0u64;
    for block in 0..5 {
        let end = le_u64_at(&plain, 8 + block * 8);
        assert!(end > prev, "block {block} end offset must advance");
        prev = end;
    }
    assert_eq!(prev, plain.len() as u64);

    let compressed = write_column(&values, 100, 4);
    let mut prev = 0u64;
    for block in 0..5 {
        let end = le_u64_at(&compressed, 8 + block * CHAR_INDEX_SIZE as usize);
        assert!(end > prev, "compressed block {block} end offset must advance");
        prev = end;
    }
    assert_eq!(prev, compressed.len() as u64);
    assert!(
        compressed.len() < plain.len(),
        "level 100 should shrink compressible text"
    );

    // both shapes stay readable
    assert_eq!(
        read_range(&plain, 0, rows, rows, 0),
        read_range(&compressed, 0, rows, rows, 0)
    );
}

// ── failure modes ──────────────────────────────────────────────────────────

#[test]
fn zero_rows_are_rejected() {
    let values: Vec<Option<String>> = Vec::new();
    let provider = VecStringProvider::new(&values);
    let mut out = Cursor::new(Vec::new());
    let err = write_char_column(&mut out, &provider, None, StringEncoding::UTF8, 1).unwrap_err();
    assert!(matches!(err, ColumnError::EmptyInput));
}

#[test]
fn truncated_column_fails_with_io_error() {
    let values = sample_strings(100, 0, 3);
    let mut bytes = write_column(&values, 0, 1);
    bytes.truncate(bytes.len() / 2);

    let mut sink = VecStringSink::new();
    let err = read_char_column(
        &mut Cursor::new(&bytes[..]),
        0,
        0,
        100,
        100,
        &StandardDecompressor,
        &mut sink,
        0,
    )
    .unwrap_err();
    assert!(matches!(err, ColumnError::Io(_)));
}

#[test]
fn unknown_algorithm_code_fails_gracefully() {
    // level 100 keeps the ZSTD code on compressible blocks
    let values = strings(&vec!["abcabcabc"; 200]);
    let bytes = write_column(&values, 100, 1);

    let mut sink = VecStringSink::new();
    let err = read_char_column(
        &mut Cursor::new(&bytes[..]),
        0,
        0,
        200,
        200,
        &VerbatimOnly,
        &mut sink,
        0,
    )
    .unwrap_err();
    assert!(matches!(err, ColumnError::Decompressor(_)));
}

#[test]
fn non_monotonic_index_is_corrupt() {
    let values = strings(&vec!["xyz"; BLOCKSIZE_CHAR + 10]);
    let rows = values.len() as u64;
    let mut bytes = write_column(&values, 0, 1);

    // make block 1 end where block 0 does
    let end0 = le_u64_at(&bytes, 8);
    bytes[16..24].copy_from_slice(&end0.to_le_bytes());

    let mut sink = VecStringSink::new();
    let err = read_char_column(
        &mut Cursor::new(&bytes[..]),
        0,
        0,
        rows,
        rows,
        &StandardDecompressor,
        &mut sink,
        0,
    )
    .unwrap_err();
    assert!(matches!(err, ColumnError::CorruptFormat(_)));
}

// ── on-disk smoke test ─────────────────────────────────────────────────────

#[test]
fn column_roundtrips_through_a_real_file() {
    let path = std::env::temp_dir().join("charcol_test_roundtrip.col");
    let values = sample_strings(3000, 10, 99);

    let provider = VecStringProvider::new(&values);
    let mut file = std::fs::File::create(&path).unwrap();
    let compressors = compressors_for_level(50);
    write_char_column(
        &mut file,
        &provider,
        compressors.as_ref(),
        StringEncoding::UTF8,
        4,
    )
    .unwrap();
    drop(file);

    let mut file = std::fs::File::open(&path).unwrap();
    let mut sink = VecStringSink::new();
    read_char_column(
        &mut file,
        0,
        500,
        2000,
        3000,
        &StandardDecompressor,
        &mut sink,
        1,
    )
    .unwrap();
    assert_eq!(sink.into_values(), as_bytes(&values[500..2500]));

    std::fs::remove_file(&path).ok();
}
