/// Size of the column header in bytes: `encoded_flags:u32 + block_size:u32`.
pub const CHAR_HEADER_SIZE: u64 = 8;

/// Size of one block index entry in a compressed column, in bytes.
///   end_offset:u64 + algo_int:u16 + algo_char:u16 + int_buf_size:u32 = 16
pub const CHAR_INDEX_SIZE: u64 = 16;

/// Size of one block index entry in an uncompressed column: `end_offset:u64` only.
pub const BLOCK_OFFSET_SIZE: u64 = 8;

/// Number of logical elements in a full block (the last block may hold fewer).
pub const BLOCKSIZE_CHAR: usize = 2048;

/// Maximum number of blocks grouped into one write job. Jobs bundle
/// consecutive blocks so that each ordered commit issues one large write
/// instead of many small ones.
pub const BATCH_SIZE_WRITE_CHAR: usize = 32;

/// Cap on the serialized size of a single block. A block whose lengths, NA
/// words and character payload together exceed this aborts the column write.
pub const MAX_BLOCK_BYTES: usize = 1 << 30;

// ── Algorithm codes ────────────────────────────────────────────────────────

/// The block part is stored verbatim, no decompression needed.
pub const ALGO_VERBATIM: u16 = 0;
pub const ALGO_LZ4: u16 = 1;
pub const ALGO_ZSTD: u16 = 2;

// ── Little-endian slice helpers ────────────────────────────────────────────

#[inline]
pub(crate) fn le_u16(b: &[u8]) -> u16 {
    let mut buf = [0u8; 2];
    buf.copy_from_slice(&b[..2]);
    u16::from_le_bytes(buf)
}

#[inline]
pub(crate) fn le_u32(b: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&b[..4]);
    u32::from_le_bytes(buf)
}

#[inline]
pub(crate) fn le_u64(b: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&b[..8]);
    u64::from_le_bytes(buf)
}

// ── String encoding tag ────────────────────────────────────────────────────

/// Opaque 3-bit label for the character encoding of payload bytes.
///
/// The codec transports the tag verbatim and never transcodes; unknown tags
/// survive a write/read cycle unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringEncoding(u8);

impl StringEncoding {
    pub const NATIVE: StringEncoding = StringEncoding(0);
    pub const LATIN1: StringEncoding = StringEncoding(1);
    pub const UTF8: StringEncoding = StringEncoding(2);

    /// Build from a raw tag; only the low 3 bits are kept.
    pub fn from_tag(tag: u8) -> Self {
        StringEncoding(tag & 7)
    }

    pub fn tag(self) -> u8 {
        self.0
    }
}

impl Default for StringEncoding {
    fn default() -> Self {
        StringEncoding::NATIVE
    }
}

// ── Column header ──────────────────────────────────────────────────────────

/// Decoded representation of the 8-byte column header.
///
/// The flags word packs the compression marker in bit 0 and the encoding tag
/// in bits 1–3; all remaining bits are reserved zero.
#[derive(Debug, Clone, Copy)]
pub struct ColumnHeader {
    pub compressed: bool,
    pub encoding: StringEncoding,
    /// Number of logical elements per full block, constant for the column.
    pub block_size: u32,
}

impl ColumnHeader {
    /// Serialize to exactly `CHAR_HEADER_SIZE` bytes.
    pub fn to_bytes(&self) -> [u8; CHAR_HEADER_SIZE as usize] {
        let flags = (u32::from(self.encoding.tag()) << 1) | u32::from(self.compressed);
        let mut buf = [0u8; CHAR_HEADER_SIZE as usize];
        buf[0..4].copy_from_slice(&flags.to_le_bytes());
        buf[4..8].copy_from_slice(&self.block_size.to_le_bytes());
        buf
    }

    /// Deserialize from `CHAR_HEADER_SIZE` bytes.
    pub fn from_bytes(buf: &[u8; CHAR_HEADER_SIZE as usize]) -> Self {
        let flags = le_u32(&buf[0..4]);
        ColumnHeader {
            compressed: flags & 1 != 0,
            encoding: StringEncoding::from_tag((flags >> 1) as u8),
            block_size: le_u32(&buf[4..8]),
        }
    }

    /// File offset of the first payload byte, relative to the column start.
    pub fn payload_start(&self, num_blocks: u64) -> u64 {
        CHAR_HEADER_SIZE + num_blocks * self.index_entry_size()
    }

    /// Width of one block index entry for this column.
    pub fn index_entry_size(&self) -> u64 {
        if self.compressed {
            CHAR_INDEX_SIZE
        } else {
            BLOCK_OFFSET_SIZE
        }
    }
}

// ── Block index entry ──────────────────────────────────────────────────────

/// One entry of the per-column block index.
///
/// `end_offset` is the absolute offset of the first byte after the block,
/// measured from the start of the column; entries are strictly increasing.
/// The remaining fields are only serialized for compressed columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockIndexEntry {
    pub end_offset: u64,
    /// Algorithm the lengths array was compressed under; 0 = stored verbatim.
    pub algo_int: u16,
    /// Algorithm the character payload was compressed under; 0 = verbatim.
    pub algo_char: u16,
    /// On-disk size of the (possibly compressed) lengths array in bytes.
    pub int_buf_size: u32,
}

impl BlockIndexEntry {
    /// Serialize the uncompressed-column shape: the end offset alone.
    pub fn to_bytes8(&self) -> [u8; BLOCK_OFFSET_SIZE as usize] {
        self.end_offset.to_le_bytes()
    }

    pub fn from_bytes8(buf: &[u8; BLOCK_OFFSET_SIZE as usize]) -> Self {
        BlockIndexEntry {
            end_offset: u64::from_le_bytes(*buf),
            ..BlockIndexEntry::default()
        }
    }

    /// Serialize the compressed-column shape, exactly `CHAR_INDEX_SIZE` bytes.
    pub fn to_bytes16(&self) -> [u8; CHAR_INDEX_SIZE as usize] {
        let mut buf = [0u8; CHAR_INDEX_SIZE as usize];
        buf[0..8].copy_from_slice(&self.end_offset.to_le_bytes());
        buf[8..10].copy_from_slice(&self.algo_int.to_le_bytes());
        buf[10..12].copy_from_slice(&self.algo_char.to_le_bytes());
        buf[12..16].copy_from_slice(&self.int_buf_size.to_le_bytes());
        buf
    }

    pub fn from_bytes16(buf: &[u8; CHAR_INDEX_SIZE as usize]) -> Self {
        BlockIndexEntry {
            end_offset: le_u64(&buf[0..8]),
            algo_int: le_u16(&buf[8..10]),
            algo_char: le_u16(&buf[10..12]),
            int_buf_size: le_u32(&buf[12..16]),
        }
    }
}

/// Number of NA words stored for a block of `nelem` elements: one bit per
/// element plus the leading any-null flag bit, in whole u32 words.
#[inline]
pub fn nr_of_na_ints(nelem: usize) -> usize {
    1 + nelem / 32
}
