use crate::format::{nr_of_na_ints, StringEncoding};

/// Source of the strings a column is written from.
///
/// The writer calls providers from multiple worker threads on disjoint
/// element ranges, so implementations must be `Sync`. All byte counts refer
/// to the raw payload bytes of the strings; the codec never transcodes.
pub trait StringProvider: Sync {
    /// Total number of rows available.
    fn vec_length(&self) -> u64;

    /// Compute the size metadata of elements `[start, start + nelem)`.
    ///
    /// Fills `size_meta[0..nelem]` with *cumulative* byte sizes (element i
    /// occupies bytes `[size_meta[i-1], size_meta[i])` of the block payload,
    /// with an implicit leading 0) and `size_meta[nelem..nelem + 1 + nelem/32]`
    /// with the block's NA words: bit 0 of word 0 is the any-null flag,
    /// element i maps to overall bit i + 1. Null elements contribute zero
    /// bytes. Returns the total character byte count of the range.
    fn calculate_sizes(&self, start: u64, nelem: usize, size_meta: &mut [u32]) -> usize;

    /// Concatenate the raw bytes of elements `[start, start + nelem)` into
    /// `dst`, placing each element at the position implied by the cumulative
    /// `lengths` previously produced by [`calculate_sizes`](Self::calculate_sizes).
    fn serialize_char_block(&self, start: u64, nelem: usize, lengths: &[u32], dst: &mut [u8]);
}

/// Destination for decoded strings.
///
/// The reader drives a sink strictly from the calling thread (the master);
/// helper threads never touch it. Inputs to [`buffer_to_vec`](Self::buffer_to_vec)
/// are validated by the reader before the call, so implementations may index
/// the char payload directly.
pub trait StringSink {
    /// Ensure capacity for `vec_length` output elements.
    fn allocate_vec(&mut self, vec_length: u64);

    /// Record the column's string encoding tag.
    fn set_encoding(&mut self, encoding: StringEncoding);

    /// Materialize block elements `[start_elem, end_elem]` (inclusive) into
    /// output positions `dest_offset..dest_offset + (end_elem - start_elem + 1)`.
    ///
    /// `size_meta` holds the block's `nelem` cumulative lengths followed by
    /// its NA words; `chars` is the block's full uncompressed payload.
    fn buffer_to_vec(
        &mut self,
        nelem: usize,
        start_elem: usize,
        end_elem: usize,
        dest_offset: u64,
        size_meta: &[u32],
        chars: &[u8],
    );
}

#[inline]
fn is_null(size_meta: &[u32], nelem: usize, elem: usize) -> bool {
    let bit = elem + 1;
    size_meta[nelem + bit / 32] >> (bit % 32) & 1 == 1
}

// ── In-memory reference implementations ────────────────────────────────────

/// Provider over a borrowed slice of optional strings; `None` is null.
pub struct VecStringProvider<'a> {
    values: &'a [Option<String>],
}

impl<'a> VecStringProvider<'a> {
    pub fn new(values: &'a [Option<String>]) -> Self {
        VecStringProvider { values }
    }
}

impl StringProvider for VecStringProvider<'_> {
    fn vec_length(&self) -> u64 {
        self.values.len() as u64
    }

    fn calculate_sizes(&self, start: u64, nelem: usize, size_meta: &mut [u32]) -> usize {
        let (lengths, na_words) = size_meta.split_at_mut(nelem);
        na_words[..nr_of_na_ints(nelem)].fill(0);

        let base = start as usize;
        let mut total = 0usize;
        let mut any_null = false;
        for i in 0..nelem {
            match &self.values[base + i] {
                Some(s) => total += s.len(),
                None => {
                    any_null = true;
                    let bit = i + 1;
                    na_words[bit / 32] |= 1 << (bit % 32);
                }
            }
            lengths[i] = total as u32;
        }
        if any_null {
            na_words[0] |= 1;
        }
        total
    }

    fn serialize_char_block(&self, start: u64, nelem: usize, lengths: &[u32], dst: &mut [u8]) {
        let base = start as usize;
        for i in 0..nelem {
            if let Some(s) = &self.values[base + i] {
                let end = lengths[i] as usize;
                dst[end - s.len()..end].copy_from_slice(s.as_bytes());
            }
        }
    }
}

/// Sink collecting decoded elements as raw byte strings; `None` is null.
#[derive(Default)]
pub struct VecStringSink {
    values: Vec<Option<Vec<u8>>>,
    encoding: StringEncoding,
}

impl VecStringSink {
    pub fn new() -> Self {
        VecStringSink::default()
    }

    pub fn values(&self) -> &[Option<Vec<u8>>] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Option<Vec<u8>>> {
        self.values
    }

    pub fn encoding(&self) -> StringEncoding {
        self.encoding
    }
}

impl StringSink for VecStringSink {
    fn allocate_vec(&mut self, vec_length: u64) {
        self.values.clear();
        self.values.resize(vec_length as usize, None);
    }

    fn set_encoding(&mut self, encoding: StringEncoding) {
        self.encoding = encoding;
    }

    fn buffer_to_vec(
        &mut self,
        nelem: usize,
        start_elem: usize,
        end_elem: usize,
        dest_offset: u64,
        size_meta: &[u32],
        chars: &[u8],
    ) {
        for elem in start_elem..=end_elem {
            let pos = dest_offset as usize + (elem - start_elem);
            if is_null(size_meta, nelem, elem) {
                self.values[pos] = None;
            } else {
                let start_byte = if elem == 0 { 0 } else { size_meta[elem - 1] as usize };
                let end_byte = size_meta[elem] as usize;
                self.values[pos] = Some(chars[start_byte..end_byte].to_vec());
            }
        }
    }
}
