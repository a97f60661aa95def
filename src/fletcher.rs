use std::io;

use itertools::Itertools;

/// Size of a finished fletcher4 checksum in bytes
pub const CHECKSUM_SIZE: usize = 4 * core::mem::size_of::<u64>();

/// Smallest unit folded into the running sums, not a requirement on write lengths
pub const BLOCK_SIZE: usize = core::mem::size_of::<u32>();

pub trait Checksummer {
    /// Consumes all of `data`, returns how many bytes were consumed
    fn write(&mut self, data: &[u8]) -> usize;

    /// Current checksum, a trailing partial word is zero padded
    fn checksum(&self) -> [u64; 4];

    /// Appends the 32 byte checksum to `buf`: s0, s1, s2, s3, each little-endian
    fn append_checksum_bytes(&self, buf: Vec<u8>) -> Vec<u8>;

    /// Back to the empty state, pending bytes are dropped
    fn reset(&mut self);

    fn checksum_size_bytes(&self) -> usize {
        CHECKSUM_SIZE
    }

    fn block_size_bytes(&self) -> usize {
        BLOCK_SIZE
    }
}

/// Streaming fletcher4 accumulator.
///
/// Input may be split across any number of writes, the result only depends on the
/// concatenated bytes. Unlike zfs (which ignores a trailing partial word) a trailing
/// partial word is zero padded when the checksum is read.
#[derive(Debug, Clone, Default)]
pub struct Fletcher4 {
    sum: [u64; 4],
    pending: [u8; BLOCK_SIZE],
    pending_len: usize,
}

impl Fletcher4 {
    pub fn new() -> Fletcher4 {
        Fletcher4::default()
    }
}

// Panics if data isn't made of whole words
pub(crate) fn fold_blocks(sum: &mut [u64; 4], data: &[u8]) {
    assert!(
        data.len() % BLOCK_SIZE == 0,
        "fletcher4 blocks must be a multiple of {} bytes, got {} bytes",
        BLOCK_SIZE,
        data.len()
    );

    let [mut s1, mut s2, mut s3, mut s4] = *sum;
    for block in data.chunks_exact(BLOCK_SIZE) {
        let n = u32::from_le_bytes(block.try_into().unwrap()); // unwrap won't fail thanks to chunks_exact
        s1 = s1.wrapping_add(u64::from(n));
        s2 = s2.wrapping_add(s1);
        s3 = s3.wrapping_add(s2);
        s4 = s4.wrapping_add(s3);
    }
    *sum = [s1, s2, s3, s4];
}

impl Checksummer for Fletcher4 {
    fn write(&mut self, mut data: &[u8]) -> usize {
        let consumed = data.len();

        if self.pending_len > 0 {
            let todo = (BLOCK_SIZE - self.pending_len).min(data.len());
            self.pending[self.pending_len..self.pending_len + todo].copy_from_slice(&data[..todo]);
            self.pending_len += todo;
            data = &data[todo..];

            if self.pending_len == BLOCK_SIZE {
                fold_blocks(&mut self.sum, &self.pending);
                self.pending_len = 0;
            }
        }

        let aligned_len = data.len() - data.len() % BLOCK_SIZE;
        fold_blocks(&mut self.sum, &data[..aligned_len]);

        let rest = &data[aligned_len..];
        if !rest.is_empty() {
            self.pending[..rest.len()].copy_from_slice(rest);
            self.pending_len = rest.len();
        }

        consumed
    }

    fn checksum(&self) -> [u64; 4] {
        let mut sum = self.sum;
        if self.pending_len > 0 {
            let mut padded = [0u8; BLOCK_SIZE];
            padded[..self.pending_len].copy_from_slice(&self.pending[..self.pending_len]);
            fold_blocks(&mut sum, &padded);
        }
        sum
    }

    fn append_checksum_bytes(&self, mut buf: Vec<u8>) -> Vec<u8> {
        buf.extend_from_slice(&checksum_to_bytes_le(&self.checksum()));
        buf
    }

    fn reset(&mut self) {
        self.sum = [0; 4];
        self.pending = [0; BLOCK_SIZE];
        self.pending_len = 0;
    }
}

impl io::Write for Fletcher4 {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(Checksummer::write(self, buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn do_fletcher4(data: &[u8]) -> [u64; 4] {
    let mut hasher = Fletcher4::new();
    hasher.write(data);
    hasher.checksum()
}

pub fn checksum_to_bytes_le(checksum: &[u64; 4]) -> [u8; CHECKSUM_SIZE] {
    let mut res = [0u8; CHECKSUM_SIZE];
    for (dst, word) in res.chunks_exact_mut(core::mem::size_of::<u64>()).zip(checksum) {
        dst.copy_from_slice(&word.to_le_bytes());
    }
    res
}

pub fn checksum_from_bytes_le(data: &[u8]) -> Option<[u64; 4]> {
    if data.len() != CHECKSUM_SIZE {
        return None;
    }

    let mut res = [0u64; 4];
    for (word, src) in res.iter_mut().zip(data.chunks_exact(core::mem::size_of::<u64>())) {
        *word = u64::from_le_bytes(src.try_into().ok()?);
    }
    Some(res)
}

// Same layout zdb uses when printing checksums, e.g. 6c6c65d7/d8d8cb3f/1454530a7/1b1b1960f
pub fn format_checksum(checksum: &[u64; 4]) -> String {
    checksum.iter().map(|word| format!("{word:x}")).join("/")
}

pub fn parse_checksum(text: &str) -> Option<[u64; 4]> {
    let mut words = text.trim().split('/');
    let mut res = [0u64; 4];
    for word in res.iter_mut() {
        *word = u64::from_str_radix(words.next()?, 16).ok()?;
    }
    if words.next().is_some() {
        return None;
    }
    Some(res)
}
