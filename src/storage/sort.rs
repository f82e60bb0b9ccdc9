//! Sorting of fixed-width (key, value) pair ranges inside a file.
//!
//! Each term's slice of the intermediate posting file is sorted
//! independently. Slices up to the spill threshold are sorted in
//! memory; larger ones are chunk-sorted and then merged through an
//! anonymous temp file, so a single huge term cannot exhaust memory.
//!
//! Pairs are compared as (key, value) tuples, which keeps the result
//! deterministic even if duplicate keys ever occur.

use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::Path;

use crate::error::Result;

const PAIR_BYTES: u64 = 16;
const IO_BUF_BYTES: usize = 1 << 16;

/// Default number of pairs sorted in memory before spilling to an
/// external merge.
pub const DEFAULT_SPILL_THRESHOLD: usize = 1 << 20;

/// Read `n_pairs` pairs starting at pair index `start_pair`.
pub fn read_pairs(file: &File, start_pair: u64, n_pairs: u64) -> Result<Vec<(u64, u64)>> {
    let mut bytes = vec![0u8; (n_pairs * PAIR_BYTES) as usize];
    file.read_exact_at(&mut bytes, start_pair * PAIR_BYTES)?;

    let mut pairs = Vec::with_capacity(n_pairs as usize);
    for chunk in bytes.chunks_exact(16) {
        pairs.push((super::le_word(&chunk[0..8]), super::le_word(&chunk[8..16])));
    }
    Ok(pairs)
}

/// Write pairs starting at pair index `start_pair`.
pub fn write_pairs(file: &File, start_pair: u64, pairs: &[(u64, u64)]) -> Result<()> {
    let mut bytes = Vec::with_capacity(pairs.len() * 16);
    for &(key, value) in pairs {
        bytes.extend_from_slice(&key.to_le_bytes());
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    file.write_all_at(&bytes, start_pair * PAIR_BYTES)?;
    Ok(())
}

/// Sort `n_pairs` pairs in place, starting at pair index `start_pair`.
///
/// `spill_threshold` is the largest pair count sorted entirely in
/// memory; beyond it the range is sorted as chunked runs merged through
/// a temp file in `work_dir`.
pub fn sort_pair_range(
    file: &File,
    start_pair: u64,
    n_pairs: u64,
    spill_threshold: usize,
    work_dir: &Path,
) -> Result<()> {
    if n_pairs < 2 {
        return Ok(());
    }

    if n_pairs <= spill_threshold as u64 {
        let mut pairs = read_pairs(file, start_pair, n_pairs)?;
        pairs.sort_unstable();
        return write_pairs(file, start_pair, &pairs);
    }

    sort_external(file, start_pair, n_pairs, spill_threshold as u64, work_dir)
}

fn sort_external(
    file: &File,
    start_pair: u64,
    n_pairs: u64,
    run_pairs: u64,
    work_dir: &Path,
) -> Result<()> {
    // Pass 1: sort each run in memory, in place.
    let mut run_start = 0u64;
    while run_start < n_pairs {
        let len = run_pairs.min(n_pairs - run_start);
        let mut pairs = read_pairs(file, start_pair + run_start, len)?;
        pairs.sort_unstable();
        write_pairs(file, start_pair + run_start, &pairs)?;
        run_start += len;
    }

    // Pass 2..n: merge adjacent runs, ping-ponging between the source
    // range and a temp file of the same size.
    let temp = tempfile::tempfile_in(work_dir)?;
    temp.set_len(n_pairs * PAIR_BYTES)?;

    let mut run_len = run_pairs;
    let mut in_source = true;
    while run_len < n_pairs {
        let (src, src_base) = if in_source { (file, start_pair) } else { (&temp, 0) };
        let (dst, dst_base) = if in_source { (&temp, 0) } else { (file, start_pair) };

        let mut at = 0u64;
        while at < n_pairs {
            let a_len = run_len.min(n_pairs - at);
            let b_len = run_len.min(n_pairs - (at + a_len).min(n_pairs));
            merge_runs(
                src,
                src_base + at,
                a_len,
                src_base + at + a_len,
                b_len,
                dst,
                dst_base + at,
            )?;
            at += a_len + b_len;
        }

        in_source = !in_source;
        run_len *= 2;
    }

    if !in_source {
        // Result landed in the temp file; copy it back.
        let mut buf = vec![0u8; IO_BUF_BYTES];
        let total = n_pairs * PAIR_BYTES;
        let mut at = 0u64;
        while at < total {
            let len = (IO_BUF_BYTES as u64).min(total - at) as usize;
            temp.read_exact_at(&mut buf[..len], at)?;
            file.write_all_at(&buf[..len], start_pair * PAIR_BYTES + at)?;
            at += len as u64;
        }
    }

    Ok(())
}

fn merge_runs(
    src: &File,
    a_start: u64,
    a_len: u64,
    b_start: u64,
    b_len: u64,
    dst: &File,
    dst_start: u64,
) -> Result<()> {
    let mut a = PairCursor::new(src, a_start, a_len)?;
    let mut b = PairCursor::new(src, b_start, b_len)?;
    let mut out = PairSink::new(dst, dst_start);

    loop {
        match (a.peek(), b.peek()) {
            (Some(pa), Some(pb)) => {
                if pa <= pb {
                    out.push(pa)?;
                    a.advance()?;
                } else {
                    out.push(pb)?;
                    b.advance()?;
                }
            }
            (Some(pa), None) => {
                out.push(pa)?;
                a.advance()?;
            }
            (None, Some(pb)) => {
                out.push(pb)?;
                b.advance()?;
            }
            (None, None) => break,
        }
    }

    out.flush()
}

struct PairCursor<'a> {
    file: &'a File,
    next_byte: u64,
    end_byte: u64,
    buf: Vec<u8>,
    buf_at: usize,
    current: Option<(u64, u64)>,
}

impl<'a> PairCursor<'a> {
    fn new(file: &'a File, start_pair: u64, n_pairs: u64) -> Result<PairCursor<'a>> {
        let mut cursor = PairCursor {
            file,
            next_byte: start_pair * PAIR_BYTES,
            end_byte: (start_pair + n_pairs) * PAIR_BYTES,
            buf: Vec::new(),
            buf_at: 0,
            current: None,
        };
        cursor.advance()?;
        Ok(cursor)
    }

    fn peek(&self) -> Option<(u64, u64)> {
        self.current
    }

    fn advance(&mut self) -> Result<()> {
        if self.buf_at >= self.buf.len() {
            let remaining = self.end_byte - self.next_byte;
            if remaining == 0 {
                self.current = None;
                return Ok(());
            }
            let len = (IO_BUF_BYTES as u64).min(remaining) as usize;
            self.buf.resize(len, 0);
            self.file.read_exact_at(&mut self.buf, self.next_byte)?;
            self.next_byte += len as u64;
            self.buf_at = 0;
        }

        let chunk = &self.buf[self.buf_at..self.buf_at + 16];
        self.current = Some((super::le_word(&chunk[0..8]), super::le_word(&chunk[8..16])));
        self.buf_at += 16;
        Ok(())
    }
}

struct PairSink<'a> {
    file: &'a File,
    at_byte: u64,
    buf: Vec<u8>,
}

impl<'a> PairSink<'a> {
    fn new(file: &'a File, start_pair: u64) -> PairSink<'a> {
        PairSink {
            file,
            at_byte: start_pair * PAIR_BYTES,
            buf: Vec::with_capacity(IO_BUF_BYTES),
        }
    }

    fn push(&mut self, pair: (u64, u64)) -> Result<()> {
        self.buf.extend_from_slice(&pair.0.to_le_bytes());
        self.buf.extend_from_slice(&pair.1.to_le_bytes());
        if self.buf.len() >= IO_BUF_BYTES {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if !self.buf.is_empty() {
            self.file.write_all_at(&self.buf, self.at_byte)?;
            self.at_byte += self.buf.len() as u64;
            self.buf.clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use tempfile::TempDir;

    fn pair_file(dir: &TempDir, pairs: &[(u64, u64)]) -> File {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(dir.path().join("pairs.dat"))
            .unwrap();
        file.set_len(pairs.len() as u64 * 16).unwrap();
        write_pairs(&file, 0, pairs).unwrap();
        file
    }

    fn descending(n: u64) -> Vec<(u64, u64)> {
        (0..n).rev().map(|i| (i, i * 2)).collect()
    }

    #[test]
    fn test_in_memory_sort() {
        let dir = TempDir::new().unwrap();
        let file = pair_file(&dir, &descending(100));

        sort_pair_range(&file, 0, 100, 1000, dir.path()).unwrap();

        let pairs = read_pairs(&file, 0, 100).unwrap();
        for (i, &(key, value)) in pairs.iter().enumerate() {
            assert_eq!(key, i as u64);
            assert_eq!(value, key * 2);
        }
    }

    #[test]
    fn test_external_sort() {
        let dir = TempDir::new().unwrap();
        let n = 1000u64;
        let file = pair_file(&dir, &descending(n));

        // Threshold of 64 pairs forces several merge passes.
        sort_pair_range(&file, 0, n, 64, dir.path()).unwrap();

        let pairs = read_pairs(&file, 0, n).unwrap();
        for (i, &(key, value)) in pairs.iter().enumerate() {
            assert_eq!(key, i as u64);
            assert_eq!(value, key * 2);
        }
    }

    #[test]
    fn test_sort_subrange_only() {
        let dir = TempDir::new().unwrap();
        let mut pairs = descending(30);
        pairs.extend(descending(10));
        let file = pair_file(&dir, &pairs);

        // Sort only the tail segment; the head must stay untouched.
        sort_pair_range(&file, 30, 10, 4, dir.path()).unwrap();

        let head = read_pairs(&file, 0, 30).unwrap();
        assert_eq!(head, descending(30));

        let tail = read_pairs(&file, 30, 10).unwrap();
        let mut expected = descending(10);
        expected.sort_unstable();
        assert_eq!(tail, expected);
    }

    #[test]
    fn test_external_matches_in_memory() {
        let dir_a = TempDir::new().unwrap();
        let dir_b = TempDir::new().unwrap();

        let data: Vec<(u64, u64)> = (0..500u64).map(|i| ((i * 7919) % 251, i)).collect();
        let file_a = pair_file(&dir_a, &data);
        let file_b = pair_file(&dir_b, &data);

        sort_pair_range(&file_a, 0, 500, 10_000, dir_a.path()).unwrap();
        sort_pair_range(&file_b, 0, 500, 32, dir_b.path()).unwrap();

        assert_eq!(
            read_pairs(&file_a, 0, 500).unwrap(),
            read_pairs(&file_b, 0, 500).unwrap()
        );
    }
}
