//! Memory-mapped arrays of u64 words.
//!
//! Index files are laid out as flat arrays of little-endian u64 words.
//! All offset arithmetic against them goes through the bounds-checked
//! accessors here; builders write through [`LongArray`], readers share a
//! read-only [`LongArrayReader`] across threads.

use std::fs::{File, OpenOptions};
use std::path::Path;

use memmap2::{Mmap, MmapMut};

use crate::error::{Result, SileneError};
use crate::storage::le_word;

/// A mutable memory-mapped array of u64 words, used while building
/// index files.
pub struct LongArray {
    map: Option<MmapMut>,
    len: usize,
}

impl LongArray {
    /// Create (or truncate) a file of `len` words and map it mutably.
    pub fn create(path: &Path, len: usize) -> Result<LongArray> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(len as u64 * 8)?;

        let map = if len == 0 {
            None
        } else {
            Some(unsafe { MmapMut::map_mut(&file)? })
        };

        Ok(LongArray { map, len })
    }

    /// Map an existing file mutably.
    pub fn open_rw(path: &Path) -> Result<LongArray> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let bytes = file.metadata()?.len();
        if bytes % 8 != 0 {
            return Err(SileneError::index(format!(
                "{} is not a whole number of words ({bytes} bytes)",
                path.display()
            )));
        }

        let len = (bytes / 8) as usize;
        let map = if len == 0 {
            None
        } else {
            Some(unsafe { MmapMut::map_mut(&file)? })
        };

        Ok(LongArray { map, len })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: usize) -> u64 {
        assert!(index < self.len, "word read at {index} out of bounds ({})", self.len);
        match &self.map {
            Some(map) => le_word(&map[index * 8..]),
            None => unreachable!(),
        }
    }

    pub fn set(&mut self, index: usize, value: u64) {
        assert!(index < self.len, "word write at {index} out of bounds ({})", self.len);
        if let Some(map) = &mut self.map {
            map[index * 8..index * 8 + 8].copy_from_slice(&value.to_le_bytes());
        }
    }

    /// Write a run of words starting at `index`.
    pub fn set_range(&mut self, index: usize, values: &[u64]) {
        assert!(
            index + values.len() <= self.len,
            "word range write at {index}+{} out of bounds ({})",
            values.len(),
            self.len
        );
        for (i, &v) in values.iter().enumerate() {
            if let Some(map) = &mut self.map {
                let at = (index + i) * 8;
                map[at..at + 8].copy_from_slice(&v.to_le_bytes());
            }
        }
    }

    /// Flush dirty pages to durable storage.
    pub fn force(&self) -> Result<()> {
        if let Some(map) = &self.map {
            map.flush()?;
        }
        Ok(())
    }
}

/// A shared read-only memory-mapped array of u64 words.
pub struct LongArrayReader {
    map: Option<Mmap>,
    len: usize,
}

impl LongArrayReader {
    pub fn open(path: &Path) -> Result<LongArrayReader> {
        let file = File::open(path)?;
        let bytes = file.metadata()?.len();
        if bytes % 8 != 0 {
            return Err(SileneError::index(format!(
                "{} is not a whole number of words ({bytes} bytes)",
                path.display()
            )));
        }

        let len = (bytes / 8) as usize;
        let map = if len == 0 {
            None
        } else {
            Some(unsafe { Mmap::map(&file)? })
        };

        Ok(LongArrayReader { map, len })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: usize) -> u64 {
        assert!(index < self.len, "word read at {index} out of bounds ({})", self.len);
        match &self.map {
            Some(map) => le_word(&map[index * 8..]),
            None => unreachable!(),
        }
    }

    /// Copy `out.len()` words starting at `index` into `out`.
    pub fn read_into(&self, index: usize, out: &mut [u64]) {
        assert!(
            index + out.len() <= self.len,
            "word range read at {index}+{} out of bounds ({})",
            out.len(),
            self.len
        );
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.get(index + i);
        }
    }

    /// Binary search over `n` items of `stride` words each, comparing
    /// the first word of every item against `target`. The base offset
    /// is in words. Returns the item index or the insertion point.
    pub fn binary_search_strided(
        &self,
        target: u64,
        base: usize,
        n: usize,
        stride: usize,
    ) -> std::result::Result<usize, usize> {
        let mut lo = 0usize;
        let mut hi = n;

        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let key = self.get(base + mid * stride);
            if key < target {
                lo = mid + 1;
            } else if key > target {
                hi = mid;
            } else {
                return Ok(mid);
            }
        }

        Err(lo)
    }
}
