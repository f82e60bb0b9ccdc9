//! Static n-ary search trees serialized into flat word arrays.
//!
//! Each postings block in the reverse index docs file is one of these
//! trees, written once during conversion and never updated in place.
//! Layout, in words:
//!
//! ```text
//! +0   header: (layer count << 32) | entry count
//! +1   header: absolute word offset of the data region
//! +2   index layers, top layer first, each a whole number of blocks
//! ...  data region: entries of `entry_size` words, sorted by first word
//! ```
//!
//! Index layers hold copies of the largest key reachable through each
//! child block, so descent needs no sibling pointers: the geometry of
//! every layer is recomputed from the entry count alone. Blocks are
//! padded to full size with `u64::MAX`.

use crate::error::{Result, SileneError};
use crate::storage::array::{LongArray, LongArrayReader};

/// Geometry of a serialized tree. All trees in one docs file share a
/// context, so readers never need per-block geometry metadata beyond
/// the entry count in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BTreeContext {
    /// Upper bound on index layers; trees needing more are rejected.
    pub max_layers: usize,
    /// Words per data entry. The first word of an entry is its key.
    pub entry_size: usize,
    /// log2 of the keys held by one index block.
    pub block_size_bits: u32,
}

impl Default for BTreeContext {
    fn default() -> BTreeContext {
        BTreeContext::new(4, 2, 11)
    }
}

impl BTreeContext {
    pub const fn new(max_layers: usize, entry_size: usize, block_size_bits: u32) -> BTreeContext {
        BTreeContext { max_layers, entry_size, block_size_bits }
    }

    fn keys_per_block(&self) -> usize {
        1 << self.block_size_bits
    }

    fn entries_per_data_block(&self) -> usize {
        self.keys_per_block() / self.entry_size
    }

    /// Entries addressable through `layers` index layers.
    fn capacity(&self, layers: usize) -> u64 {
        let mut cap = self.entries_per_data_block() as u64;
        for _ in 0..layers {
            cap = cap.saturating_mul(self.keys_per_block() as u64);
        }
        cap
    }

    /// Fewest index layers able to address `n_entries`, or None when
    /// even `max_layers` cannot.
    fn layers_for(&self, n_entries: usize) -> Option<usize> {
        (0..=self.max_layers).find(|&layers| self.capacity(layers) >= n_entries as u64)
    }

    /// Per-layer geometry for a tree of `n_entries`, top layer first:
    /// (keys that address real children, words including padding).
    ///
    /// The deepest layer holds one key per data block; each layer
    /// above holds one key per block below it. Both sides of a lookup
    /// derive the same vector, which is what makes the format
    /// self-describing.
    fn layer_layout(&self, n_entries: usize, layers: usize) -> Vec<(usize, usize)> {
        let kpb = self.keys_per_block();
        let mut layout = Vec::with_capacity(layers);
        let mut real = n_entries.div_ceil(self.entries_per_data_block());
        for _ in 0..layers {
            layout.push((real, real.div_ceil(kpb) * kpb));
            real = real.div_ceil(kpb);
        }
        layout.reverse();
        layout
    }

    fn index_words(&self, n_entries: usize, layers: usize) -> usize {
        self.layer_layout(n_entries, layers).iter().map(|&(_, words)| words).sum()
    }

    /// Total serialized size of a tree holding `n_entries`, in words.
    /// Fails when the entry count exceeds what `max_layers` can hold.
    pub fn tree_words(&self, n_entries: usize) -> Result<usize> {
        let layers = self.layers_for(n_entries).ok_or_else(|| {
            SileneError::index(format!(
                "postings list of {n_entries} entries exceeds tree capacity"
            ))
        })?;
        Ok(2 + self.index_words(n_entries, layers) + n_entries * self.entry_size)
    }
}

/// Serializes sorted (key, value) entries as a search tree.
pub struct BTreeWriter {
    ctx: BTreeContext,
}

impl BTreeWriter {
    pub fn new(ctx: BTreeContext) -> BTreeWriter {
        BTreeWriter { ctx }
    }

    /// Write a tree for `entries` at word offset `at`, returning the
    /// words consumed. Entries must already be sorted by key; an empty
    /// slice is rejected since the caller encodes absent terms as
    /// zero-length blocks instead.
    pub fn write(&self, target: &mut LongArray, at: usize, entries: &[(u64, u64)]) -> Result<usize> {
        debug_assert_eq!(self.ctx.entry_size, 2, "pair writer requires two-word entries");
        debug_assert!(entries.windows(2).all(|w| w[0].0 <= w[1].0));

        let n = entries.len();
        if n == 0 {
            return Err(SileneError::invalid_argument("cannot serialize an empty postings tree"));
        }
        if n > u32::MAX as usize {
            return Err(SileneError::index(format!(
                "postings list of {n} entries exceeds header range"
            )));
        }
        let layers = self.ctx.layers_for(n).ok_or_else(|| {
            SileneError::index(format!("postings list of {n} entries exceeds tree capacity"))
        })?;
        let layout = self.ctx.layer_layout(n, layers);
        let data_offset = at + 2 + layout.iter().map(|&(_, words)| words).sum::<usize>();

        target.set(at, (layers as u64) << 32 | n as u64);
        target.set(at + 1, data_offset as u64);

        // Key levels, built from the data blocks upward: each level is
        // the running maxima of the blocks one step below it.
        let kpb = self.ctx.keys_per_block();
        let mut levels: Vec<Vec<u64>> = Vec::with_capacity(layers);
        if layers > 0 {
            let epd = self.ctx.entries_per_data_block();
            let mut current: Vec<u64> =
                entries.chunks(epd).map(|block| block[block.len() - 1].0).collect();
            for _ in 1..layers {
                let above: Vec<u64> =
                    current.chunks(kpb).map(|block| block[block.len() - 1]).collect();
                levels.push(std::mem::replace(&mut current, above));
            }
            levels.push(current);
        }

        let mut offset = at + 2;
        for (level, &(real, words)) in levels.iter().rev().zip(&layout) {
            debug_assert_eq!(level.len(), real);
            for (i, &key) in level.iter().enumerate() {
                target.set(offset + i, key);
            }
            for i in level.len()..words {
                target.set(offset + i, u64::MAX);
            }
            offset += words;
        }

        debug_assert_eq!(offset, data_offset);
        for (i, &(key, value)) in entries.iter().enumerate() {
            target.set(offset + i * 2, key);
            target.set(offset + i * 2 + 1, value);
        }
        offset += n * 2;

        Ok(offset - at)
    }
}

/// Read-side view of one serialized tree.
pub struct BTreeReader<'a> {
    ctx: BTreeContext,
    array: &'a LongArrayReader,
    n_entries: usize,
    layers: usize,
    index_base: usize,
    data_offset: usize,
}

impl<'a> BTreeReader<'a> {
    /// Open the tree serialized at word offset `base`, validating the
    /// header against the geometry the entry count implies.
    pub fn open(ctx: BTreeContext, array: &'a LongArrayReader, base: usize) -> Result<BTreeReader<'a>> {
        if base + 2 > array.len() {
            return Err(SileneError::index(format!("tree header at word {base} out of bounds")));
        }
        let header = array.get(base);
        let layers = (header >> 32) as usize;
        let n_entries = (header & 0xFFFF_FFFF) as usize;
        let data_offset = array.get(base + 1) as usize;

        if ctx.layers_for(n_entries) != Some(layers) {
            return Err(SileneError::index(format!(
                "tree header at word {base} does not match its geometry"
            )));
        }
        if data_offset != base + 2 + ctx.index_words(n_entries, layers) {
            return Err(SileneError::index(format!(
                "tree data offset at word {base} does not match its geometry"
            )));
        }
        if data_offset + n_entries * ctx.entry_size > array.len() {
            return Err(SileneError::index(format!("tree data at word {base} out of bounds")));
        }

        Ok(BTreeReader { ctx, array, n_entries, layers, index_base: base + 2, data_offset })
    }

    pub fn num_entries(&self) -> usize {
        self.n_entries
    }

    /// Word offset of the data region and its entry count.
    pub fn data_range(&self) -> (usize, usize) {
        (self.data_offset, self.n_entries)
    }

    /// Locate `key`, returning the absolute word offset of its entry.
    ///
    /// Descent picks, per layer, the first key not below the target;
    /// an index past the layer's real keys means the target exceeds
    /// every key in the tree, since padding words are `u64::MAX`.
    pub fn find_entry(&self, key: u64) -> Option<usize> {
        let kpb = self.ctx.keys_per_block();
        let layout = self.ctx.layer_layout(self.n_entries, self.layers);

        let mut block = 0usize;
        let mut layer_base = self.index_base;
        for &(real_keys, words) in &layout {
            let block_base = block * kpb;
            let slot = block_base + first_not_below(self.array, layer_base + block_base, kpb, key);
            if slot >= real_keys {
                return None;
            }
            block = slot;
            layer_base += words;
        }

        let entries_start = block * self.ctx.entries_per_data_block();
        let count = self.ctx.entries_per_data_block().min(self.n_entries - entries_start);
        let base = self.data_offset + entries_start * self.ctx.entry_size;
        match self.array.binary_search_strided(key, base, count, self.ctx.entry_size) {
            Ok(i) => Some(base + i * self.ctx.entry_size),
            Err(_) => None,
        }
    }

    /// The value word of `key`'s entry, if present.
    pub fn find_value(&self, key: u64) -> Option<u64> {
        debug_assert!(self.ctx.entry_size >= 2);
        self.find_entry(key).map(|offset| self.array.get(offset + 1))
    }
}

/// First slot in the `kpb`-word block at `at` whose key is not below
/// `target`; `kpb` when every key is.
fn first_not_below(array: &LongArrayReader, at: usize, kpb: usize, target: u64) -> usize {
    let mut lo = 0usize;
    let mut hi = kpb;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if array.get(at + mid) < target {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}
