//! Query evaluation primitives: candidate buffers, postings cursors
//! and composable filter steps.
//!
//! A query fills a [`QueryBuffer`] from the cheapest term's
//! [`EntrySource`], then narrows it by applying [`FilterStep`]s for
//! the remaining terms in increasing cost order, so the most selective
//! work runs over the fewest candidates.

use crate::storage::array::LongArrayReader;

/// Reusable buffer of candidate document ids with an in-place
/// filtering cursor.
///
/// Filling and filtering alternate: a source appends ids with
/// [`push`](QueryBuffer::push), then a step walks the buffer once with
/// `retain_and_advance` / `reject_and_advance` and seals the surviving
/// prefix with `finalize_filtering`.
pub struct QueryBuffer {
    data: Vec<u64>,
    end: usize,
    read: usize,
    write: usize,
}

impl QueryBuffer {
    pub fn new(capacity: usize) -> QueryBuffer {
        QueryBuffer { data: vec![0; capacity], end: 0, read: 0, write: 0 }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn size(&self) -> usize {
        self.end
    }

    pub fn is_empty(&self) -> bool {
        self.end == 0
    }

    /// The ids currently held, in buffer order.
    pub fn as_slice(&self) -> &[u64] {
        &self.data[..self.end]
    }

    /// Drop all contents and reset the cursor.
    pub fn reset(&mut self) {
        self.end = 0;
        self.read = 0;
        self.write = 0;
    }

    /// Append one id; false when the buffer is full.
    pub fn push(&mut self, value: u64) -> bool {
        if self.end == self.data.len() {
            return false;
        }
        self.data[self.end] = value;
        self.end += 1;
        true
    }

    /// True while a filtering pass has ids left to judge.
    pub fn has_unread(&self) -> bool {
        self.read < self.end
    }

    /// The id under the filtering cursor.
    pub fn current(&self) -> u64 {
        assert!(self.read < self.end, "buffer cursor read past the end");
        self.data[self.read]
    }

    /// Keep the current id and move on.
    pub fn retain_and_advance(&mut self) {
        if self.read != self.write {
            self.data[self.write] = self.data[self.read];
        }
        self.write += 1;
        self.read += 1;
    }

    /// Drop the current id and move on.
    pub fn reject_and_advance(&mut self) {
        self.read += 1;
    }

    /// Seal a filtering pass: the retained prefix becomes the buffer
    /// contents and the cursor rewinds.
    pub fn finalize_filtering(&mut self) {
        self.end = self.write;
        self.read = 0;
        self.write = 0;
    }

    /// Collapse runs of equal ids. Sources emit ids in sorted order,
    /// so duplicates are always adjacent.
    pub fn uniq(&mut self) {
        if self.end <= 1 {
            return;
        }
        let mut write = 1;
        for read in 1..self.end {
            if self.data[read] != self.data[write - 1] {
                self.data[write] = self.data[read];
                write += 1;
            }
        }
        self.end = write;
    }
}

/// Cursor over one term's postings, yielding rank-encoded document
/// ids in index order.
pub trait EntrySource {
    /// Skip past the next `n` entries without reading them.
    fn skip(&mut self, n: usize);

    /// Replace `buffer`'s contents with the next batch of ids, at most
    /// one buffer's worth, deduplicated.
    fn read(&mut self, buffer: &mut QueryBuffer);

    fn has_more(&self) -> bool;
}

/// Source for a term with no postings.
pub struct EmptyEntrySource;

impl EntrySource for EmptyEntrySource {
    fn skip(&mut self, _n: usize) {}

    fn read(&mut self, buffer: &mut QueryBuffer) {
        buffer.reset();
    }

    fn has_more(&self) -> bool {
        false
    }
}

/// Source walking the data region of one postings tree.
pub struct TreeEntrySource<'a> {
    array: &'a LongArrayReader,
    data_offset: usize,
    n_entries: usize,
    entry_size: usize,
    at: usize,
}

impl<'a> TreeEntrySource<'a> {
    pub fn new(
        array: &'a LongArrayReader,
        data_offset: usize,
        n_entries: usize,
        entry_size: usize,
    ) -> TreeEntrySource<'a> {
        TreeEntrySource { array, data_offset, n_entries, entry_size, at: 0 }
    }
}

impl EntrySource for TreeEntrySource<'_> {
    fn skip(&mut self, n: usize) {
        self.at = (self.at + n).min(self.n_entries);
    }

    fn read(&mut self, buffer: &mut QueryBuffer) {
        buffer.reset();
        while self.at < self.n_entries {
            let id = self.array.get(self.data_offset + self.at * self.entry_size);
            if !buffer.push(id) {
                break;
            }
            self.at += 1;
        }
        buffer.uniq();
    }

    fn has_more(&self) -> bool {
        self.at < self.n_entries
    }
}

/// One predicate in a query's filter pipeline.
pub trait FilterStep {
    /// Whether `value` survives this step.
    fn test(&self, value: u64) -> bool;

    /// Estimated work per tested id. Steps run cheapest first; the
    /// ordering is a heuristic and never affects the result set.
    fn cost(&self) -> f64;

    /// Run the step over every unread id in `buffer`, keeping the
    /// survivors.
    fn apply(&self, buffer: &mut QueryBuffer) {
        while buffer.has_unread() {
            if self.test(buffer.current()) {
                buffer.retain_and_advance();
            } else {
                buffer.reject_and_advance();
            }
        }
        buffer.finalize_filtering();
    }
}

/// Step that keeps everything.
pub struct LetThrough;

impl FilterStep for LetThrough {
    fn test(&self, _value: u64) -> bool {
        true
    }

    fn cost(&self) -> f64 {
        0.0
    }
}

/// Step that keeps nothing.
pub struct NoPass;

impl FilterStep for NoPass {
    fn test(&self, _value: u64) -> bool {
        false
    }

    fn cost(&self) -> f64 {
        0.0
    }
}

/// Conjunction of steps, applied cheapest first.
pub struct AllOfStep<'a> {
    steps: Vec<Box<dyn FilterStep + Send + Sync + 'a>>,
}

impl<'a> AllOfStep<'a> {
    pub fn new(mut steps: Vec<Box<dyn FilterStep + Send + Sync + 'a>>) -> AllOfStep<'a> {
        steps.sort_by(|a, b| a.cost().total_cmp(&b.cost()));
        AllOfStep { steps }
    }
}

impl FilterStep for AllOfStep<'_> {
    fn test(&self, value: u64) -> bool {
        self.steps.iter().all(|step| step.test(value))
    }

    fn cost(&self) -> f64 {
        self.steps.iter().map(|step| step.cost()).sum()
    }

    fn apply(&self, buffer: &mut QueryBuffer) {
        // One whole pass per step beats one test chain per id: each
        // pass shrinks the buffer before the costlier steps see it.
        for step in &self.steps {
            if buffer.is_empty() {
                return;
            }
            step.apply(buffer);
        }
    }
}

/// Disjunction of steps, tested cheapest first.
pub struct AnyOfStep<'a> {
    steps: Vec<Box<dyn FilterStep + Send + Sync + 'a>>,
}

impl<'a> AnyOfStep<'a> {
    pub fn new(mut steps: Vec<Box<dyn FilterStep + Send + Sync + 'a>>) -> AnyOfStep<'a> {
        steps.sort_by(|a, b| a.cost().total_cmp(&b.cost()));
        AnyOfStep { steps }
    }
}

impl FilterStep for AnyOfStep<'_> {
    fn test(&self, value: u64) -> bool {
        self.steps.iter().any(|step| step.test(value))
    }

    fn cost(&self) -> f64 {
        self.steps.iter().map(|step| step.cost()).sum()
    }
}
