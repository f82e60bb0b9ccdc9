//! Compact coding of sorted word-position lists.
//!
//! Positions within a document are small, clustered and strictly
//! increasing, so a sequence is stored as a varint count prefix followed
//! by the varint-coded gaps between consecutive values. The count prefix
//! is biased by one so that an empty sequence still occupies one byte
//! and a zero byte never begins a sequence.
//!
//! Position numbering starts at 1: a leading gap of zero cannot be
//! represented, and builders must bias all positions accordingly.
//!
//! Decoding never mutates the backing bytes, so the same buffer can be
//! decoded any number of times, including concurrently.

use crate::error::{Result, SileneError};
use crate::util::varint;

/// An encoded position sequence, backed by its wire bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarintSequence {
    bytes: Vec<u8>,
}

impl VarintSequence {
    /// Encode a strictly increasing sequence of positive positions.
    ///
    /// Returns an error if any value is zero or does not increase over
    /// its predecessor.
    pub fn encode(values: &[u32]) -> Result<VarintSequence> {
        let mut bytes = Vec::with_capacity(1 + values.len());
        varint::encode_u64(&mut bytes, values.len() as u64 + 1);

        let mut prev = 0u32;
        for &value in values {
            if value <= prev {
                return Err(SileneError::invalid_argument(format!(
                    "positions must be strictly increasing and start at 1, got {value} after {prev}"
                )));
            }
            varint::encode_u64(&mut bytes, (value - prev) as u64);
            prev = value;
        }

        Ok(VarintSequence { bytes })
    }

    /// Wrap already-encoded bytes, as read back from a journal record or
    /// span store. The encoding is validated on decode, not here.
    pub fn from_bytes(bytes: Vec<u8>) -> VarintSequence {
        VarintSequence { bytes }
    }

    /// The wire form of this sequence.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of encoded positions, read from the count prefix.
    pub fn size(&self) -> Result<usize> {
        if self.bytes.is_empty() {
            return Ok(0);
        }
        let (count, _) = varint::decode_u64(&self.bytes)?;
        if count == 0 {
            return Err(SileneError::other("zero count prefix in position sequence"));
        }
        Ok(count as usize - 1)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.size(), Ok(0))
    }

    /// Decode into a random-access-testable sequence.
    pub fn decode(&self) -> Result<PositionSequence> {
        VarintSequence::decode_bytes(&self.bytes)
    }

    /// Decode straight from wire bytes without taking ownership of
    /// them, for readers that slice sequences out of a larger mapping.
    pub fn decode_bytes(bytes: &[u8]) -> Result<PositionSequence> {
        if bytes.is_empty() {
            return Ok(PositionSequence::default());
        }

        let (count, mut pos) = varint::decode_u64(bytes)?;
        if count == 0 {
            return Err(SileneError::other("zero count prefix in position sequence"));
        }
        let count = count as usize - 1;
        let mut values = Vec::with_capacity(count);

        let mut prev = 0u64;
        for _ in 0..count {
            let (delta, used) = varint::decode_u64(&bytes[pos..])?;
            if delta == 0 {
                return Err(SileneError::other("zero gap in position sequence"));
            }
            prev += delta;
            if prev > u32::MAX as u64 {
                return Err(SileneError::other("position overflow in sequence"));
            }
            values.push(prev as u32);
            pos += used;
        }

        Ok(PositionSequence { values })
    }
}

/// A decoded, sorted list of word positions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionSequence {
    values: Vec<u32>,
}

impl PositionSequence {
    pub fn new(values: Vec<u32>) -> PositionSequence {
        PositionSequence { values }
    }

    pub fn values(&self) -> &[u32] {
        &self.values
    }

    pub fn size(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Membership test by binary search.
    pub fn contains_position(&self, position: u32) -> bool {
        self.values.binary_search(&position).is_ok()
    }

    /// True if any anchor's +/- `width` window covers an encoded
    /// position.
    pub fn contains_range(&self, anchors: &[u32], width: u32) -> bool {
        anchors.iter().any(|&a| self.window_hit(a, width))
    }

    /// Number of anchors whose +/- `width` window covers at least one
    /// encoded position.
    pub fn count_range_matches(&self, anchors: &[u32], width: u32) -> usize {
        anchors.iter().filter(|&&a| self.window_hit(a, width)).count()
    }

    fn window_hit(&self, anchor: u32, width: u32) -> bool {
        let lo = anchor.saturating_sub(width);
        let hi = anchor.saturating_add(width);
        let idx = self.values.partition_point(|&v| v < lo);
        idx < self.values.len() && self.values[idx] <= hi
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let values = [1u32, 3, 5, 16, 32, 64, 1000, 1001];
        let seq = VarintSequence::encode(&values).unwrap();
        let decoded = seq.decode().unwrap();

        assert_eq!(decoded.values(), &values);
        assert_eq!(decoded.size(), values.len());
        assert_eq!(seq.size().unwrap(), values.len());

        for p in 0..=1100 {
            assert_eq!(decoded.contains_position(p), values.contains(&p), "position {p}");
        }
    }

    #[test]
    fn test_empty_sequence() {
        let seq = VarintSequence::encode(&[]).unwrap();

        assert_eq!(seq.as_bytes(), &[1]);
        assert!(seq.is_empty());
        assert_eq!(seq.decode().unwrap().size(), 0);
    }

    #[test]
    fn test_position_zero_rejected() {
        assert!(VarintSequence::encode(&[0, 1, 2]).is_err());
    }

    #[test]
    fn test_non_increasing_rejected() {
        assert!(VarintSequence::encode(&[1, 1]).is_err());
        assert!(VarintSequence::encode(&[5, 3]).is_err());
    }

    #[test]
    fn test_decode_is_repeatable() {
        let seq = VarintSequence::encode(&[2, 4, 8]).unwrap();

        let first = seq.decode().unwrap();
        let second = seq.decode().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.values(), &[2, 4, 8]);
    }

    #[test]
    fn test_large_gaps() {
        let values = [1u32, 100_000, 10_000_000];
        let seq = VarintSequence::encode(&values).unwrap();
        assert_eq!(seq.decode().unwrap().values(), &values);
    }

    #[test]
    fn test_window_queries() {
        let seq = VarintSequence::encode(&[10, 20, 30]).unwrap();
        let decoded = seq.decode().unwrap();

        assert!(decoded.contains_range(&[8], 2));
        assert!(decoded.contains_range(&[12], 2));
        assert!(!decoded.contains_range(&[13], 2));
        assert_eq!(decoded.count_range_matches(&[8, 13, 19, 33], 2), 2);
    }

    #[test]
    fn test_truncated_bytes_error() {
        let seq = VarintSequence::encode(&[1, 300]).unwrap();
        let mut bytes = seq.as_bytes().to_vec();
        bytes.truncate(bytes.len() - 1);

        assert!(VarintSequence::from_bytes(bytes).decode().is_err());
    }
}
