use crate::EncodingError;
use bit_twiddling_helpers::words;
use std::fmt::{Debug, Formatter};
use zerocopy::{FromBytes, IntoBytes, LE, U32};

/// The logical view of a direction-aware property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub const BOTH: [Direction; 2] = [Direction::Forward, Direction::Backward];

    /// Maps the common `reverse` boolean onto a direction.
    #[inline]
    pub const fn from_reverse(reverse: bool) -> Self {
        if reverse {
            Direction::Backward
        } else {
            Direction::Forward
        }
    }

    #[inline]
    pub const fn reversed(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

/// A fixed-length array of little-endian words holding packed properties.
///
/// Records are created zeroed by a [`PropertyRegistry`](crate::PropertyRegistry)
/// and are only mutated through its property handles.
/// The byte representation (see [`EdgeRecord::as_bytes`]) is what graph storage persists.
#[derive(Clone, PartialEq, Eq)]
pub struct EdgeRecord {
    words: Box<[U32<LE>]>,
}

/// Relation flags use the same packing discipline, keyed by relation instead of edge.
pub type RelationFlags = EdgeRecord;

/// Turn records use the same packing discipline, keyed by (via node, from edge, to edge).
pub type TurnRecord = EdgeRecord;

impl EdgeRecord {
    /// Creates an all-zero record of the given length.
    pub fn zeroed(size_words: usize) -> Self {
        Self {
            words: vec![U32::new(0); size_words].into_boxed_slice(),
        }
    }

    /// Reconstructs a record from its persisted bytes.
    ///
    /// # Errors
    ///
    /// Fails if `bytes` is not exactly `size_words` words long.
    pub fn from_bytes(bytes: &[u8], size_words: usize) -> Result<Self, EncodingError> {
        let expected = size_words * size_of::<U32<LE>>();
        if bytes.len() != expected {
            return Err(EncodingError::RecordLength {
                expected,
                actual: bytes.len(),
            });
        }
        let words = <[U32<LE>]>::ref_from_bytes(bytes).map_err(|_| EncodingError::RecordLength {
            expected,
            actual: bytes.len(),
        })?;
        Ok(Self {
            words: words.into(),
        })
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.words.as_bytes()
    }

    #[inline]
    pub fn words(&self) -> &[U32<LE>] {
        &self.words
    }

    #[inline]
    pub fn len_words(&self) -> usize {
        self.words.len()
    }

    /// Resets every bit to zero.
    pub fn clear(&mut self) {
        self.words.fill(U32::new(0));
    }

    #[inline]
    pub(crate) fn read(&self, offset: u32, width: u32) -> u32 {
        words::read(&self.words, offset, width)
    }

    #[inline]
    pub(crate) fn write(&mut self, offset: u32, width: u32, value: u32) {
        words::write(&mut self.words, offset, width, value);
    }
}

impl Debug for EdgeRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.words.iter().map(|w| format!("{:#010x}", w.get())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{Direction, EdgeRecord};
    use crate::EncodingError;

    #[test]
    fn bytes_roundtrip() {
        let mut record = EdgeRecord::zeroed(2);
        record.write(30, 4, 0b1011);
        let copy = EdgeRecord::from_bytes(record.as_bytes(), 2).expect("valid length");
        assert_eq!(copy, record);
        assert_eq!(copy.read(30, 4), 0b1011);
    }

    #[test]
    fn rejects_wrong_length() {
        assert_eq!(
            EdgeRecord::from_bytes(&[0u8; 7], 2),
            Err(EncodingError::RecordLength {
                expected: 8,
                actual: 7
            })
        );
    }

    #[test]
    fn directions() {
        assert_eq!(Direction::from_reverse(true), Direction::Backward);
        assert_eq!(Direction::Forward.reversed(), Direction::Backward);
    }
}
