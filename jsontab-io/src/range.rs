use std::fmt::{Display, Formatter};
use std::ops::Range;

/// A contiguous span of bytes within a source, given as an offset and a length.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FileRange {
    pub offset: u64,
    pub size: u64,
}

impl Display for FileRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.offset, self.end())
    }
}

impl FileRange {
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// Build a range from its begin and (exclusive) end offsets.
    ///
    /// An `end` before `begin` yields an empty range at `begin`.
    pub fn from_bounds(begin: u64, end: u64) -> Self {
        Self {
            offset: begin,
            size: end.saturating_sub(begin),
        }
    }

    pub fn end(&self) -> u64 {
        self.offset + self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn as_range(&self) -> Range<u64> {
        self.offset..self.end()
    }
}

#[cfg(test)]
mod tests {
    use crate::FileRange;

    #[test]
    fn bounds_and_display() {
        let range = FileRange::from_bounds(7, 19);
        assert_eq!(range, FileRange::new(7, 12));
        assert_eq!(range.end(), 19);
        assert_eq!(range.as_range(), 7..19);
        assert_eq!(range.to_string(), "[7, 19)");
        assert!(!range.is_empty());
        assert!(FileRange::new(3, 0).is_empty());
    }

    #[test]
    fn inverted_bounds_are_empty() {
        let range = FileRange::from_bounds(9, 4);
        assert_eq!(range, FileRange::new(9, 0));
        assert!(range.is_empty());
    }
}
