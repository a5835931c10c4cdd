use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// A non-empty, inclusive range of block numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockRange {
    start: u64,
    end: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BlockRangeError {
    #[error("invalid block interval range '{0}'")]
    Malformed(String),
    #[error("start block {start} is after end block {end}")]
    Reversed { start: u64, end: u64 },
}

impl BlockRange {
    /// Blocks `start` to `end`, both included. `None` if `start > end`.
    pub const fn new(start: u64, end: u64) -> Option<Self> {
        if start > end {
            return None;
        }
        Some(Self { start, end })
    }

    pub const fn single(block: u64) -> Self {
        Self {
            start: block,
            end: block,
        }
    }

    pub const fn start(&self) -> u64 {
        self.start
    }

    pub const fn end(&self) -> u64 {
        self.end
    }

    /// Number of blocks in the range.
    pub const fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub const fn is_empty(&self) -> bool {
        false
    }

    pub const fn contains(&self, block: u64) -> bool {
        self.start <= block && block <= self.end
    }

    pub fn iter(&self) -> RangeInclusive<u64> {
        self.start..=self.end
    }
}

impl IntoIterator for BlockRange {
    type Item = u64;
    type IntoIter = RangeInclusive<u64>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Parses `"<n>"`, `"<start>..=<end>"` or `"<start>..<end>"`, the latter
/// excluding `end`.
impl FromStr for BlockRange {
    type Err = BlockRangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || BlockRangeError::Malformed(s.to_owned());
        let number = |n: &str| n.trim().parse::<u64>().map_err(|_| malformed());

        if let Some((start, end)) = s.split_once("..=") {
            let (start, end) = (number(start)?, number(end)?);
            return Self::new(start, end).ok_or(BlockRangeError::Reversed { start, end });
        }
        if let Some((start, end)) = s.split_once("..") {
            let (start, end) = (number(start)?, number(end)?);
            if end <= start {
                return Err(malformed());
            }
            return Ok(Self { start, end: end - 1 });
        }
        number(s).map(Self::single)
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}..={}", self.start, self.end)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn can_create_block_range_from_exclusive_range() {
        assert_eq!(
            "0..10".parse::<BlockRange>().unwrap(),
            BlockRange::new(0, 9).unwrap()
        );
    }

    #[test]
    fn can_create_block_range_from_inclusive_range() {
        let range: BlockRange = "10..=20".parse().unwrap();
        assert_eq!((range.start(), range.end(), range.len()), (10, 20, 11));
    }

    #[test]
    fn can_create_single_block_range() {
        let range: BlockRange = "123415131".parse().unwrap();
        assert_eq!(range, BlockRange::single(123415131));
        assert_eq!(range.iter().collect::<Vec<_>>(), vec![123415131]);
    }

    #[test]
    fn proper_errors() {
        assert_eq!(
            "113A".parse::<BlockRange>().unwrap_err().to_string(),
            "invalid block interval range '113A'"
        );
        assert_eq!(
            "111...156".parse::<BlockRange>().unwrap_err().to_string(),
            "invalid block interval range '111...156'"
        );
        assert!(matches!(
            "5..5".parse::<BlockRange>(),
            Err(BlockRangeError::Malformed(_))
        ));
        assert_eq!(
            "7..=3".parse::<BlockRange>(),
            Err(BlockRangeError::Reversed { start: 7, end: 3 })
        );
    }

    #[test]
    fn display_round_trips() {
        for s in ["42", "1..=9"] {
            assert_eq!(s.parse::<BlockRange>().unwrap().to_string(), s);
        }
        assert_eq!(BlockRange::new(0, 9).unwrap(), "0..10".parse().unwrap());
    }
}
