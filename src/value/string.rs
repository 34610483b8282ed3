//! Random string generation over a union of character ranges.

use crate::datum::Datum;
use crate::distribution::{Distribution, UniformDistribution};
use crate::error::Error;
use crate::range::Range;

/// Fixed-length string whose characters are drawn uniformly from the union
/// of the configured ranges (both ends inclusive). Defaults to ASCII
/// letters and digits.
pub(crate) struct RandomStringNode {
    length: usize,
    charset: Vec<char>,
    dist: UniformDistribution,
}

impl RandomStringNode {
    pub(crate) fn new(
        length: usize,
        ranges: Option<Vec<Range<char>>>,
        dist: UniformDistribution,
    ) -> Result<Self, Error> {
        if length == 0 {
            return Err(Error::InvalidRange(
                "randomLengthString length must be positive".to_string(),
            ));
        }
        let charset = match ranges {
            Some(ranges) => {
                let mut chars = Vec::new();
                for range in &ranges {
                    chars.extend(range.start()..=range.end());
                }
                chars
            }
            None => ('a'..='z').chain('A'..='Z').chain('0'..='9').collect(),
        };
        if charset.is_empty() {
            return Err(Error::InvalidRange(
                "randomLengthString requires a non-empty character set".to_string(),
            ));
        }
        Ok(Self {
            length,
            charset,
            dist,
        })
    }

    pub(crate) fn eval(&mut self) -> Datum {
        let mut out = String::with_capacity(self.length);
        for _ in 0..self.length {
            out.push(self.charset[self.dist.next_int(self.charset.len())]);
        }
        Datum::Text(out)
    }

    pub(crate) fn rewind(&mut self) {
        self.dist.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_charset_is_alphanumeric() {
        let mut node = RandomStringNode::new(64, None, UniformDistribution::new(42)).unwrap();
        let out = node.eval();
        let text = out.as_text().unwrap();
        assert_eq!(text.len(), 64);
        assert!(text.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_custom_ranges_are_inclusive() {
        let ranges = vec![Range::new('a', 'b').unwrap()];
        let mut node =
            RandomStringNode::new(200, Some(ranges), UniformDistribution::new(42)).unwrap();
        let out = node.eval();
        let text = out.as_text().unwrap().to_string();
        assert!(text.chars().all(|c| c == 'a' || c == 'b'));
        // Both ends of the range show up over a long enough draw.
        assert!(text.contains('a'));
        assert!(text.contains('b'));
    }

    #[test]
    fn test_zero_length_is_rejected() {
        assert!(matches!(
            RandomStringNode::new(0, None, UniformDistribution::new(42)),
            Err(Error::InvalidRange(_))
        ));
    }

    #[test]
    fn test_rewind_replays_sequence() {
        let mut node = RandomStringNode::new(16, None, UniformDistribution::new(7)).unwrap();
        let first = node.eval();
        node.rewind();
        assert_eq!(node.eval(), first);
    }
}
