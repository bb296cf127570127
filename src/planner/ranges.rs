use super::RangesError;

const HOUR_MS: i64 = 60 * 60 * 1000;

/// Ascending compaction range lengths in milliseconds.
///
/// The last (largest) range bounds every group produced by upstream grouping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompactionRanges {
    ranges: Vec<i64>,
}

impl CompactionRanges {
    /// Validate and wrap `ranges`.
    pub fn new(ranges: Vec<i64>) -> Result<Self, RangesError> {
        if ranges.is_empty() {
            return Err(RangesError::Empty);
        }
        for (idx, &range) in ranges.iter().enumerate() {
            if range <= 0 {
                return Err(RangesError::NonPositive(range));
            }
            if idx > 0 && range <= ranges[idx - 1] {
                return Err(RangesError::NotAscending {
                    previous: ranges[idx - 1],
                    next: range,
                });
            }
        }
        Ok(Self { ranges })
    }

    /// All configured ranges, ascending.
    pub fn as_slice(&self) -> &[i64] {
        &self.ranges
    }

    /// The largest configured range.
    pub fn largest(&self) -> i64 {
        // Non-empty by construction.
        self.ranges[self.ranges.len() - 1]
    }
}

impl Default for CompactionRanges {
    /// 2h, 12h and 24h.
    fn default() -> Self {
        Self {
            ranges: vec![2 * HOUR_MS, 12 * HOUR_MS, 24 * HOUR_MS],
        }
    }
}

/// Start of the `range`-aligned window containing `t`.
///
/// Rounds down, so negative timestamps align to the window before zero.
/// Windows starting below `i64::MIN` clamp to `i64::MIN`. `range` must be
/// positive.
pub fn align_range_start(t: i64, range: i64) -> i64 {
    t.div_euclid(range).saturating_mul(range)
}
