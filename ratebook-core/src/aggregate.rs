use serde::{Deserialize, Serialize};

use crate::common::Score;

/// The cached `{averageRating, ratingCount}` pair kept on a restaurant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    pub count: u32,
    pub average: f64,
}

impl RatingSummary {
    pub const EMPTY: Self = Self {
        count: 0,
        average: 0.0,
    };

    /// Read a summary back out of cached fields. Anything missing counts as 0.
    pub fn from_cached(average: Option<f64>, count: Option<u64>) -> Self {
        Self {
            count: count.map(|c| c.min(u64::from(u32::MAX)) as u32).unwrap_or(0),
            average: average.filter(|a| a.is_finite()).unwrap_or(0.0),
        }
    }
}

impl Default for RatingSummary {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Count and mean of a set of scores, mean rounded to one decimal.
///
/// Ties round away from zero (4.25 -> 4.3). The mean is worked out on whole
/// half-steps, so the same scores always give the same bits back.
pub fn recompute<I>(scores: I) -> RatingSummary
where
    I: IntoIterator<Item = Score>,
{
    let (count, halves) = scores
        .into_iter()
        .fold((0u64, 0u64), |(count, halves), score| {
            (count + 1, halves + u64::from(score.halves()))
        });

    if count == 0 {
        return RatingSummary::EMPTY;
    }

    /* mean in tenths is 5 * halves / count; add half a count before dividing to round */
    let tenths = (10 * halves + count) / (2 * count);

    RatingSummary {
        count: count.min(u64::from(u32::MAX)) as u32,
        average: tenths as f64 / 10.0,
    }
}

/// Like [`recompute`], for raw numbers that were never validated.
/// Anything that isn't a valid [`Score`] is left out.
pub fn recompute_values(values: &[f64]) -> RatingSummary {
    recompute(values.iter().filter_map(|v| Score::new(*v).ok()))
}
