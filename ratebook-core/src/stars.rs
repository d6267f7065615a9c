use serde::Serialize;
use std::fmt::Display;

use crate::common::MAX_SCORE;

pub const FULL_STAR: char = '★';
pub const HALF_STAR: char = '⯪';
pub const EMPTY_STAR: char = '☆';

/// How many full, half and empty stars make up a five star display.
///
/// `full + half + empty` is always 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StarBreakdown {
    pub full: u8,
    pub half: u8,
    pub empty: u8,
}

/// Split a rating into stars.
///
/// Any fractional part shows as one half star, so 4.7 renders like 4.5.
/// Inputs are clamped into 0..=5 first; NaN is treated as 0.
pub fn decompose(rating: f64) -> StarBreakdown {
    let rating = if rating.is_nan() {
        0.0
    } else {
        rating.clamp(0.0, MAX_SCORE)
    };

    let full = rating.floor() as u8;
    let half = u8::from(rating.fract() != 0.0);

    StarBreakdown {
        full,
        half,
        empty: MAX_SCORE as u8 - full - half,
    }
}

impl StarBreakdown {
    pub fn render(&self) -> String {
        self.render_with(FULL_STAR, HALF_STAR, EMPTY_STAR)
    }

    pub fn render_with(&self, full: char, half: char, empty: char) -> String {
        std::iter::repeat(full)
            .take(self.full.into())
            .chain(std::iter::repeat(half).take(self.half.into()))
            .chain(std::iter::repeat(empty).take(self.empty.into()))
            .collect()
    }
}

impl Display for StarBreakdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render())
    }
}
