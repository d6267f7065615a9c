use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};
use thiserror::Error;

/// Lowest score a rating may carry.
pub const MIN_SCORE: f64 = 1.0;
/// Highest score a rating may carry. Also the size of the star scale.
pub const MAX_SCORE: f64 = 5.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoreError {
    #[error("score is not a number")]
    NotANumber,

    #[error("score {0} is outside of 1..=5")]
    OutOfRange(f64),

    #[error("score {0} is not a multiple of 0.5")]
    NotHalfStep(f64),

    #[error("could not parse score from {0:?}")]
    Unparsable(String),
}

/// A single rating value: one of 1.0, 1.5, ..., 5.0.
///
/// Stored as a count of half stars, so sums and means over many scores are exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Score(u8);

impl Score {
    /// What a fresh rating form starts at.
    pub const DEFAULT: Self = Self(10);

    pub fn new(value: f64) -> Result<Self, ScoreError> {
        if value.is_nan() {
            return Err(ScoreError::NotANumber);
        }
        if !(MIN_SCORE..=MAX_SCORE).contains(&value) {
            return Err(ScoreError::OutOfRange(value));
        }
        let halves = value * 2.0;
        if halves.fract() != 0.0 {
            return Err(ScoreError::NotHalfStep(value));
        }
        Ok(Self(halves as u8))
    }

    pub fn value(self) -> f64 {
        f64::from(self.0) / 2.0
    }

    pub fn halves(self) -> u8 {
        self.0
    }
}

impl Default for Score {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<f64> for Score {
    type Error = ScoreError;
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Score> for f64 {
    fn from(score: Score) -> Self {
        score.value()
    }
}

/// Pull a plain decimal out of user input.
///
/// ## Example
/// ```txt
/// "4.5"   -> 4.5
/// " 4 "   -> 4.0
/// "4.5/5" -> None
/// "4,5"   -> None
/// ```
pub(crate) fn parse_decimal<T: AsRef<str>>(s: T) -> Option<f64> {
    let trimmed = s.as_ref().trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

impl FromStr for Score {
    type Err = ScoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match parse_decimal(s) {
            Some(value) => Self::new(value),
            None => Err(ScoreError::Unparsable(s.to_string())),
        }
    }
}

impl Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1}", self.value())
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_decimal, Score, ScoreError};

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("4.5"), Some(4.5));
        assert_eq!(parse_decimal(" 4 "), Some(4.0));
        assert_eq!(parse_decimal("4.5/5"), None);
        assert_eq!(parse_decimal("4,5"), None);
        assert_eq!(parse_decimal("-1"), None);
        assert_eq!(parse_decimal(""), None);
    }

    #[test]
    fn test_new() {
        assert_eq!(Score::new(1.0).unwrap().halves(), 2);
        assert_eq!(Score::new(4.5).unwrap().value(), 4.5);
        assert_eq!(Score::new(5.0).unwrap(), Score::DEFAULT);

        assert_eq!(Score::new(0.5), Err(ScoreError::OutOfRange(0.5)));
        assert_eq!(Score::new(5.5), Err(ScoreError::OutOfRange(5.5)));
        assert_eq!(Score::new(3.25), Err(ScoreError::NotHalfStep(3.25)));
        assert_eq!(Score::new(f64::NAN), Err(ScoreError::NotANumber));
    }

    #[test]
    fn test_from_str() {
        assert_eq!("3.5".parse::<Score>().unwrap().value(), 3.5);
        assert_eq!("2".parse::<Score>().unwrap().to_string(), "2.0");
        assert!(matches!(
            "three".parse::<Score>(),
            Err(ScoreError::Unparsable(_))
        ));
        assert!(matches!("7".parse::<Score>(), Err(ScoreError::OutOfRange(_))));
    }

    #[test]
    fn test_serde_number() {
        let score = Score::new(4.5).unwrap();
        assert_eq!(serde_json::to_string(&score).unwrap(), "4.5");
        assert_eq!(serde_json::from_str::<Score>("2.0").unwrap().halves(), 4);
        assert!(serde_json::from_str::<Score>("2.2").is_err());
        assert!(serde_json::from_str::<Score>("0").is_err());
    }
}
