//! Arithmetic behind the rating notebook: validated scores, averaging a
//! restaurant's ratings, and turning a number into a row of stars.
//!
//! Everything here is pure and synchronous; I/O lives in `ratebook`.

pub mod aggregate;
pub mod common;
pub mod stars;

pub use aggregate::{recompute, recompute_values, RatingSummary};
pub use common::{Score, ScoreError};
pub use stars::{decompose, StarBreakdown};
