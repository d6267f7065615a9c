//! Field names as they appear on stored documents.

pub const NAME: &str = "name";
pub const AVERAGE_RATING: &str = "averageRating";
pub const RATING_COUNT: &str = "ratingCount";
pub const RATING: &str = "rating";
pub const COMMENT: &str = "comment";

/// Shown in place of a rating's comment when the document has none.
pub const NO_COMMENT: &str = "No comment";
