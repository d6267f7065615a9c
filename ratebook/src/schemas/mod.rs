pub mod common;
pub mod rating;
pub mod restaurant;
