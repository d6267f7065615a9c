pub mod shell;
pub mod stars;
pub mod summary;
