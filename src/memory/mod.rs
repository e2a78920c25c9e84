//! Memory records and the consistency checks run against them.

pub mod detect;
pub mod similarity;
pub mod store;
pub mod types;
