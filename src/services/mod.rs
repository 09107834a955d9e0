pub mod curate;
pub mod retrieve;
