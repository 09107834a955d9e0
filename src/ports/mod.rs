pub mod catalog;
pub mod fetcher;
pub mod tags;
