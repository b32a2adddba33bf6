//! Hotstring module for abbreviation matching and expansion
//!
//! Keeps a rolling buffer of typed characters, matches its suffix against
//! an ordered pattern table and types the replacement for the first hit.

mod buffer;
mod engine;
mod table;

pub use buffer::MatchPolicy;
pub use engine::HotstringEngine;
pub use table::{PatternTable, Provider, TableError, DEFAULT_DATE_FORMAT, DEFAULT_TIME_FORMAT};

#[cfg(test)]
pub(crate) use table::Action;
