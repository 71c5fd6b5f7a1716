//! Core types for dirgate

mod entry;
mod search;

pub use entry::*;
pub use search::*;
