//! Filter expression parsing and rewriting.

pub mod filter;

pub use filter::{ClauseTarget, parse, upsert_clause};
