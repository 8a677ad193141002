//! Native memory regions owned by scopes

pub mod regions;

pub use regions::{content_hash, mismatch, Region};
