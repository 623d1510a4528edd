//! Pipeline entry points for fetch operations.
//!
//! - `run_query`: Fetch a page of posts by tags and resolve every field
//! - `run_lookup`: Fetch a single post by content hash

pub mod query;

pub use query::{PostSummary, run_lookup, run_query};
