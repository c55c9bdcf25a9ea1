//! Vector search and question answering

mod index;
mod query;
pub mod similarity;

pub use index::{IndexEntry, SearchHit, SearchMode, VectorIndex};
pub use query::QueryPipeline;
