//! Embedding client used by both pipelines

mod client;

pub use client::{EmbeddingClient, RetryPolicy};
