//! Storage module for persistent data storage
//!
//! Provides SQLite-based persistence for the vector index.

mod database;

pub use database::{IndexDb, StoredEntry};
