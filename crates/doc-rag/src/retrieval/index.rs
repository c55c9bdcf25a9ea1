//! Persistent in-process vector index
//!
//! Entries live in memory for brute-force cosine search and in SQLite for
//! durability. A batch is committed to SQLite in one transaction before it
//! is published to searchers, so a failed batch is never visible.

use parking_lot::{Mutex, RwLock};
use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use super::similarity::{cosine_with_norms, magnitude, mmr_select, MmrCandidate};
use crate::config::{RetrievalConfig, RetrievalStrategy};
use crate::error::{Error, Result};
use crate::storage::IndexDb;
use crate::types::Chunk;

/// A chunk with its embedding, ready to index
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub vector: Vec<f32>,
    pub chunk: Chunk,
}

impl IndexEntry {
    pub fn new(vector: Vec<f32>, chunk: Chunk) -> Self {
        Self { vector, chunk }
    }
}

/// A retrieved chunk and its cosine similarity to the query
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub similarity: f32,
}

/// How `search_with` picks its results
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchMode {
    /// The k most similar entries
    TopK,
    /// MMR over the `fetch_k` most similar entries
    Mmr { fetch_k: usize, lambda: f32 },
}

impl SearchMode {
    pub fn from_config(config: &RetrievalConfig) -> Self {
        match config.strategy {
            RetrievalStrategy::Similarity => Self::TopK,
            RetrievalStrategy::Mmr => Self::Mmr {
                fetch_k: config.mmr_fetch_k,
                lambda: config.mmr_lambda,
            },
        }
    }
}

struct IndexedEntry {
    seq: i64,
    vector: Vec<f32>,
    norm: f32,
    chunk: Chunk,
}

/// Vector index shared by the ingestion and query pipelines
pub struct VectorIndex {
    dimensions: usize,
    entries: RwLock<Vec<Arc<IndexedEntry>>>,
    /// Serializes `add` so commit order matches publish order
    writer: Mutex<()>,
    db: IndexDb,
}

impl VectorIndex {
    /// Open (or create) the index stored at `path`
    ///
    /// Existing entries are loaded as stored; nothing is re-embedded.
    pub fn open<P: AsRef<Path>>(path: P, dimensions: usize, model: &str) -> Result<Self> {
        let path = path.as_ref();
        let db = IndexDb::new(path)?;
        db.ensure_meta(dimensions, model)?;

        let index = Self::from_db(db, dimensions)?;
        tracing::info!(
            "Vector index opened at {} ({} entries, {} dimensions)",
            path.display(),
            index.len(),
            dimensions
        );
        Ok(index)
    }

    /// Create a non-persistent index
    pub fn in_memory(dimensions: usize) -> Result<Self> {
        Self::from_db(IndexDb::in_memory()?, dimensions)
    }

    fn from_db(db: IndexDb, dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(Error::Config("index dimensions must be positive".into()));
        }

        let mut entries = Vec::new();
        for stored in db.load_entries()? {
            if stored.vector.len() != dimensions {
                return Err(Error::vector_index(format!(
                    "stored vector for chunk {} has {} dimensions, expected {}",
                    stored.chunk.id,
                    stored.vector.len(),
                    dimensions
                )));
            }
            entries.push(Arc::new(IndexedEntry {
                seq: stored.seq,
                norm: magnitude(&stored.vector),
                vector: stored.vector,
                chunk: stored.chunk,
            }));
        }

        Ok(Self {
            dimensions,
            entries: RwLock::new(entries),
            writer: Mutex::new(()),
            db,
        })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Add a batch of entries, all or nothing
    pub fn add(&self, entries: Vec<IndexEntry>) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        for entry in &entries {
            self.check_vector(&entry.vector)?;
            if entry.chunk.content.trim().is_empty() {
                return Err(Error::vector_index(format!(
                    "chunk {} has no content",
                    entry.chunk.id
                )));
            }
        }

        let pairs: Vec<(Vec<f32>, Chunk)> =
            entries.into_iter().map(|e| (e.vector, e.chunk)).collect();

        let _writer = self.writer.lock();
        let seqs = self.db.insert_entries(&pairs)?;

        let indexed: Vec<Arc<IndexedEntry>> = pairs
            .into_iter()
            .zip(seqs)
            .map(|((vector, chunk), seq)| {
                Arc::new(IndexedEntry {
                    seq,
                    norm: magnitude(&vector),
                    vector,
                    chunk,
                })
            })
            .collect();

        let added = indexed.len();
        self.entries.write().extend(indexed);

        tracing::debug!("Indexed {} entries ({} total)", added, self.len());
        Ok(added)
    }

    /// The `k` most similar entries, most similar first
    ///
    /// Equal scores are ordered by insertion. Returns fewer than `k` hits
    /// (possibly none) when the index is smaller than `k`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        self.search_with(query, k, SearchMode::TopK)
    }

    /// MMR selection over the `fetch_k` most similar entries
    ///
    /// The selected hits are returned in the same order `search` uses.
    pub fn search_mmr(
        &self,
        query: &[f32],
        k: usize,
        fetch_k: usize,
        lambda: f32,
    ) -> Result<Vec<SearchHit>> {
        self.search_with(query, k, SearchMode::Mmr { fetch_k, lambda })
    }

    pub fn search_with(&self, query: &[f32], k: usize, mode: SearchMode) -> Result<Vec<SearchHit>> {
        self.check_vector(query)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let entries = self.entries.read();
        let query_norm = magnitude(query);

        let mut ranked: Vec<(f32, &IndexedEntry)> = entries
            .iter()
            .map(|e| (cosine_with_norms(query, &e.vector, query_norm, e.norm), e.as_ref()))
            .collect();
        ranked.sort_by(|a, b| rank_order(a.0, a.1.seq, b.0, b.1.seq));

        let selected: Vec<(f32, &IndexedEntry)> = match mode {
            SearchMode::TopK => {
                ranked.truncate(k);
                ranked
            }
            SearchMode::Mmr { fetch_k, lambda } => {
                ranked.truncate(fetch_k.max(k));
                let candidates: Vec<MmrCandidate<'_>> = ranked
                    .iter()
                    .map(|(score, e)| MmrCandidate {
                        score: *score,
                        vector: &e.vector,
                        norm: e.norm,
                    })
                    .collect();
                let mut picked = mmr_select(&candidates, k, lambda);
                picked.sort_unstable();
                picked.into_iter().map(|i| ranked[i]).collect()
            }
        };

        Ok(selected
            .into_iter()
            .map(|(similarity, e)| SearchHit {
                chunk: e.chunk.clone(),
                similarity,
            })
            .collect())
    }

    /// Add on the blocking pool
    pub async fn add_async(self: &Arc<Self>, entries: Vec<IndexEntry>) -> Result<usize> {
        let index = Arc::clone(self);
        tokio::task::spawn_blocking(move || index.add(entries)).await?
    }

    /// Search on the blocking pool
    pub async fn search_async(
        self: &Arc<Self>,
        query: Vec<f32>,
        k: usize,
        mode: SearchMode,
    ) -> Result<Vec<SearchHit>> {
        let index = Arc::clone(self);
        tokio::task::spawn_blocking(move || index.search_with(&query, k, mode)).await?
    }

    fn check_vector(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(Error::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(Error::vector_index("vector contains non-finite values"));
        }
        Ok(())
    }
}

/// Descending score, then ascending insertion sequence
fn rank_order(score_a: f32, seq_a: i64, score_b: f32, seq_b: i64) -> Ordering {
    score_b.total_cmp(&score_a).then(seq_a.cmp(&seq_b))
}
