//! SQLite database backing the vector index
//!
//! Each row holds one chunk and its embedding. The `index_meta` table pins
//! the embedding model and dimension the store was created with.

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{Chunk, ChunkSource, FileType};

/// A chunk and its vector as persisted
#[derive(Debug, Clone)]
pub struct StoredEntry {
    /// Insertion sequence, increasing across batches
    pub seq: i64,
    pub vector: Vec<f32>,
    pub chunk: Chunk,
}

/// SQLite-based index store
pub struct IndexDb {
    conn: Arc<Mutex<Connection>>,
}

impl IndexDb {
    /// Create or open the database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| Error::vector_index(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate(true)?;
        Ok(db)
    }

    /// Create an in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            Error::vector_index(format!("Failed to open in-memory database: {}", e))
        })?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate(false)?;
        Ok(db)
    }

    /// Run database migrations
    fn migrate(&self, on_disk: bool) -> Result<()> {
        let conn = self.conn.lock();

        if on_disk {
            conn.execute_batch(
                r#"
                PRAGMA journal_mode=WAL;
                PRAGMA synchronous=NORMAL;
                "#,
            )
            .map_err(|e| Error::vector_index(format!("Failed to set pragmas: {}", e)))?;
        }

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS index_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS index_entries (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                chunk_id TEXT NOT NULL UNIQUE,
                content TEXT NOT NULL,
                file_name TEXT NOT NULL,
                file_type TEXT NOT NULL,
                page_number INTEGER NOT NULL,
                total_pages INTEGER NOT NULL,
                chunk_index INTEGER NOT NULL,
                char_start INTEGER NOT NULL,
                char_end INTEGER NOT NULL,
                vector BLOB NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_index_entries_file_name ON index_entries(file_name);
            "#,
        )
        .map_err(|e| Error::vector_index(format!("Failed to create tables: {}", e)))?;

        Ok(())
    }

    /// Record the model and dimension on first use, and reject a mismatch afterwards
    pub fn ensure_meta(&self, dimensions: usize, model: &str) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let stored_dims: Option<String> = tx
            .query_row(
                "SELECT value FROM index_meta WHERE key = 'dimensions'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        let stored_model: Option<String> = tx
            .query_row(
                "SELECT value FROM index_meta WHERE key = 'embedding_model'",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match (stored_dims, stored_model) {
            (Some(dims), Some(stored)) => {
                let dims: usize = dims
                    .parse()
                    .map_err(|_| Error::vector_index(format!("Corrupt dimension value '{}'", dims)))?;
                if dims != dimensions {
                    return Err(Error::DimensionMismatch {
                        expected: dims,
                        actual: dimensions,
                    });
                }
                if stored != model {
                    return Err(Error::Config(format!(
                        "Index was built with embedding model '{}' but '{}' is configured",
                        stored, model
                    )));
                }
            }
            _ => {
                tx.execute(
                    "INSERT OR REPLACE INTO index_meta (key, value) VALUES ('dimensions', ?1)",
                    params![dimensions.to_string()],
                )?;
                tx.execute(
                    "INSERT OR REPLACE INTO index_meta (key, value) VALUES ('embedding_model', ?1)",
                    params![model],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Insert a batch in one transaction, returning the assigned sequence numbers
    ///
    /// Nothing is written if any row fails.
    pub fn insert_entries(&self, entries: &[(Vec<f32>, Chunk)]) -> Result<Vec<i64>> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::vector_index(format!("Failed to begin transaction: {}", e)))?;

        let mut seqs = Vec::with_capacity(entries.len());
        {
            let mut stmt = tx
                .prepare(
                    r#"
                    INSERT INTO index_entries (
                        chunk_id, content, file_name, file_type, page_number, total_pages,
                        chunk_index, char_start, char_end, vector, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                    "#,
                )
                .map_err(|e| Error::vector_index(format!("Failed to prepare statement: {}", e)))?;

            let now = Utc::now().to_rfc3339();
            for (vector, chunk) in entries {
                stmt.execute(params![
                    chunk.id.to_string(),
                    chunk.content,
                    chunk.source.filename,
                    chunk.source.file_type.extension(),
                    chunk.source.page_number,
                    chunk.source.total_pages,
                    chunk.chunk_index,
                    chunk.char_start as i64,
                    chunk.char_end as i64,
                    encode_vector(vector),
                    &now,
                ])
                .map_err(|e| Error::vector_index(format!("Failed to insert chunk {}: {}", chunk.id, e)))?;
                seqs.push(tx.last_insert_rowid());
            }
        }

        tx.commit()
            .map_err(|e| Error::vector_index(format!("Failed to commit transaction: {}", e)))?;

        Ok(seqs)
    }

    /// Load every entry in insertion order
    pub fn load_entries(&self) -> Result<Vec<StoredEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT seq, chunk_id, content, file_name, file_type, page_number, total_pages,
                   chunk_index, char_start, char_end, vector
            FROM index_entries
            ORDER BY seq ASC
            "#,
        )?;

        let rows = stmt.query_map([], row_to_entry)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// Number of stored entries
    pub fn count(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM index_entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<StoredEntry> {
    let chunk_id: String = row.get(1)?;
    let file_type: String = row.get(4)?;
    let vector: Vec<u8> = row.get(10)?;

    let id = Uuid::parse_str(&chunk_id).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let file_type = FileType::from_extension(&file_type).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown file type '{}'", file_type).into(),
        )
    })?;
    let vector = decode_vector(&vector).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            10,
            rusqlite::types::Type::Blob,
            "vector blob length is not a multiple of 4".into(),
        )
    })?;

    Ok(StoredEntry {
        seq: row.get(0)?,
        vector,
        chunk: Chunk {
            id,
            content: row.get(2)?,
            source: ChunkSource {
                filename: row.get(3)?,
                file_type,
                page_number: row.get(5)?,
                total_pages: row.get(6)?,
            },
            chunk_index: row.get(7)?,
            char_start: row.get::<_, i64>(8)? as usize,
            char_end: row.get::<_, i64>(9)? as usize,
        },
    })
}

/// Little-endian f32 encoding
fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
    )
}
