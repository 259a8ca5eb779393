//! SQLite-backed vector index using the sqlite-vec extension.

use std::mem::transmute;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::Once;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_rusqlite::{Connection, ffi};

use crate::error::PipelineError;

/// One embedded chunk as stored in the index.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub text: String,
    pub source_name: String,
    pub collector_key: String,
    pub chunk_index: usize,
    pub metadata: Value,
    pub embedding: Vec<f32>,
}

/// A single retrieval result: chunk text plus its merged metadata and the
/// cosine distance to the query (smaller is closer).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchHit {
    pub text: String,
    pub source_name: String,
    pub collector_key: String,
    pub metadata: Value,
    pub distance: f32,
}

/// Async SQLite store with per-run replace semantics.
///
/// Embeddings are persisted as JSON arrays and compared with sqlite-vec's
/// `vec_distance_cosine` at query time.
#[derive(Clone)]
pub struct SqliteIndexStore {
    conn: Connection,
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS research_chunks (
    id TEXT PRIMARY KEY,
    text TEXT NOT NULL,
    source_name TEXT NOT NULL,
    collector_key TEXT NOT NULL,
    chunk_index INTEGER NOT NULL,
    metadata TEXT NOT NULL,
    embedding TEXT NOT NULL
)";

impl SqliteIndexStore {
    /// Open (or create) the store at `path` and ensure the schema exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        register_sqlite_vec()?;
        let conn = Connection::open(path).await?;
        Self::init(conn).await
    }

    /// In-memory store for tests.
    pub async fn open_in_memory() -> Result<Self, PipelineError> {
        register_sqlite_vec()?;
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, PipelineError> {
        conn.call(|conn| {
            conn.query_row("select vec_version()", [], |row| row.get::<_, String>(0))
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
            conn.execute_batch(SCHEMA)
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }

    /// Atomically replace the whole index with `records`.
    ///
    /// The delete and all inserts run in one transaction, so readers never
    /// observe a half-replaced index.
    pub async fn replace_all(&self, records: Vec<ChunkRecord>) -> Result<usize, PipelineError> {
        let inserted = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction().map_err(tokio_rusqlite::Error::Rusqlite)?;
                tx.execute("DELETE FROM research_chunks", [])
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let mut count = 0usize;
                {
                    let mut stmt = tx
                        .prepare(
                            "INSERT INTO research_chunks \
                             (id, text, source_name, collector_key, chunk_index, metadata, embedding) \
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                        )
                        .map_err(tokio_rusqlite::Error::Rusqlite)?;
                    for record in records {
                        let metadata = record.metadata.to_string();
                        let embedding = serde_json::to_string(&record.embedding)
                            .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
                        stmt.execute((
                            record.id,
                            record.text,
                            record.source_name,
                            record.collector_key,
                            record.chunk_index as i64,
                            metadata,
                            embedding,
                        ))
                        .map_err(tokio_rusqlite::Error::Rusqlite)?;
                        count += 1;
                    }
                }
                tx.commit().map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(count)
            })
            .await?;
        Ok(inserted)
    }

    /// Delete every chunk.
    pub async fn clear(&self) -> Result<usize, PipelineError> {
        let deleted = self
            .conn
            .call(|conn| {
                conn.execute("DELETE FROM research_chunks", [])
                    .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await?;
        Ok(deleted)
    }

    pub async fn count(&self) -> Result<usize, PipelineError> {
        let count = self
            .conn
            .call(|conn| {
                let count: i64 = conn
                    .query_row("SELECT COUNT(*) FROM research_chunks", [], |row| row.get(0))
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(count as usize)
            })
            .await?;
        Ok(count)
    }

    /// Cosine-distance search for the `top_k` chunks nearest to
    /// `query_embedding`, ascending by distance.
    pub async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>, PipelineError> {
        let embedding_json = serde_json::to_string(query_embedding)?;
        let hits = self
            .conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT text, source_name, collector_key, metadata, \
                         vec_distance_cosine(vec_f32(embedding), vec_f32(?1)) AS distance \
                         FROM research_chunks \
                         ORDER BY distance ASC \
                         LIMIT {top_k}"
                    ))
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let rows = stmt
                    .query_map([&embedding_json], |row| {
                        let metadata: String = row.get(3)?;
                        Ok(SearchHit {
                            text: row.get(0)?,
                            source_name: row.get(1)?,
                            collector_key: row.get(2)?,
                            metadata: serde_json::from_str(&metadata)
                                .unwrap_or(Value::Null),
                            distance: row.get(4)?,
                        })
                    })
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let mut results = Vec::new();
                for row in rows {
                    results.push(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
                }
                Ok(results)
            })
            .await?;
        Ok(hits)
    }
}

fn register_sqlite_vec() -> Result<(), PipelineError> {
    use std::sync::Mutex;

    static INIT: Once = Once::new();
    static INIT_RESULT: Mutex<Option<Result<(), String>>> = Mutex::new(None);

    INIT.call_once(|| {
        let result = unsafe {
            type SqliteExtensionInit = unsafe extern "C" fn(
                *mut ffi::sqlite3,
                *mut *const c_char,
                *const ffi::sqlite3_api_routines,
            ) -> i32;

            let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
            let init_fn: SqliteExtensionInit =
                transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
            let rc = ffi::sqlite3_auto_extension(Some(init_fn));
            if rc != 0 {
                Err(format!(
                    "failed to register sqlite-vec extension (code {rc})"
                ))
            } else {
                Ok(())
            }
        };
        if let Ok(mut slot) = INIT_RESULT.lock() {
            *slot = Some(result);
        }
    });

    let outcome = INIT_RESULT
        .lock()
        .map_err(|_| PipelineError::IndexUnavailable("extension init mutex poisoned".into()))?
        .clone();
    match outcome {
        Some(Ok(())) => Ok(()),
        Some(Err(message)) => Err(PipelineError::IndexUnavailable(message)),
        None => Err(PipelineError::IndexUnavailable(
            "sqlite-vec registration did not run".into(),
        )),
    }
}
