//! Chunking, embedding, vector storage, and retrieval.

pub mod chunker;
pub mod embeddings;
pub mod ids;
pub mod indexer;
pub mod retrieval;
pub mod store;

pub use chunker::{ByteCodec, TokenChunker, TokenCodec, default_codec};
pub use embeddings::{EmbeddingProvider, HttpEmbeddingProvider, MockEmbeddingProvider};
pub use ids::chunk_id;
pub use indexer::Indexer;
pub use retrieval::{RetrievalHit, Retriever};
pub use store::{ChunkRecord, SearchHit, SqliteIndexStore};

#[cfg(feature = "tokenizer-tiktoken")]
pub use chunker::TiktokenCodec;
