pub mod embeddings;
pub mod store;

pub use embeddings::EmbeddingClient;
pub use store::{Chunk, ScoredChunk, VectorStore};
