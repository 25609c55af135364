pub mod chunker;
pub mod importer;

pub use chunker::{Chunker, ChunkerConfig, generate_chunk_id};
pub use importer::{GRAPH_COLLECTION, ImportStats, Importer, VECTOR_COLLECTION};
