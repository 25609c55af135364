use anyhow::Result;
use std::path::Path;
use tracing::{info, warn};

use graph::GraphStore;
use ontology::{OntologyFile, extraction_to_text, load_ontology};
use vector::{Chunk, VectorStore};

use crate::chunker::{Chunker, ChunkerConfig};

/// Name of the collection holding formatted extraction texts. Retrieval
/// hits against it are routed through id extraction and graph expansion.
pub const GRAPH_COLLECTION: &str = "Graph";

/// Name of the collection holding paper full-text chunks.
pub const VECTOR_COLLECTION: &str = "Vector";

#[derive(Debug, Default, serde::Serialize)]
pub struct ImportStats {
    pub nodes_written: usize,
    pub nodes_failed: usize,
    pub relationships_written: usize,
    pub relationships_skipped: usize,
    pub paper_linked: bool,
    pub chunks_stored: usize,
}

/// One-shot ETL from an extracted ontology into both stores. Each write
/// is its own transaction; a partially imported paper is a tolerated
/// end state, with every skipped item logged and counted.
pub struct Importer {
    graph: GraphStore,
    vector: VectorStore,
    chunker: Chunker,
}

impl Importer {
    pub fn new(graph: GraphStore, vector: VectorStore) -> Self {
        Self {
            graph,
            vector,
            chunker: Chunker::new(ChunkerConfig::default()),
        }
    }

    pub async fn import_ontology_file(&self, path: &Path) -> Result<ImportStats> {
        let file = load_ontology(path)?;
        Ok(self.import_ontology(&file).await)
    }

    /// Import one paper's ontology: extraction nodes, then
    /// relationships, then the paper link, then the formatted extraction
    /// texts into the Graph collection.
    pub async fn import_ontology(&self, file: &OntologyFile) -> ImportStats {
        let mut stats = ImportStats::default();
        info!(paper = %file.paper_id, "Importing ontology");

        for extraction in &file.extractions {
            if self.graph.upsert_extraction_node(extraction).await {
                stats.nodes_written += 1;
            } else {
                stats.nodes_failed += 1;
            }
        }

        for relationship in &file.relationships {
            if self.graph.upsert_relationship(relationship).await {
                stats.relationships_written += 1;
            } else {
                stats.relationships_skipped += 1;
            }
        }

        let extraction_ids = file.extraction_ids();
        stats.paper_linked = self.graph.link_paper(&file.paper(), &extraction_ids).await;

        if stats.paper_linked {
            self.verify_paper_link(&file.paper_id, extraction_ids.len())
                .await;
        }

        stats.chunks_stored = self.store_extraction_texts(file).await;

        info!(
            paper = %file.paper_id,
            nodes = stats.nodes_written,
            relationships = stats.relationships_written,
            skipped = stats.relationships_skipped,
            chunks = stats.chunks_stored,
            "Ontology import finished"
        );
        stats
    }

    /// Soundness check: the paper's recorded extraction count should
    /// match the number of belongs_to edges into it.
    async fn verify_paper_link(&self, paper_id: &str, expected: usize) {
        match self.graph.belongs_to_count(paper_id).await {
            Ok(actual) if actual == expected => {}
            Ok(actual) => {
                warn!(
                    paper = %paper_id,
                    expected,
                    actual,
                    "Paper extraction count mismatch"
                );
            }
            Err(e) => {
                warn!(paper = %paper_id, error = %e, "Could not verify paper link");
            }
        }
    }

    async fn store_extraction_texts(&self, file: &OntologyFile) -> usize {
        let chunks = extraction_chunks(file);
        if chunks.is_empty() {
            return 0;
        }

        if self.vector.store_chunks(&chunks, GRAPH_COLLECTION).await {
            chunks.len()
        } else {
            0
        }
    }

    /// Chunk a paper's full text into the Vector collection.
    pub async fn import_document(&self, doc_id: &str, text: &str) -> usize {
        let chunks = self.chunker.chunk_text(doc_id, text, doc_id);
        if chunks.is_empty() {
            return 0;
        }

        if self.vector.store_chunks(&chunks, VECTOR_COLLECTION).await {
            chunks.len()
        } else {
            0
        }
    }
}

/// Chunk payloads for a paper's formatted extractions. Ids derive from
/// the paper id and extraction position, so re-importing the same file
/// upserts the same points instead of duplicating them.
fn extraction_chunks(file: &OntologyFile) -> Vec<Chunk> {
    file.extractions
        .iter()
        .enumerate()
        .map(|(idx, extraction)| Chunk {
            chunk_id: format!("{}_{}", file.paper_id, idx),
            text: extraction_to_text(extraction),
            source: file.paper_id.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ontology() -> OntologyFile {
        serde_json::from_str(
            r#"{
                "paper_id": "P001",
                "paper_summary": {"main_theme": "Runoff"},
                "extractions": [
                    {
                        "extraction_id": "P001_EXT_1",
                        "first_level_class": "Hydrological Process",
                        "second_level_class": "Runoff",
                        "extracted_content": "Peak discharge doubled",
                        "supporting_evidence": "Table 3 shows peak discharge doubling",
                        "confidence_score": 8.0,
                        "keywords": ["discharge"]
                    },
                    {
                        "extraction_id": "P001_EXT_2",
                        "first_level_class": "Methodology",
                        "second_level_class": "Calibration",
                        "extracted_content": "NSE above 0.8",
                        "supporting_evidence": "Calibration runs reached NSE above 0.8",
                        "confidence_score": 7.0,
                        "keywords": ["calibration"]
                    }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn chunk_derivation_is_stable_across_runs() {
        let file = ontology();
        let first = extraction_chunks(&file);
        let second = extraction_chunks(&file);

        assert_eq!(first.len(), 2);
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.chunk_id, b.chunk_id);
            assert_eq!(a.text, b.text);
            assert_eq!(a.source, b.source);
        }
    }

    #[test]
    fn chunk_ids_follow_paper_and_position() {
        let chunks = extraction_chunks(&ontology());
        assert_eq!(chunks[0].chunk_id, "P001_0");
        assert_eq!(chunks[1].chunk_id, "P001_1");
        assert_eq!(chunks[0].source, "P001");
        assert!(chunks[0].text.contains("P001_EXT_1"));
    }
}
