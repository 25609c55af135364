pub mod ids;
pub mod labels;
pub mod schema;
pub mod text;

pub use ids::{find_extraction_ids, is_extraction_id};
pub use labels::{BELONGS_TO, node_label, relationship_label, sanitize_identifier};
pub use schema::{
    Extraction, ExtractionContext, OntologyFile, Paper, PaperSummary, Relationship,
};
pub use text::{extraction_to_text, ontology_to_texts};

use anyhow::{Context, Result};
use std::path::Path;

/// Load an extracted ontology from a JSON file on disk.
pub fn load_ontology(path: &Path) -> Result<OntologyFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read ontology file: {:?}", path))?;
    let file: OntologyFile = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse ontology file: {:?}", path))?;
    Ok(file)
}
