use serde::{Deserialize, Serialize};

/// One atomic fact pulled from a paper by the ontology extraction step.
/// Immutable once created; owned by its parent paper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extraction {
    pub extraction_id: String,
    pub first_level_class: String,
    pub second_level_class: String,
    pub extracted_content: String,
    pub supporting_evidence: String,
    pub confidence_score: f64,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub context: Option<ExtractionContext>,
}

/// Positional context within the source paper. All fields optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionContext {
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub subsection: Option<String>,
    #[serde(default)]
    pub paragraph_position: Option<i64>,
    #[serde(default)]
    pub page_number: Option<i64>,
}

/// A directed, typed edge between two extractions. Both endpoints must
/// already exist as extraction nodes before this edge can be written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub relationship_id: String,
    pub source_extraction_id: String,
    pub target_extraction_id: String,
    pub relationship_type: String,
    pub relationship_description: String,
    pub confidence_score: f64,
    pub supporting_evidence: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperSummary {
    pub main_theme: String,
    #[serde(default)]
    pub study_location: String,
    #[serde(default)]
    pub study_period: String,
    #[serde(default)]
    pub primary_methods: Vec<String>,
    #[serde(default)]
    pub key_contributions: Vec<String>,
}

/// One source document with its summary fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paper {
    pub paper_id: String,
    pub main_theme: String,
    pub study_location: String,
    pub study_period: String,
    pub primary_methods: Vec<String>,
    pub key_contributions: Vec<String>,
}

impl Paper {
    pub fn from_summary(paper_id: &str, summary: &PaperSummary) -> Self {
        Self {
            paper_id: paper_id.to_string(),
            main_theme: summary.main_theme.clone(),
            study_location: summary.study_location.clone(),
            study_period: summary.study_period.clone(),
            primary_methods: summary.primary_methods.clone(),
            key_contributions: summary.key_contributions.clone(),
        }
    }
}

/// The extracted ontology for one paper, as produced by the LLM
/// extraction step and written to disk as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OntologyFile {
    pub paper_id: String,
    pub paper_summary: PaperSummary,
    #[serde(default)]
    pub extractions: Vec<Extraction>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl OntologyFile {
    pub fn paper(&self) -> Paper {
        Paper::from_summary(&self.paper_id, &self.paper_summary)
    }

    pub fn extraction_ids(&self) -> Vec<String> {
        self.extractions
            .iter()
            .map(|e| e.extraction_id.clone())
            .collect()
    }
}
