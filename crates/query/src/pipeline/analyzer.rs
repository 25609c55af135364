use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use llm::ChatClient;

use super::GraphSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Methodological,
    Conceptual,
    Empirical,
    Application,
    Literature,
    #[serde(rename = "meta-research")]
    MetaResearch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraversalStrategy {
    #[serde(default)]
    pub relationship_types: Vec<String>,
    #[serde(deserialize_with = "hops_from_number_or_string")]
    pub max_hops: u8,
    #[serde(default, deserialize_with = "bool_from_bool_or_string")]
    pub include_limitations: bool,
}

/// Structured analysis of one user query, as returned by the model and
/// validated before anything downstream sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryAnalysis {
    pub intent: Intent,
    #[serde(default)]
    pub key_entities: Vec<String>,
    #[serde(default)]
    pub starting_node_types: Vec<String>,
    pub traversal_strategy: TraversalStrategy,
    pub complexity: Complexity,
}

// Models emit max_hops as either 2 or "2"
fn hops_from_number_or_string<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u8),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid max_hops: {s}"))),
    }
}

fn bool_from_bool_or_string<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        String(String),
    }

    match BoolOrString::deserialize(deserializer)? {
        BoolOrString::Bool(b) => Ok(b),
        BoolOrString::String(s) => match s.trim().to_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "invalid include_limitations: {other}"
            ))),
        },
    }
}

impl QueryAnalysis {
    /// Enforce the schema contract: hop bounds, and only node labels and
    /// relationship types the graph actually has.
    pub fn validate_against(mut self, schema: &GraphSchema) -> Result<Self> {
        if !(1..=3).contains(&self.traversal_strategy.max_hops) {
            anyhow::bail!(
                "max_hops out of range: {}",
                self.traversal_strategy.max_hops
            );
        }

        self.starting_node_types
            .retain(|label| schema.node_labels.contains(label));
        self.traversal_strategy
            .relationship_types
            .retain(|t| schema.relationship_types.contains(t));

        Ok(self)
    }
}

/// Stage 1: user query + graph schema → structured analysis.
pub struct QueryAnalyzer {
    llm: ChatClient,
    schema: GraphSchema,
}

impl QueryAnalyzer {
    pub fn new(llm: ChatClient, schema: GraphSchema) -> Self {
        Self { llm, schema }
    }

    /// A malformed or invalid analysis is rejected and regenerated once
    /// before the stage fails; bad data never flows downstream.
    pub async fn analyze(&self, user_query: &str) -> Result<QueryAnalysis> {
        let system = self.analysis_prompt();

        for attempt in 0..2 {
            let json = self
                .llm
                .generate_json_with_retry(&system, user_query, 2)
                .await
                .context("Query analysis generation failed")?;

            match serde_json::from_str::<QueryAnalysis>(&json)
                .map_err(anyhow::Error::from)
                .and_then(|a| a.validate_against(&self.schema))
            {
                Ok(analysis) => return Ok(analysis),
                Err(e) if attempt == 0 => {
                    warn!(error = %e, "Rejecting malformed query analysis, retrying");
                }
                Err(e) => return Err(e.context("Query analysis failed validation twice")),
            }
        }
        unreachable!()
    }

    fn analysis_prompt(&self) -> String {
        format!(
            r#"You are analyzing a user query for a hydrology research knowledge graph. Determine the optimal traversal strategy to retrieve relevant information.

GRAPH SCHEMA:
Node labels: {}
Relationship types: {}

Classify the query intent as one of: methodological, conceptual, empirical, application, literature, meta-research.
Identify key entities (hydrological processes, methods, locations, metrics).
Pick starting node types and relationship types from the schema only.
Choose max_hops between 1 and 3, and whether limitation nodes should be included.
Rate the complexity as simple, moderate or complex.

Output ONLY a JSON object with this exact shape:
{{
  "intent": "conceptual",
  "key_entities": ["runoff"],
  "starting_node_types": ["Hydrological_Process_Runoff"],
  "traversal_strategy": {{
    "relationship_types": ["causes"],
    "max_hops": 2,
    "include_limitations": false
  }},
  "complexity": "moderate"
}}"#,
            self.schema.node_labels.join(", "),
            self.schema.relationship_types.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> GraphSchema {
        GraphSchema {
            node_labels: vec![
                "Hydrological_Process_Runoff".to_string(),
                "Models_Methods_Calibration".to_string(),
            ],
            relationship_types: vec!["causes".to_string(), "validates".to_string()],
            node_properties: vec![],
            relationship_properties: vec![],
        }
    }

    #[test]
    fn parses_stringly_typed_fields() {
        let raw = r#"{
            "intent": "empirical",
            "key_entities": ["runoff"],
            "starting_node_types": ["Hydrological_Process_Runoff"],
            "traversal_strategy": {
                "relationship_types": ["causes"],
                "max_hops": "2",
                "include_limitations": "true"
            },
            "complexity": "moderate"
        }"#;
        let analysis: QueryAnalysis = serde_json::from_str(raw).unwrap();
        assert_eq!(analysis.traversal_strategy.max_hops, 2);
        assert!(analysis.traversal_strategy.include_limitations);
        assert_eq!(analysis.intent, Intent::Empirical);
    }

    #[test]
    fn rejects_out_of_range_hops() {
        let raw = r#"{
            "intent": "conceptual",
            "key_entities": [],
            "starting_node_types": [],
            "traversal_strategy": {"relationship_types": [], "max_hops": 5, "include_limitations": false},
            "complexity": "simple"
        }"#;
        let analysis: QueryAnalysis = serde_json::from_str(raw).unwrap();
        assert!(analysis.validate_against(&schema()).is_err());
    }

    #[test]
    fn unknown_labels_and_types_are_dropped() {
        let raw = r#"{
            "intent": "meta-research",
            "key_entities": ["runoff"],
            "starting_node_types": ["Hydrological_Process_Runoff", "Invented_Label"],
            "traversal_strategy": {
                "relationship_types": ["causes", "invented_rel"],
                "max_hops": 1,
                "include_limitations": false
            },
            "complexity": "complex"
        }"#;
        let analysis: QueryAnalysis = serde_json::from_str(raw).unwrap();
        let validated = analysis.validate_against(&schema()).unwrap();
        assert_eq!(
            validated.starting_node_types,
            vec!["Hydrological_Process_Runoff"]
        );
        assert_eq!(validated.traversal_strategy.relationship_types, vec!["causes"]);
        assert_eq!(validated.intent, Intent::MetaResearch);
    }
}
