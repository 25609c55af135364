pub mod analyzer;
pub mod cypher;
pub mod formatter;
pub mod responder;
pub mod retriever;

pub use analyzer::{Complexity, Intent, QueryAnalysis, QueryAnalyzer, TraversalStrategy};
pub use cypher::{CypherGenerator, GeneratedQuery, build_ladder, validate_query};
pub use formatter::{FormatterConfig, format_context};
pub use responder::ResponseGenerator;
pub use retriever::{GraphContext, GraphRetriever, RetrievedNode, RetrievedRelationship};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use graph::GraphStore;
use llm::ChatClient;

/// What the graph actually contains. Generated queries may only name
/// labels and relationship types listed here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSchema {
    pub node_labels: Vec<String>,
    pub relationship_types: Vec<String>,
    #[serde(default)]
    pub node_properties: Vec<String>,
    #[serde(default)]
    pub relationship_properties: Vec<String>,
}

impl GraphSchema {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read graph schema: {:?}", path))?;
        let schema = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse graph schema: {:?}", path))?;
        Ok(schema)
    }
}

/// Everything one pipeline run produced, for callers that want the
/// intermediate stages alongside the answer.
#[derive(Debug, Serialize)]
pub struct PipelineResult {
    pub answer: String,
    pub analysis: QueryAnalysis,
    pub queries: Vec<GeneratedQuery>,
    pub subgraph_summary: String,
    pub formatted_context: String,
}

/// The graph-native retrieval pipeline: analyze → generate Cypher →
/// retrieve → format → respond. Each stage is a pure transformation
/// over the previous stage's output.
pub struct GraphRagPipeline {
    analyzer: QueryAnalyzer,
    generator: CypherGenerator,
    retriever: GraphRetriever,
    formatter_config: FormatterConfig,
    responder: ResponseGenerator,
}

impl GraphRagPipeline {
    pub fn new(store: GraphStore, llm: ChatClient, schema: GraphSchema) -> Self {
        Self {
            analyzer: QueryAnalyzer::new(llm.clone(), schema.clone()),
            generator: CypherGenerator::new(llm.clone(), schema),
            retriever: GraphRetriever::new(store),
            formatter_config: FormatterConfig::default(),
            responder: ResponseGenerator::new(llm),
        }
    }

    pub async fn query(&self, user_query: &str) -> Result<PipelineResult> {
        let analysis = self.analyzer.analyze(user_query).await?;
        info!(?analysis.intent, ?analysis.complexity, "Query analyzed");

        let queries = self.generator.generate(&analysis).await;
        info!(queries = queries.len(), "Cypher queries generated");

        let graph_context = self.retriever.execute(&queries).await;
        info!(summary = %graph_context.summary, "Graph data retrieved");

        let formatted_context = format_context(&graph_context, &self.formatter_config);

        let answer = self
            .responder
            .generate(user_query, &formatted_context)
            .await
            .context("Response generation failed")?;

        Ok(PipelineResult {
            answer,
            analysis,
            queries,
            subgraph_summary: graph_context.summary,
            formatted_context,
        })
    }
}
