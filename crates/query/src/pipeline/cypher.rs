use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::{info, warn};

use llm::ChatClient;

use super::GraphSchema;
use super::analyzer::{Complexity, QueryAnalysis};

/// One generated Cypher query with a human-readable purpose tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedQuery {
    pub query: String,
    pub purpose: String,
}

/// Stage 2: analysis + schema → one to three Cypher queries. The model
/// drafts them under the strategy ladder; anything referencing labels or
/// relationship types outside the schema is dropped, and a deterministic
/// builder takes over when nothing usable survives.
pub struct CypherGenerator {
    llm: ChatClient,
    schema: GraphSchema,
}

impl CypherGenerator {
    pub fn new(llm: ChatClient, schema: GraphSchema) -> Self {
        Self { llm, schema }
    }

    pub async fn generate(&self, analysis: &QueryAnalysis) -> Vec<GeneratedQuery> {
        let drafted = match self.draft_with_model(analysis).await {
            Ok(queries) => queries,
            Err(e) => {
                warn!(error = %e, "Cypher drafting failed, falling back to ladder");
                Vec::new()
            }
        };

        let valid: Vec<GeneratedQuery> = drafted
            .into_iter()
            .filter(|q| {
                let ok = validate_query(&q.query, &self.schema);
                if !ok {
                    warn!(purpose = %q.purpose, "Dropping query with out-of-schema names");
                }
                ok
            })
            .take(3)
            .collect();

        if valid.is_empty() {
            let ladder = build_ladder(analysis, &self.schema);
            info!(queries = ladder.len(), "Using deterministic query ladder");
            ladder
        } else {
            valid
        }
    }

    async fn draft_with_model(
        &self,
        analysis: &QueryAnalysis,
    ) -> anyhow::Result<Vec<GeneratedQuery>> {
        let system = self.generation_prompt(analysis);
        let json = self
            .llm
            .generate_json_with_retry(&system, "Generate the Cypher queries.", 2)
            .await?;
        let queries: Vec<GeneratedQuery> = serde_json::from_str(&json)?;
        Ok(queries)
    }

    fn generation_prompt(&self, analysis: &QueryAnalysis) -> String {
        format!(
            r#"You generate Neo4j Cypher queries for a hydrology research knowledge graph.

GRAPH SCHEMA:
Node labels: {labels}
Relationship types: {rels}
Node properties: id, content, evidence, confidence_score, keywords
Relationship properties: id, type, description, confidence_score, evidence

QUERY ANALYSIS:
{analysis}

STRATEGY LADDER (follow it exactly):
- simple complexity: one direct MATCH on the starting node labels with keyword filtering
- moderate complexity: the direct match plus one bounded variable-length traversal (*1..max_hops)
- complex complexity: both of the above plus one query with chained MATCH clauses

RULES:
- Use ONLY the node labels and relationship types listed in the schema
- Filter with: WHERE toLower(node.content) CONTAINS toLower('keyword')
- Return whole entities, never bare properties. Alias nodes as node, related or mid, and relationships as rel, rel1 or rel2
- For variable-length paths bind the path and return relationships(path)[0] AS rel
- Order by node.confidence_score DESC and LIMIT between 20 and 50

Output ONLY a JSON array of objects with "query" and "purpose" fields."#,
            labels = self.schema.node_labels.join(", "),
            rels = self.schema.relationship_types.join(", "),
            analysis = serde_json::to_string_pretty(analysis).unwrap_or_default(),
        )
    }
}

fn rel_type_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[[^\]:]*:\s*([A-Za-z_0-9|]+)").unwrap())
}

fn node_label_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\([^\s\(\)\[\]:]*:\s*([A-Za-z_0-9]+)").unwrap())
}

/// A query passes only if every relationship type and node label it
/// names exists in the schema (plus the built-in Paper/belongs_to pair).
pub fn validate_query(query: &str, schema: &GraphSchema) -> bool {
    for capture in rel_type_regex().captures_iter(query) {
        for rel_type in capture[1].split('|') {
            if rel_type != "belongs_to" && !schema.relationship_types.iter().any(|t| t == rel_type)
            {
                return false;
            }
        }
    }

    for capture in node_label_regex().captures_iter(query) {
        let label = &capture[1];
        if label != "Paper" && !schema.node_labels.iter().any(|l| l == label) {
            return false;
        }
    }

    true
}

fn escape_keyword(keyword: &str) -> String {
    keyword.replace('\'', "\\'")
}

fn keyword_filter(var: &str, keywords: &[String]) -> String {
    if keywords.is_empty() {
        return format!("{var}.confidence_score IS NOT NULL");
    }
    // keywords is a list property; toLower() on it is a Cypher type error
    keywords
        .iter()
        .map(|k| {
            format!(
                "toLower({var}.content) CONTAINS toLower('{kw}') OR ANY(kw IN {var}.keywords WHERE toLower(kw) CONTAINS toLower('{kw}'))",
                kw = escape_keyword(k)
            )
        })
        .collect::<Vec<_>>()
        .join(" OR ")
}

/// Deterministic strategy ladder: direct match, bounded variable-length
/// traversal, chained matches. Used whenever the model yields nothing
/// that survives validation.
pub fn build_ladder(analysis: &QueryAnalysis, schema: &GraphSchema) -> Vec<GeneratedQuery> {
    let label = analysis
        .starting_node_types
        .first()
        .or_else(|| schema.node_labels.first());
    let node_match = match label {
        Some(label) => format!("(node:{label})"),
        None => "(node)".to_string(),
    };
    let filter = keyword_filter("node", &analysis.key_entities);

    let rel_types = &analysis.traversal_strategy.relationship_types;
    let rel_spec = if rel_types.is_empty() {
        String::new()
    } else {
        format!(":{}", rel_types.join("|"))
    };
    let hops = analysis.traversal_strategy.max_hops;

    let limitations_clause = if analysis.traversal_strategy.include_limitations {
        schema
            .node_labels
            .iter()
            .find(|l| l.contains("Uncertainty") || l.contains("Limitation"))
            .map(|l| format!("\nOPTIONAL MATCH (node)--(limitations:{l})"))
            .unwrap_or_default()
    } else {
        String::new()
    };
    let limitations_return = if limitations_clause.is_empty() {
        ""
    } else {
        ", limitations"
    };

    let mut queries = vec![GeneratedQuery {
        query: format!(
            "MATCH {node_match}\nWHERE {filter}{limitations_clause}\nRETURN node{limitations_return}\nORDER BY node.confidence_score DESC\nLIMIT 20"
        ),
        purpose: "direct match".to_string(),
    }];

    if matches!(analysis.complexity, Complexity::Moderate | Complexity::Complex) {
        queries.push(GeneratedQuery {
            query: format!(
                "MATCH path = {node_match}-[{rel_spec}*1..{hops}]-(related)\nWHERE {filter}\nWITH node, related, relationships(path)[0] AS rel\nRETURN node, rel, related\nORDER BY node.confidence_score DESC\nLIMIT 30"
            ),
            purpose: "bounded traversal".to_string(),
        });
    }

    if matches!(analysis.complexity, Complexity::Complex) {
        queries.push(GeneratedQuery {
            query: format!(
                "MATCH {node_match}\nWHERE {filter}\nMATCH (node)-[rel1{rel_spec}]-(mid)\nMATCH (mid)-[rel2{rel_spec}]-(related)\nRETURN node, rel1, mid, rel2, related\nORDER BY node.confidence_score DESC\nLIMIT 25"
            ),
            purpose: "chained exploration".to_string(),
        });
    }

    queries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::analyzer::{Intent, TraversalStrategy};

    fn schema() -> GraphSchema {
        GraphSchema {
            node_labels: vec![
                "Hydrological_Process_Runoff".to_string(),
                "Uncertainty_Limitations_Model".to_string(),
            ],
            relationship_types: vec!["causes".to_string(), "validates".to_string()],
            node_properties: vec![],
            relationship_properties: vec![],
        }
    }

    fn analysis(complexity: Complexity) -> QueryAnalysis {
        QueryAnalysis {
            intent: Intent::Conceptual,
            key_entities: vec!["runoff".to_string()],
            starting_node_types: vec!["Hydrological_Process_Runoff".to_string()],
            traversal_strategy: TraversalStrategy {
                relationship_types: vec!["causes".to_string()],
                max_hops: 2,
                include_limitations: false,
            },
            complexity,
        }
    }

    #[test]
    fn accepts_queries_within_schema() {
        let q = "MATCH (node:Hydrological_Process_Runoff)-[rel:causes|validates]-(related) RETURN node, rel, related";
        assert!(validate_query(q, &schema()));
    }

    #[test]
    fn rejects_invented_relationship_types() {
        let q = "MATCH (node:Hydrological_Process_Runoff)-[rel:invented_rel]-(related) RETURN node";
        assert!(!validate_query(q, &schema()));
    }

    #[test]
    fn rejects_invented_node_labels() {
        let q = "MATCH (node:Made_Up_Label) RETURN node";
        assert!(!validate_query(q, &schema()));
    }

    #[test]
    fn belongs_to_and_paper_are_built_in() {
        let q = "MATCH (node:Hydrological_Process_Runoff)-[:belongs_to]->(p:Paper) RETURN node, p";
        assert!(validate_query(q, &schema()));
    }

    #[test]
    fn variable_length_specs_are_parsed() {
        let q = "MATCH path = (node:Hydrological_Process_Runoff)-[:causes*1..2]-(related) RETURN node";
        assert!(validate_query(q, &schema()));
        let bad = "MATCH path = (node:Hydrological_Process_Runoff)-[:unknown*1..2]-(related) RETURN node";
        assert!(!validate_query(bad, &schema()));
    }

    #[test]
    fn ladder_height_follows_complexity() {
        assert_eq!(build_ladder(&analysis(Complexity::Simple), &schema()).len(), 1);
        assert_eq!(build_ladder(&analysis(Complexity::Moderate), &schema()).len(), 2);
        assert_eq!(build_ladder(&analysis(Complexity::Complex), &schema()).len(), 3);
    }

    #[test]
    fn ladder_queries_stay_within_schema() {
        let mut a = analysis(Complexity::Complex);
        a.traversal_strategy.include_limitations = true;
        for generated in build_ladder(&a, &schema()) {
            assert!(
                validate_query(&generated.query, &schema()),
                "ladder query failed validation: {}",
                generated.query
            );
        }
    }

    #[test]
    fn ladder_filters_on_key_entities() {
        let queries = build_ladder(&analysis(Complexity::Simple), &schema());
        assert!(queries[0].query.contains("toLower('runoff')"));
        assert_eq!(queries[0].purpose, "direct match");
    }

    #[test]
    fn keyword_filter_treats_keywords_as_a_list() {
        let filter = keyword_filter("node", &["runoff".to_string()]);
        assert!(filter.contains("ANY(kw IN node.keywords WHERE toLower(kw) CONTAINS toLower('runoff'))"));
        assert!(!filter.contains("toLower(node.keywords)"));
    }
}
