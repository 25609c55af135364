use neo4rs::Query;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, warn};

use graph::GraphStore;

use super::cypher::GeneratedQuery;

/// Column aliases the generated queries bind entities under.
const NODE_COLUMNS: [&str; 4] = ["node", "related", "mid", "limitations"];
const REL_COLUMNS: [&str; 3] = ["rel", "rel1", "rel2"];

#[derive(Debug, Clone, Serialize)]
pub struct RetrievedNode {
    pub id: String,
    pub content: String,
    pub evidence: String,
    pub confidence_score: f64,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrievedRelationship {
    pub id: String,
    pub rel_type: String,
    pub description: String,
    pub confidence_score: f64,
}

/// The merged evidence subgraph for one query. Transient; never
/// persisted.
#[derive(Debug, Clone, Serialize)]
pub struct GraphContext {
    pub nodes: Vec<RetrievedNode>,
    pub relationships: Vec<RetrievedRelationship>,
    pub summary: String,
}

/// Stage 3: run each generated query independently and merge what comes
/// back. A failing query is logged and skipped without aborting the
/// others.
pub struct GraphRetriever {
    store: GraphStore,
}

impl GraphRetriever {
    pub fn new(store: GraphStore) -> Self {
        Self { store }
    }

    pub async fn execute(&self, queries: &[GeneratedQuery]) -> GraphContext {
        let mut nodes = Vec::new();
        let mut relationships = Vec::new();

        for generated in queries {
            match self.run_one(&generated.query, &mut nodes, &mut relationships).await {
                Ok(rows) => {
                    info!(purpose = %generated.purpose, rows, "Query executed");
                }
                Err(e) => {
                    warn!(purpose = %generated.purpose, error = %e, "Query failed, skipping");
                }
            }
        }

        merge_results(nodes, relationships)
    }

    async fn run_one(
        &self,
        cypher: &str,
        nodes: &mut Vec<RetrievedNode>,
        relationships: &mut Vec<RetrievedRelationship>,
    ) -> anyhow::Result<usize> {
        let mut result = self
            .store
            .inner()
            .execute(Query::new(cypher.to_string()))
            .await?;

        let mut rows = 0;
        while let Some(row) = result.next().await? {
            rows += 1;

            for column in NODE_COLUMNS {
                if let Ok(node) = row.get::<neo4rs::Node>(column) {
                    nodes.push(RetrievedNode {
                        id: node.get("id").unwrap_or_default(),
                        content: node.get("content").unwrap_or_default(),
                        evidence: node.get("evidence").unwrap_or_default(),
                        confidence_score: node.get("confidence_score").unwrap_or_default(),
                        labels: node.labels().iter().map(|l| l.to_string()).collect(),
                    });
                }
            }

            for column in REL_COLUMNS {
                if let Ok(relation) = row.get::<neo4rs::Relation>(column) {
                    relationships.push(RetrievedRelationship {
                        id: relation.get("id").unwrap_or_default(),
                        rel_type: relation.typ().to_string(),
                        description: relation.get("description").unwrap_or_default(),
                        confidence_score: relation.get("confidence_score").unwrap_or_default(),
                    });
                }
            }
        }

        Ok(rows)
    }
}

/// Deduplicate nodes by extraction id and relationships by relationship
/// id, keeping first-seen order, and compute the count summary.
pub fn merge_results(
    nodes: Vec<RetrievedNode>,
    relationships: Vec<RetrievedRelationship>,
) -> GraphContext {
    let mut seen_nodes = HashSet::new();
    let nodes: Vec<RetrievedNode> = nodes
        .into_iter()
        .filter(|n| !n.id.is_empty() && seen_nodes.insert(n.id.clone()))
        .collect();

    let mut seen_rels = HashSet::new();
    let relationships: Vec<RetrievedRelationship> = relationships
        .into_iter()
        .filter(|r| !r.id.is_empty() && seen_rels.insert(r.id.clone()))
        .collect();

    let summary = format!(
        "Retrieved {} nodes and {} relationships",
        nodes.len(),
        relationships.len()
    );

    GraphContext {
        nodes,
        relationships,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn node(id: &str, confidence: f64) -> RetrievedNode {
        RetrievedNode {
            id: id.to_string(),
            content: format!("content of {id}"),
            evidence: "evidence".to_string(),
            confidence_score: confidence,
            labels: vec!["Hydrological_Process_Runoff".to_string()],
        }
    }

    pub(crate) fn relationship(id: &str) -> RetrievedRelationship {
        RetrievedRelationship {
            id: id.to_string(),
            rel_type: "causes".to_string(),
            description: "d".to_string(),
            confidence_score: 5.0,
        }
    }

    #[test]
    fn nodes_dedup_by_extraction_id() {
        let merged = merge_results(
            vec![node("P001_EXT_1", 7.0), node("P001_EXT_1", 3.0), node("P001_EXT_2", 5.0)],
            vec![],
        );
        assert_eq!(merged.nodes.len(), 2);
        // first occurrence wins
        assert_eq!(merged.nodes[0].confidence_score, 7.0);
    }

    #[test]
    fn relationships_dedup_by_relationship_id() {
        let merged = merge_results(
            vec![],
            vec![relationship("P001_REL_1"), relationship("P001_REL_1")],
        );
        assert_eq!(merged.relationships.len(), 1);
    }

    #[test]
    fn entities_without_ids_are_dropped() {
        let merged = merge_results(vec![node("", 9.0)], vec![relationship("")]);
        assert!(merged.nodes.is_empty());
        assert!(merged.relationships.is_empty());
    }

    #[test]
    fn summary_counts_the_merged_sets() {
        let merged = merge_results(
            vec![node("P001_EXT_1", 7.0)],
            vec![relationship("P001_REL_1")],
        );
        assert_eq!(merged.summary, "Retrieved 1 nodes and 1 relationships");
    }
}
