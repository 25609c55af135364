use anyhow::{Context, Result};
use neo4rs::{Graph, Query};
use tracing::{error, info};

use ontology::{Extraction, Paper, Relationship, node_label, relationship_label};

/// Graph store adapter over a Neo4j driver. One instance owns the
/// connection for the lifetime of the process and is reused across
/// queries.
#[derive(Clone)]
pub struct GraphStore {
    graph: Graph,
}

impl GraphStore {
    pub fn new(graph: Graph) -> Self {
        Self { graph }
    }

    pub async fn connect(uri: &str, username: &str, password: &str) -> Result<Self> {
        let graph = Graph::new(uri, username, password)
            .await
            .context("Failed to connect to Neo4j")?;
        Ok(Self { graph })
    }

    pub fn inner(&self) -> &Graph {
        &self.graph
    }

    /// Create supporting indexes. Extraction nodes carry per-class
    /// labels, so only the paper label gets a dedicated index.
    pub async fn init_schema(&self) -> Result<()> {
        let query = Query::new(
            "CREATE INDEX paper_id_index IF NOT EXISTS FOR (p:Paper) ON (p.id)".to_string(),
        );
        self.graph
            .run(query)
            .await
            .context("Failed to create index on Paper.id")?;
        Ok(())
    }

    /// Create-or-merge an extraction node keyed by its id. Returns false
    /// on failure; errors never cross this boundary.
    pub async fn upsert_extraction_node(&self, extraction: &Extraction) -> bool {
        match self.try_upsert_extraction_node(extraction).await {
            Ok(()) => true,
            Err(e) => {
                error!(id = %extraction.extraction_id, error = %e, "Failed to upsert extraction node");
                false
            }
        }
    }

    async fn try_upsert_extraction_node(&self, extraction: &Extraction) -> Result<()> {
        // Labels cannot be parameterized; node_label yields a sanitized
        // identifier so inlining is safe.
        let label = node_label(extraction);
        let query = Query::new(format!(
            r#"
            MERGE (n:{label} {{id: $id}})
            SET n.content = $content,
                n.evidence = $evidence,
                n.confidence_score = $confidence_score,
                n.keywords = $keywords
            "#
        ))
        .param("id", extraction.extraction_id.clone())
        .param("content", extraction.extracted_content.clone())
        .param("evidence", extraction.supporting_evidence.clone())
        .param("confidence_score", extraction.confidence_score)
        .param("keywords", extraction.keywords.clone());

        self.graph
            .run(query)
            .await
            .context("Failed to write extraction node")?;
        Ok(())
    }

    /// Create-or-merge a directed typed edge between two existing
    /// extraction nodes. Merging is keyed by the relationship id, so
    /// re-importing updates properties instead of duplicating the edge.
    /// Returns false when the write fails or either endpoint is missing.
    pub async fn upsert_relationship(&self, relationship: &Relationship) -> bool {
        match self.try_upsert_relationship(relationship).await {
            Ok(written) => {
                if !written {
                    error!(
                        id = %relationship.relationship_id,
                        source = %relationship.source_extraction_id,
                        target = %relationship.target_extraction_id,
                        "Relationship skipped: endpoint node missing"
                    );
                }
                written
            }
            Err(e) => {
                error!(id = %relationship.relationship_id, error = %e, "Failed to upsert relationship");
                false
            }
        }
    }

    async fn try_upsert_relationship(&self, relationship: &Relationship) -> Result<bool> {
        let label = relationship_label(&relationship.relationship_type);
        let query = Query::new(format!(
            r#"
            MATCH (a {{id: $source_id}}), (b {{id: $target_id}})
            MERGE (a)-[r:{label} {{id: $id}}]->(b)
            SET r.type = $type,
                r.description = $description,
                r.confidence_score = $confidence_score,
                r.evidence = $evidence
            RETURN count(r) AS written
            "#
        ))
        .param("source_id", relationship.source_extraction_id.clone())
        .param("target_id", relationship.target_extraction_id.clone())
        .param("id", relationship.relationship_id.clone())
        .param("type", label.clone())
        .param("description", relationship.relationship_description.clone())
        .param("confidence_score", relationship.confidence_score)
        .param("evidence", relationship.supporting_evidence.clone());

        let mut result = self
            .graph
            .execute(query)
            .await
            .context("Failed to write relationship")?;

        // MATCH on both endpoints yields zero rows when either is absent,
        // which makes the MERGE a no-op.
        let written = match result.next().await? {
            Some(row) => row.get::<i64>("written").unwrap_or(0) > 0,
            None => false,
        };
        Ok(written)
    }

    /// Create-or-merge the paper node, then a belongs_to edge from each
    /// of its extractions to it.
    pub async fn link_paper(&self, paper: &Paper, extraction_ids: &[String]) -> bool {
        match self.try_link_paper(paper, extraction_ids).await {
            Ok(()) => {
                info!(paper = %paper.paper_id, extractions = extraction_ids.len(), "Paper linked");
                true
            }
            Err(e) => {
                error!(paper = %paper.paper_id, error = %e, "Failed to link paper");
                false
            }
        }
    }

    async fn try_link_paper(&self, paper: &Paper, extraction_ids: &[String]) -> Result<()> {
        let query = Query::new(
            r#"
            MERGE (p:Paper {id: $id})
            SET p.main_theme = $main_theme,
                p.study_location = $study_location,
                p.study_period = $study_period,
                p.primary_methods = $primary_methods,
                p.key_contributions = $key_contributions,
                p.extraction_count = $extraction_count
            "#
            .to_string(),
        )
        .param("id", paper.paper_id.clone())
        .param("main_theme", paper.main_theme.clone())
        .param("study_location", paper.study_location.clone())
        .param("study_period", paper.study_period.clone())
        .param("primary_methods", paper.primary_methods.clone())
        .param("key_contributions", paper.key_contributions.clone())
        .param("extraction_count", extraction_ids.len() as i64);

        self.graph
            .run(query)
            .await
            .context("Failed to write paper node")?;

        for extraction_id in extraction_ids {
            let query = Query::new(
                r#"
                MATCH (p:Paper {id: $paper_id}), (e {id: $extraction_id})
                MERGE (e)-[:belongs_to]->(p)
                "#
                .to_string(),
            )
            .param("paper_id", paper.paper_id.clone())
            .param("extraction_id", extraction_id.clone());

            self.graph
                .run(query)
                .await
                .with_context(|| format!("Failed to link extraction {extraction_id}"))?;
        }

        Ok(())
    }

    /// Number of belongs_to edges into a paper node. Used as a soundness
    /// check against the paper's recorded extraction count.
    pub async fn belongs_to_count(&self, paper_id: &str) -> Result<usize> {
        let query = Query::new(
            "MATCH (e)-[:belongs_to]->(p:Paper {id: $paper_id}) RETURN count(e) AS count"
                .to_string(),
        )
        .param("paper_id", paper_id.to_string());

        let mut result = self.graph.execute(query).await?;
        let count = match result.next().await? {
            Some(row) => row.get::<i64>("count").unwrap_or(0) as usize,
            None => 0,
        };
        Ok(count)
    }

    /// Corpus-wide node and edge counts.
    pub async fn stats(&self) -> Result<GraphStats> {
        let node_query = Query::new(
            r#"MATCH (n) WHERE n.id =~ 'P\\d{3}_EXT_\\d+' RETURN count(n) AS count"#.to_string(),
        );
        let mut result = self.graph.execute(node_query).await?;
        let extraction_count = match result.next().await? {
            Some(row) => row.get::<i64>("count").unwrap_or(0) as usize,
            None => 0,
        };

        let rel_query = Query::new(
            "MATCH ()-[r]->() WHERE r.id IS NOT NULL RETURN count(r) AS count".to_string(),
        );
        let mut result = self.graph.execute(rel_query).await?;
        let relationship_count = match result.next().await? {
            Some(row) => row.get::<i64>("count").unwrap_or(0) as usize,
            None => 0,
        };

        let paper_query = Query::new("MATCH (p:Paper) RETURN count(p) AS count".to_string());
        let mut result = self.graph.execute(paper_query).await?;
        let paper_count = match result.next().await? {
            Some(row) => row.get::<i64>("count").unwrap_or(0) as usize,
            None => 0,
        };

        Ok(GraphStats {
            extraction_count,
            relationship_count,
            paper_count,
        })
    }
}

#[derive(Debug, serde::Serialize)]
pub struct GraphStats {
    pub extraction_count: usize,
    pub relationship_count: usize,
    pub paper_count: usize,
}
