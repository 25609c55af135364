use anyhow::Result;
use neo4rs::Query;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::store::GraphStore;
use ontology::BELONGS_TO;

/// How to interpret an adjacent node, decided by the edge's type. The
/// containment edge marks the neighbor as the owning paper; every other
/// edge marks it as a peer extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeKind {
    Containment,
    Peer(String),
}

impl EdgeKind {
    pub fn from_label(label: &str) -> Self {
        if label == BELONGS_TO {
            EdgeKind::Containment
        } else {
            EdgeKind::Peer(label.to_string())
        }
    }
}

/// Content and evidence of one extraction node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeContent {
    pub content: String,
    pub evidence: String,
}

/// Summary fields of the paper owning a queried node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperRef {
    pub paper_id: String,
    pub main_theme: String,
    pub key_contributions: Vec<String>,
    pub primary_methods: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerRelationship {
    pub rel_type: String,
    pub description: String,
    pub evidence: String,
}

/// One peer edge together with the extraction on its far end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerRecord {
    pub relationship: PeerRelationship,
    pub neighbor: NodeContent,
}

/// Everything gathered for one queried node: its own content, its owning
/// paper (at most one, even if several containment edges exist), and its
/// peer relationships in traversal order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighborRecord {
    pub node_id: String,
    pub node: Option<NodeContent>,
    pub paper: Option<PaperRef>,
    pub peers: Vec<PeerRecord>,
}

impl NeighborRecord {
    fn empty(node_id: &str) -> Self {
        Self {
            node_id: node_id.to_string(),
            node: None,
            paper: None,
            peers: Vec::new(),
        }
    }
}

/// One row of the undirected adjacency query, before dispatch.
#[derive(Debug, Clone)]
pub struct AdjacencyRow {
    pub edge: EdgeKind,
    pub relationship: PeerRelationship,
    pub neighbor: NodeContent,
    pub paper: Option<PaperRef>,
}

/// Fold adjacency rows into the paper/peer split. The paper summary is
/// captured only the first time a containment edge is seen.
pub fn fold_adjacency(rows: Vec<AdjacencyRow>) -> (Option<PaperRef>, Vec<PeerRecord>) {
    let mut paper = None;
    let mut peers = Vec::new();

    for row in rows {
        match row.edge {
            EdgeKind::Containment => {
                if paper.is_none() {
                    paper = row.paper;
                }
            }
            EdgeKind::Peer(_) => {
                peers.push(PeerRecord {
                    relationship: row.relationship,
                    neighbor: row.neighbor,
                });
            }
        }
    }

    (paper, peers)
}

impl GraphStore {
    /// One-hop neighbor expansion for a batch of seed node ids. Each id
    /// yields exactly one record; a failure during one node's traversal
    /// is logged and leaves that record empty without aborting the rest
    /// of the batch.
    pub async fn retrieve_neighbors(&self, node_ids: &[String]) -> Vec<NeighborRecord> {
        let mut records = Vec::with_capacity(node_ids.len());

        for node_id in node_ids {
            match self.neighbors_for(node_id).await {
                Ok(record) => records.push(record),
                Err(e) => {
                    error!(node = %node_id, error = %e, "Failed to retrieve neighbors");
                    records.push(NeighborRecord::empty(node_id));
                }
            }
        }

        info!(requested = node_ids.len(), "Neighbor retrieval finished");
        records
    }

    async fn neighbors_for(&self, node_id: &str) -> Result<NeighborRecord> {
        // The node's own content first
        let self_query = Query::new(
            r#"
            MATCH (node {id: $id})
            RETURN node.content AS content, node.evidence AS evidence
            "#
            .to_string(),
        )
        .param("id", node_id.to_string());

        let mut result = self.inner().execute(self_query).await?;
        let node = match result.next().await? {
            Some(row) => Some(NodeContent {
                content: row.get("content").unwrap_or_default(),
                evidence: row.get("evidence").unwrap_or_default(),
            }),
            None => None,
        };

        // All directly adjacent nodes, in either direction, with the
        // connecting relationship
        let adjacency_query = Query::new(
            r#"
            MATCH (node {id: $id})-[relationship]-(neighbor)
            RETURN type(relationship) AS edge_label,
                   relationship.type AS rel_type,
                   relationship.description AS rel_description,
                   relationship.evidence AS rel_evidence,
                   neighbor.id AS neighbor_id,
                   neighbor.content AS neighbor_content,
                   neighbor.evidence AS neighbor_evidence,
                   neighbor.main_theme AS paper_theme,
                   neighbor.key_contributions AS paper_contributions,
                   neighbor.primary_methods AS paper_methods
            "#
            .to_string(),
        )
        .param("id", node_id.to_string());

        let mut result = self.inner().execute(adjacency_query).await?;
        let mut rows = Vec::new();

        while let Some(row) = result.next().await? {
            let edge_label: String = row.get("edge_label").unwrap_or_default();
            let edge = EdgeKind::from_label(&edge_label);

            let paper = match edge {
                EdgeKind::Containment => Some(PaperRef {
                    paper_id: row.get("neighbor_id").unwrap_or_default(),
                    main_theme: row.get("paper_theme").unwrap_or_default(),
                    key_contributions: row.get("paper_contributions").unwrap_or_default(),
                    primary_methods: row.get("paper_methods").unwrap_or_default(),
                }),
                EdgeKind::Peer(_) => None,
            };

            rows.push(AdjacencyRow {
                edge,
                relationship: PeerRelationship {
                    rel_type: row.get("rel_type").unwrap_or_default(),
                    description: row.get("rel_description").unwrap_or_default(),
                    evidence: row.get("rel_evidence").unwrap_or_default(),
                },
                neighbor: NodeContent {
                    content: row.get("neighbor_content").unwrap_or_default(),
                    evidence: row.get("neighbor_evidence").unwrap_or_default(),
                },
                paper,
            });
        }

        let (paper, peers) = fold_adjacency(rows);

        Ok(NeighborRecord {
            node_id: node_id.to_string(),
            node,
            paper,
            peers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn containment_row(paper_id: &str) -> AdjacencyRow {
        AdjacencyRow {
            edge: EdgeKind::Containment,
            relationship: PeerRelationship {
                rel_type: String::new(),
                description: String::new(),
                evidence: String::new(),
            },
            neighbor: NodeContent::default(),
            paper: Some(PaperRef {
                paper_id: paper_id.to_string(),
                main_theme: "runoff".to_string(),
                key_contributions: vec!["thresholds".to_string()],
                primary_methods: vec!["modeling".to_string()],
            }),
        }
    }

    fn peer_row(rel_type: &str, content: &str) -> AdjacencyRow {
        AdjacencyRow {
            edge: EdgeKind::from_label(rel_type),
            relationship: PeerRelationship {
                rel_type: rel_type.to_string(),
                description: "desc".to_string(),
                evidence: "quote".to_string(),
            },
            neighbor: NodeContent {
                content: content.to_string(),
                evidence: "e".to_string(),
            },
            paper: None,
        }
    }

    #[test]
    fn edge_kind_dispatches_on_containment_label() {
        assert_eq!(EdgeKind::from_label("belongs_to"), EdgeKind::Containment);
        assert_eq!(
            EdgeKind::from_label("validates"),
            EdgeKind::Peer("validates".to_string())
        );
    }

    #[test]
    fn one_containment_and_one_peer_fill_both_slots() {
        let (paper, peers) =
            fold_adjacency(vec![containment_row("P001"), peer_row("causes", "flooding")]);
        let paper = paper.unwrap();
        assert_eq!(paper.paper_id, "P001");
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].relationship.rel_type, "causes");
    }

    #[test]
    fn second_containment_edge_does_not_replace_the_paper() {
        let (paper, peers) = fold_adjacency(vec![
            containment_row("P001"),
            containment_row("P002"),
            peer_row("supports", "calibration"),
        ]);
        assert_eq!(paper.unwrap().paper_id, "P001");
        assert_eq!(peers.len(), 1);
    }

    #[test]
    fn zero_edges_yield_neutral_data() {
        let (paper, peers) = fold_adjacency(vec![]);
        assert!(paper.is_none());
        assert!(peers.is_empty());
    }

    #[test]
    fn peer_order_is_preserved() {
        let (_, peers) = fold_adjacency(vec![
            peer_row("causes", "a"),
            peer_row("affects", "b"),
            peer_row("validates", "c"),
        ]);
        let contents: Vec<&str> = peers.iter().map(|p| p.neighbor.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b", "c"]);
    }
}
