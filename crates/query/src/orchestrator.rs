use anyhow::Result;
use tracing::{info, warn};

use graph::{GraphStore, NeighborRecord};
use index::GRAPH_COLLECTION;
use llm::ChatClient;
use ontology::find_extraction_ids;
use vector::VectorStore;

use crate::context::{QueryContext, merge_chunks};
use crate::prompt;

const TOP_K: usize = 10;

/// Which store(s) a query runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// One named vector collection, searched with the original query.
    Collection(String),
    /// The graph-labeled collection routed through id extraction and
    /// neighbor expansion.
    Graph,
    /// Every known collection, searched once per revised query variant.
    Both,
}

impl Target {
    /// Map a request-level mode string: absent, blank or "both" runs
    /// against every store, "graph" routes through id extraction and
    /// neighbor expansion, anything else names a vector collection.
    pub fn from_mode(mode: Option<&str>) -> Self {
        match mode.map(str::trim) {
            None | Some("") => Target::Both,
            Some(m) if m.eq_ignore_ascii_case("both") => Target::Both,
            Some(m) if m.eq_ignore_ascii_case("graph") => Target::Graph,
            Some(m) => Target::Collection(m.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Exchange {
    pub query: String,
    pub answer: String,
}

/// Drives one user query through revision, retrieval, optional graph
/// expansion, context assembly and answer generation. Owns its store
/// handles for the life of the process; one query at a time.
pub struct Orchestrator {
    vector: VectorStore,
    graph: GraphStore,
    llm: ChatClient,
    transcript: Vec<Exchange>,
}

impl Orchestrator {
    pub fn new(vector: VectorStore, graph: GraphStore, llm: ChatClient) -> Self {
        Self {
            vector,
            graph,
            llm,
            transcript: Vec::new(),
        }
    }

    /// Answer one user query against the given target. Retrieval and
    /// revision trouble degrade toward less context, never an error;
    /// the worst-case outcome is an empty or apologetic answer.
    pub async fn query(&mut self, user_query: &str, target: Target) -> Result<String> {
        let variants = self.revise_query(user_query).await;
        info!(variants = variants.len(), ?target, "Query revised");

        let context = match &target {
            Target::Collection(name) => self.vector_context(user_query, name).await,
            Target::Graph => self.graph_context(user_query).await,
            Target::Both => self.combined_context(user_query, &variants).await,
        };

        let answer = self.generate_answer(user_query, &context).await;

        self.transcript.push(Exchange {
            query: user_query.to_string(),
            answer: answer.clone(),
        });

        Ok(answer)
    }

    pub fn transcript(&self) -> &[Exchange] {
        &self.transcript
    }

    /// Revision must yield a non-empty JSON array of strings. Valid JSON
    /// in any other shape gets one targeted repair prompt; after that,
    /// an unusable reply falls back to the original query.
    async fn revise_query(&self, user_query: &str) -> Vec<String> {
        let system = prompt::revise_query_prompt();
        let reply = match self.llm.generate_json_with_retry(&system, user_query, 2).await {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Query revision failed, using the original query");
                return vec![user_query.to_string()];
            }
        };

        if let Some(variants) = parse_variants(&reply) {
            return variants;
        }

        let repair = format!(
            "The previous reply was valid JSON but not a JSON array of strings. \
             Reply with ONLY a JSON array of revised query strings.\n\nPrevious reply:\n{reply}"
        );
        match self.llm.generate_json_with_retry(&system, &repair, 1).await {
            Ok(json) => parse_variants(&json).unwrap_or_else(|| {
                warn!("Query revision unusable after repair, using the original query");
                vec![user_query.to_string()]
            }),
            Err(e) => {
                warn!(error = %e, "Revision repair failed, using the original query");
                vec![user_query.to_string()]
            }
        }
    }

    async fn vector_context(&self, user_query: &str, collection: &str) -> QueryContext {
        let chunks = self
            .vector
            .retrieve_similar(user_query, collection, TOP_K)
            .await;
        QueryContext::Chunks(chunks)
    }

    async fn graph_context(&self, user_query: &str) -> QueryContext {
        let chunks = self
            .vector
            .retrieve_similar(user_query, GRAPH_COLLECTION, TOP_K)
            .await;

        let ids = self.extract_relevant_ids(&chunks, user_query).await;
        expand_seed_ids(&ids, &self.graph).await
    }

    async fn combined_context(&self, user_query: &str, variants: &[String]) -> QueryContext {
        let mut vector_chunks = Vec::new();
        let mut graph_records = Vec::new();

        for collection in self.vector.list_collections().await {
            let mut accumulated = Vec::new();
            for (variant_idx, variant) in variants.iter().enumerate() {
                let texts = self
                    .vector
                    .retrieve_similar(variant, &collection, TOP_K)
                    .await;
                merge_chunks(&mut accumulated, texts, variant_idx);
            }

            if collection == GRAPH_COLLECTION {
                let texts: Vec<String> =
                    accumulated.iter().map(|c| c.text.clone()).collect();
                let ids = self.extract_relevant_ids(&texts, user_query).await;
                if !ids.is_empty() {
                    graph_records.extend(self.graph.retrieve_neighbors(&ids).await);
                }
            } else {
                vector_chunks.extend(accumulated);
            }
        }

        QueryContext::Combined {
            vector: vector_chunks,
            graph: graph_records,
        }
    }

    /// Ask the model which retrieved chunks matter, then keep only
    /// well-formed extraction ids from its reply. A generation failure
    /// degrades to no ids, never an error.
    async fn extract_relevant_ids(&self, context: &[String], user_query: &str) -> Vec<String> {
        if context.is_empty() {
            return Vec::new();
        }

        let system = prompt::extract_relevant_ids_prompt(context);
        match self.llm.generate(&system, user_query).await {
            Ok(answer) => {
                let ids = find_extraction_ids(&answer);
                info!(ids = ids.len(), "Relevant ids extracted");
                ids
            }
            Err(e) => {
                warn!(error = %e, "Relevant-id extraction failed");
                Vec::new()
            }
        }
    }

    /// Grounded answer generation. A failed call degrades to an empty
    /// answer rather than a crash.
    async fn generate_answer(&self, user_query: &str, context: &QueryContext) -> String {
        let system = prompt::grounded_answer_prompt(&context.render());
        match self.llm.generate(&system, user_query).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "Answer generation failed");
                String::new()
            }
        }
    }
}

/// Anything that can expand seed ids into neighbor records.
pub trait NeighborSource {
    fn neighbors(
        &self,
        ids: &[String],
    ) -> impl std::future::Future<Output = Vec<NeighborRecord>> + Send;
}

impl NeighborSource for GraphStore {
    async fn neighbors(&self, ids: &[String]) -> Vec<NeighborRecord> {
        self.retrieve_neighbors(ids).await
    }
}

/// Seed-id expansion policy: with no surviving ids the sentinel context
/// is returned and the graph is never asked for neighbors.
async fn expand_seed_ids<S: NeighborSource>(ids: &[String], source: &S) -> QueryContext {
    if ids.is_empty() {
        return QueryContext::sentinel();
    }
    QueryContext::Graph(source.neighbors(ids).await)
}

/// A usable revision is a JSON array with at least one non-blank string.
fn parse_variants(json: &str) -> Option<Vec<String>> {
    let variants: Vec<String> = serde_json::from_str(json).ok()?;
    let variants: Vec<String> = variants
        .into_iter()
        .filter(|v| !v.trim().is_empty())
        .collect();
    if variants.is_empty() { None } else { Some(variants) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
    }

    impl NeighborSource for CountingSource {
        async fn neighbors(&self, ids: &[String]) -> Vec<NeighborRecord> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ids.iter()
                .map(|id| NeighborRecord {
                    node_id: id.clone(),
                    node: None,
                    paper: None,
                    peers: Vec::new(),
                })
                .collect()
        }
    }

    #[tokio::test]
    async fn zero_seed_ids_skip_the_graph_round_trip() {
        let source = CountingSource {
            calls: AtomicUsize::new(0),
        };
        let context = expand_seed_ids(&[], &source).await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert_eq!(context.render(), QueryContext::sentinel().render());
    }

    #[tokio::test]
    async fn seed_ids_expand_into_graph_records() {
        let source = CountingSource {
            calls: AtomicUsize::new(0),
        };
        let ids = vec!["P001_EXT_1".to_string(), "P001_EXT_2".to_string()];
        let context = expand_seed_ids(&ids, &source).await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        match context {
            QueryContext::Graph(records) => {
                assert_eq!(records.len(), 2);
                assert_eq!(records[0].node_id, "P001_EXT_1");
            }
            other => panic!("expected graph context, got {other:?}"),
        }
    }

    #[test]
    fn array_replies_parse_as_variants() {
        let variants = parse_variants(r#"["q1", "q2"]"#);
        assert_eq!(variants, Some(vec!["q1".to_string(), "q2".to_string()]));
    }

    #[test]
    fn object_replies_are_not_usable_variants() {
        assert_eq!(parse_variants(r#"{"revisions": ["q1", "q2"]}"#), None);
    }

    #[test]
    fn blank_and_empty_arrays_are_not_usable_variants() {
        assert_eq!(parse_variants("[]"), None);
        assert_eq!(parse_variants(r#"["", "  "]"#), None);
    }

    #[test]
    fn mode_strings_map_onto_targets() {
        assert_eq!(Target::from_mode(None), Target::Both);
        assert_eq!(Target::from_mode(Some("both")), Target::Both);
        assert_eq!(Target::from_mode(Some("Graph")), Target::Graph);
        assert_eq!(
            Target::from_mode(Some("Vector")),
            Target::Collection("Vector".to_string())
        );
    }
}
