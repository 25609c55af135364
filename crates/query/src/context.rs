use serde::Serialize;

use graph::NeighborRecord;

/// A retrieved chunk with the revised-query variants that produced it.
/// Provenance survives deduplication: when two variants retrieve the
/// same text, the entry keeps both variant indexes.
#[derive(Debug, Clone, Serialize)]
pub struct ProvenancedChunk {
    pub text: String,
    pub variants: Vec<usize>,
}

/// Accumulate retrieved texts for one variant, deduplicating by exact
/// chunk text equality. Two different chunk ids with identical text
/// collapse to one entry.
pub fn merge_chunks(accumulated: &mut Vec<ProvenancedChunk>, texts: Vec<String>, variant: usize) {
    for text in texts {
        match accumulated.iter_mut().find(|c| c.text == text) {
            Some(existing) => {
                if !existing.variants.contains(&variant) {
                    existing.variants.push(variant);
                }
            }
            None => accumulated.push(ProvenancedChunk {
                text,
                variants: vec![variant],
            }),
        }
    }
}

/// Evidence assembled for one query, shaped by the target mode.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum QueryContext {
    /// Flat chunk list from a single-collection search.
    Chunks(Vec<String>),
    /// Graph-neighbor records from seed-id expansion.
    Graph(Vec<NeighborRecord>),
    /// Both-mode context, labeled by origin.
    Combined {
        #[serde(rename = "Vector")]
        vector: Vec<ProvenancedChunk>,
        #[serde(rename = "Graph")]
        graph: Vec<NeighborRecord>,
    },
}

impl QueryContext {
    /// The empty-context sentinel used when no relevant ids survive.
    pub fn sentinel() -> Self {
        QueryContext::Chunks(vec![String::new()])
    }

    /// Render the context for embedding in a generation prompt.
    pub fn render(&self) -> String {
        match self {
            // Combined mode keeps the origin labels; an empty graph side
            // renders as the sentinel so the shape stays stable
            QueryContext::Combined { vector, graph } if graph.is_empty() => {
                let value = serde_json::json!({
                    "Vector": vector,
                    "Graph": [""],
                });
                serde_json::to_string_pretty(&value).unwrap_or_default()
            }
            other => serde_json::to_string_pretty(other).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_different_ids_collapse_to_one_entry() {
        let mut acc = Vec::new();
        merge_chunks(
            &mut acc,
            vec!["rainfall runoff model".to_string()],
            0,
        );
        merge_chunks(
            &mut acc,
            vec![
                "rainfall runoff model".to_string(),
                "streamflow calibration".to_string(),
            ],
            1,
        );
        assert_eq!(acc.len(), 2);
        assert_eq!(acc[0].text, "rainfall runoff model");
        assert_eq!(acc[0].variants, vec![0, 1]);
        assert_eq!(acc[1].variants, vec![1]);
    }

    #[test]
    fn repeated_variant_is_not_recorded_twice() {
        let mut acc = Vec::new();
        merge_chunks(&mut acc, vec!["a".to_string()], 0);
        merge_chunks(&mut acc, vec!["a".to_string()], 0);
        assert_eq!(acc.len(), 1);
        assert_eq!(acc[0].variants, vec![0]);
    }

    #[test]
    fn sentinel_renders_as_a_single_empty_string() {
        let rendered = QueryContext::sentinel().render();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value, serde_json::json!([""]));
    }

    #[test]
    fn combined_with_empty_graph_keeps_both_origin_labels() {
        let context = QueryContext::Combined {
            vector: vec![ProvenancedChunk {
                text: "chunk".to_string(),
                variants: vec![0],
            }],
            graph: vec![],
        };
        let value: serde_json::Value = serde_json::from_str(&context.render()).unwrap();
        assert_eq!(value["Graph"], serde_json::json!([""]));
        assert_eq!(value["Vector"][0]["text"], "chunk");
    }
}
