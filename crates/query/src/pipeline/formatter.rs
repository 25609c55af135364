use super::retriever::GraphContext;

pub struct FormatterConfig {
    pub max_chars: usize,
    pub max_nodes: usize,
    pub max_relationships: usize,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            max_chars: 16_000,
            max_nodes: 10,
            max_relationships: 10,
        }
    }
}

pub const TRUNCATION_MARKER: &str = "...\n[Context truncated]";

/// Stage 4: render the merged subgraph as a bounded text block — the
/// summary line, the highest-confidence nodes, then relationships, each
/// bulleted with its confidence annotated.
pub fn format_context(context: &GraphContext, config: &FormatterConfig) -> String {
    let mut parts = vec![format!("Graph Context Summary: {}", context.summary)];

    let mut sorted_nodes: Vec<_> = context.nodes.iter().collect();
    sorted_nodes.sort_by(|a, b| {
        b.confidence_score
            .partial_cmp(&a.confidence_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    parts.push("\n=== KEY ENTITIES ===".to_string());
    for node in sorted_nodes.iter().take(config.max_nodes) {
        parts.push(format!(
            "• {} (Confidence: {})",
            node.content, node.confidence_score
        ));
    }

    parts.push("\n=== RELATIONSHIPS ===".to_string());
    for relationship in context.relationships.iter().take(config.max_relationships) {
        parts.push(format!(
            "• {}: {} (Confidence: {})",
            relationship.rel_type, relationship.description, relationship.confidence_score
        ));
    }

    let full = parts.join("\n");
    if full.len() > config.max_chars {
        let mut cut = config.max_chars;
        while !full.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}{}", &full[..cut], TRUNCATION_MARKER)
    } else {
        full
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::retriever::{RetrievedNode, RetrievedRelationship, merge_results};

    fn context(node_count: usize, rel_count: usize) -> GraphContext {
        let nodes = (0..node_count)
            .map(|i| RetrievedNode {
                id: format!("P001_EXT_{i}"),
                content: format!("fact {i}"),
                evidence: "e".to_string(),
                confidence_score: i as f64,
                labels: vec![],
            })
            .collect();
        let relationships = (0..rel_count)
            .map(|i| RetrievedRelationship {
                id: format!("P001_REL_{i}"),
                rel_type: "causes".to_string(),
                description: format!("rel {i}"),
                confidence_score: i as f64,
            })
            .collect();
        merge_results(nodes, relationships)
    }

    #[test]
    fn caps_nodes_and_relationships_at_ten() {
        let formatted = format_context(&context(15, 15), &FormatterConfig::default());
        let node_lines = formatted.lines().filter(|l| l.contains("fact")).count();
        let rel_lines = formatted.lines().filter(|l| l.contains("rel ")).count();
        assert_eq!(node_lines, 10);
        assert_eq!(rel_lines, 10);
    }

    #[test]
    fn nodes_are_ordered_by_descending_confidence() {
        let formatted = format_context(&context(15, 0), &FormatterConfig::default());
        let first_fact = formatted.lines().find(|l| l.contains("fact")).unwrap();
        assert!(first_fact.contains("fact 14"));
        // the lowest-confidence five never appear
        assert!(!formatted.contains("fact 4 "));
    }

    #[test]
    fn output_is_truncated_to_the_character_budget() {
        let config = FormatterConfig {
            max_chars: 120,
            ..FormatterConfig::default()
        };
        let formatted = format_context(&context(15, 15), &config);
        assert!(formatted.ends_with(TRUNCATION_MARKER));
        assert!(formatted.len() <= 120 + TRUNCATION_MARKER.len());
    }

    #[test]
    fn short_context_is_not_truncated() {
        let formatted = format_context(&context(1, 1), &FormatterConfig::default());
        assert!(!formatted.contains(TRUNCATION_MARKER));
        assert!(formatted.starts_with("Graph Context Summary:"));
    }
}
