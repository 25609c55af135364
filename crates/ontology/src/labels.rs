use crate::schema::Extraction;

/// Map every non-alphanumeric character to an underscore so the result
/// is safe to inline as a Cypher label or relationship type.
pub fn sanitize_identifier(raw: &str) -> String {
    let mut out: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    // Cypher identifiers cannot start with a digit
    if out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Node label for an extraction: first-level class joined to the
/// second-level class, sanitized.
pub fn node_label(extraction: &Extraction) -> String {
    format!(
        "{}_{}",
        sanitize_identifier(&extraction.first_level_class),
        sanitize_identifier(&extraction.second_level_class)
    )
}

/// Relationship type normalized to an identifier-safe form.
pub fn relationship_label(relationship_type: &str) -> String {
    sanitize_identifier(relationship_type)
}

/// Edge type used to link extractions back to their paper.
pub const BELONGS_TO: &str = "belongs_to";

#[cfg(test)]
mod tests {
    use super::*;

    fn extraction(first: &str, second: &str) -> Extraction {
        Extraction {
            extraction_id: "P001_EXT_1".to_string(),
            first_level_class: first.to_string(),
            second_level_class: second.to_string(),
            extracted_content: String::new(),
            supporting_evidence: String::new(),
            confidence_score: 5.0,
            keywords: vec![],
            context: None,
        }
    }

    #[test]
    fn label_joins_and_sanitizes_classes() {
        let e = extraction("Hydrological-Process", "Surface Runoff");
        assert_eq!(node_label(&e), "Hydrological_Process_Surface_Runoff");
    }

    #[test]
    fn sanitize_handles_leading_digit() {
        assert_eq!(sanitize_identifier("3d-model"), "_3d_model");
    }

    #[test]
    fn relationship_label_is_identifier_safe() {
        assert_eq!(relationship_label("validated by"), "validated_by");
        assert_eq!(relationship_label("causes"), "causes");
    }
}
