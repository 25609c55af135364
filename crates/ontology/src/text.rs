use crate::schema::{Extraction, OntologyFile};

/// Render one extraction as a retrievable text chunk. The extraction id
/// is embedded so the relevant-id step can recover it from retrieved
/// chunk text later.
pub fn extraction_to_text(extraction: &Extraction) -> String {
    let keywords = extraction.keywords.join(", ");
    format!(
        "This data is from {} containing {} on {}. The content is {} and contains the keywords {}",
        extraction.extraction_id,
        extraction.first_level_class,
        extraction.second_level_class,
        extraction.extracted_content,
        keywords
    )
}

/// Formatted text for every extraction in an ontology file, in file order.
pub fn ontology_to_texts(file: &OntologyFile) -> Vec<String> {
    file.extractions.iter().map(extraction_to_text).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formatted_text_embeds_the_extraction_id() {
        let e = Extraction {
            extraction_id: "P004_EXT_2".to_string(),
            first_level_class: "Hydrological_Process".to_string(),
            second_level_class: "Runoff".to_string(),
            extracted_content: "Runoff increased by 20%".to_string(),
            supporting_evidence: "Table 3".to_string(),
            confidence_score: 8.0,
            keywords: vec!["runoff".to_string(), "urbanization".to_string()],
            context: None,
        };
        let text = extraction_to_text(&e);
        assert!(text.contains("P004_EXT_2"));
        assert!(text.contains("Hydrological_Process on Runoff"));
        assert!(text.contains("keywords runoff, urbanization"));
    }
}
