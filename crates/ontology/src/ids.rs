use regex::Regex;
use std::sync::OnceLock;

/// Extraction ids follow a fixed format: P001_EXT_3. Anything else is
/// never surfaced by the relevant-id extraction path.
pub const EXTRACTION_ID_PATTERN: &str = r"\bP\d{3}_EXT_\d+\b";

fn id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(EXTRACTION_ID_PATTERN).unwrap())
}

/// Check a single id against the extraction id format.
pub fn is_extraction_id(id: &str) -> bool {
    id_regex()
        .find(id)
        .is_some_and(|m| m.start() == 0 && m.end() == id.len())
}

/// Pull every well-formed extraction id out of free text, in order of
/// first appearance, deduplicated. Malformed id-like fragments are
/// silently dropped.
pub fn find_extraction_ids(text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut ids = Vec::new();
    for m in id_regex().find_iter(text) {
        if seen.insert(m.as_str()) {
            ids.push(m.as_str().to_string());
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_ids_and_drops_malformed_fragments() {
        let ids = find_extraction_ids("see P001_EXT_3 and alsoXYZ");
        assert_eq!(ids, vec!["P001_EXT_3".to_string()]);
    }

    #[test]
    fn dedups_repeated_ids_preserving_order() {
        let ids = find_extraction_ids("P002_EXT_1, P001_EXT_9, P002_EXT_1");
        assert_eq!(ids, vec!["P002_EXT_1", "P001_EXT_9"]);
    }

    #[test]
    fn empty_when_nothing_matches() {
        assert!(find_extraction_ids("no ids here, only P1_EXT_2").is_empty());
    }

    #[test]
    fn whole_string_validation() {
        assert!(is_extraction_id("P123_EXT_45"));
        assert!(!is_extraction_id("xP123_EXT_45"));
        assert!(!is_extraction_id("P123_EXT_45 trailing"));
    }
}
