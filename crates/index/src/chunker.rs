use sha2::{Digest, Sha256};

use vector::Chunk;

pub struct ChunkerConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chars: 2500,
            overlap_chars: 200,
        }
    }
}

/// Splits paper full text into chunks bound for the Vector collection.
/// Sections are cut at markdown headings first, then packed by
/// paragraph up to the character budget with a trailing overlap.
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    pub fn chunk_text(&self, doc_id: &str, text: &str, source: &str) -> Vec<Chunk> {
        let mut texts = Vec::new();

        for section in self.split_by_headings(text) {
            if section.trim().is_empty() {
                continue;
            }
            if section.len() <= self.config.max_chars {
                texts.push(section);
                continue;
            }

            let mut buffer = String::new();
            for para in section.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
                if buffer.len() + para.len() > self.config.max_chars && !buffer.is_empty() {
                    let overlap = tail_chars(&buffer, self.config.overlap_chars);
                    texts.push(std::mem::take(&mut buffer));
                    buffer = overlap;
                }
                if !buffer.is_empty() {
                    buffer.push_str("\n\n");
                }
                buffer.push_str(para);
            }
            if !buffer.trim().is_empty() {
                texts.push(buffer);
            }
        }

        texts
            .into_iter()
            .map(|text| {
                let chunk_id = generate_chunk_id(doc_id, &text);
                Chunk {
                    chunk_id,
                    text,
                    source: source.to_string(),
                }
            })
            .collect()
    }

    fn split_by_headings(&self, text: &str) -> Vec<String> {
        let mut sections = Vec::new();
        let mut current = String::new();

        for line in text.lines() {
            if line.trim_start().starts_with('#') && !current.is_empty() {
                sections.push(std::mem::take(&mut current));
            }
            current.push_str(line);
            current.push('\n');
        }
        if !current.is_empty() {
            sections.push(current);
        }
        if sections.is_empty() {
            sections.push(text.to_string());
        }

        sections
    }
}

fn tail_chars(text: &str, count: usize) -> String {
    if text.len() <= count {
        return text.to_string();
    }
    // Back up to a char boundary
    let mut start = text.len() - count;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}

/// Stable chunk id from document id and content.
pub fn generate_chunk_id(doc_id: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(doc_id.as_bytes());
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..16])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_sections_become_single_chunks() {
        let chunker = Chunker::new(ChunkerConfig::default());
        let text = "# Abstract\nShort text.\n\n# Methods\nAlso short.";
        let chunks = chunker.chunk_text("P001", text, "P001");
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].text.contains("Abstract"));
        assert_eq!(chunks[0].source, "P001");
    }

    #[test]
    fn long_sections_are_split_with_overlap() {
        let chunker = Chunker::new(ChunkerConfig {
            max_chars: 100,
            overlap_chars: 20,
        });
        let para = "x".repeat(60);
        let text = format!("{para}\n\n{para}\n\n{para}");
        let chunks = chunker.chunk_text("P001", &text, "P001");
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.len() <= 160);
        }
    }

    #[test]
    fn chunk_ids_are_stable() {
        assert_eq!(generate_chunk_id("P001", "abc"), generate_chunk_id("P001", "abc"));
        assert_ne!(generate_chunk_id("P001", "abc"), generate_chunk_id("P002", "abc"));
    }
}
