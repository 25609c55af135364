/// System prompt for query revision. The response contract is a JSON
/// array of strings; the caller validates and repairs before parsing.
pub fn revise_query_prompt() -> String {
    r#"You rewrite a user's question about hydrology research papers to broaden retrieval recall.

Produce 2 to 4 reformulations of the question. Vary the terminology: expand abbreviations, use synonyms for hydrological processes, and rephrase the question structure.

Output ONLY a JSON array of strings, nothing else. Example:
["How does urbanization change surface runoff?", "What is the effect of land development on stormwater discharge?"]"#
        .to_string()
}

/// System prompt for relevant-id extraction. The caller pattern-filters
/// the response, so stray text is harmless.
pub fn extract_relevant_ids_prompt(context: &[String]) -> String {
    format!(
        r#"You are given text chunks retrieved from a hydrology research knowledge base. Each chunk names the extraction id it came from, in the form P001_EXT_3.

CHUNKS:
{}

From these chunks, pick the ones that are highly relevant to the user's question and reply with their extraction ids. Reply with the ids only, separated by commas. If none are relevant, reply with nothing."#,
        context.join("\n---\n")
    )
}

/// System prompt for grounded answer generation over assembled context.
pub fn grounded_answer_prompt(context: &str) -> String {
    format!(
        r#"You are a research assistant answering questions about hydrology papers using only the provided context.

CONTEXT:
{context}

INSTRUCTIONS:
- Answer using only information from the context above
- Be specific; mention the papers, processes, and relationships involved
- If the context does not contain enough information, say so
- Keep the answer concise and factual"#
    )
}
