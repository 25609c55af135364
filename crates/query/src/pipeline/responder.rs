use anyhow::Result;

use llm::ChatClient;

/// Stage 5: formatted context + original query → final answer via a
/// grounded generation call.
pub struct ResponseGenerator {
    llm: ChatClient,
}

impl ResponseGenerator {
    pub fn new(llm: ChatClient) -> Self {
        Self { llm }
    }

    pub async fn generate(&self, user_query: &str, formatted_context: &str) -> Result<String> {
        let system = format!(
            r#"You are a knowledge-base assistant for hydrology research. Answer the user's question using the provided graph context.

GRAPH CONTEXT:
{formatted_context}

INSTRUCTIONS:
1. Answer directly and concisely
2. Cite confidence scores when making claims
3. Mention when information has low confidence
4. If the context is insufficient, say so clearly
5. Use the relationship information to provide connected insights"#
        );

        self.llm.generate(&system, user_query).await
    }
}
