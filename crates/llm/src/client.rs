use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::LlmError;

/// Generation client over the Ollama chat endpoint. One request is one
/// {system prompt, user message} pair; the response is raw text.
#[derive(Clone)]
pub struct ChatClient {
    base_url: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl ChatClient {
    pub fn new(base_url: String, model: String, temperature: f32) -> Self {
        Self {
            base_url,
            model,
            temperature,
            client: reqwest::Client::new(),
        }
    }

    pub fn default() -> Self {
        Self::new("http://localhost:11434".to_string(), "llama3".to_string(), 0.2)
    }

    pub async fn generate(&self, system_prompt: &str, user_message: &str) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);

        let mut messages = Vec::new();
        if !system_prompt.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system_prompt.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: user_message.to_string(),
        });

        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to send chat request")?;

        if !response.status().is_success() {
            anyhow::bail!("Chat request failed: {}", response.status());
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .context("Failed to parse chat response")?;

        Ok(chat_response.message.content)
    }

    /// Generate text that must itself parse as JSON. On an invalid
    /// response, re-prompt with a repair message; after max_retries
    /// attempts the failure surfaces as a distinct error kind.
    pub async fn generate_json_with_retry(
        &self,
        system_prompt: &str,
        user_message: &str,
        max_retries: usize,
    ) -> Result<String, LlmError> {
        let mut last_response = String::new();

        for attempt in 0..max_retries {
            let response = if attempt == 0 {
                self.generate(system_prompt, user_message).await
            } else {
                warn!(attempt, "Model returned invalid JSON, re-prompting");
                let repair = format!(
                    "The following JSON is invalid:\n{}\n\nFix this JSON. Output only valid JSON \
                     with no markdown formatting, no code blocks, no explanations.",
                    last_response
                );
                self.generate(system_prompt, &repair).await
            };

            let response = response.map_err(LlmError::Transport)?;
            let cleaned = strip_code_fences(&response);

            if serde_json::from_str::<serde_json::Value>(&cleaned).is_ok() {
                return Ok(cleaned);
            }
            last_response = response;
        }

        Err(LlmError::InvalidJson {
            attempts: max_retries,
        })
    }
}

/// Models often wrap JSON in markdown fences; strip them before parsing.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    // Drop an optional language tag on the opening fence
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim_start_matches(['\r', '\n'])
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fenced_json() {
        let fenced = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(fenced), "{\"a\": 1}");
    }

    #[test]
    fn strips_bare_fences() {
        let fenced = "```\n[1, 2]\n```";
        assert_eq!(strip_code_fences(fenced), "[1, 2]");
    }

    #[test]
    fn leaves_plain_text_alone() {
        assert_eq!(strip_code_fences("  {\"a\": 1} "), "{\"a\": 1}");
    }
}
