use std::path::PathBuf;

/// Process configuration, read once at startup from the environment.
/// Every external handle is constructed from this and injected; nothing
/// initializes on first use.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub neo4j_uri: String,
    pub neo4j_username: String,
    pub neo4j_password: String,
    pub qdrant_url: String,
    pub ollama_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub temperature: f32,
    pub bind_addr: String,
    pub graph_schema_path: Option<PathBuf>,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            neo4j_uri: env_or("NEO4J_URI", "bolt://localhost:7687"),
            neo4j_username: env_or("NEO4J_USERNAME", "neo4j"),
            neo4j_password: env_or("NEO4J_PASSWORD", "neo4j"),
            qdrant_url: env_or("QDRANT_URL", "http://localhost:6333"),
            ollama_url: env_or("OLLAMA_URL", "http://localhost:11434"),
            chat_model: env_or("CHAT_MODEL", "llama3"),
            embedding_model: env_or("EMBEDDING_MODEL", "nomic-embed-text"),
            temperature: env_or("LLM_TEMPERATURE", "0.2").parse().unwrap_or(0.2),
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:3000"),
            graph_schema_path: std::env::var("GRAPH_SCHEMA_PATH").ok().map(PathBuf::from),
        }
    }
}
