use thiserror::Error;

/// Failures at the generation boundary. InvalidJson marks exhaustion of
/// the decode-or-repair loop and is a recoverable, caller-visible kind;
/// Transport wraps everything the HTTP layer can throw.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("model failed to produce valid JSON after {attempts} attempts")]
    InvalidJson { attempts: usize },

    #[error(transparent)]
    Transport(anyhow::Error),
}
