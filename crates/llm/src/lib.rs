pub mod client;
pub mod error;

pub use client::{ChatClient, strip_code_fences};
pub use error::LlmError;
