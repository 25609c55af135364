pub mod context;
pub mod orchestrator;
pub mod pipeline;
pub mod prompt;

pub use context::{ProvenancedChunk, QueryContext, merge_chunks};
pub use orchestrator::{Exchange, Orchestrator, Target};
pub use pipeline::{GraphRagPipeline, GraphSchema, PipelineResult};
