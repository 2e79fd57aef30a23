mod create;
mod delete;
mod edit;
mod service;
pub mod types;

pub use create::MAX_PERSIST_ATTEMPTS;
pub use service::{PipelineDeps, PostPipeline};
pub use types::{ChangedFields, CreatePostCommand, EditPostCommand, PipelineOp, PipelineStage};
