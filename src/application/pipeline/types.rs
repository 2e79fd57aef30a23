use std::fmt;

use uuid::Uuid;

use crate::application::images::ImageUpload;

#[derive(Debug, Clone)]
pub struct CreatePostCommand {
    pub title: String,
    pub markdown: String,
    pub tags: Vec<String>,
    pub cover_image: ImageUpload,
}

/// Full edit form. Fields equal to the stored post are left alone; the cover
/// image counts as changed whenever one is supplied.
#[derive(Debug, Clone)]
pub struct EditPostCommand {
    pub post_id: Uuid,
    pub title: String,
    pub markdown: String,
    pub tags: Vec<String>,
    pub cover_image: Option<ImageUpload>,
}

/// Which fields an edit touches. Only these sub-pipelines run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangedFields {
    pub title: bool,
    pub body: bool,
    pub tags: bool,
    pub cover_image: bool,
}

impl ChangedFields {
    pub fn is_empty(&self) -> bool {
        !(self.title || self.body || self.tags || self.cover_image)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOp {
    Create,
    Edit,
    Delete,
}

impl PipelineOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineOp::Create => "create",
            PipelineOp::Edit => "edit",
            PipelineOp::Delete => "delete",
        }
    }
}

impl fmt::Display for PipelineOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Validating,
    AwaitingSubtasks,
    Assembling,
    Persisted,
    Failed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Validating => "validating",
            PipelineStage::AwaitingSubtasks => "awaiting_subtasks",
            PipelineStage::Assembling => "assembling",
            PipelineStage::Persisted => "persisted",
            PipelineStage::Failed => "failed",
        }
    }
}
