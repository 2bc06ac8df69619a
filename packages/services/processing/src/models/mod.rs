pub mod image;
pub mod stage;
pub mod bundle;
pub mod job;

pub use self::image::*;
pub use stage::*;
pub use bundle::*;
pub use job::*;

use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Too many files: {count} (max: {max})")]
    TooManyFiles { count: usize, max: usize },

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("File too large: {name} is {size_bytes} bytes (max: {max_bytes})")]
    FileTooLarge { name: String, size_bytes: usize, max_bytes: usize },

    #[error("Multipart error: {0}")]
    Multipart(String),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Image decoding error: {0}")]
    Image(#[from] ::image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Stage {stage} failed: {message}")]
    Stage { stage: StageName, message: String },

    #[error("Stage {0} timed out")]
    StageTimeout(StageName),

    #[error("Invalid transition for stage {stage}: {from} -> {to}")]
    InvalidTransition { stage: StageName, from: StageStatus, to: StageStatus },

    #[error("Result bundle incomplete: {0}")]
    IncompleteBundle(String),

    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl ProcessingError {
    pub fn stage(stage: StageName, message: impl Into<String>) -> Self {
        ProcessingError::Stage { stage, message: message.into() }
    }

    /// Rejections decided by the batch contents themselves, before anything is persisted.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ProcessingError::Validation(_)
                | ProcessingError::TooManyFiles { .. }
                | ProcessingError::UnsupportedMediaType(_)
                | ProcessingError::FileTooLarge { .. }
                | ProcessingError::Multipart(_)
                | ProcessingError::JobNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ProcessingError>;
