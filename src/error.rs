//! # Pipeline Error Types
//!
//! Structured error handling for the pipeline using thiserror. Cancellation is modelled
//! as an error variant so it can short-circuit any task with `?`, but it is not a fault:
//! callers use [`PipelineError::is_cancellation`] to tell the two apart.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Processing error in {worker} for message {message_id}: {reason}")]
    Processing {
        worker: String,
        message_id: String,
        reason: String,
    },

    #[error("Queue closed while {worker} still had messages to send")]
    QueueClosed { worker: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Task {task} terminated abnormally: {reason}")]
    TaskPanicked { task: String, reason: String },
}

impl PipelineError {
    /// Build a processing error for the given worker and message
    pub fn processing(
        worker: impl Into<String>,
        message_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Processing {
            worker: worker.into(),
            message_id: message_id.into(),
            reason: reason.into(),
        }
    }

    /// True when the error signals an intentional stop rather than a fault
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
