// Error taxonomy for the moderation pipeline.
//
// None of these escape to callers: the orchestrator folds every one of them
// into a detector outcome or a fail-closed decision.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModerationError {
    /// The detector's model was never loaded.
    #[error("detector {detector} unavailable: {reason}")]
    DetectorUnavailable { detector: String, reason: String },

    /// Inference raised an error at runtime.
    #[error("detector {detector} failed: {reason}")]
    DetectorFailure { detector: String, reason: String },

    #[error("detector {detector} timed out after {limit:?}")]
    Timeout { detector: String, limit: Duration },

    #[error("image not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("all detectors failed")]
    AllDetectorsFailed,

    #[error("models not ready")]
    ModelsNotReady,
}

impl ModerationError {
    /// The reason string used when this error forces a fail-closed decision.
    pub fn fail_closed_reason(&self) -> String {
        match self {
            ModerationError::InputNotFound(_) => self.to_string(),
            _ => "models unavailable".to_string(),
        }
    }
}
