// Detector trait: the swap-ready abstraction over each model family.
//
// A detector classifies one image against its risk categories. The
// orchestrator only ever calls `detect`, which never returns an error:
// failures come back as `DetectorOutcome::Failure`.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

use crate::moderation::error::ModerationError;
use crate::moderation::models::{DetectionFinding, DetectorOutcome, FindingSource};

#[async_trait]
pub trait Detector: Send + Sync {
    /// Stable identity used in logs and failure reasons.
    fn name(&self) -> &str;

    /// The family this detector belongs to.
    fn source(&self) -> FindingSource;

    /// Run inference. Implementations may return errors freely; `detect`
    /// converts them.
    async fn findings(&self, image: &Path) -> Result<Vec<DetectionFinding>>;

    /// Run inference and fold any error into a `Failure` outcome.
    async fn detect(&self, image: &Path) -> DetectorOutcome {
        if !image.exists() {
            return DetectorOutcome::Failure(ModerationError::InputNotFound(image.to_path_buf()));
        }
        match self.findings(image).await {
            Ok(findings) => DetectorOutcome::Success(findings),
            Err(e) => DetectorOutcome::Failure(ModerationError::DetectorFailure {
                detector: self.name().to_string(),
                reason: format!("{e:#}"),
            }),
        }
    }
}

/// Stand-in for a detector whose model failed to load during warm-up.
/// Always reports `DetectorUnavailable`, which the aggregator treats as
/// maximum risk for the family's category.
pub struct UnavailableDetector {
    name: String,
    source: FindingSource,
    reason: String,
}

impl UnavailableDetector {
    pub fn new(name: impl Into<String>, source: FindingSource, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source,
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Detector for UnavailableDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn source(&self) -> FindingSource {
        self.source
    }

    async fn findings(&self, _image: &Path) -> Result<Vec<DetectionFinding>> {
        anyhow::bail!("{}", self.reason)
    }

    async fn detect(&self, _image: &Path) -> DetectorOutcome {
        DetectorOutcome::Failure(ModerationError::DetectorUnavailable {
            detector: self.name.clone(),
            reason: self.reason.clone(),
        })
    }
}
