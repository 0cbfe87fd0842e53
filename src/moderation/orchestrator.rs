// Fail-safe orchestrator: runs every detector and guarantees a complete,
// error-free set of outcomes reaches the aggregator.
//
// Each detector runs in its own task so latency is bounded by the slowest
// detector instead of the sum. A detector error, panic or timeout becomes a
// Failure outcome; it is never retried within the request. If readiness is
// false or every detector failed, the orchestrator short-circuits to the
// fail-closed decision and the aggregator never runs.
//
// Aborting a timed-out task cannot stop a blocking inference that is already
// running. The ONNX detectors instead watch their caller while queued on the
// session lock (see `detectors::onnx::lock_for_caller`) and give up once the
// request has moved on, so a hung model does not accumulate waiting threads.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::RwLock;
use tokio::task::JoinError;
use tracing::{error, info, warn};

use super::error::ModerationError;
use super::models::{Decision, DetectorOutcome, DetectorReport, ImageCharacteristics};
use super::readiness::{Readiness, WarmupState};
use crate::detectors::characteristics;
use crate::detectors::traits::Detector;

/// Everything the aggregator and policy engine need for one image.
#[derive(Debug, Clone)]
pub struct Evidence {
    /// Exactly one report per configured detector.
    pub reports: Vec<DetectorReport>,
    pub characteristics: ImageCharacteristics,
}

/// What the orchestrator hands back for one request.
#[derive(Debug, Clone)]
pub enum Collection {
    Complete(Evidence),
    /// The pipeline could not run. `reports` is kept for diagnostics and is
    /// empty when readiness short-circuited before any detector ran.
    FailClosed {
        decision: Decision,
        reports: Vec<DetectorReport>,
    },
}

#[derive(Clone)]
pub struct Orchestrator {
    detectors: Arc<RwLock<Vec<Arc<dyn Detector>>>>,
    readiness: Readiness,
    timeout: Option<Duration>,
}

impl Orchestrator {
    /// An orchestrator with no detectors yet. Requests fail closed until
    /// `install` is called by warm-up.
    pub fn new(readiness: Readiness, timeout: Option<Duration>) -> Self {
        Self {
            detectors: Arc::new(RwLock::new(Vec::new())),
            readiness,
            timeout,
        }
    }

    /// An orchestrator that is ready immediately with the given detectors.
    pub fn with_detectors(detectors: Vec<Arc<dyn Detector>>, timeout: Option<Duration>) -> Self {
        let readiness = Readiness::new();
        readiness.set(WarmupState::Ready);
        Self {
            detectors: Arc::new(RwLock::new(detectors)),
            readiness,
            timeout,
        }
    }

    pub fn readiness(&self) -> &Readiness {
        &self.readiness
    }

    /// Install the loaded detector set and flip readiness to ready.
    pub async fn install(&self, detectors: Vec<Arc<dyn Detector>>) {
        let count = detectors.len();
        *self.detectors.write().await = detectors;
        self.readiness.set(WarmupState::Ready);
        info!(detectors = count, "Detector set installed");
    }

    pub async fn detector_names(&self) -> Vec<String> {
        self.detectors
            .read()
            .await
            .iter()
            .map(|d| d.name().to_string())
            .collect()
    }

    /// Run every configured detector against `image`.
    pub async fn collect(&self, image: &Path) -> Collection {
        if !self.readiness.ready() {
            warn!(state = ?self.readiness.state(), "Models not ready, failing closed");
            return fail_closed(ModerationError::ModelsNotReady, Vec::new());
        }

        let detectors = self.detectors.read().await.clone();
        if detectors.is_empty() {
            error!("No detectors configured, failing closed");
            return fail_closed(ModerationError::AllDetectorsFailed, Vec::new());
        }

        let image = image.to_path_buf();
        let characteristics_task = {
            let image = image.clone();
            tokio::task::spawn_blocking(move || characteristics::analyze_file(&image))
        };

        let reports: Vec<DetectorReport> = join_all(
            detectors
                .iter()
                .map(|detector| self.invoke(Arc::clone(detector), image.clone())),
        )
        .await;

        for report in &reports {
            if let DetectorOutcome::Failure(err) = &report.outcome {
                warn!(detector = %report.detector, error = %err, "Detector failed");
            }
        }

        if reports.iter().all(|r| r.outcome.is_failure()) {
            characteristics_task.abort();
            let cause = if image.exists() {
                ModerationError::AllDetectorsFailed
            } else {
                ModerationError::InputNotFound(image.clone())
            };
            error!(image = %image.display(), cause = %cause, "All detectors failed, failing closed");
            return fail_closed(cause, reports);
        }

        let characteristics = match characteristics_task.await {
            Ok(Ok(c)) => c,
            Ok(Err(e)) => {
                warn!(error = %e, "Image characteristics unavailable, no exceptions will apply");
                ImageCharacteristics::default()
            }
            Err(e) => {
                warn!(error = %e, "Image characteristics task failed");
                ImageCharacteristics::default()
            }
        };

        Collection::Complete(Evidence {
            reports,
            characteristics,
        })
    }

    /// Run one detector in its own task, bounded by the timeout.
    async fn invoke(&self, detector: Arc<dyn Detector>, image: PathBuf) -> DetectorReport {
        let name = detector.name().to_string();
        let source = detector.source();

        let mut task = tokio::spawn(async move { detector.detect(&image).await });

        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut task).await {
                Ok(joined) => joined_outcome(&name, joined),
                Err(_) => {
                    task.abort();
                    DetectorOutcome::Failure(ModerationError::Timeout {
                        detector: name.clone(),
                        limit,
                    })
                }
            },
            None => joined_outcome(&name, task.await),
        };

        DetectorReport {
            detector: name,
            source,
            outcome,
        }
    }
}

/// A panic inside a detector is an escaping error: treat it like any
/// other failure.
fn joined_outcome(name: &str, joined: Result<DetectorOutcome, JoinError>) -> DetectorOutcome {
    match joined {
        Ok(outcome) => outcome,
        Err(e) => DetectorOutcome::Failure(ModerationError::DetectorFailure {
            detector: name.to_string(),
            reason: format!("detector task aborted: {e}"),
        }),
    }
}

fn fail_closed(cause: ModerationError, reports: Vec<DetectorReport>) -> Collection {
    Collection::FailClosed {
        decision: Decision::fail_closed(&cause),
        reports,
    }
}
