// Moderation service: the per-request pipeline.
//
//   orchestrator.collect → aggregator.aggregate → policy.evaluate
//
// Aggregation and policy evaluation are pure and run inline once every
// detector outcome is in.

use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use super::aggregate::SignalAggregator;
use super::models::{Decision, DetectorReport, ImageCharacteristics};
use super::orchestrator::{Collection, Orchestrator};
use super::policy::PolicyEngine;
use super::readiness::Readiness;

/// A decision plus the evidence behind it, for HTTP and CLI rendering.
#[derive(Debug, Clone)]
pub struct ModerationReport {
    pub decision: Decision,
    pub reports: Vec<DetectorReport>,
    /// None when the pipeline failed closed before characteristics were read.
    pub characteristics: Option<ImageCharacteristics>,
    pub elapsed: Duration,
}

#[derive(Clone)]
pub struct ModerationService {
    orchestrator: Orchestrator,
    aggregator: SignalAggregator,
    policy: PolicyEngine,
}

impl ModerationService {
    pub fn new(orchestrator: Orchestrator, aggregator: SignalAggregator, policy: PolicyEngine) -> Self {
        Self {
            orchestrator,
            aggregator,
            policy,
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn readiness(&self) -> &Readiness {
        self.orchestrator.readiness()
    }

    pub fn ready(&self) -> bool {
        self.readiness().ready()
    }

    pub fn policy(&self) -> &PolicyEngine {
        &self.policy
    }

    /// Moderate one image. Always produces a decision.
    pub async fn moderate(&self, image: &Path) -> ModerationReport {
        let started = Instant::now();

        let report = match self.orchestrator.collect(image).await {
            Collection::FailClosed { decision, reports } => ModerationReport {
                decision,
                reports,
                characteristics: None,
                elapsed: started.elapsed(),
            },
            Collection::Complete(evidence) => {
                let risk = self.aggregator.aggregate(&evidence.reports);
                let decision = self.policy.evaluate(&risk, &evidence.characteristics);
                ModerationReport {
                    decision,
                    reports: evidence.reports,
                    characteristics: Some(evidence.characteristics),
                    elapsed: started.elapsed(),
                }
            }
        };

        let decision = &report.decision;
        if decision.is_admitted {
            info!(
                image = %image.display(),
                risk = decision.risk_score,
                tier = ?decision.decided_by,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Image admitted"
            );
        } else {
            warn!(
                image = %image.display(),
                risk = decision.risk_score,
                tier = ?decision.decided_by,
                reasons = %decision.reasons.join("; "),
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Image rejected"
            );
        }

        report
    }
}
