// Data model shared by the aggregator, the policy engine and the orchestrator.
//
// Everything here is created fresh per request and dropped once the
// response is written. Nothing is persisted.

use serde::{Deserialize, Serialize};

use super::error::ModerationError;

/// Risk category a finding belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Graphic violence: blood, gore, injuries.
    Violence,
    Weapons,
    SexualContent,
    /// Non-graphic violent themes (fight, war, horror). Folded into violence risk.
    GeneralHazard,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Violence => "violence",
            Category::Weapons => "weapons",
            Category::SexualContent => "sexual_content",
            Category::GeneralHazard => "general_hazard",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which detector family produced a finding. Families are calibrated
/// differently, so the aggregator applies a noise floor per family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FindingSource {
    #[serde(rename = "clip-zero-shot")]
    ViolenceClassifier,
    #[serde(rename = "yolo")]
    WeaponDetector,
    #[serde(rename = "nsfw-classifier")]
    ContentClassifier,
}

impl FindingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingSource::ViolenceClassifier => "clip-zero-shot",
            FindingSource::WeaponDetector => "yolo",
            FindingSource::ContentClassifier => "nsfw-classifier",
        }
    }

    /// The category this family is primarily responsible for. A failure of
    /// the family maximizes risk in this category.
    pub fn primary_category(&self) -> Category {
        match self {
            FindingSource::ViolenceClassifier => Category::Violence,
            FindingSource::WeaponDetector => Category::Weapons,
            FindingSource::ContentClassifier => Category::SexualContent,
        }
    }
}

impl std::fmt::Display for FindingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One raw observation from a detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionFinding {
    pub category: Category,
    /// Free-text descriptor, e.g. "knife".
    pub label: String,
    /// Detector confidence, always within [0, 1].
    pub score: f64,
    pub source: FindingSource,
}

impl DetectionFinding {
    /// Build a finding, clamping the score into [0, 1]. A NaN score is
    /// treated as maximum confidence.
    pub fn new(
        category: Category,
        label: impl Into<String>,
        score: f64,
        source: FindingSource,
    ) -> Self {
        let score = if score.is_nan() {
            1.0
        } else {
            score.clamp(0.0, 1.0)
        };
        Self {
            category,
            label: label.into(),
            score,
            source,
        }
    }
}

/// Heuristic descriptors of the raw image, consumed by the policy engine's
/// landscape exception.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImageCharacteristics {
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: f64,
    pub color_variance: f64,
    pub is_landscape: bool,
    pub is_portrait: bool,
}

/// Result of one detector invocation for one request.
#[derive(Debug, Clone)]
pub enum DetectorOutcome {
    Success(Vec<DetectionFinding>),
    Failure(ModerationError),
}

impl DetectorOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, DetectorOutcome::Failure(_))
    }

    pub fn findings(&self) -> &[DetectionFinding] {
        match self {
            DetectorOutcome::Success(findings) => findings,
            DetectorOutcome::Failure(_) => &[],
        }
    }
}

/// A detector's outcome tagged with the detector that produced it.
#[derive(Debug, Clone)]
pub struct DetectorReport {
    pub detector: String,
    pub source: FindingSource,
    pub outcome: DetectorOutcome,
}

/// Per-category risk computed by the signal aggregator. Every risk is within [0, 1].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AggregatedRisk {
    pub violence_risk: f64,
    pub weapon_risk: f64,
    pub sexual_content_risk: f64,
    /// Max weapons score seen through the violence classifier's own labels.
    pub weapon_risk_via_violence_model: f64,
    /// The findings that set each category's risk.
    pub contributing_findings: Vec<DetectionFinding>,
    /// Detectors whose failure was folded into the risks above.
    pub failed_detectors: Vec<FailedDetector>,
}

impl AggregatedRisk {
    /// Highest of the category risks. This is the decision's `risk_score`.
    pub fn max_risk(&self) -> f64 {
        self.violence_risk
            .max(self.weapon_risk)
            .max(self.sexual_content_risk)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedDetector {
    pub detector: String,
    pub reason: String,
}

/// Which policy tier produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    FailClosed,
    HardReject,
    LandscapeException,
    CombinedRisk,
    Default,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::FailClosed => "fail_closed",
            Tier::HardReject => "hard_reject",
            Tier::LandscapeException => "landscape_exception",
            Tier::CombinedRisk => "combined_risk",
            Tier::Default => "default",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal output of the engine.
///
/// `reasons` is empty if and only if the image is admitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub is_admitted: bool,
    pub risk_score: f64,
    pub reasons: Vec<String>,
    pub category_breakdown: AggregatedRisk,
    pub decided_by: Tier,
}

impl Decision {
    pub fn admit(breakdown: AggregatedRisk, decided_by: Tier) -> Self {
        Self {
            is_admitted: true,
            risk_score: breakdown.max_risk(),
            reasons: Vec::new(),
            category_breakdown: breakdown,
            decided_by,
        }
    }

    /// Reject with the given reasons. An empty reason list would break the
    /// admitted/reasons invariant, so a generic reason is substituted.
    pub fn reject(breakdown: AggregatedRisk, mut reasons: Vec<String>, decided_by: Tier) -> Self {
        if reasons.is_empty() {
            reasons.push("content policy violation".to_string());
        }
        Self {
            is_admitted: false,
            risk_score: breakdown.max_risk(),
            reasons,
            category_breakdown: breakdown,
            decided_by,
        }
    }

    /// The synthetic maximum-risk decision returned when the pipeline cannot run.
    pub fn fail_closed(cause: &ModerationError) -> Self {
        Self {
            is_admitted: false,
            risk_score: 1.0,
            reasons: vec![cause.fail_closed_reason()],
            category_breakdown: AggregatedRisk::default(),
            decided_by: Tier::FailClosed,
        }
    }
}
