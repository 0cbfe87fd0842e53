// Signal aggregation: raw detector findings into per-category risk.
//
// The category risk is the worst surviving finding, never an average: one
// confident detection must not be diluted by a pile of low-confidence
// negatives. Findings at or below their family's noise floor are dropped
// before the max is taken.

use tracing::debug;

use super::models::{
    AggregatedRisk, Category, DetectionFinding, DetectorOutcome, DetectorReport, FailedDetector,
    FindingSource,
};

/// Per-family noise floors. A finding survives only if its score is
/// strictly above the floor that applies to it.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseFloors {
    /// Findings from the zero-shot violence classifier, including the weapon
    /// and explicit labels it surfaces (default 0.10).
    pub violence_model: f64,
    /// Findings from the dedicated weapon detector (default 0.20).
    pub weapon_detector: f64,
    /// General violent themes such as fight or war (default 0.15).
    pub general_violence: f64,
    /// Findings from the explicit-content classifier (default 0.20).
    pub content_classifier: f64,
}

impl Default for NoiseFloors {
    fn default() -> Self {
        Self {
            violence_model: 0.10,
            weapon_detector: 0.20,
            general_violence: 0.15,
            content_classifier: 0.20,
        }
    }
}

impl NoiseFloors {
    pub fn floor_for(&self, finding: &DetectionFinding) -> f64 {
        match (finding.source, finding.category) {
            (_, Category::GeneralHazard) => self.general_violence,
            (FindingSource::WeaponDetector, _) => self.weapon_detector,
            (FindingSource::ContentClassifier, _) => self.content_classifier,
            (FindingSource::ViolenceClassifier, _) => self.violence_model,
        }
    }

    pub fn survives(&self, finding: &DetectionFinding) -> bool {
        finding.score > self.floor_for(finding)
    }
}

/// Turns detector reports into a single `AggregatedRisk`.
#[derive(Debug, Clone, Default)]
pub struct SignalAggregator {
    pub floors: NoiseFloors,
}

/// Running maximum for one category, remembering which finding set it.
#[derive(Default)]
struct Peak {
    score: f64,
    finding: Option<DetectionFinding>,
}

impl Peak {
    fn offer(&mut self, finding: &DetectionFinding) {
        if self.finding.is_none() || finding.score > self.score {
            self.score = finding.score;
            self.finding = Some(finding.clone());
        }
    }
}

impl SignalAggregator {
    pub fn new(floors: NoiseFloors) -> Self {
        Self { floors }
    }

    /// Aggregate every report. Successful detectors contribute their
    /// surviving findings; a failed detector pins its primary category to 1.0.
    pub fn aggregate(&self, reports: &[DetectorReport]) -> AggregatedRisk {
        let mut violence = Peak::default();
        let mut weapons = Peak::default();
        let mut sexual = Peak::default();
        let mut weapons_via_violence = Peak::default();
        let mut failed_detectors = Vec::new();

        for report in reports {
            let findings = match &report.outcome {
                DetectorOutcome::Success(findings) => findings,
                DetectorOutcome::Failure(err) => {
                    let synthetic = DetectionFinding::new(
                        report.source.primary_category(),
                        "detector failure",
                        1.0,
                        report.source,
                    );
                    match synthetic.category {
                        Category::Weapons => weapons.offer(&synthetic),
                        Category::SexualContent => sexual.offer(&synthetic),
                        Category::Violence | Category::GeneralHazard => violence.offer(&synthetic),
                    }
                    failed_detectors.push(FailedDetector {
                        detector: report.detector.clone(),
                        reason: err.to_string(),
                    });
                    continue;
                }
            };

            for finding in findings {
                if !self.floors.survives(finding) {
                    debug!(
                        detector = %report.detector,
                        label = %finding.label,
                        score = finding.score,
                        "Finding below noise floor"
                    );
                    continue;
                }
                match finding.category {
                    Category::Violence | Category::GeneralHazard => violence.offer(finding),
                    Category::Weapons => {
                        weapons.offer(finding);
                        if finding.source == FindingSource::ViolenceClassifier {
                            weapons_via_violence.offer(finding);
                        }
                    }
                    Category::SexualContent => sexual.offer(finding),
                }
            }
        }

        let mut contributing_findings: Vec<DetectionFinding> = Vec::new();
        for finding in [
            violence.finding,
            weapons.finding,
            sexual.finding,
            weapons_via_violence.finding,
        ]
        .into_iter()
        .flatten()
        {
            if !contributing_findings.contains(&finding) {
                contributing_findings.push(finding);
            }
        }

        AggregatedRisk {
            violence_risk: violence.score,
            weapon_risk: weapons.score,
            sexual_content_risk: sexual.score,
            weapon_risk_via_violence_model: weapons_via_violence.score,
            contributing_findings,
            failed_detectors,
        }
    }
}
