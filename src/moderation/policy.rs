// Policy engine: aggregated risk plus image characteristics into a verdict.
//
// Rules are evaluated in ordered tiers. A reject from an earlier tier is
// final: later tiers only run when nothing has rejected yet.
//
//   1. hard reject       any category above its threshold, or a failed detector
//   2. landscape         wide nature shots below the looser ceiling are admitted
//   3. combined risk     mean of the category risks above the soft threshold
//   4. default           admit
//
// `risk_score` is always the maximum category risk, whichever tier decided.

use tracing::debug;

use super::models::{AggregatedRisk, Decision, ImageCharacteristics, Tier};

/// The single threshold table for the whole engine.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyThresholds {
    /// Violence risk above this is a hard reject (default 0.4).
    pub high_violence: f64,
    /// Weapon risk above this is a hard reject (default 0.2).
    pub high_weapon: f64,
    /// Weapon labels surfaced by the violence classifier above this are a
    /// hard reject on their own (default 0.15).
    pub cross_model_weapon: f64,
    /// Sexual-content risk above this is a hard reject (default 0.4).
    pub high_sexual_content: f64,
    /// Landscape images with max(violence, weapon) below this are admitted
    /// unless tier 1 already rejected (default 0.5).
    pub landscape_ceiling: f64,
    /// Mean of the three category risks above this rejects (default 0.3).
    pub combined_risk: f64,
}

impl Default for PolicyThresholds {
    fn default() -> Self {
        Self {
            high_violence: 0.4,
            high_weapon: 0.2,
            cross_model_weapon: 0.15,
            high_sexual_content: 0.4,
            landscape_ceiling: 0.5,
            combined_risk: 0.3,
        }
    }
}

impl PolicyThresholds {
    /// Every threshold as a (name, value) pair, in evaluation order.
    pub fn entries(&self) -> [(&'static str, f64); 6] {
        [
            ("high_violence", self.high_violence),
            ("high_weapon", self.high_weapon),
            ("cross_model_weapon", self.cross_model_weapon),
            ("high_sexual_content", self.high_sexual_content),
            ("landscape_ceiling", self.landscape_ceiling),
            ("combined_risk", self.combined_risk),
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct PolicyEngine {
    pub thresholds: PolicyThresholds,
}

impl PolicyEngine {
    pub fn new(thresholds: PolicyThresholds) -> Self {
        Self { thresholds }
    }

    /// Evaluate the tiers in order and return the decision.
    pub fn evaluate(&self, risk: &AggregatedRisk, image: &ImageCharacteristics) -> Decision {
        let t = &self.thresholds;

        let reasons = self.hard_reject_reasons(risk);
        if !reasons.is_empty() {
            debug!(reasons = reasons.len(), "Hard-reject tier triggered");
            return Decision::reject(risk.clone(), reasons, Tier::HardReject);
        }

        if image.is_landscape && risk.violence_risk.max(risk.weapon_risk) < t.landscape_ceiling {
            debug!(
                aspect_ratio = image.aspect_ratio,
                "Landscape exception applied"
            );
            return Decision::admit(risk.clone(), Tier::LandscapeException);
        }

        let combined = combined_risk(risk);
        if combined > t.combined_risk {
            return Decision::reject(
                risk.clone(),
                vec![format!(
                    "combined risk {:.2} exceeds {:.2}",
                    combined, t.combined_risk
                )],
                Tier::CombinedRisk,
            );
        }

        Decision::admit(risk.clone(), Tier::Default)
    }

    /// Every tier-1 condition that holds, one reason each.
    fn hard_reject_reasons(&self, risk: &AggregatedRisk) -> Vec<String> {
        let t = &self.thresholds;
        let mut reasons = Vec::new();

        if risk.violence_risk > t.high_violence {
            reasons.push(format!(
                "violence risk {:.2} exceeds {:.2}",
                risk.violence_risk, t.high_violence
            ));
        }
        if risk.weapon_risk > t.high_weapon {
            reasons.push(format!(
                "weapon risk {:.2} exceeds {:.2}",
                risk.weapon_risk, t.high_weapon
            ));
        }
        if risk.weapon_risk_via_violence_model > t.cross_model_weapon {
            reasons.push(format!(
                "weapon signal from violence classifier {:.2} exceeds {:.2}",
                risk.weapon_risk_via_violence_model, t.cross_model_weapon
            ));
        }
        if risk.sexual_content_risk > t.high_sexual_content {
            reasons.push(format!(
                "sexual content risk {:.2} exceeds {:.2}",
                risk.sexual_content_risk, t.high_sexual_content
            ));
        }
        for failed in &risk.failed_detectors {
            reasons.push(format!("detector {} unavailable", failed.detector));
        }

        reasons
    }
}

/// Mean of the three category risks.
fn combined_risk(risk: &AggregatedRisk) -> f64 {
    (risk.violence_risk + risk.weapon_risk + risk.sexual_content_risk) / 3.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn risk(violence: f64, weapon: f64) -> AggregatedRisk {
        AggregatedRisk {
            violence_risk: violence,
            weapon_risk: weapon,
            ..Default::default()
        }
    }

    fn landscape() -> ImageCharacteristics {
        ImageCharacteristics {
            width: 1600,
            height: 900,
            aspect_ratio: 1600.0 / 900.0,
            color_variance: 1200.0,
            is_landscape: true,
            is_portrait: false,
        }
    }

    #[test]
    fn test_clean_image_admitted_by_default_tier() {
        let engine = PolicyEngine::default();
        let d = engine.evaluate(&risk(0.1, 0.05), &ImageCharacteristics::default());
        assert!(d.is_admitted);
        assert_eq!(d.decided_by, Tier::Default);
        assert!(d.reasons.is_empty());
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let engine = PolicyEngine::default();
        let d = engine.evaluate(&risk(0.4, 0.2), &ImageCharacteristics::default());
        // Exactly at both thresholds: not a hard reject. Mean is 0.2, below 0.3.
        assert!(d.is_admitted, "reasons: {:?}", d.reasons);
    }

    #[test]
    fn test_landscape_suppresses_combined_risk() {
        let engine = PolicyEngine::default();
        let r = AggregatedRisk {
            violence_risk: 0.4,
            weapon_risk: 0.2,
            sexual_content_risk: 0.4,
            ..Default::default()
        };
        // Mean 0.333 rejects a regular image...
        let d = engine.evaluate(&r, &ImageCharacteristics::default());
        assert!(!d.is_admitted);
        assert_eq!(d.decided_by, Tier::CombinedRisk);
        // ...but a landscape below the ceiling is admitted.
        let d = engine.evaluate(&r, &landscape());
        assert!(d.is_admitted);
        assert_eq!(d.decided_by, Tier::LandscapeException);
    }

    #[test]
    fn test_risk_score_reported_on_admit_and_reject() {
        let engine = PolicyEngine::default();
        let d = engine.evaluate(&risk(0.3, 0.0), &landscape());
        assert!(d.is_admitted);
        assert!((d.risk_score - 0.3).abs() < 1e-10);

        let d = engine.evaluate(&risk(0.9, 0.0), &landscape());
        assert!(!d.is_admitted);
        assert!((d.risk_score - 0.9).abs() < 1e-10);
    }

    #[test]
    fn test_threshold_entries_in_order() {
        let names: Vec<&str> = PolicyThresholds::default()
            .entries()
            .iter()
            .map(|(n, _)| *n)
            .collect();
        assert_eq!(names[0], "high_violence");
        assert_eq!(names[5], "combined_risk");
    }
}
