// Policy engine tests: tier ordering, reasons, and the fail-closed contract.
//
// Everything here drives PolicyEngine::evaluate directly with hand-built
// AggregatedRisk values. No detectors, no filesystem.

use lookout::moderation::error::ModerationError;
use lookout::moderation::models::{
    AggregatedRisk, Decision, FailedDetector, ImageCharacteristics, Tier,
};
use lookout::moderation::policy::{PolicyEngine, PolicyThresholds};

fn engine() -> PolicyEngine {
    PolicyEngine::new(PolicyThresholds::default())
}

fn risk(violence: f64, weapon: f64) -> AggregatedRisk {
    AggregatedRisk {
        violence_risk: violence,
        weapon_risk: weapon,
        ..Default::default()
    }
}

fn plain() -> ImageCharacteristics {
    ImageCharacteristics {
        width: 800,
        height: 800,
        aspect_ratio: 1.0,
        color_variance: 900.0,
        is_landscape: false,
        is_portrait: false,
    }
}

fn landscape() -> ImageCharacteristics {
    ImageCharacteristics {
        width: 1920,
        height: 1080,
        aspect_ratio: 1920.0 / 1080.0,
        color_variance: 2400.0,
        is_landscape: true,
        is_portrait: false,
    }
}

// ============================================================
// Worked scenarios
// ============================================================

#[test]
fn low_risk_plain_image_is_admitted() {
    let d = engine().evaluate(&risk(0.1, 0.05), &plain());
    assert!(d.is_admitted);
    assert!((d.risk_score - 0.1).abs() < 1e-9);
    assert!(d.reasons.is_empty());
    assert_eq!(d.decided_by, Tier::Default);
}

#[test]
fn high_violence_is_rejected_with_violence_reason() {
    let d = engine().evaluate(&risk(0.5, 0.0), &plain());
    assert!(!d.is_admitted);
    assert_eq!(d.decided_by, Tier::HardReject);
    assert_eq!(d.reasons.len(), 1);
    assert!(d.reasons[0].contains("violence"));
    assert!(d.reasons[0].contains("0.50"));
}

#[test]
fn landscape_does_not_rescue_violence_above_hard_threshold() {
    // 0.45 is under the landscape ceiling but over the tier-1 violence threshold.
    let d = engine().evaluate(&risk(0.45, 0.0), &landscape());
    assert!(!d.is_admitted);
    assert_eq!(d.decided_by, Tier::HardReject);
}

#[test]
fn landscape_does_not_rescue_weapon_above_hard_threshold() {
    let d = engine().evaluate(&risk(0.0, 0.25), &landscape());
    assert!(!d.is_admitted);
    assert_eq!(d.decided_by, Tier::HardReject);
    assert!(d.reasons.iter().any(|r| r.contains("weapon risk")));
}

#[test]
fn landscape_admits_moderate_combined_risk() {
    // Every category under its hard threshold, mean 0.313.
    let r = AggregatedRisk {
        violence_risk: 0.38,
        weapon_risk: 0.18,
        sexual_content_risk: 0.38,
        ..Default::default()
    };
    let on_plain = engine().evaluate(&r, &plain());
    assert!(!on_plain.is_admitted);
    assert_eq!(on_plain.decided_by, Tier::CombinedRisk);

    let on_landscape = engine().evaluate(&r, &landscape());
    assert!(on_landscape.is_admitted);
    assert_eq!(on_landscape.decided_by, Tier::LandscapeException);
}

// ============================================================
// Reason completeness
// ============================================================

#[test]
fn every_triggered_condition_gets_its_own_reason() {
    let r = AggregatedRisk {
        violence_risk: 0.9,
        weapon_risk: 0.7,
        sexual_content_risk: 0.8,
        weapon_risk_via_violence_model: 0.6,
        ..Default::default()
    };
    let d = engine().evaluate(&r, &plain());
    assert!(!d.is_admitted);
    assert_eq!(d.reasons.len(), 4, "reasons: {:?}", d.reasons);
    assert!(d.reasons.iter().any(|x| x.starts_with("violence risk")));
    assert!(d.reasons.iter().any(|x| x.starts_with("weapon risk")));
    assert!(d.reasons.iter().any(|x| x.starts_with("weapon signal from violence classifier")));
    assert!(d.reasons.iter().any(|x| x.starts_with("sexual content risk")));
}

#[test]
fn two_simultaneous_thresholds_give_two_reasons() {
    let d = engine().evaluate(&risk(0.5, 0.3), &plain());
    assert_eq!(d.reasons.len(), 2);
}

#[test]
fn failed_detector_adds_a_reason() {
    let r = AggregatedRisk {
        weapon_risk: 1.0,
        failed_detectors: vec![FailedDetector {
            detector: "yolo-weapons".to_string(),
            reason: "timed out".to_string(),
        }],
        ..Default::default()
    };
    let d = engine().evaluate(&r, &landscape());
    assert!(!d.is_admitted);
    assert!(d
        .reasons
        .iter()
        .any(|x| x == "detector yolo-weapons unavailable"));
}

#[test]
fn cross_model_weapon_signal_rejects_alone() {
    let r = AggregatedRisk {
        weapon_risk: 0.16,
        weapon_risk_via_violence_model: 0.16,
        ..Default::default()
    };
    let d = engine().evaluate(&r, &plain());
    assert!(!d.is_admitted);
    assert_eq!(d.reasons.len(), 1);
}

// ============================================================
// Invariants
// ============================================================

#[test]
fn admitted_iff_no_reasons() {
    let grid = [0.0, 0.1, 0.2, 0.3, 0.45, 0.6, 1.0];
    for &v in &grid {
        for &w in &grid {
            for &s in &grid {
                for image in [plain(), landscape()] {
                    let r = AggregatedRisk {
                        violence_risk: v,
                        weapon_risk: w,
                        sexual_content_risk: s,
                        ..Default::default()
                    };
                    let d = engine().evaluate(&r, &image);
                    assert_eq!(d.is_admitted, d.reasons.is_empty(), "{v} {w} {s}");
                    assert!((0.0..=1.0).contains(&d.risk_score));
                    assert!((d.risk_score - v.max(w).max(s)).abs() < 1e-12);
                }
            }
        }
    }
}

#[test]
fn raising_any_category_never_flips_reject_to_admit() {
    let steps: Vec<f64> = (0..=20).map(|i| i as f64 / 20.0).collect();
    let e = engine();

    for image in [plain(), landscape()] {
        for &v in &steps {
            for &w in &steps {
                for &s in &steps {
                    let base = AggregatedRisk {
                        violence_risk: v,
                        weapon_risk: w,
                        sexual_content_risk: s,
                        ..Default::default()
                    };
                    if e.evaluate(&base, &image).is_admitted {
                        continue;
                    }
                    let bumps = [
                        AggregatedRisk {
                            violence_risk: (v + 0.05).min(1.0),
                            ..base.clone()
                        },
                        AggregatedRisk {
                            weapon_risk: (w + 0.05).min(1.0),
                            ..base.clone()
                        },
                        AggregatedRisk {
                            sexual_content_risk: (s + 0.05).min(1.0),
                            ..base.clone()
                        },
                    ];
                    for bumped in &bumps {
                        assert!(
                            !e.evaluate(bumped, &image).is_admitted,
                            "reject flipped to admit: {base:?} -> {bumped:?}"
                        );
                    }
                }
            }
        }
    }
}

#[test]
fn evaluation_is_idempotent() {
    let r = AggregatedRisk {
        violence_risk: 0.33,
        weapon_risk: 0.12,
        sexual_content_risk: 0.47,
        ..Default::default()
    };
    let a = serde_json::to_string(&engine().evaluate(&r, &plain())).unwrap();
    let b = serde_json::to_string(&engine().evaluate(&r, &plain())).unwrap();
    assert_eq!(a, b);
}

// ============================================================
// Fail-closed decision
// ============================================================

#[test]
fn fail_closed_decision_rejects_at_max_risk() {
    for cause in [
        ModerationError::ModelsNotReady,
        ModerationError::AllDetectorsFailed,
    ] {
        let d = Decision::fail_closed(&cause);
        assert!(!d.is_admitted);
        assert_eq!(d.risk_score, 1.0);
        assert_eq!(d.reasons, vec!["models unavailable".to_string()]);
        assert_eq!(d.decided_by, Tier::FailClosed);
    }
}

#[test]
fn fail_closed_for_missing_input_names_the_path() {
    let d = Decision::fail_closed(&ModerationError::InputNotFound("/no/such.png".into()));
    assert!(!d.is_admitted);
    assert_eq!(d.reasons, vec!["image not found: /no/such.png".to_string()]);
}

#[test]
fn stricter_thresholds_reject_more() {
    let strict = PolicyEngine::new(PolicyThresholds {
        high_violence: 0.2,
        ..PolicyThresholds::default()
    });
    let r = risk(0.3, 0.0);
    assert!(engine().evaluate(&r, &plain()).is_admitted);
    assert!(!strict.evaluate(&r, &plain()).is_admitted);
}
