// Composition tests: the full moderation pipeline with fake detectors.
//
// These tests exercise the data flow between modules:
//   Orchestrator -> SignalAggregator -> PolicyEngine
// using scripted Detector implementations and real image files written to
// a temp directory. No models are loaded.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;

use lookout::detectors::traits::{Detector, UnavailableDetector};
use lookout::moderation::aggregate::SignalAggregator;
use lookout::moderation::models::{Category, DetectionFinding, FindingSource, Tier};
use lookout::moderation::orchestrator::Orchestrator;
use lookout::moderation::policy::PolicyEngine;
use lookout::moderation::readiness::{Readiness, WarmupState};
use lookout::moderation::service::ModerationService;

// ============================================================
// Fixtures
// ============================================================

enum Behavior {
    Findings(Vec<(Category, &'static str, f64)>),
    Error(&'static str),
    Panic,
    Sleep(Duration),
}

struct ScriptedDetector {
    name: &'static str,
    source: FindingSource,
    behavior: Behavior,
    calls: Arc<AtomicUsize>,
}

impl ScriptedDetector {
    fn new(name: &'static str, source: FindingSource, behavior: Behavior) -> Self {
        Self {
            name,
            source,
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Detector for ScriptedDetector {
    fn name(&self) -> &str {
        self.name
    }

    fn source(&self) -> FindingSource {
        self.source
    }

    async fn findings(&self, _image: &Path) -> Result<Vec<DetectionFinding>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Findings(items) => Ok(items
                .iter()
                .map(|&(category, label, score)| {
                    DetectionFinding::new(category, label, score, self.source)
                })
                .collect()),
            Behavior::Error(msg) => anyhow::bail!("{msg}"),
            Behavior::Panic => panic!("detector blew up"),
            Behavior::Sleep(d) => {
                tokio::time::sleep(*d).await;
                Ok(Vec::new())
            }
        }
    }
}

fn clip(behavior: Behavior) -> Arc<dyn Detector> {
    Arc::new(ScriptedDetector::new(
        "clip-violence",
        FindingSource::ViolenceClassifier,
        behavior,
    ))
}

fn yolo(behavior: Behavior) -> Arc<dyn Detector> {
    Arc::new(ScriptedDetector::new(
        "yolo-weapons",
        FindingSource::WeaponDetector,
        behavior,
    ))
}

fn nsfw(behavior: Behavior) -> Arc<dyn Detector> {
    Arc::new(ScriptedDetector::new(
        "nsfw-vit",
        FindingSource::ContentClassifier,
        behavior,
    ))
}

fn clean() -> Behavior {
    Behavior::Findings(Vec::new())
}

fn service(detectors: Vec<Arc<dyn Detector>>, timeout: Option<Duration>) -> ModerationService {
    ModerationService::new(
        Orchestrator::with_detectors(detectors, timeout),
        SignalAggregator::default(),
        PolicyEngine::default(),
    )
}

/// Write a black/white striped PNG. Stripes keep the color variance high.
fn write_image(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let img = image::RgbImage::from_fn(width, height, |x, _| {
        if (x / 8) % 2 == 0 {
            image::Rgb([0, 0, 0])
        } else {
            image::Rgb([255, 255, 255])
        }
    });
    let path = dir.join(name);
    img.save(&path).unwrap();
    path
}

// ============================================================
// Happy path
// ============================================================

#[tokio::test]
async fn clean_image_is_admitted() {
    let dir = tempfile::tempdir().unwrap();
    let image = write_image(dir.path(), "square.png", 64, 64);

    let svc = service(vec![clip(clean()), yolo(clean()), nsfw(clean())], None);
    let report = svc.moderate(&image).await;

    assert!(report.decision.is_admitted);
    assert_eq!(report.decision.decided_by, Tier::Default);
    assert_eq!(report.reports.len(), 3);
    let c = report.characteristics.expect("characteristics computed");
    assert_eq!((c.width, c.height), (64, 64));
}

#[tokio::test]
async fn violent_image_is_rejected_with_reason() {
    let dir = tempfile::tempdir().unwrap();
    let image = write_image(dir.path(), "square.png", 64, 64);

    let svc = service(
        vec![
            clip(Behavior::Findings(vec![(Category::Violence, "blood", 0.7)])),
            yolo(clean()),
            nsfw(clean()),
        ],
        None,
    );
    let report = svc.moderate(&image).await;

    assert!(!report.decision.is_admitted);
    assert!((report.decision.risk_score - 0.7).abs() < 1e-9);
    assert!(report.decision.reasons[0].starts_with("violence risk 0.70"));
}

#[tokio::test]
async fn real_landscape_gets_exception() {
    let dir = tempfile::tempdir().unwrap();

    // Every signal sits at, not above, its hard threshold. The mean of the
    // three categories (0.317) is over the combined-risk threshold.
    let detectors = || {
        vec![
            clip(Behavior::Findings(vec![
                (Category::Violence, "bloody scene", 0.40),
                (Category::Weapons, "knife", 0.15),
            ])),
            yolo(clean()),
            nsfw(Behavior::Findings(vec![(Category::SexualContent, "nsfw", 0.40)])),
        ]
    };

    let wide_image = write_image(dir.path(), "wide.png", 1600, 900);
    let wide = service(detectors(), None).moderate(&wide_image).await;
    assert!(wide.characteristics.as_ref().unwrap().is_landscape);
    assert!(wide.decision.is_admitted);
    assert_eq!(wide.decision.decided_by, Tier::LandscapeException);

    // Same signals on a square image fall through to the combined-risk tier.
    let square_image = write_image(dir.path(), "square.png", 600, 600);
    let square = service(detectors(), None).moderate(&square_image).await;
    assert!(!square.characteristics.as_ref().unwrap().is_landscape);
    assert!(!square.decision.is_admitted);
    assert_eq!(square.decision.decided_by, Tier::CombinedRisk);
}

// ============================================================
// Fail-closed paths
// ============================================================

#[tokio::test]
async fn not_ready_fails_closed_without_running_detectors() {
    let dir = tempfile::tempdir().unwrap();
    let image = write_image(dir.path(), "square.png", 32, 32);

    let detector = ScriptedDetector::new("clip-violence", FindingSource::ViolenceClassifier, clean());
    let calls = Arc::clone(&detector.calls);

    let orchestrator = Orchestrator::new(Readiness::new(), None);
    let svc = ModerationService::new(
        orchestrator.clone(),
        SignalAggregator::default(),
        PolicyEngine::default(),
    );

    let report = svc.moderate(&image).await;
    assert!(!report.decision.is_admitted);
    assert_eq!(report.decision.risk_score, 1.0);
    assert_eq!(report.decision.reasons, vec!["models unavailable".to_string()]);
    assert_eq!(report.decision.decided_by, Tier::FailClosed);
    assert!(report.characteristics.is_none());

    // Warm-up finishing flips the same service to normal operation.
    orchestrator.install(vec![Arc::new(detector)]).await;
    let report = svc.moderate(&image).await;
    assert!(report.decision.is_admitted);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_warmup_keeps_failing_closed() {
    let dir = tempfile::tempdir().unwrap();
    let image = write_image(dir.path(), "square.png", 32, 32);

    let readiness = Readiness::new();
    readiness.set(WarmupState::Failed);
    let svc = ModerationService::new(
        Orchestrator::new(readiness, None),
        SignalAggregator::default(),
        PolicyEngine::default(),
    );
    let report = svc.moderate(&image).await;
    assert!(!report.decision.is_admitted);
    assert_eq!(report.decision.reasons, vec!["models unavailable".to_string()]);
}

#[tokio::test]
async fn all_detectors_failing_fails_closed() {
    let dir = tempfile::tempdir().unwrap();
    let image = write_image(dir.path(), "square.png", 32, 32);

    let svc = service(
        vec![
            clip(Behavior::Error("bad tensor")),
            yolo(Behavior::Panic),
            Arc::new(UnavailableDetector::new(
                "nsfw-vit",
                FindingSource::ContentClassifier,
                "model file not found",
            )),
        ],
        None,
    );
    let report = svc.moderate(&image).await;
    assert!(!report.decision.is_admitted);
    assert_eq!(report.decision.risk_score, 1.0);
    assert_eq!(report.decision.reasons, vec!["models unavailable".to_string()]);
    assert_eq!(report.reports.len(), 3);
    assert!(report.reports.iter().all(|r| r.outcome.is_failure()));
}

#[tokio::test]
async fn missing_image_fails_closed_with_path() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.png");

    let svc = service(vec![clip(clean()), yolo(clean()), nsfw(clean())], None);
    let report = svc.moderate(&missing).await;

    assert!(!report.decision.is_admitted);
    assert_eq!(report.decision.risk_score, 1.0);
    assert_eq!(
        report.decision.reasons,
        vec![format!("image not found: {}", missing.display())]
    );
}

#[tokio::test]
async fn empty_detector_set_fails_closed() {
    let dir = tempfile::tempdir().unwrap();
    let image = write_image(dir.path(), "square.png", 32, 32);

    let report = service(Vec::new(), None).moderate(&image).await;
    assert!(!report.decision.is_admitted);
    assert_eq!(report.decision.reasons, vec!["models unavailable".to_string()]);
}

// ============================================================
// Partial failure
// ============================================================

#[tokio::test]
async fn one_failed_detector_rejects_even_a_clean_image() {
    let dir = tempfile::tempdir().unwrap();
    let image = write_image(dir.path(), "wide.png", 1600, 900);

    let svc = service(
        vec![clip(clean()), yolo(Behavior::Error("session poisoned")), nsfw(clean())],
        None,
    );
    let report = svc.moderate(&image).await;

    assert!(!report.decision.is_admitted);
    assert_eq!(report.decision.decided_by, Tier::HardReject);
    assert_eq!(report.decision.risk_score, 1.0);
    assert!(report
        .decision
        .reasons
        .contains(&"detector yolo-weapons unavailable".to_string()));
}

#[tokio::test]
async fn panicking_detector_becomes_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    let image = write_image(dir.path(), "square.png", 32, 32);

    let svc = service(vec![clip(clean()), yolo(clean()), nsfw(Behavior::Panic)], None);
    let report = svc.moderate(&image).await;

    assert!(!report.decision.is_admitted);
    let failed = &report.decision.category_breakdown.failed_detectors;
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].detector, "nsfw-vit");
    assert_eq!(report.decision.category_breakdown.sexual_content_risk, 1.0);
}

#[tokio::test]
async fn slow_detector_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let image = write_image(dir.path(), "square.png", 32, 32);

    let svc = service(
        vec![
            clip(clean()),
            yolo(Behavior::Sleep(Duration::from_secs(10))),
            nsfw(clean()),
        ],
        Some(Duration::from_millis(200)),
    );

    let started = Instant::now();
    let report = svc.moderate(&image).await;
    assert!(started.elapsed() < Duration::from_secs(5));

    assert!(!report.decision.is_admitted);
    let failed = &report.decision.category_breakdown.failed_detectors;
    assert_eq!(failed.len(), 1);
    assert!(failed[0].reason.contains("timed out"), "{}", failed[0].reason);
}

// ============================================================
// Concurrency
// ============================================================

#[tokio::test]
async fn detectors_run_concurrently() {
    let dir = tempfile::tempdir().unwrap();
    let image = write_image(dir.path(), "square.png", 32, 32);

    let delay = Duration::from_millis(400);
    let svc = service(
        vec![
            clip(Behavior::Sleep(delay)),
            yolo(Behavior::Sleep(delay)),
            nsfw(Behavior::Sleep(delay)),
        ],
        None,
    );

    let started = Instant::now();
    let report = svc.moderate(&image).await;
    let elapsed = started.elapsed();

    assert!(report.decision.is_admitted);
    // Sequential execution would take at least 1.2s.
    assert!(elapsed < Duration::from_millis(1100), "took {elapsed:?}");
}

#[tokio::test]
async fn concurrent_requests_do_not_interfere() {
    let dir = tempfile::tempdir().unwrap();
    let clean_image = write_image(dir.path(), "a.png", 32, 32);
    let missing = dir.path().join("missing.png");

    let svc = service(vec![clip(clean()), yolo(clean()), nsfw(clean())], None);

    let mut handles = Vec::new();
    for i in 0..16 {
        let svc = svc.clone();
        let path = if i % 2 == 0 {
            clean_image.clone()
        } else {
            missing.clone()
        };
        handles.push(tokio::spawn(async move { (i, svc.moderate(&path).await) }));
    }

    for handle in handles {
        let (i, report) = handle.await.unwrap();
        assert_eq!(report.decision.is_admitted, i % 2 == 0, "request {i}");
    }
}
