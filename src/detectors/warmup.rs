// Background model warm-up.
//
// Loading the ONNX sessions takes seconds, so `serve` starts listening
// immediately and loads models in a background task. Until the detector set
// is installed every request gets the fail-closed decision.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::clip::ClipViolenceDetector;
use super::nsfw::NsfwDetector;
use super::traits::{Detector, UnavailableDetector};
use super::yolo::YoloWeaponDetector;
use crate::moderation::models::FindingSource;
use crate::moderation::orchestrator::Orchestrator;
use crate::moderation::readiness::WarmupState;

/// The configured detector set. Models that failed to load are present as
/// `UnavailableDetector` placeholders so every request still gets one
/// outcome per configured detector.
pub struct DetectorSet {
    pub detectors: Vec<Arc<dyn Detector>>,
    /// How many real models loaded.
    pub loaded: usize,
}

fn load_or_placeholder<D, F>(name: &str, source: FindingSource, load: F) -> (Arc<dyn Detector>, bool)
where
    D: Detector + 'static,
    F: FnOnce() -> Result<D>,
{
    let started = Instant::now();
    match load() {
        Ok(detector) => {
            info!(
                detector = name,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Model loaded"
            );
            (Arc::new(detector), true)
        }
        Err(e) => {
            warn!(detector = name, error = %format!("{e:#}"), "Model failed to load");
            (
                Arc::new(UnavailableDetector::new(name, source, format!("{e:#}"))),
                false,
            )
        }
    }
}

/// Load every detector model from `model_dir`. Blocking: call from
/// `spawn_blocking` or a synchronous context.
pub fn load_detectors(model_dir: &Path) -> DetectorSet {
    let loaders = [
        load_or_placeholder("clip-violence", FindingSource::ViolenceClassifier, || {
            ClipViolenceDetector::load(model_dir)
        }),
        load_or_placeholder("yolo-weapons", FindingSource::WeaponDetector, || {
            YoloWeaponDetector::load(model_dir)
        }),
        load_or_placeholder("nsfw-vit", FindingSource::ContentClassifier, || {
            NsfwDetector::load(model_dir)
        }),
    ];

    let loaded = loaders.iter().filter(|(_, ok)| *ok).count();
    DetectorSet {
        detectors: loaders.into_iter().map(|(d, _)| d).collect(),
        loaded,
    }
}

/// Launch warm-up in a background task. Returns None if a warm-up was
/// already started for this orchestrator.
pub fn launch_warmup(model_dir: PathBuf, orchestrator: Orchestrator) -> Option<JoinHandle<()>> {
    if !orchestrator.readiness().begin_warmup() {
        return None;
    }

    Some(tokio::spawn(async move {
        info!(model_dir = %model_dir.display(), "Loading detector models in background");
        let started = Instant::now();

        match tokio::task::spawn_blocking(move || load_detectors(&model_dir)).await {
            Ok(set) if set.loaded > 0 => {
                info!(
                    loaded = set.loaded,
                    configured = set.detectors.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Warm-up complete"
                );
                orchestrator.install(set.detectors).await;
            }
            Ok(_) => {
                error!("No detector model could be loaded; requests will fail closed");
                orchestrator.readiness().set(WarmupState::Failed);
            }
            Err(e) => {
                error!(error = %e, "Warm-up task panicked; requests will fail closed");
                orchestrator.readiness().set(WarmupState::Failed);
            }
        }
    }))
}
