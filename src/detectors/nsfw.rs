// Explicit-content classifier using a ViT image classification model.
//
// Labels come from the model's own config.json (`id2label`) so the detector
// works with any of the common NSFW checkpoints: two-class (sfw/nsfw,
// normal/nsfw) or five-class (drawings, hentai, neutral, porn, sexy).

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use ort::session::Session;
use ort::value::Tensor;
use serde::Deserialize;
use tracing::debug;

use super::download::{nsfw_dir, LABELS_FILE, MODEL_FILE};
use super::onnx::{load_session, lock_for_caller, open_rgb, softmax, to_chw, CallerGuard};
use super::traits::Detector;
use crate::moderation::models::{Category, DetectionFinding, FindingSource};

const IMAGE_SIZE: u32 = 224;
const VIT_MEAN: [f32; 3] = [0.5; 3];
const VIT_STD: [f32; 3] = [0.5; 3];

/// Labels that count as explicit. Matched case-insensitively as substrings.
const FLAGGED_LABELS: [&str; 4] = ["nsfw", "porn", "hentai", "sexy"];

#[derive(Deserialize)]
struct ModelConfig {
    id2label: HashMap<String, String>,
}

/// Parse `id2label` from a HuggingFace config.json into index order.
pub fn parse_labels(config_json: &str) -> Result<Vec<String>> {
    let config: ModelConfig =
        serde_json::from_str(config_json).context("Failed to parse model config.json")?;

    let mut indexed = config
        .id2label
        .into_iter()
        .map(|(id, label)| {
            id.parse::<usize>()
                .map(|i| (i, label))
                .with_context(|| format!("Non-numeric label id {id:?}"))
        })
        .collect::<Result<Vec<_>>>()?;
    indexed.sort_by_key(|(i, _)| *i);

    for (pos, (i, _)) in indexed.iter().enumerate() {
        if pos != *i {
            anyhow::bail!("Label ids are not contiguous: missing id {pos}");
        }
    }

    Ok(indexed.into_iter().map(|(_, label)| label).collect())
}

pub fn is_flagged(label: &str) -> bool {
    let label = label.to_lowercase();
    FLAGGED_LABELS.iter().any(|f| label.contains(f))
}

/// One finding per flagged label, carrying its probability.
pub fn findings_from_probs(labels: &[String], probs: &[f64]) -> Vec<DetectionFinding> {
    labels
        .iter()
        .zip(probs)
        .filter(|(label, _)| is_flagged(label))
        .map(|(label, &p)| {
            DetectionFinding::new(
                Category::SexualContent,
                label.as_str(),
                p,
                FindingSource::ContentClassifier,
            )
        })
        .collect()
}

/// Softmax raw classifier logits and keep the flagged labels. Malformed
/// output is an error, never an empty list.
pub fn findings_from_logits(labels: &[String], logits: &[f32]) -> Result<Vec<DetectionFinding>> {
    if logits.len() != labels.len() {
        anyhow::bail!(
            "Classifier returned {} logits for {} labels",
            logits.len(),
            labels.len()
        );
    }
    let probs = softmax(logits).context("Explicit-content output unusable")?;
    Ok(findings_from_probs(labels, &probs))
}

pub struct NsfwDetector {
    session: Arc<Mutex<Session>>,
    labels: Arc<Vec<String>>,
}

impl NsfwDetector {
    pub fn load(model_dir: &Path) -> Result<Self> {
        let dir = nsfw_dir(model_dir);
        let session = load_session(&dir.join(MODEL_FILE))?;

        let config_path = dir.join(LABELS_FILE);
        let config = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let labels = parse_labels(&config)?;
        if !labels.iter().any(|l| is_flagged(l)) {
            anyhow::bail!("Model labels {labels:?} contain no explicit-content class");
        }

        debug!(labels = ?labels, "Loaded explicit-content classifier from {}", dir.display());

        Ok(Self {
            session,
            labels: Arc::new(labels),
        })
    }
}

#[async_trait]
impl Detector for NsfwDetector {
    fn name(&self) -> &str {
        "nsfw-vit"
    }

    fn source(&self) -> FindingSource {
        FindingSource::ContentClassifier
    }

    async fn findings(&self, image: &Path) -> Result<Vec<DetectionFinding>> {
        let session = Arc::clone(&self.session);
        let labels = Arc::clone(&self.labels);
        let image = image.to_path_buf();
        let caller = CallerGuard::new();
        let watch = caller.watch();

        let result = tokio::task::spawn_blocking(move || {
            let img = open_rgb(&image)?;
            let pixels = to_chw(&img, IMAGE_SIZE, VIT_MEAN, VIT_STD);
            let shape = [1, 3, IMAGE_SIZE as i64, IMAGE_SIZE as i64];
            let input = Tensor::from_array((shape, pixels))
                .context("Failed to create pixel_values tensor")?;

            let logits = {
                let mut session = lock_for_caller(&*session, &watch)?;

                let outputs = session
                    .run(ort::inputs! { "pixel_values" => input })
                    .context("Explicit-content inference failed")?;

                let (_shape, data) = outputs[0]
                    .try_extract_tensor::<f32>()
                    .context("Failed to extract logits")?;
                data.to_vec()
            };

            findings_from_logits(&labels, &logits)
        })
        .await
        .context("spawn_blocking panicked")?;
        drop(caller);
        result
    }
}
