// Zero-shot violence classifier using CLIP ViT-B/32.
//
// The image is scored against a fixed set of text prompts in one forward
// pass. Softmax over the prompts gives each label a probability; labels
// that map to a risk category become findings, benign labels are dropped.
// The same label stream also surfaces weapons and explicit content, which
// the aggregator tracks as a separate corroborating signal.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tracing::debug;

use super::download::{clip_dir, MODEL_FILE, TOKENIZER_FILE};
use super::onnx::{load_session, lock_for_caller, open_rgb, softmax, to_chw, CallerGuard};
use super::traits::Detector;
use crate::moderation::models::{Category, DetectionFinding, FindingSource};

/// Prompts scored against every image. Benign labels absorb probability
/// mass from ordinary photos so the risky labels are not inflated.
pub const CANDIDATE_LABELS: [&str; 28] = [
    "blood",
    "gore",
    "injured person",
    "bloody scene",
    "violence",
    "gun",
    "knife",
    "weapon",
    "firearm",
    "pistol",
    "rifle",
    "porn",
    "sexual content",
    "explicit content",
    "nudity",
    "fight",
    "battle",
    "war",
    "horror",
    "terror",
    "landscape",
    "peaceful image",
    "normal scene",
    "safe content",
    "person smiling",
    "everyday life",
    "nature",
    "building",
];

const WEAPON_KEYWORDS: [&str; 6] = ["gun", "knife", "weapon", "firearm", "pistol", "rifle"];
const SEXUAL_KEYWORDS: [&str; 4] = ["porn", "sexual", "explicit", "nudity"];
const GRAPHIC_KEYWORDS: [&str; 4] = ["blood", "gore", "injured", "bloody"];
const GENERAL_KEYWORDS: [&str; 6] = ["fight", "battle", "war", "horror", "terror", "violence"];

const PROMPT_TEMPLATE: &str = "This is a photo of {}.";
const IMAGE_SIZE: u32 = 224;
const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_11];
/// CLIP pads with its end-of-text token.
const PAD_ID: i64 = 49407;

/// Map a candidate label to its risk category. Benign labels map to None.
pub fn classify_label(label: &str) -> Option<Category> {
    let label = label.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| label.contains(w));

    if has(&WEAPON_KEYWORDS) {
        Some(Category::Weapons)
    } else if has(&SEXUAL_KEYWORDS) {
        Some(Category::SexualContent)
    } else if has(&GRAPHIC_KEYWORDS) {
        Some(Category::Violence)
    } else if has(&GENERAL_KEYWORDS) {
        Some(Category::GeneralHazard)
    } else {
        None
    }
}

/// Turn per-label probabilities (same order as `labels`) into findings.
pub fn findings_from_scores(labels: &[&str], scores: &[f64]) -> Vec<DetectionFinding> {
    labels
        .iter()
        .zip(scores)
        .filter_map(|(label, &score)| {
            classify_label(label).map(|category| {
                DetectionFinding::new(category, *label, score, FindingSource::ViolenceClassifier)
            })
        })
        .collect()
}

/// Softmax raw `logits_per_image` over the candidate prompts and turn the
/// result into findings. Malformed output is an error, never an empty list.
pub fn findings_from_logits(logits: &[f32]) -> Result<Vec<DetectionFinding>> {
    if logits.len() != CANDIDATE_LABELS.len() {
        anyhow::bail!(
            "CLIP returned {} logits for {} labels",
            logits.len(),
            CANDIDATE_LABELS.len()
        );
    }
    let scores = softmax(logits).context("CLIP output unusable")?;
    Ok(findings_from_scores(&CANDIDATE_LABELS, &scores))
}

pub struct ClipViolenceDetector {
    session: Arc<Mutex<Session>>,
    /// Tokenized prompts, right-padded to `seq_len`. Shape [labels, seq_len].
    input_ids: Arc<Vec<i64>>,
    attention_mask: Arc<Vec<i64>>,
    seq_len: usize,
}

impl ClipViolenceDetector {
    /// Load the CLIP session and tokenize the candidate prompts once.
    pub fn load(model_dir: &Path) -> Result<Self> {
        let dir = clip_dir(model_dir);
        let session = load_session(&dir.join(MODEL_FILE))?;

        let tokenizer = Tokenizer::from_file(dir.join(TOKENIZER_FILE))
            .map_err(|e| anyhow::anyhow!("Failed to load CLIP tokenizer: {}", e))?;

        let encodings = CANDIDATE_LABELS
            .iter()
            .map(|label| {
                tokenizer
                    .encode(PROMPT_TEMPLATE.replace("{}", label), true)
                    .map_err(|e| anyhow::anyhow!("Tokenization failed for {label}: {e}"))
            })
            .collect::<Result<Vec<_>>>()?;

        let seq_len = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0);
        let mut input_ids = Vec::with_capacity(encodings.len() * seq_len);
        let mut attention_mask = Vec::with_capacity(encodings.len() * seq_len);
        for enc in &encodings {
            let ids = enc.get_ids();
            input_ids.extend(ids.iter().map(|&id| id as i64));
            attention_mask.extend(enc.get_attention_mask().iter().map(|&m| m as i64));
            for _ in ids.len()..seq_len {
                input_ids.push(PAD_ID);
                attention_mask.push(0);
            }
        }

        debug!(
            labels = CANDIDATE_LABELS.len(),
            seq_len,
            "Loaded CLIP violence classifier from {}",
            dir.display()
        );

        Ok(Self {
            session,
            input_ids: Arc::new(input_ids),
            attention_mask: Arc::new(attention_mask),
            seq_len,
        })
    }
}

#[async_trait]
impl Detector for ClipViolenceDetector {
    fn name(&self) -> &str {
        "clip-violence"
    }

    fn source(&self) -> FindingSource {
        FindingSource::ViolenceClassifier
    }

    async fn findings(&self, image: &Path) -> Result<Vec<DetectionFinding>> {
        let session = Arc::clone(&self.session);
        let input_ids = Arc::clone(&self.input_ids);
        let attention_mask = Arc::clone(&self.attention_mask);
        let seq_len = self.seq_len;
        let image = image.to_path_buf();
        let caller = CallerGuard::new();
        let watch = caller.watch();

        let result = tokio::task::spawn_blocking(move || {
            let img = open_rgb(&image)?;
            let pixels = to_chw(&img, IMAGE_SIZE, CLIP_MEAN, CLIP_STD);

            let labels = CANDIDATE_LABELS.len() as i64;
            let text_shape = [labels, seq_len as i64];
            let pixel_shape = [1, 3, IMAGE_SIZE as i64, IMAGE_SIZE as i64];

            let ids_tensor = Tensor::from_array((text_shape, input_ids.as_ref().clone()))
                .context("Failed to create input_ids tensor")?;
            let mask_tensor = Tensor::from_array((text_shape, attention_mask.as_ref().clone()))
                .context("Failed to create attention_mask tensor")?;
            let pixel_tensor = Tensor::from_array((pixel_shape, pixels))
                .context("Failed to create pixel_values tensor")?;

            let logits = {
                let mut session = lock_for_caller(&*session, &watch)?;

                let outputs = session
                    .run(ort::inputs! {
                        "input_ids" => ids_tensor,
                        "attention_mask" => mask_tensor,
                        "pixel_values" => pixel_tensor
                    })
                    .context("CLIP inference failed")?;

                // logits_per_image: [1, labels]
                let (_shape, data) = outputs["logits_per_image"]
                    .try_extract_tensor::<f32>()
                    .context("Failed to extract logits_per_image")?;
                data.to_vec()
            };

            let findings = findings_from_logits(&logits)?;
            debug!(image = %image.display(), findings = findings.len(), "CLIP scored image");
            Ok(findings)
        })
        .await
        .context("spawn_blocking panicked")?;
        drop(caller);
        result
    }
}
