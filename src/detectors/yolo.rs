// Weapon detector using a YOLOv8 ONNX export trained on COCO.
//
// Output shape is [1, 4 + classes, anchors]: four box coordinates followed
// by one confidence row per class. Only the weapon-like classes matter here
// and only their peak confidence, so no box decoding or NMS is needed.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use ort::session::Session;
use ort::value::Tensor;
use tracing::debug;

use super::download::{yolo_dir, MODEL_FILE};
use super::onnx::{load_session, lock_for_caller, open_rgb, to_chw, CallerGuard};
use super::traits::Detector;
use crate::moderation::models::{Category, DetectionFinding, FindingSource};

const INPUT_SIZE: u32 = 640;
const BOX_ROWS: usize = 4;

/// COCO class ids treated as weapons.
pub const WEAPON_CLASSES: [(usize, &str); 3] = [(34, "baseball bat"), (43, "knife"), (76, "scissors")];

/// Extract one finding per weapon class from a raw `[1, rows, anchors]`
/// output: the class's peak confidence over all anchors. Classes with zero
/// confidence are omitted. A short buffer or a NaN confidence in a weapon
/// row means the output cannot be trusted and is an error.
pub fn weapon_findings(data: &[f32], rows: usize, anchors: usize) -> Result<Vec<DetectionFinding>> {
    let mut findings = Vec::new();
    for &(class_id, label) in WEAPON_CLASSES.iter() {
        let row = BOX_ROWS + class_id;
        let start = row * anchors;
        let confidences = (row < rows)
            .then(|| data.get(start..start + anchors))
            .flatten()
            .with_context(|| {
                format!("YOLO output too small for class {label} ({rows} rows, {} values)", data.len())
            })?;

        if confidences.iter().any(|c| c.is_nan()) {
            anyhow::bail!("YOLO returned NaN confidence for class {label}");
        }
        let peak = confidences.iter().copied().fold(0f32, f32::max);
        if peak > 0.0 {
            findings.push(DetectionFinding::new(
                Category::Weapons,
                label,
                peak as f64,
                FindingSource::WeaponDetector,
            ));
        }
    }
    Ok(findings)
}

pub struct YoloWeaponDetector {
    session: Arc<Mutex<Session>>,
}

impl YoloWeaponDetector {
    pub fn load(model_dir: &Path) -> Result<Self> {
        let path = yolo_dir(model_dir).join(MODEL_FILE);
        let session = load_session(&path)?;
        debug!("Loaded YOLO weapon detector from {}", path.display());
        Ok(Self { session })
    }
}

#[async_trait]
impl Detector for YoloWeaponDetector {
    fn name(&self) -> &str {
        "yolo-weapons"
    }

    fn source(&self) -> FindingSource {
        FindingSource::WeaponDetector
    }

    async fn findings(&self, image: &Path) -> Result<Vec<DetectionFinding>> {
        let session = Arc::clone(&self.session);
        let image = image.to_path_buf();
        let caller = CallerGuard::new();
        let watch = caller.watch();

        let result = tokio::task::spawn_blocking(move || {
            let img = open_rgb(&image)?;
            // YOLO expects plain 0..1 scaling, no mean/std shift.
            let pixels = to_chw(&img, INPUT_SIZE, [0.0; 3], [1.0; 3]);
            let shape = [1, 3, INPUT_SIZE as i64, INPUT_SIZE as i64];
            let input = Tensor::from_array((shape, pixels))
                .context("Failed to create images tensor")?;

            let mut session = lock_for_caller(&*session, &watch)?;

            let outputs = session
                .run(ort::inputs! { "images" => input })
                .context("YOLO inference failed")?;

            let (out_shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .context("Failed to extract YOLO output")?;

            if out_shape.len() != 3 {
                anyhow::bail!("Unexpected YOLO output rank {}", out_shape.len());
            }
            let rows = out_shape[1] as usize;
            let anchors = out_shape[2] as usize;

            let findings = weapon_findings(data, rows, anchors)?;
            debug!(image = %image.display(), findings = findings.len(), "YOLO scored image");
            Ok(findings)
        })
        .await
        .context("spawn_blocking panicked")?;
        drop(caller);
        result
    }
}
