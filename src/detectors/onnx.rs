// Shared helpers for the ONNX-backed detectors: session loading, image
// decoding and tensor layout.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError, Weak};
use std::time::Duration;

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::RgbImage;
use ort::session::Session;

/// Load an ONNX session. `ort::Session::run` takes `&mut self`, so the
/// session is shared behind a mutex and driven from `spawn_blocking`.
pub fn load_session(model_path: &Path) -> Result<Arc<Mutex<Session>>> {
    if !model_path.exists() {
        anyhow::bail!(
            "Model file not found: {}\nRun `lookout download-model` to download it.",
            model_path.display()
        );
    }

    let session = Session::builder()
        .context("Failed to create ONNX session builder")?
        .commit_from_file(model_path)
        .with_context(|| format!("Failed to load ONNX model from {}", model_path.display()))?;

    Ok(Arc::new(Mutex::new(session)))
}

/// How often a queued inference re-checks a busy session.
const LOCK_POLL: Duration = Duration::from_millis(10);

/// Held by the async side of a detector call for as long as it waits on the
/// blocking inference. When the orchestrator times the call out the future is
/// dropped, the guard with it, and the queued inference gives up instead of
/// running for nobody.
pub struct CallerGuard(Arc<()>);

impl CallerGuard {
    pub fn new() -> Self {
        Self(Arc::new(()))
    }

    pub fn watch(&self) -> Weak<()> {
        Arc::downgrade(&self.0)
    }
}

impl Default for CallerGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Acquire the session lock from a blocking thread, polling while another
/// inference holds it. Bails as soon as the caller is gone, so a hung model
/// does not collect a backlog of blocked threads behind its mutex.
pub fn lock_for_caller<'a, T>(mutex: &'a Mutex<T>, caller: &Weak<()>) -> Result<MutexGuard<'a, T>> {
    loop {
        if caller.strong_count() == 0 {
            anyhow::bail!("Caller abandoned inference while the session was busy");
        }
        match mutex.try_lock() {
            Ok(guard) => return Ok(guard),
            Err(TryLockError::WouldBlock) => std::thread::sleep(LOCK_POLL),
            Err(TryLockError::Poisoned(e)) => {
                anyhow::bail!("Session lock poisoned: {}", e)
            }
        }
    }
}

/// Decode an image file into 8-bit RGB.
pub fn open_rgb(path: &Path) -> Result<RgbImage> {
    let img = image::open(path)
        .with_context(|| format!("Failed to decode image {}", path.display()))?;
    Ok(img.to_rgb8())
}

/// Resize to `size`×`size` and lay out as normalized CHW floats:
/// `(pixel / 255 - mean) / std` per channel.
pub fn to_chw(img: &RgbImage, size: u32, mean: [f32; 3], std: [f32; 3]) -> Vec<f32> {
    let resized = image::imageops::resize(img, size, size, FilterType::Triangle);
    let plane = (size * size) as usize;
    let mut data = vec![0f32; 3 * plane];

    for (i, pixel) in resized.pixels().enumerate() {
        for c in 0..3 {
            let v = pixel[c] as f32 / 255.0;
            data[c * plane + i] = (v - mean[c]) / std[c];
        }
    }

    data
}

/// Numerically stable softmax. A NaN or infinite logit means the model
/// output is broken, which is an error rather than an all-zero distribution.
pub fn softmax(logits: &[f32]) -> Result<Vec<f64>> {
    if let Some(i) = logits.iter().position(|l| !l.is_finite()) {
        anyhow::bail!("Model returned non-finite logit {} at index {}", logits[i], i);
    }
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max) as f64;
    let exps: Vec<f64> = logits.iter().map(|&l| (l as f64 - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    if !logits.is_empty() && (sum == 0.0 || !sum.is_finite()) {
        anyhow::bail!("Softmax over {} logits did not normalize", logits.len());
    }
    Ok(exps.iter().map(|e| e / sum).collect())
}
