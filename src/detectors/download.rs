// Model download helper and on-disk model layout.
//
// Layout under the model directory:
//   clip/model.onnx, clip/tokenizer.json    zero-shot violence classifier
//   nsfw/model.onnx, nsfw/config.json       explicit-content classifier
//   yolo/model.onnx                         YOLOv8 object detector (exported locally)
//
// Files are stored in a platform-appropriate directory
// (~/.local/share/lookout/models/ on Linux) so they persist across runs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

/// HuggingFace repo for the CLIP ONNX export.
const CLIP_HF_URL: &str = "https://huggingface.co/Xenova/clip-vit-base-patch32/resolve/main";

/// HuggingFace repo for the ViT explicit-content classifier.
const NSFW_HF_URL: &str = "https://huggingface.co/AdamCodd/vit-base-nsfw-detector/resolve/main";

pub const MODEL_FILE: &str = "model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const LABELS_FILE: &str = "config.json";

/// Returns the default directory for storing model files.
pub fn default_model_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lookout")
        .join("models")
}

pub fn clip_dir(base: &Path) -> PathBuf {
    base.join("clip")
}

pub fn nsfw_dir(base: &Path) -> PathBuf {
    base.join("nsfw")
}

pub fn yolo_dir(base: &Path) -> PathBuf {
    base.join("yolo")
}

/// Which detector models are present on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelPresence {
    pub clip: bool,
    pub nsfw: bool,
    pub yolo: bool,
}

impl ModelPresence {
    pub fn any(&self) -> bool {
        self.clip || self.nsfw || self.yolo
    }
}

pub fn model_presence(base: &Path) -> ModelPresence {
    let clip = clip_dir(base);
    let nsfw = nsfw_dir(base);
    ModelPresence {
        clip: clip.join(MODEL_FILE).exists() && clip.join(TOKENIZER_FILE).exists(),
        nsfw: nsfw.join(MODEL_FILE).exists() && nsfw.join(LABELS_FILE).exists(),
        yolo: yolo_dir(base).join(MODEL_FILE).exists(),
    }
}

/// Download the hosted models (CLIP and the explicit-content classifier).
///
/// Skips files that already exist. The YOLO model has no hosted ONNX
/// export, so only instructions are printed for it.
pub async fn download_models(dir: &Path) -> Result<()> {
    println!("\nViolence classifier (CLIP ViT-B/32):");
    let clip = clip_dir(dir);
    fetch_into(&clip, CLIP_HF_URL, "tokenizer.json", TOKENIZER_FILE, false).await?;
    fetch_into(&clip, CLIP_HF_URL, "onnx/model_quantized.onnx", MODEL_FILE, true).await?;

    println!("\nExplicit-content classifier (ViT):");
    let nsfw = nsfw_dir(dir);
    fetch_into(&nsfw, NSFW_HF_URL, "config.json", LABELS_FILE, false).await?;
    fetch_into(&nsfw, NSFW_HF_URL, "onnx/model_quantized.onnx", MODEL_FILE, true).await?;

    let yolo = yolo_dir(dir);
    println!("\nWeapon detector (YOLOv8):");
    if yolo.join(MODEL_FILE).exists() {
        println!("  {} (already exists)", MODEL_FILE);
    } else {
        println!("  Not hosted. Export it with ultralytics and copy it in place:");
        println!("    yolo export model=yolov8n.pt format=onnx");
        println!("    cp yolov8n.onnx {}", yolo.join(MODEL_FILE).display());
    }

    Ok(())
}

async fn fetch_into(
    dir: &Path,
    base_url: &str,
    remote: &str,
    local: &str,
    show_progress: bool,
) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create model directory: {}", dir.display()))?;

    let dest = dir.join(local);
    if dest.exists() {
        info!(file = %dest.display(), "Model file already exists, skipping");
        println!("  {} (already exists)", local);
        return Ok(());
    }

    println!("  Downloading {}...", remote);
    download_file(&format!("{base_url}/{remote}"), &dest, show_progress).await
}

/// Download a single file from a URL to a local path.
/// If `show_progress` is true, display a progress bar.
async fn download_file(url: &str, dest: &Path, show_progress: bool) -> Result<()> {
    let client = reqwest::Client::new();
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to download {}", url))?;

    if !response.status().is_success() {
        anyhow::bail!("Download failed with status {}: {}", response.status(), url);
    }

    let pb = if show_progress {
        let pb = match response.content_length() {
            Some(size) => {
                let pb = ProgressBar::new(size);
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("    [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                        .expect("valid template")
                        .progress_chars("=> "),
                );
                pb
            }
            None => {
                let pb = ProgressBar::new_spinner();
                pb.set_style(
                    ProgressStyle::default_spinner()
                        .template("    {spinner} {bytes}")
                        .expect("valid template"),
                );
                pb
            }
        };
        Some(pb)
    } else {
        None
    };

    let bytes = response
        .bytes()
        .await
        .context("Failed to read response body")?;

    if let Some(ref pb) = pb {
        pb.set_position(bytes.len() as u64);
    }

    std::fs::write(dest, &bytes).with_context(|| format!("Failed to write {}", dest.display()))?;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    info!("Downloaded {} to {}", url, dest.display());
    Ok(())
}
