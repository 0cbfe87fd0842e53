use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::moderation::aggregate::NoiseFloors;
use crate::moderation::policy::PolicyThresholds;

/// Default per-detector timeout. Zero disables it.
const DEFAULT_DETECTOR_TIMEOUT_SECS: u64 = 30;

/// Central configuration loaded from environment variables.
///
/// The .env file is loaded automatically at startup via dotenvy. Every
/// threshold and noise floor can be overridden, so policy changes are
/// auditable in one place instead of scattered through the code.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory containing the ONNX model files
    pub model_dir: PathBuf,
    /// Base directory that relative image paths are resolved against
    pub image_root: PathBuf,
    /// Per-detector timeout; None disables it
    pub detector_timeout: Option<Duration>,
    /// Base URL of a running `lookout serve`, used by `lookout check`
    pub server_url: String,
    pub thresholds: PolicyThresholds,
    pub noise_floors: NoiseFloors,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        let model_dir = env::var("LOOKOUT_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| crate::detectors::download::default_model_dir());

        let image_root = match env::var("LOOKOUT_IMAGE_ROOT") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => env::current_dir().context("Failed to read current directory")?,
        };

        let timeout_secs = match env::var("LOOKOUT_DETECTOR_TIMEOUT_SECS") {
            Ok(raw) => raw.trim().parse::<u64>().with_context(|| {
                format!("LOOKOUT_DETECTOR_TIMEOUT_SECS must be a whole number of seconds, got {raw:?}")
            })?,
            Err(_) => DEFAULT_DETECTOR_TIMEOUT_SECS,
        };
        let detector_timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));

        let t = PolicyThresholds::default();
        let thresholds = PolicyThresholds {
            high_violence: env_score("LOOKOUT_HIGH_VIOLENCE_THRESHOLD", t.high_violence)?,
            high_weapon: env_score("LOOKOUT_HIGH_WEAPON_THRESHOLD", t.high_weapon)?,
            cross_model_weapon: env_score(
                "LOOKOUT_CROSS_MODEL_WEAPON_THRESHOLD",
                t.cross_model_weapon,
            )?,
            high_sexual_content: env_score(
                "LOOKOUT_HIGH_SEXUAL_CONTENT_THRESHOLD",
                t.high_sexual_content,
            )?,
            landscape_ceiling: env_score("LOOKOUT_LANDSCAPE_CEILING", t.landscape_ceiling)?,
            combined_risk: env_score("LOOKOUT_COMBINED_RISK_THRESHOLD", t.combined_risk)?,
        };

        let f = NoiseFloors::default();
        let noise_floors = NoiseFloors {
            violence_model: env_score("LOOKOUT_FLOOR_VIOLENCE_MODEL", f.violence_model)?,
            weapon_detector: env_score("LOOKOUT_FLOOR_WEAPON_DETECTOR", f.weapon_detector)?,
            general_violence: env_score("LOOKOUT_FLOOR_GENERAL_VIOLENCE", f.general_violence)?,
            content_classifier: env_score(
                "LOOKOUT_FLOOR_CONTENT_CLASSIFIER",
                f.content_classifier,
            )?,
        };

        Ok(Self {
            model_dir,
            image_root,
            detector_timeout,
            server_url: env::var("LOOKOUT_SERVER_URL")
                .unwrap_or_else(|_| "http://localhost:5000".to_string()),
            thresholds,
            noise_floors,
        })
    }

    /// Check that at least one detector model is on disk.
    /// Call this before any operation that runs local inference.
    pub fn require_models(&self) -> Result<()> {
        if !crate::detectors::download::model_presence(&self.model_dir).any() {
            anyhow::bail!(
                "No detector models found in {}\n\
                 Run `lookout download-model` to download them.",
                self.model_dir.display()
            );
        }
        Ok(())
    }
}

/// Read an optional score-valued variable, falling back to `default`.
fn env_score(name: &str, default: f64) -> Result<f64> {
    match env::var(name) {
        Ok(raw) => parse_score(name, &raw),
        Err(_) => Ok(default),
    }
}

/// Parse a value that must lie within [0, 1].
pub fn parse_score(name: &str, raw: &str) -> Result<f64> {
    let value: f64 = raw
        .trim()
        .parse()
        .with_context(|| format!("{name} must be a number, got {raw:?}"))?;
    if !(0.0..=1.0).contains(&value) {
        anyhow::bail!("{name} must be between 0 and 1, got {value}");
    }
    Ok(value)
}
