// System status display: model files on disk and the active policy.

use std::path::Path;

use colored::Colorize;

use crate::config::Config;
use crate::detectors::download::{clip_dir, model_presence, nsfw_dir, yolo_dir, MODEL_FILE};

/// Display system status to the terminal.
pub fn show(config: &Config) {
    println!("Model directory: {}", config.model_dir.display());

    let presence = model_presence(&config.model_dir);
    model_line("clip-violence", presence.clip, &clip_dir(&config.model_dir));
    model_line("yolo-weapons", presence.yolo, &yolo_dir(&config.model_dir));
    model_line("nsfw-vit", presence.nsfw, &nsfw_dir(&config.model_dir));

    if !presence.any() {
        println!("\nNo models installed. Run `lookout download-model` first.");
    } else if !(presence.clip && presence.yolo && presence.nsfw) {
        println!(
            "\n{}",
            "Missing detectors will fail closed: their category is treated as maximum risk."
                .yellow()
        );
    }

    println!("\nImage root: {}", config.image_root.display());
    match config.detector_timeout {
        Some(timeout) => println!("Detector timeout: {}s", timeout.as_secs()),
        None => println!("Detector timeout: disabled"),
    }

    println!("\nPolicy thresholds:");
    for (name, value) in config.thresholds.entries() {
        println!("  {:<22} {:.2}", name, value);
    }

    let floors = &config.noise_floors;
    println!("\nNoise floors:");
    println!("  {:<22} {:.2}", "violence_model", floors.violence_model);
    println!("  {:<22} {:.2}", "weapon_detector", floors.weapon_detector);
    println!("  {:<22} {:.2}", "general_violence", floors.general_violence);
    println!("  {:<22} {:.2}", "content_classifier", floors.content_classifier);
}

fn model_line(name: &str, present: bool, dir: &Path) {
    let state = if present {
        "installed".green()
    } else {
        "missing".red()
    };
    let size = std::fs::metadata(dir.join(MODEL_FILE))
        .map(|m| format!(" ({})", format_bytes(m.len())))
        .unwrap_or_default();
    println!("  {:<14} {}{}", name, state, size);
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
