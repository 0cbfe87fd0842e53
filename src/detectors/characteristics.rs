// Image characteristics: cheap heuristics over the decoded pixels.
//
// Wide, colorful images are usually scenery, and scenery is where the
// classifiers produce most of their false positives. The policy engine uses
// `is_landscape` to loosen its soft tier for these images.

use std::path::Path;

use anyhow::Result;
use image::RgbImage;

use super::onnx::open_rgb;
use crate::moderation::models::ImageCharacteristics;

const LANDSCAPE_MIN_ASPECT: f64 = 1.3;
const LANDSCAPE_MAX_ASPECT: f64 = 2.3;
const LANDSCAPE_MIN_VARIANCE: f64 = 500.0;
const LANDSCAPE_MIN_WIDTH: u32 = 600;
const LANDSCAPE_MIN_HEIGHT: u32 = 400;

const PORTRAIT_MIN_ASPECT: f64 = 0.4;
const PORTRAIT_MAX_ASPECT: f64 = 0.9;

pub fn analyze_file(path: &Path) -> Result<ImageCharacteristics> {
    let img = open_rgb(path)?;
    Ok(from_rgb(&img))
}

pub fn from_rgb(img: &RgbImage) -> ImageCharacteristics {
    let (width, height) = img.dimensions();
    let aspect_ratio = if height == 0 {
        0.0
    } else {
        width as f64 / height as f64
    };
    let color_variance = mean_channel_variance(img);

    let is_landscape = (LANDSCAPE_MIN_ASPECT..=LANDSCAPE_MAX_ASPECT).contains(&aspect_ratio)
        && color_variance > LANDSCAPE_MIN_VARIANCE
        && width >= LANDSCAPE_MIN_WIDTH
        && height >= LANDSCAPE_MIN_HEIGHT;

    let is_portrait =
        (PORTRAIT_MIN_ASPECT..=PORTRAIT_MAX_ASPECT).contains(&aspect_ratio) && height > width;

    ImageCharacteristics {
        width,
        height,
        aspect_ratio,
        color_variance,
        is_landscape,
        is_portrait,
    }
}

/// Population variance of each RGB channel over all pixels, averaged
/// across the three channels.
fn mean_channel_variance(img: &RgbImage) -> f64 {
    let n = (img.width() as u64 * img.height() as u64) as f64;
    if n == 0.0 {
        return 0.0;
    }

    let mut sum = [0f64; 3];
    let mut sum_sq = [0f64; 3];
    for pixel in img.pixels() {
        for c in 0..3 {
            let v = pixel[c] as f64;
            sum[c] += v;
            sum_sq[c] += v * v;
        }
    }

    let variance: f64 = (0..3)
        .map(|c| {
            let mean = sum[c] / n;
            (sum_sq[c] / n - mean * mean).max(0.0)
        })
        .sum();
    variance / 3.0
}
