//! Pixel-statistics heuristics over uploaded skin photos.
//!
//! Everything here is deterministic given the decoded pixels, so the HTTP
//! layer and the explainers can share the same cues.

use std::borrow::Cow;

use image::imageops::FilterType;
use image::DynamicImage;
use serde::Serialize;

/// Side length of the thumbnail the global statistics are computed on.
const THUMB_SIDE: u32 = 128;

/// Confidence above which the redness cue counts as erythema.
pub const ERYTHEMA_THRESHOLD: f32 = 0.35;

pub const ERYTHEMA_LABEL: &str = "erythema-like pattern";
pub const BENIGN_LABEL: &str = "benign-appearing pattern";

// ROI search constants.
const ROI_MIN_PIXELS: u64 = 20_000;
const ROI_MIN_SCORE: f32 = 20.0;
const ROI_PERCENTILE: f64 = 0.95;
const ROI_MIN_MASK: usize = 200;
const ROI_PADDING: f32 = 0.08;
const ROI_MIN_AREA_FRACTION: f64 = 0.01;

/// Label and confidence produced by an image classifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub label: String,
    pub score: f32,
}

/// Half-open pixel box: `left..right` by `top..bottom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoiBox {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl RoiBox {
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }
}

fn thumbnail(img: &DynamicImage) -> DynamicImage {
    img.resize_exact(THUMB_SIDE, THUMB_SIDE, FilterType::CatmullRom)
}

/// Per-pixel red dominance; negative when green/blue win.
#[inline]
fn pixel_redness(r: u8, g: u8, b: u8) -> f32 {
    r as f32 - (g as f32 + b as f32) / 2.0
}

/// Mean R, G, B of the 128x128 thumbnail.
fn mean_rgb(img: &DynamicImage) -> [f64; 3] {
    let small = thumbnail(img).to_rgb8();
    let mut sums = [0f64; 3];
    for px in small.pixels() {
        for (sum, channel) in sums.iter_mut().zip(px.0) {
            *sum += channel as f64;
        }
    }
    let n = (small.width() * small.height()) as f64;
    sums.map(|s| s / n)
}

/// 0..1 redness dominance of the whole frame.
pub fn redness_score(img: &DynamicImage) -> f32 {
    let [r, g, b] = mean_rgb(img);
    let redness = (r - (g + b) / 2.0).max(0.0);
    (redness / 50.0).clamp(0.0, 1.0) as f32
}

/// 0..1 rough texture proxy: grayscale standard deviation.
pub fn texture_score(img: &DynamicImage) -> f32 {
    let gray = img.to_luma8();
    let gray = image::imageops::resize(&gray, THUMB_SIDE, THUMB_SIDE, FilterType::CatmullRom);
    let values: Vec<f64> = gray.pixels().map(|p| p.0[0] as f64 / 255.0).collect();
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    ((variance.sqrt() - 0.08) / 0.22).clamp(0.0, 1.0) as f32
}

/// Quick redness classifier used when no remote model is configured.
pub fn predict_skin_condition(img: &DynamicImage) -> Prediction {
    let conf = redness_score(img);
    if conf > ERYTHEMA_THRESHOLD {
        Prediction {
            label: ERYTHEMA_LABEL.to_string(),
            score: conf,
        }
    } else {
        Prediction {
            label: BENIGN_LABEL.to_string(),
            score: 1.0 - conf * 0.8,
        }
    }
}

/// Linear-interpolated percentile of an unsorted slice, `q` in 0..=1.
fn percentile(values: &mut [f32], q: f64) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_unstable_by(|a, b| a.total_cmp(b));
    let pos = q * (values.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = (pos - lo as f64) as f32;
    values[lo] + (values[hi] - values[lo]) * frac
}

/// Bounding box of the reddest pixels, padded, or `None` when the photo has
/// no clear reddish region worth focusing on.
pub fn largest_red_roi(img: &DynamicImage) -> Option<RoiBox> {
    let rgb = img.to_rgb8();
    let (w, h) = rgb.dimensions();
    if (w as u64) * (h as u64) < ROI_MIN_PIXELS {
        return None;
    }

    let scores: Vec<f32> = rgb
        .pixels()
        .map(|p| pixel_redness(p.0[0], p.0[1], p.0[2]))
        .collect();
    let mut sorted = scores.clone();
    let thr = percentile(&mut sorted, ROI_PERCENTILE).max(ROI_MIN_SCORE);

    let mut count = 0usize;
    let (mut x1, mut y1, mut x2, mut y2) = (u32::MAX, u32::MAX, 0u32, 0u32);
    for (i, score) in scores.iter().enumerate() {
        if *score > thr {
            let x = i as u32 % w;
            let y = i as u32 / w;
            x1 = x1.min(x);
            x2 = x2.max(x);
            y1 = y1.min(y);
            y2 = y2.max(y);
            count += 1;
        }
    }
    if count < ROI_MIN_MASK {
        return None;
    }

    let px = (ROI_PADDING * (x2 - x1 + 1) as f32) as u32;
    let py = (ROI_PADDING * (y2 - y1 + 1) as f32) as u32;
    let x1 = x1.saturating_sub(px);
    let y1 = y1.saturating_sub(py);
    let x2 = (x2 + px).min(w - 1);
    let y2 = (y2 + py).min(h - 1);

    let area = (x2 - x1) as f64 * (y2 - y1) as f64;
    if area < ROI_MIN_AREA_FRACTION * (w as f64) * (h as f64) {
        return None;
    }

    Some(RoiBox {
        left: x1,
        top: y1,
        right: x2 + 1,
        bottom: y2 + 1,
    })
}

/// Crop to the lesion region, falling back to the whole photo.
pub fn crop_lesion(img: &DynamicImage) -> Cow<'_, DynamicImage> {
    match largest_red_roi(img) {
        Some(roi) => Cow::Owned(img.crop_imm(roi.left, roi.top, roi.width(), roi.height())),
        None => Cow::Borrowed(img),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    pub(crate) fn solid(w: u32, h: u32, color: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb(color)))
    }

    fn with_red_square(w: u32, h: u32, at: (u32, u32), side: u32) -> DynamicImage {
        let mut img = RgbImage::from_pixel(w, h, Rgb([180, 180, 180]));
        for y in at.1..at.1 + side {
            for x in at.0..at.0 + side {
                img.put_pixel(x, y, Rgb([255, 0, 0]));
            }
        }
        DynamicImage::ImageRgb8(img)
    }

    fn checkerboard(side: u32) -> DynamicImage {
        let img = RgbImage::from_fn(side, side, |x, y| {
            if (x + y) % 2 == 0 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn pure_red_saturates_redness() {
        assert_eq!(redness_score(&solid(64, 64, [255, 0, 0])), 1.0);
    }

    #[test]
    fn gray_and_blue_have_no_redness() {
        assert_eq!(redness_score(&solid(64, 64, [128, 128, 128])), 0.0);
        assert_eq!(redness_score(&solid(64, 64, [0, 0, 255])), 0.0);
    }

    #[test]
    fn mild_redness_is_scaled_by_fifty() {
        // 150 - (100 + 100) / 2 = 50 -> 1.0; 125 - 100 = 25 -> 0.5
        let score = redness_score(&solid(32, 32, [125, 100, 100]));
        assert!((score - 0.5).abs() < 1e-4, "got {score}");
    }

    #[test]
    fn flat_image_has_no_texture() {
        assert_eq!(texture_score(&solid(200, 200, [90, 60, 60])), 0.0);
    }

    #[test]
    fn noisy_image_has_texture() {
        // Exact 128 side keeps the checkerboard intact through the resize.
        assert_eq!(texture_score(&checkerboard(128)), 1.0);
    }

    #[test]
    fn red_image_predicts_erythema() {
        let pred = predict_skin_condition(&solid(50, 50, [255, 0, 0]));
        assert_eq!(pred.label, ERYTHEMA_LABEL);
        assert_eq!(pred.score, 1.0);
    }

    #[test]
    fn neutral_image_predicts_benign_with_inverted_confidence() {
        let pred = predict_skin_condition(&solid(50, 50, [120, 120, 120]));
        assert_eq!(pred.label, BENIGN_LABEL);
        assert_eq!(pred.score, 1.0);

        // redness 0.3 sits below the threshold: 1 - 0.3 * 0.8
        let pred = predict_skin_condition(&solid(50, 50, [115, 100, 100]));
        assert_eq!(pred.label, BENIGN_LABEL);
        assert!((pred.score - 0.76).abs() < 1e-4, "got {}", pred.score);
    }

    #[test]
    fn percentile_interpolates() {
        let mut v = vec![4.0, 1.0, 3.0, 2.0, 5.0];
        assert_eq!(percentile(&mut v, 0.5), 3.0);
        let mut v = vec![0.0, 10.0];
        assert!((percentile(&mut v, 0.95) - 9.5).abs() < 1e-5);
    }

    #[test]
    fn roi_finds_padded_red_square() {
        let img = with_red_square(200, 200, (50, 50), 40);
        let roi = largest_red_roi(&img).expect("roi");
        // span 40 -> padding 3 on each side
        assert_eq!(
            roi,
            RoiBox {
                left: 47,
                top: 47,
                right: 93,
                bottom: 93
            }
        );
    }

    #[test]
    fn roi_padding_is_clamped_to_bounds() {
        let img = with_red_square(200, 200, (0, 0), 40);
        let roi = largest_red_roi(&img).expect("roi");
        assert_eq!(roi.left, 0);
        assert_eq!(roi.top, 0);
        assert_eq!(roi.right, 43);
    }

    #[test]
    fn roi_rejects_red_covering_the_top_percentile() {
        // Over 5% red pushes the percentile to the red score itself, and
        // nothing is strictly above it.
        let img = with_red_square(200, 200, (50, 50), 50);
        assert_eq!(largest_red_roi(&img), None);
    }

    #[test]
    fn roi_rejects_thin_strokes_by_area() {
        // A one-pixel-high line pads to zero height.
        let mut img = RgbImage::from_pixel(400, 400, Rgb([180, 180, 180]));
        for x in 100..300 {
            img.put_pixel(x, 200, Rgb([255, 0, 0]));
        }
        assert_eq!(largest_red_roi(&DynamicImage::ImageRgb8(img)), None);
    }

    #[test]
    fn percentile_index_is_exact_on_large_inputs() {
        // 20M + 1 values: the 0.95 index is 19_000_000, past f32's exact range.
        let n = 20_000_001usize;
        let mut v: Vec<f32> = (0..n).map(|i| if i >= 19_000_000 { 1.0 } else { 0.0 }).collect();
        assert_eq!(percentile(&mut v, 0.95), 1.0);
    }

    #[test]
    fn roi_skips_small_images() {
        let img = with_red_square(100, 100, (10, 10), 40);
        assert_eq!(largest_red_roi(&img), None);
    }

    #[test]
    fn roi_skips_images_without_red() {
        assert_eq!(largest_red_roi(&solid(200, 200, [180, 180, 180])), None);
    }

    #[test]
    fn roi_skips_tiny_masks() {
        // 10x10 = 100 pixels, below the mask minimum
        let img = with_red_square(200, 200, (20, 20), 10);
        assert_eq!(largest_red_roi(&img), None);
    }

    #[test]
    fn crop_lesion_falls_back_to_original() {
        let img = solid(200, 200, [180, 180, 180]);
        assert!(matches!(crop_lesion(&img), Cow::Borrowed(_)));

        let img = with_red_square(200, 200, (50, 50), 40);
        let cropped = crop_lesion(&img);
        assert_eq!((cropped.width(), cropped.height()), (46, 46));
    }
}
