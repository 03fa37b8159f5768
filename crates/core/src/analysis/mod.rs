use std::{cmp::Ordering, fmt};

use serde::{Deserialize, Serialize};

use crate::{
    config::AnalysisSettings,
    math::{clamp01, wrap_hue},
};

mod frame;
mod publish;

pub use frame::{FrameSource, PixelLayout, VideoFrame};
pub use publish::{AnalysisDriver, SnapshotHandle};

/// Sobel magnitudes are compared against `edge_threshold` scaled by this;
/// `|gx| + |gy|` spans roughly 0..8 on a normalised luminance buffer.
const SOBEL_SCALE: f32 = 2.6;
const MIN_DT: f64 = 0.001;

/// Smoothed visual features for one analysis tick.
///
/// This is the only view of the camera the generator gets. All scalar
/// features are in `[0, 1]`, the hue is in `[0, 360)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSnapshot {
    /// Seconds on the caller's clock.
    pub timestamp: f64,
    pub frame_size: usize,
    pub analysis_rate: u32,
    pub dominant_hue_degrees: f32,
    /// Sum-normalised, smoothed weight per hue bin.
    pub hue_histogram: Vec<f32>,
    /// Centre hues of the heaviest bins, heaviest first.
    pub palette_colors: Vec<f32>,
    pub brightness: f32,
    pub saturation: f32,
    pub contrast: f32,
    pub motion: f32,
    pub edge: f32,
}

impl Default for FeatureSnapshot {
    /// Stand-in used before the first analysis tick: mid brightness, still.
    fn default() -> Self {
        Self {
            timestamp: 0.0,
            frame_size: 0,
            analysis_rate: 0,
            dominant_hue_degrees: 0.0,
            hue_histogram: Vec::new(),
            palette_colors: Vec::new(),
            brightness: 0.55,
            saturation: 0.5,
            contrast: 0.0,
            motion: 0.0,
            edge: 0.0,
        }
    }
}

/// Unsmoothed per-frame measurements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFeatures {
    pub brightness: f32,
    pub saturation: f32,
    pub contrast: f32,
    /// Mean absolute luminance change, before the gain curve.
    pub motion: f32,
    /// Fraction of interior pixels on an edge, before the gain curve.
    pub edge: f32,
    /// Unnormalised hue histogram.
    pub hue_bins: Vec<f32>,
}

#[derive(Debug, Clone, Copy)]
struct Ema {
    brightness: f32,
    saturation: f32,
    contrast: f32,
    motion: f32,
    edge: f32,
    hue_x: f32,
    hue_y: f32,
}

/// Turns frames into [`FeatureSnapshot`]s, carrying smoothing state and the
/// previous luminance buffer between ticks.
#[derive(Default)]
pub struct FeatureExtractor {
    size: usize,
    previous_luma: Option<Vec<f32>>,
    last_time: Option<f64>,
    ema: Option<Ema>,
    ema_bins: Option<Vec<f32>>,
}

impl FeatureExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets all history; the next tick behaves like the first.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Pulls a frame from `source` and analyses it. Returns `None` when the
    /// source has nothing to offer.
    pub fn tick<S: FrameSource + ?Sized>(
        &mut self,
        source: &mut S,
        settings: &AnalysisSettings,
        now: f64,
    ) -> Option<FeatureSnapshot> {
        let frame = source.current_frame()?;
        Some(self.extract(&frame, settings, now))
    }

    pub fn extract(
        &mut self,
        frame: &VideoFrame,
        settings: &AnalysisSettings,
        now: f64,
    ) -> FeatureSnapshot {
        let size = settings.size();
        let rate = settings.rate();

        let dt = match self.last_time {
            Some(last) => (now - last).max(MIN_DT),
            None => 1.0 / f64::from(rate),
        };
        self.last_time = Some(now);

        if size != self.size {
            if self.size != 0 {
                tracing::info!(from = self.size, to = size, "analysis buffer resized");
            }
            self.size = size;
            self.previous_luma = None;
            self.ema_bins = None;
            if let Some(ema) = self.ema.as_mut() {
                ema.motion = 0.0;
            }
        }

        let pixels = frame.downscale(size);
        let bin_count = settings.hue_bins();
        let (raw, luma) = measure(
            &pixels,
            size,
            bin_count,
            settings.edge_threshold(),
            self.previous_luma.as_deref(),
        );
        self.previous_luma = Some(luma);

        let motion = gain_curve(raw.motion, settings.motion_gain());
        let edge = gain_curve(raw.edge, settings.edge_gain());

        let dominant = dominant_bin(&raw.hue_bins);
        let dominant_hue = bin_center(dominant, bin_count);
        let palette_colors = top_bins(&raw.hue_bins, settings.palette_size())
            .into_iter()
            .map(|bin| bin_center(bin, bin_count))
            .collect();

        let alpha = smoothing_alpha(dt, settings.smoothing_tau());
        let (hx, hy) = hue_vector(dominant_hue);
        let ema = match self.ema.as_mut() {
            Some(ema) => {
                ema.brightness += alpha * (raw.brightness - ema.brightness);
                ema.saturation += alpha * (raw.saturation - ema.saturation);
                ema.contrast += alpha * (raw.contrast - ema.contrast);
                ema.motion += alpha * (motion - ema.motion);
                ema.edge += alpha * (edge - ema.edge);
                ema.hue_x += alpha * (hx - ema.hue_x);
                ema.hue_y += alpha * (hy - ema.hue_y);
                *ema
            }
            None => *self.ema.insert(Ema {
                brightness: raw.brightness,
                saturation: raw.saturation,
                contrast: raw.contrast,
                motion,
                edge,
                hue_x: hx,
                hue_y: hy,
            }),
        };

        let normalized = normalize(&raw.hue_bins);
        let hue_histogram = match self.ema_bins.as_mut() {
            Some(bins) if bins.len() == normalized.len() => {
                for (smoothed, value) in bins.iter_mut().zip(&normalized) {
                    *smoothed += alpha * (value - *smoothed);
                }
                bins.clone()
            }
            _ => self.ema_bins.insert(normalized).clone(),
        };

        FeatureSnapshot {
            timestamp: now,
            frame_size: size,
            analysis_rate: rate,
            dominant_hue_degrees: wrap_hue(ema.hue_y.atan2(ema.hue_x).to_degrees()),
            hue_histogram,
            palette_colors,
            brightness: clamp01(ema.brightness),
            saturation: clamp01(ema.saturation),
            contrast: clamp01(ema.contrast),
            motion: clamp01(ema.motion),
            edge: clamp01(ema.edge),
        }
    }
}

impl fmt::Debug for FeatureExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureExtractor")
            .field("size", &self.size)
            .field("has_previous", &self.previous_luma.is_some())
            .field("last_time", &self.last_time)
            .field("ema", &self.ema)
            .finish()
    }
}

/// Standard HSV, each component in `[0, 1]` except hue in degrees.
pub fn rgb_to_hsv(rgb: [u8; 3]) -> (f32, f32, f32) {
    let [r, g, b] = rgb.map(|c| f32::from(c) / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let d = max - min;

    let mut hue = 0.0;
    if d > 1e-6 {
        hue = if max == r {
            (g - b) / d + if g < b { 6.0 } else { 0.0 }
        } else if max == g {
            (b - r) / d + 2.0
        } else {
            (r - g) / d + 4.0
        };
        hue *= 60.0;
    }
    let saturation = if max <= 1e-6 { 0.0 } else { d / max };
    (wrap_hue(hue), clamp01(saturation), clamp01(max))
}

/// Rec.709 luminance in `[0, 1]`.
pub fn luminance(rgb: [u8; 3]) -> f32 {
    let [r, g, b] = rgb.map(f32::from);
    (0.2126 * r + 0.7152 * g + 0.0722 * b) / 255.0
}

/// `1 - exp(-raw * gain)`: lifts small values, saturates towards 1.
pub fn gain_curve(raw: f32, gain: f32) -> f32 {
    1.0 - (-raw * gain.max(1.0)).exp()
}

/// EMA coefficient for an elapsed `dt` and time constant `tau`.
pub fn smoothing_alpha(dt: f64, tau: f32) -> f32 {
    let tau = f64::from(tau.max(0.001));
    (1.0 - (-dt.max(0.0) / tau).exp()) as f32
}

/// Measures one downscaled buffer. Returns the raw features and the
/// luminance buffer to diff against next tick.
pub fn measure(
    pixels: &[[u8; 3]],
    size: usize,
    bin_count: usize,
    edge_threshold: f32,
    previous_luma: Option<&[f32]>,
) -> (RawFeatures, Vec<f32>) {
    let n = pixels.len().max(1) as f32;
    let mut luma = Vec::with_capacity(pixels.len());
    let mut hue_bins = vec![0.0f32; bin_count.max(1)];
    let (mut sum_v, mut sum_s, mut sum_y, mut sum_y2) = (0.0f32, 0.0f32, 0.0f32, 0.0f32);

    for &px in pixels {
        let y = luminance(px);
        let (hue, sat, val) = rgb_to_hsv(px);
        luma.push(y);

        sum_v += val;
        sum_s += sat;
        sum_y += y;
        sum_y2 += y * y;

        // Washed-out and dark pixels barely vote for a hue.
        let bin = ((hue / 360.0) * hue_bins.len() as f32).floor() as usize % hue_bins.len();
        hue_bins[bin] += sat * val.sqrt();
    }

    let mean_y = sum_y / n;
    let variance = (sum_y2 / n - mean_y * mean_y).max(0.0);

    let motion = match previous_luma {
        Some(prev) if prev.len() == luma.len() && !luma.is_empty() => {
            luma.iter().zip(prev).map(|(a, b)| (a - b).abs()).sum::<f32>() / luma.len() as f32
        }
        _ => 0.0,
    };

    let raw = RawFeatures {
        brightness: sum_v / n,
        saturation: sum_s / n,
        contrast: variance.sqrt(),
        motion,
        edge: edge_density(&luma, size, edge_threshold),
        hue_bins,
    };
    (raw, luma)
}

/// Fraction of interior pixels whose Sobel magnitude `|gx| + |gy|` exceeds
/// `threshold * 2.6`. Buffers under 3×3 have no interior and report zero.
pub fn edge_density(luma: &[f32], size: usize, threshold: f32) -> f32 {
    if size < 3 || luma.len() < size * size {
        return 0.0;
    }
    let limit = threshold * SOBEL_SCALE;
    let w = size;
    let mut edges = 0usize;

    for y in 1..size - 1 {
        for x in 1..size - 1 {
            let at = |dx: usize, dy: usize| luma[(y + dy - 1) * w + (x + dx - 1)];
            let gx = -at(0, 0) - 2.0 * at(0, 1) - at(0, 2) + at(2, 0) + 2.0 * at(2, 1) + at(2, 2);
            let gy = -at(0, 0) - 2.0 * at(1, 0) - at(2, 0) + at(0, 2) + 2.0 * at(1, 2) + at(2, 2);
            if gx.abs() + gy.abs() > limit {
                edges += 1;
            }
        }
    }
    edges as f32 / ((size - 2) * (size - 2)) as f32
}

fn bin_center(bin: usize, bin_count: usize) -> f32 {
    (bin as f32 + 0.5) * (360.0 / bin_count as f32)
}

/// Heaviest bin; the lowest index wins ties.
fn dominant_bin(bins: &[f32]) -> usize {
    let mut best = 0;
    let mut best_weight = f32::NEG_INFINITY;
    for (i, &w) in bins.iter().enumerate() {
        if w > best_weight {
            best_weight = w;
            best = i;
        }
    }
    best
}

/// Indices of the `k` heaviest bins, heaviest first, ties by index.
fn top_bins(bins: &[f32], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..bins.len()).collect();
    order.sort_by(|&a, &b| bins[b].partial_cmp(&bins[a]).unwrap_or(Ordering::Equal));
    order.truncate(k);
    order
}

fn normalize(bins: &[f32]) -> Vec<f32> {
    let sum: f32 = bins.iter().sum();
    let denom = if sum > 1e-9 { sum } else { 1.0 };
    bins.iter().map(|w| w / denom).collect()
}

fn hue_vector(hue_degrees: f32) -> (f32, f32) {
    let rad = hue_degrees.to_radians();
    (rad.cos(), rad.sin())
}
