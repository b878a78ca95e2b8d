//! Patch statistics: whole-image colour aggregates and per-tile local statistics

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::Serialize;

use crate::calibration::{STOCKED_TILE_FRACTION, TILE_GRID, UNIFORM_CHANNEL_STD};
use crate::indices::{MomentAccumulator, PixelSample, VegetationIndex};
use crate::segmentation::{PixelClass, VegetationMask};

/// Whole-image colour aggregates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ColorStats {
    /// Share of green in the summed channels, in [0, 1]
    pub green_ratio: f64,
    /// Mean of 2g - r - b over normalised channels
    pub greenness_excess: f64,
    pub brightness: f64,
    pub saturation_mean: f64,
    /// Population std of each normalised channel
    pub channel_std: [f64; 3],
}

impl ColorStats {
    pub fn from_samples(samples: &[PixelSample]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let mut channels = [MomentAccumulator::default(); 3];
        let mut brightness = 0.0;
        let mut saturation = 0.0;
        for sample in samples {
            channels[0].push(f64::from(sample.r) / 255.0);
            channels[1].push(f64::from(sample.g) / 255.0);
            channels[2].push(f64::from(sample.b) / 255.0);
            brightness += sample.brightness;
            saturation += sample.saturation;
        }

        let n = samples.len() as f64;
        let (r_sum, g_sum, b_sum) = (channels[0].sum, channels[1].sum, channels[2].sum);
        let total = r_sum + g_sum + b_sum;

        Self {
            green_ratio: if total > 0.0 { g_sum / total } else { 0.0 },
            greenness_excess: (2.0 * g_sum - r_sum - b_sum) / n,
            brightness: brightness / n,
            saturation_mean: saturation / n,
            channel_std: channels.map(|c| c.variance().sqrt()),
        }
    }

    /// True when every channel is effectively constant
    pub fn is_flat(&self) -> bool {
        self.channel_std.iter().all(|&s| s < UNIFORM_CHANNEL_STD)
    }
}

/// Local statistics for one tile
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TileStats {
    pub col: u32,
    pub row: u32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub vegetation_fraction: f64,
    pub dead_fraction: f64,
    pub ndvi_mean: f64,
    pub gli_mean: f64,
    pub exg_mean: f64,
    pub brightness_mean: f64,
    pub brightness_std: f64,
}

/// Spatial aggregates over the tile layout
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatchStats {
    pub cols: u32,
    pub rows: u32,
    pub tiles: Vec<TileStats>,
    /// 1 - cv of per-tile vegetation fraction, in [0, 1]
    pub spatial_uniformity: f64,
    /// Mean per-tile stocking, in [0, 1]. Never decreases as the mask grows.
    pub stocked_cover: f64,
    /// Population variance of per-pixel brightness
    pub color_variance: f64,
    /// Mean within-tile brightness std
    pub texture_roughness: f64,
    /// Std of per-tile mean NDVI
    pub ndvi_tile_std: f64,
}

/// Tile boundaries along one axis: `count` spans covering `0..len`, sizes differing by at most one
fn spans(len: u32, count: u32) -> Vec<(u32, u32)> {
    (0..count)
        .map(|i| {
            let start = (u64::from(i) * u64::from(len) / u64::from(count)) as u32;
            let end = (u64::from(i + 1) * u64::from(len) / u64::from(count)) as u32;
            (start, end - start)
        })
        .collect()
}

/// 1 - std/mean of the per-tile vegetation fractions, clamped to [0, 1].
/// A zero mean (no vegetation anywhere) is perfectly uniform.
pub fn spatial_uniformity(fractions: &[f64]) -> f64 {
    let mut acc = MomentAccumulator::default();
    for &f in fractions {
        acc.push(f);
    }
    let mean = acc.mean();
    if mean <= f64::EPSILON {
        return 1.0;
    }
    (1.0 - acc.variance().sqrt() / mean).clamp(0.0, 1.0)
}

/// Mean over tiles of `min(1, fraction / stocked)`. Empty grids have no cover.
pub fn stocked_cover(fractions: &[f64], stocked: f64) -> f64 {
    if fractions.is_empty() || stocked <= 0.0 {
        return 0.0;
    }
    let total: f64 = fractions.iter().map(|f| (f / stocked).min(1.0)).sum();
    (total / fractions.len() as f64).clamp(0.0, 1.0)
}

impl PatchStats {
    pub fn compute(mask: &VegetationMask, samples: &[PixelSample], parallel: bool) -> Self {
        let (width, height) = (mask.width(), mask.height());
        let color_variance = {
            let mut acc = MomentAccumulator::default();
            for sample in samples {
                acc.push(sample.brightness);
            }
            acc.variance()
        };

        if width == 0 || height == 0 {
            return Self {
                cols: 0,
                rows: 0,
                tiles: Vec::new(),
                spatial_uniformity: 1.0,
                stocked_cover: 0.0,
                color_variance,
                texture_roughness: 0.0,
                ndvi_tile_std: 0.0,
            };
        }

        let cols = TILE_GRID.min(width);
        let rows = TILE_GRID.min(height);
        let col_spans = spans(width, cols);
        let row_spans = spans(height, rows);

        let layout: Vec<(u32, u32, (u32, u32), (u32, u32))> = row_spans
            .iter()
            .enumerate()
            .flat_map(|(row, &rs)| {
                col_spans
                    .iter()
                    .enumerate()
                    .map(move |(col, &cs)| (col as u32, row as u32, cs, rs))
            })
            .collect();

        let tile_of = |&(col, row, (x, w), (y, h)): &(u32, u32, (u32, u32), (u32, u32))| {
            Self::tile_stats(mask, samples, width, col, row, x, y, w, h)
        };

        #[cfg(feature = "parallel")]
        let tiles: Vec<TileStats> = if parallel {
            layout.par_iter().map(tile_of).collect()
        } else {
            layout.iter().map(tile_of).collect()
        };

        #[cfg(not(feature = "parallel"))]
        let tiles: Vec<TileStats> = {
            let _ = parallel;
            layout.iter().map(tile_of).collect()
        };

        let fractions: Vec<f64> = tiles.iter().map(|t| t.vegetation_fraction).collect();
        let mut roughness = MomentAccumulator::default();
        let mut ndvi = MomentAccumulator::default();
        for tile in &tiles {
            roughness.push(tile.brightness_std);
            ndvi.push(tile.ndvi_mean);
        }

        Self {
            cols,
            rows,
            spatial_uniformity: spatial_uniformity(&fractions),
            stocked_cover: stocked_cover(&fractions, STOCKED_TILE_FRACTION),
            tiles,
            color_variance,
            texture_roughness: roughness.mean(),
            ndvi_tile_std: ndvi.variance().sqrt(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn tile_stats(
        mask: &VegetationMask,
        samples: &[PixelSample],
        image_width: u32,
        col: u32,
        row: u32,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> TileStats {
        let labels = mask.labels();
        let mut vegetation = 0usize;
        let mut dead = 0usize;
        let mut ndvi = 0.0;
        let mut gli = 0.0;
        let mut exg = 0.0;
        let mut brightness = MomentAccumulator::default();

        for py in y..y + height {
            let row_start = py as usize * image_width as usize;
            for px in x..x + width {
                let i = row_start + px as usize;
                let sample = &samples[i];
                match labels[i] {
                    PixelClass::Vegetation => vegetation += 1,
                    PixelClass::Dead => dead += 1,
                    PixelClass::Bare => {}
                }
                ndvi += sample.index(VegetationIndex::Ndvi);
                gli += sample.index(VegetationIndex::Gli);
                exg += sample.index(VegetationIndex::Exg);
                brightness.push(sample.brightness);
            }
        }

        let n = (width as usize * height as usize).max(1) as f64;
        TileStats {
            col,
            row,
            x,
            y,
            width,
            height,
            vegetation_fraction: vegetation as f64 / n,
            dead_fraction: dead as f64 / n,
            ndvi_mean: ndvi / n,
            gli_mean: gli / n,
            exg_mean: exg / n,
            brightness_mean: brightness.mean(),
            brightness_std: brightness.variance().sqrt(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spans_cover_axis() {
        for len in 1..40u32 {
            let count = TILE_GRID.min(len);
            let s = spans(len, count);
            assert_eq!(s.len(), count as usize);
            assert_eq!(s[0].0, 0);
            assert!(s.iter().all(|&(_, w)| w > 0));
            let covered: u32 = s.iter().map(|&(_, w)| w).sum();
            assert_eq!(covered, len);
        }
    }

    #[test]
    fn test_uniformity_degenerate_cases() {
        assert_eq!(spatial_uniformity(&[0.0, 0.0, 0.0]), 1.0);
        assert_eq!(spatial_uniformity(&[]), 1.0);
        assert!((spatial_uniformity(&[0.7, 0.7, 0.7]) - 1.0).abs() < 1e-12);
        assert_eq!(spatial_uniformity(&[1.0, 0.0, 1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_stocked_cover_only_grows() {
        assert_eq!(stocked_cover(&[], 0.5), 0.0);
        assert_eq!(stocked_cover(&[0.0; 4], 0.5), 0.0);
        assert_eq!(stocked_cover(&[0.5, 0.9, 1.0, 0.6], 0.5), 1.0);

        // One tile greening from nothing drops uniformity to zero but raises cover
        let mut fractions = vec![0.0; 64];
        let before = stocked_cover(&fractions, 0.5);
        fractions[0] = 1.0 / 64.0;
        assert_eq!(spatial_uniformity(&fractions), 0.0);
        assert!(stocked_cover(&fractions, 0.5) > before);
    }

    #[test]
    fn test_uniform_image_has_exact_zero_spread() {
        let samples = vec![PixelSample::from_rgb(34, 139, 34); 30 * 20];
        let mask = VegetationMask::segment(30, 20, &samples, false);
        let patches = PatchStats::compute(&mask, &samples, false);

        assert_eq!(patches.color_variance, 0.0);
        assert_eq!(patches.texture_roughness, 0.0);
        assert_eq!(patches.spatial_uniformity, 1.0);
        assert_eq!(ColorStats::from_samples(&samples).channel_std, [0.0; 3]);
    }

    #[test]
    fn test_flat_colour_detection() {
        let flat = vec![PixelSample::from_rgb(128, 128, 128); 10];
        assert!(ColorStats::from_samples(&flat).is_flat());

        let mut varied = flat.clone();
        varied[3] = PixelSample::from_rgb(10, 200, 30);
        assert!(!ColorStats::from_samples(&varied).is_flat());
    }

    #[test]
    fn test_green_ratio_of_pure_green() {
        let stats = ColorStats::from_samples(&[PixelSample::from_rgb(0, 255, 0)]);
        assert!((stats.green_ratio - 1.0).abs() < 1e-12);
        assert!((stats.greenness_excess - 2.0).abs() < 1e-12);
    }
}
