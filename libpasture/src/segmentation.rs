//! Three-way vegetation segmentation

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::Serialize;

use crate::calibration::{
    DEAD_MAX_RED, DEAD_MIN_CHROMA, DEAD_MIN_LIGHTNESS, DEAD_MIN_YELLOW, SHADOW_MAX_LIGHTNESS,
    VEG_MIN_EXG, VEG_MIN_NDVI,
};
use crate::indices::{PixelSample, VegetationIndex};

/// Label assigned to each sampled pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelClass {
    Vegetation,
    Dead,
    Bare,
}

/// The decision rule. Canopy needs all three of: lightness above the shadow
/// floor, excess green at least [`VEG_MIN_EXG`], NDVI-proxy at least
/// [`VEG_MIN_NDVI`]. Each of those grows with G at fixed R and B, so raising
/// greenness can only move a pixel into `Vegetation`, never out of it.
///
/// Non-canopy pixels are `Dead` when they are bright, yellow and not as red as
/// soil; everything else is `Bare`.
pub fn classify(sample: &PixelSample) -> PixelClass {
    let lab = sample.lab;
    let exg = sample.index(VegetationIndex::Exg);
    let ndvi = sample.index(VegetationIndex::Ndvi);

    if lab.l >= SHADOW_MAX_LIGHTNESS && exg >= VEG_MIN_EXG && ndvi >= VEG_MIN_NDVI {
        return PixelClass::Vegetation;
    }

    if lab.l >= DEAD_MIN_LIGHTNESS
        && lab.b >= DEAD_MIN_YELLOW
        && lab.a <= DEAD_MAX_RED
        && lab.chroma() >= DEAD_MIN_CHROMA
    {
        return PixelClass::Dead;
    }

    PixelClass::Bare
}

/// True for bare pixels too dark to tell soil from shade
pub fn is_shadow(sample: &PixelSample) -> bool {
    sample.lab.l < SHADOW_MAX_LIGHTNESS
}

/// Per-pixel labels aligned with the sampled image, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VegetationMask {
    width: u32,
    height: u32,
    labels: Vec<PixelClass>,
    shadow_count: usize,
}

impl VegetationMask {
    /// Label every sample. Like sampling, the parallel path maps only.
    pub fn segment(width: u32, height: u32, samples: &[PixelSample], parallel: bool) -> Self {
        debug_assert_eq!(samples.len(), width as usize * height as usize);

        #[cfg(feature = "parallel")]
        let labels: Vec<PixelClass> = if parallel {
            samples.par_iter().map(classify).collect()
        } else {
            samples.iter().map(classify).collect()
        };

        #[cfg(not(feature = "parallel"))]
        let labels: Vec<PixelClass> = {
            let _ = parallel;
            samples.iter().map(classify).collect()
        };

        let shadow_count = samples
            .iter()
            .zip(labels.iter())
            .filter(|(s, l)| **l == PixelClass::Bare && is_shadow(s))
            .count();

        Self {
            width,
            height,
            labels,
            shadow_count,
        }
    }

    pub const fn width(&self) -> u32 {
        self.width
    }

    pub const fn height(&self) -> u32 {
        self.height
    }

    pub fn labels(&self) -> &[PixelClass] {
        &self.labels
    }

    pub fn get(&self, x: u32, y: u32) -> Option<PixelClass> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.labels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn count(&self, class: PixelClass) -> usize {
        self.labels.iter().filter(|&&l| l == class).count()
    }

    pub fn coverage(&self) -> CoverageStats {
        let total = self.labels.len();
        if total == 0 {
            // Nothing to see is reported as entirely bare ground
            return CoverageStats {
                vegetation_pct: 0.0,
                bare_pct: 100.0,
                dead_pct: 0.0,
                shadow_pct: 0.0,
            };
        }

        let pct = |n: usize| n as f64 / total as f64 * 100.0;
        let vegetation = self.count(PixelClass::Vegetation);
        let dead = self.count(PixelClass::Dead);
        let bare = total - vegetation - dead;

        CoverageStats {
            vegetation_pct: pct(vegetation),
            bare_pct: pct(bare),
            dead_pct: pct(dead),
            shadow_pct: pct(self.shadow_count),
        }
    }
}

/// Ground cover percentages. `vegetation_pct + bare_pct + dead_pct` is 100;
/// `shadow_pct` is the dark share of `bare_pct`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CoverageStats {
    #[serde(serialize_with = "crate::rounding::dp2")]
    pub vegetation_pct: f64,
    #[serde(serialize_with = "crate::rounding::dp2")]
    pub bare_pct: f64,
    #[serde(serialize_with = "crate::rounding::dp2")]
    pub dead_pct: f64,
    #[serde(serialize_with = "crate::rounding::dp2")]
    pub shadow_pct: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class_of(r: u8, g: u8, b: u8) -> PixelClass {
        classify(&PixelSample::from_rgb(r, g, b))
    }

    #[test]
    fn test_reference_colours() {
        assert_eq!(class_of(34, 139, 34), PixelClass::Vegetation);
        assert_eq!(class_of(90, 140, 60), PixelClass::Vegetation);
        assert_eq!(class_of(60, 90, 40), PixelClass::Vegetation);
        assert_eq!(class_of(128, 128, 128), PixelClass::Bare);
        assert_eq!(class_of(139, 69, 19), PixelClass::Bare);
        assert_eq!(class_of(200, 180, 100), PixelClass::Dead);
        assert_eq!(class_of(0, 0, 0), PixelClass::Bare);
    }

    #[test]
    fn test_dark_green_is_shadow_not_canopy() {
        let sample = PixelSample::from_rgb(5, 20, 5);
        assert_eq!(classify(&sample), PixelClass::Bare);
        assert!(is_shadow(&sample));
    }

    #[test]
    fn test_greenness_monotonic() {
        for r in (0..=255u16).step_by(15) {
            for b in (0..=255u16).step_by(15) {
                let mut seen_vegetation = false;
                for g in 0..=255u16 {
                    let class = class_of(r as u8, g as u8, b as u8);
                    if seen_vegetation {
                        assert_eq!(class, PixelClass::Vegetation, "flip at r={r} g={g} b={b}");
                    }
                    seen_vegetation |= class == PixelClass::Vegetation;
                }
            }
        }
    }

    #[test]
    fn test_coverage_sums_to_hundred() {
        let samples: Vec<_> = [(34, 139, 34), (139, 69, 19), (200, 180, 100), (10, 10, 10)]
            .iter()
            .map(|&(r, g, b)| PixelSample::from_rgb(r, g, b))
            .collect();
        let mask = VegetationMask::segment(2, 2, &samples, false);
        let coverage = mask.coverage();
        assert_eq!(coverage.vegetation_pct, 25.0);
        assert_eq!(coverage.dead_pct, 25.0);
        assert_eq!(coverage.bare_pct, 50.0);
        assert_eq!(coverage.shadow_pct, 25.0);
        assert_eq!(mask.get(0, 0), Some(PixelClass::Vegetation));
        assert_eq!(mask.get(2, 0), None);
    }

    #[test]
    fn test_empty_mask_is_bare() {
        let mask = VegetationMask::segment(0, 0, &[], false);
        let coverage = mask.coverage();
        assert_eq!(coverage.bare_pct, 100.0);
        assert_eq!(coverage.vegetation_pct, 0.0);
    }
}
