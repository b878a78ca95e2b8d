//! RGB-derived vegetation indices
//!
//! Every index is a closed-form function of normalised R, G, B. Divisions are
//! guarded: a denominator closer to zero than [`DENOMINATOR_EPSILON`] yields 0,
//! and every value is clamped to [`VegetationIndex::bounds`] so aggregates can
//! never leave the documented range.

use image::RgbImage;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::color::{hsv_saturation, Lab};
use crate::rounding::round_dp;

/// Denominators smaller than this in magnitude produce 0 instead of a ratio
pub const DENOMINATOR_EPSILON: f64 = 1e-6;

/// Soil brightness correction factor for SAVI
const SAVI_L: f64 = 0.5;

/// The twelve vegetation indices, in contract order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VegetationIndex {
    Ndvi,
    Evi,
    Gndvi,
    Savi,
    Msavi,
    Vari,
    Gli,
    Exg,
    Ngrdi,
    Rgbvi,
    Mgrvi,
    Tgi,
}

impl VegetationIndex {
    pub const COUNT: usize = 12;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Ndvi,
        Self::Evi,
        Self::Gndvi,
        Self::Savi,
        Self::Msavi,
        Self::Vari,
        Self::Gli,
        Self::Exg,
        Self::Ngrdi,
        Self::Rgbvi,
        Self::Mgrvi,
        Self::Tgi,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Ndvi => "ndvi",
            Self::Evi => "evi",
            Self::Gndvi => "gndvi",
            Self::Savi => "savi",
            Self::Msavi => "msavi",
            Self::Vari => "vari",
            Self::Gli => "gli",
            Self::Exg => "exg",
            Self::Ngrdi => "ngrdi",
            Self::Rgbvi => "rgbvi",
            Self::Mgrvi => "mgrvi",
            Self::Tgi => "tgi",
        }
    }

    /// Closed range every per-pixel value (and therefore every mean) lies in
    pub const fn bounds(self) -> (f64, f64) {
        match self {
            Self::Vari | Self::Exg => (-2.0, 2.0),
            Self::Tgi => (-95.0, 95.0),
            _ => (-1.0, 1.0),
        }
    }

    pub const fn position(self) -> usize {
        self as usize
    }
}

/// Per-index values for one pixel, indexed by [`VegetationIndex::position`]
pub type IndexValues = [f64; VegetationIndex::COUNT];

#[inline]
fn guarded_div(numerator: f64, denominator: f64) -> f64 {
    if denominator.abs() < DENOMINATOR_EPSILON {
        0.0
    } else {
        numerator / denominator
    }
}

/// Visible-band stand-in for near infrared, in [0, 1]
#[inline]
pub fn pseudo_nir(r: f64, g: f64, b: f64) -> f64 {
    (g * 0.55 + r * 0.25 + b * 0.2 + (g - r).max(0.0) * 0.3).min(1.0)
}

/// Compute all twelve indices from normalised channels in [0, 1]
pub fn compute_indices(r: f64, g: f64, b: f64) -> IndexValues {
    let nir = pseudo_nir(r, g, b);

    let msavi_disc = (2.0 * nir + 1.0).powi(2) - 8.0 * (nir - r);
    let msavi = if msavi_disc > 0.0 {
        (2.0 * nir + 1.0 - msavi_disc.sqrt()) / 2.0
    } else {
        0.0
    };

    let mut values = [0.0; VegetationIndex::COUNT];
    values[VegetationIndex::Ndvi.position()] = guarded_div(nir - r, nir + r);
    values[VegetationIndex::Evi.position()] =
        guarded_div(2.5 * (nir - r), nir + 6.0 * r - 7.5 * b + 1.0);
    values[VegetationIndex::Gndvi.position()] = guarded_div(nir - g, nir + g);
    values[VegetationIndex::Savi.position()] =
        guarded_div(nir - r, nir + r + SAVI_L) * (1.0 + SAVI_L);
    values[VegetationIndex::Msavi.position()] = msavi;
    values[VegetationIndex::Vari.position()] = guarded_div(g - r, g + r - b);
    values[VegetationIndex::Gli.position()] = guarded_div(2.0 * g - r - b, 2.0 * g + r + b);
    values[VegetationIndex::Exg.position()] = 2.0 * g - r - b;
    values[VegetationIndex::Ngrdi.position()] = guarded_div(g - r, g + r);
    values[VegetationIndex::Rgbvi.position()] = guarded_div(g * g - r * b, g * g + r * b);
    values[VegetationIndex::Mgrvi.position()] = guarded_div(g * g - r * r, g * g + r * r);
    values[VegetationIndex::Tgi.position()] = -0.5 * (190.0 * (r - g) - 120.0 * (r - b));

    for index in VegetationIndex::ALL {
        let (lo, hi) = index.bounds();
        let slot = &mut values[index.position()];
        *slot = if slot.is_finite() { slot.clamp(lo, hi) } else { 0.0 };
    }

    values
}

/// Everything derived from one sampled pixel. Ephemeral: built per pixel,
/// consumed by segmentation and patch statistics, then dropped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelSample {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub lab: Lab,
    pub indices: IndexValues,
    /// Mean of normalised channels
    pub brightness: f64,
    pub saturation: f64,
}

impl PixelSample {
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        let rn = f64::from(r) / 255.0;
        let gn = f64::from(g) / 255.0;
        let bn = f64::from(b) / 255.0;

        Self {
            r,
            g,
            b,
            lab: Lab::from_srgb(r, g, b),
            indices: compute_indices(rn, gn, bn),
            brightness: (rn + gn + bn) / 3.0,
            saturation: hsv_saturation(rn, gn, bn),
        }
    }

    #[inline]
    pub const fn index(&self, index: VegetationIndex) -> f64 {
        self.indices[index.position()]
    }
}

/// Build the per-pixel samples for a whole image, in row-major order.
///
/// The parallel path only maps pixels; it never reduces, so the output is
/// identical to the serial path.
pub fn sample_pixels(image: &RgbImage, parallel: bool) -> Vec<PixelSample> {
    let raw = image.as_raw();

    #[cfg(feature = "parallel")]
    if parallel {
        return raw
            .par_chunks_exact(3)
            .map(|px| PixelSample::from_rgb(px[0], px[1], px[2]))
            .collect();
    }

    #[cfg(not(feature = "parallel"))]
    let _ = parallel;

    raw.chunks_exact(3)
        .map(|px| PixelSample::from_rgb(px[0], px[1], px[2]))
        .collect()
}

/// Mean and population standard deviation of one index
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct IndexStats {
    pub mean: f64,
    pub std: f64,
}

/// Running mean and squared deviations (Welford), plus the plain sum.
/// Values are pushed in a fixed order, so results are reproducible.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct MomentAccumulator {
    pub count: u64,
    pub sum: f64,
    mean: f64,
    m2: f64,
}

impl MomentAccumulator {
    #[inline]
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub const fn mean(&self) -> f64 {
        self.mean
    }

    /// Population variance; 0 when empty
    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        (self.m2 / self.count as f64).max(0.0)
    }

    pub fn finish(&self) -> IndexStats {
        IndexStats {
            mean: self.mean(),
            std: self.variance().sqrt(),
        }
    }
}

/// Whole-image mean/std for every vegetation index
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IndexSet {
    stats: [IndexStats; VegetationIndex::COUNT],
}

impl IndexSet {
    /// Aggregate over all samples in order
    pub fn from_samples(samples: &[PixelSample]) -> Self {
        let mut acc = [MomentAccumulator::default(); VegetationIndex::COUNT];
        for sample in samples {
            for (slot, value) in acc.iter_mut().zip(sample.indices.iter()) {
                slot.push(*value);
            }
        }

        let mut stats = [IndexStats::default(); VegetationIndex::COUNT];
        for (out, slot) in stats.iter_mut().zip(acc.iter()) {
            *out = slot.finish();
        }

        Self { stats }
    }

    pub const fn get(&self, index: VegetationIndex) -> IndexStats {
        self.stats[index.position()]
    }

    pub const fn mean(&self, index: VegetationIndex) -> f64 {
        self.stats[index.position()].mean
    }

    pub const fn std(&self, index: VegetationIndex) -> f64 {
        self.stats[index.position()].std
    }

    pub fn iter(&self) -> impl Iterator<Item = (VegetationIndex, IndexStats)> + '_ {
        VegetationIndex::ALL.iter().map(|&i| (i, self.get(i)))
    }

    /// True when every mean lies inside its documented bound and every std is a finite non-negative number
    pub fn is_within_bounds(&self) -> bool {
        self.iter().all(|(index, stats)| {
            let (lo, hi) = index.bounds();
            stats.mean.is_finite()
                && stats.mean >= lo
                && stats.mean <= hi
                && stats.std.is_finite()
                && stats.std >= 0.0
        })
    }
}

/// Response shape: twelve rounded means plus `ndvi_std`
impl Serialize for IndexSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(VegetationIndex::COUNT + 1))?;
        for (index, stats) in self.iter() {
            map.serialize_entry(index.name(), &round_dp(stats.mean, 4))?;
        }
        map.serialize_entry("ndvi_std", &round_dp(self.std(VegetationIndex::Ndvi), 4))?;
        map.end()
    }
}
