//! Species composition and rule-based candidate species
//!
//! Composition assigns every vegetation pixel to the nearest reference colour
//! in LAB space. Candidates score named pasture species from whole-image
//! signals. Both are heuristics; their accuracy envelope is reported as a
//! limitation in the result metadata.

use serde::Serialize;

use crate::calibration::{CANDIDATE_MAX_COUNT, CANDIDATE_MIN_LIKELIHOOD, SPECIES_PROFILES, SPECIES_REFERENCES};
use crate::features::FeatureVector;
use crate::indices::{IndexSet, PixelSample, VegetationIndex};
use crate::segmentation::{PixelClass, VegetationMask};

/// Colour bucket a vegetation pixel is assigned to. Declaration order is the
/// tie-break priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeciesBucket {
    Grass,
    Clover,
    Senescent,
}

impl SpeciesBucket {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Grass => "grass",
            Self::Clover => "clover",
            Self::Senescent => "senescent",
        }
    }
}

/// Nearest reference bucket for one pixel. Strictly closer wins, so equal
/// distances keep the earlier (higher priority) bucket.
pub fn nearest_bucket(sample: &PixelSample) -> SpeciesBucket {
    let mut best = SPECIES_REFERENCES[0];
    let mut best_distance = sample.lab.distance(&best.lab);
    for reference in &SPECIES_REFERENCES[1..] {
        let distance = sample.lab.distance(&reference.lab);
        if distance < best_distance {
            best = *reference;
            best_distance = distance;
        }
    }
    best.bucket
}

/// Whole-image quantity a candidate rule tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeciesSignal {
    Ndvi,
    NdviStd,
    Gli,
    Exg,
    Vari,
    Rgbvi,
    GreenRatio,
    Saturation,
    Brightness,
    ColorVariance,
    Uniformity,
    VegetationPct,
}

/// Signal values for one image
#[derive(Debug, Clone, Copy)]
pub struct SignalValues<'a> {
    pub features: &'a FeatureVector,
    pub indices: &'a IndexSet,
}

impl SignalValues<'_> {
    pub fn get(&self, signal: SpeciesSignal) -> f64 {
        let f = self.features;
        match signal {
            SpeciesSignal::Ndvi => f.ndvi_mean(),
            SpeciesSignal::NdviStd => self.indices.std(VegetationIndex::Ndvi),
            SpeciesSignal::Gli => f.gli_mean(),
            SpeciesSignal::Exg => f.greenness_excess(),
            SpeciesSignal::Vari => self.indices.mean(VegetationIndex::Vari),
            SpeciesSignal::Rgbvi => self.indices.mean(VegetationIndex::Rgbvi),
            SpeciesSignal::GreenRatio => f.green_ratio(),
            SpeciesSignal::Saturation => f.saturation_mean(),
            SpeciesSignal::Brightness => f.brightness(),
            SpeciesSignal::ColorVariance => f.color_variance(),
            SpeciesSignal::Uniformity => f.green_spatial_uniformity(),
            SpeciesSignal::VegetationPct => f.vegetation_pct(),
        }
    }
}

/// Adds `hit` when the signal is strictly past the threshold in the rule's
/// direction, `miss` otherwise
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SignalRule {
    pub signal: SpeciesSignal,
    pub above: bool,
    pub threshold: f64,
    pub hit: f64,
    pub miss: f64,
}

impl SignalRule {
    pub fn score(&self, values: &SignalValues<'_>) -> f64 {
        let v = values.get(self.signal);
        let passed = if self.above {
            v > self.threshold
        } else {
            v < self.threshold
        };
        if passed {
            self.hit
        } else {
            self.miss
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SpeciesProfile {
    pub name: &'static str,
    pub nutritional_value: &'static str,
    pub drought_tolerance: &'static str,
    pub rules: &'static [SignalRule],
}

impl SpeciesProfile {
    /// Sum of rule scores, capped at 1
    pub fn likelihood(&self, values: &SignalValues<'_>) -> f64 {
        self.rules
            .iter()
            .map(|rule| rule.score(values))
            .sum::<f64>()
            .min(1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeciesCandidate {
    pub name: &'static str,
    #[serde(serialize_with = "crate::rounding::dp2")]
    pub likelihood: f64,
    pub nutritional_value: &'static str,
    pub drought_tolerance: &'static str,
}

/// Percent of the whole image per bucket; the three sum to `vegetation_pct`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SpeciesComposition {
    #[serde(serialize_with = "crate::rounding::dp2")]
    pub grass_pct: f64,
    #[serde(serialize_with = "crate::rounding::dp2")]
    pub clover_pct: f64,
    #[serde(serialize_with = "crate::rounding::dp2")]
    pub senescent_pct: f64,
}

impl SpeciesComposition {
    pub const fn get(&self, bucket: SpeciesBucket) -> f64 {
        match bucket {
            SpeciesBucket::Grass => self.grass_pct,
            SpeciesBucket::Clover => self.clover_pct,
            SpeciesBucket::Senescent => self.senescent_pct,
        }
    }

    pub fn total(&self) -> f64 {
        self.grass_pct + self.clover_pct + self.senescent_pct
    }

    /// Largest bucket, `None` without vegetation
    pub fn dominant(&self) -> Option<SpeciesBucket> {
        if self.total() <= 0.0 {
            return None;
        }
        let mut best = SPECIES_REFERENCES[0].bucket;
        for reference in &SPECIES_REFERENCES[1..] {
            if self.get(reference.bucket) > self.get(best) {
                best = reference.bucket;
            }
        }
        Some(best)
    }

    /// Shannon entropy of the bucket shares, normalised to [0, 1]
    pub fn diversity(&self) -> f64 {
        let total = self.total();
        if total <= 0.0 {
            return 0.0;
        }
        let entropy: f64 = SPECIES_REFERENCES
            .iter()
            .map(|r| self.get(r.bucket) / total)
            .filter(|&p| p > 0.0)
            .map(|p| -p * p.ln())
            .sum();
        (entropy / (SPECIES_REFERENCES.len() as f64).ln()).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeciesEstimate {
    pub composition: SpeciesComposition,
    pub dominant: Option<SpeciesBucket>,
    #[serde(serialize_with = "crate::rounding::dp4")]
    pub diversity: f64,
    pub candidates: Vec<SpeciesCandidate>,
}

/// Bucket composition over the vegetation pixels
pub fn composition(mask: &VegetationMask, samples: &[PixelSample]) -> SpeciesComposition {
    let total = mask.len();
    if total == 0 {
        return SpeciesComposition::default();
    }

    let mut counts = [0usize; 3];
    for (sample, label) in samples.iter().zip(mask.labels()) {
        if *label != PixelClass::Vegetation {
            continue;
        }
        counts[nearest_bucket(sample) as usize] += 1;
    }

    let pct = |n: usize| n as f64 / total as f64 * 100.0;
    SpeciesComposition {
        grass_pct: pct(counts[SpeciesBucket::Grass as usize]),
        clover_pct: pct(counts[SpeciesBucket::Clover as usize]),
        senescent_pct: pct(counts[SpeciesBucket::Senescent as usize]),
    }
}

/// Named species whose likelihood clears the reporting floor, best first
pub fn candidates(values: &SignalValues<'_>) -> Vec<SpeciesCandidate> {
    let mut found: Vec<SpeciesCandidate> = SPECIES_PROFILES
        .iter()
        .map(|profile| (profile, profile.likelihood(values)))
        .filter(|(_, likelihood)| *likelihood > CANDIDATE_MIN_LIKELIHOOD)
        .map(|(profile, likelihood)| SpeciesCandidate {
            name: profile.name,
            likelihood,
            nutritional_value: profile.nutritional_value,
            drought_tolerance: profile.drought_tolerance,
        })
        .collect();

    // Stable sort keeps profile order between equal likelihoods
    found.sort_by(|a, b| b.likelihood.total_cmp(&a.likelihood));
    found.truncate(CANDIDATE_MAX_COUNT);
    found
}

pub fn estimate(
    mask: &VegetationMask,
    samples: &[PixelSample],
    features: &FeatureVector,
    indices: &IndexSet,
) -> SpeciesEstimate {
    let composition = composition(mask, samples);
    let values = SignalValues { features, indices };
    log::debug!(
        "species buckets: grass {:.2}% clover {:.2}% senescent {:.2}%",
        composition.grass_pct,
        composition.clover_pct,
        composition.senescent_pct
    );

    SpeciesEstimate {
        dominant: composition.dominant(),
        diversity: composition.diversity(),
        candidates: candidates(&values),
        composition,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_buckets() {
        assert_eq!(nearest_bucket(&PixelSample::from_rgb(34, 139, 34)), SpeciesBucket::Grass);
        assert_eq!(nearest_bucket(&PixelSample::from_rgb(60, 130, 90)), SpeciesBucket::Clover);
    }

    #[test]
    fn test_composition_sums_to_vegetation() {
        let samples: Vec<_> = [(34, 139, 34), (60, 130, 90), (128, 128, 128), (34, 139, 34)]
            .iter()
            .map(|&(r, g, b)| PixelSample::from_rgb(r, g, b))
            .collect();
        let mask = VegetationMask::segment(2, 2, &samples, false);
        let comp = composition(&mask, &samples);
        assert_eq!(comp.grass_pct, 50.0);
        assert_eq!(comp.clover_pct, 25.0);
        assert!((comp.total() - mask.coverage().vegetation_pct).abs() < 1e-9);
        assert_eq!(comp.dominant(), Some(SpeciesBucket::Grass));
    }

    #[test]
    fn test_diversity_bounds() {
        let single = SpeciesComposition {
            grass_pct: 80.0,
            ..Default::default()
        };
        assert_eq!(single.diversity(), 0.0);

        let even = SpeciesComposition {
            grass_pct: 30.0,
            clover_pct: 30.0,
            senescent_pct: 30.0,
        };
        assert!((even.diversity() - 1.0).abs() < 1e-12);
        assert_eq!(SpeciesComposition::default().dominant(), None);
    }

    #[test]
    fn test_dominant_tie_prefers_grass() {
        let tied = SpeciesComposition {
            grass_pct: 40.0,
            clover_pct: 40.0,
            senescent_pct: 0.0,
        };
        assert_eq!(tied.dominant(), Some(SpeciesBucket::Grass));
    }

    #[test]
    fn test_candidates_sorted_and_capped() {
        let features = FeatureVector::from_array([0.5, 0.4, 0.3, 95.0, 0.5, 0.6, 0.35, 0.6, 0.01, 0.9]);
        let indices = IndexSet::default();
        let found = candidates(&SignalValues {
            features: &features,
            indices: &indices,
        });
        assert!(!found.is_empty());
        assert!(found.len() <= CANDIDATE_MAX_COUNT);
        assert!(found.windows(2).all(|w| w[0].likelihood >= w[1].likelihood));
        assert!(found.iter().all(|c| c.likelihood > CANDIDATE_MIN_LIKELIHOOD && c.likelihood <= 1.0));
    }
}
