//! Calibration surface
//!
//! Every threshold, reference colour and weight the pipeline uses is defined
//! here, once. None of these values are learned or adjustable at runtime;
//! changing one changes the algorithm and must bump [`crate::ALGORITHM_VERSION`].

use serde::Serialize;

use crate::color::Lab;
use crate::features::FeatureName;
use crate::species::{SignalRule, SpeciesBucket, SpeciesProfile, SpeciesSignal};

// ---------------------------------------------------------------------------
// Segmentation (4.3)
// ---------------------------------------------------------------------------

/// Pixels darker than this L* are shadow and never canopy
pub const SHADOW_MAX_LIGHTNESS: f64 = 12.0;
/// Minimum excess-green (2g - r - b) for canopy
pub const VEG_MIN_EXG: f64 = 0.06;
/// Minimum NDVI-proxy for canopy
pub const VEG_MIN_NDVI: f64 = 0.05;
/// Senescent matter is yellow: b* at least this
pub const DEAD_MIN_YELLOW: f64 = 15.0;
/// ... and not as red as soil: a* at most this
pub const DEAD_MAX_RED: f64 = 12.0;
/// ... with visible chroma
pub const DEAD_MIN_CHROMA: f64 = 18.0;
/// ... and reasonably bright
pub const DEAD_MIN_LIGHTNESS: f64 = 30.0;

/// Tile layout for patch statistics is TILE_GRID x TILE_GRID
pub const TILE_GRID: u32 = 8;

/// Per-channel standard deviation (normalised units) below which an image is a flat colour
pub const UNIFORM_CHANNEL_STD: f64 = 0.5 / 255.0;

// ---------------------------------------------------------------------------
// Species buckets (4.5). Order is the tie-break priority.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SpeciesReference {
    pub bucket: SpeciesBucket,
    pub lab: Lab,
}

pub const SPECIES_REFERENCES: [SpeciesReference; 3] = [
    SpeciesReference {
        bucket: SpeciesBucket::Grass,
        lab: Lab::new(45.0, -28.0, 38.0),
    },
    SpeciesReference {
        bucket: SpeciesBucket::Clover,
        lab: Lab::new(48.0, -34.0, 14.0),
    },
    SpeciesReference {
        bucket: SpeciesBucket::Senescent,
        lab: Lab::new(58.0, -6.0, 42.0),
    },
];

/// Named species below this likelihood are not reported
pub const CANDIDATE_MIN_LIKELIHOOD: f64 = 0.3;
pub const CANDIDATE_MAX_COUNT: usize = 4;

const fn above(signal: SpeciesSignal, threshold: f64, hit: f64, miss: f64) -> SignalRule {
    SignalRule {
        signal,
        above: true,
        threshold,
        hit,
        miss,
    }
}

const fn below(signal: SpeciesSignal, threshold: f64, hit: f64, miss: f64) -> SignalRule {
    SignalRule {
        signal,
        above: false,
        threshold,
        hit,
        miss,
    }
}

pub const SPECIES_PROFILES: [SpeciesProfile; 6] = [
    SpeciesProfile {
        name: "Perennial Ryegrass",
        nutritional_value: "very_high",
        drought_tolerance: "low",
        rules: &[
            above(SpeciesSignal::Ndvi, 0.15, 0.3, 0.1),
            above(SpeciesSignal::Gli, 0.0, 0.2, 0.05),
            above(SpeciesSignal::GreenRatio, 0.35, 0.25, 0.1),
            above(SpeciesSignal::Saturation, 0.2, 0.15, 0.05),
            above(SpeciesSignal::Brightness, 0.3, 0.1, 0.05),
        ],
    },
    SpeciesProfile {
        name: "Tall Fescue",
        nutritional_value: "high",
        drought_tolerance: "high",
        rules: &[
            above(SpeciesSignal::Ndvi, 0.1, 0.25, 0.05),
            below(SpeciesSignal::Brightness, 0.45, 0.2, 0.05),
            above(SpeciesSignal::GreenRatio, 0.33, 0.2, 0.05),
            below(SpeciesSignal::ColorVariance, 0.15, 0.15, 0.05),
            above(SpeciesSignal::Exg, -0.1, 0.2, 0.1),
        ],
    },
    SpeciesProfile {
        name: "White Clover",
        nutritional_value: "very_high",
        drought_tolerance: "medium",
        rules: &[
            above(SpeciesSignal::Ndvi, 0.2, 0.3, 0.05),
            above(SpeciesSignal::Gli, 0.05, 0.25, 0.05),
            above(SpeciesSignal::GreenRatio, 0.37, 0.2, 0.05),
            above(SpeciesSignal::Saturation, 0.25, 0.15, 0.05),
            below(SpeciesSignal::Uniformity, 0.7, 0.1, 0.05),
        ],
    },
    SpeciesProfile {
        name: "Kikuyu Grass",
        nutritional_value: "medium",
        drought_tolerance: "high",
        rules: &[
            above(SpeciesSignal::Ndvi, 0.1, 0.2, 0.05),
            above(SpeciesSignal::VegetationPct, 50.0, 0.25, 0.1),
            above(SpeciesSignal::Uniformity, 0.6, 0.2, 0.05),
            above(SpeciesSignal::Brightness, 0.3, 0.15, 0.05),
            above(SpeciesSignal::Exg, -0.05, 0.2, 0.1),
        ],
    },
    SpeciesProfile {
        name: "Lucerne/Alfalfa",
        nutritional_value: "very_high",
        drought_tolerance: "high",
        rules: &[
            above(SpeciesSignal::Ndvi, 0.15, 0.25, 0.05),
            above(SpeciesSignal::Gli, 0.02, 0.2, 0.05),
            above(SpeciesSignal::GreenRatio, 0.36, 0.2, 0.05),
            above(SpeciesSignal::Saturation, 0.22, 0.15, 0.05),
            above(SpeciesSignal::Rgbvi, 0.05, 0.2, 0.1),
        ],
    },
    SpeciesProfile {
        name: "Cocksfoot",
        nutritional_value: "high",
        drought_tolerance: "medium",
        rules: &[
            above(SpeciesSignal::Ndvi, 0.08, 0.2, 0.05),
            below(SpeciesSignal::Brightness, 0.5, 0.15, 0.05),
            above(SpeciesSignal::GreenRatio, 0.32, 0.2, 0.1),
            above(SpeciesSignal::NdviStd, 0.1, 0.15, 0.05),
            above(SpeciesSignal::Vari, -0.1, 0.2, 0.1),
        ],
    },
];

// ---------------------------------------------------------------------------
// Biomass ensemble (4.6)
// ---------------------------------------------------------------------------

/// One hand-calibrated linear sub-model over a subset of the feature vector
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SubModel {
    pub name: &'static str,
    pub bias: f64,
    pub weights: &'static [(FeatureName, f64)],
}

impl SubModel {
    /// Linear prediction; negative outputs are floored at zero
    pub fn predict(&self, features: &crate::features::FeatureVector) -> f64 {
        let raw = self
            .weights
            .iter()
            .fold(self.bias, |acc, (name, weight)| acc + features.get(*name) * weight);
        raw.max(0.0)
    }
}

/// Biomass sub-models, kg dry matter per hectare
pub const BIOMASS_SUB_MODELS: [SubModel; 6] = [
    SubModel {
        name: "ndvi_primary",
        bias: 150.0,
        weights: &[
            (FeatureName::NdviMean, 2400.0),
            (FeatureName::EviMean, 600.0),
            (FeatureName::VegetationPct, 12.0),
            (FeatureName::Brightness, -300.0),
        ],
    },
    SubModel {
        name: "coverage_primary",
        bias: 100.0,
        weights: &[
            (FeatureName::VegetationPct, 22.0),
            (FeatureName::GreennessExcess, 600.0),
            (FeatureName::GreenSpatialUniformity, 300.0),
        ],
    },
    SubModel {
        name: "leaf_index",
        bias: 120.0,
        weights: &[
            (FeatureName::GliMean, 2800.0),
            (FeatureName::NdviMean, 1000.0),
            (FeatureName::VegetationPct, 8.0),
        ],
    },
    SubModel {
        name: "color_texture",
        bias: -1000.0,
        weights: &[
            (FeatureName::GreenRatio, 3000.0),
            (FeatureName::SaturationMean, 900.0),
            (FeatureName::ColorVariance, -2000.0),
            (FeatureName::GreenSpatialUniformity, 250.0),
            (FeatureName::VegetationPct, 5.0),
        ],
    },
    SubModel {
        name: "spectral_broad",
        bias: 80.0,
        weights: &[
            (FeatureName::EviMean, 1500.0),
            (FeatureName::GreennessExcess, 900.0),
            (FeatureName::VegetationPct, 10.0),
            (FeatureName::Brightness, 200.0),
        ],
    },
    SubModel {
        name: "canopy_density",
        bias: 50.0,
        weights: &[
            (FeatureName::VegetationPct, 18.0),
            (FeatureName::SaturationMean, 1200.0),
            (FeatureName::GliMean, 800.0),
            (FeatureName::ColorVariance, -1500.0),
        ],
    },
];

/// Plausible upper limit for a pasture, kg DM/ha
pub const MAX_BIOMASS_KG_HA: f64 = 6000.0;
/// Half-width of the band in sub-model standard deviations
pub const BAND_STD_MULTIPLIER: f64 = 1.5;
/// The band is never narrower than this fraction of the estimate ...
pub const MIN_BAND_FRACTION: f64 = 0.08;
/// ... nor than this absolute half-width, kg DM/ha
pub const MIN_BAND_KG_HA: f64 = 50.0;
/// Vegetation cover at which coverage stops limiting confidence, percent
pub const RELIABLE_COVERAGE_PCT: f64 = 50.0;
/// Confidence floor reported for degenerate inputs
pub const MIN_CONFIDENCE: f64 = 0.05;
/// Dead material is counted at this density relative to green canopy
pub const DEAD_BIOMASS_FACTOR: f64 = 0.5;

// ---------------------------------------------------------------------------
// Health (4.7)
// ---------------------------------------------------------------------------

/// (weight, value at which the factor saturates)
pub const HEALTH_COVERAGE: (f64, f64) = (35.0, 80.0);
pub const HEALTH_NDVI: (f64, f64) = (30.0, 0.45);
pub const HEALTH_GREENNESS: (f64, f64) = (20.0, 0.5);
/// Spatial term: share of the tile grid stocked with vegetation (see [`STOCKED_TILE_FRACTION`])
pub const HEALTH_STOCKED_COVER: (f64, f64) = (15.0, 1.0);
/// Tile vegetation fraction at which a tile counts as fully stocked
pub const STOCKED_TILE_FRACTION: f64 = 0.5;

/// Lower score edge of fair, good and excellent
pub const HEALTH_FAIR_MIN: f64 = 40.0;
pub const HEALTH_GOOD_MIN: f64 = 60.0;
pub const HEALTH_EXCELLENT_MIN: f64 = 80.0;
/// Scores this close below a band edge are treated as on the edge
pub const HEALTH_BAND_MARGIN: f64 = 1e-9;

/// NDVI std above which the index is considered noisy
pub const HEALTH_NOISY_NDVI_STD: f64 = 0.3;
/// Vegetation cover below which health is poorly supported, percent
pub const HEALTH_SPARSE_COVERAGE_PCT: f64 = 10.0;

// ---------------------------------------------------------------------------
// Nutrition (15.3)
// ---------------------------------------------------------------------------

/// Crude-protein sub-models, percent of dry matter
pub const PROTEIN_SUB_MODELS: [SubModel; 3] = [
    SubModel {
        name: "protein_green",
        bias: 8.0,
        weights: &[
            (FeatureName::NdviMean, 10.0),
            (FeatureName::GreennessExcess, 6.0),
            (FeatureName::GliMean, 5.0),
            (FeatureName::VegetationPct, 0.04),
        ],
    },
    SubModel {
        name: "protein_spectral",
        bias: 4.0,
        weights: &[
            (FeatureName::EviMean, 8.0),
            (FeatureName::GreenRatio, 15.0),
            (FeatureName::SaturationMean, 4.0),
        ],
    },
    SubModel {
        name: "protein_coverage",
        bias: 7.0,
        weights: &[
            (FeatureName::VegetationPct, 0.08),
            (FeatureName::Brightness, 3.0),
            (FeatureName::GreenSpatialUniformity, 2.0),
        ],
    },
];

pub const CRUDE_PROTEIN_RANGE: (f64, f64) = (5.0, 28.0);

// ---------------------------------------------------------------------------
// Sustainability (15.5)
// ---------------------------------------------------------------------------

/// Carbon fraction of dry matter
pub const CARBON_FRACTION: f64 = 0.4;
/// CO2 mass per unit carbon mass (44/12)
pub const CO2_PER_CARBON: f64 = 3.67;

/// The calibration surface in serialisable form
#[derive(Debug, Clone, Serialize)]
pub struct CalibrationSurface {
    pub algorithm_version: &'static str,
    pub segmentation: SegmentationThresholds,
    pub tile_grid: u32,
    pub stocked_tile_fraction: f64,
    pub species_references: &'static [SpeciesReference],
    pub species_profiles: &'static [SpeciesProfile],
    pub biomass_sub_models: &'static [SubModel],
    pub protein_sub_models: &'static [SubModel],
    pub max_biomass_kg_ha: f64,
    pub band_std_multiplier: f64,
    pub min_band_fraction: f64,
    pub min_band_kg_ha: f64,
    pub health_weights: [(&'static str, f64, f64); 4],
    pub health_bands: [(&'static str, f64); 3],
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SegmentationThresholds {
    pub shadow_max_lightness: f64,
    pub veg_min_exg: f64,
    pub veg_min_ndvi: f64,
    pub dead_min_yellow: f64,
    pub dead_max_red: f64,
    pub dead_min_chroma: f64,
    pub dead_min_lightness: f64,
}

pub fn surface() -> CalibrationSurface {
    CalibrationSurface {
        algorithm_version: crate::ALGORITHM_VERSION,
        segmentation: SegmentationThresholds {
            shadow_max_lightness: SHADOW_MAX_LIGHTNESS,
            veg_min_exg: VEG_MIN_EXG,
            veg_min_ndvi: VEG_MIN_NDVI,
            dead_min_yellow: DEAD_MIN_YELLOW,
            dead_max_red: DEAD_MAX_RED,
            dead_min_chroma: DEAD_MIN_CHROMA,
            dead_min_lightness: DEAD_MIN_LIGHTNESS,
        },
        tile_grid: TILE_GRID,
        stocked_tile_fraction: STOCKED_TILE_FRACTION,
        species_references: &SPECIES_REFERENCES,
        species_profiles: &SPECIES_PROFILES,
        biomass_sub_models: &BIOMASS_SUB_MODELS,
        protein_sub_models: &PROTEIN_SUB_MODELS,
        max_biomass_kg_ha: MAX_BIOMASS_KG_HA,
        band_std_multiplier: BAND_STD_MULTIPLIER,
        min_band_fraction: MIN_BAND_FRACTION,
        min_band_kg_ha: MIN_BAND_KG_HA,
        health_weights: [
            ("vegetation_coverage", HEALTH_COVERAGE.0, HEALTH_COVERAGE.1),
            ("ndvi", HEALTH_NDVI.0, HEALTH_NDVI.1),
            ("greenness_excess", HEALTH_GREENNESS.0, HEALTH_GREENNESS.1),
            ("stocked_tile_cover", HEALTH_STOCKED_COVER.0, HEALTH_STOCKED_COVER.1),
        ],
        health_bands: [
            ("fair", HEALTH_FAIR_MIN),
            ("good", HEALTH_GOOD_MIN),
            ("excellent", HEALTH_EXCELLENT_MIN),
        ],
    }
}
