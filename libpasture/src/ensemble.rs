//! Biomass ensemble
//!
//! A fixed set of hand-calibrated linear sub-models is evaluated over the
//! feature vector. The point estimate is their mean, the uncertainty band comes
//! from their spread, and confidence falls with both disagreement and weak
//! segmentation support.

use serde::Serialize;

use crate::calibration::{
    SubModel, BAND_STD_MULTIPLIER, BIOMASS_SUB_MODELS, DEAD_BIOMASS_FACTOR, MAX_BIOMASS_KG_HA,
    MIN_BAND_FRACTION, MIN_BAND_KG_HA, MIN_CONFIDENCE, RELIABLE_COVERAGE_PCT,
};
use crate::features::FeatureVector;
use crate::segmentation::CoverageStats;
use crate::species::SpeciesComposition;

pub const BIOMASS_UNIT: &str = "kg_dm_ha";

/// Raw output of one ensemble evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleOutput {
    pub predictions: Vec<(&'static str, f64)>,
    pub mean: f64,
    /// Population std of the predictions
    pub std: f64,
}

impl EnsembleOutput {
    /// `[min, max]` of the raw predictions; `[0, 0]` for an empty ensemble
    pub fn range(&self) -> [f64; 2] {
        if self.predictions.is_empty() {
            return [0.0, 0.0];
        }
        self.predictions
            .iter()
            .fold([f64::INFINITY, f64::NEG_INFINITY], |[lo, hi], &(_, p)| [lo.min(p), hi.max(p)])
    }

    /// Coefficient of variation; 1 when the mean is not positive
    pub fn cv(&self) -> f64 {
        if self.mean > 0.0 {
            self.std / self.mean
        } else {
            1.0
        }
    }
}

/// Evaluate every sub-model in declaration order
pub fn run_ensemble(models: &[SubModel], features: &FeatureVector) -> EnsembleOutput {
    let predictions: Vec<(&'static str, f64)> =
        models.iter().map(|m| (m.name, m.predict(features))).collect();

    let n = predictions.len().max(1) as f64;
    let mean = predictions.iter().map(|(_, p)| p).sum::<f64>() / n;
    let variance = predictions
        .iter()
        .map(|(_, p)| (p - mean).powi(2))
        .sum::<f64>()
        / n;

    EnsembleOutput {
        predictions,
        mean,
        std: variance.sqrt(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubModelPrediction {
    pub name: &'static str,
    #[serde(serialize_with = "crate::rounding::dp1")]
    pub prediction: f64,
}

/// Split of the point estimate, kg DM/ha. `green + dead <= total`; clover is part of green.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BiomassComponents {
    #[serde(serialize_with = "crate::rounding::dp1")]
    pub green: f64,
    #[serde(serialize_with = "crate::rounding::dp1")]
    pub dead: f64,
    #[serde(serialize_with = "crate::rounding::dp1")]
    pub clover: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BiomassEstimate {
    #[serde(serialize_with = "crate::rounding::dp1")]
    pub value: f64,
    #[serde(serialize_with = "crate::rounding::dp1")]
    pub lower_bound: f64,
    #[serde(serialize_with = "crate::rounding::dp1")]
    pub upper_bound: f64,
    #[serde(serialize_with = "crate::rounding::dp4")]
    pub confidence: f64,
    pub unit: &'static str,
    #[serde(serialize_with = "crate::rounding::dp1")]
    pub ensemble_std: f64,
    pub sub_models: Vec<SubModelPrediction>,
    #[serde(serialize_with = "crate::rounding::dp1_pair")]
    pub predictions_range: [f64; 2],
    pub components: BiomassComponents,
}

impl BiomassEstimate {
    /// Pin confidence to the floor reported for degenerate inputs
    pub fn with_min_confidence(mut self) -> Self {
        self.confidence = MIN_CONFIDENCE;
        self
    }

    pub fn is_consistent(&self) -> bool {
        let finite = [self.value, self.lower_bound, self.upper_bound, self.confidence, self.ensemble_std]
            .iter()
            .chain(self.predictions_range.iter())
            .all(|v| v.is_finite());
        finite
            && self.predictions_range[0] <= self.predictions_range[1]
            && self.lower_bound >= 0.0
            && self.lower_bound <= self.value
            && self.value <= self.upper_bound
            && (0.0..=1.0).contains(&self.confidence)
    }
}

/// Half-width of the uncertainty band around `value`
pub fn band_half_width(value: f64, std: f64) -> f64 {
    (BAND_STD_MULTIPLIER * std)
        .max(MIN_BAND_FRACTION * value)
        .max(MIN_BAND_KG_HA)
}

/// How far the segmentation can be trusted, in [0.25, 1]
pub fn coverage_reliability(vegetation_pct: f64, uniformity: f64) -> f64 {
    let coverage = (vegetation_pct / RELIABLE_COVERAGE_PCT).clamp(0.0, 1.0);
    (0.5 + 0.5 * coverage) * (0.5 + 0.5 * uniformity.clamp(0.0, 1.0))
}

pub fn estimate(
    features: &FeatureVector,
    coverage: &CoverageStats,
    composition: &SpeciesComposition,
) -> BiomassEstimate {
    let output = run_ensemble(&BIOMASS_SUB_MODELS, features);
    let value = output.mean.clamp(0.0, MAX_BIOMASS_KG_HA);

    let half = band_half_width(value, output.std);
    let lower_bound = (value - half).max(0.0);
    let upper_bound = (value + half).min(MAX_BIOMASS_KG_HA).max(value);

    let agreement = 1.0 / (1.0 + output.cv());
    let reliability =
        coverage_reliability(features.vegetation_pct(), features.green_spatial_uniformity());
    let confidence = (agreement * reliability).clamp(MIN_CONFIDENCE, 1.0);

    let components = BiomassComponents {
        green: value * coverage.vegetation_pct / 100.0,
        dead: value * coverage.dead_pct / 100.0 * DEAD_BIOMASS_FACTOR,
        clover: value * composition.clover_pct / 100.0,
    };

    log::debug!(
        "biomass ensemble: mean {:.1} std {:.1} over {} sub-models",
        output.mean,
        output.std,
        output.predictions.len()
    );

    BiomassEstimate {
        value,
        lower_bound,
        upper_bound,
        confidence,
        unit: BIOMASS_UNIT,
        ensemble_std: output.std,
        predictions_range: output.range(),
        sub_models: output
            .predictions
            .into_iter()
            .map(|(name, prediction)| SubModelPrediction { name, prediction })
            .collect(),
        components,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coverage(vegetation_pct: f64, dead_pct: f64) -> CoverageStats {
        CoverageStats {
            vegetation_pct,
            dead_pct,
            bare_pct: 100.0 - vegetation_pct - dead_pct,
            shadow_pct: 0.0,
        }
    }

    #[test]
    fn test_band_never_exact() {
        assert_eq!(band_half_width(0.0, 0.0), MIN_BAND_KG_HA);
        assert!((band_half_width(2000.0, 0.0) - 160.0).abs() < 1e-9);
        assert!((band_half_width(2000.0, 400.0) - 600.0).abs() < 1e-9);
    }

    #[test]
    fn test_grey_features_give_low_nonnegative_estimate() {
        // Mid-grey: no vegetation, perfectly uniform absence
        let grey = FeatureVector::from_array([0.0, 0.0, 0.0, 0.0, 1.0 / 3.0, 0.0, 0.502, 0.0, 0.0, 1.0]);
        let estimate = estimate(&grey, &coverage(0.0, 0.0), &SpeciesComposition::default());
        assert!(estimate.is_consistent());
        assert!(estimate.value < 500.0);
        assert_eq!(estimate.sub_models.len(), BIOMASS_SUB_MODELS.len());
        let [lo, hi] = estimate.predictions_range;
        assert!(estimate.sub_models.iter().all(|m| lo <= m.prediction && m.prediction <= hi));
        assert!(estimate.sub_models.iter().any(|m| m.prediction == lo));
        assert!(estimate.sub_models.iter().any(|m| m.prediction == hi));
        assert_eq!(estimate.components.green, 0.0);
    }

    #[test]
    fn test_range_of_ensemble_output() {
        let output = EnsembleOutput {
            predictions: vec![("a", 1200.0), ("b", 800.0), ("c", 1500.0)],
            mean: 1166.7,
            std: 0.0,
        };
        assert_eq!(output.range(), [800.0, 1500.0]);

        let empty = EnsembleOutput {
            predictions: Vec::new(),
            mean: 0.0,
            std: 0.0,
        };
        assert_eq!(empty.range(), [0.0, 0.0]);
    }

    #[test]
    fn test_value_clamped_to_plausible_maximum() {
        let absurd = FeatureVector::from_array([1.0, 1.0, 1.0, 1000.0, 1.0, 2.0, 1.0, 1.0, 0.0, 1.0]);
        let estimate = estimate(&absurd, &coverage(100.0, 0.0), &SpeciesComposition::default());
        assert_eq!(estimate.value, MAX_BIOMASS_KG_HA);
        assert_eq!(estimate.upper_bound, MAX_BIOMASS_KG_HA);
        assert!(estimate.is_consistent());
    }

    #[test]
    fn test_components_do_not_exceed_total() {
        let features = FeatureVector::from_array([0.3, 0.2, 0.2, 60.0, 0.4, 0.3, 0.4, 0.4, 0.01, 0.8]);
        let composition = SpeciesComposition {
            grass_pct: 45.0,
            clover_pct: 15.0,
            senescent_pct: 0.0,
        };
        let estimate = estimate(&features, &coverage(60.0, 40.0), &composition);
        let c = estimate.components;
        assert!(c.green + c.dead <= estimate.value + 1e-9);
        assert!(c.clover <= c.green);
    }

    #[test]
    fn test_min_confidence_override() {
        let features = FeatureVector::from_array([0.5; 10]);
        let estimate = estimate(&features, &coverage(50.0, 0.0), &SpeciesComposition::default())
            .with_min_confidence();
        assert_eq!(estimate.confidence, MIN_CONFIDENCE);
    }
}
