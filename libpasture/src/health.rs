//! Health score, classification and the grazing lookup that follows from it

use serde::Serialize;

use crate::calibration::{
    HEALTH_BAND_MARGIN, HEALTH_COVERAGE, HEALTH_EXCELLENT_MIN, HEALTH_FAIR_MIN, HEALTH_GOOD_MIN,
    HEALTH_GREENNESS, HEALTH_NDVI, HEALTH_NOISY_NDVI_STD, HEALTH_SPARSE_COVERAGE_PCT,
    HEALTH_STOCKED_COVER, MIN_CONFIDENCE,
};
use crate::features::FeatureVector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthClass {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl HealthClass {
    /// Band for a score. Scores within [`HEALTH_BAND_MARGIN`] below an edge
    /// belong to the upper band, so summation-order drift cannot flip a class.
    pub fn from_score(score: f64) -> Self {
        let at_least = |edge: f64| score + HEALTH_BAND_MARGIN >= edge;
        if at_least(HEALTH_EXCELLENT_MIN) {
            Self::Excellent
        } else if at_least(HEALTH_GOOD_MIN) {
            Self::Good
        } else if at_least(HEALTH_FAIR_MIN) {
            Self::Fair
        } else {
            Self::Poor
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Poor => "poor",
            Self::Fair => "fair",
            Self::Good => "good",
            Self::Excellent => "excellent",
        }
    }
}

impl std::fmt::Display for HealthClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One weighted input to the score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthFactor {
    pub label: &'static str,
    pub raw: f64,
    /// `raw` scaled by its saturation point, in [0, 1]
    pub normalized: f64,
    pub weight: f64,
    /// Points above (positive) or below (negative) a neutral mid-scale input
    pub contribution: f64,
}

impl HealthFactor {
    fn describe(&self) -> String {
        let detail = match self.label {
            "vegetation coverage" => format!("{:.1}%", self.raw),
            _ => format!("{:.3}", self.raw),
        };
        format!("{:+.1} {} ({detail})", self.contribution, self.label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthAssessment {
    pub classification: HealthClass,
    #[serde(serialize_with = "crate::rounding::dp1")]
    pub score: f64,
    #[serde(serialize_with = "crate::rounding::dp2")]
    pub confidence: f64,
    /// Signed contributions, largest magnitude first
    pub factors: Vec<String>,
}

impl HealthAssessment {
    pub fn with_min_confidence(mut self) -> Self {
        self.confidence = MIN_CONFIDENCE;
        self
    }
}

/// The four weighted inputs, in calibration order. Each is non-decreasing in
/// per-pixel greenness. The spatial term is `PatchStats::stocked_cover`, not
/// `green_spatial_uniformity`, which is 1 for an image with no vegetation.
pub fn factors(features: &FeatureVector, stocked_cover: f64) -> [HealthFactor; 4] {
    let inputs = [
        ("vegetation coverage", features.vegetation_pct(), HEALTH_COVERAGE),
        ("ndvi", features.ndvi_mean(), HEALTH_NDVI),
        ("greenness excess", features.greenness_excess(), HEALTH_GREENNESS),
        ("stocked tile cover", stocked_cover, HEALTH_STOCKED_COVER),
    ];
    let total_weight: f64 = inputs.iter().map(|(_, _, (w, _))| w).sum();

    inputs.map(|(label, raw, (weight, saturation))| {
        let normalized = (raw / saturation).clamp(0.0, 1.0);
        HealthFactor {
            label,
            raw,
            normalized,
            weight,
            contribution: weight * (normalized - 0.5) * 100.0 / total_weight,
        }
    })
}

/// Weighted score in [0, 100]
pub fn score(factors: &[HealthFactor]) -> f64 {
    let total_weight: f64 = factors.iter().map(|f| f.weight).sum();
    if total_weight <= 0.0 {
        return 0.0;
    }
    let weighted: f64 = factors.iter().map(|f| f.weight * f.normalized).sum();
    (100.0 * weighted / total_weight).clamp(0.0, 100.0)
}

pub fn assess(features: &FeatureVector, stocked_cover: f64, ndvi_std: f64) -> HealthAssessment {
    let factors = factors(features, stocked_cover);
    let score = score(&factors);

    let ndvi_confidence: f64 = if ndvi_std < HEALTH_NOISY_NDVI_STD { 0.8 } else { 0.5 };
    let coverage_confidence: f64 = if features.vegetation_pct() > HEALTH_SPARSE_COVERAGE_PCT {
        0.9
    } else {
        0.5
    };
    let confidence = ((ndvi_confidence + coverage_confidence) / 2.0 + 0.1).min(1.0);

    let mut ranked = factors.to_vec();
    ranked.sort_by(|a, b| b.contribution.abs().total_cmp(&a.contribution.abs()));

    HealthAssessment {
        classification: HealthClass::from_score(score),
        score,
        confidence,
        factors: ranked.iter().map(HealthFactor::describe).collect(),
    }
}

/// Management guidance keyed by health class
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GrazingRecommendation {
    pub recommendation: &'static str,
    pub grazing_days: u32,
    pub rest_days: u32,
    pub stocking_rate_au_ha: f64,
    pub feed_savings_monthly: f64,
}

impl GrazingRecommendation {
    pub const fn for_class(class: HealthClass) -> Self {
        match class {
            HealthClass::Poor => Self {
                recommendation: "Rest pasture. Consider reseeding and soil testing.",
                grazing_days: 0,
                rest_days: 60,
                stocking_rate_au_ha: 0.3,
                feed_savings_monthly: 0.0,
            },
            HealthClass::Fair => Self {
                recommendation: "Light grazing only. Monitor recovery closely.",
                grazing_days: 3,
                rest_days: 35,
                stocking_rate_au_ha: 0.8,
                feed_savings_monthly: 50.0,
            },
            HealthClass::Good => Self {
                recommendation: "Normal rotational grazing. Maintain current management.",
                grazing_days: 7,
                rest_days: 21,
                stocking_rate_au_ha: 1.5,
                feed_savings_monthly: 150.0,
            },
            HealthClass::Excellent => Self {
                recommendation: "Optimal conditions. Can increase stocking rate temporarily.",
                grazing_days: 10,
                rest_days: 14,
                stocking_rate_au_ha: 2.5,
                feed_savings_monthly: 300.0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_edges() {
        assert_eq!(HealthClass::from_score(0.0), HealthClass::Poor);
        assert_eq!(HealthClass::from_score(39.9), HealthClass::Poor);
        assert_eq!(HealthClass::from_score(40.0), HealthClass::Fair);
        assert_eq!(HealthClass::from_score(60.0 - 1e-12), HealthClass::Good);
        assert_eq!(HealthClass::from_score(79.99), HealthClass::Good);
        assert_eq!(HealthClass::from_score(80.0), HealthClass::Excellent);
        assert_eq!(HealthClass::from_score(100.0), HealthClass::Excellent);
    }

    #[test]
    fn test_grey_scores_poor() {
        let grey = FeatureVector::from_array([0.0, 0.0, 0.0, 0.0, 1.0 / 3.0, 0.0, 0.5, 0.0, 0.0, 1.0]);
        let health = assess(&grey, 0.0, 0.0);
        assert_eq!(health.score, 0.0);
        assert_eq!(health.classification, HealthClass::Poor);
        assert_eq!(health.factors.len(), 4);
    }

    #[test]
    fn test_lush_scores_excellent() {
        let lush = FeatureVector::from_array([0.57, 0.5, 0.6, 100.0, 0.67, 0.82, 0.27, 0.75, 0.0, 1.0]);
        let health = assess(&lush, 1.0, 0.0);
        assert_eq!(health.score, 100.0);
        assert_eq!(health.classification, HealthClass::Excellent);
        assert!((health.confidence - 0.95).abs() < 1e-12);
        assert!(health.factors[0].starts_with("+17.5 vegetation coverage"));
    }

    #[test]
    fn test_confidence_drops_for_sparse_noisy_canopy() {
        let sparse = FeatureVector::from_array([0.1, 0.05, 0.05, 5.0, 0.35, 0.05, 0.4, 0.2, 0.02, 0.3]);
        let health = assess(&sparse, 0.1, 0.5);
        assert!((health.confidence - 0.6).abs() < 1e-12);

        let steady = assess(&sparse, 0.1, 0.05);
        assert!(steady.confidence > health.confidence);
    }

    #[test]
    fn test_first_green_tile_raises_score() {
        // All-bare image, then one of 64 tiles fully green
        let bare = FeatureVector::from_array([-0.2, 0.0, 0.0, 0.0, 0.33, -0.1, 0.5, 0.2, 0.01, 1.0]);
        let sprout = FeatureVector::from_array([-0.19, 0.0, 0.0, 1.56, 0.34, -0.09, 0.5, 0.2, 0.01, 0.0]);
        let before = assess(&bare, 0.0, 0.1).score;
        let after = assess(&sprout, 1.0 / 64.0, 0.1).score;
        assert!(after >= before, "{before} -> {after}");
    }

    #[test]
    fn test_grazing_lookup() {
        assert_eq!(GrazingRecommendation::for_class(HealthClass::Poor).rest_days, 60);
        let fair = GrazingRecommendation::for_class(HealthClass::Fair);
        assert_eq!((fair.grazing_days, fair.rest_days), (3, 35));
        let excellent = GrazingRecommendation::for_class(HealthClass::Excellent);
        assert_eq!((excellent.grazing_days, excellent.rest_days), (10, 14));
        let savings = [HealthClass::Poor, HealthClass::Fair, HealthClass::Good, HealthClass::Excellent]
            .map(|class| GrazingRecommendation::for_class(class).feed_savings_monthly);
        assert_eq!(savings, [0.0, 50.0, 150.0, 300.0]);
    }
}
