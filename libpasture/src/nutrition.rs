//! Forage quality and sustainability proxies.
//!
//! Both are documented transforms of the same image features. They are
//! approximations and not a substitute for a laboratory forage test.

use serde::Serialize;

use crate::calibration::{CARBON_FRACTION, CO2_PER_CARBON, CRUDE_PROTEIN_RANGE, PROTEIN_SUB_MODELS};
use crate::ensemble::run_ensemble;
use crate::features::FeatureVector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QualityGrade {
    A,
    B,
    C,
    D,
}

impl QualityGrade {
    pub fn from_score(score: f64) -> Self {
        if score > 110.0 {
            Self::A
        } else if score > 85.0 {
            Self::B
        } else if score > 60.0 {
            Self::C
        } else {
            Self::D
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NutritionProfile {
    #[serde(serialize_with = "crate::rounding::dp1")]
    pub crude_protein_pct: f64,
    #[serde(serialize_with = "crate::rounding::dp1")]
    pub metabolizable_energy_mj_kg: f64,
    #[serde(serialize_with = "crate::rounding::dp1")]
    pub digestibility_pct: f64,
    #[serde(serialize_with = "crate::rounding::dp1")]
    pub fiber_ndf_pct: f64,
    pub quality_grade: QualityGrade,
    #[serde(serialize_with = "crate::rounding::dp2")]
    pub protein_uncertainty: f64,
}

pub fn estimate(features: &FeatureVector) -> NutritionProfile {
    let protein = run_ensemble(&PROTEIN_SUB_MODELS, features);
    let (lo, hi) = CRUDE_PROTEIN_RANGE;
    let cp = protein.mean.clamp(lo, hi);

    let me = 6.0 + 0.3 * (cp - 5.0);
    let digestibility = 45.0 + 1.5 * cp;
    let quality = 2.0 * cp + 5.0 * me + 0.3 * digestibility;

    NutritionProfile {
        crude_protein_pct: cp,
        metabolizable_energy_mj_kg: me,
        digestibility_pct: digestibility,
        fiber_ndf_pct: 65.0 - 1.2 * cp,
        quality_grade: QualityGrade::from_score(quality),
        protein_uncertainty: protein.cv(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SustainabilityMetrics {
    #[serde(serialize_with = "crate::rounding::dp2")]
    pub carbon_stock_t_co2e_ha: f64,
    #[serde(serialize_with = "crate::rounding::dp1")]
    pub water_retention_mm: f64,
    #[serde(serialize_with = "crate::rounding::dp2")]
    pub soil_health_index: f64,
    #[serde(serialize_with = "crate::rounding::dp2")]
    pub biodiversity_index: f64,
    #[serde(serialize_with = "crate::rounding::dp2")]
    pub ground_cover_index: f64,
}

/// Inputs drawn from the other scorers
#[derive(Debug, Clone, Copy)]
pub struct SustainabilityInputs {
    pub biomass_kg_ha: f64,
    pub health_score: f64,
    pub diversity: f64,
    pub candidate_count: usize,
}

pub fn sustainability(features: &FeatureVector, inputs: SustainabilityInputs) -> SustainabilityMetrics {
    let biomass_t = inputs.biomass_kg_ha / 1000.0;
    let ndvi = features.ndvi_mean();
    let vegetation = features.vegetation_pct();

    SustainabilityMetrics {
        carbon_stock_t_co2e_ha: biomass_t * CARBON_FRACTION * CO2_PER_CARBON,
        water_retention_mm: (0.6 * vegetation + 15.0 * ndvi).max(0.0),
        soil_health_index: ((inputs.health_score / 100.0 + ndvi + 1.0) / 3.0).clamp(0.0, 1.0),
        biodiversity_index: (0.6 * inputs.diversity
            + 0.2 * inputs.candidate_count as f64 / 4.0
            + 2.0 * features.color_variance())
        .clamp(0.0, 1.0),
        ground_cover_index: (vegetation / 100.0).clamp(0.0, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protein_clamped_and_derived() {
        let bare = FeatureVector::from_array([-1.0, -1.0, -1.0, 0.0, 0.0, -2.0, 0.0, 0.0, 0.0, 0.0]);
        let nutrition = estimate(&bare);
        assert_eq!(nutrition.crude_protein_pct, 5.0);
        assert!((nutrition.metabolizable_energy_mj_kg - 6.0).abs() < 1e-12);
        assert!((nutrition.digestibility_pct - 52.5).abs() < 1e-12);
        assert!((nutrition.fiber_ndf_pct - 59.0).abs() < 1e-12);
        // 10 + 30 + 15.75
        assert_eq!(nutrition.quality_grade, QualityGrade::D);
    }

    #[test]
    fn test_grade_bands() {
        assert_eq!(QualityGrade::from_score(110.5), QualityGrade::A);
        assert_eq!(QualityGrade::from_score(110.0), QualityGrade::B);
        assert_eq!(QualityGrade::from_score(85.5), QualityGrade::B);
        assert_eq!(QualityGrade::from_score(61.0), QualityGrade::C);
        assert_eq!(QualityGrade::from_score(60.0), QualityGrade::D);
    }

    #[test]
    fn test_sustainability_ranges() {
        let features = FeatureVector::from_array([0.4, 0.3, 0.3, 80.0, 0.45, 0.5, 0.35, 0.5, 0.02, 0.9]);
        let metrics = sustainability(
            &features,
            SustainabilityInputs {
                biomass_kg_ha: 2500.0,
                health_score: 85.0,
                diversity: 0.5,
                candidate_count: 3,
            },
        );
        assert!((metrics.carbon_stock_t_co2e_ha - 2.5 * 0.4 * 3.67).abs() < 1e-9);
        assert!((metrics.water_retention_mm - 54.0).abs() < 1e-9);
        assert!((metrics.ground_cover_index - 0.8).abs() < 1e-12);
        for v in [metrics.soil_health_index, metrics.biodiversity_index] {
            assert!((0.0..=1.0).contains(&v));
        }
    }
}
