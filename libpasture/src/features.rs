//! The feature vector: ten named numbers, the stable numeric contract between
//! the pipeline and its consumers.

use serde::{Deserialize, Serialize};

use crate::indices::{IndexSet, VegetationIndex};
use crate::rounding::round_dp;
use crate::segmentation::CoverageStats;
use crate::tiles::{ColorStats, PatchStats};

/// Names of the feature vector components, in contract order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureName {
    NdviMean,
    EviMean,
    GliMean,
    VegetationPct,
    GreenRatio,
    GreennessExcess,
    Brightness,
    SaturationMean,
    ColorVariance,
    GreenSpatialUniformity,
}

impl FeatureName {
    pub const COUNT: usize = 10;

    pub const ALL: [Self; Self::COUNT] = [
        Self::NdviMean,
        Self::EviMean,
        Self::GliMean,
        Self::VegetationPct,
        Self::GreenRatio,
        Self::GreennessExcess,
        Self::Brightness,
        Self::SaturationMean,
        Self::ColorVariance,
        Self::GreenSpatialUniformity,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::NdviMean => "ndvi_mean",
            Self::EviMean => "evi_mean",
            Self::GliMean => "gli_mean",
            Self::VegetationPct => "vegetation_pct",
            Self::GreenRatio => "green_ratio",
            Self::GreennessExcess => "greenness_excess",
            Self::Brightness => "brightness",
            Self::SaturationMean => "saturation_mean",
            Self::ColorVariance => "color_variance",
            Self::GreenSpatialUniformity => "green_spatial_uniformity",
        }
    }
}

/// Immutable once built. Fields are private; read them through the accessors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    #[serde(serialize_with = "crate::rounding::dp4")]
    ndvi_mean: f64,
    #[serde(serialize_with = "crate::rounding::dp4")]
    evi_mean: f64,
    #[serde(serialize_with = "crate::rounding::dp4")]
    gli_mean: f64,
    #[serde(serialize_with = "crate::rounding::dp4")]
    vegetation_pct: f64,
    #[serde(serialize_with = "crate::rounding::dp4")]
    green_ratio: f64,
    #[serde(serialize_with = "crate::rounding::dp4")]
    greenness_excess: f64,
    #[serde(serialize_with = "crate::rounding::dp4")]
    brightness: f64,
    #[serde(serialize_with = "crate::rounding::dp4")]
    saturation_mean: f64,
    #[serde(serialize_with = "crate::rounding::dp4")]
    color_variance: f64,
    #[serde(serialize_with = "crate::rounding::dp4")]
    green_spatial_uniformity: f64,
}

impl FeatureVector {
    /// Copy the ten values out of the earlier stages. No computation happens here.
    pub fn build(
        indices: &IndexSet,
        coverage: &CoverageStats,
        color: &ColorStats,
        patches: &PatchStats,
    ) -> Self {
        Self {
            ndvi_mean: indices.mean(VegetationIndex::Ndvi),
            evi_mean: indices.mean(VegetationIndex::Evi),
            gli_mean: indices.mean(VegetationIndex::Gli),
            vegetation_pct: coverage.vegetation_pct,
            green_ratio: color.green_ratio,
            greenness_excess: color.greenness_excess,
            brightness: color.brightness,
            saturation_mean: color.saturation_mean,
            color_variance: patches.color_variance,
            green_spatial_uniformity: patches.spatial_uniformity,
        }
    }

    /// Rebuild from raw values in [`FeatureName::ALL`] order
    pub const fn from_array(values: [f64; FeatureName::COUNT]) -> Self {
        Self {
            ndvi_mean: values[0],
            evi_mean: values[1],
            gli_mean: values[2],
            vegetation_pct: values[3],
            green_ratio: values[4],
            greenness_excess: values[5],
            brightness: values[6],
            saturation_mean: values[7],
            color_variance: values[8],
            green_spatial_uniformity: values[9],
        }
    }

    pub const fn get(&self, name: FeatureName) -> f64 {
        match name {
            FeatureName::NdviMean => self.ndvi_mean,
            FeatureName::EviMean => self.evi_mean,
            FeatureName::GliMean => self.gli_mean,
            FeatureName::VegetationPct => self.vegetation_pct,
            FeatureName::GreenRatio => self.green_ratio,
            FeatureName::GreennessExcess => self.greenness_excess,
            FeatureName::Brightness => self.brightness,
            FeatureName::SaturationMean => self.saturation_mean,
            FeatureName::ColorVariance => self.color_variance,
            FeatureName::GreenSpatialUniformity => self.green_spatial_uniformity,
        }
    }

    pub fn to_array(&self) -> [f64; FeatureName::COUNT] {
        FeatureName::ALL.map(|name| self.get(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (FeatureName, f64)> + '_ {
        FeatureName::ALL.iter().map(|&name| (name, self.get(name)))
    }

    pub const fn ndvi_mean(&self) -> f64 {
        self.ndvi_mean
    }

    pub const fn evi_mean(&self) -> f64 {
        self.evi_mean
    }

    pub const fn gli_mean(&self) -> f64 {
        self.gli_mean
    }

    pub const fn vegetation_pct(&self) -> f64 {
        self.vegetation_pct
    }

    pub const fn green_ratio(&self) -> f64 {
        self.green_ratio
    }

    pub const fn greenness_excess(&self) -> f64 {
        self.greenness_excess
    }

    pub const fn brightness(&self) -> f64 {
        self.brightness
    }

    pub const fn saturation_mean(&self) -> f64 {
        self.saturation_mean
    }

    pub const fn color_variance(&self) -> f64 {
        self.color_variance
    }

    pub const fn green_spatial_uniformity(&self) -> f64 {
        self.green_spatial_uniformity
    }

    pub fn is_finite(&self) -> bool {
        self.iter().all(|(_, v)| v.is_finite())
    }

    /// Index means as they appear at the top level of a response, derived from
    /// this vector alone
    pub fn display_indices(&self) -> DisplayIndices {
        DisplayIndices {
            ndvi: round_dp(self.ndvi_mean, 4),
            evi: round_dp(self.evi_mean, 4),
            gli: round_dp(self.gli_mean, 4),
        }
    }
}

/// Rounded index means reproducible from a stored [`FeatureVector`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DisplayIndices {
    pub ndvi: f64,
    pub evi: f64,
    pub gli: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_order_matches_names() {
        let values = [0.1, 0.2, 0.3, 40.0, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0];
        let fv = FeatureVector::from_array(values);
        for (i, name) in FeatureName::ALL.iter().enumerate() {
            assert_eq!(fv.get(*name), values[i], "{}", name.name());
        }
        assert_eq!(fv.to_array(), values);
    }

    #[test]
    fn test_serialised_field_names() {
        let fv = FeatureVector::from_array([0.123_456, 0.0, 0.0, 12.345_67, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
        let json = serde_json::to_value(fv).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object.len(), FeatureName::COUNT);
        for name in FeatureName::ALL {
            assert!(object.contains_key(name.name()), "missing {}", name.name());
        }
        assert_eq!(json["ndvi_mean"], 0.1235);
        assert_eq!(json["vegetation_pct"], 12.3457);
    }
}
