use serde::Serialize;

use crate::ensemble::BiomassEstimate;
use crate::error::{AnalysisError, Result};
use crate::features::{DisplayIndices, FeatureVector};
use crate::health::{GrazingRecommendation, HealthAssessment};
use crate::indices::{IndexSet, VegetationIndex};
use crate::metadata::AnalysisMetadata;
use crate::nutrition::{NutritionProfile, SustainabilityMetrics};
use crate::rounding::round_dp;
use crate::segmentation::CoverageStats;
use crate::species::SpeciesEstimate;

/// Everything one analysis produces. Built once, never mutated by callers.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub vegetation_indices: IndexSet,
    pub coverage: CoverageStats,
    pub biomass: BiomassEstimate,
    pub health: HealthAssessment,
    pub nutrition: NutritionProfile,
    pub species: SpeciesEstimate,
    pub sustainability: SustainabilityMetrics,
    pub grazing: GrazingRecommendation,
    pub feature_vector: FeatureVector,
    pub metadata: AnalysisMetadata,
}

impl AnalysisResult {
    /// Top-level index means as reported in `vegetation_indices`
    pub fn display_indices(&self) -> DisplayIndices {
        DisplayIndices {
            ndvi: round_dp(self.vegetation_indices.mean(VegetationIndex::Ndvi), 4),
            evi: round_dp(self.vegetation_indices.mean(VegetationIndex::Evi), 4),
            gli: round_dp(self.vegetation_indices.mean(VegetationIndex::Gli), 4),
        }
    }

    pub fn is_degenerate(&self) -> bool {
        !self.metadata.warnings.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| AnalysisError::InternalComputation {
            stage: "serialize",
            detail: e.to_string(),
            fingerprint: self.metadata.input_fingerprint.clone(),
        })
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| AnalysisError::InternalComputation {
            stage: "serialize",
            detail: e.to_string(),
            fingerprint: self.metadata.input_fingerprint.clone(),
        })
    }
}
