use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

/// Caller-supplied capture context. The pipeline never reads it; it is echoed
/// back in [`AnalysisMetadata::capture`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CaptureMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paddock_id: Option<String>,
    /// Any other fields, preserved verbatim
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl CaptureMetadata {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| AnalysisError::Config(format!("invalid capture metadata: {e}")))
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Dimensions before and after the decode pixel budget
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ImageInfo {
    pub original_width: u32,
    pub original_height: u32,
    pub sampled_width: u32,
    pub sampled_height: u32,
    pub downsampled: bool,
    pub mime: String,
}

/// Provenance of one analysis
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisMetadata {
    pub engine: &'static str,
    pub algorithm_version: &'static str,
    pub feature_schema_version: u32,
    pub algorithms: &'static [&'static str],
    pub limitations: &'static [&'static str],
    pub image: ImageInfo,
    pub sample_size: usize,
    pub tile_grid: u32,
    pub ensemble_models_used: usize,
    /// CRC32 of the input bytes, lowercase hex
    pub input_fingerprint: String,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture: Option<CaptureMetadata>,
    pub processing_time_ms: u64,
    /// RFC 3339, UTC
    pub analyzed_at: String,
}

pub const ALGORITHMS: &[&str] = &[
    "rgb-vegetation-indices-12",
    "lab-threshold-segmentation",
    "tiled-spatial-uniformity",
    "lab-nearest-species-buckets",
    "rule-based-species-candidates",
    "ensemble-linear-biomass-6",
    "protein-ensemble-3",
    "weighted-health-score",
];

pub const LIMITATIONS: &[&str] = &[
    "Vegetation indices are estimated from visible RGB only; NDVI uses a pseudo near-infrared band.",
    "Species composition is a heuristic colour classifier, not a trained model.",
    "Biomass sub-models are hand-calibrated constants and are not fitted to local conditions.",
    "Nutrition values are approximations and not a substitute for a laboratory forage test.",
];

/// CRC32 of the input bytes as eight lowercase hex digits
pub fn fingerprint(bytes: &[u8]) -> String {
    format!("{:08x}", crc32fast::hash(bytes))
}
