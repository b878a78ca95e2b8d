#![deny(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

//! PastureAI - offline pasture photo analysis
//!
//! This library turns a single RGB pasture photo into vegetation indices, ground
//! coverage, a biomass estimate with an uncertainty band, a health classification,
//! species composition, nutrition and sustainability proxies, and a fixed-size
//! feature vector. Every stage is a pure function of the decoded pixels; nothing
//! leaves the process and nothing is cached between calls.

pub mod calibration;
pub mod color;
pub mod config;
pub mod decoder;
pub mod ensemble;
pub mod error;
pub mod features;
pub mod health;
pub mod indices;
pub mod metadata;
pub mod nutrition;
pub mod pipeline;
pub mod result;
pub mod rounding;
pub mod segmentation;
pub mod species;
pub mod tiles;

pub use config::AnalysisConfig;
pub use decoder::{ImageDecoder, SampledImage};
pub use error::{AnalysisError, ErrorResponse, Result};
pub use features::{FeatureName, FeatureVector};
pub use metadata::{AnalysisMetadata, CaptureMetadata};
pub use pipeline::{analyze, AnalysisRequest, Analyzer};
pub use result::AnalysisResult;

/// Engine identifier reported in result metadata
pub const ENGINE_NAME: &str = "pasture-ai-oss";

/// Algorithm version; bumped whenever a calibration constant changes
pub const ALGORITHM_VERSION: &str = "3.0.0";

/// Version of the feature vector contract
pub const FEATURE_SCHEMA_VERSION: u32 = 1;

/// Default decode pixel budget (512 x 512)
pub const DEFAULT_MAX_PIXELS: u64 = 512 * 512;
