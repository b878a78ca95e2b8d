use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use log::{debug, error, info, warn};

use crate::calibration::{BIOMASS_SUB_MODELS, PROTEIN_SUB_MODELS, TILE_GRID};
use crate::config::AnalysisConfig;
use crate::decoder::{ImageDecoder, SampledImage};
use crate::ensemble;
use crate::error::{AnalysisError, Result};
use crate::features::FeatureVector;
use crate::health::{self, GrazingRecommendation};
use crate::indices::{sample_pixels, IndexSet, VegetationIndex};
use crate::metadata::{self, AnalysisMetadata, CaptureMetadata, ALGORITHMS, LIMITATIONS};
use crate::nutrition::{self, SustainabilityInputs};
use crate::result::AnalysisResult;
use crate::segmentation::VegetationMask;
use crate::species;
use crate::tiles::{ColorStats, PatchStats};

/// One image to analyse
#[derive(Debug, Clone, Copy)]
pub struct AnalysisRequest<'a> {
    pub bytes: &'a [u8],
    /// Declared MIME type; empty means sniff the bytes
    pub mime: &'a str,
    pub capture: Option<&'a CaptureMetadata>,
}

impl<'a> AnalysisRequest<'a> {
    pub const fn new(bytes: &'a [u8], mime: &'a str) -> Self {
        Self {
            bytes,
            mime,
            capture: None,
        }
    }

    #[must_use]
    pub const fn with_capture(mut self, capture: &'a CaptureMetadata) -> Self {
        self.capture = Some(capture);
        self
    }
}

/// Stateless analysis driver. Cheap to copy and safe to share across threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct Analyzer {
    config: AnalysisConfig,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub const fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Decode and analyse. Only decoding can fail for well-formed engines; an
    /// `InternalComputation` error means a guard let a non-finite value through.
    pub fn analyze(&self, request: AnalysisRequest<'_>) -> Result<AnalysisResult> {
        let started = Instant::now();
        let fingerprint = metadata::fingerprint(request.bytes);

        let image = ImageDecoder::new(self.config.max_pixels).decode(request.bytes, request.mime)?;
        debug!(
            "decoded {} ({}x{} -> {}x{})",
            image.info.mime,
            image.info.original_width,
            image.info.original_height,
            image.width(),
            image.height()
        );

        let mut result = self.analyze_image(&image, fingerprint, request.capture.cloned())?;
        result.metadata.processing_time_ms = started.elapsed().as_millis() as u64;

        info!(
            "analysis {}: {} (score {:.1}), biomass {:.0} kg DM/ha, {} ms",
            result.metadata.input_fingerprint,
            result.health.classification,
            result.health.score,
            result.biomass.value,
            result.metadata.processing_time_ms
        );
        Ok(result)
    }

    /// Run stages 2 to 8 on an already decoded image
    pub fn analyze_image(
        &self,
        image: &SampledImage,
        fingerprint: String,
        capture: Option<CaptureMetadata>,
    ) -> Result<AnalysisResult> {
        let parallel = self.config.parallel;
        let (width, height) = (image.width(), image.height());

        let samples = sample_pixels(&image.pixels, parallel);
        let indices = IndexSet::from_samples(&samples);
        debug!(
            "indices over {} samples: ndvi {:.4} +/- {:.4}",
            samples.len(),
            indices.mean(VegetationIndex::Ndvi),
            indices.std(VegetationIndex::Ndvi)
        );

        let mask = VegetationMask::segment(width, height, &samples, parallel);
        let coverage = mask.coverage();
        debug!(
            "coverage: vegetation {:.2}% dead {:.2}% bare {:.2}%",
            coverage.vegetation_pct, coverage.dead_pct, coverage.bare_pct
        );

        let color = ColorStats::from_samples(&samples);
        let patches = PatchStats::compute(&mask, &samples, parallel);
        debug!(
            "patches: {}x{} tiles, uniformity {:.4}, colour variance {:.5}",
            patches.cols, patches.rows, patches.spatial_uniformity, patches.color_variance
        );

        let features = FeatureVector::build(&indices, &coverage, &color, &patches);
        let species = species::estimate(&mask, &samples, &features, &indices);
        let mut biomass = ensemble::estimate(&features, &coverage, &species.composition);
        let mut health = health::assess(
            &features,
            patches.stocked_cover,
            indices.std(VegetationIndex::Ndvi),
        );

        let mut warnings = Vec::new();
        if let Some(reason) = degeneracy(samples.len(), &color) {
            warn!("{reason} (input {fingerprint}); reporting minimum confidence");
            warnings.push(reason.to_string());
            biomass = biomass.with_min_confidence();
            health = health.with_min_confidence();
        }

        let nutrition = nutrition::estimate(&features);
        let sustainability = nutrition::sustainability(
            &features,
            SustainabilityInputs {
                biomass_kg_ha: biomass.value,
                health_score: health.score,
                diversity: species.diversity,
                candidate_count: species.candidates.len(),
            },
        );

        let result = AnalysisResult {
            vegetation_indices: indices,
            coverage,
            grazing: GrazingRecommendation::for_class(health.classification),
            biomass,
            health,
            nutrition,
            species,
            sustainability,
            feature_vector: features,
            metadata: AnalysisMetadata {
                engine: crate::ENGINE_NAME,
                algorithm_version: crate::ALGORITHM_VERSION,
                feature_schema_version: crate::FEATURE_SCHEMA_VERSION,
                algorithms: ALGORITHMS,
                limitations: LIMITATIONS,
                image: image.info.clone(),
                sample_size: samples.len(),
                tile_grid: TILE_GRID,
                ensemble_models_used: BIOMASS_SUB_MODELS.len() + PROTEIN_SUB_MODELS.len(),
                input_fingerprint: fingerprint,
                warnings,
                capture,
                processing_time_ms: 0,
                analyzed_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            },
        };

        verify(&result)?;
        Ok(result)
    }
}

/// Analyse with the default configuration
pub fn analyze(bytes: &[u8], mime: &str) -> Result<AnalysisResult> {
    Analyzer::default().analyze(AnalysisRequest::new(bytes, mime))
}

/// Why an image cannot support a confident estimate, if it cannot
fn degeneracy(sample_count: usize, color: &ColorStats) -> Option<AnalysisError> {
    if sample_count == 0 {
        return Some(AnalysisError::DegenerateInput("image has no pixels".to_string()));
    }
    if color.is_flat() {
        return Some(AnalysisError::DegenerateInput(
            "image is a single uniform colour".to_string(),
        ));
    }
    None
}

fn check(ok: bool, stage: &'static str, detail: &str, fingerprint: &str) -> Result<()> {
    if ok {
        return Ok(());
    }
    error!("invariant violated in {stage}: {detail} (input {fingerprint})");
    Err(AnalysisError::InternalComputation {
        stage,
        detail: detail.to_string(),
        fingerprint: fingerprint.to_string(),
    })
}

/// Every number in the result is finite and inside its documented range
fn verify(result: &AnalysisResult) -> Result<()> {
    let fp = result.metadata.input_fingerprint.as_str();

    check(result.vegetation_indices.is_within_bounds(), "indices", "index mean out of bounds", fp)?;

    let c = &result.coverage;
    let parts = [c.vegetation_pct, c.bare_pct, c.dead_pct, c.shadow_pct];
    check(
        parts.iter().all(|p| p.is_finite() && (0.0..=100.0).contains(p))
            && (c.vegetation_pct + c.bare_pct + c.dead_pct - 100.0).abs() <= 0.5
            && c.shadow_pct <= c.bare_pct,
        "segmentation",
        "coverage percentages inconsistent",
        fp,
    )?;

    check(result.feature_vector.is_finite(), "features", "non-finite feature", fp)?;
    check(result.biomass.is_consistent(), "ensemble", "biomass band inconsistent", fp)?;

    let h = &result.health;
    check(
        (0.0..=100.0).contains(&h.score) && (0.0..=1.0).contains(&h.confidence),
        "health",
        "health score or confidence out of range",
        fp,
    )?;

    let n = &result.nutrition;
    let s = &result.sustainability;
    check(
        [
            n.crude_protein_pct,
            n.metabolizable_energy_mj_kg,
            n.digestibility_pct,
            n.fiber_ndf_pct,
            n.protein_uncertainty,
            s.carbon_stock_t_co2e_ha,
            s.water_retention_mm,
            s.soil_health_index,
            s.biodiversity_index,
            s.ground_cover_index,
        ]
        .iter()
        .all(|v| v.is_finite()),
        "nutrition",
        "non-finite nutrition or sustainability value",
        fp,
    )?;

    Ok(())
}
