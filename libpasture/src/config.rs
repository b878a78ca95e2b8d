use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};
use crate::DEFAULT_MAX_PIXELS;

/// Runtime knobs. These bound cost and choose the execution strategy; they
/// never change the numbers an analysis produces beyond how many pixels it sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Decode pixel budget; larger images are downsampled to fit
    pub max_pixels: u64,
    /// Use rayon for per-pixel work when the `parallel` feature is built in
    pub parallel: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_pixels: DEFAULT_MAX_PIXELS,
            parallel: true,
        }
    }
}

impl AnalysisConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|e| AnalysisError::Config(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        log::debug!("loaded configuration from {}", path.as_ref().display());
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_pixels == 0 {
            return Err(AnalysisError::Config("max_pixels must be at least 1".to_string()));
        }
        Ok(())
    }

    #[must_use]
    pub const fn with_max_pixels(mut self, max_pixels: u64) -> Self {
        self.max_pixels = max_pixels;
        self
    }

    #[must_use]
    pub const fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.max_pixels, 262_144);
        assert!(config.parallel);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = AnalysisConfig::from_toml_str("max_pixels = 1024\n").unwrap();
        assert_eq!(config.max_pixels, 1024);
        assert!(config.parallel);
    }

    #[test]
    fn test_rejects_zero_budget_and_unknown_keys() {
        assert!(matches!(
            AnalysisConfig::from_toml_str("max_pixels = 0"),
            Err(AnalysisError::Config(_))
        ));
        assert!(matches!(
            AnalysisConfig::from_toml_str("tile_grid = 4"),
            Err(AnalysisError::Config(_))
        ));
    }
}
