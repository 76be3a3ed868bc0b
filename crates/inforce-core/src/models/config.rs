//! Configuration structures for the analysis pipeline.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{InforceError, Result};

/// Environment variable overriding the decision threshold.
pub const THRESHOLD_ENV: &str = "CONFIDENCE_THRESHOLD";

/// Main configuration for the inforce pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InforceConfig {
    /// Table analysis and scoring configuration.
    pub analysis: AnalysisConfig,

    /// External tool configuration.
    pub tools: ToolsConfig,

    /// Proof snip configuration.
    pub snips: SnipConfig,

    /// Redaction configuration.
    pub redaction: RedactionConfig,
}

/// Table analysis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Minimum blended confidence for an automated decision (0.0 - 1.0).
    pub confidence_threshold: f64,

    /// Points subtracted above the topmost header hit when cropping.
    pub roi_margin: f32,

    /// Minimum header similarity (0 - 100) to accept a column mapping.
    pub min_similarity: f64,

    /// Relative tolerance for the net surrender value identity.
    pub recon_tolerance: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.80,
            roi_margin: 6.0,
            min_similarity: 70.0,
            recon_tolerance: 0.01,
        }
    }
}

/// External program locations and time budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// poppler `pdftotext`, used for the page text index.
    pub pdftotext: String,

    /// poppler `pdftoppm`, used to rasterize proof snips.
    pub pdftoppm: String,

    /// camelot CLI, used for lattice and stream table extraction.
    pub camelot: String,

    /// ocrmypdf, used to add a text layer to scanned documents.
    pub ocrmypdf: String,

    /// Time budget for a single extraction or rendering call.
    pub tool_timeout_secs: u64,

    /// Time budget for a single OCR pass.
    pub ocr_timeout_secs: u64,

    /// Extra OCR attempts after a retryable failure.
    pub ocr_retries: u32,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            pdftotext: "pdftotext".to_string(),
            pdftoppm: "pdftoppm".to_string(),
            camelot: "camelot".to_string(),
            ocrmypdf: "ocrmypdf".to_string(),
            tool_timeout_secs: 120,
            ocr_timeout_secs: 600,
            ocr_retries: 1,
        }
    }
}

impl ToolsConfig {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn ocr_timeout(&self) -> Duration {
        Duration::from_secs(self.ocr_timeout_secs)
    }
}

/// Proof snip configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnipConfig {
    /// Rasterization resolution.
    pub dpi: u32,

    /// Points added around a located row.
    pub padding: f32,

    /// Year of the "current" ledger row; defaults to the calendar year.
    pub as_of_year: Option<i32>,
}

impl Default for SnipConfig {
    fn default() -> Self {
        Self {
            dpi: 200,
            padding: 2.0,
            as_of_year: None,
        }
    }
}

/// Redaction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionConfig {
    /// Fill colour of the cover rectangles, each component 0.0 - 1.0.
    pub fill_rgb: [f32; 3],
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            fill_rgb: [1.0, 1.0, 1.0],
        }
    }
}

impl InforceConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            serde_json::from_str(&content).map_err(|e| InforceError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| InforceError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `CONFIDENCE_THRESHOLD` from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(THRESHOLD_ENV) {
            let value: f64 = raw.trim().parse().map_err(|_| {
                InforceError::Config(format!("{} is not a number: {:?}", THRESHOLD_ENV, raw))
            })?;
            self.analysis.confidence_threshold = value;
        }
        self.validate()
    }

    /// Reject values outside their meaningful ranges.
    pub fn validate(&self) -> Result<()> {
        let t = self.analysis.confidence_threshold;
        if !(0.0..=1.0).contains(&t) {
            return Err(InforceError::Config(format!(
                "confidence_threshold must be within [0, 1], got {}",
                t
            )));
        }
        if !(0.0..=100.0).contains(&self.analysis.min_similarity) {
            return Err(InforceError::Config(format!(
                "min_similarity must be within [0, 100], got {}",
                self.analysis.min_similarity
            )));
        }
        if self.analysis.recon_tolerance < 0.0 {
            return Err(InforceError::Config(
                "recon_tolerance must not be negative".to_string(),
            ));
        }
        if self.snips.dpi == 0 {
            return Err(InforceError::Config("snips.dpi must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = InforceConfig::default();
        assert_eq!(config.analysis.confidence_threshold, 0.80);
        assert_eq!(config.analysis.min_similarity, 70.0);
        assert_eq!(config.snips.dpi, 200);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_override() {
        let mut config = InforceConfig::default();
        config
            .apply_env_from(|k| (k == THRESHOLD_ENV).then(|| "0.65".to_string()))
            .unwrap();
        assert_eq!(config.analysis.confidence_threshold, 0.65);
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut config = InforceConfig::default();
        assert!(config.apply_env_from(|_| Some("high".to_string())).is_err());
        assert!(config.apply_env_from(|_| Some("1.5".to_string())).is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: InforceConfig =
            serde_json::from_str(r#"{"analysis": {"confidence_threshold": 0.9}}"#).unwrap();
        assert_eq!(config.analysis.confidence_threshold, 0.9);
        assert_eq!(config.analysis.roi_margin, 6.0);
        assert_eq!(config.tools.camelot, "camelot");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = InforceConfig::default();
        config.snips.as_of_year = Some(2030);
        config.save(&path).unwrap();

        let loaded = InforceConfig::from_file(&path).unwrap();
        assert_eq!(loaded.snips.as_of_year, Some(2030));
    }
}
