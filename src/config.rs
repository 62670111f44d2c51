use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{AnalyzerError, Result};

/// Engine-wide numerical settings. All fields have defaults so partial
/// config files are accepted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub risk_free_rate: f64,
    pub dividend_yield: f64,
    pub binomial_steps: usize,
    pub monte_carlo_paths: usize,
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.05,
            dividend_yield: 0.0,
            binomial_steps: 200,
            monte_carlo_paths: 100_000,
            seed: 42,
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.binomial_steps < 2 {
            return Err(AnalyzerError::InvalidParameters(
                "binomial_steps must be at least 2".into(),
            ));
        }
        if self.monte_carlo_paths == 0 {
            return Err(AnalyzerError::InvalidParameters(
                "monte_carlo_paths must be positive".into(),
            ));
        }
        if !self.risk_free_rate.is_finite() || !self.dividend_yield.is_finite() {
            return Err(AnalyzerError::InvalidParameters(
                "rates must be finite".into(),
            ));
        }
        Ok(())
    }
}
