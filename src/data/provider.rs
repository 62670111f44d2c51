use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::data::{OptionChain, PriceBar, PriceHistory};
use crate::errors::{AnalyzerError, Result};

/// Source of spot prices, histories and option chains. Missing data is an
/// error, never an empty success.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn spot(&self, symbol: &str) -> Result<f64>;

    async fn price_history(&self, symbol: &str) -> Result<PriceHistory>;

    async fn option_chains(&self, symbol: &str) -> Result<Vec<OptionChain>>;
}

/// On-disk market snapshot for one symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketFixture {
    pub symbol: String,
    pub spot: f64,
    pub bars: Vec<PriceBar>,
    pub chains: Vec<OptionChain>,
}

/// Provider backed by JSON fixtures, keyed by symbol.
pub struct FixtureProvider {
    fixtures: HashMap<String, MarketFixture>,
}

impl FixtureProvider {
    pub fn new(fixtures: Vec<MarketFixture>) -> Self {
        let fixtures = fixtures
            .into_iter()
            .map(|f| (f.symbol.clone(), f))
            .collect();
        Self { fixtures }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(&path)?;
        let fixtures: Vec<MarketFixture> = serde_json::from_str(&raw)?;
        tracing::info!(
            path = %path.as_ref().display(),
            symbols = fixtures.len(),
            "loaded market fixtures"
        );
        Ok(Self::new(fixtures))
    }

    fn fixture(&self, symbol: &str) -> Result<&MarketFixture> {
        self.fixtures
            .get(symbol)
            .ok_or_else(|| AnalyzerError::SymbolNotFound(symbol.to_string()))
    }
}

#[async_trait]
impl MarketDataProvider for FixtureProvider {
    async fn spot(&self, symbol: &str) -> Result<f64> {
        let fixture = self.fixture(symbol)?;
        if !fixture.spot.is_finite() || fixture.spot <= 0.0 {
            return Err(AnalyzerError::InvalidPrice);
        }
        Ok(fixture.spot)
    }

    async fn price_history(&self, symbol: &str) -> Result<PriceHistory> {
        let fixture = self.fixture(symbol)?;
        PriceHistory::new(&fixture.symbol, fixture.bars.clone())
    }

    async fn option_chains(&self, symbol: &str) -> Result<Vec<OptionChain>> {
        let fixture = self.fixture(symbol)?;
        if fixture.chains.is_empty() {
            return Err(AnalyzerError::InsufficientData(format!(
                "no options data for {symbol}"
            )));
        }
        Ok(fixture.chains.clone())
    }
}
