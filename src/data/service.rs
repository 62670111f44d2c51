use std::collections::HashMap;
use std::sync::Arc;

use futures::future::try_join_all;
use tokio::sync::RwLock;

use crate::data::{MarketDataProvider, OptionChain, PriceHistory};
use crate::errors::Result;
use crate::types::MarketInputs;

/// Everything the analyzer needs about one symbol at a point in time.
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub spot: f64,
    pub history: PriceHistory,
    pub chains: Vec<OptionChain>,
}

impl MarketSnapshot {
    /// Market inputs seeded with the realized volatility of the history.
    pub fn market_inputs(&self, risk_free_rate: f64, dividend_yield: f64) -> Result<MarketInputs> {
        let volatility = self.history.realized_volatility()?;
        MarketInputs::new(self.spot, risk_free_rate, dividend_yield, volatility)
    }
}

/// Caching front for a provider. Snapshots are immutable once built;
/// `refresh` drops and rebuilds.
pub struct MarketDataService {
    provider: Arc<dyn MarketDataProvider>,
    cache: RwLock<HashMap<String, Arc<MarketSnapshot>>>,
}

impl MarketDataService {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self {
            provider,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub async fn snapshot(&self, symbol: &str) -> Result<Arc<MarketSnapshot>> {
        if let Some(snapshot) = self.cache.read().await.get(symbol) {
            return Ok(snapshot.clone());
        }

        let (spot, history, chains) = tokio::try_join!(
            self.provider.spot(symbol),
            self.provider.price_history(symbol),
            self.provider.option_chains(symbol),
        )?;

        tracing::info!(
            symbol,
            spot,
            bars = history.bars.len(),
            chains = chains.len(),
            "market snapshot loaded"
        );

        let snapshot = Arc::new(MarketSnapshot {
            symbol: symbol.to_string(),
            spot,
            history,
            chains,
        });
        self.cache
            .write()
            .await
            .insert(symbol.to_string(), snapshot.clone());
        Ok(snapshot)
    }

    /// Snapshots for several symbols, fetched concurrently.
    pub async fn snapshots(&self, symbols: &[&str]) -> Result<Vec<Arc<MarketSnapshot>>> {
        try_join_all(symbols.iter().map(|s| self.snapshot(s))).await
    }

    pub async fn refresh(&self, symbol: &str) -> Result<Arc<MarketSnapshot>> {
        self.invalidate(symbol).await;
        self.snapshot(symbol).await
    }

    pub async fn invalidate(&self, symbol: &str) {
        self.cache.write().await.remove(symbol);
    }
}
