pub mod provider;
pub mod service;

pub use provider::{FixtureProvider, MarketDataProvider, MarketFixture};
pub use service::{MarketDataService, MarketSnapshot};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::{AnalyzerError, Result};
use crate::math;
use crate::types::OptionType;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Daily price history for one symbol, sorted by date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceHistory {
    pub symbol: String,
    pub bars: Vec<PriceBar>,
}

impl PriceHistory {
    pub fn new(symbol: impl Into<String>, mut bars: Vec<PriceBar>) -> Result<Self> {
        let symbol = symbol.into();
        if bars.is_empty() {
            return Err(AnalyzerError::InsufficientData(format!(
                "no price history for {symbol}"
            )));
        }
        bars.sort_by_key(|b| b.date);
        Ok(Self { symbol, bars })
    }

    pub fn last_close(&self) -> f64 {
        self.bars.last().map(|b| b.close).unwrap_or_default()
    }

    pub fn log_returns(&self) -> Vec<f64> {
        let closes: Vec<f64> = self.bars.iter().map(|b| b.close).collect();
        math::log_returns(&closes)
    }

    /// Annualized standard deviation of daily log returns.
    pub fn realized_volatility(&self) -> Result<f64> {
        let returns = self.log_returns();
        if returns.len() < 2 {
            return Err(AnalyzerError::InsufficientData(format!(
                "need at least 3 bars to estimate volatility for {}",
                self.symbol
            )));
        }
        Ok(math::std_dev(&returns) * math::TRADING_DAYS_PER_YEAR.sqrt())
    }
}

/// One row of an options chain. Field names follow the upstream chain
/// format (camelCase on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionQuote {
    pub strike: f64,
    pub last_price: f64,
    pub bid: f64,
    pub ask: f64,
    pub implied_volatility: f64,
    #[serde(default)]
    pub volume: Option<u64>,
    #[serde(default)]
    pub open_interest: Option<u64>,
}

impl OptionQuote {
    pub fn mid_price(&self) -> f64 {
        if self.bid > 0.0 && self.ask > 0.0 {
            0.5 * (self.bid + self.ask)
        } else {
            self.last_price
        }
    }

    pub fn has_valid_iv(&self) -> bool {
        self.implied_volatility.is_finite() && self.implied_volatility > 0.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionChain {
    pub symbol: String,
    pub expiration: NaiveDate,
    pub calls: Vec<OptionQuote>,
    pub puts: Vec<OptionQuote>,
}

impl OptionChain {
    pub fn days_to_expiry(&self, as_of: NaiveDate) -> i64 {
        (self.expiration - as_of).num_days()
    }

    pub fn years_to_expiry(&self, as_of: NaiveDate) -> f64 {
        self.days_to_expiry(as_of) as f64 / math::CALENDAR_DAYS_PER_YEAR
    }

    pub fn quotes(&self, option_type: OptionType) -> &[OptionQuote] {
        match option_type {
            OptionType::Call => &self.calls,
            OptionType::Put => &self.puts,
        }
    }

    /// Quotes with strikes within `width` of the spot (e.g. 0.2 for the
    /// 80%-120% band).
    pub fn near_the_money(
        &self,
        option_type: OptionType,
        spot: f64,
        width: f64,
    ) -> Vec<&OptionQuote> {
        let (lo, hi) = (spot * (1.0 - width), spot * (1.0 + width));
        self.quotes(option_type)
            .iter()
            .filter(|q| q.strike >= lo && q.strike <= hi)
            .collect()
    }

    /// Implied volatility of the strike closest to spot, calls and puts
    /// considered together.
    pub fn atm_volatility(&self, spot: f64) -> Option<f64> {
        self.calls
            .iter()
            .chain(self.puts.iter())
            .filter(|q| q.has_valid_iv())
            .min_by(|a, b| {
                (a.strike - spot)
                    .abs()
                    .total_cmp(&(b.strike - spot).abs())
            })
            .map(|q| q.implied_volatility)
    }
}
