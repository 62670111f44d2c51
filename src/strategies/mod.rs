use serde::{Deserialize, Serialize};

use crate::errors::{AnalyzerError, Result};
use crate::math;
use crate::pricing::{black_scholes, Greeks};
use crate::types::{MarketInputs, OptionContract, OptionType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegSide {
    Long,
    Short,
}

/// One leg of a multi-leg position. `premium` is the per-contract price
/// paid (long) or received (short) at entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyLeg {
    pub contract: OptionContract,
    pub side: LegSide,
    pub quantity: f64,
    pub premium: f64,
}

impl StrategyLeg {
    pub fn long(contract: OptionContract, quantity: f64, premium: f64) -> Self {
        Self {
            contract,
            side: LegSide::Long,
            quantity,
            premium,
        }
    }

    pub fn short(contract: OptionContract, quantity: f64, premium: f64) -> Self {
        Self {
            contract,
            side: LegSide::Short,
            quantity,
            premium,
        }
    }

    fn sign(&self) -> f64 {
        match self.side {
            LegSide::Long => 1.0,
            LegSide::Short => -1.0,
        }
    }

    /// P&L of this leg at expiry, premium included.
    pub fn pnl_at(&self, spot: f64) -> f64 {
        self.sign() * self.quantity * (self.contract.payoff(spot) - self.premium)
    }
}

/// A named multi-leg option position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strategy {
    pub name: String,
    pub legs: Vec<StrategyLeg>,
}

impl Strategy {
    pub fn new(name: impl Into<String>, legs: Vec<StrategyLeg>) -> Result<Self> {
        if legs.is_empty() {
            return Err(AnalyzerError::InvalidParameters(
                "strategy needs at least one leg".into(),
            ));
        }
        Ok(Self {
            name: name.into(),
            legs,
        })
    }

    /// Long call + long put at the same strike.
    pub fn straddle(strike: f64, expiry: f64, call_premium: f64, put_premium: f64) -> Result<Self> {
        let call = OptionContract::european(OptionType::Call, strike, expiry)?;
        let put = OptionContract::european(OptionType::Put, strike, expiry)?;
        Self::new(
            "straddle",
            vec![
                StrategyLeg::long(call, 1.0, call_premium),
                StrategyLeg::long(put, 1.0, put_premium),
            ],
        )
    }

    /// Long OTM put below a long OTM call.
    pub fn strangle(
        put_strike: f64,
        call_strike: f64,
        expiry: f64,
        put_premium: f64,
        call_premium: f64,
    ) -> Result<Self> {
        if put_strike >= call_strike {
            return Err(AnalyzerError::InvalidStrike);
        }
        let put = OptionContract::european(OptionType::Put, put_strike, expiry)?;
        let call = OptionContract::european(OptionType::Call, call_strike, expiry)?;
        Self::new(
            "strangle",
            vec![
                StrategyLeg::long(put, 1.0, put_premium),
                StrategyLeg::long(call, 1.0, call_premium),
            ],
        )
    }

    /// Call butterfly: long wings, short two at the body. Wings must be
    /// symmetric around the body.
    pub fn butterfly(
        lower: f64,
        body: f64,
        upper: f64,
        expiry: f64,
        premiums: (f64, f64, f64),
    ) -> Result<Self> {
        if !(lower < body && body < upper) {
            return Err(AnalyzerError::InvalidStrike);
        }
        if ((body - lower) - (upper - body)).abs() > 1e-9 {
            return Err(AnalyzerError::InvalidParameters(
                "butterfly wings must be equidistant from the body".into(),
            ));
        }
        let lower_call = OptionContract::european(OptionType::Call, lower, expiry)?;
        let body_call = OptionContract::european(OptionType::Call, body, expiry)?;
        let upper_call = OptionContract::european(OptionType::Call, upper, expiry)?;
        Self::new(
            "butterfly",
            vec![
                StrategyLeg::long(lower_call, 1.0, premiums.0),
                StrategyLeg::short(body_call, 2.0, premiums.1),
                StrategyLeg::long(upper_call, 1.0, premiums.2),
            ],
        )
    }

    /// Short put spread below a short call spread; strikes must be strictly
    /// increasing.
    pub fn iron_condor(
        strikes: (f64, f64, f64, f64),
        expiry: f64,
        premiums: (f64, f64, f64, f64),
    ) -> Result<Self> {
        let (a, b, c, d) = strikes;
        if !(a < b && b < c && c < d) {
            return Err(AnalyzerError::InvalidStrike);
        }
        let long_put = OptionContract::european(OptionType::Put, a, expiry)?;
        let short_put = OptionContract::european(OptionType::Put, b, expiry)?;
        let short_call = OptionContract::european(OptionType::Call, c, expiry)?;
        let long_call = OptionContract::european(OptionType::Call, d, expiry)?;
        Self::new(
            "iron condor",
            vec![
                StrategyLeg::long(long_put, 1.0, premiums.0),
                StrategyLeg::short(short_put, 1.0, premiums.1),
                StrategyLeg::short(short_call, 1.0, premiums.2),
                StrategyLeg::long(long_call, 1.0, premiums.3),
            ],
        )
    }

    /// Bull call spread: long the lower strike, short the upper.
    pub fn vertical_call_spread(
        long_strike: f64,
        short_strike: f64,
        expiry: f64,
        long_premium: f64,
        short_premium: f64,
    ) -> Result<Self> {
        if long_strike >= short_strike {
            return Err(AnalyzerError::InvalidStrike);
        }
        let long = OptionContract::european(OptionType::Call, long_strike, expiry)?;
        let short = OptionContract::european(OptionType::Call, short_strike, expiry)?;
        Self::new(
            "vertical call spread",
            vec![
                StrategyLeg::long(long, 1.0, long_premium),
                StrategyLeg::short(short, 1.0, short_premium),
            ],
        )
    }

    /// Bear put spread: long the upper strike, short the lower.
    pub fn vertical_put_spread(
        long_strike: f64,
        short_strike: f64,
        expiry: f64,
        long_premium: f64,
        short_premium: f64,
    ) -> Result<Self> {
        if short_strike >= long_strike {
            return Err(AnalyzerError::InvalidStrike);
        }
        let long = OptionContract::european(OptionType::Put, long_strike, expiry)?;
        let short = OptionContract::european(OptionType::Put, short_strike, expiry)?;
        Self::new(
            "vertical put spread",
            vec![
                StrategyLeg::long(long, 1.0, long_premium),
                StrategyLeg::short(short, 1.0, short_premium),
            ],
        )
    }

    /// Net premium paid at entry; negative for credit structures.
    pub fn net_premium(&self) -> f64 {
        self.legs
            .iter()
            .map(|leg| leg.sign() * leg.quantity * leg.premium)
            .sum()
    }

    /// Total P&L at expiry for a given underlying price.
    pub fn pnl_at(&self, spot: f64) -> f64 {
        self.legs.iter().map(|leg| leg.pnl_at(spot)).sum()
    }

    /// Expiry P&L evaluated over a price grid.
    pub fn payoff_profile(&self, prices: &[f64]) -> Vec<(f64, f64)> {
        prices.iter().map(|&s| (s, self.pnl_at(s))).collect()
    }

    /// Default evaluation grid: 50%-150% of spot.
    pub fn default_grid(spot: f64) -> Vec<f64> {
        math::linspace(spot * 0.5, spot * 1.5, 201)
    }

    /// Underlying prices where the expiry P&L crosses zero, located by
    /// linear interpolation between grid points.
    pub fn breakevens(&self, prices: &[f64]) -> Vec<f64> {
        let profile = self.payoff_profile(prices);
        let mut crossings = Vec::new();
        for window in profile.windows(2) {
            let (x0, y0) = window[0];
            let (x1, y1) = window[1];
            if y0 == 0.0 {
                crossings.push(x0);
            } else if y0.signum() != y1.signum() && y1 != 0.0 {
                crossings.push(x0 - y0 * (x1 - x0) / (y1 - y0));
            }
        }
        crossings.dedup_by(|a, b| (*a - *b).abs() < 1e-9);
        crossings
    }

    pub fn max_profit(&self, prices: &[f64]) -> f64 {
        prices
            .iter()
            .map(|&s| self.pnl_at(s))
            .fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn max_loss(&self, prices: &[f64]) -> f64 {
        prices
            .iter()
            .map(|&s| self.pnl_at(s))
            .fold(f64::INFINITY, f64::min)
    }

    /// Signed Black-Scholes Greeks aggregated across legs.
    pub fn greeks(&self, market: &MarketInputs) -> Result<Greeks> {
        let mut total = Greeks::default();
        for leg in &self.legs {
            let leg_greeks = black_scholes::greeks(&leg.contract, market)?;
            total += leg_greeks.scaled(leg.sign() * leg.quantity);
        }
        Ok(total)
    }
}
