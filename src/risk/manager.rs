use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::data::PriceHistory;
use crate::errors::{AnalyzerError, Result};
use crate::math;
use crate::pricing::{binomial, black_scholes, Greeks, PricingEngine};
use crate::types::{ExerciseStyle, MarketInputs, OptionContract};

/// A joint market shock applied to the whole portfolio. `price_change` is
/// relative, `volatility_change` and `rate_change` absolute, `time_decay`
/// in years.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressScenario {
    pub name: String,
    pub price_change: f64,
    pub volatility_change: f64,
    pub rate_change: f64,
    pub time_decay: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskParameters {
    pub confidence: f64,
    pub horizon_days: f64,
    pub mc_paths: usize,
    pub seed: u64,
    pub stress_scenarios: Vec<StressScenario>,
}

impl Default for RiskParameters {
    fn default() -> Self {
        Self {
            confidence: 0.95,
            horizon_days: 1.0,
            mc_paths: 10_000,
            seed: 42,
            stress_scenarios: default_scenarios(),
        }
    }
}

fn default_scenarios() -> Vec<StressScenario> {
    vec![
        StressScenario {
            name: "market_crash".into(),
            price_change: -0.20,
            volatility_change: 0.15,
            rate_change: 0.0,
            time_decay: 0.0,
        },
        StressScenario {
            name: "volatility_spike".into(),
            price_change: -0.05,
            volatility_change: 0.25,
            rate_change: 0.0,
            time_decay: 0.0,
        },
        StressScenario {
            name: "rate_shock".into(),
            price_change: 0.0,
            volatility_change: 0.0,
            rate_change: 0.02,
            time_decay: 0.0,
        },
        StressScenario {
            name: "slow_bleed".into(),
            price_change: -0.05,
            volatility_change: -0.05,
            rate_change: 0.0,
            time_decay: 30.0 / 365.0,
        },
    ]
}

/// A holding: positive quantity is long, negative short.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioPosition {
    pub contract: OptionContract,
    pub quantity: f64,
}

#[derive(Debug, Clone)]
pub struct RiskReport {
    pub portfolio_value: f64,
    pub value_at_risk: f64,
    pub expected_shortfall: f64,
    pub portfolio_greeks: Greeks,
    pub stress_results: Vec<(String, f64)>,
}

pub struct RiskManager {
    parameters: RiskParameters,
    engine: PricingEngine,
}

impl RiskManager {
    pub fn new(parameters: RiskParameters, engine: PricingEngine) -> Result<Self> {
        if !(0.5..1.0).contains(&parameters.confidence) {
            return Err(AnalyzerError::InvalidParameters(
                "confidence must be in [0.5, 1.0)".into(),
            ));
        }
        if parameters.horizon_days <= 0.0 {
            return Err(AnalyzerError::InvalidParameters(
                "horizon must be positive".into(),
            ));
        }
        Ok(Self { parameters, engine })
    }

    /// Mark-to-model portfolio value: Black-Scholes for European legs, the
    /// engine's lattice for American ones.
    pub fn portfolio_value(
        &self,
        positions: &[PortfolioPosition],
        market: &MarketInputs,
    ) -> Result<f64> {
        let mut total = 0.0;
        for position in positions {
            total += position.quantity * self.contract_value(&position.contract, market)?;
        }
        Ok(total)
    }

    fn contract_value(&self, contract: &OptionContract, market: &MarketInputs) -> Result<f64> {
        let value = match contract.exercise_style {
            ExerciseStyle::European => black_scholes::price(contract, market)?.price,
            ExerciseStyle::American => {
                binomial::price(contract, market, self.engine.config().binomial_steps)?.price
            }
        };
        Ok(value)
    }

    pub fn portfolio_greeks(
        &self,
        positions: &[PortfolioPosition],
        market: &MarketInputs,
    ) -> Result<Greeks> {
        let mut total = Greeks::default();
        for position in positions {
            let greeks = black_scholes::greeks(&position.contract, market)?;
            total += greeks.scaled(position.quantity);
        }
        Ok(total)
    }

    /// Historical VaR: every observed daily log return is replayed as a
    /// spot shock over the horizon and the portfolio fully revalued.
    /// Returns (VaR, expected shortfall); losses are positive.
    pub fn historical_var(
        &self,
        positions: &[PortfolioPosition],
        market: &MarketInputs,
        history: &PriceHistory,
    ) -> Result<(f64, f64)> {
        if positions.is_empty() {
            return Ok((0.0, 0.0));
        }
        let returns = history.log_returns();
        if returns.len() < 2 {
            return Err(AnalyzerError::InsufficientData(format!(
                "not enough history for {}",
                history.symbol
            )));
        }

        let scale = self.parameters.horizon_days.sqrt();
        let base = self.portfolio_value(positions, market)?;
        let decay = self.parameters.horizon_days / math::CALENDAR_DAYS_PER_YEAR;

        let mut losses = Vec::with_capacity(returns.len());
        for ret in returns {
            let shocked_spot = market.spot * (ret * scale).exp();
            let value = self.revalue(positions, &market.with_spot(shocked_spot), decay)?;
            losses.push(base - value);
        }

        let (var, es) = tail_statistics(&mut losses, self.parameters.confidence)?;
        tracing::info!(
            scenarios = history.log_returns().len(),
            var,
            es,
            "historical VaR computed"
        );
        Ok((var, es))
    }

    /// Monte Carlo VaR: GBM spot draws over the horizon with the market's
    /// volatility, full revaluation per draw.
    pub fn monte_carlo_var(
        &self,
        positions: &[PortfolioPosition],
        market: &MarketInputs,
    ) -> Result<(f64, f64)> {
        if positions.is_empty() {
            return Ok((0.0, 0.0));
        }
        if self.parameters.mc_paths == 0 {
            return Err(AnalyzerError::InvalidParameters(
                "mc_paths must be positive".into(),
            ));
        }

        let horizon = self.parameters.horizon_days / math::TRADING_DAYS_PER_YEAR;
        let drift = (market.risk_free_rate
            - market.dividend_yield
            - 0.5 * market.volatility * market.volatility)
            * horizon;
        let diffusion = market.volatility * horizon.sqrt();
        let decay = self.parameters.horizon_days / math::CALENDAR_DAYS_PER_YEAR;

        let base = self.portfolio_value(positions, market)?;
        let mut rng = StdRng::seed_from_u64(self.parameters.seed);

        let mut losses = Vec::with_capacity(self.parameters.mc_paths);
        for _ in 0..self.parameters.mc_paths {
            let z: f64 = rng.sample(StandardNormal);
            let shocked_spot = market.spot * (drift + diffusion * z).exp();
            let value = self.revalue(positions, &market.with_spot(shocked_spot), decay)?;
            losses.push(base - value);
        }

        let (var, es) = tail_statistics(&mut losses, self.parameters.confidence)?;
        tracing::info!(
            paths = self.parameters.mc_paths,
            var,
            es,
            "monte carlo VaR computed"
        );
        Ok((var, es))
    }

    /// P&L of every configured stress scenario.
    pub fn stress_test(
        &self,
        positions: &[PortfolioPosition],
        market: &MarketInputs,
    ) -> Result<Vec<(String, f64)>> {
        let base = self.portfolio_value(positions, market)?;

        let mut results = Vec::with_capacity(self.parameters.stress_scenarios.len());
        for scenario in &self.parameters.stress_scenarios {
            let shocked = MarketInputs {
                spot: market.spot * (1.0 + scenario.price_change),
                volatility: (market.volatility + scenario.volatility_change).max(0.0),
                risk_free_rate: market.risk_free_rate + scenario.rate_change,
                dividend_yield: market.dividend_yield,
            };
            let value = self.revalue(positions, &shocked, scenario.time_decay)?;
            results.push((scenario.name.clone(), value - base));
        }
        Ok(results)
    }

    /// Full report. Historical VaR when history is supplied, Monte Carlo
    /// otherwise.
    pub fn report(
        &self,
        positions: &[PortfolioPosition],
        market: &MarketInputs,
        history: Option<&PriceHistory>,
    ) -> Result<RiskReport> {
        let (value_at_risk, expected_shortfall) = match history {
            Some(history) => self.historical_var(positions, market, history)?,
            None => self.monte_carlo_var(positions, market)?,
        };

        Ok(RiskReport {
            portfolio_value: self.portfolio_value(positions, market)?,
            value_at_risk,
            expected_shortfall,
            portfolio_greeks: self.portfolio_greeks(positions, market)?,
            stress_results: self.stress_test(positions, market)?,
        })
    }

    fn revalue(
        &self,
        positions: &[PortfolioPosition],
        market: &MarketInputs,
        time_decay: f64,
    ) -> Result<f64> {
        let mut total = 0.0;
        for position in positions {
            let contract = position.contract.with_expiry(position.contract.expiry - time_decay);
            total += position.quantity * self.contract_value(&contract, market)?;
        }
        Ok(total)
    }
}

/// VaR and expected shortfall of a loss sample; losses positive.
fn tail_statistics(losses: &mut [f64], confidence: f64) -> Result<(f64, f64)> {
    let var = math::quantile(losses, confidence)?;
    losses.sort_by(f64::total_cmp);
    let tail = &losses[losses.partition_point(|&l| l < var)..];
    Ok((var, math::mean(tail)))
}
