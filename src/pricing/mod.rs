pub mod binomial;
pub mod black_scholes;
pub mod implied_vol;
pub mod monte_carlo;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::errors::Result;
use crate::types::{MarketInputs, OptionContract, OptionType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PricingModel {
    BlackScholes,
    BinomialTree,
    MonteCarlo,
}

/// First-order sensitivities of an option price. Theta and rho are in
/// annual units, vega per unit of volatility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
    pub rho: f64,
}

impl Greeks {
    pub fn scaled(&self, quantity: f64) -> Self {
        Self {
            delta: self.delta * quantity,
            gamma: self.gamma * quantity,
            theta: self.theta * quantity,
            vega: self.vega * quantity,
            rho: self.rho * quantity,
        }
    }
}

impl std::ops::Add for Greeks {
    type Output = Greeks;

    fn add(self, other: Greeks) -> Greeks {
        Greeks {
            delta: self.delta + other.delta,
            gamma: self.gamma + other.gamma,
            theta: self.theta + other.theta,
            vega: self.vega + other.vega,
            rho: self.rho + other.rho,
        }
    }
}

impl std::ops::AddAssign for Greeks {
    fn add_assign(&mut self, other: Greeks) {
        *self = *self + other;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PricingResult {
    pub price: f64,
    pub greeks: Greeks,
    /// Standard error of the estimate, present for Monte Carlo only.
    pub std_error: Option<f64>,
    pub model: PricingModel,
}

pub struct PricingEngine {
    config: EngineConfig,
}

impl PricingEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn price(
        &self,
        model: PricingModel,
        contract: &OptionContract,
        market: &MarketInputs,
    ) -> Result<PricingResult> {
        match model {
            PricingModel::BlackScholes => black_scholes::price(contract, market),
            PricingModel::BinomialTree => {
                binomial::price(contract, market, self.config.binomial_steps)
            }
            PricingModel::MonteCarlo => monte_carlo::price(
                contract,
                market,
                self.config.monte_carlo_paths,
                self.config.seed,
            ),
        }
    }

    pub fn greeks(&self, contract: &OptionContract, market: &MarketInputs) -> Result<Greeks> {
        black_scholes::greeks(contract, market)
    }

    pub fn implied_volatility(
        &self,
        contract: &OptionContract,
        market: &MarketInputs,
        market_price: f64,
    ) -> Result<f64> {
        implied_vol::implied_volatility(contract, market, market_price)
    }
}

/// Value of a European option when volatility is zero: the forward is
/// deterministic, so the payoff is discounted intrinsic at the forward.
pub(crate) fn deterministic_value(
    option_type: OptionType,
    spot: f64,
    strike: f64,
    expiry: f64,
    rate: f64,
    dividend_yield: f64,
) -> f64 {
    let forward = spot * ((rate - dividend_yield) * expiry).exp();
    let payoff = match option_type {
        OptionType::Call => (forward - strike).max(0.0),
        OptionType::Put => (strike - forward).max(0.0),
    };
    payoff * (-rate * expiry).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_market() -> MarketInputs {
        MarketInputs::new(100.0, 0.05, 0.0, 0.2).unwrap()
    }

    #[test]
    fn test_model_dispatch_agrees() {
        let engine = PricingEngine::new(EngineConfig {
            binomial_steps: 500,
            monte_carlo_paths: 200_000,
            ..Default::default()
        });
        let contract = OptionContract::european(OptionType::Call, 100.0, 0.5).unwrap();
        let market = test_market();

        let bs = engine
            .price(PricingModel::BlackScholes, &contract, &market)
            .unwrap();
        let tree = engine
            .price(PricingModel::BinomialTree, &contract, &market)
            .unwrap();
        let mc = engine
            .price(PricingModel::MonteCarlo, &contract, &market)
            .unwrap();

        assert!((bs.price - tree.price).abs() < 0.05);
        let tolerance = 3.0 * mc.std_error.unwrap();
        assert!((bs.price - mc.price).abs() < tolerance);
    }

    #[test]
    fn test_put_call_parity_every_model() {
        let engine = PricingEngine::new(EngineConfig {
            binomial_steps: 500,
            monte_carlo_paths: 200_000,
            ..Default::default()
        });
        let market = MarketInputs::new(100.0, 0.05, 0.01, 0.2).unwrap();
        let call = OptionContract::european(OptionType::Call, 95.0, 0.5).unwrap();
        let put = OptionContract::european(OptionType::Put, 95.0, 0.5).unwrap();

        // C - P = S e^{-qT} - K e^{-rT}
        let parity = market.spot * (-market.dividend_yield * 0.5).exp()
            - 95.0 * (-market.risk_free_rate * 0.5f64).exp();

        for model in [PricingModel::BlackScholes, PricingModel::BinomialTree] {
            let c = engine.price(model, &call, &market).unwrap().price;
            let p = engine.price(model, &put, &market).unwrap().price;
            assert!((c - p - parity).abs() < 1e-8, "{model:?}");
        }

        // Same seed, so both legs see the same paths; the residual is the
        // sampling error of the mean terminal spot.
        let c = engine.price(PricingModel::MonteCarlo, &call, &market).unwrap();
        let p = engine.price(PricingModel::MonteCarlo, &put, &market).unwrap();
        let tolerance = 3.0 * (c.std_error.unwrap() + p.std_error.unwrap());
        assert!((c.price - p.price - parity).abs() < tolerance);
    }

    #[test]
    fn test_greeks_scaling() {
        let greeks = Greeks {
            delta: 0.5,
            gamma: 0.02,
            theta: -5.0,
            vega: 30.0,
            rho: 20.0,
        };
        let scaled = greeks.scaled(-2.0);
        assert_eq!(scaled.delta, -1.0);
        assert_eq!(scaled.vega, -60.0);

        let sum = greeks + scaled;
        assert_eq!(sum.delta, -0.5);
    }

    #[test]
    fn test_deterministic_value() {
        // Zero rate and yield: forward equals spot.
        let value = deterministic_value(OptionType::Call, 110.0, 100.0, 1.0, 0.0, 0.0);
        assert!((value - 10.0).abs() < 1e-12);
    }
}
