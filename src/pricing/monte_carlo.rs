use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rayon::prelude::*;

use crate::errors::{AnalyzerError, Result};
use crate::math;
use crate::pricing::{deterministic_value, Greeks, PricingModel, PricingResult};
use crate::types::{ExerciseStyle, MarketInputs, OptionContract};

const SPOT_BUMP: f64 = 1e-2;
const VOL_BUMP: f64 = 1e-3;
const RATE_BUMP: f64 = 1e-4;
const THETA_DT: f64 = 1.0 / 365.0;

/// Risk-neutral GBM simulation of the terminal spot. European payoffs only;
/// early exercise needs a regression method this engine does not carry.
pub fn price(
    contract: &OptionContract,
    market: &MarketInputs,
    paths: usize,
    seed: u64,
) -> Result<PricingResult> {
    if contract.exercise_style != ExerciseStyle::European {
        return Err(AnalyzerError::UnsupportedExercise(contract.exercise_style));
    }
    if paths == 0 {
        return Err(AnalyzerError::InvalidParameters(
            "monte carlo requires at least one path".into(),
        ));
    }

    if contract.expiry <= 0.0 {
        return Ok(PricingResult {
            price: contract.intrinsic_value(market.spot),
            greeks: Greeks::default(),
            std_error: None,
            model: PricingModel::MonteCarlo,
        });
    }
    if market.volatility <= 0.0 {
        return Ok(PricingResult {
            price: deterministic_value(
                contract.option_type,
                market.spot,
                contract.strike,
                contract.expiry,
                market.risk_free_rate,
                market.dividend_yield,
            ),
            greeks: Greeks::default(),
            std_error: None,
            model: PricingModel::MonteCarlo,
        });
    }

    let (value, std_error) = simulate(contract, market, paths, seed);
    let greeks = finite_difference_greeks(contract, market, paths, seed, value)?;

    Ok(PricingResult {
        price: value,
        greeks,
        std_error: Some(std_error),
        model: PricingModel::MonteCarlo,
    })
}

/// Discounted mean payoff and its standard error. The terminal value of GBM
/// is sampled directly; vanilla payoffs do not depend on the path.
fn simulate(contract: &OptionContract, market: &MarketInputs, paths: usize, seed: u64) -> (f64, f64) {
    let drift = (market.risk_free_rate
        - market.dividend_yield
        - 0.5 * market.volatility * market.volatility)
        * contract.expiry;
    let diffusion = market.volatility * contract.expiry.sqrt();
    let discount = (-market.risk_free_rate * contract.expiry).exp();

    let payoffs: Vec<f64> = (0..paths)
        .into_par_iter()
        .map(|i| {
            // Per-path rng keyed off the seed keeps runs reproducible and
            // lets bumped re-runs share random numbers.
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
            let z: f64 = rng.sample(StandardNormal);
            let terminal = market.spot * (drift + diffusion * z).exp();
            contract.payoff(terminal)
        })
        .collect();

    let value = discount * math::mean(&payoffs);
    let std_error = discount * math::std_dev(&payoffs) / (paths as f64).sqrt();
    (value, std_error)
}

/// Central finite differences under common random numbers.
fn finite_difference_greeks(
    contract: &OptionContract,
    market: &MarketInputs,
    paths: usize,
    seed: u64,
    base: f64,
) -> Result<Greeks> {
    let spot_h = market.spot * SPOT_BUMP;
    let (up, _) = simulate(contract, &market.with_spot(market.spot + spot_h), paths, seed);
    let (down, _) = simulate(contract, &market.with_spot(market.spot - spot_h), paths, seed);
    let delta = (up - down) / (2.0 * spot_h);
    let gamma = (up - 2.0 * base + down) / (spot_h * spot_h);

    let (vol_up, _) = simulate(
        contract,
        &market.with_volatility(market.volatility + VOL_BUMP),
        paths,
        seed,
    );
    let (vol_down, _) = simulate(
        contract,
        &market.with_volatility((market.volatility - VOL_BUMP).max(1e-8)),
        paths,
        seed,
    );
    let vega = (vol_up - vol_down) / (2.0 * VOL_BUMP);

    let (rate_up, _) = simulate(
        contract,
        &market.with_rate(market.risk_free_rate + RATE_BUMP),
        paths,
        seed,
    );
    let (rate_down, _) = simulate(
        contract,
        &market.with_rate(market.risk_free_rate - RATE_BUMP),
        paths,
        seed,
    );
    let rho = (rate_up - rate_down) / (2.0 * RATE_BUMP);

    let decayed = contract.with_expiry(contract.expiry - THETA_DT);
    let (later, _) = simulate(&decayed, market, paths, seed);
    let theta = (later - base) / THETA_DT;

    Ok(Greeks {
        delta,
        gamma,
        theta,
        vega,
        rho,
    })
}
