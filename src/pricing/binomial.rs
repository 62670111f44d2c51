use crate::errors::{AnalyzerError, Result};
use crate::pricing::{deterministic_value, Greeks, PricingModel, PricingResult};
use crate::types::{ExerciseStyle, MarketInputs, OptionContract, OptionType};

/// Cox-Ross-Rubinstein lattice. Handles both European and American
/// exercise; American nodes take max(hold, exercise) on every step.
pub fn price(contract: &OptionContract, market: &MarketInputs, steps: usize) -> Result<PricingResult> {
    if steps < 2 {
        return Err(AnalyzerError::InvalidParameters(
            "binomial tree requires at least 2 steps".into(),
        ));
    }

    if contract.expiry <= 0.0 {
        return Ok(PricingResult {
            price: contract.intrinsic_value(market.spot),
            greeks: Greeks::default(),
            std_error: None,
            model: PricingModel::BinomialTree,
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
            model: PricingModel::BinomialTree,
        });
    }

    let lattice = evaluate(contract, market, steps)?;
    let greeks = lattice_greeks(contract, market, steps, &lattice)?;

    Ok(PricingResult {
        price: lattice.value,
        greeks,
        std_error: None,
        model: PricingModel::BinomialTree,
    })
}

struct Lattice {
    value: f64,
    /// Option values one step in: [down, up].
    level1: [f64; 2],
    /// Option values two steps in: [dd, ud, uu].
    level2: [f64; 3],
    up: f64,
    down: f64,
    dt: f64,
}

// Past this the lattice allocation stops being worth it; extreme
// drift-to-volatility ratios fail the probability check instead.
const MAX_AUTO_STEPS: usize = 10_000;

fn evaluate(contract: &OptionContract, market: &MarketInputs, steps: usize) -> Result<Lattice> {
    let spot = market.spot;
    let strike = contract.strike;

    // p stays inside [0, 1] only while |r - q|·dt < sigma·sqrt(dt). Raise
    // the step count for low-volatility, high-drift inputs instead of
    // rejecting them.
    let drift = market.risk_free_rate - market.dividend_yield;
    let min_steps =
        (contract.expiry * (drift / market.volatility).powi(2)).ceil() as usize + 1;
    let steps = steps.max(min_steps.min(MAX_AUTO_STEPS));

    let dt = contract.expiry / steps as f64;
    let up = (market.volatility * dt.sqrt()).exp();
    let down = 1.0 / up;
    let growth = ((market.risk_free_rate - market.dividend_yield) * dt).exp();
    let p = (growth - down) / (up - down);
    let discount = (-market.risk_free_rate * dt).exp();

    if !(0.0..=1.0).contains(&p) {
        return Err(AnalyzerError::InvalidParameters(
            "risk-neutral probability outside [0, 1]; increase step count".into(),
        ));
    }

    // Terminal payoffs; node j at level i has spot * u^j * d^(i-j).
    let mut values: Vec<f64> = (0..=steps)
        .map(|j| {
            let terminal = spot * up.powi(j as i32) * down.powi((steps - j) as i32);
            match contract.option_type {
                OptionType::Call => (terminal - strike).max(0.0),
                OptionType::Put => (strike - terminal).max(0.0),
            }
        })
        .collect();

    let mut level1 = [0.0; 2];
    let mut level2 = [0.0; 3];
    if steps == 2 {
        level2.copy_from_slice(&values[..3]);
    }

    for i in (0..steps).rev() {
        for j in 0..=i {
            let hold = discount * (p * values[j + 1] + (1.0 - p) * values[j]);
            values[j] = match contract.exercise_style {
                ExerciseStyle::European => hold,
                ExerciseStyle::American => {
                    let node_spot = spot * up.powi(j as i32) * down.powi((i - j) as i32);
                    hold.max(contract.intrinsic_value(node_spot))
                }
            };
        }
        if i == 2 {
            level2.copy_from_slice(&values[..3]);
        }
        if i == 1 {
            level1.copy_from_slice(&values[..2]);
        }
    }

    Ok(Lattice {
        value: values[0],
        level1,
        level2,
        up,
        down,
        dt,
    })
}

/// Delta/gamma/theta read off the lattice, vega/rho by central differences.
fn lattice_greeks(
    contract: &OptionContract,
    market: &MarketInputs,
    steps: usize,
    lattice: &Lattice,
) -> Result<Greeks> {
    let spot = market.spot;
    let (up, down) = (lattice.up, lattice.down);

    let delta = (lattice.level1[1] - lattice.level1[0]) / (spot * up - spot * down);

    let s_uu = spot * up * up;
    let s_ud = spot;
    let s_dd = spot * down * down;
    let delta_up = (lattice.level2[2] - lattice.level2[1]) / (s_uu - s_ud);
    let delta_down = (lattice.level2[1] - lattice.level2[0]) / (s_ud - s_dd);
    let gamma = (delta_up - delta_down) / (0.5 * (s_uu - s_dd));

    // Node (2, 1) sits at the initial spot, two time steps later.
    let theta = (lattice.level2[1] - lattice.value) / (2.0 * lattice.dt);

    let vol_bump = 1e-4;
    let vega = {
        let up_px = evaluate(contract, &market.with_volatility(market.volatility + vol_bump), steps)?;
        let down_px = evaluate(
            contract,
            &market.with_volatility((market.volatility - vol_bump).max(1e-8)),
            steps,
        )?;
        (up_px.value - down_px.value) / (2.0 * vol_bump)
    };

    let rate_bump = 1e-4;
    let rho = {
        let up_px = evaluate(contract, &market.with_rate(market.risk_free_rate + rate_bump), steps)?;
        let down_px = evaluate(contract, &market.with_rate(market.risk_free_rate - rate_bump), steps)?;
        (up_px.value - down_px.value) / (2.0 * rate_bump)
    };

    Ok(Greeks {
        delta,
        gamma,
        theta,
        vega,
        rho,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::black_scholes;

    fn test_market() -> MarketInputs {
        MarketInputs::new(100.0, 0.05, 0.0, 0.2).unwrap()
    }

    #[test]
    fn test_european_converges_to_black_scholes() {
        let market = test_market();
        let contract = OptionContract::european(OptionType::Call, 105.0, 0.5).unwrap();

        let bs = black_scholes::price(&contract, &market).unwrap().price;
        let tree = price(&contract, &market, 1000).unwrap().price;

        assert!((bs - tree).abs() < 0.01);
    }

    #[test]
    fn test_american_put_carries_premium() {
        let market = test_market();
        let european = OptionContract::european(OptionType::Put, 110.0, 1.0).unwrap();
        let american = OptionContract::american(OptionType::Put, 110.0, 1.0).unwrap();

        let eu = price(&european, &market, 500).unwrap().price;
        let am = price(&american, &market, 500).unwrap().price;

        // Early exercise is worth something for a deep ITM put.
        assert!(am > eu);
        // And never less than immediate exercise.
        assert!(am >= american.intrinsic_value(market.spot) - 1e-9);
    }

    #[test]
    fn test_american_call_no_dividend_equals_european() {
        let market = test_market();
        let european = OptionContract::european(OptionType::Call, 100.0, 0.5).unwrap();
        let american = OptionContract::american(OptionType::Call, 100.0, 0.5).unwrap();

        let eu = price(&european, &market, 500).unwrap().price;
        let am = price(&american, &market, 500).unwrap().price;

        // Without dividends early exercise of a call is never optimal.
        assert!((am - eu).abs() < 1e-6);
    }

    #[test]
    fn test_tree_greeks_close_to_analytic() {
        let market = test_market();
        let contract = OptionContract::european(OptionType::Call, 100.0, 0.5).unwrap();

        let analytic = black_scholes::greeks(&contract, &market).unwrap();
        let tree = price(&contract, &market, 1000).unwrap().greeks;

        assert!((tree.delta - analytic.delta).abs() < 0.01);
        assert!((tree.gamma - analytic.gamma).abs() < 0.01);
        assert!((tree.vega - analytic.vega).abs() < 0.5);
        assert!((tree.rho - analytic.rho).abs() < 0.5);
    }

    #[test]
    fn test_expired_returns_intrinsic() {
        let market = MarketInputs::new(90.0, 0.05, 0.0, 0.2).unwrap();
        let put = OptionContract::american(OptionType::Put, 100.0, 0.0).unwrap();
        let result = price(&put, &market, 100).unwrap();
        assert_eq!(result.price, 10.0);
    }

    #[test]
    fn test_low_volatility_high_rate_priced() {
        // sigma*sqrt(dt) < |r - q|*dt at 200 steps; the tree deepens
        // itself instead of rejecting the input.
        let market = MarketInputs::new(100.0, 0.30, 0.0, 0.01).unwrap();
        let contract = OptionContract::european(OptionType::Call, 100.0, 1.0).unwrap();

        let bs = black_scholes::price(&contract, &market).unwrap().price;
        let tree = price(&contract, &market, 200).unwrap().price;

        assert!((bs - tree).abs() < 0.05);
    }

    #[test]
    fn test_too_few_steps_rejected() {
        let contract = OptionContract::european(OptionType::Call, 100.0, 0.5).unwrap();
        assert!(price(&contract, &test_market(), 1).is_err());
    }
}
