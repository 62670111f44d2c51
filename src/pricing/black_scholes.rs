use statrs::distribution::{Continuous, ContinuousCDF};

use crate::errors::{AnalyzerError, Result};
use crate::math::standard_normal;
use crate::pricing::{deterministic_value, Greeks, PricingModel, PricingResult};
use crate::types::{ExerciseStyle, MarketInputs, OptionContract, OptionType};

/// Closed-form Black-Scholes price and Greeks for a European contract.
pub fn price(contract: &OptionContract, market: &MarketInputs) -> Result<PricingResult> {
    if contract.exercise_style != ExerciseStyle::European {
        return Err(AnalyzerError::UnsupportedExercise(contract.exercise_style));
    }

    let price = price_raw(
        contract.option_type,
        market.spot,
        contract.strike,
        contract.expiry,
        market.risk_free_rate,
        market.dividend_yield,
        market.volatility,
    )?;
    let greeks = greeks_raw(
        contract.option_type,
        market.spot,
        contract.strike,
        contract.expiry,
        market.risk_free_rate,
        market.dividend_yield,
        market.volatility,
    )?;

    Ok(PricingResult {
        price,
        greeks,
        std_error: None,
        model: PricingModel::BlackScholes,
    })
}

pub fn greeks(contract: &OptionContract, market: &MarketInputs) -> Result<Greeks> {
    greeks_raw(
        contract.option_type,
        market.spot,
        contract.strike,
        contract.expiry,
        market.risk_free_rate,
        market.dividend_yield,
        market.volatility,
    )
}

pub(crate) fn price_raw(
    option_type: OptionType,
    spot: f64,
    strike: f64,
    expiry: f64,
    rate: f64,
    dividend_yield: f64,
    volatility: f64,
) -> Result<f64> {
    // At or past expiry only intrinsic value remains.
    if expiry <= 0.0 {
        return Ok(match option_type {
            OptionType::Call => (spot - strike).max(0.0),
            OptionType::Put => (strike - spot).max(0.0),
        });
    }
    if volatility <= 0.0 {
        return Ok(deterministic_value(
            option_type,
            spot,
            strike,
            expiry,
            rate,
            dividend_yield,
        ));
    }

    let normal = standard_normal()?;
    let sqrt_t = expiry.sqrt();
    let d1 = ((spot / strike).ln() + (rate - dividend_yield + 0.5 * volatility * volatility) * expiry)
        / (volatility * sqrt_t);
    let d2 = d1 - volatility * sqrt_t;

    let discount = (-rate * expiry).exp();
    let forward_factor = (-dividend_yield * expiry).exp();

    let price = match option_type {
        OptionType::Call => {
            spot * forward_factor * normal.cdf(d1) - strike * discount * normal.cdf(d2)
        }
        OptionType::Put => {
            strike * discount * normal.cdf(-d2) - spot * forward_factor * normal.cdf(-d1)
        }
    };

    Ok(price)
}

pub(crate) fn greeks_raw(
    option_type: OptionType,
    spot: f64,
    strike: f64,
    expiry: f64,
    rate: f64,
    dividend_yield: f64,
    volatility: f64,
) -> Result<Greeks> {
    if expiry <= 0.0 || volatility <= 0.0 {
        return Ok(Greeks::default());
    }

    let normal = standard_normal()?;
    let sqrt_t = expiry.sqrt();
    let d1 = ((spot / strike).ln() + (rate - dividend_yield + 0.5 * volatility * volatility) * expiry)
        / (volatility * sqrt_t);
    let d2 = d1 - volatility * sqrt_t;

    let nd1 = normal.cdf(d1);
    let nd2 = normal.cdf(d2);
    let npd1 = normal.pdf(d1);

    let discount = (-rate * expiry).exp();
    let forward_factor = (-dividend_yield * expiry).exp();

    let delta = match option_type {
        OptionType::Call => forward_factor * nd1,
        OptionType::Put => forward_factor * (nd1 - 1.0),
    };

    let gamma = forward_factor * npd1 / (spot * volatility * sqrt_t);

    let theta = match option_type {
        OptionType::Call => {
            -spot * forward_factor * npd1 * volatility / (2.0 * sqrt_t)
                - rate * strike * discount * nd2
                + dividend_yield * spot * forward_factor * nd1
        }
        OptionType::Put => {
            -spot * forward_factor * npd1 * volatility / (2.0 * sqrt_t)
                + rate * strike * discount * (1.0 - nd2)
                - dividend_yield * spot * forward_factor * (1.0 - nd1)
        }
    };

    let vega = spot * forward_factor * npd1 * sqrt_t;

    let rho = match option_type {
        OptionType::Call => strike * expiry * discount * nd2,
        OptionType::Put => -strike * expiry * discount * (1.0 - nd2),
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

    fn test_market() -> MarketInputs {
        MarketInputs::new(100.0, 0.05, 0.0, 0.2).unwrap()
    }

    #[test]
    fn test_atm_call_price() {
        let contract = OptionContract::european(OptionType::Call, 100.0, 0.25).unwrap();
        let result = price(&contract, &test_market()).unwrap();
        // Known value for S=K=100, T=0.25, r=5%, sigma=20%.
        assert!((result.price - 4.615).abs() < 0.01);
    }

    #[test]
    fn test_put_call_parity() {
        let market = test_market();
        let call = OptionContract::european(OptionType::Call, 95.0, 0.5).unwrap();
        let put = OptionContract::european(OptionType::Put, 95.0, 0.5).unwrap();

        let call_price = price(&call, &market).unwrap().price;
        let put_price = price(&put, &market).unwrap().price;
        let parity = market.spot - 95.0 * (-market.risk_free_rate * 0.5_f64).exp();

        assert!((call_price - put_price - parity).abs() < 1e-9);
    }

    #[test]
    fn test_expired_option_is_intrinsic() {
        let market = MarketInputs::new(120.0, 0.05, 0.0, 0.2).unwrap();
        let call = OptionContract::european(OptionType::Call, 100.0, 0.0).unwrap();
        let result = price(&call, &market).unwrap();
        assert_eq!(result.price, 20.0);
        assert_eq!(result.greeks, Greeks::default());
    }

    #[test]
    fn test_greek_signs() {
        let market = test_market();
        let call = OptionContract::european(OptionType::Call, 100.0, 0.5).unwrap();
        let put = OptionContract::european(OptionType::Put, 100.0, 0.5).unwrap();

        let cg = greeks(&call, &market).unwrap();
        let pg = greeks(&put, &market).unwrap();

        assert!(cg.delta > 0.0 && cg.delta < 1.0);
        assert!(pg.delta < 0.0 && pg.delta > -1.0);
        assert!(cg.gamma > 0.0);
        assert!((cg.gamma - pg.gamma).abs() < 1e-12);
        assert!(cg.vega > 0.0);
        assert!((cg.vega - pg.vega).abs() < 1e-12);
        assert!(cg.theta < 0.0);
        assert!(cg.rho > 0.0);
        assert!(pg.rho < 0.0);
    }

    #[test]
    fn test_delta_matches_finite_difference() {
        let market = test_market();
        let call = OptionContract::european(OptionType::Call, 105.0, 0.5).unwrap();
        let h = 0.01;

        let up = price(&call, &market.with_spot(market.spot + h)).unwrap().price;
        let down = price(&call, &market.with_spot(market.spot - h)).unwrap().price;
        let fd_delta = (up - down) / (2.0 * h);

        let analytic = greeks(&call, &market).unwrap().delta;
        assert!((fd_delta - analytic).abs() < 1e-4);
    }

    #[test]
    fn test_american_contract_rejected() {
        let contract = OptionContract::american(OptionType::Put, 100.0, 0.5).unwrap();
        assert!(matches!(
            price(&contract, &test_market()),
            Err(AnalyzerError::UnsupportedExercise(_))
        ));
    }
}
