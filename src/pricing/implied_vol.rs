use crate::errors::{AnalyzerError, Result};
use crate::pricing::black_scholes;
use crate::types::{ExerciseStyle, MarketInputs, OptionContract};

const VOL_LOWER: f64 = 1e-4;
const VOL_UPPER: f64 = 5.0;
const TOLERANCE: f64 = 1e-8;
const MAX_ITERATIONS: usize = 100;

/// Newton-Raphson on vega with a bisection fallback whenever the Newton
/// step leaves the bracket or vega collapses.
pub fn implied_volatility(
    contract: &OptionContract,
    market: &MarketInputs,
    market_price: f64,
) -> Result<f64> {
    if contract.exercise_style != ExerciseStyle::European {
        return Err(AnalyzerError::UnsupportedExercise(contract.exercise_style));
    }
    if contract.expiry <= 0.0 {
        return Err(AnalyzerError::InvalidExpiry);
    }
    if !market_price.is_finite() || market_price <= 0.0 {
        return Err(AnalyzerError::PriceOutOfBounds);
    }

    let price_at = |vol: f64| -> Result<f64> {
        black_scholes::price_raw(
            contract.option_type,
            market.spot,
            contract.strike,
            contract.expiry,
            market.risk_free_rate,
            market.dividend_yield,
            vol,
        )
    };

    let mut lo = VOL_LOWER;
    let mut hi = VOL_UPPER;
    let f_lo = price_at(lo)? - market_price;
    let f_hi = price_at(hi)? - market_price;

    // Vanilla prices are monotone in volatility, so a bracket failure means
    // the quote sits outside the model's attainable range.
    if f_lo > 0.0 || f_hi < 0.0 {
        return Err(AnalyzerError::PriceOutOfBounds);
    }

    // Brenner-Subrahmanyam starting point, clamped into the bracket.
    let mut sigma = ((2.0 * std::f64::consts::PI / contract.expiry).sqrt() * market_price
        / market.spot)
        .clamp(lo, hi);

    for _ in 0..MAX_ITERATIONS {
        let diff = price_at(sigma)? - market_price;
        if diff.abs() < TOLERANCE {
            return Ok(sigma);
        }

        if diff > 0.0 {
            hi = sigma;
        } else {
            lo = sigma;
        }

        let vega = black_scholes::greeks_raw(
            contract.option_type,
            market.spot,
            contract.strike,
            contract.expiry,
            market.risk_free_rate,
            market.dividend_yield,
            sigma,
        )?
        .vega;

        let newton = sigma - diff / vega;
        sigma = if vega > 1e-10 && newton > lo && newton < hi {
            newton
        } else {
            0.5 * (lo + hi)
        };
    }

    tracing::warn!(
        strike = contract.strike,
        expiry = contract.expiry,
        market_price,
        "implied volatility search did not converge"
    );
    Err(AnalyzerError::NoConvergence(MAX_ITERATIONS))
}

/// Volatility implied by the quote, or None when the quote is unusable.
/// Convenience for bulk chain scans where bad quotes are expected.
pub fn try_implied_volatility(
    contract: &OptionContract,
    market: &MarketInputs,
    market_price: f64,
) -> Option<f64> {
    implied_volatility(contract, market, market_price).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::black_scholes;
    use crate::types::OptionType;

    fn test_market() -> MarketInputs {
        MarketInputs::new(100.0, 0.05, 0.0, 0.2).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let market = test_market();
        let contract = OptionContract::european(OptionType::Call, 105.0, 0.5).unwrap();

        let price = black_scholes::price(&contract, &market).unwrap().price;
        let iv = implied_volatility(&contract, &market, price).unwrap();

        assert!((iv - market.volatility).abs() < 1e-6);
    }

    #[test]
    fn test_round_trip_deep_otm_put() {
        let market = MarketInputs::new(100.0, 0.02, 0.01, 0.45).unwrap();
        let contract = OptionContract::european(OptionType::Put, 60.0, 0.25).unwrap();

        let price = black_scholes::price(&contract, &market).unwrap().price;
        let iv = implied_volatility(&contract, &market, price).unwrap();

        assert!((iv - market.volatility).abs() < 1e-5);
    }

    #[test]
    fn test_price_above_attainable_range_rejected() {
        let market = test_market();
        let contract = OptionContract::european(OptionType::Call, 100.0, 0.5).unwrap();

        // No volatility can push a call above its spot.
        assert!(matches!(
            implied_volatility(&contract, &market, 150.0),
            Err(AnalyzerError::PriceOutOfBounds)
        ));
    }

    #[test]
    fn test_price_below_intrinsic_rejected() {
        let market = MarketInputs::new(150.0, 0.05, 0.0, 0.2).unwrap();
        let contract = OptionContract::european(OptionType::Call, 100.0, 0.5).unwrap();

        // Deep ITM call quoted below its minimum value.
        assert!(matches!(
            implied_volatility(&contract, &market, 10.0),
            Err(AnalyzerError::PriceOutOfBounds)
        ));
    }

    #[test]
    fn test_nonpositive_quote_rejected() {
        let contract = OptionContract::european(OptionType::Call, 100.0, 0.5).unwrap();
        assert!(implied_volatility(&contract, &test_market(), 0.0).is_err());
        assert!(implied_volatility(&contract, &test_market(), f64::NAN).is_err());
    }
}
