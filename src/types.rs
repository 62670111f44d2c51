use serde::{Deserialize, Serialize};

use crate::errors::{AnalyzerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionType {
    Call,
    Put,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExerciseStyle {
    European,
    American,
}

/// A single vanilla option contract. Expiry is expressed in years.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    pub option_type: OptionType,
    pub strike: f64,
    pub expiry: f64,
    pub exercise_style: ExerciseStyle,
}

impl OptionContract {
    pub fn new(
        option_type: OptionType,
        strike: f64,
        expiry: f64,
        exercise_style: ExerciseStyle,
    ) -> Result<Self> {
        if !strike.is_finite() || strike <= 0.0 {
            return Err(AnalyzerError::InvalidStrike);
        }
        if !expiry.is_finite() || expiry < 0.0 {
            return Err(AnalyzerError::InvalidExpiry);
        }
        Ok(Self {
            option_type,
            strike,
            expiry,
            exercise_style,
        })
    }

    pub fn european(option_type: OptionType, strike: f64, expiry: f64) -> Result<Self> {
        Self::new(option_type, strike, expiry, ExerciseStyle::European)
    }

    pub fn american(option_type: OptionType, strike: f64, expiry: f64) -> Result<Self> {
        Self::new(option_type, strike, expiry, ExerciseStyle::American)
    }

    /// Value of immediate exercise at the given spot.
    pub fn intrinsic_value(&self, spot: f64) -> f64 {
        match self.option_type {
            OptionType::Call => (spot - self.strike).max(0.0),
            OptionType::Put => (self.strike - spot).max(0.0),
        }
    }

    /// Terminal payoff of one long contract.
    pub fn payoff(&self, spot: f64) -> f64 {
        self.intrinsic_value(spot)
    }

    pub fn with_expiry(&self, expiry: f64) -> Self {
        Self {
            expiry: expiry.max(0.0),
            ..*self
        }
    }
}

/// Market snapshot used to evaluate a contract.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketInputs {
    pub spot: f64,
    pub risk_free_rate: f64,
    pub dividend_yield: f64,
    pub volatility: f64,
}

impl MarketInputs {
    pub fn new(spot: f64, risk_free_rate: f64, dividend_yield: f64, volatility: f64) -> Result<Self> {
        if !spot.is_finite() || spot <= 0.0 {
            return Err(AnalyzerError::InvalidPrice);
        }
        if !volatility.is_finite() || volatility < 0.0 {
            return Err(AnalyzerError::InvalidVolatility);
        }
        if !risk_free_rate.is_finite() || !dividend_yield.is_finite() {
            return Err(AnalyzerError::InvalidParameters(
                "rates must be finite".into(),
            ));
        }
        Ok(Self {
            spot,
            risk_free_rate,
            dividend_yield,
            volatility,
        })
    }

    pub fn with_spot(&self, spot: f64) -> Self {
        Self { spot, ..*self }
    }

    pub fn with_volatility(&self, volatility: f64) -> Self {
        Self { volatility, ..*self }
    }

    pub fn with_rate(&self, risk_free_rate: f64) -> Self {
        Self {
            risk_free_rate,
            ..*self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_validation() {
        assert!(OptionContract::european(OptionType::Call, 100.0, 0.5).is_ok());
        assert!(OptionContract::european(OptionType::Call, -1.0, 0.5).is_err());
        assert!(OptionContract::european(OptionType::Call, 100.0, -0.5).is_err());
        assert!(OptionContract::european(OptionType::Call, f64::NAN, 0.5).is_err());
    }

    #[test]
    fn test_intrinsic_value() {
        let call = OptionContract::european(OptionType::Call, 100.0, 1.0).unwrap();
        let put = OptionContract::european(OptionType::Put, 100.0, 1.0).unwrap();

        assert_eq!(call.intrinsic_value(110.0), 10.0);
        assert_eq!(call.intrinsic_value(90.0), 0.0);
        assert_eq!(put.intrinsic_value(90.0), 10.0);
        assert_eq!(put.intrinsic_value(110.0), 0.0);
    }

    #[test]
    fn test_market_inputs_validation() {
        assert!(MarketInputs::new(100.0, 0.05, 0.0, 0.2).is_ok());
        assert!(MarketInputs::new(0.0, 0.05, 0.0, 0.2).is_err());
        assert!(MarketInputs::new(100.0, 0.05, 0.0, -0.2).is_err());
    }
}
