//! Options pricing and analysis engine.
//!
//! Prices European and American vanilla options with Black-Scholes, a
//! Cox-Ross-Rubinstein binomial tree, and Monte Carlo simulation; derives
//! Greeks and implied volatility; builds volatility and price surfaces from
//! option chains; evaluates multi-leg strategies; and measures portfolio
//! risk through historical and simulated VaR, expected shortfall, and
//! stress scenarios.

pub mod chart;
pub mod config;
pub mod data;
pub mod errors;
pub mod math;
pub mod pricing;
pub mod risk;
pub mod strategies;
pub mod surface;
pub mod types;

pub use config::EngineConfig;
pub use errors::{AnalyzerError, Result};
pub use pricing::{Greeks, PricingEngine, PricingModel, PricingResult};
pub use types::{ExerciseStyle, MarketInputs, OptionContract, OptionType};
