use chrono::NaiveDate;
use itertools::Itertools;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::data::OptionChain;
use crate::errors::{AnalyzerError, Result};
use crate::math::CALENDAR_DAYS_PER_YEAR;
use crate::pricing::{black_scholes, implied_vol};
use crate::types::{MarketInputs, OptionContract, OptionType};

const GRID_POINTS: usize = 50;
const DAY_POINTS_PER_EXPIRY: usize = 5;
const SPOT_AXIS_WIDTH: f64 = 0.3;

/// One observed implied-volatility sample.
#[derive(Debug, Clone, Copy, PartialEq)]
struct VolPoint {
    strike: f64,
    days_to_expiry: f64,
    implied_volatility: f64,
}

/// Rectangular grid of values over (x, y); z[[i, j]] belongs to (x[i], y[j]).
#[derive(Debug, Clone)]
pub struct SurfaceGrid {
    pub x: Array1<f64>,
    pub y: Array1<f64>,
    pub z: Array2<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GreekKind {
    Delta,
    Gamma,
    Theta,
    Vega,
    Rho,
}

/// Implied-volatility surface over (strike, days to expiry), built from
/// observed chain quotes and queried by bilinear interpolation.
pub struct VolatilitySurface {
    strike_grid: Array1<f64>,
    day_grid: Array1<f64>,
    surface: Array2<f64>,
}

impl VolatilitySurface {
    /// Builds the surface from every usable call and put quote within
    /// `width` of the spot. Expired chains and non-finite IVs are skipped.
    pub fn from_chains(
        chains: &[OptionChain],
        spot: f64,
        as_of: NaiveDate,
        width: f64,
    ) -> Result<Self> {
        let (strike_lo, strike_hi) = (spot * (1.0 - width), spot * (1.0 + width));

        let mut points = Vec::new();
        for chain in chains {
            let days = chain.days_to_expiry(as_of) as f64;
            if days <= 0.0 {
                continue;
            }
            for quote in chain.calls.iter().chain(chain.puts.iter()) {
                if !quote.has_valid_iv() || quote.strike < strike_lo || quote.strike > strike_hi {
                    continue;
                }
                points.push(VolPoint {
                    strike: quote.strike,
                    days_to_expiry: days,
                    implied_volatility: quote.implied_volatility,
                });
            }
        }

        if points.is_empty() {
            return Err(AnalyzerError::InsufficientData(
                "no usable implied volatility quotes".into(),
            ));
        }

        let strikes: Vec<f64> = points
            .iter()
            .map(|p| p.strike)
            .sorted_by(f64::total_cmp)
            .dedup()
            .collect();
        let days: Vec<f64> = points
            .iter()
            .map(|p| p.days_to_expiry)
            .sorted_by(f64::total_cmp)
            .dedup()
            .collect();

        let day_points = (days.len() * DAY_POINTS_PER_EXPIRY).clamp(2, GRID_POINTS);
        let strike_grid = Array1::linspace(strikes[0], strikes[strikes.len() - 1], GRID_POINTS);
        let day_grid = Array1::linspace(days[0], days[days.len() - 1], day_points);

        let mut surface = Array2::zeros((GRID_POINTS, day_points));
        for (i, &strike) in strike_grid.iter().enumerate() {
            for (j, &day) in day_grid.iter().enumerate() {
                surface[[i, j]] = nearest_sample(&points, &days, strike, day);
            }
        }

        tracing::debug!(
            samples = points.len(),
            strikes = strikes.len(),
            expiries = days.len(),
            "volatility surface constructed"
        );

        Ok(Self {
            strike_grid,
            day_grid,
            surface,
        })
    }

    /// Bilinear lookup; queries outside the grid are clamped to the edge
    /// (flat extrapolation).
    pub fn volatility_at(&self, strike: f64, days_to_expiry: f64) -> Result<f64> {
        let strike = strike.clamp(
            self.strike_grid[0],
            self.strike_grid[self.strike_grid.len() - 1],
        );
        let days = days_to_expiry.clamp(self.day_grid[0], self.day_grid[self.day_grid.len() - 1]);

        let (i, i_next, s_ratio) = find_segment(&self.strike_grid, strike)?;
        let (j, j_next, t_ratio) = find_segment(&self.day_grid, days)?;

        let v00 = self.surface[[i, j]];
        let v10 = self.surface[[i_next, j]];
        let v01 = self.surface[[i, j_next]];
        let v11 = self.surface[[i_next, j_next]];

        Ok(v00 * (1.0 - s_ratio) * (1.0 - t_ratio)
            + v10 * s_ratio * (1.0 - t_ratio)
            + v01 * (1.0 - s_ratio) * t_ratio
            + v11 * s_ratio * t_ratio)
    }

    pub fn grid(&self) -> SurfaceGrid {
        SurfaceGrid {
            x: self.strike_grid.clone(),
            y: self.day_grid.clone(),
            z: self.surface.clone(),
        }
    }
}

/// IV of the sample nearest in expiry, then nearest in strike within that
/// expiry.
fn nearest_sample(points: &[VolPoint], days: &[f64], strike: f64, day: f64) -> f64 {
    let closest_day = days
        .iter()
        .copied()
        .min_by(|a, b| (a - day).abs().total_cmp(&(b - day).abs()))
        .unwrap_or(day);

    points
        .iter()
        .filter(|p| (p.days_to_expiry - closest_day).abs() < 0.5)
        .min_by(|a, b| {
            (a.strike - strike)
                .abs()
                .total_cmp(&(b.strike - strike).abs())
        })
        .map(|p| p.implied_volatility)
        .unwrap_or(0.0)
}

/// Binary search for the grid segment containing `value`, returning both
/// endpoints and the interpolation ratio.
fn find_segment(grid: &Array1<f64>, value: f64) -> Result<(usize, usize, f64)> {
    let n = grid.len();
    if n == 0 {
        return Err(AnalyzerError::InsufficientData("empty grid".into()));
    }

    let mut left = 0;
    let mut right = n - 1;
    while left < right {
        let mid = (left + right + 1) / 2;
        if grid[mid] <= value {
            left = mid;
        } else {
            right = mid - 1;
        }
    }

    let i = left;
    let i_next = (i + 1).min(n - 1);
    let ratio = if i == i_next || grid[i_next] == grid[i] {
        0.0
    } else {
        (value - grid[i]) / (grid[i_next] - grid[i])
    };
    Ok((i, i_next, ratio))
}

/// Per-expiry volatility smile: (strike, implied volatility) sorted by
/// strike.
pub fn smile(chain: &OptionChain, option_type: OptionType, spot: f64, width: f64) -> Vec<(f64, f64)> {
    chain
        .near_the_money(option_type, spot, width)
        .into_iter()
        .filter(|q| q.has_valid_iv())
        .map(|q| (q.strike, q.implied_volatility))
        .sorted_by(|a, b| a.0.total_cmp(&b.0))
        .collect()
}

/// Volatility smile backed out of market mid prices rather than quoted
/// IVs: (strike, implied volatility) sorted by strike. Quotes whose mids
/// sit outside the attainable price range are skipped.
pub fn implied_smile(
    chain: &OptionChain,
    option_type: OptionType,
    market: &MarketInputs,
    as_of: NaiveDate,
    width: f64,
) -> Result<Vec<(f64, f64)>> {
    let expiry = chain.years_to_expiry(as_of);
    if expiry <= 0.0 {
        return Err(AnalyzerError::InvalidExpiry);
    }

    let mut points = Vec::new();
    for quote in chain.near_the_money(option_type, market.spot, width) {
        let contract = OptionContract::european(option_type, quote.strike, expiry)?;
        if let Some(iv) = implied_vol::try_implied_volatility(&contract, market, quote.mid_price())
        {
            points.push((quote.strike, iv));
        }
    }
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    Ok(points)
}

/// Black-Scholes price over (spot, days to expiry) at a fixed strike: the
/// strike is the midpoint of `strike_range`, the spot axis spans 70%-130%
/// of the current price.
pub fn price_surface(
    option_type: OptionType,
    current_price: f64,
    day_range: (f64, f64),
    strike_range: (f64, f64),
    volatility: f64,
    risk_free_rate: f64,
) -> Result<SurfaceGrid> {
    evaluate_surface(
        current_price,
        day_range,
        strike_range,
        |spot, years, strike| {
            black_scholes::price_raw(option_type, spot, strike, years, risk_free_rate, 0.0, volatility)
        },
    )
}

/// A single Greek over the same (spot, days to expiry) grid.
pub fn greek_surface(
    option_type: OptionType,
    greek: GreekKind,
    current_price: f64,
    day_range: (f64, f64),
    strike_range: (f64, f64),
    volatility: f64,
    risk_free_rate: f64,
) -> Result<SurfaceGrid> {
    evaluate_surface(
        current_price,
        day_range,
        strike_range,
        |spot, years, strike| {
            let greeks = black_scholes::greeks_raw(
                option_type,
                spot,
                strike,
                years,
                risk_free_rate,
                0.0,
                volatility,
            )?;
            Ok(match greek {
                GreekKind::Delta => greeks.delta,
                GreekKind::Gamma => greeks.gamma,
                GreekKind::Theta => greeks.theta,
                GreekKind::Vega => greeks.vega,
                GreekKind::Rho => greeks.rho,
            })
        },
    )
}

fn evaluate_surface(
    current_price: f64,
    day_range: (f64, f64),
    strike_range: (f64, f64),
    eval: impl Fn(f64, f64, f64) -> Result<f64>,
) -> Result<SurfaceGrid> {
    if current_price <= 0.0 {
        return Err(AnalyzerError::InvalidPrice);
    }
    if day_range.1 < day_range.0 || strike_range.1 < strike_range.0 {
        return Err(AnalyzerError::InvalidParameters(
            "surface ranges must be ordered".into(),
        ));
    }

    let spots = Array1::linspace(
        current_price * (1.0 - SPOT_AXIS_WIDTH),
        current_price * (1.0 + SPOT_AXIS_WIDTH),
        GRID_POINTS,
    );
    let days = Array1::linspace(day_range.0, day_range.1, GRID_POINTS);
    let strike = strike_range.0 + (strike_range.1 - strike_range.0) / 2.0;

    let mut z = Array2::zeros((GRID_POINTS, GRID_POINTS));
    for (i, &spot) in spots.iter().enumerate() {
        for (j, &day) in days.iter().enumerate() {
            let years = day / CALENDAR_DAYS_PER_YEAR;
            z[[i, j]] = eval(spot, years, strike)?;
        }
    }

    Ok(SurfaceGrid {
        x: spots,
        y: days,
        z,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::OptionQuote;

    fn quote(strike: f64, iv: f64) -> OptionQuote {
        OptionQuote {
            strike,
            last_price: 1.0,
            bid: 0.9,
            ask: 1.1,
            implied_volatility: iv,
            volume: None,
            open_interest: None,
        }
    }

    fn chains() -> Vec<OptionChain> {
        let build = |expiration: &str, base_iv: f64| OptionChain {
            symbol: "AAPL".into(),
            expiration: expiration.parse().unwrap(),
            calls: vec![quote(90.0, base_iv + 0.05), quote(100.0, base_iv), quote(110.0, base_iv + 0.04)],
            puts: vec![quote(90.0, base_iv + 0.06), quote(110.0, base_iv + 0.03)],
        };
        vec![build("2024-02-16", 0.20), build("2024-05-17", 0.25)]
    }

    fn as_of() -> NaiveDate {
        "2024-01-15".parse().unwrap()
    }

    #[test]
    fn test_surface_interpolates_between_samples() {
        let surface = VolatilitySurface::from_chains(&chains(), 100.0, as_of(), 0.5).unwrap();

        // At an observed node the surface reproduces the quote.
        let atm_near = surface.volatility_at(100.0, 32.0).unwrap();
        assert!((atm_near - 0.20).abs() < 0.03);

        // Values stay within the observed IV range everywhere.
        let v = surface.volatility_at(95.0, 60.0).unwrap();
        assert!((0.19..=0.32).contains(&v));
    }

    #[test]
    fn test_flat_extrapolation_outside_grid() {
        let surface = VolatilitySurface::from_chains(&chains(), 100.0, as_of(), 0.5).unwrap();

        let inside = surface.volatility_at(90.0, 32.0).unwrap();
        let outside = surface.volatility_at(40.0, 32.0).unwrap();
        assert!((inside - outside).abs() < 1e-9);
    }

    #[test]
    fn test_expired_chains_skipped() {
        let late: NaiveDate = "2024-12-31".parse().unwrap();
        assert!(matches!(
            VolatilitySurface::from_chains(&chains(), 100.0, late, 0.5),
            Err(AnalyzerError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_smile_sorted_by_strike() {
        let points = smile(&chains()[0], OptionType::Call, 100.0, 0.2);
        assert_eq!(points.len(), 3);
        assert!(points.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_implied_smile_recovers_volatility() {
        let market = MarketInputs::new(100.0, 0.05, 0.0, 0.2).unwrap();
        let as_of = as_of();
        let mut chain = chains().remove(0);
        let expiry = chain.years_to_expiry(as_of);

        // Quote each call at its model mid so the loop backs the input
        // volatility out again.
        for quote in &mut chain.calls {
            let fair = black_scholes::price_raw(
                OptionType::Call,
                market.spot,
                quote.strike,
                expiry,
                market.risk_free_rate,
                market.dividend_yield,
                market.volatility,
            )
            .unwrap();
            quote.bid = fair;
            quote.ask = fair;
        }

        let points = implied_smile(&chain, OptionType::Call, &market, as_of, 0.2).unwrap();
        assert_eq!(points.len(), 3);
        assert!(points.iter().all(|p| (p.1 - 0.2).abs() < 1e-5));
        assert!(points.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_implied_smile_rejects_expired_chain() {
        let market = MarketInputs::new(100.0, 0.05, 0.0, 0.2).unwrap();
        let late: NaiveDate = "2024-12-31".parse().unwrap();
        assert!(matches!(
            implied_smile(&chains()[0], OptionType::Call, &market, late, 0.2),
            Err(AnalyzerError::InvalidExpiry)
        ));
    }

    #[test]
    fn test_price_surface_monotone_in_time() {
        let grid = price_surface(
            OptionType::Call,
            100.0,
            (10.0, 120.0),
            (95.0, 105.0),
            0.2,
            0.05,
        )
        .unwrap();

        // ATM call value grows with time to expiry.
        let mid = GRID_POINTS / 2;
        assert!(grid.z[[mid, GRID_POINTS - 1]] > grid.z[[mid, 0]]);
    }

    #[test]
    fn test_delta_surface_bounds() {
        let grid = greek_surface(
            OptionType::Call,
            GreekKind::Delta,
            100.0,
            (10.0, 120.0),
            (95.0, 105.0),
            0.2,
            0.05,
        )
        .unwrap();

        assert!(grid.z.iter().all(|&d| (0.0..=1.0).contains(&d)));
        // Delta rises with spot.
        assert!(grid.z[[GRID_POINTS - 1, 0]] > grid.z[[0, 0]]);
    }

    #[test]
    fn test_invalid_ranges_rejected() {
        assert!(price_surface(OptionType::Call, 100.0, (30.0, 10.0), (95.0, 105.0), 0.2, 0.05).is_err());
        assert!(price_surface(OptionType::Call, -1.0, (10.0, 30.0), (95.0, 105.0), 0.2, 0.05).is_err());
    }
}
