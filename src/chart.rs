use std::path::Path;

use chrono::NaiveDate;
use plotters::prelude::*;

use crate::data::OptionChain;
use crate::errors::{AnalyzerError, Result};
use crate::pricing::black_scholes;
use crate::strategies::Strategy;
use crate::surface::{smile, SurfaceGrid};
use crate::types::{MarketInputs, OptionContract, OptionType};

const CHART_SIZE: (u32, u32) = (900, 600);

fn chart_err(e: impl std::fmt::Display) -> AnalyzerError {
    AnalyzerError::Chart(e.to_string())
}

fn padded_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for v in values {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    let pad = ((hi - lo) * 0.05).max(1e-6);
    (lo - pad, hi + pad)
}

/// Expiry P&L of a strategy with the zero line and breakeven markers.
pub fn payoff_diagram(strategy: &Strategy, prices: &[f64], path: &Path) -> Result<()> {
    if prices.len() < 2 {
        return Err(AnalyzerError::InsufficientData(
            "payoff diagram needs a price grid".into(),
        ));
    }
    let profile = strategy.payoff_profile(prices);
    let (x_lo, x_hi) = padded_range(profile.iter().map(|p| p.0));
    let (y_lo, y_hi) = padded_range(profile.iter().map(|p| p.1).chain([0.0]));

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(format!("{} payoff at expiry", strategy.name), ("sans-serif", 24))
        .margin(16)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .x_desc("Underlying price at expiry")
        .y_desc("P&L")
        .draw()
        .map_err(chart_err)?;

    chart
        .draw_series(LineSeries::new([(x_lo, 0.0), (x_hi, 0.0)], &BLACK))
        .map_err(chart_err)?;
    chart
        .draw_series(LineSeries::new(profile.iter().copied(), &BLUE))
        .map_err(chart_err)?
        .label("P&L")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));

    chart
        .draw_series(
            strategy
                .breakevens(prices)
                .into_iter()
                .map(|b| Circle::new((b, 0.0), 4, RED.filled())),
        )
        .map_err(chart_err)?;

    chart
        .configure_series_labels()
        .border_style(BLACK)
        .draw()
        .map_err(chart_err)?;
    root.present().map_err(chart_err)?;
    Ok(())
}

/// Market implied volatility by strike for calls and puts of one expiry,
/// plus a marker at the current spot.
pub fn volatility_smile(chain: &OptionChain, spot: f64, width: f64, path: &Path) -> Result<()> {
    let calls = smile(chain, OptionType::Call, spot, width);
    let puts = smile(chain, OptionType::Put, spot, width);
    if calls.is_empty() && puts.is_empty() {
        return Err(AnalyzerError::InsufficientData(
            "no quotes with usable implied volatility".into(),
        ));
    }

    let (x_lo, x_hi) = padded_range(
        calls
            .iter()
            .chain(puts.iter())
            .map(|p| p.0)
            .chain([spot]),
    );
    let (y_lo, y_hi) = padded_range(calls.iter().chain(puts.iter()).map(|p| p.1));

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("{} volatility smile {}", chain.symbol, chain.expiration),
            ("sans-serif", 24),
        )
        .margin(16)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .x_desc("Strike")
        .y_desc("Implied volatility")
        .draw()
        .map_err(chart_err)?;

    if !calls.is_empty() {
        chart
            .draw_series(LineSeries::new(calls.iter().copied(), &BLUE))
            .map_err(chart_err)?
            .label("Calls")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));
    }
    if !puts.is_empty() {
        chart
            .draw_series(LineSeries::new(puts.iter().copied(), &RED))
            .map_err(chart_err)?
            .label("Puts")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));
    }

    chart
        .draw_series(LineSeries::new([(spot, y_lo), (spot, y_hi)], &GREEN))
        .map_err(chart_err)?
        .label("Spot")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], GREEN));

    chart
        .configure_series_labels()
        .border_style(BLACK)
        .draw()
        .map_err(chart_err)?;
    root.present().map_err(chart_err)?;
    Ok(())
}

/// Market mid against the Black-Scholes value for every quote on one side
/// of a chain: (strike, market, theoretical), sorted by strike. Quotes
/// without a usable mid are skipped.
pub fn comparison_points(
    chain: &OptionChain,
    option_type: OptionType,
    market: &MarketInputs,
    as_of: NaiveDate,
) -> Result<Vec<(f64, f64, f64)>> {
    let expiry = chain.years_to_expiry(as_of);
    if expiry <= 0.0 {
        return Err(AnalyzerError::InvalidExpiry);
    }

    let mut points = Vec::new();
    for quote in chain.quotes(option_type) {
        let mid = quote.mid_price();
        if mid <= 0.0 {
            continue;
        }
        let contract = OptionContract::european(option_type, quote.strike, expiry)?;
        let theoretical = black_scholes::price(&contract, market)?.price;
        points.push((quote.strike, mid, theoretical));
    }
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    Ok(points)
}

/// Market versus theoretical price by strike for one side of a chain.
/// Points are (strike, market price, theoretical price).
pub fn price_comparison(
    points: &[(f64, f64, f64)],
    spot: f64,
    title: &str,
    path: &Path,
) -> Result<()> {
    if points.is_empty() {
        return Err(AnalyzerError::InsufficientData(
            "no prices to compare".into(),
        ));
    }

    let (x_lo, x_hi) = padded_range(points.iter().map(|p| p.0).chain([spot]));
    let (y_lo, y_hi) = padded_range(points.iter().flat_map(|p| [p.1, p.2]));

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(16)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .x_desc("Strike")
        .y_desc("Option price")
        .draw()
        .map_err(chart_err)?;

    chart
        .draw_series(LineSeries::new(points.iter().map(|p| (p.0, p.1)), &BLUE))
        .map_err(chart_err)?
        .label("Market")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));
    chart
        .draw_series(LineSeries::new(points.iter().map(|p| (p.0, p.2)), &RED))
        .map_err(chart_err)?
        .label("Theoretical")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));
    chart
        .draw_series(LineSeries::new([(spot, y_lo), (spot, y_hi)], &GREEN))
        .map_err(chart_err)?;

    chart
        .configure_series_labels()
        .border_style(BLACK)
        .draw()
        .map_err(chart_err)?;
    root.present().map_err(chart_err)?;
    Ok(())
}

/// A surface grid rendered as a 2-D heatmap, one filled cell per node.
pub fn surface_heatmap(
    grid: &SurfaceGrid,
    title: &str,
    x_desc: &str,
    y_desc: &str,
    path: &Path,
) -> Result<()> {
    let (nx, ny) = (grid.x.len(), grid.y.len());
    if nx < 2 || ny < 2 {
        return Err(AnalyzerError::InsufficientData(
            "heatmap needs at least a 2x2 grid".into(),
        ));
    }

    let (z_lo, z_hi) = padded_range(grid.z.iter().copied());
    let x_range = (grid.x[0], grid.x[nx - 1]);
    let y_range = (grid.y[0], grid.y[ny - 1]);

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(16)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range.0..x_range.1, y_range.0..y_range.1)
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc(x_desc)
        .y_desc(y_desc)
        .draw()
        .map_err(chart_err)?;

    let span = (z_hi - z_lo).max(1e-12);
    let cells = (0..nx - 1).flat_map(|i| (0..ny - 1).map(move |j| (i, j)));
    chart
        .draw_series(cells.map(|(i, j)| {
            let t = ((grid.z[[i, j]] - z_lo) / span).clamp(0.0, 1.0);
            Rectangle::new(
                [(grid.x[i], grid.y[j]), (grid.x[i + 1], grid.y[j + 1])],
                heat_color(t).filled(),
            )
        }))
        .map_err(chart_err)?;

    root.present().map_err(chart_err)?;
    Ok(())
}

/// Cool-to-warm ramp: blue through a pale midpoint to red.
fn heat_color(t: f64) -> RGBColor {
    const COOL: (f64, f64, f64) = (59.0, 76.0, 192.0);
    const MID: (f64, f64, f64) = (221.0, 221.0, 221.0);
    const WARM: (f64, f64, f64) = (180.0, 4.0, 38.0);

    let (from, to, s) = if t < 0.5 {
        (COOL, MID, t * 2.0)
    } else {
        (MID, WARM, (t - 0.5) * 2.0)
    };
    let lerp = |a: f64, b: f64| (a + (b - a) * s) as u8;
    RGBColor(lerp(from.0, to.0), lerp(from.1, to.1), lerp(from.2, to.2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::OptionQuote;
    use crate::surface::price_surface;

    fn tmp(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(name)
    }

    fn assert_png_written(path: &Path) {
        let meta = std::fs::metadata(path).unwrap();
        assert!(meta.len() > 0);
        std::fs::remove_file(path).ok();
    }

    fn sample_chain() -> OptionChain {
        let quote = |strike: f64, iv: f64| OptionQuote {
            strike,
            last_price: 2.0,
            bid: 1.9,
            ask: 2.1,
            implied_volatility: iv,
            volume: None,
            open_interest: None,
        };
        OptionChain {
            symbol: "AAPL".into(),
            expiration: "2024-06-21".parse().unwrap(),
            calls: vec![quote(90.0, 0.26), quote(100.0, 0.21), quote(110.0, 0.24)],
            puts: vec![quote(90.0, 0.28), quote(100.0, 0.22), quote(110.0, 0.25)],
        }
    }

    #[test]
    fn test_payoff_diagram_written() {
        let strategy = Strategy::straddle(100.0, 0.25, 4.0, 3.5).unwrap();
        let grid = Strategy::default_grid(100.0);
        let path = tmp("test_payoff_diagram.png");

        payoff_diagram(&strategy, &grid, &path).unwrap();
        assert_png_written(&path);
    }

    #[test]
    fn test_volatility_smile_written() {
        let path = tmp("test_vol_smile.png");
        volatility_smile(&sample_chain(), 100.0, 0.2, &path).unwrap();
        assert_png_written(&path);
    }

    #[test]
    fn test_price_comparison_written() {
        let market = MarketInputs::new(100.0, 0.05, 0.0, 0.2).unwrap();
        let as_of: NaiveDate = "2024-05-01".parse().unwrap();

        let points =
            comparison_points(&sample_chain(), OptionType::Call, &market, as_of).unwrap();
        assert_eq!(points.len(), 3);
        // Quote mids come from the bid/ask spread.
        assert!(points.iter().all(|p| (p.1 - 2.0).abs() < 1e-12));
        assert!(points.windows(2).all(|w| w[0].0 < w[1].0));

        let path = tmp("test_price_comparison.png");
        price_comparison(&points, 100.0, "AAPL calls", &path).unwrap();
        assert_png_written(&path);
    }

    #[test]
    fn test_comparison_points_expired_chain_rejected() {
        let market = MarketInputs::new(100.0, 0.05, 0.0, 0.2).unwrap();
        let late: NaiveDate = "2024-12-31".parse().unwrap();
        assert!(comparison_points(&sample_chain(), OptionType::Call, &market, late).is_err());
    }

    #[test]
    fn test_surface_heatmap_written() {
        let grid = price_surface(
            OptionType::Call,
            100.0,
            (10.0, 120.0),
            (95.0, 105.0),
            0.2,
            0.05,
        )
        .unwrap();
        let path = tmp("test_surface_heatmap.png");
        surface_heatmap(&grid, "Call price", "Spot", "Days to expiry", &path).unwrap();
        assert_png_written(&path);
    }

    #[test]
    fn test_empty_inputs_rejected() {
        let path = tmp("test_never_written.png");
        assert!(price_comparison(&[], 100.0, "empty", &path).is_err());

        let strategy = Strategy::straddle(100.0, 0.25, 4.0, 3.5).unwrap();
        assert!(payoff_diagram(&strategy, &[100.0], &path).is_err());
    }
}
