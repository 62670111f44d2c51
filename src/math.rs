use statrs::distribution::Normal;

use crate::errors::{AnalyzerError, Result};

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;
pub const CALENDAR_DAYS_PER_YEAR: f64 = 365.0;

pub(crate) fn standard_normal() -> Result<Normal> {
    Normal::new(0.0, 1.0)
        .map_err(|_| AnalyzerError::Custom("Failed to create normal distribution".into()))
}

pub fn linspace(start: f64, end: f64, points: usize) -> Vec<f64> {
    if points < 2 {
        return vec![start];
    }
    let step = (end - start) / (points - 1) as f64;
    (0..points).map(|i| start + step * i as f64).collect()
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Quantile of an unsorted sample via the lower-index convention.
pub fn quantile(values: &[f64], q: f64) -> Result<f64> {
    if values.is_empty() {
        return Err(AnalyzerError::InsufficientData(
            "quantile of empty sample".into(),
        ));
    }
    if !(0.0..=1.0).contains(&q) {
        return Err(AnalyzerError::InvalidParameters(
            "quantile must be in [0, 1]".into(),
        ));
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let index = ((q * sorted.len() as f64) as usize).min(sorted.len() - 1);
    Ok(sorted[index])
}

pub fn log_returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .filter(|w| w[0] > 0.0 && w[1] > 0.0)
        .map(|w| (w[1] / w[0]).ln())
        .collect()
}
