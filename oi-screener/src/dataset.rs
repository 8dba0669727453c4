//! Final per-symbol join and cross-sectional summary.

use crate::model::{AnalysisRecord, ChangeSignal, RatioRecord, Symbol, TickerRecord};
use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Minimum number of samples before a correlation is reported.
pub const MIN_CORRELATION_SAMPLES: usize = 3;

/// Inner join of ratios, change signals and ticker fields on symbol.
///
/// A symbol missing from any input produces no [`AnalysisRecord`].
pub fn build_dataset(
    ratios: &[RatioRecord],
    changes: &[ChangeSignal],
    tickers: &[TickerRecord],
) -> Vec<AnalysisRecord> {
    let changes = changes
        .iter()
        .map(|signal| (&signal.symbol, signal.change))
        .collect::<FnvHashMap<&Symbol, f64>>();
    let tickers = tickers
        .iter()
        .map(|ticker| (&ticker.symbol, ticker))
        .collect::<FnvHashMap<&Symbol, &TickerRecord>>();

    ratios
        .iter()
        .filter_map(|ratio| {
            let change = *changes.get(&ratio.symbol)?;
            let ticker = tickers.get(&ratio.symbol)?;
            Some(AnalysisRecord {
                symbol: ratio.symbol.clone(),
                ratio: ratio.ratio,
                change,
                price_change_percent: ticker.price_change_percent,
                quote_volume: ticker.quote_volume,
            })
        })
        .collect()
}

/// Pearson correlation coefficient
/// Returns value from -1.0 to +1.0
pub fn calc_correlation(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < MIN_CORRELATION_SAMPLES {
        return None;
    }

    let n = xs.len() as f64;
    let mean_x: f64 = xs.iter().sum::<f64>() / n;
    let mean_y: f64 = ys.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;

    for (x, y) in xs.iter().zip(ys) {
        let diff_x = x - mean_x;
        let diff_y = y - mean_y;
        cov += diff_x * diff_y;
        var_x += diff_x * diff_x;
        var_y += diff_y * diff_y;
    }

    if var_x < 1e-18 || var_y < 1e-18 {
        return None;
    }

    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

/// Output of one screening run, handed to downstream plotting.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct ScreenReport {
    pub generated_at: DateTime<Utc>,
    pub records: Vec<AnalysisRecord>,
    /// Correlation of ratio against the hourly change signal.
    pub ratio_change_correlation: Option<f64>,
    /// Correlation of ratio against the 24 hour price change percent.
    pub ratio_price_change_correlation: Option<f64>,
}

impl ScreenReport {
    pub fn new(generated_at: DateTime<Utc>, records: Vec<AnalysisRecord>) -> Self {
        let ratios = records.iter().map(|record| record.ratio).collect::<Vec<_>>();
        let changes = records.iter().map(|record| record.change).collect::<Vec<_>>();
        let price_changes = records
            .iter()
            .map(|record| record.price_change_percent)
            .collect::<Vec<_>>();

        Self {
            generated_at,
            ratio_change_correlation: calc_correlation(&ratios, &changes),
            ratio_price_change_correlation: calc_correlation(&ratios, &price_changes),
            records,
        }
    }

    /// Records ordered by ratio, most crowded first.
    pub fn ranked_by_ratio(&self) -> Vec<&AnalysisRecord> {
        self.records
            .iter()
            .sorted_by(|a, b| b.ratio.total_cmp(&a.ratio))
            .collect()
    }
}
