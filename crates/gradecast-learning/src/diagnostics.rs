//! Whole-table prediction diagnostics: residuals, calibration, score-band
//! agreement and the largest errors.

use polars::prelude::{ChunkAgg, ChunkQuantile, Float64Chunked, NewChunkedArray, QuantileMethod};
use serde::{Deserialize, Serialize};

/// Score bands as `[low, high)`; the last band includes 100.
pub const BAND_LABELS: [&str; 5] = ["<60", "60-70", "70-80", "80-90", "90-100"];
const BAND_EDGES: [(f64, f64); 5] = [
    (0.0, 60.0),
    (60.0, 70.0),
    (70.0, 80.0),
    (80.0, 90.0),
    (90.0, 100.0),
];

/// Number of rows listed in [`Diagnostics::top_abs_errors`].
pub const TOP_ERRORS: usize = 10;

/// Label used for rows whose group cell is null.
pub const MISSING_GROUP: &str = "(missing)";

/// One predicted row of a preview listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewRow {
    /// Row index in the raw table.
    pub row: usize,
    /// Value of the configured id column, when there is one.
    pub id: Option<String>,
    pub predicted: f64,
    /// `None` for rows whose target was missing in the raw table.
    pub actual: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBin {
    /// Midpoint of the bin edges; `None` for an empty bin.
    pub center: Option<f64>,
    pub avg_predicted: Option<f64>,
    pub avg_actual: Option<f64>,
    pub count: usize,
}

/// Counts of (predicted band, actual band) pairs; `counts[p][a]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandHeatmap {
    pub labels: Vec<String>,
    pub counts: Vec<Vec<usize>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupError {
    pub name: String,
    pub mae: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbsError {
    pub row: usize,
    pub id: Option<String>,
    pub predicted: f64,
    pub actual: f64,
    pub abs_error: f64,
}

/// Diagnostics over every preprocessed row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// `predicted - actual`, per row.
    pub residuals: Vec<f64>,
    pub calibration: Vec<CalibrationBin>,
    pub band_heatmap: BandHeatmap,
    /// Present only when a group column was available.
    pub error_by_group: Option<Vec<GroupError>>,
    pub top_abs_errors: Vec<AbsError>,
}

impl Diagnostics {
    /// Compute every diagnostic.
    ///
    /// `rows` maps each position to its raw-table row index; `ids` and
    /// `groups`, when given, are aligned with `actual`.
    pub fn compute(
        actual: &[f64],
        predicted: &[f64],
        rows: &[usize],
        ids: Option<&[Option<String>]>,
        groups: Option<&[Option<String>]>,
    ) -> Self {
        Self {
            residuals: residuals(actual, predicted),
            calibration: calibration(actual, predicted),
            band_heatmap: band_heatmap(actual, predicted),
            error_by_group: groups.map(|g| error_by_group(actual, predicted, g)),
            top_abs_errors: top_abs_errors(actual, predicted, rows, ids, TOP_ERRORS),
        }
    }
}

pub fn residuals(actual: &[f64], predicted: &[f64]) -> Vec<f64> {
    predicted.iter().zip(actual).map(|(p, a)| p - a).collect()
}

/// Bin predictions at their deciles and compare average prediction with
/// average actual per bin.
///
/// Edges are the 11 quantiles of the predictions with duplicates removed;
/// when fewer than two distinct edges remain they become `[min - 1, max + 1]`.
/// A prediction lands in bin `i` when it is at or above `i` of the interior
/// edges. Trailing empty bins are not reported.
pub fn calibration(actual: &[f64], predicted: &[f64]) -> Vec<CalibrationBin> {
    if predicted.is_empty() {
        return Vec::new();
    }

    let predictions = Float64Chunked::from_slice("predicted".into(), predicted);
    let mut edges: Vec<f64> = (0..=10)
        .filter_map(|k| {
            predictions
                .quantile(k as f64 / 10.0, QuantileMethod::Linear)
                .ok()
                .flatten()
        })
        .collect();
    edges.dedup();
    if edges.len() < 2 {
        let (Some(min), Some(max)) = (predictions.min(), predictions.max()) else {
            return Vec::new();
        };
        edges = vec![min - 1.0, max + 1.0];
    }
    let interior = &edges[1..edges.len() - 1];

    let bin_of: Vec<usize> = predicted
        .iter()
        .map(|p| interior.iter().filter(|edge| **edge <= *p).count())
        .collect();
    let n_bins = bin_of.iter().copied().max().map_or(0, |b| b + 1);

    (0..n_bins)
        .map(|bin| {
            let members: Vec<usize> = (0..predicted.len()).filter(|i| bin_of[*i] == bin).collect();
            if members.is_empty() {
                return CalibrationBin {
                    center: None,
                    avg_predicted: None,
                    avg_actual: None,
                    count: 0,
                };
            }
            let count = members.len();
            let lo = edges[bin];
            let hi = edges.get(bin + 1).copied().unwrap_or(edges[edges.len() - 1]);
            CalibrationBin {
                center: Some((lo + hi) / 2.0),
                avg_predicted: Some(members.iter().map(|i| predicted[*i]).sum::<f64>() / count as f64),
                avg_actual: Some(members.iter().map(|i| actual[*i]).sum::<f64>() / count as f64),
                count,
            }
        })
        .collect()
}

fn band_of(value: f64) -> Option<usize> {
    BAND_EDGES.iter().position(|(lo, hi)| {
        value >= *lo && (value < *hi || (*hi == 100.0 && value == 100.0))
    })
}

/// 5×5 agreement counts between predicted and actual score bands. Values
/// outside `[0, 100]` are not counted.
pub fn band_heatmap(actual: &[f64], predicted: &[f64]) -> BandHeatmap {
    let mut counts = vec![vec![0usize; BAND_LABELS.len()]; BAND_LABELS.len()];
    for (p, a) in predicted.iter().zip(actual) {
        if let (Some(pb), Some(ab)) = (band_of(*p), band_of(*a)) {
            counts[pb][ab] += 1;
        }
    }
    BandHeatmap {
        labels: BAND_LABELS.iter().map(|l| l.to_string()).collect(),
        counts,
    }
}

/// Mean absolute error per group, in first-seen group order.
pub fn error_by_group(
    actual: &[f64],
    predicted: &[f64],
    groups: &[Option<String>],
) -> Vec<GroupError> {
    let mut order: Vec<String> = Vec::new();
    let mut totals: Vec<(f64, usize)> = Vec::new();

    for ((p, a), group) in predicted.iter().zip(actual).zip(groups) {
        let name = group.as_deref().unwrap_or(MISSING_GROUP);
        let idx = match order.iter().position(|g| g == name) {
            Some(idx) => idx,
            None => {
                order.push(name.to_string());
                totals.push((0.0, 0));
                order.len() - 1
            }
        };
        totals[idx].0 += (p - a).abs();
        totals[idx].1 += 1;
    }

    order
        .into_iter()
        .zip(totals)
        .map(|(name, (sum, count))| GroupError {
            name,
            mae: sum / count as f64,
            count,
        })
        .collect()
}

/// The `limit` largest absolute errors, descending; ties keep row order.
pub fn top_abs_errors(
    actual: &[f64],
    predicted: &[f64],
    rows: &[usize],
    ids: Option<&[Option<String>]>,
    limit: usize,
) -> Vec<AbsError> {
    let mut errors: Vec<AbsError> = predicted
        .iter()
        .zip(actual)
        .enumerate()
        .map(|(i, (p, a))| AbsError {
            row: rows.get(i).copied().unwrap_or(i),
            id: ids.and_then(|ids| ids.get(i).cloned().flatten()),
            predicted: *p,
            actual: *a,
            abs_error: (p - a).abs(),
        })
        .collect();
    errors.sort_by(|a, b| b.abs_error.total_cmp(&a.abs_error));
    errors.truncate(limit);
    errors
}
