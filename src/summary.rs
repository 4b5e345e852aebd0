use crate::event::{EventStore, Metric, TypingEvent};
use itertools::Itertools;
use thiserror::Error;

/// Five-number box-plot summary for one (group, metric) pair. Recomputed on
/// demand, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSummary {
    pub group: String,
    pub metric: Metric,
    /// Valid samples that entered the quartile computation.
    pub count: usize,
    /// Non-finite samples dropped before computing anything.
    pub excluded: usize,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub iqr: f64,
    /// Lower whisker: max(actual minimum, q1 - 1.5 * iqr).
    pub min: f64,
    /// Upper whisker: min(actual maximum, q3 + 1.5 * iqr).
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SummaryError {
    #[error("no valid {metric} samples for group {group}")]
    EmptySample { group: String, metric: Metric },
}

/// Quantile by linear interpolation between order statistics: for quantile
/// `p` over `n` sorted values the virtual index is `p * (n - 1)`, interpolated
/// between its floor and ceil neighbours.
///
/// `sorted` must be ascending and non-empty.
pub fn quantile(sorted: &[f64], p: f64) -> f64 {
    debug_assert!(!sorted.is_empty());

    let idx = p * (sorted.len() - 1) as f64;
    let lo = idx.floor() as usize;
    let hi = idx.ceil() as usize;

    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (idx - lo as f64) * (sorted[hi] - sorted[lo])
    }
}

/// Summarize one group's records for the given metric. Pure and
/// deterministic; input order does not matter. Non-finite values are excluded
/// from the sample (and counted); only a sample left empty by that filtering
/// is an error.
pub fn summarize(
    group: &str,
    metric: Metric,
    events: &[TypingEvent],
) -> Result<GroupSummary, SummaryError> {
    let total = events.len();
    let values: Vec<f64> = events
        .iter()
        .map(|ev| metric.extract(ev))
        .filter(|v| v.is_finite())
        .sorted_by(|a, b| a.total_cmp(b))
        .collect();

    if values.is_empty() {
        return Err(SummaryError::EmptySample {
            group: group.to_string(),
            metric,
        });
    }

    let q1 = quantile(&values, 0.25);
    let median = quantile(&values, 0.5);
    let q3 = quantile(&values, 0.75);
    let iqr = q3 - q1;

    // Whiskers follow the 1.5*IQR rule but never extend past the observed
    // data range; values outside them are outliers, still counted above.
    let actual_min = values[0];
    let actual_max = values[values.len() - 1];
    let min = actual_min.max(q1 - 1.5 * iqr);
    let max = actual_max.min(q3 + 1.5 * iqr);

    Ok(GroupSummary {
        group: group.to_string(),
        metric,
        count: values.len(),
        excluded: total - values.len(),
        q1,
        median,
        q3,
        iqr,
        min,
        max,
    })
}

/// Summarize every group in the store for one metric, in store order. A group
/// with no valid samples yields its own error without affecting the others;
/// the caller renders those as "no data".
pub fn summarize_all(
    store: &EventStore,
    metric: Metric,
) -> Vec<Result<GroupSummary, SummaryError>> {
    store
        .groups()
        .iter()
        .map(|g| summarize(&g.name, metric, &g.events))
        .collect()
}
