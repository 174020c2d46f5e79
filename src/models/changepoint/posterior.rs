//! Posterior storage and summaries for the change-point model.

use chrono::NaiveDate;

use super::diagnostics::diagnose_traces;
use super::types::{
    ChangePointError, ChangePointParameters, ConvergenceSummary, ParameterDiagnostics,
    ParameterName, SummaryOptions,
};
use crate::input::TimeSeries;
use crate::utils::{mean, percentile, round_half_up_index, usize_to_f64};

/// Retained draws of one chain, in iteration order.
#[derive(Debug, Clone, Default)]
pub struct ChainTrace {
    pub chain_index: usize,
    pub seed: u64,
    pub draws: Vec<ChangePointParameters>,
}

impl ChainTrace {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.draws.len()
    }

    /// Scalar trace of one parameter.
    #[must_use]
    pub fn values(&self, name: ParameterName) -> Vec<f64> {
        self.draws.iter().map(|draw| draw.get(name)).collect()
    }
}

/// Scalar posterior summary statistics with convergence diagnostics.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterSummary {
    pub mean: f64,
    /// Population standard deviation of the pooled draws.
    pub std_dev: f64,
    /// Lower bound of the equal-tailed interval, never above `mean`.
    pub credible_low: f64,
    pub median: f64,
    /// Upper bound of the equal-tailed interval, never below `mean`.
    pub credible_high: f64,
    pub r_hat: f64,
    pub split_r_hat: f64,
    pub ess: f64,
}

/// One side of the detected change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentSummary {
    pub start_index: usize,
    pub end_index: usize,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Posterior mean level of the segment.
    pub level: f64,
}

/// Posterior summary for a change-point fit.
#[derive(Debug, Clone)]
pub struct ChangePointSummary {
    pub tau: ParameterSummary,
    pub mu_1: ParameterSummary,
    pub mu_2: ParameterSummary,
    pub sigma: ParameterSummary,
    /// `(mean(mu_2) - mean(mu_1)) / mean(mu_1) * 100`.
    pub percent_change: f64,
    /// Posterior mean of `tau` rounded to the nearest index, ties up.
    pub detected_index: usize,
    pub detected_timestamp: NaiveDate,
    pub credible_mass: f64,
    pub n_observations: usize,
    pub chain_count: usize,
    pub draws_per_chain: usize,
    /// Pooled draws across chains.
    pub draw_count: usize,
    pub convergence: ConvergenceSummary,
}

impl ChangePointSummary {
    #[must_use]
    pub const fn parameter(&self, name: ParameterName) -> &ParameterSummary {
        match name {
            ParameterName::Tau => &self.tau,
            ParameterName::Mu1 => &self.mu_1,
            ParameterName::Mu2 => &self.mu_2,
            ParameterName::Sigma => &self.sigma,
        }
    }

    #[must_use]
    pub const fn is_converged(&self) -> bool {
        self.convergence.is_converged()
    }

    /// Date ranges and mean levels on either side of the detected change.
    ///
    /// The second segment is `None` when the change is detected at the last index. Returns `None`
    /// if `series` is shorter than the series that was fitted.
    #[must_use]
    pub fn segments(&self, series: &TimeSeries) -> Option<(SegmentSummary, Option<SegmentSummary>)> {
        let last = series.len().checked_sub(1)?;
        if self.detected_index > last {
            return None;
        }
        let before = SegmentSummary {
            start_index: 0,
            end_index: self.detected_index,
            start: series.first_timestamp(),
            end: series.timestamp(self.detected_index)?,
            level: self.mu_1.mean,
        };
        let after = if self.detected_index < last {
            Some(SegmentSummary {
                start_index: self.detected_index + 1,
                end_index: last,
                start: series.timestamp(self.detected_index + 1)?,
                end: series.last_timestamp(),
                level: self.mu_2.mean,
            })
        } else {
            None
        };
        Some((before, after))
    }
}

/// Diagnose and summarize equal-schedule chain traces against the fitted series.
///
/// Traces are truncated to their common length before pooling.
///
/// # Errors
///
/// Returns `ChangePointError` if options are invalid, fewer than two chains are supplied, or the
/// traces are too short for diagnostics.
pub fn summarize_change_point(
    series: &TimeSeries,
    traces: &[ChainTrace],
    options: SummaryOptions,
) -> Result<ChangePointSummary, ChangePointError> {
    options.validate()?;
    let convergence = diagnose_traces(traces, options)?;
    let draws_per_chain = convergence.draws_per_chain_used;

    let pooled = traces
        .iter()
        .flat_map(|trace| trace.draws.iter().take(draws_per_chain).copied())
        .collect::<Vec<_>>();
    if pooled.is_empty() {
        return Err(ChangePointError::EmptyPosterior);
    }

    let (low_tail, high_tail) = options.tail_probabilities();
    let summarize = |name: ParameterName| {
        let values = pooled.iter().map(|draw| draw.get(name)).collect::<Vec<_>>();
        summarize_scalar(&values, low_tail, high_tail, *convergence.parameter(name))
    };
    let tau = summarize(ParameterName::Tau);
    let mu_1 = summarize(ParameterName::Mu1);
    let mu_2 = summarize(ParameterName::Mu2);
    let sigma = summarize(ParameterName::Sigma);

    let detected_index =
        round_half_up_index(tau.mean, series.len()).ok_or(ChangePointError::EmptyPosterior)?;
    let detected_timestamp = series
        .timestamp(detected_index)
        .ok_or(ChangePointError::EmptyPosterior)?;

    Ok(ChangePointSummary {
        tau,
        mu_1,
        mu_2,
        sigma,
        percent_change: percent_change(mu_1.mean, mu_2.mean),
        detected_index,
        detected_timestamp,
        credible_mass: options.credible_mass,
        n_observations: series.len(),
        chain_count: traces.len(),
        draws_per_chain,
        draw_count: pooled.len(),
        convergence,
    })
}

/// Relative change from the first to the second level, in percent.
#[must_use]
pub fn percent_change(mu_1: f64, mu_2: f64) -> f64 {
    (mu_2 - mu_1) / mu_1 * 100.0
}

fn summarize_scalar(
    values: &[f64],
    low_tail: f64,
    high_tail: f64,
    diagnostics: ParameterDiagnostics,
) -> ParameterSummary {
    if values.is_empty() {
        return ParameterSummary::default();
    }

    let center = mean(values);
    let variance = values
        .iter()
        .map(|value| (value - center) * (value - center))
        .sum::<f64>()
        / usize_to_f64(values.len());

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    ParameterSummary {
        mean: center,
        std_dev: variance.sqrt(),
        credible_low: percentile(&sorted, low_tail).min(center),
        median: percentile(&sorted, 0.5),
        credible_high: percentile(&sorted, high_tail).max(center),
        r_hat: diagnostics.r_hat,
        split_r_hat: diagnostics.split_r_hat,
        ess: diagnostics.ess,
    }
}
