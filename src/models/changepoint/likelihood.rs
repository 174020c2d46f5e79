//! Two-segment Normal likelihood and the read-only posterior model shared by all chains.

use statrs::consts::LN_SQRT_2PI;

use super::priors::ChangePointPriors;
use super::types::{ChangePointError, ChangePointParameters};
use crate::input::TimeSeries;
use crate::utils::usize_to_f64;

/// Log-density of `Normal(mean, sd)`.
#[must_use]
pub fn log_normal_density(value: f64, mean: f64, sd: f64) -> f64 {
    if !(sd > 0.0 && sd.is_finite()) {
        return f64::NEG_INFINITY;
    }
    let z = (value - mean) / sd;
    -(0.5 * z * z + LN_SQRT_2PI + sd.ln())
}

/// Log-likelihood of observation `index` under the switch `index <= tau`.
#[must_use]
pub fn observation_log_likelihood(values: &[f64], index: usize, params: &ChangePointParameters) -> f64 {
    values.get(index).map_or(f64::NEG_INFINITY, |value| {
        log_normal_density(*value, params.level_at(index), params.sigma)
    })
}

/// Posterior model for a single mean shift with shared noise.
///
/// Stores centered prefix sums so that the likelihood of any `tau` is evaluated in constant time.
#[derive(Debug, Clone)]
pub struct ChangePointModel {
    priors: ChangePointPriors,
    center: f64,
    std_dev: f64,
    /// `prefix_sum[k]` is the sum of the first `k` centered values.
    prefix_sum: Vec<f64>,
    /// `prefix_sum_sq[k]` is the sum of squares of the first `k` centered values.
    prefix_sum_sq: Vec<f64>,
}

impl ChangePointModel {
    /// Fix the priors from `series` and precompute its prefix sums.
    ///
    /// # Errors
    ///
    /// Returns `ChangePointError::InvalidPriors` if the series moments overflow and leave the level
    /// rate or noise scale outside `(0, inf)`.
    pub fn new(series: &TimeSeries) -> Result<Self, ChangePointError> {
        let priors = ChangePointPriors::from_series(series);
        if !priors.is_valid() {
            return Err(ChangePointError::InvalidPriors);
        }

        let center = series.mean();
        let mut prefix_sum = Vec::with_capacity(series.len() + 1);
        let mut prefix_sum_sq = Vec::with_capacity(series.len() + 1);
        prefix_sum.push(0.0);
        prefix_sum_sq.push(0.0);

        let (mut running, mut running_sq) = (0.0, 0.0);
        for value in series.values() {
            let centered = value - center;
            running += centered;
            running_sq = centered.mul_add(centered, running_sq);
            prefix_sum.push(running);
            prefix_sum_sq.push(running_sq);
        }

        Ok(Self {
            priors,
            center,
            std_dev: series.std_dev(),
            prefix_sum,
            prefix_sum_sq,
        })
    }

    #[must_use]
    pub const fn n_observations(&self) -> usize {
        self.priors.n_observations
    }

    #[must_use]
    pub const fn priors(&self) -> ChangePointPriors {
        self.priors
    }

    /// Mean of the observed values.
    #[must_use]
    pub const fn data_mean(&self) -> f64 {
        self.center
    }

    /// Population standard deviation of the observed values.
    #[must_use]
    pub const fn data_std_dev(&self) -> f64 {
        self.std_dev
    }

    /// Whether `tau` indexes an observation.
    #[must_use]
    pub fn tau_in_range(&self, tau: i64) -> bool {
        usize::try_from(tau).is_ok_and(|tau| tau < self.n_observations())
    }

    /// Empirical means of both segments when the first segment ends at `tau`.
    ///
    /// The second mean is `None` when `tau` is the last index.
    #[must_use]
    pub fn segment_means(&self, tau: usize) -> Option<(f64, Option<f64>)> {
        let n = self.n_observations();
        if tau >= n {
            return None;
        }
        let first_len = tau + 1;
        let first_sum = self.prefix_sum[first_len];
        let first = first_sum / usize_to_f64(first_len) + self.center;
        let second = (first_len < n).then(|| {
            (self.prefix_sum[n] - first_sum) / usize_to_f64(n - first_len) + self.center
        });
        Some((first, second))
    }

    /// Total log-likelihood; `-inf` for `tau` outside `[0, N-1]` or invalid `sigma`.
    #[must_use]
    pub fn log_likelihood(&self, params: &ChangePointParameters) -> f64 {
        if !self.tau_in_range(params.tau)
            || !(params.sigma > 0.0 && params.sigma.is_finite())
            || !params.mu_1.is_finite()
            || !params.mu_2.is_finite()
        {
            return f64::NEG_INFINITY;
        }

        let n = self.n_observations();
        let first_len = usize::try_from(params.tau).map_or(0, |tau| tau + 1);

        let first_sse = self.segment_sum_of_squares(0, first_len, params.mu_1);
        let second_sse = self.segment_sum_of_squares(first_len, n, params.mu_2);
        let sigma_sq = params.sigma * params.sigma;

        let normaliser = usize_to_f64(n) * (LN_SQRT_2PI + params.sigma.ln());
        -normaliser - (first_sse + second_sse) / (2.0 * sigma_sq)
    }

    /// Sum of per-observation log-densities; equal to [`Self::log_likelihood`] up to rounding.
    #[must_use]
    pub fn log_likelihood_by_observation(
        &self,
        values: &[f64],
        params: &ChangePointParameters,
    ) -> f64 {
        if !self.tau_in_range(params.tau) {
            return f64::NEG_INFINITY;
        }
        (0..values.len())
            .map(|index| observation_log_likelihood(values, index, params))
            .sum()
    }

    /// Joint log-posterior. Never panics; invalid vectors yield exactly `-inf`.
    #[must_use]
    pub fn log_posterior(&self, params: &ChangePointParameters) -> f64 {
        let log_prior = self.priors.log_prior(params);
        if !log_prior.is_finite() {
            return f64::NEG_INFINITY;
        }
        let total = log_prior + self.log_likelihood(params);
        if total.is_nan() {
            f64::NEG_INFINITY
        } else {
            total
        }
    }

    /// `sum_{i in [start, end)} (x_i - level)^2` from centered prefix sums.
    fn segment_sum_of_squares(&self, start: usize, end: usize, level: f64) -> f64 {
        if end <= start {
            return 0.0;
        }
        let count = usize_to_f64(end - start);
        let sum = self.prefix_sum[end] - self.prefix_sum[start];
        let sum_sq = self.prefix_sum_sq[end] - self.prefix_sum_sq[start];
        let offset = level - self.center;
        // sum (c_i - offset)^2 = sum c_i^2 - 2 offset sum c_i + n offset^2
        (count * offset).mul_add(offset, (-2.0 * offset).mul_add(sum, sum_sq)).max(0.0)
    }
}
