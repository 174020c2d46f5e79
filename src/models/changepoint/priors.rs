//! Data-derived priors and log-density helpers for the change-point model.

use statrs::consts::LN_SQRT_2PI;

use super::types::ChangePointParameters;
use crate::input::TimeSeries;
use crate::utils::usize_to_f64;

/// Prior set fixed from the observed series.
#[derive(Debug, Clone, Copy)]
pub struct ChangePointPriors {
    /// Number of observations; `tau` is uniform over `0..n_observations`.
    pub n_observations: usize,
    /// Exponential rate for both segment levels, `1 / mean(values)`.
    pub level_rate: f64,
    /// Half-normal scale for the noise, the population standard deviation of the values.
    pub noise_scale: f64,
}

impl ChangePointPriors {
    #[must_use]
    pub fn from_series(series: &TimeSeries) -> Self {
        Self {
            n_observations: series.len(),
            level_rate: series.mean().recip(),
            noise_scale: series.std_dev(),
        }
    }

    /// Whether all prior hyperparameters are numerically valid.
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.n_observations > 0
            && self.level_rate > 0.0
            && self.level_rate.is_finite()
            && self.noise_scale > 0.0
            && self.noise_scale.is_finite()
    }

    /// Joint log-prior; `-inf` as soon as any component is impossible.
    #[must_use]
    pub fn log_prior(self, params: &ChangePointParameters) -> f64 {
        let upper = i64::try_from(self.n_observations).unwrap_or(i64::MAX) - 1;
        let components = [
            log_discrete_uniform_density(params.tau, 0, upper),
            log_exponential_density(params.mu_1, self.level_rate),
            log_exponential_density(params.mu_2, self.level_rate),
            log_half_normal_density(params.sigma, self.noise_scale),
        ];

        let mut total = 0.0;
        for component in components {
            if !component.is_finite() {
                return f64::NEG_INFINITY;
            }
            total += component;
        }
        total
    }
}

/// Log-mass for `DiscreteUniform(lower, upper)`, both bounds inclusive.
#[must_use]
pub fn log_discrete_uniform_density(value: i64, lower: i64, upper: i64) -> f64 {
    if lower > upper || !(lower..=upper).contains(&value) {
        return f64::NEG_INFINITY;
    }
    let support = upper.abs_diff(lower).saturating_add(1);
    let support = usize::try_from(support).unwrap_or(usize::MAX);
    -usize_to_f64(support).ln()
}

/// Log-density for `Exponential(rate)` on `value > 0`.
#[must_use]
pub fn log_exponential_density(value: f64, rate: f64) -> f64 {
    if !(value > 0.0 && value.is_finite() && rate > 0.0 && rate.is_finite()) {
        return f64::NEG_INFINITY;
    }
    rate.ln() - rate * value
}

/// Log-density for `HalfNormal(scale)` on `value > 0`.
#[must_use]
pub fn log_half_normal_density(value: f64, scale: f64) -> f64 {
    if !(value > 0.0 && value.is_finite() && scale > 0.0 && scale.is_finite()) {
        return f64::NEG_INFINITY;
    }
    let z = value / scale;
    std::f64::consts::LN_2 - LN_SQRT_2PI - scale.ln() - 0.5 * z * z
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use statrs::distribution::{Continuous, Exp};

    use super::*;

    #[test]
    fn discrete_uniform_is_flat_inside_range() {
        assert_relative_eq!(log_discrete_uniform_density(0, 0, 9), -(10.0f64).ln());
        assert_relative_eq!(log_discrete_uniform_density(9, 0, 9), -(10.0f64).ln());
        assert_eq!(log_discrete_uniform_density(10, 0, 9), f64::NEG_INFINITY);
        assert_eq!(log_discrete_uniform_density(-1, 0, 9), f64::NEG_INFINITY);
    }

    #[test]
    fn exponential_matches_statrs() {
        let reference = Exp::new(0.02).expect("valid rate");
        assert_relative_eq!(
            log_exponential_density(55.0, 0.02),
            reference.ln_pdf(55.0),
            epsilon = 1.0e-12
        );
        assert_eq!(log_exponential_density(0.0, 0.02), f64::NEG_INFINITY);
        assert_eq!(log_exponential_density(-3.0, 0.02), f64::NEG_INFINITY);
    }

    #[test]
    fn half_normal_is_twice_the_normal_density() {
        let scale: f64 = 2.5;
        let x: f64 = 1.3;
        let normal = -LN_SQRT_2PI - scale.ln() - 0.5 * (x / scale).powi(2);
        assert_relative_eq!(
            log_half_normal_density(x, scale),
            normal + std::f64::consts::LN_2,
            epsilon = 1.0e-12
        );
        assert_eq!(log_half_normal_density(0.0, scale), f64::NEG_INFINITY);
        assert_eq!(log_half_normal_density(f64::NAN, scale), f64::NEG_INFINITY);
    }

    #[test]
    fn joint_prior_rejects_any_invalid_component() {
        let priors = ChangePointPriors {
            n_observations: 10,
            level_rate: 0.1,
            noise_scale: 1.0,
        };
        assert!(priors.is_valid());
        assert!(
            !ChangePointPriors {
                noise_scale: 0.0,
                ..priors
            }
            .is_valid()
        );
        assert!(priors.log_prior(&ChangePointParameters::new(4, 5.0, 8.0, 1.0)).is_finite());
        assert_eq!(
            priors.log_prior(&ChangePointParameters::new(10, 5.0, 8.0, 1.0)),
            f64::NEG_INFINITY
        );
        assert_eq!(
            priors.log_prior(&ChangePointParameters::new(4, 5.0, -8.0, 1.0)),
            f64::NEG_INFINITY
        );
    }
}
