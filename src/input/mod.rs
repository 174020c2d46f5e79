//! # Model inputs
//!
//! Defines the validated, time-ordered observation sequence consumed by the
//! change-point model, and a delimited-file loader in [`loader`].
//!
//! # Examples
//!
//! ```
//! use chrono::NaiveDate;
//! use regime_shift::{Observation, TimeSeries};
//!
//! let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let observations = (0..4u32)
//!     .map(|day| Observation::new(start + chrono::Days::new(day.into()), 10.0 + f64::from(day)))
//!     .collect();
//! let series = TimeSeries::new(observations).unwrap();
//!
//! assert_eq!(series.len(), 4);
//! ```
//!
//! ```
//! use chrono::NaiveDate;
//! use regime_shift::{InputError, Observation, TimeSeries};
//!
//! let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let result = TimeSeries::new(vec![Observation::new(day, 1.0), Observation::new(day, -2.0)]);
//!
//! assert!(matches!(result, Err(InputError::NonPositiveValue { index: 1, .. })));
//! ```

use chrono::NaiveDate;
use statrs::statistics::Statistics;
use thiserror::Error;

pub mod loader;

pub use loader::{LoaderError, load_price_csv, read_price_csv};

/// Minimum number of observations for a non-empty change-point range.
pub const MIN_OBSERVATIONS: usize = 2;

/// Errors returned when validating an observation sequence.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InputError {
    #[error("at least {minimum} observations are required; found {found}")]
    TooFewObservations { minimum: usize, found: usize },
    #[error("observation {index} has a non-finite value")]
    NonFiniteValue { index: usize },
    #[error("observation {index} has non-positive value {value}; the level priors require values > 0")]
    NonPositiveValue { index: usize, value: f64 },
    #[error("all observations share the same value; the noise prior needs a positive spread")]
    ZeroVariance,
}

/// A single timestamped observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub timestamp: NaiveDate,
    pub value: f64,
}

impl Observation {
    #[must_use]
    pub const fn new(timestamp: NaiveDate, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Validated observation sequence. Index order is time order.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    observations: Vec<Observation>,
    values: Vec<f64>,
}

impl TimeSeries {
    /// Validate and wrap an ordered observation sequence.
    ///
    /// # Errors
    ///
    /// Returns `InputError` if fewer than two observations are supplied, any value is
    /// non-finite or non-positive, or all values are identical.
    pub fn new(observations: Vec<Observation>) -> Result<Self, InputError> {
        if observations.len() < MIN_OBSERVATIONS {
            return Err(InputError::TooFewObservations {
                minimum: MIN_OBSERVATIONS,
                found: observations.len(),
            });
        }
        for (index, observation) in observations.iter().enumerate() {
            if !observation.value.is_finite() {
                return Err(InputError::NonFiniteValue { index });
            }
            if observation.value <= 0.0 {
                return Err(InputError::NonPositiveValue {
                    index,
                    value: observation.value,
                });
            }
        }

        let values: Vec<f64> = observations.iter().map(|obs| obs.value).collect();
        let first = values[0];
        if values.iter().all(|value| value.total_cmp(&first).is_eq()) {
            return Err(InputError::ZeroVariance);
        }

        Ok(Self {
            observations,
            values,
        })
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.observations.len()
    }

    /// Always `false`: a validated series holds at least two observations.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    #[must_use]
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Observation> {
        self.observations.get(index)
    }

    /// Timestamp at `index`, if in range.
    #[must_use]
    pub fn timestamp(&self, index: usize) -> Option<NaiveDate> {
        self.observations.get(index).map(|obs| obs.timestamp)
    }

    #[must_use]
    pub fn first_timestamp(&self) -> NaiveDate {
        self.observations[0].timestamp
    }

    #[must_use]
    pub fn last_timestamp(&self) -> NaiveDate {
        self.observations[self.observations.len() - 1].timestamp
    }

    /// Sample mean of the values.
    #[must_use]
    pub fn mean(&self) -> f64 {
        self.values.iter().mean()
    }

    /// Population (`n`) standard deviation of the values.
    #[must_use]
    pub fn std_dev(&self) -> f64 {
        self.values.iter().population_std_dev()
    }

    /// Log returns `ln(v[i]) - ln(v[i-1])`; the first entry is `None`.
    #[must_use]
    pub fn log_returns(&self) -> Vec<Option<f64>> {
        crate::preprocess::log_returns(&self.values)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn day(offset: u64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, 1).expect("valid date") + chrono::Days::new(offset)
    }

    fn series(values: &[f64]) -> Result<TimeSeries, InputError> {
        TimeSeries::new(
            values
                .iter()
                .enumerate()
                .map(|(i, value)| {
                    Observation::new(day(u64::try_from(i).unwrap_or(u64::MAX)), *value)
                })
                .collect(),
        )
    }

    #[test]
    fn rejects_single_observation() {
        let err = series(&[1.0]).expect_err("one observation should fail");
        assert_eq!(
            err,
            InputError::TooFewObservations {
                minimum: 2,
                found: 1
            }
        );
    }

    #[test]
    fn rejects_empty_sequence() {
        assert!(matches!(
            TimeSeries::new(Vec::new()),
            Err(InputError::TooFewObservations { found: 0, .. })
        ));
    }

    #[test]
    fn rejects_zero_value() {
        let err = series(&[1.0, 0.0, 2.0]).expect_err("zero should fail");
        assert_eq!(err, InputError::NonPositiveValue { index: 1, value: 0.0 });
    }

    #[test]
    fn rejects_non_finite_value() {
        let err = series(&[1.0, f64::NAN]).expect_err("nan should fail");
        assert_eq!(err, InputError::NonFiniteValue { index: 1 });
    }

    #[test]
    fn rejects_constant_series() {
        let err = series(&[3.0, 3.0, 3.0]).expect_err("constant should fail");
        assert_eq!(err, InputError::ZeroVariance);
    }

    #[test]
    fn moments_use_population_spread() {
        let s = series(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).expect("valid series");
        assert_relative_eq!(s.mean(), 5.0);
        assert_relative_eq!(s.std_dev(), 2.0);
    }

    #[test]
    fn duplicate_timestamps_are_allowed() {
        let observations = vec![Observation::new(day(0), 1.0), Observation::new(day(0), 2.0)];
        let s = TimeSeries::new(observations).expect("duplicates are allowed");
        assert_eq!(s.first_timestamp(), s.last_timestamp());
    }

    #[test]
    fn timestamp_lookup_is_bounds_checked() {
        let s = series(&[1.0, 2.0]).expect("valid series");
        assert_eq!(s.timestamp(1), Some(day(1)));
        assert_eq!(s.timestamp(2), None);
    }
}
