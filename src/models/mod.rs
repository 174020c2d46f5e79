//! # Models
//!
//! Bayesian models for detecting structural breaks in univariate series.

pub mod changepoint;
