//! Bayesian single change-point model.
//!
//! A series is split at an unknown index `tau` into two segments with their own mean level and a
//! shared Normal noise scale. Priors are fixed from the data: `tau` is uniform over the index
//! range, both levels are exponential with rate `1 / mean`, and the noise is half-normal with the
//! data's standard deviation as scale.
//!
//! [`fit_change_point`] runs independent Metropolis-within-Gibbs chains, diagnoses them with
//! R-hat and effective sample size, and reduces the pooled draws to a [`ChangePointSummary`].

pub mod diagnostics;
pub mod likelihood;
pub mod posterior;
pub mod priors;
pub mod sampler;
pub mod types;

pub use diagnostics::{
    diagnose_traces, multi_chain_effective_sample_size, potential_scale_reduction,
    split_potential_scale_reduction,
};
pub use likelihood::{ChangePointModel, log_normal_density, observation_log_likelihood};
pub use posterior::{
    ChainTrace, ChangePointSummary, ParameterSummary, SegmentSummary, percent_change,
    summarize_change_point,
};
pub use priors::ChangePointPriors;
pub use sampler::{
    fit_change_point, fit_change_point_with_control, fit_change_point_with_traces, sample_chain,
};
pub use types::{
    AcceptanceRates, ChainReport, ChangePointError, ChangePointParameters, ChangePointReport,
    ChangePointSamplerConfig, ConvergenceSummary, ConvergenceWarning, MultiChainOptions,
    ParameterDiagnostics, ParameterName, ProposalScales, ProposalTuning, SummaryOptions,
};
