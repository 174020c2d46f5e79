#![forbid(unsafe_code)]

//! # `regime_shift`
//!
//! Bayesian single change-point detection for univariate time series.
//!
//! A series is modelled as two consecutive segments, each with its own mean level and a shared
//! Normal noise scale. Independent Metropolis-within-Gibbs chains sample the change index and the
//! segment parameters; the pooled draws are reduced to credible intervals, R-hat and effective
//! sample size, a detected index and date, and the percentage change between levels.
//!
//! The API is domain agnostic: prices, counts, and sensor readings all work as long as the values
//! are positive.

pub mod inference;
pub mod input;
pub mod models;
pub mod preprocess;
pub mod report;
pub mod utils;

pub use inference::{
    CancellationToken, InferenceError, McmcConfig, ProposalStats, RunControl, StopReason,
};
pub use input::{
    InputError, LoaderError, Observation, TimeSeries, load_price_csv, read_price_csv,
};
pub use preprocess::{SeriesDiagnostics, log_returns, series_diagnostics};
pub use report::{
    ReportError, render_summary_table, write_derived_csv, write_series_csv, write_summary_csv,
};

pub use models::changepoint::{
    AcceptanceRates, ChainReport, ChainTrace, ChangePointError, ChangePointModel,
    ChangePointParameters, ChangePointPriors, ChangePointReport, ChangePointSamplerConfig,
    ChangePointSummary, ConvergenceSummary, ConvergenceWarning, MultiChainOptions,
    ParameterDiagnostics, ParameterName, ParameterSummary, ProposalScales, ProposalTuning,
    SegmentSummary, SummaryOptions, diagnose_traces, fit_change_point,
    fit_change_point_with_control, fit_change_point_with_traces,
    multi_chain_effective_sample_size, potential_scale_reduction, sample_chain,
    split_potential_scale_reduction, summarize_change_point,
};
