//! Core public types for the change-point module.

use std::fmt;

use thiserror::Error;

use super::posterior::ChangePointSummary;
use crate::inference::{InferenceError, McmcConfig, StopReason};
use crate::input::InputError;

/// Errors returned by change-point configuration, validation, and fitting.
#[derive(Debug, Error)]
pub enum ChangePointError {
    #[error(transparent)]
    InvalidInput(#[from] InputError),
    #[error(transparent)]
    InvalidSchedule(#[from] InferenceError),
    #[error("priors derived from the series are not finite and positive")]
    InvalidPriors,
    #[error("invalid proposal tuning configuration")]
    InvalidProposalTuning,
    #[error("credible mass must lie strictly between 0 and 1; found {0}")]
    InvalidCredibleMass(f64),
    #[error("convergence thresholds must be finite, with max R-hat >= 1 and min ESS >= 0")]
    InvalidConvergenceThresholds,
    #[error("multi-chain workflows require at least {min} chains; found {found}")]
    InvalidChainCount { min: usize, found: usize },
    #[error("multi-chain seed stride must be positive")]
    InvalidSeedStride,
    #[error("each chain must retain at least {minimum} draws; minimum found {found}")]
    InsufficientChainDraws { minimum: usize, found: usize },
    #[error("trace lengths differ across chains")]
    InconsistentTraceLengths,
    #[error("posterior draws are required")]
    EmptyPosterior,
    #[error("sampling was cancelled before all chains finished")]
    Cancelled,
    #[error("iteration budget of {budget} per chain exhausted before sampling finished")]
    IterationBudgetExhausted { budget: usize },
    #[error("sampling thread for chain {chain} panicked")]
    ChainPanicked { chain: usize },
}

impl From<StopReason> for ChangePointError {
    fn from(reason: StopReason) -> Self {
        match reason {
            StopReason::Cancelled => Self::Cancelled,
            StopReason::BudgetExhausted { budget } => Self::IterationBudgetExhausted { budget },
        }
    }
}

/// Model parameter identifiers, in Gibbs update order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterName {
    Tau,
    Mu1,
    Mu2,
    Sigma,
}

impl ParameterName {
    pub const ALL: [Self; 4] = [Self::Tau, Self::Mu1, Self::Mu2, Self::Sigma];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tau => "tau",
            Self::Mu1 => "mu_1",
            Self::Mu2 => "mu_2",
            Self::Sigma => "sigma",
        }
    }
}

impl fmt::Display for ParameterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A point in parameter space.
///
/// `tau` is the last index of the first segment. It is signed so that out-of-range
/// candidates can be represented and scored as impossible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangePointParameters {
    pub tau: i64,
    pub mu_1: f64,
    pub mu_2: f64,
    pub sigma: f64,
}

impl ChangePointParameters {
    #[must_use]
    pub const fn new(tau: i64, mu_1: f64, mu_2: f64, sigma: f64) -> Self {
        Self {
            tau,
            mu_1,
            mu_2,
            sigma,
        }
    }

    /// Whether observation `index` belongs to the first segment (`index <= tau`).
    #[must_use]
    pub fn in_first_segment(self, index: usize) -> bool {
        i64::try_from(index).is_ok_and(|index| index <= self.tau)
    }

    /// Mean level governing observation `index`.
    #[must_use]
    pub fn level_at(self, index: usize) -> f64 {
        if self.in_first_segment(index) {
            self.mu_1
        } else {
            self.mu_2
        }
    }

    /// Scalar value of one parameter, with `tau` widened to `f64`.
    #[must_use]
    pub fn get(self, name: ParameterName) -> f64 {
        match name {
            ParameterName::Tau => crate::utils::i64_to_f64(self.tau),
            ParameterName::Mu1 => self.mu_1,
            ParameterName::Mu2 => self.mu_2,
            ParameterName::Sigma => self.sigma,
        }
    }
}

/// Proposal-kernel and adaptation controls.
#[derive(Debug, Clone, Copy)]
pub struct ProposalTuning {
    /// Largest local step for `tau`; step sizes `1..=k` are weighted `k + 1 - step`.
    pub tau_max_step: usize,
    /// Probability of proposing `tau` uniformly over the whole index range.
    pub tau_global_jump_probability: f64,
    /// Initial random-walk scale as a multiple of `std(values) / sqrt(N)`.
    pub initial_scale_multiplier: f64,
    /// Minimum allowed proposal scale.
    pub min_draw_scale: f64,
    /// Adapt every `adaptation_interval` tuning iterations.
    pub adaptation_interval: usize,
    /// Lower acceptance-rate target for adaptation.
    pub acceptance_target_low: f64,
    /// Upper acceptance-rate target for adaptation.
    pub acceptance_target_high: f64,
    /// Multiplicative scale decrease when acceptance is just below target.
    pub scale_decrease_factor: f64,
    /// Multiplicative scale increase when acceptance is just above target.
    pub scale_increase_factor: f64,
}

impl Default for ProposalTuning {
    fn default() -> Self {
        Self {
            tau_max_step: 3,
            tau_global_jump_probability: 0.1,
            initial_scale_multiplier: 1.0,
            min_draw_scale: 1.0e-9,
            adaptation_interval: 50,
            acceptance_target_low: 0.4,
            acceptance_target_high: 0.6,
            scale_decrease_factor: 0.9,
            scale_increase_factor: 1.1,
        }
    }
}

impl ProposalTuning {
    /// Whether proposal tuning settings are numerically valid.
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.tau_max_step > 0
            && (0.0..=1.0).contains(&self.tau_global_jump_probability)
            && self.initial_scale_multiplier > 0.0
            && self.initial_scale_multiplier.is_finite()
            && self.min_draw_scale > 0.0
            && self.adaptation_interval > 0
            && self.acceptance_target_low >= 0.0
            && self.acceptance_target_high <= 1.0
            && self.acceptance_target_low < self.acceptance_target_high
            && self.scale_decrease_factor > 0.0
            && self.scale_decrease_factor < 1.0
            && self.scale_increase_factor > 1.0
    }
}

/// Configuration for running multiple independent chains.
#[derive(Debug, Clone, Copy)]
pub struct MultiChainOptions {
    /// Number of independent chains to run.
    pub chains: usize,
    /// Seed increment between adjacent chains.
    ///
    /// Chain `i` uses `base_seed + i * seed_stride` with wrapping arithmetic.
    pub seed_stride: u64,
}

impl Default for MultiChainOptions {
    fn default() -> Self {
        Self {
            chains: 4,
            seed_stride: 10_000,
        }
    }
}

impl MultiChainOptions {
    /// # Errors
    ///
    /// Returns `ChangePointError` if multi-chain options are invalid.
    pub const fn validate(self) -> Result<(), ChangePointError> {
        if self.chains < 2 {
            return Err(ChangePointError::InvalidChainCount {
                min: 2,
                found: self.chains,
            });
        }
        if self.seed_stride == 0 {
            return Err(ChangePointError::InvalidSeedStride);
        }
        Ok(())
    }

    /// Seed for chain `chain_index` derived from `base_seed`.
    #[must_use]
    pub fn chain_seed(self, base_seed: u64, chain_index: usize) -> u64 {
        let index_u64 = u64::try_from(chain_index).unwrap_or(u64::MAX);
        base_seed.wrapping_add(index_u64.wrapping_mul(self.seed_stride))
    }
}

/// Posterior summary and convergence-warning settings.
#[derive(Debug, Clone, Copy)]
pub struct SummaryOptions {
    /// Probability mass of the equal-tailed credible interval.
    pub credible_mass: f64,
    /// R-hat above this value raises a convergence warning.
    pub max_r_hat: f64,
    /// Effective sample size below this value raises a convergence warning.
    pub min_ess: f64,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            credible_mass: 0.95,
            max_r_hat: 1.01,
            min_ess: 400.0,
        }
    }
}

impl SummaryOptions {
    /// # Errors
    ///
    /// Returns `ChangePointError` if the interval mass or thresholds are invalid.
    pub fn validate(self) -> Result<(), ChangePointError> {
        if !(self.credible_mass > 0.0 && self.credible_mass < 1.0) {
            return Err(ChangePointError::InvalidCredibleMass(self.credible_mass));
        }
        if !(self.max_r_hat.is_finite() && self.max_r_hat >= 1.0)
            || !(self.min_ess.is_finite() && self.min_ess >= 0.0)
        {
            return Err(ChangePointError::InvalidConvergenceThresholds);
        }
        Ok(())
    }

    /// Lower and upper tail probabilities of the credible interval.
    #[must_use]
    pub fn tail_probabilities(self) -> (f64, f64) {
        let tail = (1.0 - self.credible_mass) / 2.0;
        (tail, 1.0 - tail)
    }
}

/// Full sampler configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangePointSamplerConfig {
    pub schedule: McmcConfig,
    pub proposal_tuning: ProposalTuning,
    pub multi_chain: MultiChainOptions,
    pub summary: SummaryOptions,
}

impl ChangePointSamplerConfig {
    /// # Errors
    ///
    /// Returns `ChangePointError` if any configuration block is invalid.
    pub fn validate(self) -> Result<(), ChangePointError> {
        self.schedule.validate()?;
        if !self.proposal_tuning.is_valid() {
            return Err(ChangePointError::InvalidProposalTuning);
        }
        self.multi_chain.validate()?;
        self.summary.validate()
    }
}

/// Random-walk scales for the continuous parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProposalScales {
    pub mu_1: f64,
    pub mu_2: f64,
    pub sigma: f64,
}

/// Per-parameter acceptance rates over the sampling phase.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptanceRates {
    pub tau: f64,
    pub mu_1: f64,
    pub mu_2: f64,
    pub sigma: f64,
}

/// Per-chain sampler bookkeeping.
#[derive(Debug, Clone)]
pub struct ChainReport {
    pub chain_index: usize,
    pub seed: u64,
    pub iterations_completed: usize,
    pub retained_draws: usize,
    pub acceptance_rates: AcceptanceRates,
    /// Proposal scales after tuning, used for the whole sampling phase.
    pub final_scales: ProposalScales,
}

/// Convergence statistics for one scalar parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterDiagnostics {
    /// Gelman-Rubin potential scale reduction across whole chains.
    pub r_hat: f64,
    /// Potential scale reduction after splitting each chain in half.
    pub split_r_hat: f64,
    /// Multi-chain effective sample size, in `[1, chains * draws]`.
    pub ess: f64,
}

impl Default for ParameterDiagnostics {
    fn default() -> Self {
        Self {
            r_hat: 1.0,
            split_r_hat: 1.0,
            ess: 1.0,
        }
    }
}

/// A reported (never fatal) sign that chains may not have converged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConvergenceWarning {
    HighRHat {
        parameter: ParameterName,
        r_hat: f64,
        threshold: f64,
    },
    LowEffectiveSampleSize {
        parameter: ParameterName,
        ess: f64,
        threshold: f64,
    },
}

impl fmt::Display for ConvergenceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HighRHat {
                parameter,
                r_hat,
                threshold,
            } => write!(
                f,
                "{parameter}: R-hat {r_hat:.4} exceeds {threshold:.4}; chains disagree"
            ),
            Self::LowEffectiveSampleSize {
                parameter,
                ess,
                threshold,
            } => write!(
                f,
                "{parameter}: effective sample size {ess:.1} is below {threshold:.1}"
            ),
        }
    }
}

/// Multi-chain convergence summary.
#[derive(Debug, Clone, Default)]
pub struct ConvergenceSummary {
    /// Number of chains included.
    pub chain_count: usize,
    /// Draws per chain used after truncation to a common length.
    pub draws_per_chain_used: usize,
    pub tau: ParameterDiagnostics,
    pub mu_1: ParameterDiagnostics,
    pub mu_2: ParameterDiagnostics,
    pub sigma: ParameterDiagnostics,
    /// Largest of all whole-chain and split R-hat values.
    pub max_r_hat: f64,
    /// Smallest effective sample size across parameters.
    pub min_ess: f64,
    pub warnings: Vec<ConvergenceWarning>,
}

impl ConvergenceSummary {
    #[must_use]
    pub const fn parameter(&self, name: ParameterName) -> &ParameterDiagnostics {
        match name {
            ParameterName::Tau => &self.tau,
            ParameterName::Mu1 => &self.mu_1,
            ParameterName::Mu2 => &self.mu_2,
            ParameterName::Sigma => &self.sigma,
        }
    }

    /// `true` when no convergence warning was raised.
    #[must_use]
    pub const fn is_converged(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Output of a multi-chain change-point fit.
#[derive(Debug, Clone)]
pub struct ChangePointReport {
    pub summary: ChangePointSummary,
    /// Chain-specific bookkeeping in chain order.
    pub chains: Vec<ChainReport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_schedule() {
        let config = ChangePointSamplerConfig::default();
        assert_eq!(config.schedule.tune, 1_000);
        assert_eq!(config.schedule.draws, 2_000);
        assert_eq!(config.multi_chain.chains, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn proposal_tuning_defaults_are_valid() {
        assert!(ProposalTuning::default().is_valid());
    }

    #[test]
    fn sampler_config_validate_rejects_invalid_proposal_tuning() {
        let config = ChangePointSamplerConfig {
            proposal_tuning: ProposalTuning {
                adaptation_interval: 0,
                ..ProposalTuning::default()
            },
            ..ChangePointSamplerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ChangePointError::InvalidProposalTuning)
        ));
    }

    #[test]
    fn multi_chain_options_require_two_chains() {
        let options = MultiChainOptions {
            chains: 1,
            ..MultiChainOptions::default()
        };
        assert!(matches!(
            options.validate(),
            Err(ChangePointError::InvalidChainCount { min: 2, found: 1 })
        ));
    }

    #[test]
    fn chain_seeds_are_distinct_and_start_at_base() {
        let options = MultiChainOptions::default();
        assert_eq!(options.chain_seed(7, 0), 7);
        assert_eq!(options.chain_seed(7, 1), 10_007);
        assert_ne!(options.chain_seed(7, 2), options.chain_seed(7, 3));
    }

    #[test]
    fn summary_options_reject_degenerate_mass() {
        let options = SummaryOptions {
            credible_mass: 1.0,
            ..SummaryOptions::default()
        };
        assert!(matches!(
            options.validate(),
            Err(ChangePointError::InvalidCredibleMass(_))
        ));
    }

    #[test]
    fn default_interval_is_equal_tailed_ninety_five() {
        let (low, high) = SummaryOptions::default().tail_probabilities();
        assert!((low - 0.025).abs() < 1.0e-12);
        assert!((high - 0.975).abs() < 1.0e-12);
    }

    #[test]
    fn switch_boundary_keeps_tau_in_first_segment() {
        let params = ChangePointParameters::new(2, 1.0, 5.0, 1.0);
        assert!((params.level_at(2) - 1.0).abs() < f64::EPSILON);
        assert!((params.level_at(3) - 5.0).abs() < f64::EPSILON);
        let before_start = ChangePointParameters::new(-1, 1.0, 5.0, 1.0);
        assert!(!before_start.in_first_segment(0));
    }
}
