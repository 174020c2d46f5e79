//! Reusable inference and MCMC utility types.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

use crate::utils::usize_to_f64;

/// Errors for generic MCMC configuration.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InferenceError {
    #[error("sampling draws must be positive")]
    InvalidDraws,
}

/// Generic MCMC schedule: a discarded tuning phase followed by a retained sampling phase.
#[derive(Debug, Clone, Copy)]
pub struct McmcConfig {
    /// Tuning iterations; draws are discarded.
    pub tune: usize,
    /// Sampling iterations; every iteration is retained.
    pub draws: usize,
    /// Base RNG seed.
    pub seed: u64,
    /// Adapt proposal scales while tuning.
    pub adapt_during_tuning: bool,
}

impl Default for McmcConfig {
    fn default() -> Self {
        Self {
            tune: 1_000,
            draws: 2_000,
            seed: 42,
            adapt_during_tuning: true,
        }
    }
}

impl McmcConfig {
    /// # Errors
    ///
    /// Returns `InferenceError` if schedule values are invalid.
    pub const fn validate(self) -> Result<(), InferenceError> {
        if self.draws == 0 {
            return Err(InferenceError::InvalidDraws);
        }
        Ok(())
    }

    /// Iterations executed by one chain.
    #[must_use]
    pub const fn total_iterations(self) -> usize {
        self.tune.saturating_add(self.draws)
    }
}

/// Proposal counters for a single Metropolis-Hastings block.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProposalStats {
    pub proposed: usize,
    pub accepted: usize,
}

impl ProposalStats {
    /// Record one proposal and whether it was accepted.
    pub const fn record(&mut self, accepted: bool) {
        self.proposed += 1;
        if accepted {
            self.accepted += 1;
        }
    }

    /// Acceptance rate in `[0, 1]`, or `0` if no proposals were made.
    #[must_use]
    pub fn acceptance_rate(self) -> f64 {
        if self.proposed == 0 {
            0.0
        } else {
            usize_to_f64(self.accepted) / usize_to_f64(self.proposed)
        }
    }
}

/// Cooperative cancellation flag shared between a caller and running chains.
///
/// Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; chains stop at their next iteration boundary.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Caller-imposed termination controls for a sampling run.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    pub cancellation: CancellationToken,
    /// Maximum iterations any single chain may execute (tuning included).
    pub iteration_budget: Option<usize>,
}

impl RunControl {
    #[must_use]
    pub fn with_cancellation(cancellation: CancellationToken) -> Self {
        Self {
            cancellation,
            iteration_budget: None,
        }
    }

    #[must_use]
    pub const fn with_iteration_budget(mut self, budget: usize) -> Self {
        self.iteration_budget = Some(budget);
        self
    }

    /// Whether a chain about to run iteration `iteration` (zero based) must stop.
    #[must_use]
    pub fn stop_reason(&self, iteration: usize) -> Option<StopReason> {
        if self.cancellation.is_cancelled() {
            return Some(StopReason::Cancelled);
        }
        match self.iteration_budget {
            Some(budget) if iteration >= budget => Some(StopReason::BudgetExhausted { budget }),
            _ => None,
        }
    }
}

/// Why a chain stopped before completing its schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    BudgetExhausted { budget: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_validation_rejects_zero_draws() {
        let config = McmcConfig {
            draws: 0,
            ..McmcConfig::default()
        };
        assert_eq!(config.validate(), Err(InferenceError::InvalidDraws));
    }

    #[test]
    fn default_schedule_runs_three_thousand_iterations() {
        assert_eq!(McmcConfig::default().total_iterations(), 3_000);
    }

    #[test]
    fn proposal_stats_tracks_acceptance() {
        let mut stats = ProposalStats::default();
        stats.record(true);
        stats.record(false);
        assert!((stats.acceptance_rate() - 0.5).abs() < 1.0e-12);
    }

    #[test]
    fn cancellation_is_visible_through_clones() {
        let token = CancellationToken::new();
        let control = RunControl::with_cancellation(token.clone());
        assert_eq!(control.stop_reason(0), None);
        token.cancel();
        assert_eq!(control.stop_reason(0), Some(StopReason::Cancelled));
    }

    #[test]
    fn iteration_budget_stops_at_boundary() {
        let control = RunControl::default().with_iteration_budget(10);
        assert_eq!(control.stop_reason(9), None);
        assert_eq!(
            control.stop_reason(10),
            Some(StopReason::BudgetExhausted { budget: 10 })
        );
    }
}
