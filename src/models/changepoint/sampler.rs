//! Metropolis-within-Gibbs sampler for the single change-point model.
//!
//! Each chain updates `tau`, `mu_1`, `mu_2` and `sigma` in turn, testing every proposal against
//! the cached log-posterior left by the previous decision. Chains run on scoped threads and share
//! only the read-only [`ChangePointModel`].

use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use tracing::{debug, info, trace};

use super::likelihood::ChangePointModel;
use super::posterior::{ChainTrace, summarize_change_point};
use super::types::{
    AcceptanceRates, ChainReport, ChangePointError, ChangePointParameters, ChangePointReport,
    ChangePointSamplerConfig, ProposalScales, ProposalTuning,
};
use crate::inference::{ProposalStats, RunControl};
use crate::input::TimeSeries;
use crate::utils::usize_to_f64;

/// Relative spread of the initial level jitter.
const INITIAL_LEVEL_JITTER: f64 = 0.1;

/// Fit the change-point model with independent chains.
///
/// # Errors
///
/// Returns `ChangePointError` if the configuration is invalid or any chain fails.
pub fn fit_change_point(
    series: &TimeSeries,
    config: ChangePointSamplerConfig,
) -> Result<ChangePointReport, ChangePointError> {
    fit_change_point_with_traces(series, config).map(|(report, _)| report)
}

/// Fit the change-point model and also return every chain's retained draws.
///
/// # Errors
///
/// Returns `ChangePointError` if the configuration is invalid or any chain fails.
pub fn fit_change_point_with_traces(
    series: &TimeSeries,
    config: ChangePointSamplerConfig,
) -> Result<(ChangePointReport, Vec<ChainTrace>), ChangePointError> {
    fit_change_point_with_control(series, config, &RunControl::default())
}

/// Fit the change-point model under caller-imposed cancellation and iteration limits.
///
/// Chains check `control` before every iteration. A stopped run returns an error and its partial
/// traces are dropped.
///
/// # Errors
///
/// Returns `ChangePointError` if the configuration is invalid, the run is cancelled or exhausts its
/// iteration budget, or a chain thread panics.
pub fn fit_change_point_with_control(
    series: &TimeSeries,
    config: ChangePointSamplerConfig,
    control: &RunControl,
) -> Result<(ChangePointReport, Vec<ChainTrace>), ChangePointError> {
    config.validate()?;
    let model = ChangePointModel::new(series)?;
    let chains = config.multi_chain.chains;

    info!(
        observations = series.len(),
        chains,
        tune = config.schedule.tune,
        draws = config.schedule.draws,
        seed = config.schedule.seed,
        "starting change-point sampling"
    );

    let model_ref = &model;
    let mut chain_results = (0..chains)
        .map(|_| None)
        .collect::<Vec<Option<Result<(ChainTrace, ChainReport), ChangePointError>>>>();

    std::thread::scope(|scope| {
        let mut handles = Vec::with_capacity(chains);
        for chain_index in 0..chains {
            handles.push((
                chain_index,
                scope.spawn(move || sample_chain(model_ref, config, chain_index, control)),
            ));
        }

        for (chain_index, handle) in handles {
            let result = handle
                .join()
                .unwrap_or(Err(ChangePointError::ChainPanicked { chain: chain_index }));
            chain_results[chain_index] = Some(result);
        }
    });

    let mut traces = Vec::with_capacity(chains);
    let mut reports = Vec::with_capacity(chains);
    for (chain_index, chain_result) in chain_results.into_iter().enumerate() {
        let (trace, report) =
            chain_result.ok_or(ChangePointError::ChainPanicked { chain: chain_index })??;
        traces.push(trace);
        reports.push(report);
    }

    let summary = summarize_change_point(series, &traces, config.summary)?;
    info!(
        detected_index = summary.detected_index,
        detected_date = %summary.detected_timestamp,
        percent_change = summary.percent_change,
        max_r_hat = summary.convergence.max_r_hat,
        min_ess = summary.convergence.min_ess,
        "change-point sampling finished"
    );

    Ok((
        ChangePointReport {
            summary,
            chains: reports,
        },
        traces,
    ))
}

/// Run one chain to completion.
///
/// The chain seed is derived from the schedule seed and `chain_index`, so a single chain can be
/// replayed outside a multi-chain run.
///
/// # Errors
///
/// Returns `ChangePointError` if the configuration is invalid or `control` stops the chain.
pub fn sample_chain(
    model: &ChangePointModel,
    config: ChangePointSamplerConfig,
    chain_index: usize,
    control: &RunControl,
) -> Result<(ChainTrace, ChainReport), ChangePointError> {
    let schedule = config.schedule;
    schedule.validate()?;
    let tuning = config.proposal_tuning;
    if !tuning.is_valid() {
        return Err(ChangePointError::InvalidProposalTuning);
    }

    let seed = config.multi_chain.chain_seed(schedule.seed, chain_index);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut state = ChainState::initial(model, &mut rng);
    let mut scales = initial_scales(model, tuning);
    let mut window = AcceptanceCounts::default();
    let mut sampled = AcceptanceCounts::default();
    let mut draws = Vec::with_capacity(schedule.draws);

    for iteration in 0..schedule.total_iterations() {
        if let Some(reason) = control.stop_reason(iteration) {
            debug!(chain = chain_index, iteration, ?reason, "chain stopped early");
            return Err(reason.into());
        }

        let accepted = IterationAcceptance {
            tau: update_tau(model, tuning, &mut state, &mut rng),
            mu_1: update_continuous(model, ContinuousParameter::Mu1, scales.mu_1, &mut state, &mut rng),
            mu_2: update_continuous(model, ContinuousParameter::Mu2, scales.mu_2, &mut state, &mut rng),
            sigma: update_continuous(model, ContinuousParameter::Sigma, scales.sigma, &mut state, &mut rng),
        };

        if iteration < schedule.tune {
            window.record(accepted);
            if schedule.adapt_during_tuning
                && (iteration + 1).is_multiple_of(tuning.adaptation_interval)
            {
                adapt_scales(&mut scales, &window, tuning);
                trace!(chain = chain_index, iteration, ?scales, "adapted proposal scales");
                window = AcceptanceCounts::default();
            }
        } else {
            sampled.record(accepted);
            draws.push(state.params);
        }
    }

    let acceptance_rates = sampled.rates();
    debug!(
        chain = chain_index,
        seed,
        tau_acceptance = acceptance_rates.tau,
        mu_1_acceptance = acceptance_rates.mu_1,
        mu_2_acceptance = acceptance_rates.mu_2,
        sigma_acceptance = acceptance_rates.sigma,
        ?scales,
        "chain finished"
    );

    let report = ChainReport {
        chain_index,
        seed,
        iterations_completed: schedule.total_iterations(),
        retained_draws: draws.len(),
        acceptance_rates,
        final_scales: scales,
    };
    Ok((
        ChainTrace {
            chain_index,
            seed,
            draws,
        },
        report,
    ))
}

#[derive(Debug, Clone, Copy)]
struct ChainState {
    params: ChangePointParameters,
    log_posterior: f64,
}

impl ChainState {
    /// `tau` uniform over the index range, levels at the segment means with multiplicative
    /// jitter, `sigma` at the data spread.
    fn initial(model: &ChangePointModel, rng: &mut StdRng) -> Self {
        let n = model.n_observations();
        let tau = rng.random_range(0..n);
        let (first, second) = model
            .segment_means(tau)
            .unwrap_or((model.data_mean(), None));
        let second = second.unwrap_or(first);

        let mu_1 = first * (INITIAL_LEVEL_JITTER * sample_standard_normal(rng)).exp();
        let mu_2 = second * (INITIAL_LEVEL_JITTER * sample_standard_normal(rng)).exp();
        let params = ChangePointParameters::new(
            i64::try_from(tau).unwrap_or(i64::MAX),
            mu_1,
            mu_2,
            model.data_std_dev(),
        );
        Self {
            params,
            log_posterior: model.log_posterior(&params),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct IterationAcceptance {
    tau: bool,
    mu_1: bool,
    mu_2: bool,
    sigma: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct AcceptanceCounts {
    tau: ProposalStats,
    mu_1: ProposalStats,
    mu_2: ProposalStats,
    sigma: ProposalStats,
}

impl AcceptanceCounts {
    const fn record(&mut self, accepted: IterationAcceptance) {
        self.tau.record(accepted.tau);
        self.mu_1.record(accepted.mu_1);
        self.mu_2.record(accepted.mu_2);
        self.sigma.record(accepted.sigma);
    }

    fn rates(self) -> AcceptanceRates {
        AcceptanceRates {
            tau: self.tau.acceptance_rate(),
            mu_1: self.mu_1.acceptance_rate(),
            mu_2: self.mu_2.acceptance_rate(),
            sigma: self.sigma.acceptance_rate(),
        }
    }
}

fn initial_scales(model: &ChangePointModel, tuning: ProposalTuning) -> ProposalScales {
    let scale = (tuning.initial_scale_multiplier * model.data_std_dev()
        / usize_to_f64(model.n_observations()).sqrt())
    .max(tuning.min_draw_scale);
    ProposalScales {
        mu_1: scale,
        mu_2: scale,
        sigma: scale,
    }
}

fn update_tau(
    model: &ChangePointModel,
    tuning: ProposalTuning,
    state: &mut ChainState,
    rng: &mut StdRng,
) -> bool {
    let candidate_tau = propose_tau(state.params.tau, model.n_observations(), tuning, rng);
    let candidate = ChangePointParameters {
        tau: candidate_tau,
        ..state.params
    };
    metropolis_step(model, state, candidate, rng)
}

/// Parameters updated by a Gaussian random-walk step.
#[derive(Debug, Clone, Copy)]
enum ContinuousParameter {
    Mu1,
    Mu2,
    Sigma,
}

impl ContinuousParameter {
    const fn value_mut(self, params: &mut ChangePointParameters) -> &mut f64 {
        match self {
            Self::Mu1 => &mut params.mu_1,
            Self::Mu2 => &mut params.mu_2,
            Self::Sigma => &mut params.sigma,
        }
    }
}

fn update_continuous(
    model: &ChangePointModel,
    parameter: ContinuousParameter,
    scale: f64,
    state: &mut ChainState,
    rng: &mut StdRng,
) -> bool {
    let step = scale * sample_standard_normal(rng);
    let mut candidate = state.params;
    *parameter.value_mut(&mut candidate) += step;
    metropolis_step(model, state, candidate, rng)
}

fn metropolis_step(
    model: &ChangePointModel,
    state: &mut ChainState,
    candidate: ChangePointParameters,
    rng: &mut StdRng,
) -> bool {
    let candidate_log_posterior = model.log_posterior(&candidate);
    if !candidate_log_posterior.is_finite() {
        return false;
    }
    let accepted = should_accept(candidate_log_posterior - state.log_posterior, rng);
    if accepted {
        state.params = candidate;
        state.log_posterior = candidate_log_posterior;
    }
    accepted
}

/// Symmetric `tau` proposal: a uniform jump over the whole range, or a short local step.
///
/// Out-of-range candidates are returned as is and rejected by the posterior.
fn propose_tau(current: i64, n_observations: usize, tuning: ProposalTuning, rng: &mut StdRng) -> i64 {
    if rng.random::<f64>() < tuning.tau_global_jump_probability {
        return i64::try_from(rng.random_range(0..n_observations)).unwrap_or(i64::MAX);
    }
    let step = sample_tau_step(tuning.tau_max_step, rng);
    if rng.random::<bool>() {
        current.saturating_add(step)
    } else {
        current.saturating_sub(step)
    }
}

/// Step size in `1..=max_step` with weight `max_step + 1 - step`.
fn sample_tau_step(max_step: usize, rng: &mut StdRng) -> i64 {
    let total_weight = max_step * (max_step + 1) / 2;
    let mut ticket = rng.random_range(0..total_weight);
    for step in 1..=max_step {
        let weight = max_step + 1 - step;
        if ticket < weight {
            return i64::try_from(step).unwrap_or(1);
        }
        ticket -= weight;
    }
    1
}

fn adapt_scales(scales: &mut ProposalScales, window: &AcceptanceCounts, tuning: ProposalTuning) {
    scales.mu_1 = adapted_scale(scales.mu_1, window.mu_1.acceptance_rate(), tuning);
    scales.mu_2 = adapted_scale(scales.mu_2, window.mu_2.acceptance_rate(), tuning);
    scales.sigma = adapted_scale(scales.sigma, window.sigma.acceptance_rate(), tuning);
}

fn adapted_scale(scale: f64, acceptance: f64, tuning: ProposalTuning) -> f64 {
    let factor = if acceptance < 0.05 {
        0.1
    } else if acceptance < 0.2 {
        0.5
    } else if acceptance < tuning.acceptance_target_low {
        tuning.scale_decrease_factor
    } else if acceptance > 0.95 {
        10.0
    } else if acceptance > 0.75 {
        2.0
    } else if acceptance > tuning.acceptance_target_high {
        tuning.scale_increase_factor
    } else {
        1.0
    };
    (scale * factor).max(tuning.min_draw_scale)
}

fn should_accept(log_acceptance: f64, rng: &mut StdRng) -> bool {
    log_acceptance >= 0.0 || rng.random::<f64>().ln() < log_acceptance
}

fn sample_standard_normal(rng: &mut StdRng) -> f64 {
    let u1 = (1.0_f64 - rng.random::<f64>()).max(f64::MIN_POSITIVE);
    let u2 = rng.random::<f64>();
    (-2.0_f64 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}
