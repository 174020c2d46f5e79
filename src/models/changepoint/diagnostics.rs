//! MCMC convergence diagnostics for change-point traces.

use tracing::warn;

use super::posterior::ChainTrace;
use super::types::{
    ChangePointError, ConvergenceSummary, ConvergenceWarning, ParameterDiagnostics, ParameterName,
    SummaryOptions,
};
use crate::utils::{sample_variance, usize_to_f64};

/// Minimum common draws per chain for split statistics.
pub const MIN_DRAWS_PER_CHAIN: usize = 4;

/// Gelman-Rubin potential scale reduction across equal-length chains.
///
/// Floored at 1.0; returns exactly 1.0 when the within-chain variance is zero.
///
/// # Errors
///
/// Returns `ChangePointError` if fewer than two chains or fewer than two draws are supplied, or
/// if chain lengths differ.
pub fn potential_scale_reduction(chains: &[Vec<f64>]) -> Result<f64, ChangePointError> {
    let n = validate_chain_block(chains, 2)?;

    let chain_means = chains
        .iter()
        .map(|chain| chain.iter().sum::<f64>() / usize_to_f64(n))
        .collect::<Vec<_>>();
    let within = chains
        .iter()
        .zip(chain_means.iter())
        .map(|(chain, mean)| sample_variance(chain, *mean))
        .sum::<f64>()
        / usize_to_f64(chains.len());

    let m = chains.len();
    let mean_of_means = chain_means.iter().sum::<f64>() / usize_to_f64(m);
    let between = usize_to_f64(n)
        * chain_means
            .iter()
            .map(|mean| (mean - mean_of_means) * (mean - mean_of_means))
            .sum::<f64>()
        / usize_to_f64(m - 1);

    if !(within.is_finite() && within > 0.0 && between.is_finite()) {
        return Ok(1.0);
    }

    let n_f64 = usize_to_f64(n);
    let var_plus = ((n_f64 - 1.0) / n_f64).mul_add(within, between / n_f64);
    if !var_plus.is_finite() || var_plus <= 0.0 {
        return Ok(1.0);
    }

    Ok((var_plus / within).sqrt().max(1.0))
}

/// Potential scale reduction after splitting each chain into two halves.
///
/// An odd trailing draw is ignored.
///
/// # Errors
///
/// Returns `ChangePointError` if fewer than two chains or fewer than four draws are supplied, or
/// if chain lengths differ.
pub fn split_potential_scale_reduction(chains: &[Vec<f64>]) -> Result<f64, ChangePointError> {
    let n = validate_chain_block(chains, MIN_DRAWS_PER_CHAIN)?;
    let half = n / 2;

    let mut split_chains = Vec::with_capacity(chains.len() * 2);
    for chain in chains {
        split_chains.push(chain[..half].to_vec());
        split_chains.push(chain[half..2 * half].to_vec());
    }

    potential_scale_reduction(&split_chains)
}

/// Multi-chain effective sample size.
///
/// Combines within-chain autocovariances with the between-chain variance and truncates the
/// autocorrelation sum with Geyer's initial monotone positive sequence. The result lies in
/// `[1, chains * draws]`.
///
/// # Errors
///
/// Returns `ChangePointError` if fewer than two chains or fewer than four draws are supplied, or
/// if chain lengths differ.
pub fn multi_chain_effective_sample_size(chains: &[Vec<f64>]) -> Result<f64, ChangePointError> {
    let n = validate_chain_block(chains, MIN_DRAWS_PER_CHAIN)?;
    let m = chains.len();
    let total = usize_to_f64(m * n);
    let n_f64 = usize_to_f64(n);

    let chain_means = chains
        .iter()
        .map(|chain| chain.iter().sum::<f64>() / n_f64)
        .collect::<Vec<_>>();
    let autocovariance = |lag: usize| -> f64 {
        chains
            .iter()
            .zip(chain_means.iter())
            .map(|(chain, mean)| {
                chain
                    .iter()
                    .zip(chain.iter().skip(lag))
                    .map(|(head, tail)| (head - mean) * (tail - mean))
                    .sum::<f64>()
                    / n_f64
            })
            .sum::<f64>()
            / usize_to_f64(m)
    };

    let gamma_zero = autocovariance(0);
    let mean_within = gamma_zero * n_f64 / (n_f64 - 1.0);
    let mean_of_means = chain_means.iter().sum::<f64>() / usize_to_f64(m);
    let between_over_n = chain_means
        .iter()
        .map(|mean| (mean - mean_of_means) * (mean - mean_of_means))
        .sum::<f64>()
        / usize_to_f64(m - 1);
    let var_plus = mean_within * (n_f64 - 1.0) / n_f64 + between_over_n;

    if !(var_plus.is_finite() && var_plus > 0.0) {
        return Ok(total);
    }

    let rho = |lag: usize| -> f64 {
        if lag == 0 {
            1.0
        } else {
            1.0 - (mean_within - autocovariance(lag)) / var_plus
        }
    };

    let mut pair_sum = 0.0;
    let mut previous_pair = f64::INFINITY;
    let mut lag = 0;
    while lag + 1 < n {
        let pair = rho(lag) + rho(lag + 1);
        if pair <= 0.0 {
            break;
        }
        let pair = pair.min(previous_pair);
        pair_sum += pair;
        previous_pair = pair;
        lag += 2;
    }

    let tau_hat = 2.0f64.mul_add(pair_sum, -1.0);
    if !(tau_hat.is_finite() && tau_hat > 0.0) {
        return Ok(total);
    }
    Ok((total / tau_hat).clamp(1.0, total))
}

/// Per-parameter R-hat, split R-hat and ESS across chains, with threshold warnings.
///
/// Traces are truncated to their common length. Every warning is logged with `tracing::warn!`;
/// none aborts the run.
///
/// # Errors
///
/// Returns `ChangePointError` if fewer than two chains are supplied or the common length is below
/// four draws.
pub fn diagnose_traces(
    traces: &[ChainTrace],
    options: SummaryOptions,
) -> Result<ConvergenceSummary, ChangePointError> {
    if traces.len() < 2 {
        return Err(ChangePointError::InvalidChainCount {
            min: 2,
            found: traces.len(),
        });
    }
    let draws_per_chain_used = traces.iter().map(ChainTrace::len).min().unwrap_or(0);
    if draws_per_chain_used < MIN_DRAWS_PER_CHAIN {
        return Err(ChangePointError::InsufficientChainDraws {
            minimum: MIN_DRAWS_PER_CHAIN,
            found: draws_per_chain_used,
        });
    }

    let mut summary = ConvergenceSummary {
        chain_count: traces.len(),
        draws_per_chain_used,
        max_r_hat: 1.0,
        min_ess: f64::INFINITY,
        ..ConvergenceSummary::default()
    };

    for name in ParameterName::ALL {
        let chains = traces
            .iter()
            .map(|trace| {
                trace
                    .draws
                    .iter()
                    .take(draws_per_chain_used)
                    .map(|draw| draw.get(name))
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();

        let diagnostics = ParameterDiagnostics {
            r_hat: potential_scale_reduction(&chains)?,
            split_r_hat: split_potential_scale_reduction(&chains)?,
            ess: multi_chain_effective_sample_size(&chains)?,
        };

        let worst_r_hat = diagnostics.r_hat.max(diagnostics.split_r_hat);
        summary.max_r_hat = summary.max_r_hat.max(worst_r_hat);
        summary.min_ess = summary.min_ess.min(diagnostics.ess);

        if worst_r_hat > options.max_r_hat {
            summary.warnings.push(ConvergenceWarning::HighRHat {
                parameter: name,
                r_hat: worst_r_hat,
                threshold: options.max_r_hat,
            });
        }
        if diagnostics.ess < options.min_ess {
            summary.warnings.push(ConvergenceWarning::LowEffectiveSampleSize {
                parameter: name,
                ess: diagnostics.ess,
                threshold: options.min_ess,
            });
        }

        match name {
            ParameterName::Tau => summary.tau = diagnostics,
            ParameterName::Mu1 => summary.mu_1 = diagnostics,
            ParameterName::Mu2 => summary.mu_2 = diagnostics,
            ParameterName::Sigma => summary.sigma = diagnostics,
        }
    }

    for warning in &summary.warnings {
        warn!(%warning, "convergence check failed");
    }

    Ok(summary)
}

fn validate_chain_block(chains: &[Vec<f64>], min_draws: usize) -> Result<usize, ChangePointError> {
    if chains.len() < 2 {
        return Err(ChangePointError::InvalidChainCount {
            min: 2,
            found: chains.len(),
        });
    }
    let n = chains.first().map_or(0, Vec::len);
    if chains.iter().any(|chain| chain.len() != n) {
        return Err(ChangePointError::InconsistentTraceLengths);
    }
    if n < min_draws {
        return Err(ChangePointError::InsufficientChainDraws {
            minimum: min_draws,
            found: n,
        });
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{RngExt, SeedableRng};

    use super::*;
    use crate::models::changepoint::types::ChangePointParameters;

    fn noise_chain(seed: u64, len: usize, offset: f64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..len).map(|_| offset + rng.random::<f64>()).collect()
    }

    #[test]
    fn r_hat_of_identical_chains_is_exactly_one() {
        let chain = noise_chain(3, 200, 0.0);
        let r_hat = potential_scale_reduction(&[chain.clone(), chain]).expect("valid chains");
        assert_eq!(r_hat, 1.0);
    }

    #[test]
    fn r_hat_of_disjoint_chains_exceeds_threshold() {
        let low = noise_chain(1, 200, 0.0);
        let high = noise_chain(2, 200, 10.0);
        let r_hat = potential_scale_reduction(&[low, high]).expect("valid chains");
        assert!(r_hat > 1.01, "r_hat = {r_hat}");
    }

    #[test]
    fn r_hat_of_constant_chains_is_one() {
        let r_hat = potential_scale_reduction(&[vec![4.0; 10], vec![4.0; 10]])
            .expect("valid chains");
        assert_eq!(r_hat, 1.0);
    }

    #[test]
    fn split_r_hat_detects_drift_within_chains() {
        let drifting: Vec<f64> = (0..200).map(|i| usize_to_f64(i) * 0.1).collect();
        let whole = potential_scale_reduction(&[drifting.clone(), drifting.clone()])
            .expect("valid chains");
        let split = split_potential_scale_reduction(&[drifting.clone(), drifting])
            .expect("valid chains");
        assert_eq!(whole, 1.0);
        assert!(split > 1.01);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let result = potential_scale_reduction(&[vec![1.0, 2.0, 3.0], vec![1.0, 2.0]]);
        assert!(matches!(result, Err(ChangePointError::InconsistentTraceLengths)));
    }

    #[test]
    fn multi_chain_ess_of_independent_noise_is_near_total() {
        let chains = vec![noise_chain(10, 500, 0.0), noise_chain(11, 500, 0.0)];
        let ess = multi_chain_effective_sample_size(&chains).expect("valid chains");
        assert!(ess > 500.0, "ess = {ess}");
        assert!(ess <= 1_000.0);
    }

    #[test]
    fn multi_chain_ess_of_constant_draws_is_total() {
        let ess = multi_chain_effective_sample_size(&[vec![2.0; 8], vec![2.0; 8]])
            .expect("valid chains");
        assert_relative_eq!(ess, 16.0);
    }

    #[test]
    fn multi_chain_ess_penalises_autocorrelation() {
        let sticky: Vec<f64> = noise_chain(5, 400, 0.0)
            .chunks(20)
            .flat_map(|block| std::iter::repeat_n(block[0], block.len()))
            .collect();
        let ess = multi_chain_effective_sample_size(&[sticky.clone(), sticky.iter().rev().copied().collect()])
            .expect("valid chains");
        assert!(ess < 200.0, "ess = {ess}");
        assert!(ess >= 1.0);
    }

    #[test]
    fn diagnose_requires_two_chains() {
        let trace = ChainTrace {
            chain_index: 0,
            seed: 0,
            draws: vec![ChangePointParameters::new(1, 1.0, 2.0, 1.0); 8],
        };
        let result = diagnose_traces(&[trace], SummaryOptions::default());
        assert!(matches!(result, Err(ChangePointError::InvalidChainCount { .. })));
    }

    #[test]
    fn diagnose_warns_on_disagreeing_chains() {
        let low = noise_chain(20, 100, 1.0);
        let high = noise_chain(21, 100, 50.0);
        let to_trace = |index: usize, levels: &[f64]| ChainTrace {
            chain_index: index,
            seed: 0,
            draws: levels
                .iter()
                .map(|level| ChangePointParameters::new(3, *level, 2.0, 1.0))
                .collect(),
        };
        let summary = diagnose_traces(&[to_trace(0, &low), to_trace(1, &high)], SummaryOptions::default())
            .expect("diagnostics should run");
        assert_eq!(summary.chain_count, 2);
        assert_eq!(summary.draws_per_chain_used, 100);
        assert!(summary.mu_1.r_hat > 1.01);
        assert_eq!(summary.tau.r_hat, 1.0);
        assert!(summary.warnings.iter().any(|warning| matches!(
            warning,
            ConvergenceWarning::HighRHat {
                parameter: ParameterName::Mu1,
                ..
            }
        )));
        assert!(!summary.is_converged());
    }
}
