use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use regime_shift::{
    ChangePointSamplerConfig, McmcConfig, Observation, TimeSeries, fit_change_point,
    render_summary_table,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let series = build_synthetic_series(200, 100, 50.0, 80.0)?;

    let config = ChangePointSamplerConfig {
        schedule: McmcConfig {
            seed: 2_026,
            ..McmcConfig::default()
        },
        ..ChangePointSamplerConfig::default()
    };

    let report = fit_change_point(&series, config)?;
    let summary = &report.summary;

    println!(
        "Change detected at index {} ({}), level shift {:+.2}%",
        summary.detected_index, summary.detected_timestamp, summary.percent_change
    );
    println!(
        "tau mean={:.2}, 95% CrI [{:.2}, {:.2}]",
        summary.tau.mean, summary.tau.credible_low, summary.tau.credible_high
    );

    for chain in &report.chains {
        println!(
            "chain {} (seed {}): acceptance tau={:.2}, mu_1={:.2}, mu_2={:.2}, sigma={:.2}",
            chain.chain_index,
            chain.seed,
            chain.acceptance_rates.tau,
            chain.acceptance_rates.mu_1,
            chain.acceptance_rates.mu_2,
            chain.acceptance_rates.sigma
        );
    }

    println!("{}", render_summary_table(summary, config.summary.max_r_hat));
    for warning in &summary.convergence.warnings {
        println!("warning: {warning}");
    }

    Ok(())
}

fn build_synthetic_series(
    len: u32,
    shift_at: u32,
    before: f64,
    after: f64,
) -> Result<TimeSeries, Box<dyn std::error::Error>> {
    let mut rng = StdRng::seed_from_u64(7);
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).ok_or("invalid start date")?;
    let observations = (0..len)
        .map(|day| {
            let level = if day < shift_at { before } else { after };
            let u1 = (1.0 - rng.random::<f64>()).max(f64::MIN_POSITIVE);
            let u2 = rng.random::<f64>();
            let noise = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
            Observation::new(start + chrono::Days::new(u64::from(day)), level + noise)
        })
        .collect();
    Ok(TimeSeries::new(observations)?)
}
