use approx::assert_abs_diff_eq;
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use regime_shift::{
    ChangePointSamplerConfig, McmcConfig, MultiChainOptions, Observation, ParameterName,
    TimeSeries, fit_change_point, fit_change_point_with_traces, read_price_csv,
    render_summary_table, write_derived_csv, write_summary_csv,
};

fn sample_standard_normal(rng: &mut StdRng) -> f64 {
    let u1 = (1.0_f64 - rng.random::<f64>()).max(f64::MIN_POSITIVE);
    let u2 = rng.random::<f64>();
    (-2.0_f64 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

fn day(offset: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).expect("valid date")
        + chrono::Days::new(u64::try_from(offset).unwrap_or(u64::MAX))
}

fn simulate_shift(len: usize, shift_at: usize, before: f64, after: f64, seed: u64) -> TimeSeries {
    let mut rng = StdRng::seed_from_u64(seed);
    let observations = (0..len)
        .map(|i| {
            let level = if i < shift_at { before } else { after };
            Observation::new(day(i), level + sample_standard_normal(&mut rng))
        })
        .collect();
    TimeSeries::new(observations).expect("simulated series is valid")
}

#[test]
fn default_run_recovers_a_clear_level_shift() {
    let series = simulate_shift(200, 100, 50.0, 80.0, 2_024);
    let report =
        fit_change_point(&series, ChangePointSamplerConfig::default()).expect("fit should succeed");
    let summary = &report.summary;

    assert!(
        (summary.tau.mean - 99.0).abs() <= 5.0,
        "tau mean {}",
        summary.tau.mean
    );
    assert_abs_diff_eq!(summary.percent_change, 60.0, epsilon = 2.0);
    assert_abs_diff_eq!(summary.mu_1.mean, 50.0, epsilon = 0.5);
    assert_abs_diff_eq!(summary.mu_2.mean, 80.0, epsilon = 0.5);
    assert_abs_diff_eq!(summary.sigma.mean, 1.0, epsilon = 0.3);

    assert_eq!(summary.chain_count, 4);
    assert_eq!(summary.draws_per_chain, 2_000);
    assert_eq!(summary.draw_count, 8_000);
    assert_eq!(report.chains.len(), 4);
    assert_eq!(
        Some(summary.detected_timestamp),
        series.timestamp(summary.detected_index)
    );
    assert!(summary.convergence.max_r_hat < 1.05);
}

#[test]
fn every_parameter_interval_contains_its_mean() {
    let series = simulate_shift(80, 30, 12.0, 9.0, 5);
    let report =
        fit_change_point(&series, ChangePointSamplerConfig::default()).expect("fit should succeed");

    for name in ParameterName::ALL {
        let parameter = report.summary.parameter(name);
        assert!(parameter.credible_low <= parameter.mean, "{name}");
        assert!(parameter.mean <= parameter.credible_high, "{name}");
        assert!(parameter.credible_low <= parameter.median);
        assert!(parameter.median <= parameter.credible_high);
        assert!(parameter.ess >= 1.0);
        assert!(parameter.r_hat >= 1.0);
    }
    assert!(report.summary.percent_change < 0.0);
}

#[test]
fn traces_hold_one_draw_per_sampling_iteration() {
    let series = simulate_shift(60, 20, 5.0, 7.0, 8);
    let config = ChangePointSamplerConfig {
        schedule: McmcConfig {
            tune: 200,
            draws: 150,
            seed: 99,
            adapt_during_tuning: true,
        },
        multi_chain: MultiChainOptions {
            chains: 3,
            seed_stride: 17,
        },
        ..ChangePointSamplerConfig::default()
    };

    let (report, traces) = fit_change_point_with_traces(&series, config).expect("fit");
    assert_eq!(traces.len(), 3);
    for (index, trace) in traces.iter().enumerate() {
        assert_eq!(trace.len(), 150);
        assert_eq!(trace.chain_index, index);
        assert_eq!(report.chains[index].seed, trace.seed);
        assert_eq!(report.chains[index].retained_draws, 150);
    }
    assert_eq!(traces[1].seed, 99 + 17);
    assert_eq!(traces[2].seed, 99 + 34);
}

#[test]
fn csv_file_to_report_workflow() {
    let mut data = String::from("Date,Price\n");
    let mut rng = StdRng::seed_from_u64(31);
    for i in 0..60 {
        let level = if i < 40 { 20.0 } else { 26.0 };
        let price = 0.3f64.mul_add(sample_standard_normal(&mut rng), level);
        data.push_str(&format!("{},{price:.3}\n", day(i).format("%Y-%m-%d")));
    }

    let series = read_price_csv(data.as_bytes()).expect("csv should parse");
    assert_eq!(series.len(), 60);

    let report =
        fit_change_point(&series, ChangePointSamplerConfig::default()).expect("fit should succeed");
    let summary = &report.summary;
    assert!((summary.tau.mean - 39.0).abs() <= 2.0, "tau mean {}", summary.tau.mean);
    assert_abs_diff_eq!(summary.percent_change, 30.0, epsilon = 3.0);

    let (before, after) = summary.segments(&series).expect("segments in range");
    let after = after.expect("second segment is non-empty");
    assert_eq!(before.start, day(0));
    assert_eq!(after.end, day(59));
    assert_eq!(before.end_index + 1, after.start_index);

    let mut summary_csv = Vec::new();
    write_summary_csv(summary, &mut summary_csv).expect("summary csv");
    let summary_text = String::from_utf8(summary_csv).expect("utf8");
    assert!(summary_text.starts_with("parameter,mean,std,2.5%,97.5%,r_hat,ess\n"));

    let mut derived_csv = Vec::new();
    write_derived_csv(summary, &mut derived_csv).expect("derived csv");
    let derived_text = String::from_utf8(derived_csv).expect("utf8");
    assert!(derived_text.contains(&format!(
        "detected_date,{}",
        summary.detected_timestamp.format("%Y-%m-%d")
    )));

    let table = render_summary_table(summary, 1.01);
    assert!(table.contains("percent_change"));
}
