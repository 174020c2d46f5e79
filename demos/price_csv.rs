use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use regime_shift::{
    ChangePointSamplerConfig, fit_change_point, load_price_csv, render_summary_table,
    series_diagnostics, write_derived_csv, write_series_csv, write_summary_csv,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let input = args
        .next()
        .map(PathBuf::from)
        .ok_or("usage: price_csv <prices.csv> [output-dir]")?;
    let output_dir = args.next().map_or_else(|| PathBuf::from("."), PathBuf::from);
    std::fs::create_dir_all(&output_dir)?;

    let series = load_price_csv(&input)?;
    let overview = series_diagnostics(series.values());
    println!(
        "Loaded {} rows from {} to {}: min={:.2}, max={:.2}, mean={:.2}, std={:.2}",
        overview.n_rows,
        series.first_timestamp(),
        series.last_timestamp(),
        overview.min,
        overview.max,
        overview.mean,
        overview.std_dev
    );

    let config = ChangePointSamplerConfig::default();
    let report = fit_change_point(&series, config)?;
    let summary = &report.summary;

    println!("{}", render_summary_table(summary, config.summary.max_r_hat));
    if let Some((before, after)) = summary.segments(&series) {
        println!(
            "Before: {} to {}, mean level {:.2}",
            before.start, before.end, before.level
        );
        if let Some(after) = after {
            println!(
                "After:  {} to {}, mean level {:.2}",
                after.start, after.end, after.level
            );
        }
    }

    write_summary_csv(summary, BufWriter::new(File::create(output_dir.join("summary.csv"))?))?;
    write_derived_csv(summary, BufWriter::new(File::create(output_dir.join("derived.csv"))?))?;
    write_series_csv(&series, BufWriter::new(File::create(output_dir.join("series.csv"))?))?;
    println!("Reports written to {}", output_dir.display());

    Ok(())
}
