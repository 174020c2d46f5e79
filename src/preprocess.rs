use crate::utils::{mean, usize_to_f64};

/// Overview of a raw value column before it is validated into a `TimeSeries`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesDiagnostics {
    pub n_rows: usize,
    pub n_finite: usize,
    pub n_non_finite: usize,
    pub n_non_positive: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub non_positive_share: f64,
}

#[must_use]
pub fn series_diagnostics(values: &[f64]) -> SeriesDiagnostics {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let n_finite = finite.len();
    let n_non_positive = finite.iter().filter(|v| **v <= 0.0).count();

    let (min, max) = finite
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        });
    let center = mean(&finite);
    let std_dev = if n_finite > 0 {
        (finite
            .iter()
            .map(|v| (v - center) * (v - center))
            .sum::<f64>()
            / usize_to_f64(n_finite))
        .sqrt()
    } else {
        f64::NAN
    };
    let non_positive_share = if n_finite > 0 {
        usize_to_f64(n_non_positive) / usize_to_f64(n_finite)
    } else {
        0.0
    };

    SeriesDiagnostics {
        n_rows: values.len(),
        n_finite,
        n_non_finite: values.len().saturating_sub(n_finite),
        n_non_positive,
        min: if n_finite > 0 { min } else { f64::NAN },
        max: if n_finite > 0 { max } else { f64::NAN },
        mean: center,
        std_dev,
        non_positive_share,
    }
}

/// Log returns `ln(v[i]) - ln(v[i - 1])`.
///
/// The first entry is `None`, as is any entry touching a non-positive or non-finite value.
#[must_use]
pub fn log_returns(values: &[f64]) -> Vec<Option<f64>> {
    let mut returns = Vec::with_capacity(values.len());
    if values.is_empty() {
        return returns;
    }
    returns.push(None);
    for pair in values.windows(2) {
        let (previous, current) = (pair[0], pair[1]);
        let valid = previous > 0.0 && current > 0.0 && previous.is_finite() && current.is_finite();
        returns.push(valid.then(|| current.ln() - previous.ln()));
    }
    returns
}
