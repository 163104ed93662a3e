/// Trailing mean over a fixed window.
///
/// Output has `max(0, n - window + 1)` entries; entry `i` averages
/// `values[i..i + window]`. A window containing a missing value yields a
/// missing value.
pub fn moving_average(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    if window == 0 || values.len() < window {
        return Vec::new();
    }
    values
        .windows(window)
        .map(|w| {
            w.iter()
                .copied()
                .sum::<Option<f64>>()
                .map(|sum| sum / window as f64)
        })
        .collect()
}

const NICE_STEPS: [f64; 5] = [1.0, 2.0, 2.5, 5.0, 10.0];

/// Tick positions over `[lo, hi]` using at most `max_bins` intervals whose
/// width is a nice number (1, 2, 2.5 or 5 times a power of ten).
///
/// With `integer` set, only integral steps are used and the step never drops
/// below one, so every tick lands on a category index.
pub fn nice_ticks(lo: f64, hi: f64, max_bins: usize, integer: bool) -> Vec<f64> {
    if !lo.is_finite() || !hi.is_finite() || hi < lo {
        return Vec::new();
    }
    if hi == lo || max_bins == 0 {
        return vec![lo];
    }

    let raw = (hi - lo) / max_bins as f64;
    let scale = 10f64.powf(raw.log10().floor());
    let mut step = NICE_STEPS
        .iter()
        .map(|m| m * scale)
        .filter(|step| !integer || step.fract() == 0.0)
        .find(|step| *step >= raw * (1.0 - 1e-9))
        .unwrap_or(10.0 * scale);
    if integer {
        step = step.max(1.0).round();
    }

    let first = (lo / step).ceil();
    let last = (hi / step + 1e-9).floor();
    (first as i64..=last as i64)
        .map(|i| i as f64 * step)
        .collect()
}
