//! Summary statistics and cross-validation helpers shared by the
//! preprocessor and the trainer.

/// Arithmetic mean. Returns NaN on empty input so the caller's
/// missing-value invariants can catch degenerate columns.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (ddof = 0).
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Linear-interpolation quantile, `q` in [0, 1]. Sorts a copy of the input.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    assert!((0.0..=1.0).contains(&q), "quantile requires q in [0, 1]");
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let h = (sorted.len() - 1) as f64 * q;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (h - lo as f64)
}

pub fn median(values: &[f64]) -> f64 {
    quantile(values, 0.5)
}

/// Coefficient of determination. A constant-target fold yields 0.0 rather
/// than a division by zero.
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    assert_eq!(
        y_true.len(),
        y_pred.len(),
        "r2_score requires equal length inputs"
    );
    let y_mean = mean(y_true);
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p) * (t - p))
        .sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - y_mean) * (t - y_mean)).sum();
    if ss_tot == 0.0 {
        return 0.0;
    }
    1.0 - ss_res / ss_tot
}

/// Consecutive k-fold indices over `n` samples: for each fold, the
/// (train, test) row index pair. The first `n % k` folds take the extra row.
pub fn k_fold_indices(n: usize, k: usize) -> Vec<(Vec<usize>, Vec<usize>)> {
    assert!(k >= 2, "k-fold requires at least 2 folds");
    assert!(n >= k, "k-fold requires at least as many samples as folds");
    let base = n / k;
    let rem = n % k;

    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for fold in 0..k {
        let size = base + usize::from(fold < rem);
        let test: Vec<usize> = (start..start + size).collect();
        let train: Vec<usize> = (0..n).filter(|i| *i < start || *i >= start + size).collect();
        folds.push((train, test));
        start += size;
    }
    folds
}
