//! Robust regression and dispersion statistics for price series.

use ordered_float::OrderedFloat;
use statrs::statistics::Statistics;

/// Least-squares fit of `y` against `x`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LinearFit {
    /// Slope `Sxy / Sxx`.
    pub slope: f64,
    /// Coefficient of determination `Sxy² / (Sxx·Syy)`.
    pub r2: f64,
}

/// Ordinary least squares of `ys` on `xs`.
///
/// Degenerate inputs (fewer than two points, or zero variance in either
/// coordinate) yield a zero fit instead of NaN.
pub fn linear_fit(xs: &[f64], ys: &[f64]) -> LinearFit {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return LinearFit::default();
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);

    let mean_x = xs.iter().mean();
    let mean_y = ys.iter().mean();

    let mut sxx = 0.0;
    let mut syy = 0.0;
    let mut sxy = 0.0;
    for (&x, &y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }

    if sxx == 0.0 || syy == 0.0 {
        return LinearFit::default();
    }

    LinearFit {
        slope: sxy / sxx,
        r2: (sxy * sxy) / (sxx * syy),
    }
}

/// Clamp every value into the `[lower, upper]` percentile band.
///
/// Bounds are picked by index from the sorted values:
/// `sorted[floor(lower·n)]` and `sorted[min(n-1, floor(upper·n))]`. No point
/// is removed.
pub fn winsorize(values: &[f64], lower: f64, upper: f64) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }

    let mut sorted: Vec<OrderedFloat<f64>> = values.iter().copied().map(OrderedFloat).collect();
    sorted.sort_unstable();

    let lo_idx = ((lower * n as f64).floor() as usize).min(n - 1);
    let hi_idx = ((upper * n as f64).floor() as usize).min(n - 1);
    let lo = sorted[lo_idx].0;
    let hi = sorted[hi_idx].0;

    values.iter().map(|&v| v.max(lo).min(hi)).collect()
}

/// Sample standard deviation over mean.
///
/// Zero for fewer than two values or a zero mean.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().mean();
    if mean == 0.0 || !mean.is_finite() {
        return 0.0;
    }
    values.iter().std_dev() / mean
}

/// Counts of strict increases and decreases between adjacent values.
pub fn count_moves(values: &[f64]) -> (u32, u32) {
    values.windows(2).fold((0, 0), |(ups, downs), w| {
        if w[1] > w[0] {
            (ups + 1, downs)
        } else if w[1] < w[0] {
            (ups, downs + 1)
        } else {
            (ups, downs)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_perfect_line() {
        let xs: Vec<f64> = (0..10).map(f64::from).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 2.0 * x + 1.0).collect();
        let fit = linear_fit(&xs, &ys);
        assert_abs_diff_eq!(fit.slope, 2.0, epsilon = 1e-10);
        assert_abs_diff_eq!(fit.r2, 1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_degenerate_fits_are_zero() {
        // Constant y.
        assert_eq!(linear_fit(&[0.0, 1.0, 2.0], &[5.0, 5.0, 5.0]), LinearFit::default());
        // Constant x.
        assert_eq!(linear_fit(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]), LinearFit::default());
        // Single point.
        assert_eq!(linear_fit(&[0.0], &[3.0]), LinearFit::default());
    }

    #[test]
    fn test_noisy_fit_has_partial_r2() {
        let xs = [0.0, 1.0, 2.0, 3.0, 4.0];
        let ys = [1.0, 3.0, 2.0, 5.0, 4.0];
        let fit = linear_fit(&xs, &ys);
        // Sxy = 8, Sxx = 10, Syy = 10
        assert_abs_diff_eq!(fit.slope, 0.8, epsilon = 1e-12);
        assert_abs_diff_eq!(fit.r2, 0.64, epsilon = 1e-12);
    }

    #[test]
    fn test_winsorize_clamps_spike() {
        let mut values: Vec<f64> = (1..=20).map(f64::from).collect();
        values[10] = 1_000.0;
        let w = winsorize(&values, 0.05, 0.95);
        // n = 20: lo = sorted[1] = 2, hi = sorted[19] = 1000 (the spike itself).
        assert_eq!(w[0], 2.0);
        assert_eq!(w[10], 1_000.0);

        let w = winsorize(&values, 0.05, 0.90);
        // hi = sorted[18] = 20
        assert_eq!(w[10], 20.0);
        assert_eq!(w.len(), values.len());
    }

    #[test]
    fn test_winsorize_small_series_is_identity() {
        let values = [3.0, 1.0, 2.0];
        // n = 3: lo = sorted[0], hi = sorted[2]
        assert_eq!(winsorize(&values, 0.05, 0.95), values.to_vec());
        assert!(winsorize(&[], 0.05, 0.95).is_empty());
    }

    #[test]
    fn test_coefficient_of_variation() {
        // mean 5, sample sd sqrt(32/7)
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let expected = (32.0_f64 / 7.0).sqrt() / 5.0;
        assert_abs_diff_eq!(coefficient_of_variation(&values), expected, epsilon = 1e-12);
        assert_eq!(coefficient_of_variation(&[4.0]), 0.0);
        assert_eq!(coefficient_of_variation(&[-1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_count_moves() {
        assert_eq!(count_moves(&[1.0, 2.0, 2.0, 1.0, 3.0]), (2, 1));
        assert_eq!(count_moves(&[1.0]), (0, 0));
    }
}
