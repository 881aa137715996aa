//! Lag-domain correlation helpers shared by the envelope and spectral
//! estimators.
//!
//! Lags follow one convention throughout: lag `s` pairs `a[k]` with
//! `b[k + s]`. Arrays indexed by lag store lag `s` at `s + (len(a) - 1)`.

use rustfft::num_complex::Complex;

use super::fft::FftCache;

/// Raw lag products `R[s] = sum_k a[k] * b[k + s]` for every lag, via FFT.
///
/// Both inputs are zero-padded to the next power of two of
/// `len(a) + len(b) - 1` (times `padding`), so there is no circular wrap.
pub fn fft_cross_correlation(fft: &FftCache, a: &[f64], b: &[f64], padding: usize) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }

    let n1 = a.len();
    let n2 = b.len();
    let correlation_len = n1 + n2 - 1;
    let fft_len = correlation_len.next_power_of_two() * padding.max(1);

    let forward = fft.forward(fft_len);
    let inverse = fft.inverse(fft_len);

    let mut a_spec: Vec<Complex<f64>> = a.iter().map(|&x| Complex::new(x, 0.0)).collect();
    a_spec.resize(fft_len, Complex::new(0.0, 0.0));
    let mut b_spec: Vec<Complex<f64>> = b.iter().map(|&x| Complex::new(x, 0.0)).collect();
    b_spec.resize(fft_len, Complex::new(0.0, 0.0));

    forward.process(&mut a_spec);
    forward.process(&mut b_spec);

    // c[n] = sum_k a[k + n] * b[k], i.e. c[n] = R[-n]
    let mut product: Vec<Complex<f64>> = a_spec
        .iter()
        .zip(b_spec.iter())
        .map(|(x, y)| x * y.conj())
        .collect();
    inverse.process(&mut product);

    let scale = 1.0 / fft_len as f64;
    (0..correlation_len)
        .map(|idx| {
            let lag = idx as isize - (n1 as isize - 1);
            let circular = (-lag).rem_euclid(fft_len as isize) as usize;
            product[circular].re * scale
        })
        .collect()
}

/// Range `[k0, k1)` of `a` indices that overlap `b` at lag `lag`.
pub fn overlap(n1: usize, n2: usize, lag: isize) -> (usize, usize) {
    let k0 = (-lag).max(0) as usize;
    let k1 = (n2 as isize - lag).clamp(0, n1 as isize) as usize;
    (k0, k1.max(k0))
}

/// Inclusive lag range whose overlap is at least `min_overlap` samples.
pub fn lag_range(n1: usize, n2: usize, min_overlap: usize) -> Option<(isize, isize)> {
    let min_overlap = min_overlap.max(1);
    if n1 < min_overlap || n2 < min_overlap {
        return None;
    }
    Some((
        min_overlap as isize - n1 as isize,
        n2 as isize - min_overlap as isize,
    ))
}

/// Prefix sums of values and squared values.
#[derive(Debug, Clone)]
pub struct PrefixSums {
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
}

impl PrefixSums {
    pub fn new(values: &[f64]) -> Self {
        let mut sum = Vec::with_capacity(values.len() + 1);
        let mut sum_sq = Vec::with_capacity(values.len() + 1);
        sum.push(0.0);
        sum_sq.push(0.0);
        for &v in values {
            sum.push(sum[sum.len() - 1] + v);
            sum_sq.push(sum_sq[sum_sq.len() - 1] + v * v);
        }
        Self { sum, sum_sq }
    }

    /// (sum, sum of squares) over `[lo, hi)`.
    pub fn range(&self, lo: usize, hi: usize) -> (f64, f64) {
        (self.sum[hi] - self.sum[lo], self.sum_sq[hi] - self.sum_sq[lo])
    }
}

/// Pearson correlation from raw sums over `n` paired samples.
///
/// Returns 0 when either side has no variance.
pub fn pearson_from_sums(cross: f64, n: usize, a: (f64, f64), b: (f64, f64)) -> f64 {
    if n < 2 {
        return 0.0;
    }
    let n = n as f64;
    let (sa, qa) = a;
    let (sb, qb) = b;

    let cov = cross - sa * sb / n;
    let var_a = qa - sa * sa / n;
    let var_b = qb - sb * sb / n;

    // Relative floor keeps rounding noise on flat segments from scoring.
    let floor_a = 1e-9 * qa.abs().max(f64::MIN_POSITIVE);
    let floor_b = 1e-9 * qb.abs().max(f64::MIN_POSITIVE);
    if var_a <= floor_a || var_b <= floor_b {
        return 0.0;
    }

    (cov / (var_a * var_b).sqrt()).clamp(-1.0, 1.0)
}

/// Coefficient of variation (std / mean). Zero for empty or non-positive
/// mean input.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean <= f64::EPSILON {
        return 0.0;
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    var.sqrt() / mean
}
