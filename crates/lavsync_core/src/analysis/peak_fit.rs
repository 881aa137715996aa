//! Peak picking and parabolic refinement.
//!
//! Uses quadratic interpolation across the peak and its two neighbors to
//! find the true maximum with sub-lag precision.

/// Refined peak location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakFit {
    /// Fractional correction in [-1, 1], relative to the discrete peak.
    pub delta: f64,
    /// Interpolated peak value.
    pub value: f64,
}

/// Index of the first maximum among finite values in `values[lo..=hi]`.
pub fn find_peak(values: &[f64], lo: usize, hi: usize) -> Option<usize> {
    if values.is_empty() || lo > hi || hi >= values.len() {
        return None;
    }

    let mut best: Option<usize> = None;
    for (i, &v) in values.iter().enumerate().take(hi + 1).skip(lo) {
        if !v.is_finite() {
            continue;
        }
        match best {
            Some(b) if values[b] >= v => {}
            _ => best = Some(i),
        }
    }
    best
}

/// Fit a parabola through the peak and its neighbors.
///
/// Returns None at the array edges or when the three points are not concave.
pub fn fit_peak(values: &[f64], peak_index: usize) -> Option<PeakFit> {
    if peak_index == 0 || peak_index + 1 >= values.len() {
        return None;
    }

    let y0 = values[peak_index - 1];
    let y1 = values[peak_index];
    let y2 = values[peak_index + 1];
    if !(y0.is_finite() && y1.is_finite() && y2.is_finite()) {
        return None;
    }

    // y = a x^2 + b x + c through (-1, y0), (0, y1), (1, y2)
    let a = (y0 + y2) / 2.0 - y1;
    let b = (y2 - y0) / 2.0;

    if a >= -1e-12 {
        return None;
    }

    let delta = (-b / (2.0 * a)).clamp(-1.0, 1.0);
    let value = y1 - (b * b) / (4.0 * a);

    Some(PeakFit { delta, value })
}
