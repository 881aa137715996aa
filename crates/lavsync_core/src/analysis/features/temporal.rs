//! Time-domain frame features.

/// Root-mean-square level of a frame.
pub fn frame_energy(frame: &[f64]) -> f64 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = frame.iter().map(|x| x * x).sum();
    (sum_sq / frame.len() as f64).sqrt()
}

/// Sign changes in a frame divided by the frame length.
///
/// Zero counts as positive, so digital silence has no crossings.
pub fn zero_crossing_rate(frame: &[f64]) -> f64 {
    if frame.len() < 2 {
        return 0.0;
    }
    let crossings = frame
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    crossings as f64 / frame.len() as f64
}
