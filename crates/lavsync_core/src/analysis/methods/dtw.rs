//! Multi-scale dynamic time warping on cepstral features.
//!
//! The reference cepstra are aligned against the co-located segment of the
//! other bundle (same source time, same length). The warping path's mean
//! diagonal displacement gives the residual offset. Alignment runs coarse to
//! fine; each scale average-pools the cepstra by its factor, and scales that
//! disagree lower the confidence.

use crate::analysis::types::FeatureBundle;
use crate::models::AlgorithmKind;

use super::{lag_to_offset, AbstainReason, AlgorithmResult, RunContext, SyncAlgorithm};

const DIAGONAL: u8 = 0;
const UP: u8 = 1;
const LEFT: u8 = 2;

/// Outcome of one warping pass.
#[derive(Debug, Clone, Copy, PartialEq)]
struct WarpPath {
    /// Mean `j - i` along the path, in pooled frames.
    mean_offset: f64,
    /// Accumulated cost at the end cell.
    end_cost: f64,
}

/// DTW estimator.
#[derive(Debug, Clone)]
pub struct DtwAlignment {
    /// Slope constraint: interior cells satisfy `i / slope <= j <= i * slope`.
    slope: usize,
    /// End cost at which confidence reaches zero.
    cost_scale: f64,
    /// Scales with fewer pooled frames than this are skipped.
    min_frames: usize,
    /// Reference cepstra closer than this to their mean, on average, carry
    /// nothing to align.
    min_spread: f64,
}

impl DtwAlignment {
    pub fn new() -> Self {
        Self {
            slope: 2,
            cost_scale: 10.0,
            min_frames: 8,
            min_spread: 0.5,
        }
    }

    /// Align `x` against `y`. Returns None if the end cell is unreachable.
    fn warp(&self, x: &[Vec<f64>], y: &[Vec<f64>]) -> Option<WarpPath> {
        let n = x.len();
        let m = y.len();
        if n == 0 || m == 0 {
            return None;
        }

        // Two rolling cost rows plus one direction byte per cell.
        let mut directions = vec![LEFT; n * m];
        let mut prev = vec![f64::INFINITY; m];
        let mut curr = vec![f64::INFINITY; m];

        prev[0] = euclidean(&x[0], &y[0]);
        for j in 1..m {
            prev[j] = prev[j - 1] + euclidean(&x[0], &y[j]);
        }

        for i in 1..n {
            curr.fill(f64::INFINITY);
            curr[0] = prev[0] + euclidean(&x[i], &y[0]);
            directions[i * m] = UP;

            let lo = (i / self.slope).max(1);
            let hi = (i * self.slope).min(m - 1);
            for j in lo..=hi {
                let diag = prev[j - 1];
                let up = prev[j];
                let left = curr[j - 1];

                let (best, dir) = if diag <= up && diag <= left {
                    (diag, DIAGONAL)
                } else if up <= left {
                    (up, UP)
                } else {
                    (left, LEFT)
                };
                if best.is_finite() {
                    curr[j] = best + euclidean(&x[i], &y[j]);
                    directions[i * m + j] = dir;
                }
            }
            std::mem::swap(&mut prev, &mut curr);
        }

        let end_cost = prev[m - 1];
        if !end_cost.is_finite() {
            return None;
        }

        let (mut i, mut j) = (n - 1, m - 1);
        let mut displacement = 0.0;
        let mut steps = 0usize;
        loop {
            displacement += j as f64 - i as f64;
            steps += 1;
            if i == 0 && j == 0 {
                break;
            }
            if i == 0 {
                j -= 1;
                continue;
            }
            if j == 0 {
                i -= 1;
                continue;
            }
            match directions[i * m + j] {
                DIAGONAL => {
                    i -= 1;
                    j -= 1;
                }
                UP => i -= 1,
                _ => j -= 1,
            }
        }

        Some(WarpPath {
            mean_offset: displacement / steps as f64,
            end_cost,
        })
    }
}

impl Default for DtwAlignment {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncAlgorithm for DtwAlignment {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Dtw
    }

    fn description(&self) -> &str {
        "Multi-scale dynamic time warping on cepstral features"
    }

    fn run(
        &self,
        reference: &FeatureBundle,
        other: &FeatureBundle,
        ctx: &RunContext<'_>,
    ) -> AlgorithmResult {
        let kind = self.kind();
        if !reference.has_cepstra() || !other.has_cepstra() {
            return AlgorithmResult::abstain(kind, AbstainReason::EmptyFeatures);
        }
        if reference.is_silent() || other.is_silent() {
            return AlgorithmResult::abstain(kind, AbstainReason::Silent);
        }

        let Some((r0, o0, len)) = co_located(reference, other) else {
            return AlgorithmResult::abstain(kind, AbstainReason::EmptyFeatures);
        };
        let x = &reference.mfcc[r0..r0 + len];
        let y = &other.mfcc[o0..o0 + len];
        if len < self.min_frames {
            return AlgorithmResult::abstain(kind, AbstainReason::EmptyFeatures);
        }
        let spread = cepstral_spread(x);
        if spread < self.min_spread {
            tracing::debug!("dtw: reference cepstra spread {:.3} is too flat", spread);
            return AlgorithmResult::abstain(kind, AbstainReason::FlatReference);
        }

        let mut offsets = Vec::new();
        let mut confidences = Vec::new();
        let mut running_mean = 0.0;
        let mut attempted = false;

        for &scale in ctx.quality.dtw_scales() {
            if ctx.checkpoint.check().is_err() {
                return AlgorithmResult::abstain(kind, AbstainReason::Interrupted);
            }

            let xs = pool(x, scale);
            let ys = pool(y, scale);
            if xs.len() < self.min_frames || ys.len() < self.min_frames {
                continue;
            }
            attempted = true;

            let Some(path) = self.warp(&xs, &ys) else {
                tracing::debug!("dtw: end cell unreachable at scale {}", scale);
                continue;
            };

            let offset_frames = path.mean_offset * scale as f64;
            offsets.push(offset_frames);
            confidences.push((1.0 - path.end_cost / self.cost_scale).max(0.0));
            running_mean += (offset_frames - running_mean) / offsets.len() as f64;

            tracing::debug!(
                "dtw: scale {} offset {:.2} frames, cost {:.3}",
                scale,
                offset_frames,
                path.end_cost
            );
        }

        if !attempted {
            return AlgorithmResult::abstain(kind, AbstainReason::EmptyFeatures);
        }
        if offsets.is_empty() {
            return AlgorithmResult::abstain(kind, AbstainReason::Unreachable);
        }

        let count = offsets.len() as f64;
        let mean_confidence = confidences.iter().sum::<f64>() / count;
        let variance = offsets
            .iter()
            .map(|o| (o - running_mean).powi(2))
            .sum::<f64>()
            / count;
        let confidence = mean_confidence / (1.0 + variance);
        if confidence <= 0.0 {
            return AlgorithmResult::abstain(kind, AbstainReason::CostTooHigh);
        }

        let lag = (o0 as f64 - r0 as f64) + running_mean;
        AlgorithmResult::estimate(kind, lag_to_offset(reference, other, lag), confidence)
    }
}

/// Index ranges of the reference and the other bundle covering the same
/// source time: `(reference_start, other_start, length)`.
fn co_located(reference: &FeatureBundle, other: &FeatureBundle) -> Option<(usize, usize, usize)> {
    let hop = reference.hop_seconds();
    if hop <= 0.0 {
        return None;
    }
    let shift = ((reference.start_seconds - other.start_seconds) / hop).round() as isize;
    let r0 = (-shift).max(0) as usize;
    let o0 = shift.max(0) as usize;

    let n1 = reference.mfcc.len();
    let n2 = other.mfcc.len();
    if r0 >= n1 || o0 >= n2 {
        return None;
    }
    Some((r0, o0, (n1 - r0).min(n2 - o0)))
}

/// Average consecutive groups of `factor` vectors. A partial tail group is
/// dropped.
fn pool(frames: &[Vec<f64>], factor: usize) -> Vec<Vec<f64>> {
    if factor <= 1 {
        return frames.to_vec();
    }
    frames
        .chunks_exact(factor)
        .map(|group| {
            let dims = group.iter().map(Vec::len).min().unwrap_or(0);
            (0..dims)
                .map(|d| group.iter().map(|v| v[d]).sum::<f64>() / factor as f64)
                .collect()
        })
        .collect()
}

/// Mean distance of each frame from the mean frame.
fn cepstral_spread(frames: &[Vec<f64>]) -> f64 {
    let Some(dims) = frames.iter().map(Vec::len).min() else {
        return 0.0;
    };
    let n = frames.len() as f64;
    let mean: Vec<f64> = (0..dims)
        .map(|d| frames.iter().map(|v| v[d]).sum::<f64>() / n)
        .collect();
    frames.iter().map(|v| euclidean(v, &mean)).sum::<f64>() / n
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}
