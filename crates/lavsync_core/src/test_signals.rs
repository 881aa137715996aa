//! Deterministic synthetic signals for tests.

use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn samples_for(seconds: f64, sample_rate: u32) -> usize {
    (seconds * sample_rate as f64).round() as usize
}

/// Constant-amplitude sine.
pub fn tone(freq: f64, seconds: f64, sample_rate: u32, amplitude: f64) -> Vec<f64> {
    let sr = sample_rate as f64;
    (0..samples_for(seconds, sample_rate))
        .map(|i| amplitude * (2.0 * PI * freq * i as f64 / sr).sin())
        .collect()
}

pub fn silence(seconds: f64, sample_rate: u32) -> Vec<f64> {
    vec![0.0; samples_for(seconds, sample_rate)]
}

/// Uniform white noise in [-amplitude, amplitude].
pub fn noise(seconds: f64, sample_rate: u32, amplitude: f64, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..samples_for(seconds, sample_rate))
        .map(|_| rng.gen_range(-amplitude..=amplitude))
        .collect()
}

/// Syllable-like voiced bursts separated by short pauses over a faint
/// noise floor.
pub fn speech(seconds: f64, sample_rate: u32, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let sr = sample_rate as f64;
    let mut out: Vec<f64> = (0..samples_for(seconds, sample_rate))
        .map(|_| rng.gen_range(-0.002..=0.002))
        .collect();

    let mut t = rng.gen_range(0.05..0.3);
    while t < seconds {
        let dur: f64 = rng.gen_range(0.12..0.35);
        let f0: f64 = rng.gen_range(100.0..220.0);
        let level: f64 = rng.gen_range(0.25..0.6);
        let f1: f64 = rng.gen_range(300.0..800.0);
        let f2: f64 = rng.gen_range(900.0..2200.0);
        let fricative = rng.gen_bool(0.25);

        let start = samples_for(t, sample_rate);
        let len = samples_for(dur, sample_rate);
        for n in 0..len {
            let idx = start + n;
            if idx >= out.len() {
                break;
            }
            let tau = n as f64 / sr;
            let env = (PI * tau / dur).sin();
            let mut voiced = 0.0;
            for h in 1..=12 {
                let f = f0 * h as f64;
                let gain = (-((f - f1) / 300.0).powi(2)).exp()
                    + 0.5 * (-((f - f2) / 500.0).powi(2)).exp()
                    + 0.05 / h as f64;
                voiced += gain * (2.0 * PI * f * tau).sin();
            }
            let mut sample = 0.3 * voiced;
            if fricative && tau < 0.05 {
                sample += rng.gen_range(-0.3..=0.3);
            }
            out[idx] += level * env * sample;
        }

        t += dur + rng.gen_range(0.08..0.4);
    }

    normalize_peak(&mut out, 0.9);
    out
}

/// Percussive hits (kick, snare, hat) on a jittered eighth-note grid over a
/// quiet chord pad. Hit presence and level are random, so the pattern does
/// not repeat.
pub fn music(seconds: f64, sample_rate: u32, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let sr = sample_rate as f64;
    let total = samples_for(seconds, sample_rate);

    // Pad: three partials, chord changes every two seconds
    let roots = [220.0, 196.0, 247.0, 175.0];
    let mut out: Vec<f64> = (0..total)
        .map(|i| {
            let t = i as f64 / sr;
            let root = roots[((t / 2.0) as usize) % roots.len()];
            0.03 * ((2.0 * PI * root * t).sin()
                + (2.0 * PI * root * 1.26 * t).sin()
                + (2.0 * PI * root * 1.5 * t).sin())
        })
        .collect();

    // 100 bpm eighth notes
    let step = 0.3;
    let mut beat = 0.1;
    while beat < seconds {
        if rng.gen_bool(0.75) {
            let onset = beat + rng.gen_range(-0.015..0.015);
            let level: f64 = rng.gen_range(0.3..0.9);
            let kind = rng.gen_range(0..3);
            let start = samples_for(onset.max(0.0), sample_rate);

            let (decay, len) = match kind {
                0 => (0.08, 0.25),
                1 => (0.1, 0.3),
                _ => (0.03, 0.1),
            };
            for n in 0..samples_for(len, sample_rate) {
                let idx = start + n;
                if idx >= total {
                    break;
                }
                let tau = n as f64 / sr;
                let env = (-tau / decay).exp();
                let body = match kind {
                    0 => (2.0 * PI * (60.0 + 60.0 * (-tau / 0.02).exp()) * tau).sin(),
                    1 => 0.6 * rng.gen_range(-1.0..=1.0) + 0.4 * (2.0 * PI * 190.0 * tau).sin(),
                    _ => 0.5 * rng.gen_range(-1.0..=1.0),
                };
                out[idx] += level * env * body;
            }
        }
        beat += step;
    }

    normalize_peak(&mut out, 0.9);
    out
}

/// Delay a signal: positive `seconds` prepends silence, negative drops the
/// leading samples.
pub fn shift(signal: &[f64], seconds: f64, sample_rate: u32) -> Vec<f64> {
    let n = samples_for(seconds.abs(), sample_rate);
    if seconds >= 0.0 {
        let mut out = vec![0.0; n];
        out.extend_from_slice(signal);
        out
    } else {
        signal[n.min(signal.len())..].to_vec()
    }
}

fn normalize_peak(samples: &mut [f64], target: f64) {
    let peak = samples.iter().fold(0.0f64, |m, s| m.max(s.abs()));
    if peak > target {
        let gain = target / peak;
        for s in samples.iter_mut() {
            *s *= gain;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generators_are_deterministic_and_bounded() {
        assert_eq!(speech(2.0, 8000, 1), speech(2.0, 8000, 1));
        assert_eq!(music(2.0, 8000, 1), music(2.0, 8000, 1));
        for s in speech(5.0, 8000, 3).into_iter().chain(music(5.0, 8000, 3)) {
            assert!(s.is_finite() && s.abs() <= 1.0);
        }
    }

    #[test]
    fn shift_prepends_or_drops() {
        let signal = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(shift(&signal, 2.0, 1), vec![0.0, 0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(shift(&signal, -1.0, 1), vec![2.0, 3.0, 4.0]);
    }
}
