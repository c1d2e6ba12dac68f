//! Per-channel energy normalization for the `pcen_mel` representation.
//!
//! The smoothing constants are fixed for this dataset family: eps 1e-10,
//! gain 0.7, bias 0, compression power 0.125, time constant 0.25 s.

use ndarray::Array2;

const EPS: f32 = 1e-10;
const GAIN: f32 = 0.7;
const BIAS: f32 = 0.0;
const POWER: f32 = 0.125;
const TIME_CONSTANT: f32 = 0.25;

/// Apply PCEN to an amplitude mel spectrogram of shape (n_mels, n_frames).
///
/// The per-band smoother M is a one-pole IIR along time, seeded with the
/// first frame; its coefficient is derived from the time constant and the
/// frame rate `sample_rate / hop_length`.
pub fn pcen(spec: &Array2<f32>, sample_rate: u32, hop_length: usize) -> Array2<f32> {
    let t_frames = TIME_CONSTANT * sample_rate as f32 / hop_length as f32;
    let b = ((1.0 + 4.0 * t_frames * t_frames).sqrt() - 1.0) / (2.0 * t_frames * t_frames);

    let (n_mels, n_frames) = spec.dim();
    let mut out = Array2::<f32>::zeros((n_mels, n_frames));

    for m in 0..n_mels {
        let mut smoothed = 0.0f32;
        for t in 0..n_frames {
            let s = spec[[m, t]];
            smoothed = if t == 0 { s } else { (1.0 - b) * smoothed + b * s };
            let normalized = s / (EPS + smoothed).powf(GAIN);
            out[[m, t]] = (BIAS + normalized).powf(POWER) - BIAS.powf(POWER);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_is_finite_and_nonnegative() {
        let spec = Array2::from_shape_fn((8, 32), |(m, t)| ((m + 1) * (t + 1)) as f32 * 1e-3);
        let out = pcen(&spec, 16000, 160);
        assert_eq!(out.dim(), (8, 32));
        assert!(out.iter().all(|v| v.is_finite() && *v >= 0.0));
    }

    #[test]
    fn silence_stays_near_zero() {
        let spec = Array2::<f32>::zeros((4, 16));
        let out = pcen(&spec, 16000, 160);
        assert!(out.iter().all(|&v| v.abs() < 1e-3));
    }

    #[test]
    fn constant_signal_normalizes_towards_unity_compression() {
        // With a constant input the smoother converges to the signal, so the
        // normalized value approaches s / s^gain = s^(1-gain), compressed.
        let s = 2.0f32;
        let spec = Array2::from_elem((1, 400), s);
        let out = pcen(&spec, 16000, 160);
        let expected = s.powf(1.0 - GAIN).powf(POWER);
        let last = out[[0, 399]];
        assert!((last - expected).abs() < 1e-2, "last {last} expected {expected}");
    }
}
