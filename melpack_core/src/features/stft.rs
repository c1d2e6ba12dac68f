//! Short-time Fourier transform with centered frames and reflect padding,
//! matching the usual analysis convention: frame t is centered on sample
//! `t * hop_length`, so a clip of N samples yields `N / hop_length + 1` frames.

use ndarray::Array2;
use realfft::{RealFftPlanner, RealToComplex};
use std::f32::consts::PI;
use std::sync::Arc;

use crate::config::WindowKind;

/// Periodic analysis windows of length `win_length`.
pub fn make_window(kind: WindowKind, win_length: usize) -> Vec<f32> {
    use WindowKind::*;
    let n = win_length as f32;
    (0..win_length)
        .map(|i| {
            let x = 2.0 * PI * i as f32 / n;
            match kind {
                Hann => 0.5 - 0.5 * x.cos(),
                Hamming => 0.54 - 0.46 * x.cos(),
                Blackman => 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos(),
                Rectangular => 1.0,
            }
        })
        .collect()
}

/// A reusable STFT plan for one (n_fft, hop, window) combination.
pub struct Stft {
    n_fft: usize,
    hop_length: usize,
    fft: Arc<dyn RealToComplex<f32>>,
    /// Window padded to n_fft, centered.
    window: Vec<f32>,
}

impl Stft {
    pub fn new(n_fft: usize, hop_length: usize, win_length: usize, kind: WindowKind) -> Self {
        let mut planner = RealFftPlanner::new();
        let fft = planner.plan_fft_forward(n_fft);

        let short = make_window(kind, win_length);
        let mut window = vec![0.0f32; n_fft];
        let lpad = (n_fft - win_length) / 2;
        window[lpad..lpad + win_length].copy_from_slice(&short);

        Self { n_fft, hop_length, fft, window }
    }

    pub fn n_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    pub fn n_frames(&self, n_samples: usize) -> usize {
        n_samples / self.hop_length + 1
    }

    /// Magnitude spectrogram raised to `power`, shape (n_bins, n_frames).
    pub fn spectrogram(&self, samples: &[f32], power: f32) -> Array2<f32> {
        let n_bins = self.n_bins();
        let n_frames = self.n_frames(samples.len());
        let pad = self.n_fft / 2;

        let mut out = Array2::<f32>::zeros((n_bins, n_frames));
        let mut input = vec![0.0f32; self.n_fft];
        let mut spectrum = self.fft.make_output_vec();

        for frame in 0..n_frames {
            let start = frame as isize * self.hop_length as isize - pad as isize;
            for i in 0..self.n_fft {
                let idx = reflect(start + i as isize, samples.len());
                input[i] = samples[idx] * self.window[i];
            }

            // Lengths match the plan by construction.
            self.fft
                .process(&mut input, &mut spectrum)
                .expect("fft buffer lengths match plan");

            for (bin, c) in spectrum.iter().enumerate() {
                out[[bin, frame]] = c.norm_sqr().powf(power / 2.0);
            }
        }

        out
    }
}

/// Mirror an out-of-range index back into `0..len` without repeating the
/// edge sample (numpy "reflect" padding).
fn reflect(idx: isize, len: usize) -> usize {
    if len <= 1 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let mut x = idx.rem_euclid(period);
    if x >= len as isize {
        x = period - x;
    }
    x as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WindowKind;

    #[test]
    fn reflect_mirrors_without_edge_repeat() {
        // len 5 -> pattern ... 2 1 [0 1 2 3 4] 3 2 ...
        assert_eq!(reflect(-1, 5), 1);
        assert_eq!(reflect(-2, 5), 2);
        assert_eq!(reflect(0, 5), 0);
        assert_eq!(reflect(4, 5), 4);
        assert_eq!(reflect(5, 5), 3);
        assert_eq!(reflect(6, 5), 2);
    }

    #[test]
    fn hann_window_is_periodic() {
        let w = make_window(WindowKind::Hann, 8);
        assert!(w[0].abs() < 1e-7);
        // Periodic windows are not symmetric at the last sample.
        assert!(w[7] > 0.0);
        assert!((w[4] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn centered_frame_count() {
        let stft = Stft::new(512, 128, 512, WindowKind::Hann);
        let samples = vec![0.0f32; 1280];
        let spec = stft.spectrogram(&samples, 2.0);
        assert_eq!(spec.shape(), &[257, 1280 / 128 + 1]);
    }

    #[test]
    fn sine_energy_lands_in_the_right_bin() {
        let n_fft = 512;
        let sr = 8000.0f32;
        let freq = 1000.0f32;
        let stft = Stft::new(n_fft, 128, n_fft, WindowKind::Hann);
        let samples: Vec<f32> = (0..8000)
            .map(|i| (2.0 * PI * freq * i as f32 / sr).sin())
            .collect();
        let spec = stft.spectrogram(&samples, 2.0);

        // Sum energy per bin over the middle frames, find the peak.
        let mid = spec.ncols() / 2;
        let col = spec.column(mid);
        let peak = col
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        let expected = (freq / sr * n_fft as f32).round() as usize;
        assert!(peak.abs_diff(expected) <= 1, "peak {peak} expected {expected}");
    }

    #[test]
    fn shorter_window_is_zero_padded_to_n_fft() {
        let stft = Stft::new(512, 128, 256, WindowKind::Hann);
        assert_eq!(stft.window.len(), 512);
        assert!(stft.window[..128].iter().all(|&v| v == 0.0));
        assert!(stft.window[384..].iter().all(|&v| v == 0.0));
        assert!(stft.window[256] > 0.0);
    }
}
