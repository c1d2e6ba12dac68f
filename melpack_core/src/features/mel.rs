//! HTK-scale mel filterbank with Slaney area normalization, and the
//! dB conversion used for the log-mel representation.

use ndarray::Array2;

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0f32.powf(mel / 2595.0) - 1.0)
}

/// Triangular mel filterbank, shape (n_mels, n_fft / 2 + 1).
///
/// Filters span 0 Hz to Nyquist on the HTK mel scale, each normalized to
/// unit area (Slaney style) so band energies are comparable across widths.
pub fn mel_filterbank(sample_rate: u32, n_fft: usize, n_mels: usize) -> Array2<f32> {
    let n_bins = n_fft / 2 + 1;
    let f_min = 0.0f32;
    let f_max = sample_rate as f32 / 2.0;

    let mel_min = hz_to_mel(f_min);
    let mel_max = hz_to_mel(f_max);

    // n_mels + 2 band edges, evenly spaced in mel.
    let hz_points: Vec<f32> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f32 / (n_mels + 1) as f32))
        .collect();

    let fft_freqs: Vec<f32> = (0..n_bins)
        .map(|k| k as f32 * sample_rate as f32 / n_fft as f32)
        .collect();

    let mut basis = Array2::<f32>::zeros((n_mels, n_bins));
    for m in 0..n_mels {
        let (left, center, right) = (hz_points[m], hz_points[m + 1], hz_points[m + 2]);
        let enorm = 2.0 / (right - left);
        for (k, &f) in fft_freqs.iter().enumerate() {
            let rising = (f - left) / (center - left);
            let falling = (right - f) / (right - center);
            let w = rising.min(falling).max(0.0);
            basis[[m, k]] = w * enorm;
        }
    }
    basis
}

/// Convert a spectrogram to decibels referenced to its own maximum, with
/// an `amin` floor and the dynamic range clipped to `top_db`.
pub fn amplitude_to_db(mut spec: Array2<f32>, top_db: f32) -> Array2<f32> {
    const AMIN: f32 = 1e-5;

    let reference = spec.iter().cloned().fold(f32::MIN, f32::max).max(AMIN);
    let ref_db = 20.0 * reference.log10();
    spec.mapv_inplace(|v| 20.0 * v.max(AMIN).log10() - ref_db);

    let peak = spec.iter().cloned().fold(f32::MIN, f32::max);
    let floor = peak - top_db;
    spec.mapv_inplace(|v| v.max(floor));
    spec
}
