//! Feature extraction: one audio file in, an ordered sequence of
//! (chunk index, feature matrix) pairs out.

mod mel;
mod pcen;
mod stft;

pub use mel::{amplitude_to_db, mel_filterbank};
pub use pcen::pcen;
pub use stft::{make_window, Stft};

use std::ops::Range;
use std::path::Path;

use ndarray::Array2;

use crate::audio::{decode_file, DecodeOptions};
use crate::config::{Representation, RunConfig};
use crate::error::PipelineError;

const TOP_DB: f32 = 80.0;

/// One extracted feature matrix, shape (n_mels, n_frames).
#[derive(Debug, Clone)]
pub struct ChunkFeature {
    pub chunk_index: usize,
    pub data: Array2<f32>,
}

/// STFT plan plus mel basis for one sample rate. Built per file since the
/// filterbank depends on the decoded rate when no target rate is configured.
pub struct FeatureExtractor {
    stft: Stft,
    mel_basis: Array2<f32>,
    representation: Representation,
    sample_rate: u32,
    hop_length: usize,
}

impl FeatureExtractor {
    pub fn new(config: &RunConfig, sample_rate: u32) -> Self {
        Self {
            stft: Stft::new(config.n_fft, config.hop_length, config.win_length, config.window),
            mel_basis: mel_filterbank(sample_rate, config.n_fft, config.n_mels),
            representation: config.representation,
            sample_rate,
            hop_length: config.hop_length,
        }
    }

    /// Compute the configured representation for one waveform chunk.
    pub fn compute(&self, samples: &[f32]) -> Array2<f32> {
        match self.representation {
            Representation::LogMel => {
                let power_spec = self.stft.spectrogram(samples, 2.0);
                let mel = self.mel_basis.dot(&power_spec);
                amplitude_to_db(mel, TOP_DB)
            }
            Representation::PcenMel => {
                let amp_spec = self.stft.spectrogram(samples, 1.0);
                let mel = self.mel_basis.dot(&amp_spec);
                pcen(&mel, self.sample_rate, self.hop_length)
            }
        }
    }
}

/// Decode one file and extract features for each of its chunks, in order.
pub fn extract_file(
    path: &Path,
    config: &RunConfig,
) -> Result<Vec<ChunkFeature>, PipelineError> {
    let wave = decode_file(path, &DecodeOptions::from(config)).map_err(|source| {
        PipelineError::Decode { path: path.to_path_buf(), source }
    })?;
    if wave.samples.is_empty() {
        return Err(PipelineError::Decode {
            path: path.to_path_buf(),
            source: anyhow::anyhow!("decoded no audio samples"),
        });
    }

    let n_chunks = match config.chunk_duration {
        None => 1,
        Some(chunk_duration) => {
            let n = (wave.duration_secs() / chunk_duration).floor() as usize;
            if n == 0 {
                return Err(PipelineError::ShorterThanChunk {
                    path: path.to_path_buf(),
                    duration: wave.duration_secs(),
                    chunk_duration,
                });
            }
            // A chunk duration under one sample period would ask for more
            // chunks than samples; cap so every chunk holds at least one.
            n.min(wave.samples.len())
        }
    };

    let extractor = FeatureExtractor::new(config, wave.sample_rate);
    let features = split_ranges(wave.samples.len(), n_chunks)
        .into_iter()
        .enumerate()
        .map(|(chunk_index, range)| ChunkFeature {
            chunk_index,
            data: extractor.compute(&wave.samples[range]),
        })
        .collect();

    Ok(features)
}

/// Split `len` samples into `n` contiguous near-equal ranges: the first
/// `len % n` ranges get one extra sample, nothing is dropped.
pub fn split_ranges(len: usize, n: usize) -> Vec<Range<usize>> {
    let base = len / n;
    let extra = len % n;
    let mut ranges = Vec::with_capacity(n);
    let mut start = 0;
    for i in 0..n {
        let size = base + usize::from(i < extra);
        ranges.push(start..start + size);
        start += size;
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RunOptions, WindowKind};

    fn small_config(representation: Representation) -> RunConfig {
        let mut opts = RunOptions::new("test");
        opts.n_fft = 512;
        opts.hop_length = Some(128);
        opts.n_mels = 32;
        opts.window = WindowKind::Hann;
        opts.representation = representation;
        opts.resolve().unwrap()
    }

    fn write_sine_wav(dir: &Path, name: &str, sample_rate: u32, seconds: f32) -> std::path::PathBuf {
        let path = dir.join(name);
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        let frames = (sample_rate as f32 * seconds) as usize;
        for i in 0..frames {
            let v = (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sample_rate as f32).sin();
            writer.write_sample((v * 16000.0) as i16).unwrap();
        }
        writer.finalize().unwrap();
        path
    }

    #[test]
    fn split_is_lossless_and_near_equal() {
        for (len, n) in [(100, 3), (7, 7), (10, 4), (1000, 1)] {
            let ranges = split_ranges(len, n);
            assert_eq!(ranges.len(), n);
            assert_eq!(ranges.first().unwrap().start, 0);
            assert_eq!(ranges.last().unwrap().end, len);
            let total: usize = ranges.iter().map(|r| r.len()).sum();
            assert_eq!(total, len);
            let min = ranges.iter().map(|r| r.len()).min().unwrap();
            let max = ranges.iter().map(|r| r.len()).max().unwrap();
            assert!(max - min <= 1);
            for pair in ranges.windows(2) {
                assert_eq!(pair[0].end, pair[1].start);
            }
        }
    }

    #[test]
    fn whole_file_yields_one_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sine_wav(dir.path(), "a.wav", 8000, 1.0);
        let config = small_config(Representation::LogMel);
        let features = extract_file(&path, &config).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].chunk_index, 0);
        assert_eq!(features[0].data.nrows(), 32);
    }

    #[test]
    fn chunk_count_is_floor_of_duration_ratio() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sine_wav(dir.path(), "a.wav", 8000, 2.5);
        let mut config = small_config(Representation::LogMel);
        config.chunk_duration = Some(1.0);
        let features = extract_file(&path, &config).unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].chunk_index, 0);
        assert_eq!(features[1].chunk_index, 1);
    }

    #[test]
    fn sub_sample_chunk_duration_caps_at_one_sample_per_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sine_wav(dir.path(), "a.wav", 8000, 0.1);
        let mut config = small_config(Representation::LogMel);
        config.chunk_duration = Some(0.0001);
        let features = extract_file(&path, &config).unwrap();
        // 800 samples, so at most 800 one-sample chunks.
        assert_eq!(features.len(), 800);
        assert!(features.iter().all(|f| f.data.ncols() >= 1));
    }

    #[test]
    fn file_shorter_than_chunk_duration_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sine_wav(dir.path(), "a.wav", 8000, 0.5);
        let mut config = small_config(Representation::LogMel);
        config.chunk_duration = Some(1.0);
        assert!(matches!(
            extract_file(&path, &config),
            Err(PipelineError::ShorterThanChunk { .. })
        ));
    }

    #[test]
    fn log_mel_peaks_at_zero_db() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sine_wav(dir.path(), "a.wav", 8000, 1.0);
        let config = small_config(Representation::LogMel);
        let features = extract_file(&path, &config).unwrap();
        let max = features[0].data.iter().cloned().fold(f32::MIN, f32::max);
        assert!((max - 0.0).abs() < 1e-4);
        let min = features[0].data.iter().cloned().fold(f32::MAX, f32::min);
        assert!(min >= -TOP_DB - 1e-4);
    }

    #[test]
    fn pcen_mel_is_finite() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sine_wav(dir.path(), "a.wav", 8000, 1.0);
        let config = small_config(Representation::PcenMel);
        let features = extract_file(&path, &config).unwrap();
        assert!(features[0].data.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn extraction_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sine_wav(dir.path(), "a.wav", 8000, 1.0);
        let config = small_config(Representation::LogMel);
        let first = extract_file(&path, &config).unwrap();
        let second = extract_file(&path, &config).unwrap();
        assert_eq!(first[0].data, second[0].data);
    }

    #[test]
    fn missing_file_is_a_decode_error() {
        let config = small_config(Representation::LogMel);
        assert!(matches!(
            extract_file(Path::new("/nonexistent/x.wav"), &config),
            Err(PipelineError::Decode { .. })
        ));
    }
}
