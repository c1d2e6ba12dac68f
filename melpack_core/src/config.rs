//! Run configuration: unresolved [`RunOptions`] from the CLI surface are
//! turned into an immutable, fully-validated [`RunConfig`] that every other
//! component receives explicitly. Nothing in this crate reads ambient state.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Audio extensions considered when no `--ext` filter is given.
pub const DEFAULT_EXTENSIONS: &[&str] = &["aac", "au", "flac", "m4a", "mp3", "ogg", "wav"];

/// Target feature representation stored in the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Representation {
    /// Power-2 mel spectrogram converted to dB, referenced to the chunk maximum.
    LogMel,
    /// Power-1 mel spectrogram with per-channel energy normalization.
    PcenMel,
}

impl Representation {
    pub fn parse(s: &str) -> Result<Self, PipelineError> {
        match s {
            "log_mel" => Ok(Representation::LogMel),
            "pcen_mel" => Ok(Representation::PcenMel),
            other => Err(PipelineError::UnsupportedRepresentation(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Representation::LogMel => "log_mel",
            Representation::PcenMel => "pcen_mel",
        }
    }
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// STFT window function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowKind {
    Hann,
    Hamming,
    Blackman,
    Rectangular,
}

impl WindowKind {
    pub fn parse(s: &str) -> Result<Self, PipelineError> {
        match s {
            "hann" => Ok(WindowKind::Hann),
            "hamming" => Ok(WindowKind::Hamming),
            "blackman" => Ok(WindowKind::Blackman),
            "rectangular" | "boxcar" => Ok(WindowKind::Rectangular),
            other => Err(PipelineError::InvalidConfig(format!(
                "unknown window function {other:?}"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WindowKind::Hann => "hann",
            WindowKind::Hamming => "hamming",
            WindowKind::Blackman => "blackman",
            WindowKind::Rectangular => "rectangular",
        }
    }
}

/// Whole-dataset run, or a single-sample smoke run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    All,
    Sample,
}

impl RunMode {
    pub fn parse(s: &str) -> Result<Self, PipelineError> {
        match s {
            "all" => Ok(RunMode::All),
            "sample" => Ok(RunMode::Sample),
            other => Err(PipelineError::InvalidConfig(format!(
                "unknown mode {other:?} (expected \"all\" or \"sample\")"
            ))),
        }
    }
}

/// CLI-facing options before defaults are applied.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub dataset: String,
    pub mode: RunMode,
    pub representation: Representation,
    pub dir_prefix: PathBuf,
    /// Root the archive is written under; `data` unless overridden.
    pub output_root: PathBuf,
    pub dir_suffix: String,
    pub extensions: Option<Vec<String>>,
    pub load_limit: Option<usize>,
    pub num_workers: usize,
    pub sample_rate: Option<u32>,
    pub mono: bool,
    pub offset: f64,
    pub duration: Option<f64>,
    pub chunk_duration: Option<f64>,
    pub n_fft: usize,
    pub hop_length: Option<usize>,
    pub win_length: Option<usize>,
    pub window: WindowKind,
    pub n_mels: usize,
}

impl RunOptions {
    /// Options with the same defaults the CLI advertises.
    pub fn new(dataset: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            mode: RunMode::All,
            representation: Representation::LogMel,
            dir_prefix: PathBuf::from("data"),
            output_root: PathBuf::from("data"),
            dir_suffix: "audio".to_string(),
            extensions: None,
            load_limit: None,
            num_workers: 1,
            sample_rate: None,
            mono: true,
            offset: 0.0,
            duration: None,
            chunk_duration: None,
            n_fft: 4096,
            hop_length: None,
            win_length: None,
            window: WindowKind::Hann,
            n_mels: 256,
        }
    }

    /// Apply derived defaults and validate, freezing into a [`RunConfig`].
    ///
    /// Derived values: `win_length` defaults to `n_fft`, `hop_length` to
    /// `win_length / 16`, `data_dir` to `dir_prefix/dataset/dir_suffix`,
    /// and sample mode forces the load limit to 1.
    pub fn resolve(self) -> Result<RunConfig, PipelineError> {
        if self.dataset.is_empty() {
            return Err(PipelineError::InvalidConfig("dataset name is empty".into()));
        }
        if self.num_workers == 0 {
            return Err(PipelineError::InvalidConfig("num_workers must be >= 1".into()));
        }
        if self.n_fft == 0 || self.n_mels == 0 {
            return Err(PipelineError::InvalidConfig(
                "n_fft and n_mels must be positive".into(),
            ));
        }

        let win_length = self.win_length.unwrap_or(self.n_fft);
        if win_length > self.n_fft {
            return Err(PipelineError::InvalidConfig(format!(
                "win_length {} exceeds n_fft {}",
                win_length, self.n_fft
            )));
        }
        let hop_length = self.hop_length.unwrap_or(win_length / 16);
        if hop_length == 0 {
            return Err(PipelineError::InvalidConfig("hop_length must be positive".into()));
        }

        if let Some(chunk) = self.chunk_duration {
            if !(chunk > 0.0) {
                return Err(PipelineError::InvalidConfig(
                    "chunk_duration must be positive".into(),
                ));
            }
        }
        if let Some(duration) = self.duration {
            if !(duration > 0.0) {
                return Err(PipelineError::InvalidConfig("duration must be positive".into()));
            }
        }
        if self.offset < 0.0 {
            return Err(PipelineError::InvalidConfig("offset must not be negative".into()));
        }

        let extensions = self
            .extensions
            .unwrap_or_else(|| DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect());

        let load_limit = match self.mode {
            RunMode::Sample => Some(1),
            RunMode::All => self.load_limit,
        };

        let data_dir = self.dir_prefix.join(&self.dataset).join(&self.dir_suffix);

        Ok(RunConfig {
            dataset: self.dataset,
            dir_prefix: self.dir_prefix,
            output_root: self.output_root,
            data_dir,
            extensions,
            load_limit,
            num_workers: self.num_workers,
            sample_rate: self.sample_rate,
            mono: self.mono,
            offset: self.offset,
            duration: self.duration,
            chunk_duration: self.chunk_duration,
            n_fft: self.n_fft,
            hop_length,
            win_length,
            window: self.window,
            n_mels: self.n_mels,
            representation: self.representation,
        })
    }
}

/// Resolved, immutable run settings shared read-only by all components.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub dataset: String,
    pub dir_prefix: PathBuf,
    pub output_root: PathBuf,
    pub data_dir: PathBuf,
    pub extensions: Vec<String>,
    pub load_limit: Option<usize>,
    pub num_workers: usize,
    pub sample_rate: Option<u32>,
    pub mono: bool,
    pub offset: f64,
    pub duration: Option<f64>,
    pub chunk_duration: Option<f64>,
    pub n_fft: usize,
    pub hop_length: usize,
    pub win_length: usize,
    pub window: WindowKind,
    pub n_mels: usize,
    pub representation: Representation,
}

impl RunConfig {
    /// `<dir_prefix>/<dataset>/annotations.csv`
    pub fn annotations_path(&self) -> PathBuf {
        self.dir_prefix.join(&self.dataset).join("annotations.csv")
    }

    /// `<output_root>/<dataset>/<dataset>.pkl`
    pub fn archive_path(&self) -> PathBuf {
        self.output_root
            .join(&self.dataset)
            .join(format!("{}.pkl", self.dataset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn win_length_defaults_to_n_fft() {
        let cfg = RunOptions::new("tricycle").resolve().unwrap();
        assert_eq!(cfg.win_length, 4096);
        assert_eq!(cfg.hop_length, 4096 / 16);
    }

    #[test]
    fn hop_length_defaults_to_sixteenth_of_win_length() {
        let mut opts = RunOptions::new("tricycle");
        opts.win_length = Some(1024);
        let cfg = opts.resolve().unwrap();
        assert_eq!(cfg.win_length, 1024);
        assert_eq!(cfg.hop_length, 64);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let mut opts = RunOptions::new("tricycle");
        opts.n_fft = 2048;
        opts.win_length = Some(1200);
        opts.hop_length = Some(300);
        let cfg = opts.resolve().unwrap();
        assert_eq!(cfg.n_fft, 2048);
        assert_eq!(cfg.win_length, 1200);
        assert_eq!(cfg.hop_length, 300);
    }

    #[test]
    fn sample_mode_forces_load_limit() {
        let mut opts = RunOptions::new("tricycle");
        opts.mode = RunMode::Sample;
        opts.load_limit = Some(50);
        let cfg = opts.resolve().unwrap();
        assert_eq!(cfg.load_limit, Some(1));
    }

    #[test]
    fn data_dir_is_derived_from_roots() {
        let mut opts = RunOptions::new("tricycle");
        opts.dir_prefix = PathBuf::from("corpora");
        opts.dir_suffix = "wavs".to_string();
        let cfg = opts.resolve().unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("corpora/tricycle/wavs"));
        assert_eq!(
            cfg.annotations_path(),
            PathBuf::from("corpora/tricycle/annotations.csv")
        );
    }

    #[test]
    fn win_length_larger_than_n_fft_is_rejected() {
        let mut opts = RunOptions::new("tricycle");
        opts.n_fft = 1024;
        opts.win_length = Some(2048);
        assert!(matches!(
            opts.resolve(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn representation_parsing() {
        assert_eq!(Representation::parse("log_mel").unwrap(), Representation::LogMel);
        assert_eq!(Representation::parse("pcen_mel").unwrap(), Representation::PcenMel);
        assert!(matches!(
            Representation::parse("mfcc"),
            Err(PipelineError::UnsupportedRepresentation(_))
        ));
    }
}
