//! `melpack`: convert an audio dataset into a spectral feature archive.
//!
//! One positional argument (the dataset name) plus options covering decode,
//! chunking, and spectral parameters. Invoked with no arguments, clap prints
//! usage and exits non-zero; same for unrecognized options.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use melpack_core::{pipeline, Representation, RunMode, RunOptions, WindowKind};

#[derive(Parser, Debug)]
#[command(
    name = "melpack",
    about = "Convert an audio dataset into an archive of log-mel or PCEN-mel feature tensors"
)]
struct Cli {
    /// Sound dataset to convert (expects <dir-prefix>/<dataset>/annotations.csv).
    dataset: String,

    /// Run on the whole dataset ("all") or a single sample ("sample").
    #[arg(long, default_value = "all", value_parser = RunMode::parse)]
    mode: RunMode,

    /// Target sample rate. Default: the native rate of each file.
    #[arg(long)]
    sr: Option<u32>,

    /// Representation to store: "log_mel" or "pcen_mel".
    #[arg(long = "to", default_value = "log_mel", value_parser = Representation::parse)]
    representation: Representation,

    /// Directory containing the <dataset> directory.
    #[arg(long, default_value = "data")]
    dir_prefix: PathBuf,

    /// Audio subdirectory under <dir-prefix>/<dataset>/.
    #[arg(long, default_value = "audio")]
    dir_suffix: String,

    /// Extensions to process, e.g. --ext mp3 wav. Default: aac au flac m4a mp3 ogg wav.
    #[arg(long, num_args = 1..)]
    ext: Option<Vec<String>>,

    /// Limit the number of files to process.
    #[arg(long)]
    load_limit: Option<usize>,

    /// Number of worker threads to distribute files over.
    #[arg(long, default_value_t = 1)]
    num_workers: usize,

    /// Downmix to mono. With false, channel 0 is used as-is.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    mono: bool,

    /// Start reading at this time (seconds).
    #[arg(long, default_value_t = 0.0)]
    offset: f64,

    /// Maximum duration to load per file (seconds). Default: whole file.
    #[arg(long)]
    duration: Option<f64>,

    /// Split each loaded clip into floor(duration / chunk_duration) chunks.
    #[arg(long)]
    chunk_duration: Option<f64>,

    /// FFT size (zero-padded window length).
    #[arg(long, default_value_t = 4096)]
    n_fft: usize,

    /// Samples between adjacent STFT columns. Default: win_length / 16.
    #[arg(long)]
    hop_length: Option<usize>,

    /// Analysis window length. Default: n_fft.
    #[arg(long)]
    win_length: Option<usize>,

    /// Window function: hann, hamming, blackman, rectangular.
    #[arg(long, default_value = "hann", value_parser = WindowKind::parse)]
    window: WindowKind,

    /// Number of mel bands.
    #[arg(long, default_value_t = 256)]
    n_mels: usize,
}

impl Cli {
    fn into_options(self) -> RunOptions {
        let mut opts = RunOptions::new(self.dataset);
        opts.mode = self.mode;
        opts.representation = self.representation;
        opts.dir_prefix = self.dir_prefix;
        opts.dir_suffix = self.dir_suffix;
        opts.extensions = self.ext;
        opts.load_limit = self.load_limit;
        opts.num_workers = self.num_workers;
        opts.sample_rate = self.sr;
        opts.mono = self.mono;
        opts.offset = self.offset;
        opts.duration = self.duration;
        opts.chunk_duration = self.chunk_duration;
        opts.n_fft = self.n_fft;
        opts.hop_length = self.hop_length;
        opts.win_length = self.win_length;
        opts.window = self.window;
        opts.n_mels = self.n_mels;
        opts
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match try_run(cli) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn try_run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = cli.into_options().resolve()?;

    let n_samples = config
        .load_limit
        .map(|n| n.to_string())
        .unwrap_or_else(|| "all".to_string());
    info!("Processing {} samples in {}", n_samples, config.dataset);
    info!(?config, "resolved configuration");

    let summary = pipeline::run(&config)?;

    if !summary.failures.is_empty() {
        warn!(
            "{} of {} files failed; see warnings above",
            summary.failures.len(),
            summary.processed + summary.failures.len()
        );
    }
    info!(
        "wrote {} track groups to {}",
        summary.tracks_written,
        summary.archive_path.display()
    );

    Ok(ExitCode::SUCCESS)
}
