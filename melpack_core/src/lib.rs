//! Convert a directory of audio recordings into a single archive of
//! fixed-format spectral feature tensors (log-mel or PCEN-mel), together
//! with per-track labels and train/val/test split membership.
//!
//! The pieces, in pipeline order:
//! - [`config`]: resolve CLI-style options into an immutable [`RunConfig`].
//! - [`labels`]: load and deduplicate the per-dataset annotation table.
//! - [`files`]: discover audio files under the dataset directory.
//! - [`audio`]: decode/resample one file to f32 samples (symphonia + rubato).
//! - [`features`]: chunking, STFT, mel filterbank, dB / PCEN.
//! - [`archive`]: the nested-key output container.
//! - [`pipeline`]: slice the file list across worker threads, funnel results
//!   through a single writer thread, report a run summary.

pub mod archive;
pub mod audio;
pub mod config;
pub mod error;
pub mod features;
pub mod files;
pub mod labels;
pub mod pipeline;

pub use config::{Representation, RunConfig, RunMode, RunOptions, WindowKind};
pub use error::PipelineError;
pub use labels::{LabelTable, Split};
pub use pipeline::{run, RunSummary};
