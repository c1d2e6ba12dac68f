use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while building a feature archive.
///
/// Label-table and configuration errors are fatal and abort the run before
/// any worker is spawned. Decode and lookup errors are per-file: the
/// pipeline logs them, skips the file, and reports them in the run summary.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("label table not found: {0}")]
    LabelTableMissing(PathBuf),

    #[error("label table {path} is malformed: {reason}")]
    LabelTableMalformed { path: PathBuf, reason: String },

    #[error("audio directory not found: {0}")]
    AudioDirMissing(PathBuf),

    #[error("no audio files matched the extension filter under {0}")]
    NoFilesMatched(PathBuf),

    #[error("unsupported representation {0:?} (expected \"log_mel\" or \"pcen_mel\")")]
    UnsupportedRepresentation(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to decode {path}")]
    Decode {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("no label row matches audio file {0:?}")]
    MissingLabel(String),

    #[error("{path}: {duration:.3}s of audio is shorter than the chunk duration {chunk_duration:.3}s")]
    ShorterThanChunk {
        path: PathBuf,
        duration: f64,
        chunk_duration: f64,
    },

    #[error("archive error")]
    Archive(#[source] anyhow::Error),

    #[error("i/o error")]
    Io(#[source] anyhow::Error),

    #[error("worker thread panicked")]
    WorkerPanicked,
}
