//! The run itself: slice the file list across a fixed pool of worker
//! threads, funnel every extracted chunk through one writer thread that
//! owns the archive, join everything, finalize metadata.
//!
//! The single writer thread is the serialization point for archive
//! mutation; workers never touch the archive. Per-file failures are
//! caught, logged, and surfaced in the run summary instead of killing
//! the worker. Label-table and configuration problems abort before any
//! thread is spawned.

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

use ndarray::Array2;
use tracing::{debug, info, warn};

use crate::archive::{Archive, ArchiveInfo};
use crate::config::RunConfig;
use crate::error::PipelineError;
use crate::features::extract_file;
use crate::files::discover_files;
use crate::labels::{LabelRow, LabelTable};

/// One file that could not be processed, with the reason it was skipped.
#[derive(Debug, Clone)]
pub struct FileFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// End-of-run report.
#[derive(Debug)]
pub struct RunSummary {
    pub archive_path: PathBuf,
    /// Files fully extracted and handed to the writer.
    pub processed: usize,
    /// Files skipped, with reasons.
    pub failures: Vec<FileFailure>,
    /// Track groups present in the archive.
    pub tracks_written: usize,
    /// Feature shape stamped into the archive metadata, if any track exists.
    pub data_shape: Option<(usize, usize)>,
}

struct WriteRequest {
    row_index: usize,
    chunk_index: usize,
    data: Array2<f32>,
    labels: LabelRow,
}

/// Contiguous near-equal slices covering `0..n`, one per worker.
///
/// Slice length is `ceil(n / workers)`; trailing slices may be shorter or
/// empty when there are fewer files than workers.
pub fn partition(n: usize, workers: usize) -> Vec<Range<usize>> {
    let slice_len = n.div_ceil(workers);
    (0..workers)
        .map(|i| {
            let start = (i * slice_len).min(n);
            let end = ((i + 1) * slice_len).min(n);
            start..end
        })
        .collect()
}

/// Run the whole pipeline for one resolved configuration.
pub fn run(config: &RunConfig) -> Result<RunSummary, PipelineError> {
    let labels = LabelTable::load(&config.annotations_path())?;
    info!(rows = labels.len(), "loaded label table");

    let files = discover_files(&config.data_dir, &config.extensions, config.load_limit)?;
    info!(
        files = files.len(),
        workers = config.num_workers,
        dataset = %config.dataset,
        "starting extraction"
    );

    let archive_path = config.archive_path();
    let mut archive = Archive::new(ArchiveInfo::from_config(config), labels.split_indices());
    // Run parameters and split lists go to disk before any extraction.
    archive.save(&archive_path)?;

    let slices = partition(files.len(), config.num_workers);
    let (mut archive, processed, failures) = execute(config, &labels, &files, &slices, archive)?;

    archive.save(&archive_path)?;

    for failure in &failures {
        warn!(path = %failure.path.display(), reason = %failure.reason, "skipped file");
    }
    info!(
        processed,
        failed = failures.len(),
        tracks = archive.track_count(),
        archive = %archive_path.display(),
        "run complete"
    );

    Ok(RunSummary {
        archive_path,
        processed,
        failures,
        tracks_written: archive.track_count(),
        data_shape: archive.info.data_shape,
    })
}

/// Fan out workers, drain their chunks into the archive, join everything.
fn execute(
    config: &RunConfig,
    labels: &LabelTable,
    files: &[PathBuf],
    slices: &[Range<usize>],
    mut archive: Archive,
) -> Result<(Archive, usize, Vec<FileFailure>), PipelineError> {
    let (tx, rx) = mpsc::channel::<WriteRequest>();

    thread::scope(|scope| {
        let writer = scope.spawn(move || {
            for req in rx {
                archive.append_chunk(req.row_index, req.chunk_index, req.data, &req.labels);
            }
            archive
        });

        let workers: Vec<_> = slices
            .iter()
            .map(|slice| {
                let tx = tx.clone();
                let slice = &files[slice.clone()];
                scope.spawn(move || worker_loop(slice, config, labels, tx))
            })
            .collect();
        // Close the channel once every worker's clone is gone.
        drop(tx);

        let mut processed = 0usize;
        let mut failures = Vec::new();
        // Join every thread before propagating anything, so no panicked
        // handle is left for the scope itself to re-raise.
        let mut panicked = false;
        for handle in workers {
            match handle.join() {
                Ok((ok, mut failed)) => {
                    processed += ok;
                    failures.append(&mut failed);
                }
                Err(_) => panicked = true,
            }
        }

        let archive = writer.join().map_err(|_| PipelineError::WorkerPanicked)?;
        if panicked {
            return Err(PipelineError::WorkerPanicked);
        }
        Ok((archive, processed, failures))
    })
}

/// Process one contiguous slice of the file list in order, sending each
/// file's chunks to the writer in chunk-index order.
fn worker_loop(
    slice: &[PathBuf],
    config: &RunConfig,
    labels: &LabelTable,
    tx: mpsc::Sender<WriteRequest>,
) -> (usize, Vec<FileFailure>) {
    let mut processed = 0usize;
    let mut failures = Vec::new();

    for path in slice {
        match process_file(path, config, labels, &tx) {
            Ok(()) => {
                processed += 1;
                debug!(path = %path.display(), "wrote file");
            }
            Err(err) => failures.push(FileFailure {
                path: path.clone(),
                reason: err.to_string(),
            }),
        }
    }

    (processed, failures)
}

fn process_file(
    path: &Path,
    config: &RunConfig,
    labels: &LabelTable,
    tx: &mpsc::Sender<WriteRequest>,
) -> Result<(), PipelineError> {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (row_index, row) = labels
        .lookup(&filename)
        .ok_or_else(|| PipelineError::MissingLabel(filename.clone()))?;

    let features = extract_file(path, config)?;

    for feature in features {
        let request = WriteRequest {
            row_index,
            chunk_index: feature.chunk_index,
            data: feature.data,
            labels: row.clone(),
        };
        tx.send(request)
            .map_err(|e| PipelineError::Archive(anyhow::Error::new(e).context("writer gone")))?;
    }
    Ok(())
}
