//! The output archive: a single nested-key binary container holding run
//! metadata, split index lists, and one track group per processed file.
//!
//! Layout mirrors the hierarchy consumers expect:
//! - `info`: run parameters plus, after extraction, the observed feature shape.
//! - `splits`: `train` / `val` / `test` row-index lists.
//! - `track/<row_index>`: `X_0, X_1, …` feature matrices (one per chunk),
//!   the four scalar label fields, and the original audio filename.
//!
//! Serialized with pickle framing so the archive stays loadable from the
//! training side without a custom reader.

use std::collections::BTreeMap;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::Context;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::config::RunConfig;
use crate::error::PipelineError;
use crate::labels::{LabelRow, SplitIndices};

/// Run parameters recorded under `info`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveInfo {
    pub n_fft: usize,
    pub win_length: usize,
    pub hop_length: usize,
    pub n_mels: usize,
    #[serde(rename = "type")]
    pub kind: String,
    /// Maximum decode duration; `None` means whole file.
    pub duration: Option<f64>,
    /// Chunk duration; `None` means one chunk per file.
    pub chunk_duration: Option<f64>,
    /// Shape of the lowest-indexed track's first chunk, stamped at save time.
    pub data_shape: Option<(usize, usize)>,
}

impl ArchiveInfo {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            n_fft: config.n_fft,
            win_length: config.win_length,
            hop_length: config.hop_length,
            n_mels: config.n_mels,
            kind: config.representation.as_str().to_string(),
            duration: config.duration,
            chunk_duration: config.chunk_duration,
            data_shape: None,
        }
    }
}

/// One record group: all chunks of one source file plus its labels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackGroup {
    /// `X_<chunk_index>` feature matrices.
    pub chunks: BTreeMap<usize, Array2<f32>>,
    pub sensor: i64,
    pub hour: i64,
    pub day: i64,
    pub week: i64,
    pub filename: String,
}

impl TrackGroup {
    fn from_labels(row: &LabelRow) -> Self {
        Self {
            chunks: BTreeMap::new(),
            sensor: row.sensor_id,
            hour: row.hour,
            day: row.day,
            week: row.week,
            filename: row.audio_filename.clone(),
        }
    }

    pub fn chunk(&self, index: usize) -> Option<&Array2<f32>> {
        self.chunks.get(&index)
    }
}

/// The whole archive. Mutated only by the pipeline's single writer thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Archive {
    pub info: ArchiveInfo,
    pub splits: SplitIndices,
    tracks: BTreeMap<usize, TrackGroup>,
}

impl Archive {
    pub fn new(info: ArchiveInfo, splits: SplitIndices) -> Self {
        Self { info, splits, tracks: BTreeMap::new() }
    }

    /// Read an existing archive back.
    pub fn open(path: &Path) -> Result<Self, PipelineError> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open archive {}", path.display()))
            .map_err(PipelineError::Archive)?;
        serde_pickle::from_reader(BufReader::new(file), Default::default())
            .context("failed to deserialize archive")
            .map_err(PipelineError::Archive)
    }

    /// Persist the archive, creating parent directories as needed.
    ///
    /// Stamps `info.data_shape` from the tracks present, so the recorded
    /// shape does not depend on the order chunks were appended in.
    pub fn save(&mut self, path: &Path) -> Result<(), PipelineError> {
        self.info.data_shape = self.observed_shape();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))
                .map_err(PipelineError::Archive)?;
        }
        let file = std::fs::File::create(path)
            .with_context(|| format!("failed to create archive {}", path.display()))
            .map_err(PipelineError::Archive)?;
        let mut writer = BufWriter::new(file);
        serde_pickle::to_writer(&mut writer, self, Default::default())
            .context("failed to serialize archive")
            .map_err(PipelineError::Archive)
    }

    /// Add one chunk to a track group, creating the group (with its labels
    /// and filename, written exactly once) on the first chunk. Re-sent
    /// chunks are ignored rather than overwritten.
    pub fn append_chunk(
        &mut self,
        row_index: usize,
        chunk_index: usize,
        data: Array2<f32>,
        labels: &LabelRow,
    ) {
        let group = self
            .tracks
            .entry(row_index)
            .or_insert_with(|| TrackGroup::from_labels(labels));
        group.chunks.entry(chunk_index).or_insert(data);
    }

    /// Shape of the lowest-indexed track's first chunk.
    fn observed_shape(&self) -> Option<(usize, usize)> {
        self.tracks
            .values()
            .next()
            .and_then(|group| group.chunks.values().next())
            .map(|data| data.dim())
    }

    pub fn track(&self, row_index: usize) -> Option<&TrackGroup> {
        self.tracks.get(&row_index)
    }

    pub fn tracks(&self) -> impl Iterator<Item = (&usize, &TrackGroup)> {
        self.tracks.iter()
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }
}
