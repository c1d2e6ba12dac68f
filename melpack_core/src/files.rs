//! Audio file discovery: recursive walk of the dataset's audio directory,
//! case-insensitive extension filter, sorted output, optional count limit.

use std::path::{Path, PathBuf};

use crate::error::PipelineError;

/// Collect matching audio files under `dir`, sorted by path.
pub fn discover_files(
    dir: &Path,
    extensions: &[String],
    limit: Option<usize>,
) -> Result<Vec<PathBuf>, PipelineError> {
    if !dir.is_dir() {
        return Err(PipelineError::AudioDirMissing(dir.to_path_buf()));
    }

    let mut found = Vec::new();
    walk(dir, extensions, &mut found)
        .map_err(|e| PipelineError::Io(anyhow::Error::new(e).context("walking audio dir")))?;
    found.sort();

    if let Some(limit) = limit {
        found.truncate(limit);
    }

    if found.is_empty() {
        return Err(PipelineError::NoFilesMatched(dir.to_path_buf()));
    }
    Ok(found)
}

fn walk(dir: &Path, extensions: &[String], out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            walk(&path, extensions, out)?;
        } else if matches_extension(&path, extensions) {
            out.push(path);
        }
    }
    Ok(())
}

fn matches_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
}
