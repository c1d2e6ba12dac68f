//! The per-dataset annotation table: one row per audio file, deduplicated
//! by filename, immutable after load and shared read-only by every worker.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Dataset split membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    #[serde(alias = "validate")]
    Val,
    Test,
}

/// One annotation row as it appears in `annotations.csv`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelRow {
    pub audio_filename: String,
    pub sensor_id: i64,
    pub hour: i64,
    pub day: i64,
    pub week: i64,
    pub split: Split,
}

/// Index lists into the label table, one per split.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub val: Vec<usize>,
    pub test: Vec<usize>,
}

/// The deduplicated annotation table.
///
/// Row indices are positions in the deduplicated table; they key both the
/// split index lists and the archive's track groups.
#[derive(Debug, Clone)]
pub struct LabelTable {
    rows: Vec<LabelRow>,
    by_filename: HashMap<String, usize>,
}

impl LabelTable {
    /// Load `annotations.csv`, dropping duplicate filenames (first wins).
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let mut reader = csv::Reader::from_path(path).map_err(|e| match e.kind() {
            csv::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                PipelineError::LabelTableMissing(path.to_path_buf())
            }
            _ => PipelineError::LabelTableMalformed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            },
        })?;

        let mut rows = Vec::new();
        let mut by_filename = HashMap::new();
        for record in reader.deserialize::<LabelRow>() {
            let row = record.map_err(|e| PipelineError::LabelTableMalformed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            if by_filename.contains_key(&row.audio_filename) {
                continue;
            }
            by_filename.insert(row.audio_filename.clone(), rows.len());
            rows.push(row);
        }

        Ok(Self { rows, by_filename })
    }

    /// Row index and row for an audio filename, if annotated.
    pub fn lookup(&self, filename: &str) -> Option<(usize, &LabelRow)> {
        self.by_filename
            .get(filename)
            .map(|&idx| (idx, &self.rows[idx]))
    }

    pub fn rows(&self) -> &[LabelRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Disjoint, exhaustive index lists per split.
    pub fn split_indices(&self) -> SplitIndices {
        let mut splits = SplitIndices::default();
        for (idx, row) in self.rows.iter().enumerate() {
            match row.split {
                Split::Train => splits.train.push(idx),
                Split::Val => splits.val.push(idx),
                Split::Test => splits.test.push(idx),
            }
        }
        splits
    }

    /// How many rows fall in each hour of the day, 0..24.
    ///
    /// Kept for the dataset-details report in the tools binary.
    pub fn hour_histogram(&self) -> [usize; 24] {
        let mut hist = [0usize; 24];
        for row in &self.rows {
            if (0..24).contains(&row.hour) {
                hist[row.hour as usize] += 1;
            }
        }
        hist
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "audio_filename,sensor_id,hour,day,week,split\n";

    fn write_table(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(HEADER.as_bytes()).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn duplicate_filenames_keep_first_occurrence() {
        let file = write_table(
            "a.wav,1,3,2,14,train\n\
             b.wav,2,4,2,14,val\n\
             a.wav,9,9,9,99,test\n",
        );
        let table = LabelTable::load(file.path()).unwrap();
        assert_eq!(table.len(), 2);
        let (idx, row) = table.lookup("a.wav").unwrap();
        assert_eq!(idx, 0);
        assert_eq!(row.sensor_id, 1);
        assert_eq!(row.split, Split::Train);
    }

    #[test]
    fn split_indices_are_disjoint_and_exhaustive() {
        let file = write_table(
            "a.wav,1,0,0,0,train\n\
             b.wav,1,1,0,0,train\n\
             c.wav,1,2,0,0,val\n\
             d.wav,1,3,0,0,test\n",
        );
        let table = LabelTable::load(file.path()).unwrap();
        let splits = table.split_indices();
        assert_eq!(splits.train, vec![0, 1]);
        assert_eq!(splits.val, vec![2]);
        assert_eq!(splits.test, vec![3]);

        let mut all: Vec<usize> = splits
            .train
            .iter()
            .chain(&splits.val)
            .chain(&splits.test)
            .copied()
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..table.len()).collect::<Vec<_>>());
    }

    #[test]
    fn validate_is_an_alias_for_val() {
        let file = write_table("a.wav,1,0,0,0,validate\n");
        let table = LabelTable::load(file.path()).unwrap();
        assert_eq!(table.rows()[0].split, Split::Val);
    }

    #[test]
    fn missing_table_is_a_not_found_error() {
        let err = LabelTable::load(Path::new("/nonexistent/annotations.csv")).unwrap_err();
        assert!(matches!(err, PipelineError::LabelTableMissing(_)));
    }

    #[test]
    fn missing_columns_are_malformed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"audio_filename,split\na.wav,train\n").unwrap();
        file.flush().unwrap();
        let err = LabelTable::load(file.path()).unwrap_err();
        assert!(matches!(err, PipelineError::LabelTableMalformed { .. }));
    }

    #[test]
    fn hour_histogram_counts_rows() {
        let file = write_table(
            "a.wav,1,3,0,0,train\n\
             b.wav,1,3,0,0,val\n\
             c.wav,1,7,0,0,test\n",
        );
        let table = LabelTable::load(file.path()).unwrap();
        let hist = table.hour_histogram();
        assert_eq!(hist[3], 2);
        assert_eq!(hist[7], 1);
        assert_eq!(hist[0], 0);
    }
}
