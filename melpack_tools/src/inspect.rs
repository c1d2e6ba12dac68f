use std::path::Path;

use anyhow::Result;

use melpack_core::archive::Archive;
use melpack_core::labels::LabelTable;

/// Dump the info section, split sizes, and a per-track summary.
pub fn archive(path: &Path) -> Result<()> {
    let archive = Archive::open(path)?;

    println!("archive: {}", path.display());
    let info = &archive.info;
    println!("  type:           {}", info.kind);
    println!("  n_fft:          {}", info.n_fft);
    println!("  win_length:     {}", info.win_length);
    println!("  hop_length:     {}", info.hop_length);
    println!("  n_mels:         {}", info.n_mels);
    match info.chunk_duration {
        Some(d) => println!("  chunk_duration: {d}"),
        None => println!("  chunk_duration: whole file"),
    }
    match info.data_shape {
        Some((rows, cols)) => println!("  data_shape:     ({rows}, {cols})"),
        None => println!("  data_shape:     not written yet"),
    }

    println!("splits:");
    println!("  train: {}", archive.splits.train.len());
    println!("  val:   {}", archive.splits.val.len());
    println!("  test:  {}", archive.splits.test.len());

    println!("tracks: {}", archive.track_count());
    for (row_index, group) in archive.tracks() {
        println!(
            "  track/{row_index}: {} chunk(s), sensor {}, file {:?}",
            group.chunks.len(),
            group.sensor,
            group.filename
        );
    }
    Ok(())
}

/// The dataset-details report: split counts and an hour histogram.
pub fn labels(path: &Path) -> Result<()> {
    let table = LabelTable::load(path)?;
    let splits = table.split_indices();

    println!("label table: {} ({} rows)", path.display(), table.len());
    println!("  train: {}", splits.train.len());
    println!("  val:   {}", splits.val.len());
    println!("  test:  {}", splits.test.len());

    println!("hour histogram:");
    for (hour, count) in table.hour_histogram().iter().enumerate() {
        println!("  {hour:2}: {count}");
    }
    Ok(())
}
