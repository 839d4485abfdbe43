//! Input sources: in-memory collections and line-oriented text

use crate::error::{DatasetError, DatasetResult};
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Split `items` into exactly `slices` contiguous partitions of near-equal size
pub(crate) fn split_evenly<T: Clone>(items: &[T], slices: usize) -> Vec<Vec<T>> {
    let slices = slices.max(1);
    let len = items.len();
    (0..slices)
        .map(|i| {
            let start = i * len / slices;
            let end = (i + 1) * len / slices;
            items[start..end].to_vec()
        })
        .collect()
}

/// Read all lines of a file, or of every visible regular file in a directory
/// (sorted by file name). Files whose name starts with `.` or `_` are skipped.
pub(crate) fn read_lines(path: &Path) -> DatasetResult<Vec<String>> {
    let metadata = fs::metadata(path).map_err(|e| DatasetError::io(path, e))?;
    let files = if metadata.is_dir() {
        list_input_files(path)?
    } else {
        vec![path.to_path_buf()]
    };

    let mut lines = Vec::new();
    for file in &files {
        let reader = BufReader::new(File::open(file).map_err(|e| DatasetError::io(file, e))?);
        for line in reader.lines() {
            lines.push(line.map_err(|e| DatasetError::io(file, e))?);
        }
    }
    debug!("Read {} lines from {} file(s) under {:?}", lines.len(), files.len(), path);
    Ok(lines)
}

fn list_input_files(dir: &Path) -> DatasetResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| DatasetError::io(dir, e))? {
        let entry = entry.map_err(|e| DatasetError::io(dir, e))?;
        let hidden = entry
            .file_name()
            .to_str()
            .map_or(true, |name| name.starts_with('.') || name.starts_with('_'));
        let is_file = entry
            .file_type()
            .map_err(|e| DatasetError::io(entry.path(), e))?
            .is_file();
        if is_file && !hidden {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
