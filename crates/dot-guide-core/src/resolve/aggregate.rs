//! Aggregation across categories and collections.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::discovery::FileInfo;
use crate::error::Result;

/// Concatenate discovery results, keeping the first occurrence of each
/// absolute path.
///
/// Earlier lists win, so a collection-tagged entry listed before a bare
/// category result keeps its richer metadata.
pub fn aggregate(lists: Vec<Vec<FileInfo>>) -> Vec<FileInfo> {
    let mut seen: HashSet<PathBuf> = HashSet::new();
    lists
        .into_iter()
        .flatten()
        .filter(|file| seen.insert(file.absolute_path.clone()))
        .collect()
}

/// Load each file's content once. Results line up with `files`.
pub fn read_contents(files: &mut [FileInfo]) -> Vec<Result<()>> {
    files
        .iter_mut()
        .map(|file| file.load_content().map(|_| ()))
        .collect()
}
