//! Link intake from a links file and/or literal arguments.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Failure reading a links file.
#[derive(Debug, thiserror::Error)]
#[error("Cannot read links file '{path}': {source}")]
pub struct LinksFileError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Gathers raw links, file entries first, dropping blanks and repeats.
///
/// Each non-blank line of `file` is one link. Whitespace is trimmed; the
/// first occurrence of a link keeps its position.
///
/// # Errors
///
/// [`LinksFileError`] when `file` cannot be read.
pub fn collect_links(file: Option<&Path>, literals: &[String]) -> Result<Vec<String>, LinksFileError> {
    let contents = match file {
        Some(path) => fs::read_to_string(path).map_err(|source| LinksFileError {
            path: path.to_path_buf(),
            source,
        })?,
        None => String::new(),
    };

    let mut seen = HashSet::new();
    let links = contents
        .lines()
        .chain(literals.iter().map(String::as_str))
        .map(str::trim)
        .filter(|link| !link.is_empty())
        .filter(|link| seen.insert(*link))
        .map(str::to_string)
        .collect();
    Ok(links)
}
