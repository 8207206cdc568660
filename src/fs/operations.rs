use std::cmp::Ordering;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One immediate child of a directory, as reported by a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub path: PathBuf,
    pub is_directory: bool,
}

/// Explorer ordering: directories first, then by name.
///
/// Names compare case-insensitively with a case-sensitive tiebreak so the
/// order is total and stable across refreshes.
pub fn compare_entries(a_name: &str, a_dir: bool, b_name: &str, b_dir: bool) -> Ordering {
    b_dir
        .cmp(&a_dir)
        .then_with(|| a_name.to_lowercase().cmp(&b_name.to_lowercase()))
        .then_with(|| a_name.cmp(b_name))
}

/// Sort a listing in explorer order.
pub fn sort_entries(entries: &mut [DirEntry]) {
    entries.sort_by(|a, b| compare_entries(&a.name, a.is_directory, &b.name, b.is_directory));
}

/// List the immediate children of `dir`, sorted in explorer order.
///
/// Entries that cannot be inspected (permission denied, vanished mid-read)
/// are skipped; failing to open `dir` itself is an error.
pub fn list_directory(dir: &Path) -> io::Result<Vec<DirEntry>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        let file_type = match entry.file_type() {
            Ok(t) => t,
            Err(_) => continue,
        };
        entries.push(DirEntry {
            name: entry.file_name().to_string_lossy().to_string(),
            path: entry.path(),
            is_directory: file_type.is_dir(),
        });
    }
    sort_entries(&mut entries);
    Ok(entries)
}

/// Create an empty file, failing with `AlreadyExists` if anything is at `path`.
pub fn create_file(path: &Path) -> io::Result<()> {
    fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    Ok(())
}

/// Create a new directory at the given path.
pub fn create_dir(path: &Path) -> io::Result<()> {
    fs::create_dir(path)
}

/// Check a user-supplied file or folder name.
///
/// The name must be non-empty after trimming and must be exactly one normal
/// path component (no separators, no `..`).
pub fn validate_entry_name(value: &str) -> Result<&str, &'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("Name cannot be empty");
    }
    let mut components = Path::new(trimmed).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(trimmed),
        _ => Err("Name must be a single path component"),
    }
}
