//! Directory crawler: enumerates every eligible prompt file under a root.
//!
//! Enumeration is all-or-nothing — a directory that cannot be read aborts the
//! whole crawl. Individual documents that fail to load are logged and skipped
//! so one bad file never hides the rest of the library.

use crate::loader;
use crate::record::Record;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;
use walkdir::WalkDir;

/// Extensions of files that are considered prompt documents.
pub const VALID_EXTENSIONS: [&str; 6] = ["md", "markdown", "mdx", "txt", "yaml", "yml"];

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("failed to read directory entry under {root}: {source}")]
    Walk {
        root: String,
        #[source]
        source: walkdir::Error,
    },
}

fn is_ignored_dir(name: &str) -> bool {
    name.starts_with('.') || name == "node_modules"
}

/// Whether a file path has an allow-listed extension (case-insensitive).
pub fn has_valid_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .is_some_and(|ext| VALID_EXTENSIONS.contains(&ext.as_str()))
}

/// Whether a path under `root` would be picked up by a crawl: no ignored
/// directory on its relative path, and an allow-listed extension.
pub fn is_eligible(root: &Path, path: &Path) -> bool {
    if !has_valid_extension(path) {
        return false;
    }
    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };
    let mut components: Vec<&std::ffi::OsStr> = relative
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect();
    components.pop(); // the filename itself is not subject to the dir rule
    !components
        .iter()
        .filter_map(|part| part.to_str())
        .any(is_ignored_dir)
}

fn eligible_files(root: &Path) -> Result<Vec<PathBuf>, CrawlError> {
    let walk = WalkDir::new(root).into_iter().filter_entry(|entry| {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return true;
        }
        entry
            .file_name()
            .to_str()
            .map(|name| !is_ignored_dir(name))
            .unwrap_or(true)
    });

    let mut files = Vec::new();
    for entry in walk {
        let entry = entry.map_err(|source| CrawlError::Walk {
            root: root.display().to_string(),
            source,
        })?;
        if entry.file_type().is_file() && has_valid_extension(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Crawls the root and loads every eligible document.
///
/// File loading runs in parallel across the discovered set; the function
/// returns only once every file has been visited. Order of the result is not
/// significant.
pub fn crawl(root: &Path) -> Result<Vec<Record>, CrawlError> {
    let files = eligible_files(root)?;
    let records = files
        .par_iter()
        .filter_map(|path| match loader::load_document(root, path) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping prompt file");
                None
            }
        })
        .collect();
    Ok(records)
}
