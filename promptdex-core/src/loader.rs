//! Document loader: turns one file on disk into a [`Record`].
//!
//! The loader never fails the batch for a single bad document. Read and YAML
//! parse failures are reported to the caller as a [`LoadError`] so the caller
//! can log and skip; schema violations become validation issues attached to
//! the record itself.

use crate::frontmatter::{self, ValidationIssue};
use crate::record::{self, Record};
use chrono::{DateTime, Utc};
use std::io;
use std::path::{Component, Path};
use std::fs;
use thiserror::Error;

pub const MISSING_FRONT_MATTER_MESSAGE: &str = "Missing front matter metadata";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("invalid YAML front matter in {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("{path} is not inside the prompts root")]
    OutsideRoot { path: String },
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}

fn relative_id(root: &Path, file_path: &Path) -> Result<String, LoadError> {
    let relative = file_path
        .strip_prefix(root)
        .map_err(|_| LoadError::OutsideRoot {
            path: display_path(file_path),
        })?;
    let mut parts = Vec::new();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            parts.push(part.to_string_lossy().into_owned());
        }
    }
    Ok(parts.join("/"))
}

/// The stable record id a file under `root` would be indexed as, if any.
pub fn record_id(root: &Path, file_path: &Path) -> Option<String> {
    relative_id(root, file_path).ok()
}

fn modified_time(path: &Path) -> Result<DateTime<Utc>, LoadError> {
    let metadata = fs::metadata(path).map_err(|source| LoadError::Io {
        path: display_path(path),
        source,
    })?;
    let modified = metadata.modified().map_err(|source| LoadError::Io {
        path: display_path(path),
        source,
    })?;
    Ok(DateTime::<Utc>::from(modified))
}

/// Loads a single document into a [`Record`].
///
/// The front matter block is split from the body and schema-validated; the
/// body, excerpt, and tags are computed whether or not the metadata is valid,
/// so invalid documents stay visible in listings. A document with an absent or
/// empty metadata block gets exactly one synthetic issue.
pub fn load_document(root: &Path, file_path: &Path) -> Result<Record, LoadError> {
    let raw = fs::read_to_string(file_path).map_err(|source| LoadError::Io {
        path: display_path(file_path),
        source,
    })?;
    let id = relative_id(root, file_path)?;
    let modified_at = modified_time(file_path)?;

    let (block, body) = frontmatter::split_document(&raw);

    let mut front_matter = None;
    let mut validation_issues = Vec::new();
    match block {
        Some(block) if !block.trim().is_empty() => {
            let value: serde_yaml::Value =
                serde_yaml::from_str(block).map_err(|source| LoadError::Yaml {
                    path: display_path(file_path),
                    source,
                })?;
            match frontmatter::validate_front_matter(&value) {
                Ok(parsed) => front_matter = Some(parsed),
                Err(issues) => validation_issues = issues,
            }
        }
        _ => {
            validation_issues.push(ValidationIssue::new(MISSING_FRONT_MATTER_MESSAGE, None));
        }
    }

    let content = body.trim_start_matches(['\r', '\n']).to_string();
    let declared_tags = front_matter
        .as_ref()
        .map(|fm| fm.tags.clone())
        .unwrap_or_default();
    let tags = record::derive_tags(&id, &declared_tags);
    let excerpt = record::build_excerpt(&content);

    Ok(Record {
        id,
        file_path: file_path.to_path_buf(),
        root_path: root.to_path_buf(),
        content,
        excerpt,
        front_matter,
        tags,
        modified_at,
        validation_issues,
    })
}
