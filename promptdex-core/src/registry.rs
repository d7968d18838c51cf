//! Process-wide registry of prompt indices, one per resolved root path.
//!
//! Callers that name the same directory through different spellings (trailing
//! slash, `..` segments, symlinks) share a single [`Index`] instance, so the
//! directory is crawled and watched exactly once.

use crate::index::{Index, IndexError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Default)]
pub struct IndexRegistry {
    indices: Mutex<HashMap<PathBuf, Arc<Index>>>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, Arc<Index>>> {
        self.indices.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn resolve(root: &Path) -> Result<PathBuf, IndexError> {
        root.canonicalize().map_err(|source| IndexError::Root {
            path: root.display().to_string(),
            source,
        })
    }

    /// Returns the shared index for `root`, creating and initializing it on
    /// first use. Initialization errors are returned to the caller and the
    /// entry stays registered, so a later call can retry.
    pub fn get_or_init(&self, root: &Path) -> Result<Arc<Index>, IndexError> {
        let resolved = Self::resolve(root)?;
        let index = {
            let mut indices = self.lock();
            indices
                .entry(resolved.clone())
                .or_insert_with(|| {
                    debug!(root = %resolved.display(), "creating prompt index");
                    Arc::new(Index::new(resolved.clone()))
                })
                .clone()
        };
        index.initialize()?;
        Ok(index)
    }

    /// Disposes and forgets the index for `root`, if one exists.
    pub fn dispose(&self, root: &Path) {
        let Ok(resolved) = Self::resolve(root) else {
            return;
        };
        let removed = self.lock().remove(&resolved);
        if let Some(index) = removed {
            index.dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_same_root_shares_one_index() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("a.md"),
            "---\nschema_version: 1\ntitle: A\n---\nBody",
        )
        .unwrap();

        let registry = IndexRegistry::new();
        let first = registry.get_or_init(dir.path()).unwrap();
        // Different spelling of the same directory.
        let spelled = dir.path().join(".");
        let second = registry.get_or_init(&spelled).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.get_all().len(), 1);
    }

    #[test]
    fn test_distinct_roots_get_distinct_indices() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();

        let registry = IndexRegistry::new();
        let first = registry.get_or_init(a.path()).unwrap();
        let second = registry.get_or_init(b.path()).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        let registry = IndexRegistry::new();
        let result = registry.get_or_init(&dir.path().join("absent"));
        assert!(matches!(result, Err(IndexError::Root { .. })));
    }

    #[test]
    fn test_dispose_forgets_the_index() {
        let dir = TempDir::new().unwrap();
        let registry = IndexRegistry::new();
        let first = registry.get_or_init(dir.path()).unwrap();

        registry.dispose(dir.path());
        assert!(first.get_all().is_empty());

        let second = registry.get_or_init(dir.path()).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
