//! # Prompt Index
//!
//! The authoritative in-memory collection of prompt [`Record`]s for one root
//! directory. The index crawls the root once on [`Index::initialize`], keeps
//! itself live through a filesystem watcher, and rebuilds its search
//! structure after every mutation.
//!
//! Lifecycle: `Uninitialized → Initializing → Ready`, with
//! `Ready ⇄ Refreshing` cycles and a terminal `Disposed` state. A refresh is
//! all-or-nothing: a failed crawl leaves the previous record set untouched.

use crate::crawler::{self, CrawlError};
use crate::loader;
use crate::record::Record;
use crate::search::{DEFAULT_SEARCH_LIMIT, SearchIndex, SearchResult};
use crate::watcher::{self, ChangeEvent, WatchHandle};
use chrono::Utc;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, warn};

/// Token returned by [`Index::subscribe`], consumed by [`Index::unsubscribe`].
pub type SubscriptionId = u64;

type Listener = Arc<dyn Fn(&[Record]) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Uninitialized,
    Initializing,
    Ready,
    Refreshing,
    Disposed,
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("prompt index has been disposed")]
    Disposed,
    #[error(transparent)]
    Crawl(#[from] CrawlError),
    #[error("failed to resolve prompts root {path}: {source}")]
    Root {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

struct Inner {
    phase: Phase,
    records: HashMap<String, Record>,
    search: SearchIndex,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: SubscriptionId,
    watch: Option<WatchHandle>,
}

/// The live index for one resolved root path.
///
/// Exactly one instance exists per root (see [`crate::registry`]); it
/// exclusively owns all records, handing out clones on read.
pub struct Index {
    root: PathBuf,
    inner: Mutex<Inner>,
}

impl Index {
    pub(crate) fn new(root: PathBuf) -> Self {
        Index {
            root,
            inner: Mutex::new(Inner {
                phase: Phase::Uninitialized,
                records: HashMap::new(),
                search: SearchIndex::default(),
                listeners: Vec::new(),
                next_subscription: 0,
                watch: None,
            }),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sorted_records(inner: &Inner) -> Vec<Record> {
        let mut records: Vec<Record> = inner.records.values().cloned().collect();
        records.sort_by(|a, b| {
            b.modified_at
                .cmp(&a.modified_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        records
    }

    fn replace_records(inner: &mut Inner, records: Vec<Record>) {
        inner.records = records
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();
        Self::rebuild_search(inner);
    }

    fn rebuild_search(inner: &mut Inner) {
        let sorted = Self::sorted_records(inner);
        inner.search = SearchIndex::build(&sorted);
    }

    fn notify(&self) {
        let (snapshot, listeners) = {
            let inner = self.lock();
            if inner.listeners.is_empty() {
                return;
            }
            let listeners: Vec<Listener> =
                inner.listeners.iter().map(|(_, l)| l.clone()).collect();
            (Self::sorted_records(&inner), listeners)
        };
        for listener in listeners {
            let result = panic::catch_unwind(AssertUnwindSafe(|| listener(&snapshot)));
            if result.is_err() {
                error!("prompt index listener panicked");
            }
        }
    }

    /// Crawls the root and starts watching it. Idempotent: calling again on a
    /// ready index is a no-op; concurrent calls converge to one crawl.
    pub fn initialize(self: &Arc<Self>) -> Result<(), IndexError> {
        {
            let mut inner = self.lock();
            match inner.phase {
                Phase::Disposed => return Err(IndexError::Disposed),
                Phase::Ready | Phase::Refreshing | Phase::Initializing => return Ok(()),
                Phase::Uninitialized => inner.phase = Phase::Initializing,
            }

            match crawler::crawl(&self.root) {
                Ok(records) => {
                    debug!(root = %self.root.display(), count = records.len(), "prompt index initialized");
                    Self::replace_records(&mut inner, records);
                    inner.phase = Phase::Ready;
                }
                Err(e) => {
                    inner.phase = Phase::Uninitialized;
                    return Err(e.into());
                }
            }

            match watcher::watch(self.root.clone(), Arc::downgrade(self)) {
                Ok(handle) => inner.watch = Some(handle),
                // A dead watcher degrades liveness, not correctness; refresh
                // still works.
                Err(e) => warn!(error = %e, "failed to watch prompts directory"),
            }
        }
        self.notify();
        Ok(())
    }

    /// Full re-crawl, replacing the record set atomically from the caller's
    /// point of view. On error the previous record set is kept as-is.
    pub fn refresh(&self) -> Result<(), IndexError> {
        {
            let mut inner = self.lock();
            let previous = match inner.phase {
                Phase::Disposed => return Err(IndexError::Disposed),
                phase => phase,
            };
            inner.phase = Phase::Refreshing;

            match crawler::crawl(&self.root) {
                Ok(records) => {
                    Self::replace_records(&mut inner, records);
                    inner.phase = Phase::Ready;
                }
                Err(e) => {
                    inner.phase = previous;
                    return Err(e.into());
                }
            }
        }
        self.notify();
        Ok(())
    }

    /// All current records, most recently modified first.
    pub fn get_all(&self) -> Vec<Record> {
        let inner = self.lock();
        if inner.phase == Phase::Disposed {
            return Vec::new();
        }
        Self::sorted_records(&inner)
    }

    /// Fuzzy search over the current record set.
    ///
    /// An empty or whitespace-only query is a listing, not a search: it
    /// returns [`Index::get_all`] truncated to `limit`, scored by position.
    pub fn search(&self, query: &str, limit: Option<usize>) -> Vec<SearchResult> {
        let limit = limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        let inner = self.lock();
        if inner.phase == Phase::Disposed {
            return Vec::new();
        }

        if query.trim().is_empty() {
            return Self::sorted_records(&inner)
                .into_iter()
                .take(limit)
                .enumerate()
                .map(|(position, record)| SearchResult {
                    record,
                    score: position as f64,
                })
                .collect();
        }

        inner
            .search
            .query(query, Utc::now(), limit)
            .into_iter()
            .filter_map(|(id, score)| {
                inner
                    .records
                    .get(&id)
                    .map(|record| SearchResult {
                        record: record.clone(),
                        score,
                    })
            })
            .collect()
    }

    /// Registers a listener invoked with the updated record set after any
    /// mutation. A listener that panics is caught and logged.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&[Record]) + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        let id = inner.next_subscription;
        inner.next_subscription += 1;
        inner.listeners.push((id, Arc::new(listener)));
        id
    }

    /// Removes a listener. Unknown ids are ignored, so calling twice is safe.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut inner = self.lock();
        inner.listeners.retain(|(listener_id, _)| *listener_id != id);
    }

    /// Stops watching and clears all state. The index is unusable afterwards.
    pub fn dispose(&self) {
        let mut inner = self.lock();
        inner.phase = Phase::Disposed;
        inner.records.clear();
        inner.search = SearchIndex::default();
        inner.listeners.clear();
        inner.watch = None;
    }

    /// Applies one watcher event: ingest or remove a single path, rebuild the
    /// search structure, notify subscribers. Fully applied before the watcher
    /// thread hands over the next event.
    pub(crate) fn apply_event(&self, event: ChangeEvent) {
        let changed = {
            let mut inner = self.lock();
            if !matches!(inner.phase, Phase::Ready | Phase::Refreshing) {
                return;
            }
            let changed = match event {
                ChangeEvent::Upsert(path) => {
                    if path.is_file() {
                        match loader::load_document(&self.root, &path) {
                            Ok(record) => {
                                inner.records.insert(record.id.clone(), record);
                                true
                            }
                            Err(e) => {
                                warn!(path = %path.display(), error = %e, "skipping changed prompt file");
                                false
                            }
                        }
                    } else {
                        // Settled but gone again: treat as a removal.
                        Self::remove_path(&mut inner, &self.root, &path)
                    }
                }
                ChangeEvent::Remove(path) => Self::remove_path(&mut inner, &self.root, &path),
            };
            if changed {
                Self::rebuild_search(&mut inner);
            }
            changed
        };
        if changed {
            self.notify();
        }
    }

    fn remove_path(inner: &mut Inner, root: &Path, path: &Path) -> bool {
        loader::record_id(root, path)
            .map(|id| inner.records.remove(&id).is_some())
            .unwrap_or(false)
    }
}
