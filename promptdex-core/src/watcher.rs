//! Filesystem change watcher feeding incremental index updates.
//!
//! Events flow from a `notify` watcher through an mpsc channel into a single
//! background thread, which applies a write-stabilization window before
//! treating an added or changed file as settled. Removals are applied
//! immediately. The thread holds only a `Weak` reference to the index and
//! exits once the index is gone or the watcher handle is dropped.

use crate::crawler;
use crate::index::Index;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};
use tracing::warn;

/// Pause before a changed file is treated as settled, so a file is never
/// indexed mid-write.
const WRITE_STABILIZATION: Duration = Duration::from_millis(200);
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A typed change applied to the index by the watcher thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ChangeEvent {
    Upsert(PathBuf),
    Remove(PathBuf),
}

/// Keeps the underlying watcher alive. Dropping the handle closes the event
/// channel, which stops the background thread.
pub(crate) struct WatchHandle {
    _watcher: RecommendedWatcher,
}

pub(crate) fn watch(root: PathBuf, index: Weak<Index>) -> notify::Result<WatchHandle> {
    let (tx, rx) = mpsc::channel::<notify::Result<Event>>();
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            let _ = tx.send(res);
        },
        Config::default(),
    )?;
    watcher.watch(&root, RecursiveMode::Recursive)?;

    thread::Builder::new()
        .name("promptdex-watch".to_string())
        .spawn(move || debounce_loop(root, rx, index))
        .map_err(notify::Error::io)?;

    Ok(WatchHandle { _watcher: watcher })
}

enum Step {
    Event(notify::Result<Event>),
    Timeout,
    Closed,
}

fn debounce_loop(root: PathBuf, rx: Receiver<notify::Result<Event>>, index: Weak<Index>) {
    let mut pending: HashMap<PathBuf, Instant> = HashMap::new();

    loop {
        let step = if pending.is_empty() {
            match rx.recv() {
                Ok(event) => Step::Event(event),
                Err(_) => Step::Closed,
            }
        } else {
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(event) => Step::Event(event),
                Err(RecvTimeoutError::Timeout) => Step::Timeout,
                Err(RecvTimeoutError::Disconnected) => Step::Closed,
            }
        };

        match step {
            Step::Closed => return,
            Step::Timeout => {}
            Step::Event(Err(e)) => {
                warn!(error = %e, "prompt watcher error");
            }
            Step::Event(Ok(event)) => {
                let Some(index) = index.upgrade() else {
                    return;
                };
                dispatch(&root, &event, &mut pending, &index);
            }
        }

        if !pending.is_empty() {
            let now = Instant::now();
            let settled: Vec<PathBuf> = pending
                .iter()
                .filter(|(_, seen)| now.duration_since(**seen) >= WRITE_STABILIZATION)
                .map(|(path, _)| path.clone())
                .collect();
            if !settled.is_empty() {
                let Some(index) = index.upgrade() else {
                    return;
                };
                for path in settled {
                    pending.remove(&path);
                    index.apply_event(ChangeEvent::Upsert(path));
                }
            }
        }
    }
}

fn dispatch(
    root: &std::path::Path,
    event: &Event,
    pending: &mut HashMap<PathBuf, Instant>,
    index: &Arc<Index>,
) {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) => {
            for path in &event.paths {
                if !crawler::is_eligible(root, path) {
                    continue;
                }
                // A rename reports the vacated path as a modification; the
                // upsert path resolves it to a removal when the file is gone.
                if path.exists() {
                    pending.insert(path.clone(), Instant::now());
                } else {
                    pending.remove(path);
                    index.apply_event(ChangeEvent::Remove(path.clone()));
                }
            }
        }
        EventKind::Remove(_) => {
            for path in &event.paths {
                if !crawler::is_eligible(root, path) {
                    continue;
                }
                pending.remove(path);
                index.apply_event(ChangeEvent::Remove(path.clone()));
            }
        }
        _ => {}
    }
}
