// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Directory-watch event source.
//!
//! One kernel watch per unique directory; files are matched by glob
//! against their basename, in registration order, first match wins.
//!
//! The kernel reports both create and close-write for ordinary files but
//! only create for sockets, fifos and symlinks (the creator never closes
//! them before the watcher needs them). Firing on create alone would
//! trigger before writers are done; firing on close-write alone would
//! miss the special files; firing on both would double-fire. So the
//! source takes both events and delivers close-write for regular files,
//! create for everything else.

use crate::RegisterError;
use glob::Pattern;
use indexmap::IndexMap;
use notify::event::{AccessKind, AccessMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use rondo_core::EventId;
use rondo_engine::{BoxFuture, HandlerResult, RunPath, Runtime, World};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// The stored shape of a file handler.
pub type FileHandler = Arc<dyn Fn(World, RunPath) -> BoxFuture<HandlerResult<()>> + Send + Sync>;

#[derive(Clone)]
struct WatchRecord {
    pattern: Pattern,
    id: EventId,
}

#[derive(Default)]
struct FileInner {
    watches: IndexMap<PathBuf, Vec<WatchRecord>>,
    handlers: IndexMap<EventId, FileHandler>,
}

/// Registry and dispatcher for filesystem events.
#[derive(Clone, Default)]
pub struct FileSource {
    inner: Arc<Mutex<FileInner>>,
}

impl FileSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Watch `dir` for files matching `fileglob` (matched against the
    /// basename). The directory must exist; the event id is
    /// `"<absolute_dir>/<glob>"`.
    pub fn event<F, Fut>(
        &self,
        dir: impl AsRef<Path>,
        fileglob: &str,
        handler: F,
    ) -> Result<EventId, RegisterError>
    where
        F: Fn(World, RunPath) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<()>> + Send + 'static,
    {
        let dir = std::fs::canonicalize(dir.as_ref())
            .map_err(|_| RegisterError::NotADirectory(dir.as_ref().to_path_buf()))?;
        if !dir.is_dir() {
            return Err(RegisterError::NotADirectory(dir));
        }
        let pattern = Pattern::new(fileglob).map_err(|source| RegisterError::InvalidGlob {
            pattern: fileglob.to_string(),
            source,
        })?;

        let id = EventId::new(format!("{}/{fileglob}", dir.display()));
        let mut inner = self.inner.lock();
        if inner.handlers.contains_key(&id) {
            return Err(RegisterError::DuplicateEvent(id));
        }
        inner.watches.entry(dir).or_default().push(WatchRecord {
            pattern,
            id: id.clone(),
        });
        inner
            .handlers
            .insert(id.clone(), Arc::new(move |world, path| Box::pin(handler(world, path))));
        Ok(id)
    }

    pub fn ids(&self) -> Vec<EventId> {
        self.inner.lock().handlers.keys().cloned().collect()
    }

    pub fn has(&self, id: &EventId) -> bool {
        self.inner.lock().handlers.contains_key(id)
    }

    pub fn summary(&self) -> String {
        let inner = self.inner.lock();
        let mut text = String::new();
        for (dir, records) in &inner.watches {
            text.push_str(&format!("Watching {}:\n", dir.display()));
            for record in records {
                text.push_str(&format!("    {}\n", record.pattern.as_str()));
            }
        }
        text
    }

    /// Re-invoke the handler of `world.id()` against a recorded run; the
    /// path comes from the journaled `*path*` entry.
    pub fn replay(&self, world: World) -> Option<BoxFuture<HandlerResult<()>>> {
        let handler = self.inner.lock().handlers.get(world.id())?.clone();
        Some(Box::pin(async move {
            let bytes = world.store().load(&world, "*path*").await?;
            let path = String::from_utf8(bytes)?;
            let tracked = world.file(path);
            handler(world, tracked).await
        }))
    }

    /// Watch loop; returns when the runtime shuts down.
    pub async fn run(&self, runtime: Runtime) {
        let (watches, handlers) = {
            let inner = self.inner.lock();
            (inner.watches.clone(), inner.handlers.clone())
        };
        if watches.is_empty() {
            return;
        }

        let (tx, mut rx) = mpsc::channel::<notify::Result<notify::Event>>(256);
        // the notify callback runs on the watcher's own thread
        let mut watcher =
            match RecommendedWatcher::new(move |event| drop(tx.blocking_send(event)), notify::Config::default()) {
                Ok(watcher) => watcher,
                Err(error) => {
                    error!(%error, "could not create the file watcher");
                    return;
                }
            };
        for (dir, records) in &watches {
            if let Err(error) = watcher.watch(dir, RecursiveMode::NonRecursive) {
                error!(dir = %dir.display(), %error, "could not watch directory");
                continue;
            }
            info!(dir = %dir.display(), "watching directory");
            for record in records {
                info!("    {} -> {}", record.pattern.as_str(), record.id);
            }
        }

        loop {
            tokio::select! {
                () = runtime.cancel_token().cancelled() => break,
                event = rx.recv() => match event {
                    None => break,
                    Some(Err(error)) => warn!(%error, "watch error"),
                    Some(Ok(event)) => dispatch(&runtime, &watches, &handlers, event),
                }
            }
        }
        // dropping the watcher releases the kernel watches
    }
}

fn dispatch(
    runtime: &Runtime,
    watches: &IndexMap<PathBuf, Vec<WatchRecord>>,
    handlers: &IndexMap<EventId, FileHandler>,
    event: notify::Event,
) {
    let close_write = matches!(
        event.kind,
        EventKind::Access(AccessKind::Close(AccessMode::Write))
    );
    let create = matches!(event.kind, EventKind::Create(_));
    if !close_write && !create {
        return;
    }

    for path in event.paths {
        let regular = std::fs::symlink_metadata(&path)
            .map(|meta| meta.file_type().is_file())
            .unwrap_or(false);
        // regular files fire on close-write, special files on create;
        // the other event of the pair is dropped
        if regular != close_write {
            debug!(path = %path.display(), kind = ?event.kind, "skipping paired event");
            continue;
        }

        let Some(records) = path.parent().and_then(|parent| watches.get(parent)) else {
            continue;
        };
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        let Some(record) = records.iter().find(|record| record.pattern.matches(name)) else {
            continue;
        };
        let Some(handler) = handlers.get(&record.id) else {
            continue;
        };

        debug!(path = %path.display(), id = %record.id, "file event");
        let handler = handler.clone();
        let path = path.clone();
        runtime.spawn_run(record.id.clone(), move |world| {
            Box::pin(async move {
                let tracked = world.file(&path);
                world.store().store(
                    &world,
                    "*path*",
                    path.to_string_lossy().into_owned().into_bytes(),
                )?;
                handler(world, tracked).await
            })
        });
    }
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
