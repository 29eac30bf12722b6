// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The in-flight run journal.
//!
//! Holds every currently-open run in memory, merges live writes with
//! backend reads during replay, and flushes a run to the backend when it
//! finishes. `store` and `tag_run` are synchronous; `begin_run` and
//! `finish_run` are the only suspension points in the journal lifecycle.

use crate::error::StoreError;
use crate::world::World;
use crate::{BoxFuture, HandlerResult};
use parking_lot::Mutex;
use rondo_core::{Clock, EventId, ReplayCursor, Run, RunId, RunSummary, SystemClock};
use rondo_storage::{Backend, BackendError};
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-key payload transform applied at the backend boundary.
type TransformFn = dyn Fn(&str, Vec<u8>) -> Vec<u8> + Send + Sync;

/// Callback fired after a live run is flushed.
type SubmitFn = dyn Fn(SubmitInfo) -> BoxFuture<HandlerResult<()>> + Send + Sync;

/// What a submit hook receives: the flushed run, payloads elided.
#[derive(Debug, Clone)]
pub struct SubmitInfo {
    pub id: EventId,
    pub runid: RunId,
    pub ts: f64,
    pub tags: BTreeSet<String>,
}

struct OngoingRun {
    run: Run,
    cursor: ReplayCursor,
}

/// Journal of in-flight runs plus the durable backend behind them.
pub struct Store {
    backend: Arc<dyn Backend>,
    clock: Arc<dyn Clock>,
    ongoing: Mutex<HashMap<(EventId, RunId), OngoingRun>>,
    compress: Option<Arc<TransformFn>>,
    decompress: Option<Arc<TransformFn>>,
    submit: Mutex<Vec<Arc<SubmitFn>>>,
}

impl Store {
    pub fn new(backend: impl Backend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
            clock: Arc::new(SystemClock),
            ongoing: Mutex::new(HashMap::new()),
            compress: None,
            decompress: None,
            submit: Mutex::new(Vec::new()),
        }
    }

    /// Use a different clock for run and entry timestamps.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Install per-key payload transforms applied before backend writes
    /// and after backend reads.
    pub fn with_compression(
        mut self,
        compress: impl Fn(&str, Vec<u8>) -> Vec<u8> + Send + Sync + 'static,
        decompress: impl Fn(&str, Vec<u8>) -> Vec<u8> + Send + Sync + 'static,
    ) -> Self {
        self.compress = Some(Arc::new(compress));
        self.decompress = Some(Arc::new(decompress));
        self
    }

    /// Register a callback fired after each live run flush.
    ///
    /// Callbacks run in isolation: one failing never suppresses another.
    pub fn on_submit<F, Fut>(&self, hook: F)
    where
        F: Fn(SubmitInfo) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<()>> + Send + 'static,
    {
        self.submit
            .lock()
            .push(Arc::new(move |info| Box::pin(hook(info))));
    }

    pub async fn open(&self) -> Result<(), StoreError> {
        Ok(self.backend.open().await?)
    }

    pub async fn close(&self) -> Result<(), StoreError> {
        Ok(self.backend.close().await?)
    }

    /// Open a run for `world`.
    ///
    /// A replaying world resumes the recorded run, fetched from the
    /// backend unless some other handle already opened it; a live world
    /// gets a fresh empty run stamped with the current time.
    pub async fn begin_run(&self, world: &World) -> Result<(), StoreError> {
        let key = (world.id().clone(), world.runid().clone());
        if world.is_replaying() {
            if self.ongoing.lock().contains_key(&key) {
                return Ok(());
            }
            let run = self.fetch_decompressed(world.runid()).await?;
            self.ongoing.lock().entry(key).or_insert(OngoingRun {
                run,
                cursor: ReplayCursor::new(),
            });
        } else {
            debug!(id = %world.id(), runid = %world.runid(), "opening run");
            let run = Run::new(world.runid().clone(), self.clock.now_ts());
            self.ongoing.lock().insert(
                key,
                OngoingRun {
                    run,
                    cursor: ReplayCursor::new(),
                },
            );
        }
        Ok(())
    }

    /// Journal one observation. Synchronous: never suspends.
    pub fn store(&self, world: &World, key: &str, data: Vec<u8>) -> Result<(), StoreError> {
        if world.is_replaying() {
            return Err(StoreError::ReplayWrite);
        }
        let ts = self.clock.now_ts();
        let observer = world.pacifier().map(|p| (p, data.clone()));
        {
            let mut ongoing = self.ongoing.lock();
            let entry = ongoing
                .get_mut(&(world.id().clone(), world.runid().clone()))
                .ok_or_else(|| StoreError::NoOpenRun {
                    id: world.id().clone(),
                    runid: world.runid().clone(),
                })?;
            entry.run.record(key, ts, data);
        }
        if let Some((pacifier, bytes)) = observer {
            pacifier.storing(world, key, ts, &bytes);
        }
        Ok(())
    }

    /// Read back a recorded observation during a replay.
    ///
    /// Follows the write-side key disambiguation in mirror: repeated
    /// reads of one key yield the recorded writes in order. The bytes
    /// pass through the pacifier, which may substitute them.
    pub async fn load(&self, world: &World, key: &str) -> Result<Vec<u8>, StoreError> {
        let pacifier = world
            .pacifier()
            .filter(|p| !p.is_new())
            .ok_or(StoreError::LiveLoad)?;
        let (ts, data) = {
            let mut ongoing = self.ongoing.lock();
            let entry = ongoing
                .get_mut(&(world.id().clone(), world.runid().clone()))
                .ok_or_else(|| StoreError::NoOpenRun {
                    id: world.id().clone(),
                    runid: world.runid().clone(),
                })?;
            let OngoingRun {
                ref run,
                ref mut cursor,
            } = *entry;
            let found = cursor
                .next(run, key)
                .ok_or_else(|| StoreError::MissingKey(key.to_string()))?;
            (found.ts, found.data.clone())
        };
        Ok(pacifier.loading(world, key, ts, data).await)
    }

    /// Add a tag to the open run. No-op during replay.
    pub fn tag_run(&self, world: &World, tag: &str) -> Result<(), StoreError> {
        if world.is_replaying() {
            return Ok(());
        }
        let mut ongoing = self.ongoing.lock();
        let entry = ongoing
            .get_mut(&(world.id().clone(), world.runid().clone()))
            .ok_or_else(|| StoreError::NoOpenRun {
                id: world.id().clone(),
                runid: world.runid().clone(),
            })?;
        entry.run.tags.insert(tag.to_string());
        Ok(())
    }

    /// Close a run: replays are dropped, live runs flush to the backend
    /// and fire the submit hooks.
    pub async fn finish_run(&self, world: &World) -> Result<(), StoreError> {
        let key = (world.id().clone(), world.runid().clone());
        let entry = self
            .ongoing
            .lock()
            .remove(&key)
            .ok_or_else(|| StoreError::NoOpenRun {
                id: world.id().clone(),
                runid: world.runid().clone(),
            })?;
        if world.is_replaying() {
            return Ok(());
        }

        let mut run = entry.run;
        let info = SubmitInfo {
            id: world.id().clone(),
            runid: world.runid().clone(),
            ts: run.ts,
            tags: run.tags.clone(),
        };
        if let Some(compress) = &self.compress {
            for (key, entry) in run.data.iter_mut() {
                entry.data = compress(key, std::mem::take(&mut entry.data));
            }
        }
        self.backend
            .storerun(world.id(), world.runid(), run)
            .await?;

        let hooks: Vec<Arc<SubmitFn>> = self.submit.lock().clone();
        for hook in hooks {
            if let Err(error) = hook(info.clone()).await {
                warn!(id = %info.id, runid = %info.runid, %error, "submit hook failed");
            }
        }
        Ok(())
    }

    async fn fetch_decompressed(&self, runid: &RunId) -> Result<Run, BackendError> {
        let mut run = self.backend.loadrun(runid).await?;
        if let Some(decompress) = &self.decompress {
            for (key, entry) in run.data.iter_mut() {
                entry.data = decompress(key, std::mem::take(&mut entry.data));
            }
        }
        Ok(run)
    }

    /// Fetch a persisted run, decompression applied.
    pub async fn loadrun(&self, runid: &RunId) -> Result<Run, StoreError> {
        Ok(self.fetch_decompressed(runid).await?)
    }

    /// List persisted runs of an event; see [`Backend::listruns`].
    pub async fn listruns(
        &self,
        id: &EventId,
        min_ts: f64,
        max_ts: f64,
        any_tag: &BTreeSet<String>,
    ) -> Result<Vec<RunSummary>, StoreError> {
        Ok(self.backend.listruns(id, min_ts, max_ts, any_tag).await?)
    }

    pub async fn knowntags(&self) -> Result<BTreeSet<String>, StoreError> {
        Ok(self.backend.knowntags().await?)
    }

    pub async fn status(&self) -> Result<String, StoreError> {
        Ok(self.backend.status().await?)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
