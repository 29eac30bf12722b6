// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory backend, for tests and ephemeral deployments.

use crate::{Backend, BackendError};
use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use rondo_core::{EventId, Run, RunId, RunSummary};
use std::collections::BTreeSet;

#[derive(Default)]
struct MemoryState {
    runs: IndexMap<EventId, IndexMap<RunId, Run>>,
    tags: BTreeSet<String>,
}

/// Backend keeping every run in process memory.
///
/// `loadrun` returns a deep copy so replay never mutates the stored run.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn open(&self) -> Result<(), BackendError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), BackendError> {
        Ok(())
    }

    async fn storerun(&self, id: &EventId, runid: &RunId, run: Run) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.tags.extend(run.tags.iter().cloned());
        state
            .runs
            .entry(id.clone())
            .or_default()
            .insert(runid.clone(), run);
        Ok(())
    }

    async fn loadrun(&self, runid: &RunId) -> Result<Run, BackendError> {
        let state = self.state.lock();
        state
            .runs
            .values()
            .find_map(|bucket| bucket.get(runid))
            .cloned()
            .ok_or_else(|| BackendError::NoSuchRun(runid.clone()))
    }

    async fn listruns(
        &self,
        id: &EventId,
        min_ts: f64,
        max_ts: f64,
        any_tag: &BTreeSet<String>,
    ) -> Result<Vec<RunSummary>, BackendError> {
        let state = self.state.lock();
        let Some(bucket) = state.runs.get(id) else {
            return Ok(Vec::new());
        };
        let mut found: Vec<RunSummary> = bucket
            .values()
            .filter(|run| min_ts <= run.ts && run.ts <= max_ts)
            .filter(|run| any_tag.is_empty() || run.tags.intersection(any_tag).next().is_some())
            .map(Run::summary)
            .collect();
        found.sort_by(|a, b| a.ts.total_cmp(&b.ts));
        Ok(found)
    }

    async fn knowntags(&self) -> Result<BTreeSet<String>, BackendError> {
        Ok(self.state.lock().tags.clone())
    }

    async fn status(&self) -> Result<String, BackendError> {
        let state = self.state.lock();
        let count: usize = state.runs.values().map(IndexMap::len).sum();
        Ok(format!("{count} runs in memory"))
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
