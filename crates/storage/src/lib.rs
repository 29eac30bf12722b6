// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Durable run storage for the Rondo event engine

mod memory;
mod sqlite;

pub use memory::MemoryBackend;
pub use sqlite::{RollOptions, SqliteBackend};

use async_trait::async_trait;
use rondo_core::{EventId, Run, RunId, RunSummary};
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors from backend operations
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no run {0}")]
    NoSuchRun(RunId),
    #[error("backend is not open")]
    NotOpen,
    #[error("database error: {0}")]
    Sql(#[from] sqlx::Error),
}

/// A durable store of finished runs.
///
/// One process owns one backend; `storerun` calls are atomic from the
/// event loop's point of view.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Open the backend (connect, create schema).
    async fn open(&self) -> Result<(), BackendError>;

    /// Release resources. Pending `storerun` calls complete first.
    async fn close(&self) -> Result<(), BackendError>;

    /// Persist a finished run under its event id.
    async fn storerun(&self, id: &EventId, runid: &RunId, run: Run) -> Result<(), BackendError>;

    /// Fetch a full run by run id (run ids are unique across events).
    async fn loadrun(&self, runid: &RunId) -> Result<Run, BackendError>;

    /// Partial runs of an event with `ts` in `[min_ts, max_ts]`, further
    /// filtered to runs carrying at least one of `any_tag` when the set
    /// is non-empty.
    async fn listruns(
        &self,
        id: &EventId,
        min_ts: f64,
        max_ts: f64,
        any_tag: &BTreeSet<String>,
    ) -> Result<Vec<RunSummary>, BackendError>;

    /// Every tag ever stored.
    async fn knowntags(&self) -> Result<BTreeSet<String>, BackendError>;

    /// Human-readable one-liner for heartbeat logs.
    async fn status(&self) -> Result<String, BackendError>;
}
