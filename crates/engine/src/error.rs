// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine

use rondo_core::{EventId, RunId};
use rondo_storage::BackendError;
use thiserror::Error;

/// Errors from journal operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no open run for {id} / {runid}")]
    NoOpenRun { id: EventId, runid: RunId },
    #[error("cannot write to the journal during a replay")]
    ReplayWrite,
    #[error("cannot load from the journal outside a replay")]
    LiveLoad,
    #[error("no recorded entry for key {0:?}")]
    MissingKey(String),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors from tracked world operations
#[derive(Debug, Error)]
pub enum WorldError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid http method {0:?}")]
    Method(String),
    #[error("payload is not valid utf-8")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
