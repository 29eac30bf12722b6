// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rondo-sources: the three event sources feeding runs into the engine

pub mod cron;
pub mod file;
pub mod web;

pub use cron::CronSource;
pub use file::FileSource;
pub use web::{Bind, Request, Responder, Response, WebSource};

use rondo_core::EventId;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised synchronously at event registration time
#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("event already observed: {0}")]
    DuplicateEvent(EventId),
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("invalid glob pattern {pattern:?}: {source}")]
    InvalidGlob {
        pattern: String,
        source: glob::PatternError,
    },
    #[error("invalid bind {0:?}")]
    InvalidBind(String),
    #[error("invalid method {0:?}")]
    InvalidMethod(String),
}
