// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rondo-engine: per-run worlds, the in-flight journal, and replay hooks

mod error;
mod pacifier;
mod path;
mod runtime;
mod store;
mod world;

pub use error::{StoreError, WorldError};
pub use pacifier::{Pacifier, ReplayPacifier};
pub use path::RunPath;
pub use runtime::Runtime;
pub use store::{Store, SubmitInfo};
pub use world::{PacifierGuard, RequestOpts, WebClientSettings, WebProxy, World};

use std::future::Future;
use std::pin::Pin;

/// Error type user handlers are allowed to bubble up.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// What user handlers return.
pub type HandlerResult<T> = Result<T, BoxError>;

/// Boxed future, the shape stored handlers produce.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;
