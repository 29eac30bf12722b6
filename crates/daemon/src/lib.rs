// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rondo-daemon: the application host tying store, sources and runs
//! together.
//!
//! Integrators build an [`App`] around a store, register handlers on its
//! sources, and hand control to [`App::run`]. There is no CLI here: the
//! engine is a library.

mod app;
mod hooks;
mod lifecycle;

pub use app::{App, AppError};

// the pieces handlers interact with, re-exported for integrators
pub use rondo_engine::{
    Pacifier, ReplayPacifier, RunPath, Store, SubmitInfo, WebClientSettings, World,
};
pub use rondo_sources::{Request, Responder, Response};
