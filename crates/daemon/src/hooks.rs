// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle hook registries.
//!
//! Every callback runs in isolation: one failing or panicking hook never
//! prevents the others from being invoked.

use parking_lot::Mutex;
use rondo_engine::{BoxFuture, HandlerResult};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::warn;

type HookFn = Arc<dyn Fn() -> BoxFuture<HandlerResult<()>> + Send + Sync>;

#[derive(Default)]
pub(crate) struct Hooks {
    ready: Mutex<Vec<HookFn>>,
    start: Mutex<Vec<HookFn>>,
    stop: Mutex<Vec<HookFn>>,
}

fn wrap<F, Fut>(hook: F) -> HookFn
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult<()>> + Send + 'static,
{
    Arc::new(move || Box::pin(hook()))
}

impl Hooks {
    pub(crate) fn add_ready<F, Fut>(&self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<()>> + Send + 'static,
    {
        self.ready.lock().push(wrap(hook));
    }

    pub(crate) fn add_start<F, Fut>(&self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<()>> + Send + 'static,
    {
        self.start.lock().push(wrap(hook));
    }

    pub(crate) fn add_stop<F, Fut>(&self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<()>> + Send + 'static,
    {
        self.stop.lock().push(wrap(hook));
    }

    /// Run the ready callbacks concurrently and wait for all of them.
    pub(crate) async fn fire_ready(&self) {
        let hooks: Vec<HookFn> = self.ready.lock().clone();
        let mut tasks = JoinSet::new();
        for hook in hooks {
            tasks.spawn(hook());
        }
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(error)) => warn!(%error, "ready callback failed"),
                Err(error) => warn!(%error, "ready callback panicked"),
            }
        }
    }

    pub(crate) async fn fire_start(&self) {
        Self::fire(&self.start, "start").await;
    }

    pub(crate) async fn fire_stop(&self) {
        Self::fire(&self.stop, "stop").await;
    }

    async fn fire(registry: &Mutex<Vec<HookFn>>, which: &'static str) {
        let hooks: Vec<HookFn> = registry.lock().clone();
        for hook in hooks {
            if let Err(error) = hook().await {
                warn!(hook = which, %error, "hook callback failed");
            }
        }
    }
}

#[cfg(test)]
#[path = "hooks_tests.rs"]
mod tests;
