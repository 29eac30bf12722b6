// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run-task lifecycle: spawning, cancellation, finalization.

use crate::pacifier::Pacifier;
use crate::store::Store;
use crate::world::{WebClientSettings, World};
use crate::{BoxFuture, HandlerResult};
use rondo_core::{EventId, RunId};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error};

/// Shared handle the event sources dispatch runs through.
///
/// Owns the task tracker and cancellation token: shutdown cancels every
/// in-flight run and waits for each to finalize its world.
#[derive(Clone)]
pub struct Runtime {
    store: Arc<Store>,
    settings: WebClientSettings,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl Runtime {
    pub fn new(store: Arc<Store>, settings: WebClientSettings) -> Self {
        Self {
            store,
            settings,
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// A fresh world for a live run of `id`.
    pub fn world(&self, id: EventId) -> World {
        World::new(self.store.clone(), self.settings.clone(), id, None)
    }

    /// A world resuming the recorded run `runid` under a pacifier.
    pub fn replay_world(&self, id: EventId, runid: RunId, pacifier: Arc<dyn Pacifier>) -> World {
        World::with_runid(
            self.store.clone(),
            self.settings.clone(),
            id,
            Some(pacifier),
            runid,
        )
    }

    /// Spawn a tracked run task: open a world, race the handler against
    /// cancellation, finalize either way.
    pub fn spawn_run<F>(&self, id: EventId, handler: F)
    where
        F: FnOnce(World) -> BoxFuture<HandlerResult<()>> + Send + 'static,
    {
        let runtime = self.clone();
        self.tracker.spawn(async move {
            let world = runtime.world(id.clone());
            if let Err(error) = runtime.store.begin_run(&world).await {
                error!(%id, %error, "could not open run");
                return;
            }
            let result = tokio::select! {
                () = runtime.cancel.cancelled() => {
                    debug!(%id, runid = %world.runid(), "run cancelled");
                    Ok(())
                }
                result = handler(world.clone()) => result,
            };
            runtime.finalize(&world, result).await;
        });
    }

    /// Spawn an auxiliary tracked task (e.g. the tail of a deferred web
    /// handler).
    pub fn spawn_tracked<F>(&self, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(future);
    }

    /// Close a world and flush its run, logging handler and flush errors.
    ///
    /// Always runs both steps; a failing flush never takes another run
    /// down with it.
    pub async fn finalize(&self, world: &World, result: HandlerResult<()>) {
        if let Err(error) = result {
            error!(id = %world.id(), runid = %world.runid(), %error, "handler failed");
        }
        world.close().await;
        if let Err(error) = self.store.finish_run(world).await {
            error!(id = %world.id(), runid = %world.runid(), %error, "could not flush run");
        }
    }

    /// Cancel all in-flight run tasks and wait for them to finalize.
    pub async fn drain(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
