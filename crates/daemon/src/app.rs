// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The application host: store + sources + hooks + replay driver.

use crate::hooks::Hooks;
use rondo_core::{EventId, RunId};
use rondo_engine::{
    BoxError, HandlerResult, Pacifier, Runtime, Store, StoreError, SubmitInfo, WebClientSettings,
};
use rondo_sources::{CronSource, FileSource, Response, WebSource};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::warn;

/// Errors surfaced by the host itself (handler errors are logged, not
/// raised)
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no handler registered for {0}")]
    UnknownEvent(EventId),
    #[error("replayed handler failed: {0}")]
    Handler(#[source] BoxError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// One process, one engine: registration facade over the three event
/// sources, the durable store behind them, and the run lifecycle.
pub struct App {
    store: Arc<Store>,
    runtime: Runtime,
    /// Wall-clock schedule events.
    pub cron: CronSource,
    /// Directory-watch events.
    pub file: FileSource,
    /// HTTP events.
    pub web: WebSource,
    pub(crate) hooks: Hooks,
    pub(crate) started: watch::Sender<bool>,
}

impl App {
    pub fn new(store: Store) -> Self {
        Self::with_settings(store, WebClientSettings::default())
    }

    /// Build an app whose worlds hand `settings` to their outbound HTTP
    /// clients.
    pub fn with_settings(store: Store, settings: WebClientSettings) -> Self {
        let store = Arc::new(store);
        let (started, _) = watch::channel(false);
        Self {
            runtime: Runtime::new(store.clone(), settings),
            store,
            cron: CronSource::new(),
            file: FileSource::new(),
            web: WebSource::new(),
            hooks: Hooks::default(),
            started,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Register a callback run (concurrently with the others) once the
    /// sources are up, before the start hook.
    pub fn on_ready<F, Fut>(&self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<()>> + Send + 'static,
    {
        self.hooks.add_ready(hook);
    }

    pub fn on_start<F, Fut>(&self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<()>> + Send + 'static,
    {
        self.hooks.add_start(hook);
    }

    pub fn on_stop<F, Fut>(&self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<()>> + Send + 'static,
    {
        self.hooks.add_stop(hook);
    }

    /// Register a callback fired with `(id, runid, ts, tags)` after each
    /// live run is flushed.
    pub fn on_submit<F, Fut>(&self, hook: F)
    where
        F: Fn(SubmitInfo) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<()>> + Send + 'static,
    {
        self.store.on_submit(hook);
    }

    /// Human-readable dump of everything registered.
    pub fn summary(&self) -> String {
        format!(
            "{}{}{}",
            self.web.summary(),
            self.file.summary(),
            self.cron.summary()
        )
    }

    /// Resolves once [`App::run`] has the sources up and the start hook
    /// fired.
    pub async fn started(&self) {
        let mut rx = self.started.subscribe();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Ask a running app to shut down, as a signal would.
    pub fn shutdown(&self) {
        self.runtime.cancel_token().cancel();
    }

    /// Re-execute a recorded run under a pacifier, every tracked I/O
    /// call short-circuited from the store.
    ///
    /// Returns the response for web events, `None` for the others.
    pub async fn replay(
        &self,
        id: &EventId,
        runid: &RunId,
        pacifier: Arc<dyn Pacifier>,
    ) -> Result<Option<Response>, AppError> {
        let world = self
            .runtime
            .replay_world(id.clone(), runid.clone(), pacifier);
        self.store.begin_run(&world).await?;

        let outcome = if let Some(replaying) = self.web.replay(world.clone()) {
            replaying.await.map(Some)
        } else if let Some(replaying) = self.file.replay(world.clone()) {
            replaying.await.map(|()| None)
        } else if let Some(replaying) = self.cron.replay(world.clone()) {
            replaying.await.map(|()| None)
        } else {
            let _ = self.store.finish_run(&world).await;
            return Err(AppError::UnknownEvent(id.clone()));
        };

        world.close().await;
        if let Err(error) = self.store.finish_run(&world).await {
            warn!(%id, %runid, %error, "could not drop replayed run");
        }
        outcome.map_err(AppError::Handler)
    }
}

#[cfg(test)]
#[path = "app_tests.rs"]
mod tests;
