// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup, idle loop and teardown of a running [`App`].

use crate::app::{App, AppError};
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, error, info, warn};

const HEARTBEAT: Duration = Duration::from_secs(3600);

impl App {
    /// Run the composed engine until a signal (or [`App::shutdown`])
    /// arrives.
    ///
    /// Startup: open the store, start the three sources concurrently,
    /// run the ready callbacks in parallel, fire the start hook.
    /// Teardown mirrors it in reverse: stop hook, cancel sources and
    /// in-flight run tasks and await them, close the store.
    ///
    /// One run per app: re-running requires a freshly built app with the
    /// handlers registered again (which rarely matters in practice).
    pub async fn run(&self) -> Result<(), AppError> {
        self.store().open().await?;
        info!("store open");

        let runtime = self.runtime().clone();
        let cron = self.cron.clone();
        let file = self.file.clone();
        let web = self.web.clone();
        let sources = [
            ("cron", tokio::spawn({
                let runtime = runtime.clone();
                async move { cron.run(runtime).await }
            })),
            ("file", tokio::spawn({
                let runtime = runtime.clone();
                async move { file.run(runtime).await }
            })),
            ("web", tokio::spawn(async move { web.run(runtime).await })),
        ];

        self.hooks.fire_ready().await;
        self.hooks.fire_start().await;
        self.started.send_replace(true);
        info!("running");

        let outcome = self.idle().await;

        info!("stopping");
        self.hooks.fire_stop().await;
        // cancel sources and in-flight run tasks, then wait: cancelled
        // runs still finalize their worlds
        self.runtime().drain().await;
        for (name, task) in sources.into_iter().rev() {
            if let Err(error) = task.await {
                error!(source = name, %error, "source task failed");
            }
        }
        if let Err(error) = self.store().close().await {
            warn!(%error, "store close failed");
        }
        self.started.send_replace(false);
        outcome
    }

    async fn idle(&self) -> Result<(), AppError> {
        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        let mut wakes: u32 = 0;
        loop {
            tokio::select! {
                _ = interrupt.recv() => {
                    info!("interrupt, shutting down");
                    return Ok(());
                }
                _ = terminate.recv() => {
                    info!("terminated, shutting down");
                    return Ok(());
                }
                () = self.runtime().cancel_token().cancelled() => return Ok(()),
                () = tokio::time::sleep(HEARTBEAT) => {
                    wakes += 1;
                    info!("alive");
                    if wakes % 24 == 0 {
                        self.heartbeat().await;
                    }
                }
            }
        }
    }

    /// Daily health dump: process status plus whatever the backend
    /// reports about itself.
    async fn heartbeat(&self) {
        match tokio::fs::read_to_string("/proc/self/status").await {
            Ok(status) => info!(%status, "process status"),
            Err(error) => debug!(%error, "no process status available"),
        }
        match self.store().status().await {
            Ok(status) => info!(%status, "store status"),
            Err(error) => warn!(%error, "store status failed"),
        }
    }
}
