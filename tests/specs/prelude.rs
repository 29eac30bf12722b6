// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for the behavioural specs.

use rondo_daemon::{App, Store};
use rondo_storage::MemoryBackend;
use std::sync::Arc;
use std::time::Duration;

pub fn memory_app() -> Arc<App> {
    Arc::new(App::new(Store::new(MemoryBackend::new())))
}

/// Spawn `App::run` and wait until the sources are up.
pub async fn launch(app: &Arc<App>) -> tokio::task::JoinHandle<()> {
    let handle = tokio::spawn({
        let app = app.clone();
        async move {
            if let Err(error) = app.run().await {
                panic!("app run failed: {error}");
            }
        }
    });
    tokio::time::timeout(Duration::from_secs(10), app.started())
        .await
        .expect("app never came up");
    handle
}

pub async fn stop(app: &Arc<App>, handle: tokio::task::JoinHandle<()>) {
    app.shutdown();
    tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("app never shut down")
        .unwrap();
}

/// The base url of a TCP bind once the app is serving.
pub fn base_url(app: &Arc<App>, bind: &str) -> String {
    let addr = app.web.local_addr(bind).expect("bind is not serving");
    format!("http://{addr}")
}
