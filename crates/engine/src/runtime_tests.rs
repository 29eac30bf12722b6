// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::Runtime;
use crate::store::Store;
use crate::world::WebClientSettings;
use rondo_core::{EventId, FakeClock};
use rondo_storage::MemoryBackend;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

fn runtime() -> Runtime {
    let store = Arc::new(Store::new(MemoryBackend::new()).with_clock(FakeClock::new(1.0)));
    Runtime::new(store, WebClientSettings::default())
}

async fn flushed_runs(runtime: &Runtime, id: &EventId) -> usize {
    runtime
        .store()
        .listruns(id, 0.0, f64::MAX, &BTreeSet::new())
        .await
        .unwrap()
        .len()
}

#[tokio::test]
async fn spawned_runs_flush_on_completion() {
    let runtime = runtime();
    let id = EventId::new("ev");
    let (tx, rx) = tokio::sync::oneshot::channel();

    runtime.spawn_run(id.clone(), move |world| {
        Box::pin(async move {
            world.store().store(&world, "k", vec![1])?;
            world.tag(["done"]);
            let _ = tx.send(());
            Ok(())
        })
    });

    rx.await.unwrap();
    runtime.drain().await;
    assert_eq!(flushed_runs(&runtime, &id).await, 1);
}

#[tokio::test]
async fn handler_errors_are_contained() {
    let runtime = runtime();
    let id = EventId::new("ev");

    runtime.spawn_run(id.clone(), |_world| {
        Box::pin(async { Err("boom".into()) })
    });

    runtime.drain().await;
    // the failing run still flushed whatever it accumulated
    assert_eq!(flushed_runs(&runtime, &id).await, 1);
}

#[tokio::test]
async fn cancelled_runs_commit_what_they_accumulated() {
    let runtime = runtime();
    let id = EventId::new("ev");
    let (tx, rx) = tokio::sync::oneshot::channel();

    runtime.spawn_run(id.clone(), move |world| {
        Box::pin(async move {
            world.store().store(&world, "before-hang", vec![1])?;
            let _ = tx.send(world.runid().clone());
            std::future::pending::<()>().await;
            Ok(())
        })
    });

    let runid = rx.await.unwrap();
    runtime.drain().await;

    let run = runtime.store().loadrun(&runid).await.unwrap();
    assert!(run.data.contains_key("before-hang"));
}

#[tokio::test]
async fn drain_waits_for_auxiliary_tasks() {
    let runtime = runtime();
    let flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let seen = flag.clone();

    runtime.spawn_tracked(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        seen.store(true, std::sync::atomic::Ordering::SeqCst);
    });

    runtime.drain().await;
    assert!(flag.load(std::sync::atomic::Ordering::SeqCst));
}
