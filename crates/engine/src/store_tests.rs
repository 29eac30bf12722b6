// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::Store;
use crate::error::StoreError;
use crate::pacifier::ReplayPacifier;
use crate::world::{WebClientSettings, World};
use parking_lot::Mutex;
use rondo_core::{EventId, FakeClock, RunId};
use rondo_storage::MemoryBackend;
use std::collections::BTreeSet;
use std::sync::Arc;

fn store() -> Arc<Store> {
    Arc::new(Store::new(MemoryBackend::new()).with_clock(FakeClock::new(1_000.0)))
}

fn live(store: &Arc<Store>) -> World {
    World::new(
        store.clone(),
        WebClientSettings::default(),
        EventId::new("ev"),
        None,
    )
}

fn replay(store: &Arc<Store>, runid: &RunId) -> World {
    World::with_runid(
        store.clone(),
        WebClientSettings::default(),
        EventId::new("ev"),
        Some(Arc::new(ReplayPacifier::new())),
        runid.clone(),
    )
}

#[tokio::test]
async fn finished_runs_load_back_equal() {
    let store = store();
    let world = live(&store);
    store.begin_run(&world).await.unwrap();
    store.store(&world, "a", vec![1]).unwrap();
    store.store(&world, "b", vec![2]).unwrap();
    store.tag_run(&world, "t").unwrap();
    store.finish_run(&world).await.unwrap();

    let run = store.loadrun(world.runid()).await.unwrap();
    assert_eq!(run.runid, *world.runid());
    assert_eq!(run.ts, 1_000.0);
    assert!(run.tags.contains("t"));
    let keys: Vec<_> = run.data.keys().cloned().collect();
    assert_eq!(keys, ["a", "b"]);
    assert_eq!(run.data["a"].data, vec![1]);
}

#[tokio::test]
async fn duplicate_keys_are_disambiguated_in_order() {
    let store = store();
    let world = live(&store);
    store.begin_run(&world).await.unwrap();
    store.store(&world, "k", vec![1]).unwrap();
    store.store(&world, "k", vec![2]).unwrap();
    store.finish_run(&world).await.unwrap();

    let run = store.loadrun(world.runid()).await.unwrap();
    let keys: Vec<_> = run.data.keys().cloned().collect();
    assert_eq!(keys, ["k", "k (0)"]);
}

#[tokio::test]
async fn store_requires_an_open_run() {
    let store = store();
    let world = live(&store);
    let err = store.store(&world, "k", vec![1]).unwrap_err();
    assert!(matches!(err, StoreError::NoOpenRun { .. }));
}

#[tokio::test]
async fn replay_reads_the_writes_back_in_order() {
    let store = store();
    let world = live(&store);
    store.begin_run(&world).await.unwrap();
    store.store(&world, "k", vec![1]).unwrap();
    store.store(&world, "k", vec![2]).unwrap();
    store.store(&world, "k", vec![3]).unwrap();
    store.finish_run(&world).await.unwrap();

    let rerun = replay(&store, world.runid());
    store.begin_run(&rerun).await.unwrap();
    assert_eq!(store.load(&rerun, "k").await.unwrap(), vec![1]);
    assert_eq!(store.load(&rerun, "k").await.unwrap(), vec![2]);
    assert_eq!(store.load(&rerun, "k").await.unwrap(), vec![3]);
    let err = store.load(&rerun, "k").await.unwrap_err();
    assert!(matches!(err, StoreError::MissingKey(_)));
    store.finish_run(&rerun).await.unwrap();
}

#[tokio::test]
async fn replay_rejects_journal_writes_and_drops_on_finish() {
    let store = store();
    let world = live(&store);
    store.begin_run(&world).await.unwrap();
    store.store(&world, "k", vec![1]).unwrap();
    store.tag_run(&world, "live").unwrap();
    store.finish_run(&world).await.unwrap();

    let rerun = replay(&store, world.runid());
    store.begin_run(&rerun).await.unwrap();
    assert!(matches!(
        store.store(&rerun, "x", vec![9]).unwrap_err(),
        StoreError::ReplayWrite
    ));
    // tagging a replay is a silent no-op
    store.tag_run(&rerun, "ghost").unwrap();
    store.finish_run(&rerun).await.unwrap();

    let run = store.loadrun(world.runid()).await.unwrap();
    assert_eq!(run.tags, BTreeSet::from(["live".to_string()]));
    assert!(!run.data.contains_key("x"));
}

#[tokio::test]
async fn load_outside_a_replay_is_refused() {
    let store = store();
    let world = live(&store);
    store.begin_run(&world).await.unwrap();
    let err = store.load(&world, "k").await.unwrap_err();
    assert!(matches!(err, StoreError::LiveLoad));
}

#[tokio::test]
async fn submit_hooks_fire_after_flush_and_are_isolated() {
    let store = store();
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    store.on_submit(|_info| async { Err("first hook breaks".into()) });
    let seen2 = seen.clone();
    store.on_submit(move |info| {
        let seen = seen2.clone();
        async move {
            seen.lock()
                .push(format!("{} {} {:?}", info.id, info.ts, info.tags));
            Ok(())
        }
    });

    let world = live(&store);
    store.begin_run(&world).await.unwrap();
    store.tag_run(&world, "t").unwrap();
    store.finish_run(&world).await.unwrap();

    let calls = seen.lock().clone();
    assert_eq!(calls, [format!("ev 1000 {:?}", BTreeSet::from(["t"]))]);
}

#[tokio::test]
async fn compression_applies_at_the_backend_boundary() {
    let backend = MemoryBackend::new();
    let store = Arc::new(
        Store::new(backend)
            .with_clock(FakeClock::new(1.0))
            .with_compression(
                |_key, mut data| {
                    data.reverse();
                    data
                },
                |_key, mut data| {
                    data.reverse();
                    data
                },
            ),
    );

    let world = live(&store);
    store.begin_run(&world).await.unwrap();
    store.store(&world, "k", vec![1, 2, 3]).unwrap();
    store.finish_run(&world).await.unwrap();

    // the journal passthrough undoes the transform
    let run = store.loadrun(world.runid()).await.unwrap();
    assert_eq!(run.data["k"].data, vec![1, 2, 3]);

    // and a replay sees the original bytes too
    let rerun = replay(&store, world.runid());
    store.begin_run(&rerun).await.unwrap();
    assert_eq!(store.load(&rerun, "k").await.unwrap(), vec![1, 2, 3]);
    store.finish_run(&rerun).await.unwrap();
}

#[tokio::test]
async fn listruns_passthrough_sees_finished_runs() {
    let store = store();
    let world = live(&store);
    store.begin_run(&world).await.unwrap();
    store.tag_run(&world, "t").unwrap();
    store.finish_run(&world).await.unwrap();

    let found = store
        .listruns(&EventId::new("ev"), 0.0, f64::MAX, &BTreeSet::new())
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].runid, *world.runid());
    assert!(store.knowntags().await.unwrap().contains("t"));
}
