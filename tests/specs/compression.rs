// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Compression hooks transform payloads at the backend boundary only.

use rondo_core::EventId;
use rondo_engine::{Store, WebClientSettings, World};
use rondo_storage::{Backend, SqliteBackend};
use std::sync::Arc;

fn zstd_store(path: &std::path::Path) -> Store {
    Store::new(SqliteBackend::new(path)).with_compression(
        |_key, data| zstd::encode_all(data.as_slice(), 0).unwrap_or(data),
        |_key, data| zstd::decode_all(data.as_slice()).unwrap_or(data),
    )
}

#[tokio::test]
async fn payloads_round_trip_through_zstd() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("runs.sqlite");
    let payload = b"repetitive ".repeat(200);

    let store = Arc::new(zstd_store(&db));
    store.open().await.unwrap();
    let world = World::new(
        store.clone(),
        WebClientSettings::default(),
        EventId::new("ev"),
        None,
    );
    store.begin_run(&world).await.unwrap();
    store.store(&world, "blob", payload.clone()).unwrap();
    store.finish_run(&world).await.unwrap();

    // through the store, the payload is intact
    let run = store.loadrun(world.runid()).await.unwrap();
    assert_eq!(run.data["blob"].data, payload);
    store.close().await.unwrap();

    // on disk, it is the compressed form
    let raw = SqliteBackend::new(&db);
    raw.open().await.unwrap();
    let stored = raw.loadrun(world.runid()).await.unwrap();
    assert_ne!(stored.data["blob"].data, payload);
    assert!(stored.data["blob"].data.len() < payload.len());
    assert_eq!(
        zstd::decode_all(stored.data["blob"].data.as_slice()).unwrap(),
        payload
    );
    raw.close().await.unwrap();
}
