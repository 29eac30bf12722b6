// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The replay capability: hooks between a run and the outside world.

use crate::error::WorldError;
use crate::world::World;
use async_trait::async_trait;
use rondo_core::Effect;

/// Hooks intercepting journal traffic and outbound side effects.
///
/// When a world carries a pacifier with `is_new() == false`, the run is a
/// replay: journal reads come from the recorded run and side effects go
/// through [`Pacifier::performing`] instead of the outside world. With
/// `is_new() == true` the run is live and the pacifier only observes
/// (debugging drivers use this).
#[async_trait]
pub trait Pacifier: Send + Sync {
    fn is_new(&self) -> bool;

    /// Observe a journal write. The stored value is never altered.
    fn storing(&self, world: &World, key: &str, ts: f64, data: &[u8]);

    /// Intercept a journal read; whatever this returns is what the
    /// caller sees (a debugger may substitute bytes here).
    async fn loading(&self, world: &World, key: &str, ts: f64, data: Vec<u8>) -> Vec<u8>;

    /// Intercept an outbound side effect. `Ok(None)` means the caller's
    /// safe default: empty bytes for HTTP requests, skip for writes. An
    /// implementation that wants to really perform nested tracked
    /// operations should hold [`World::suspend_pacifier`] while doing so.
    async fn performing(
        &self,
        world: &World,
        effect: Effect,
    ) -> Result<Option<Vec<u8>>, WorldError>;
}

/// Bulk replay pacifier: recorded reads thread through unchanged,
/// recorded HTTP responses are served from the journal, and writes are
/// skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayPacifier;

impl ReplayPacifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Pacifier for ReplayPacifier {
    fn is_new(&self) -> bool {
        false
    }

    fn storing(&self, _world: &World, _key: &str, _ts: f64, _data: &[u8]) {}

    async fn loading(&self, _world: &World, _key: &str, _ts: f64, data: Vec<u8>) -> Vec<u8> {
        data
    }

    async fn performing(
        &self,
        world: &World,
        effect: Effect,
    ) -> Result<Option<Vec<u8>>, WorldError> {
        match effect.journal_key() {
            Some(key) => Ok(Some(world.store().load(world, &key).await?)),
            None => Ok(None),
        }
    }
}
