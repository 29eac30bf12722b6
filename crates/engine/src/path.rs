// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracked filesystem paths.
//!
//! A `RunPath` is a plain path plus its world: the six tracked I/O
//! methods journal reads and intercept writes during replay. Everything
//! else delegates to the underlying path by `Deref`.

use crate::error::WorldError;
use crate::world::World;
use rondo_core::Effect;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::ops::Deref;
use std::path::{Path, PathBuf};

/// A path whose reads and writes are tracked by the run's journal.
#[derive(Clone)]
pub struct RunPath {
    world: World,
    path: PathBuf,
}

impl RunPath {
    pub(crate) fn new(world: World, path: PathBuf) -> Self {
        Self { world, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The journal key: the path resolved to absolute form.
    fn tracking_key(&self) -> String {
        let resolved = std::fs::canonicalize(&self.path)
            .or_else(|_| std::path::absolute(&self.path))
            .unwrap_or_else(|_| self.path.clone());
        resolved.to_string_lossy().into_owned()
    }

    /// Read the file, journaling the bytes; during a replay the journal
    /// is read instead of the filesystem.
    pub async fn read_bytes(&self) -> Result<Vec<u8>, WorldError> {
        let key = self.tracking_key();
        if self.world.is_replaying() {
            return Ok(self.world.store().load(&self.world, &key).await?);
        }
        let data = tokio::fs::read(&self.path).await?;
        self.world.store().store(&self.world, &key, data.clone())?;
        Ok(data)
    }

    /// Write the file. With a pacifier present, the write goes through
    /// `performing` and the filesystem is left alone. Writes are not
    /// journaled.
    pub async fn write_bytes(&self, data: impl Into<Vec<u8>>) -> Result<(), WorldError> {
        let data = data.into();
        if let Some(pacifier) = self.world.pacifier() {
            let effect = Effect::FileWrite {
                path: self.path.clone(),
                data,
            };
            pacifier.performing(&self.world, effect).await?;
            return Ok(());
        }
        Ok(tokio::fs::write(&self.path, data).await?)
    }

    pub async fn read_text(&self) -> Result<String, WorldError> {
        Ok(String::from_utf8(self.read_bytes().await?)?)
    }

    pub async fn write_text(&self, data: &str) -> Result<(), WorldError> {
        self.write_bytes(data.as_bytes().to_vec()).await
    }

    pub async fn read_json<T: DeserializeOwned>(&self) -> Result<T, WorldError> {
        Ok(serde_json::from_str(&self.read_text().await?)?)
    }

    pub async fn write_json<T: Serialize>(&self, value: &T) -> Result<(), WorldError> {
        self.write_text(&serde_json::to_string(value)?).await
    }
}

impl Deref for RunPath {
    type Target = Path;

    fn deref(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for RunPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RunPath({})", self.path.display())
    }
}

impl std::fmt::Display for RunPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

#[cfg(test)]
#[path = "path_tests.rs"]
mod tests;
