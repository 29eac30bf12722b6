// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-run context: identity, tags, and tracked I/O proxies.

use crate::error::WorldError;
use crate::pacifier::Pacifier;
use crate::path::RunPath;
use crate::store::Store;
use parking_lot::{Mutex, RwLock};
use rondo_core::{validate_tag, Effect, EventId, RunId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Settings for the per-run outbound HTTP client.
#[derive(Debug, Clone, Default)]
pub struct WebClientSettings {
    pub timeout: Option<Duration>,
    pub user_agent: Option<String>,
}

impl WebClientSettings {
    fn build_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(user_agent) = &self.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        builder.build()
    }
}

struct WorldInner {
    store: Arc<Store>,
    settings: WebClientSettings,
    id: EventId,
    runid: RunId,
    pacifier: RwLock<Option<Arc<dyn Pacifier>>>,
    client: Mutex<Option<reqwest::Client>>,
}

/// The context a handler runs in.
///
/// Cheap to clone; every clone is the same run. The engine opens the run
/// before the handler sees the world and finalizes it after the handler
/// returns (or is cancelled).
#[derive(Clone)]
pub struct World {
    inner: Arc<WorldInner>,
}

impl World {
    pub fn new(
        store: Arc<Store>,
        settings: WebClientSettings,
        id: EventId,
        pacifier: Option<Arc<dyn Pacifier>>,
    ) -> Self {
        Self::with_runid(store, settings, id, pacifier, RunId::generate())
    }

    /// Build a world for a known run id (replay resumes recorded runs).
    pub fn with_runid(
        store: Arc<Store>,
        settings: WebClientSettings,
        id: EventId,
        pacifier: Option<Arc<dyn Pacifier>>,
        runid: RunId,
    ) -> Self {
        Self {
            inner: Arc::new(WorldInner {
                store,
                settings,
                id,
                runid,
                pacifier: RwLock::new(pacifier),
                client: Mutex::new(None),
            }),
        }
    }

    pub fn id(&self) -> &EventId {
        &self.inner.id
    }

    pub fn runid(&self) -> &RunId {
        &self.inner.runid
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.inner.store
    }

    pub fn pacifier(&self) -> Option<Arc<dyn Pacifier>> {
        self.inner.pacifier.read().clone()
    }

    /// True when this run replays a recorded one: a pacifier is present
    /// and it is not merely observing a live run.
    pub fn is_replaying(&self) -> bool {
        self.inner
            .pacifier
            .read()
            .as_ref()
            .is_some_and(|p| !p.is_new())
    }

    /// Temporarily clear the pacifier so nested tracked operations hit
    /// the outside world; restored when the guard drops.
    pub fn suspend_pacifier(&self) -> PacifierGuard {
        let saved = self.inner.pacifier.write().take();
        PacifierGuard {
            world: self.clone(),
            saved,
        }
    }

    /// Tag the run. Invalid tags are logged and skipped, never raised;
    /// tagging a replay is a no-op.
    pub fn tag<I, S>(&self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tag in tags {
            let tag = tag.into();
            if let Err(error) = validate_tag(&tag) {
                warn!(runid = %self.runid(), %tag, %error, "rejected tag");
                continue;
            }
            if let Err(error) = self.inner.store.tag_run(self, &tag) {
                warn!(runid = %self.runid(), %tag, %error, "could not tag run");
            }
        }
    }

    /// A tracked path: reads journal through the store, writes are
    /// intercepted during replay.
    pub fn file(&self, path: impl Into<PathBuf>) -> RunPath {
        RunPath::new(self.clone(), path.into())
    }

    /// Tracked outbound HTTP.
    pub fn web(&self) -> WebProxy<'_> {
        WebProxy { world: self }
    }

    pub(crate) fn client(&self) -> Result<reqwest::Client, WorldError> {
        let mut slot = self.inner.client.lock();
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }
        let client = self.inner.settings.build_client()?;
        *slot = Some(client.clone());
        Ok(client)
    }

    /// Release the run's outbound client, if one was ever built.
    pub async fn close(&self) {
        self.inner.client.lock().take();
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("id", &self.inner.id)
            .field("runid", &self.inner.runid)
            .field("replaying", &self.is_replaying())
            .finish()
    }
}

/// Restores a suspended pacifier on drop.
pub struct PacifierGuard {
    world: World,
    saved: Option<Arc<dyn Pacifier>>,
}

impl Drop for PacifierGuard {
    fn drop(&mut self) {
        *self.world.inner.pacifier.write() = self.saved.take();
    }
}

/// Options for a tracked HTTP request; journaled as JSON next to the
/// response body.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RequestOpts {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Vec<u8>>,
}

/// Tracked HTTP client access for one run.
pub struct WebProxy<'w> {
    world: &'w World,
}

impl WebProxy<'_> {
    /// Perform a request and journal the response body, or replay the
    /// recorded body through the pacifier.
    pub async fn request_bytes(
        &self,
        method: &str,
        url: &str,
        opts: RequestOpts,
    ) -> Result<Vec<u8>, WorldError> {
        let params = serde_json::to_vec(&opts)?;

        if let Some(pacifier) = self.world.pacifier().filter(|p| !p.is_new()) {
            let effect = Effect::HttpRequest {
                method: method.to_string(),
                url: url.to_string(),
                params,
            };
            let substituted = pacifier.performing(self.world, effect).await?;
            return Ok(substituted.unwrap_or_default());
        }

        let body = self.send(method, url, &opts).await?.bytes().await?.to_vec();
        let key = format!("{method} {url}");
        self.world
            .store()
            .store(self.world, &format!("{key} *params*"), params)?;
        self.world.store().store(self.world, &key, body.clone())?;
        Ok(body)
    }

    /// UTF-8 decoded form of [`WebProxy::request_bytes`].
    pub async fn request_text(
        &self,
        method: &str,
        url: &str,
        opts: RequestOpts,
    ) -> Result<String, WorldError> {
        Ok(String::from_utf8(self.request_bytes(method, url, opts).await?)?)
    }

    /// JSON-parsed form of [`WebProxy::request_bytes`].
    pub async fn request_json(
        &self,
        method: &str,
        url: &str,
        opts: RequestOpts,
    ) -> Result<serde_json::Value, WorldError> {
        Ok(serde_json::from_str(
            &self.request_text(method, url, opts).await?,
        )?)
    }

    /// Raw escape hatch: perform a request without journaling anything.
    pub async fn request_untracked(
        &self,
        method: &str,
        url: &str,
        opts: RequestOpts,
    ) -> Result<reqwest::Response, WorldError> {
        self.send(method, url, &opts).await
    }

    async fn send(
        &self,
        method: &str,
        url: &str,
        opts: &RequestOpts,
    ) -> Result<reqwest::Response, WorldError> {
        let parsed = reqwest::Method::from_bytes(method.as_bytes())
            .map_err(|_| WorldError::Method(method.to_string()))?;
        let mut request = self.world.client()?.request(parsed, url);
        for (name, value) in &opts.headers {
            request = request.header(name, value);
        }
        if !opts.query.is_empty() {
            request = request.query(&opts.query);
        }
        if let Some(body) = &opts.body {
            request = request.body(body.clone());
        }
        Ok(request.send().await?)
    }
}

#[cfg(test)]
#[path = "world_tests.rs"]
mod tests;
