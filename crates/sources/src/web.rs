// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP event source.
//!
//! One router per bind (TCP host:port or Unix socket path), one route
//! per registered event. The live request is fully materialized and
//! journaled before the handler sees it, so a recorded run can rebuild
//! the exact request during replay.

use crate::RegisterError;
use axum::extract::RawPathParams;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::MethodFilter;
use axum::Router;
use indexmap::IndexMap;
use parking_lot::Mutex;
use rondo_core::EventId;
use rondo_engine::{BoxError, BoxFuture, HandlerResult, Runtime, World};
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::{TcpListener, UnixListener};
use tokio::sync::oneshot;
use tracing::{debug, error, info};

const METHODS: [&str; 10] = [
    "*", "CONNECT", "HEAD", "GET", "DELETE", "OPTIONS", "PATCH", "POST", "PUT", "TRACE",
];

/// An endpoint specifier: `"host:port"` (with `localhost` rewritten to
/// `127.0.0.1`) or an absolute Unix socket path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Bind {
    Tcp(String, u16),
    Unix(PathBuf),
}

impl Bind {
    pub fn parse(bind: &str) -> Result<Self, RegisterError> {
        if let Some((host, port)) = bind.split_once(':') {
            let host = if host == "localhost" { "127.0.0.1" } else { host };
            let port = port
                .parse()
                .map_err(|_| RegisterError::InvalidBind(bind.to_string()))?;
            return Ok(Self::Tcp(host.to_string(), port));
        }
        let path = std::path::absolute(bind)
            .map_err(|_| RegisterError::InvalidBind(bind.to_string()))?;
        Ok(Self::Unix(path))
    }
}

impl std::fmt::Display for Bind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tcp(host, port) => write!(f, "{host}:{port}"),
            Self::Unix(path) => write!(f, "{}", path.display()),
        }
    }
}

/// An HTTP request, fully read and journaled.
#[derive(Debug, Clone)]
pub struct Request {
    method: String,
    url: String,
    params: HashMap<String, String>,
    headers: BTreeMap<String, String>,
    body: Vec<u8>,
}

impl Request {
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Path and query of the request, e.g. `/hi?name=x`.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.body)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Header lookup, case-insensitive (headers are stored lower-cased).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Route match parameter, e.g. `name` for a `/hello/{name}` route.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn query_string(&self) -> Option<&str> {
        self.url.split_once('?').map(|(_, query)| query)
    }

    /// Materialize from a live request, journaling url, match
    /// parameters, head and body.
    async fn journal(
        world: &World,
        params: HashMap<String, String>,
        request: axum::extract::Request,
    ) -> Result<Self, BoxError> {
        let method = request.method().to_string();
        let url = request
            .uri()
            .path_and_query()
            .map_or_else(|| request.uri().path().to_string(), |pq| pq.as_str().to_string());
        let mut headers = BTreeMap::new();
        for (name, value) in request.headers() {
            headers.insert(
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            );
        }
        let body = axum::body::to_bytes(request.into_body(), usize::MAX)
            .await?
            .to_vec();

        let store = world.store();
        store.store(world, "*request-url*", format!("{method} {url}").into_bytes())?;
        store.store(world, "*request-match*", serde_json::to_vec(&params)?)?;
        store.store(world, "*request-head*", serde_json::to_vec(&headers)?)?;
        store.store(world, "*request-body*", body.clone())?;

        Ok(Self {
            method,
            url,
            params,
            headers,
            body,
        })
    }

    /// Rebuild the request a recorded run served.
    async fn from_storage(world: &World) -> Result<Self, BoxError> {
        let store = world.store();
        let meth_url = String::from_utf8(store.load(world, "*request-url*").await?)?;
        let params = serde_json::from_slice(&store.load(world, "*request-match*").await?)?;
        let headers = serde_json::from_slice(&store.load(world, "*request-head*").await?)?;
        let body = store.load(world, "*request-body*").await?;
        let (method, url) = meth_url
            .split_once(' ')
            .map_or((meth_url.as_str(), ""), |(method, url)| (method, url));
        Ok(Self {
            method: method.to_string(),
            url: url.to_string(),
            params,
            headers,
            body,
        })
    }
}

enum ResponseBody {
    Bytes(Vec<u8>),
    File(PathBuf),
}

/// What a web handler answers with.
pub struct Response {
    status: u16,
    headers: Vec<(String, String)>,
    body: ResponseBody,
}

impl Response {
    pub fn bytes(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: ResponseBody::Bytes(body.into()),
        }
    }

    pub fn text(body: impl Into<String>) -> Self {
        Self::bytes(body.into().into_bytes())
            .with_header("content-type", "text/plain; charset=utf-8")
    }

    pub fn json<T: serde::Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::bytes(serde_json::to_vec(value)?)
            .with_header("content-type", "application/json"))
    }

    /// Serve a file's content, read at send time. The content does not
    /// land in the journal.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: ResponseBody::File(path.into()),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// The response body, when it is in memory (`None` for file bodies).
    pub fn body_bytes(&self) -> Option<&[u8]> {
        match &self.body {
            ResponseBody::Bytes(bytes) => Some(bytes),
            ResponseBody::File(_) => None,
        }
    }

    async fn into_axum(self) -> axum::response::Response {
        let bytes = match self.body {
            ResponseBody::Bytes(bytes) => bytes,
            ResponseBody::File(path) => match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(error) => {
                    error!(path = %path.display(), %error, "could not serve file");
                    return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                }
            },
        };
        let mut response = axum::response::Response::new(axum::body::Body::from(bytes));
        *response.status_mut() = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::try_from(name.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                response.headers_mut().append(name, value);
            }
        }
        response
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let body = match &self.body {
            ResponseBody::Bytes(bytes) => format!("{} bytes", bytes.len()),
            ResponseBody::File(path) => format!("file {}", path.display()),
        };
        write!(f, "Response({}, {body})", self.status)
    }
}

/// One-shot channel a deferred handler answers through before carrying
/// on with its background work.
pub struct Responder {
    tx: oneshot::Sender<Response>,
}

impl Responder {
    /// Send the response. A dropped receiver (client gone) is ignored.
    pub fn send(self, response: Response) {
        let _ = self.tx.send(response);
    }
}

type WebUnary = Arc<dyn Fn(World, Request) -> BoxFuture<HandlerResult<Response>> + Send + Sync>;
type WebDeferred =
    Arc<dyn Fn(World, Request, Responder) -> BoxFuture<HandlerResult<()>> + Send + Sync>;

/// The two handler shapes: one response and done, or respond early and
/// keep working in the background.
#[derive(Clone)]
enum WebHandler {
    Unary(WebUnary),
    Deferred(WebDeferred),
}

#[derive(Clone)]
struct RouteRecord {
    method: String,
    path: String,
    id: EventId,
}

#[derive(Default)]
struct WebInner {
    routes: IndexMap<Bind, Vec<RouteRecord>>,
    handlers: IndexMap<EventId, WebHandler>,
    bound: HashMap<Bind, SocketAddr>,
}

/// Registry and server for HTTP-driven events.
#[derive(Clone, Default)]
pub struct WebSource {
    inner: Arc<Mutex<WebInner>>,
}

impl WebSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a single-response handler. The event id is
    /// `"<bind> <METHOD> <path>"`, with the bind as given.
    pub fn event<F, Fut>(
        &self,
        bind: &str,
        method: &str,
        path: &str,
        handler: F,
    ) -> Result<EventId, RegisterError>
    where
        F: Fn(World, Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<Response>> + Send + 'static,
    {
        let handler: WebUnary = Arc::new(move |world, request| Box::pin(handler(world, request)));
        self.register(bind, method, path, WebHandler::Unary(handler))
    }

    /// Register a deferred handler: it answers through the
    /// [`Responder`], the response is sent immediately, and the rest of
    /// the handler runs as a tracked background task.
    pub fn event_deferred<F, Fut>(
        &self,
        bind: &str,
        method: &str,
        path: &str,
        handler: F,
    ) -> Result<EventId, RegisterError>
    where
        F: Fn(World, Request, Responder) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<()>> + Send + 'static,
    {
        let handler: WebDeferred =
            Arc::new(move |world, request, responder| Box::pin(handler(world, request, responder)));
        self.register(bind, method, path, WebHandler::Deferred(handler))
    }

    fn register(
        &self,
        bind: &str,
        method: &str,
        path: &str,
        handler: WebHandler,
    ) -> Result<EventId, RegisterError> {
        if !METHODS.contains(&method) {
            return Err(RegisterError::InvalidMethod(method.to_string()));
        }
        let parsed = Bind::parse(bind)?;

        let id = EventId::new(format!("{bind} {method} {path}"));
        let mut inner = self.inner.lock();
        if inner.handlers.contains_key(&id) {
            return Err(RegisterError::DuplicateEvent(id));
        }
        inner.routes.entry(parsed).or_default().push(RouteRecord {
            method: method.to_string(),
            path: path.to_string(),
            id: id.clone(),
        });
        inner.handlers.insert(id.clone(), handler);
        Ok(id)
    }

    pub fn ids(&self) -> Vec<EventId> {
        self.inner.lock().handlers.keys().cloned().collect()
    }

    pub fn has(&self, id: &EventId) -> bool {
        self.inner.lock().handlers.contains_key(id)
    }

    pub fn summary(&self) -> String {
        let inner = self.inner.lock();
        let mut text = String::new();
        for (bind, records) in &inner.routes {
            let kind = match bind {
                Bind::Tcp(..) => "TCP",
                Bind::Unix(_) => "Unix",
            };
            text.push_str(&format!("{kind} site on {bind}:\n"));
            for record in records {
                text.push_str(&format!("    {} {}\n", record.method, record.path));
            }
        }
        text
    }

    /// The address a TCP bind actually listens on, once serving (lets
    /// integrations bind port 0 and read the port back).
    pub fn local_addr(&self, bind: &str) -> Option<SocketAddr> {
        let parsed = Bind::parse(bind).ok()?;
        self.inner.lock().bound.get(&parsed).copied()
    }

    /// Re-invoke the handler of `world.id()` against a recorded run,
    /// rebuilding the request from the journal. Deferred handlers are
    /// driven to completion; the response they sent is returned.
    pub fn replay(&self, world: World) -> Option<BoxFuture<HandlerResult<Response>>> {
        let handler = self.inner.lock().handlers.get(world.id())?.clone();
        Some(Box::pin(async move {
            let request = Request::from_storage(&world).await?;
            match handler {
                WebHandler::Unary(handler) => handler(world, request).await,
                WebHandler::Deferred(handler) => {
                    let (tx, rx) = oneshot::channel();
                    handler(world, request, Responder { tx }).await?;
                    rx.await
                        .map_err(|_| BoxError::from("handler ended without responding"))
                }
            }
        }))
    }

    /// Bind every site and serve until the runtime shuts down.
    pub async fn run(&self, runtime: Runtime) {
        let (routes, handlers) = {
            let inner = self.inner.lock();
            (inner.routes.clone(), inner.handlers.clone())
        };
        if routes.is_empty() {
            return;
        }

        let mut serving = Vec::new();
        for (bind, records) in routes {
            let mut router = Router::new();
            for record in &records {
                let Some(handler) = handlers.get(&record.id) else {
                    continue;
                };
                let context = Arc::new(RouteContext {
                    runtime: runtime.clone(),
                    id: record.id.clone(),
                    handler: handler.clone(),
                });
                let service = move |params: RawPathParams, request: axum::extract::Request| {
                    let context = context.clone();
                    async move { context.dispatch(params, request).await }
                };
                let method_router = if record.method == "*" {
                    axum::routing::any(service)
                } else {
                    let Some(filter) = method_filter(&record.method) else {
                        continue;
                    };
                    axum::routing::on(filter, service)
                };
                router = router.route(&record.path, method_router);
            }

            let shutdown = runtime.cancel_token().clone().cancelled_owned();
            match &bind {
                Bind::Tcp(host, port) => {
                    let listener = match TcpListener::bind((host.as_str(), *port)).await {
                        Ok(listener) => listener,
                        Err(error) => {
                            error!(%bind, %error, "could not bind TCP site");
                            continue;
                        }
                    };
                    if let Ok(addr) = listener.local_addr() {
                        self.inner.lock().bound.insert(bind.clone(), addr);
                        info!(%addr, "TCP site");
                    }
                    log_routes(&records);
                    serving.push(tokio::spawn(async move {
                        if let Err(error) = axum::serve(listener, router)
                            .with_graceful_shutdown(shutdown)
                            .await
                        {
                            error!(%error, "TCP site stopped");
                        }
                    }));
                }
                Bind::Unix(path) => {
                    // a stale socket from a previous process blocks the bind
                    let _ = std::fs::remove_file(path);
                    let listener = match UnixListener::bind(path) {
                        Ok(listener) => listener,
                        Err(error) => {
                            error!(%bind, %error, "could not bind Unix site");
                            continue;
                        }
                    };
                    info!(path = %path.display(), "Unix site");
                    log_routes(&records);
                    serving.push(tokio::spawn(async move {
                        if let Err(error) = axum::serve(listener, router)
                            .with_graceful_shutdown(shutdown)
                            .await
                        {
                            error!(%error, "Unix site stopped");
                        }
                    }));
                }
            }
        }

        for task in serving {
            let _ = task.await;
        }
    }
}

fn log_routes(records: &[RouteRecord]) {
    for record in records {
        info!("    {} {} -> {}", record.method, record.path, record.id);
    }
}

fn method_filter(method: &str) -> Option<MethodFilter> {
    let method = axum::http::Method::from_bytes(method.as_bytes()).ok()?;
    MethodFilter::try_from(method).ok()
}

struct RouteContext {
    runtime: Runtime,
    id: EventId,
    handler: WebHandler,
}

impl RouteContext {
    async fn dispatch(
        &self,
        params: RawPathParams,
        request: axum::extract::Request,
    ) -> axum::response::Response {
        let params: HashMap<String, String> = params
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        let world = self.runtime.world(self.id.clone());
        if let Err(error) = self.runtime.store().begin_run(&world).await {
            error!(id = %self.id, %error, "could not open run");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        debug!(id = %self.id, runid = %world.runid(), "web event");

        let request = match Request::journal(&world, params, request).await {
            Ok(request) => request,
            Err(error) => {
                self.runtime.finalize(&world, Err(error)).await;
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        match &self.handler {
            // the world is finalized before the response goes out
            WebHandler::Unary(handler) => match handler(world.clone(), request).await {
                Ok(response) => {
                    self.runtime.finalize(&world, Ok(())).await;
                    response.into_axum().await
                }
                Err(error) => {
                    self.runtime.finalize(&world, Err(error)).await;
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            },
            // first response goes out now, the handler's tail runs (and
            // finalizes the world) as a tracked background task
            WebHandler::Deferred(handler) => {
                let (tx, rx) = oneshot::channel();
                let tail = handler(world.clone(), request, Responder { tx });
                let runtime = self.runtime.clone();
                let background = world.clone();
                self.runtime.spawn_tracked(async move {
                    let result = tail.await;
                    runtime.finalize(&background, result).await;
                });
                match rx.await {
                    Ok(response) => response.into_axum().await,
                    Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "web_tests.rs"]
mod tests;
