//! Route registration and dispatch.
//!
//! # Responsibilities
//! - Keep an ordered list of routes and mounted sub-routers
//! - Resolve one request to one terminal outcome
//! - Enforce an optional per-router API-key gate
//! - Emit the fallback responses (400, 401, 404)
//!
//! # Design Decisions
//! - Linear scan in registration order: the first entry returning
//!   `Handled` wins and nothing after it runs
//! - Sub-routers are re-entered with an extended matcher, so mounting
//!   `/today` under `/date` matches exactly like `/date/today`
//! - A gate guards only the router that owns it; parents and children do
//!   not inherit each other's gates
//! - Bad route declarations are logged and dropped at registration
//! - Entries cannot change once the router is shared (`Arc<Router>`); build
//!   the whole table before serving

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::http::{Method, StatusCode};
use futures_util::future::{BoxFuture, FutureExt};

use crate::http::request::Request;
use crate::http::response::{Payload, Response};
use crate::observability::metrics;
use crate::routing::matcher::{PathMatch, PathMatcher};
use crate::routing::pattern::PathPattern;

/// Header carrying the credential checked by the gate.
pub const API_KEY_HEADER: &str = "api-key";

/// What a handler (or a whole router) did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Handled,
    NotHandled,
}

impl Outcome {
    pub fn is_handled(self) -> bool {
        self == Outcome::Handled
    }
}

/// Request handler. Implemented for any
/// `Fn(Request, Response) -> impl Future<Output = Outcome>`.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, request: Request, response: Response) -> BoxFuture<'static, Outcome>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    fn call(&self, request: Request, response: Response) -> BoxFuture<'static, Outcome> {
        Box::pin(self(request, response))
    }
}

type ApiKeyGate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

struct Route {
    method: Option<Method>,
    pattern: Option<PathPattern>,
    handler: Arc<dyn Handler>,
}

impl Route {
    async fn invoke(&self, request: &Request, response: &Response, matcher: &PathMatcher) -> Outcome {
        if let Some(method) = &self.method {
            if method != request.method() {
                return Outcome::NotHandled;
            }
        }

        let mut bindings = match &self.pattern {
            Some(pattern) => match matcher.match_pattern(pattern) {
                Some(found) => found,
                None => return Outcome::NotHandled,
            },
            None => PathMatch::default(),
        };
        bindings.merge_query(matcher.query_pairs());

        let request = request.with_parameters(bindings.into_parameters());
        self.handler.call(request, response.clone()).await
    }
}

struct Mount {
    prefix: PathPattern,
    router: Arc<Router>,
}

enum RouteEntry {
    Route(Route),
    Mount(Mount),
}

/// Ordered route table with optional API-key gate.
#[derive(Default)]
pub struct Router {
    entries: Vec<RouteEntry>,
    gate: Option<ApiKeyGate>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for requests matching `method` and `path`.
    /// `None` matches any method / any path. An invalid `path` is logged
    /// and the registration dropped.
    pub fn handle<H: Handler>(&mut self, method: Option<Method>, path: Option<&str>, handler: H) -> &mut Self {
        let pattern = match path.map(PathPattern::compile).transpose() {
            Ok(pattern) => pattern,
            Err(err) => {
                tracing::error!(error = %err, method = ?method, "Dropping route with invalid path");
                metrics::record_route_config_error();
                return self;
            }
        };

        self.entries.push(RouteEntry::Route(Route {
            method,
            pattern,
            handler: Arc::new(handler),
        }));
        self
    }

    pub fn get<H: Handler>(&mut self, path: &str, handler: H) -> &mut Self {
        self.handle(Some(Method::GET), Some(path), handler)
    }

    pub fn post<H: Handler>(&mut self, path: &str, handler: H) -> &mut Self {
        self.handle(Some(Method::POST), Some(path), handler)
    }

    pub fn put<H: Handler>(&mut self, path: &str, handler: H) -> &mut Self {
        self.handle(Some(Method::PUT), Some(path), handler)
    }

    pub fn delete<H: Handler>(&mut self, path: &str, handler: H) -> &mut Self {
        self.handle(Some(Method::DELETE), Some(path), handler)
    }

    pub fn patch<H: Handler>(&mut self, path: &str, handler: H) -> &mut Self {
        self.handle(Some(Method::PATCH), Some(path), handler)
    }

    /// Any method, given path.
    pub fn any<H: Handler>(&mut self, path: &str, handler: H) -> &mut Self {
        self.handle(None, Some(path), handler)
    }

    /// Mount `router` so its routes are matched below `mount_path`.
    pub fn install_subrouter(&mut self, router: Arc<Router>, mount_path: &str) -> &mut Self {
        match PathPattern::compile(mount_path) {
            Ok(prefix) => self.entries.push(RouteEntry::Mount(Mount { prefix, router })),
            Err(err) => {
                tracing::error!(error = %err, "Dropping sub-router with invalid mount path");
                metrics::record_route_config_error();
            }
        }
        self
    }

    /// Require an `API-Key` header accepted by `gate` for this router's entries.
    pub fn require_api_key<G>(&mut self, gate: G) -> &mut Self
    where
        G: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.gate = Some(Arc::new(gate));
        self
    }

    pub fn route_count(&self) -> usize {
        self.entries.len()
    }

    pub fn has_gate(&self) -> bool {
        self.gate.is_some()
    }

    /// Dispatch one request and make sure it gets a terminal response.
    ///
    /// Returns the outcome of the route table; on `NotHandled` a 404 has
    /// already been sent.
    pub async fn route_request(&self, request: Request, response: Response) -> Outcome {
        let started = Instant::now();

        let matcher = match PathMatcher::new(request.uri()) {
            Ok(matcher) => matcher,
            Err(err) => {
                tracing::debug!(uri = %request.uri(), error = %err, "Rejecting malformed request target");
                response
                    .send(Payload::text("Bad request.").with_status(StatusCode::BAD_REQUEST))
                    .await;
                metrics::record_request(request.method(), response.status(), started);
                return Outcome::Handled;
            }
        };

        let outcome = self.dispatch(&request, &response, &matcher).await;
        if !outcome.is_handled() {
            tracing::debug!(method = %request.method(), uri = %request.uri(), "No route matched");
            response
                .send(Payload::text("Resource not found.").with_status(StatusCode::NOT_FOUND))
                .await;
        }

        metrics::record_request(request.method(), response.status(), started);
        outcome
    }

    fn dispatch<'a>(
        &'a self,
        request: &'a Request,
        response: &'a Response,
        matcher: &'a PathMatcher,
    ) -> BoxFuture<'a, Outcome> {
        async move {
            if let Some(denial) = self.check_gate(request) {
                response.send(denial).await;
                return Outcome::Handled;
            }

            for entry in &self.entries {
                let outcome = match entry {
                    RouteEntry::Route(route) => route.invoke(request, response, matcher).await,
                    RouteEntry::Mount(mount) => {
                        if !matcher.can_descend(&mount.prefix) {
                            continue;
                        }
                        let nested = matcher.with_prefix(&mount.prefix);
                        mount.router.dispatch(request, response, &nested).await
                    }
                };
                if outcome.is_handled() {
                    return outcome;
                }
            }

            Outcome::NotHandled
        }
        .boxed()
    }

    /// The 401 to send when the gate rejects `request`.
    fn check_gate(&self, request: &Request) -> Option<Payload> {
        let gate = self.gate.as_ref()?;
        let unauthorized = |message: &str| {
            Some(Payload::text(message).with_status(StatusCode::UNAUTHORIZED))
        };

        match request.header(API_KEY_HEADER) {
            None if !request.headers().contains_key(API_KEY_HEADER) => {
                tracing::info!(uri = %request.uri(), "API key missing");
                unauthorized("API key missing.")
            }
            Some(key) if gate(key) => None,
            _ => {
                tracing::info!(uri = %request.uri(), "Unauthorized API key");
                unauthorized("Unauthorized API key.")
            }
        }
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<String> = self
            .entries
            .iter()
            .map(|entry| match entry {
                RouteEntry::Route(route) => format!(
                    "{} {}",
                    route.method.as_ref().map_or("*", Method::as_str),
                    route.pattern.as_ref().map_or_else(|| "*".to_string(), ToString::to_string),
                ),
                RouteEntry::Mount(mount) => format!("mount {} -> {:?}", mount.prefix, mount.router),
            })
            .collect();
        f.debug_struct("Router")
            .field("entries", &entries)
            .field("gated", &self.gate.is_some())
            .finish()
    }
}
