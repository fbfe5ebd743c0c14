use super::request::{parse_request, ParsedRequest};
use super::response::{
    encode_json, fallback_server_error, jsonp_callback, write_response, EncodedResponse, ErrorEnvelope,
    InvalidCallback, ResponseEnvelope,
};
use crate::dispatcher::{DispatchError, Dispatcher};
use crate::endpoint::{EndpointCall, HandlerError, JsonEndpoint};
use crate::report::{ErrorReporter, RequestContext, TracingReporter};
use crate::router::{RouteError, Router};
use crate::shutdown::InFlight;
use crate::static_files::{StaticError, StaticFiles};
use http::Method;
use may_minihttp::{HttpService, Request, Response};
use serde_json::Value;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Message shown to clients for every server-side failure.
pub const SERVER_ERROR_MESSAGE: &str = "Server-side error";

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error("failed to start endpoint {name:?}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// The `may_minihttp` service: routing, dispatch, error mapping and JSON
/// encoding.
///
/// Cloning is cheap; clones share routes, endpoints and the in-flight counter.
#[derive(Clone)]
pub struct AppService {
    router: Arc<RwLock<Router>>,
    dispatcher: Arc<RwLock<Dispatcher>>,
    envelope: Arc<dyn ResponseEnvelope>,
    reporter: Arc<dyn ErrorReporter>,
    static_files: Option<StaticFiles>,
    in_flight: InFlight,
}

impl Default for AppService {
    fn default() -> Self {
        Self::new()
    }
}

impl AppService {
    #[must_use]
    pub fn new() -> Self {
        Self::with_dispatcher(Dispatcher::new())
    }

    #[must_use]
    pub fn with_dispatcher(dispatcher: Dispatcher) -> Self {
        Self {
            router: Arc::new(RwLock::new(Router::new())),
            dispatcher: Arc::new(RwLock::new(dispatcher)),
            envelope: Arc::new(ErrorEnvelope),
            reporter: Arc::new(TracingReporter),
            static_files: None,
            in_flight: InFlight::new(),
        }
    }

    /// Serve `endpoint` for paths matching `pattern`.
    ///
    /// Routes are tried in registration order. The endpoint is registered
    /// under its name; a later endpoint with the same name replaces it for
    /// every route pointing at that name.
    ///
    /// # Errors
    ///
    /// Fails for invalid patterns or if the endpoint coroutine can't be
    /// spawned. Nothing is registered in either case.
    pub fn add_route(&self, pattern: &str, endpoint: JsonEndpoint) -> Result<(), ServiceError> {
        let name = endpoint.name().to_string();
        // Validate before spawning anything.
        Router::compile(pattern)?;

        self.dispatcher
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(endpoint)
            .map_err(|source| ServiceError::Spawn {
                name: name.clone(),
                source,
            })?;
        self.router
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add_route(pattern, &name)?;
        Ok(())
    }

    /// Shape every JSON body with `envelope`.
    pub fn set_envelope<E: ResponseEnvelope + 'static>(&mut self, envelope: E) {
        self.envelope = Arc::new(envelope);
    }

    /// Send server errors to `reporter` instead of the log.
    pub fn set_reporter<R: ErrorReporter + 'static>(&mut self, reporter: R) {
        self.reporter = Arc::new(reporter);
    }

    /// Serve files from `dir` when no route matches.
    pub fn set_static_dir(&mut self, dir: impl Into<PathBuf>) {
        self.static_files = Some(StaticFiles::new(dir));
    }

    /// Shared counter of requests currently being handled.
    #[must_use]
    pub fn in_flight(&self) -> InFlight {
        self.in_flight.clone()
    }

    /// `(pattern, endpoint name)` pairs in matching order.
    #[must_use]
    pub fn routes(&self) -> Vec<(String, String)> {
        self.router
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .routes()
    }

    /// Produce the response for one request.
    pub fn handle(&self, req: ParsedRequest) -> EncodedResponse {
        let _guard = self.in_flight.enter();
        let start = Instant::now();

        let resp = match jsonp_callback(&req.raw_query) {
            Ok(callback) => self.route(&req, callback.as_deref()),
            Err(InvalidCallback) => self.client_error(400, &InvalidCallback.to_string(), None),
        };

        info!(
            request_id = %req.request_id,
            method = %req.method,
            path = %req.path,
            status = resp.status,
            latency_ms = start.elapsed().as_millis() as u64,
            "Request handled"
        );
        resp
    }

    fn route(&self, req: &ParsedRequest, callback: Option<&str>) -> EncodedResponse {
        let matched = self
            .router
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .route(&req.path);
        let Some(matched) = matched else {
            return self.fallback(req, callback);
        };

        let Ok(method) = Method::from_bytes(req.method.as_bytes()) else {
            return self.client_error(400, "Invalid method", callback);
        };

        let call = EndpointCall {
            request_id: req.request_id,
            method,
            path: req.path.clone(),
            path_args: matched.path_args,
            args: req.args.clone(),
            headers: req.headers.clone(),
        };

        let dispatcher = self.dispatcher.read().unwrap_or_else(PoisonError::into_inner);
        match dispatcher.dispatch(&matched.handler_name, call) {
            Ok(Ok(body)) => self.success(req, body, callback),
            Ok(Err(err)) => match err.client_error() {
                Some((status, message)) => {
                    let resp = self.client_error(status, message, callback);
                    match dispatcher.allow_header(&matched.handler_name) {
                        Some(allow) if status == 405 => resp.with_header(allow),
                        _ => resp,
                    }
                }
                None => {
                    let err = match err {
                        HandlerError::Server(e) => e,
                        http @ HandlerError::Http { .. } => anyhow::anyhow!("{http}"),
                    };
                    self.server_error(req, &err, callback)
                }
            },
            Err(e @ DispatchError::Unavailable(_)) => {
                self.report(req, &anyhow::Error::new(e));
                self.error_response(503, "Service Unavailable", callback)
            }
            Err(e @ DispatchError::NotRegistered(_)) => {
                self.server_error(req, &anyhow::Error::new(e), callback)
            }
        }
    }

    fn fallback(&self, req: &ParsedRequest, callback: Option<&str>) -> EncodedResponse {
        let Some(static_files) = self.static_files.as_ref().filter(|_| req.method == "GET") else {
            return self.client_error(404, "Not Found", callback);
        };
        match static_files.load(&req.path) {
            Ok((bytes, content_type)) => EncodedResponse::new(200, content_type, bytes),
            Err(StaticError::NotFound) => self.client_error(404, "Not Found", callback),
            Err(StaticError::DirectoryListing) => self.client_error(405, "Not allowed", callback),
            Err(StaticError::Io(e)) => self.server_error(req, &anyhow::Error::new(e), callback),
        }
    }

    fn success(&self, req: &ParsedRequest, body: Value, callback: Option<&str>) -> EncodedResponse {
        let body = self.envelope.wrap(body, 200, None);
        match encode_json(&body, 200, callback) {
            Ok(resp) => resp,
            Err(e) => self.server_error(req, &anyhow::Error::new(e).context("failed to encode response"), callback),
        }
    }

    /// A 4xx the client may see; not logged as an error.
    fn client_error(&self, status: u16, message: &str, callback: Option<&str>) -> EncodedResponse {
        debug!(status, message, "Client error");
        self.error_response(status, message, callback)
    }

    fn server_error(&self, req: &ParsedRequest, err: &anyhow::Error, callback: Option<&str>) -> EncodedResponse {
        self.report(req, err);
        self.error_response(500, SERVER_ERROR_MESSAGE, callback)
    }

    fn error_response(&self, status: u16, message: &str, callback: Option<&str>) -> EncodedResponse {
        let message = format!("{status} {message}");
        let body = self.envelope.wrap(Value::Null, status, Some(&message));
        encode_json(&body, status, callback).unwrap_or_else(|e| {
            warn!(error = %e, status, "Failed to encode error response");
            fallback_server_error()
        })
    }

    fn report(&self, req: &ParsedRequest, err: &anyhow::Error) {
        let ctx = RequestContext {
            request_id: req.request_id,
            url: req.url(),
            method: req.method.clone(),
            headers: req
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            query_string: req.raw_query.clone(),
            data: req.args.clone(),
        };
        self.reporter.report(&ctx, err);
    }
}

impl HttpService for AppService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let parsed = parse_request(req);
        write_response(res, self.handle(parsed));
        Ok(())
    }
}
