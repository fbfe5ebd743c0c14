//! # Endpoint Module
//!
//! A [`JsonEndpoint`] bundles the parameter declarations of one resource with
//! its per-method handlers. The service routes a request to an endpoint, the
//! endpoint parses the declared parameters and calls the handler for the
//! request method with a [`JsonRequest`].
//!
//! ## Example
//!
//! ```rust
//! use jsonroute::endpoint::{HandlerError, JsonEndpoint};
//! use jsonroute::params::ParamSpec;
//! use serde_json::json;
//!
//! let endpoint = JsonEndpoint::new("hotel_info")
//!     .param("lang", ParamSpec::lang().default("en"))
//!     .unwrap()
//!     .get(|req| {
//!         let hotel_id = req.path_args.get("hotel_id").ok_or_else(|| HandlerError::not_found("Unknown hotel"))?;
//!         Ok(json!({ "hotel": hotel_id, "lang": req.args.get_str("lang") }))
//!     });
//! assert_eq!(endpoint.allowed_methods(), "GET");
//! ```
//!
//! ## Errors
//!
//! Handlers return [`HandlerError`]. Client errors (`4xx`) are shown to the
//! caller as `"<status> <message>"`. Everything else is a server error: it is
//! logged and reported, and the caller only sees `500 Server-side error`.

use crate::ids::RequestId;
use crate::params::{parse_args, ParamSet, ParamSpec, ParamSpecError, ParsedArgs, RequestArgs};
use crate::router::PathArgs;
use http::Method;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Result of a handler call.
pub type HandlerResult = Result<Value, HandlerError>;

/// Boxed handler closure.
pub type HandlerFn = Arc<dyn Fn(&JsonRequest) -> HandlerResult + Send + Sync>;

/// Error returned by a handler.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// An HTTP error with a status code. Only `4xx` statuses reach the client
    /// with their message.
    #[error("{status} {message}")]
    Http { status: u16, message: String },
    /// Any other failure. Never exposed to the client.
    #[error(transparent)]
    Server(#[from] anyhow::Error),
}

impl HandlerError {
    #[must_use]
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        HandlerError::Http {
            status,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::http(400, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::http(404, message)
    }

    #[must_use]
    pub fn method_not_allowed() -> Self {
        Self::http(405, "Method Not Allowed")
    }

    /// `Some((status, message))` if this error may be shown to the client.
    #[must_use]
    pub fn client_error(&self) -> Option<(u16, &str)> {
        match self {
            HandlerError::Http { status, message } if (400..500).contains(status) => {
                Some((*status, message.as_str()))
            }
            _ => None,
        }
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::Server(err.into())
    }
}

/// What a handler sees of a request.
#[derive(Debug, Clone)]
pub struct JsonRequest {
    pub request_id: RequestId,
    pub method: Method,
    pub path: String,
    /// Groups captured by the route pattern.
    pub path_args: PathArgs,
    /// Declared parameters, coerced.
    pub args: ParsedArgs,
    /// Request headers with lowercase names.
    pub headers: HashMap<String, String>,
}

impl JsonRequest {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// The raw request an endpoint is invoked with.
#[derive(Debug, Clone)]
pub struct EndpointCall {
    pub request_id: RequestId,
    pub method: Method,
    pub path: String,
    pub path_args: PathArgs,
    pub args: RequestArgs,
    pub headers: HashMap<String, String>,
}

/// Parameter declarations plus one handler per HTTP method.
#[derive(Clone)]
pub struct JsonEndpoint {
    name: String,
    params: ParamSet,
    handlers: BTreeMap<String, HandlerFn>,
}

impl JsonEndpoint {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: ParamSet::new(),
            handlers: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn params(&self) -> &ParamSet {
        &self.params
    }

    /// Declare a request parameter shared by every method of this endpoint.
    ///
    /// # Errors
    ///
    /// Returns a [`ParamSpecError`] for inconsistent or duplicate declarations.
    pub fn param(mut self, name: &str, spec: ParamSpec) -> Result<Self, ParamSpecError> {
        self.params.insert(name, spec)?;
        Ok(self)
    }

    /// Register `handler` for `method`, replacing any previous handler.
    #[must_use]
    pub fn on<F>(mut self, method: Method, handler: F) -> Self
    where
        F: Fn(&JsonRequest) -> HandlerResult + Send + Sync + 'static,
    {
        self.handlers
            .insert(method.as_str().to_string(), Arc::new(handler));
        self
    }

    #[must_use]
    pub fn get<F>(self, handler: F) -> Self
    where
        F: Fn(&JsonRequest) -> HandlerResult + Send + Sync + 'static,
    {
        self.on(Method::GET, handler)
    }

    #[must_use]
    pub fn post<F>(self, handler: F) -> Self
    where
        F: Fn(&JsonRequest) -> HandlerResult + Send + Sync + 'static,
    {
        self.on(Method::POST, handler)
    }

    #[must_use]
    pub fn put<F>(self, handler: F) -> Self
    where
        F: Fn(&JsonRequest) -> HandlerResult + Send + Sync + 'static,
    {
        self.on(Method::PUT, handler)
    }

    #[must_use]
    pub fn patch<F>(self, handler: F) -> Self
    where
        F: Fn(&JsonRequest) -> HandlerResult + Send + Sync + 'static,
    {
        self.on(Method::PATCH, handler)
    }

    #[must_use]
    pub fn delete<F>(self, handler: F) -> Self
    where
        F: Fn(&JsonRequest) -> HandlerResult + Send + Sync + 'static,
    {
        self.on(Method::DELETE, handler)
    }

    /// Methods with a handler, comma separated, for the `Allow` header.
    #[must_use]
    pub fn allowed_methods(&self) -> String {
        self.handlers
            .keys()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Parse the declared parameters and run the handler for the request
    /// method.
    ///
    /// # Errors
    ///
    /// - `405` if no handler is registered for the method
    /// - `400` listing every rejected parameter
    /// - whatever the handler returns
    pub fn call(&self, call: EndpointCall) -> HandlerResult {
        let Some(handler) = self.handlers.get(call.method.as_str()) else {
            debug!(
                endpoint = %self.name,
                method = %call.method,
                allowed = %self.allowed_methods(),
                "No handler for method"
            );
            return Err(HandlerError::method_not_allowed());
        };

        let args = parse_args(&self.params, &call.args, &call.headers)
            .map_err(|errors| HandlerError::bad_request(errors.to_string()))?;

        let request = JsonRequest {
            request_id: call.request_id,
            method: call.method,
            path: call.path,
            path_args: call.path_args,
            args,
            headers: call.headers,
        };
        handler(&request)
    }
}

impl fmt::Debug for JsonEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonEndpoint")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("methods", &self.allowed_methods())
            .finish()
    }
}
