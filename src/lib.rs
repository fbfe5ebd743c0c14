//! # jsonroute
//!
//! **jsonroute** is a small coroutine-powered framework for JSON APIs on top of
//! `may` and `may_minihttp`.
//!
//! ## Overview
//!
//! A service is a list of regex routes, each pointing at a [`JsonEndpoint`].
//! An endpoint declares its query/body parameters once; requests that fail
//! coercion never reach the handler and get a `400` listing every problem.
//! Handlers return a `serde_json::Value` which is written as JSON, or as JSONP
//! when the client passes `?callback=`.
//!
//! ## Architecture
//!
//! - **[`router`]** - Ordered regex routes with named or positional captures
//! - **[`params`]** - Declarative parameter specs and coercion
//! - **[`endpoint`]** - Endpoints, handler signatures and handler errors
//! - **[`dispatcher`]** - One coroutine per endpoint, panics contained
//! - **[`server`]** - `may_minihttp` service, JSON/JSONP encoding, status mapping
//! - **[`report`]** - Server error reporting with request context
//! - **[`static_files`]** - File serving without directory listings
//! - **[`batch`]** - Run jobs with a concurrency limit, stop on the first failure
//! - **[`shutdown`]** - Signal handling and in-flight request draining
//! - **[`config`]**, **[`logging`]**, **[`runtime_config`]** - Service setup
//!
//! ### Request Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Server as HttpServer<br/>(may_minihttp)
//!     participant Service as AppService
//!     participant Router
//!     participant Dispatcher
//!     participant Endpoint as JsonEndpoint<br/>(coroutine)
//!
//!     Client->>Server: GET /hotels/12/info?lang=de
//!     Server->>Service: call(req, res)
//!     Service->>Service: parse_request, check callback
//!     Service->>Router: route("/hotels/12/info")
//!     Router-->>Service: RouteMatch { handler_name, path_args }
//!     Service->>Dispatcher: dispatch("hotel_info", call)
//!     Dispatcher->>Endpoint: DispatchRequest
//!     Endpoint->>Endpoint: parse_args, run handler
//!     Endpoint-->>Dispatcher: Result<Value, HandlerError>
//!     Dispatcher-->>Service: HandlerResult
//!     Service->>Service: envelope, encode_json
//!     Service-->>Client: 200 {"hotel_id": "12", "lang": "de"}
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use jsonroute::params::ParamSpec;
//! use jsonroute::server::{AppService, HttpServer};
//! use jsonroute::JsonEndpoint;
//! use serde_json::json;
//!
//! # fn main() -> anyhow::Result<()> {
//! let service = AppService::new();
//! service.add_route(
//!     r"/hotels/(?P<hotel_id>\d+)/info$",
//!     JsonEndpoint::new("hotel_info")
//!         .param("lang", ParamSpec::lang().default("en"))?
//!         .get(|req| {
//!             Ok(json!({
//!                 "hotel_id": req.path_args.get("hotel_id"),
//!                 "lang": req.args.get_str("lang"),
//!             }))
//!         }),
//! )?;
//!
//! let handle = HttpServer(service).start("0.0.0.0:8080")?;
//! handle.join().ok();
//! # Ok(())
//! # }
//! ```
//!
//! ## Errors
//!
//! | Outcome | Status |
//! |---|---|
//! | bad parameters, invalid callback | 400 |
//! | no route | 404 |
//! | no handler for the method | 405 |
//! | handler error or panic | 500, reported through [`report::ErrorReporter`] |
//!
//! Server error details are never sent to the client.

pub mod batch;
pub mod config;
pub mod dispatcher;
pub mod endpoint;
pub mod ids;
pub mod logging;
pub mod params;
pub mod report;
pub mod router;
pub mod runtime_config;
pub mod server;
pub mod shutdown;
pub mod static_files;

pub use batch::{run_limited, FirstError};
pub use config::AppConfig;
pub use endpoint::{HandlerError, HandlerResult, JsonEndpoint, JsonRequest};
pub use ids::RequestId;
pub use params::{ParamSpec, ParsedArgs};
pub use server::{AppService, HttpServer, ServerHandle};
