//! # Server Module
//!
//! The HTTP face of the crate, built on `may_minihttp`.
//!
//! - [`parse_request`] turns a raw request into a [`ParsedRequest`]
//! - [`AppService::handle`] routes it, dispatches to the endpoint and maps
//!   the outcome to an [`EncodedResponse`]
//! - [`write_response`] puts that response on the wire
//!
//! [`AppService::handle`] doesn't touch the network, so services can be
//! exercised directly in tests.
//!
//! ## Status mapping
//!
//! | Outcome | Status | Body (default envelope) |
//! |---|---|---|
//! | handler returned a value | 200 | the value |
//! | invalid JSONP callback | 400 | `{"error": "400 Invalid callback"}` |
//! | parameter errors | 400 | `{"error": "400 id: Required; ..."}` |
//! | no route, no static file | 404 | `{"error": "404 Not Found"}` |
//! | method without handler | 405 | `{"error": "405 Method Not Allowed"}` plus `Allow` |
//! | handler error, panic | 500 | `{"error": "500 Server-side error"}` |
//! | endpoint coroutine gone | 503 | `{"error": "503 Service Unavailable"}` |
//!
//! JSONP responses (`?callback=fn`) always use status 200.

pub mod http_server;
pub mod request;
pub mod response;
pub mod service;

pub use http_server::{HttpServer, ServerHandle};
pub use request::{parse_request, ParsedRequest};
pub use response::{
    encode_json, jsonp_callback, write_response, ContentType, EncodedResponse, ErrorEnvelope,
    InvalidCallback, ResponseEnvelope, StatusEnvelope,
};
pub use service::{AppService, ServiceError, SERVER_ERROR_MESSAGE};
