//! # Dispatcher Module
//!
//! Gives every registered [`JsonEndpoint`](crate::endpoint::JsonEndpoint) its
//! own `may` coroutine that accepts requests, and runs each request on a
//! fresh coroutine so slow handlers never queue other callers.
//!
//! ## Request Flow
//!
//! 1. The service resolves a path to an endpoint name through the router
//! 2. [`Dispatcher::dispatch`] sends the request to that endpoint's coroutine
//!    over a channel, together with a reply channel
//! 3. A request coroutine parses parameters, runs the handler and sends the
//!    [`HandlerResult`](crate::endpoint::HandlerResult) back
//!
//! ## Error Handling
//!
//! - Unknown endpoint names yield [`DispatchError::NotRegistered`]
//! - Handler panics are caught and become server errors
//! - A closed endpoint channel yields [`DispatchError::Unavailable`]
//!
//! Coroutine stack size comes from `JSONROUTE_STACK_SIZE` (see
//! [`RuntimeConfig`](crate::runtime_config::RuntimeConfig)).

mod core;

pub use core::{DispatchError, DispatchRequest, Dispatcher, EndpointSender};
