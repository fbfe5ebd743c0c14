//! # Error Reporting
//!
//! Server-side failures are handed to an [`ErrorReporter`] together with the
//! [`RequestContext`] of the request that caused them. The default
//! [`TracingReporter`] logs them; plug in your own reporter to forward errors
//! to an external tracker.
//!
//! ```rust
//! use jsonroute::report::{ErrorReporter, RequestContext};
//! use std::sync::Mutex;
//!
//! #[derive(Default)]
//! struct Collect(Mutex<Vec<String>>);
//!
//! impl ErrorReporter for Collect {
//!     fn report(&self, ctx: &RequestContext, err: &anyhow::Error) {
//!         self.0.lock().unwrap().push(format!("{} {}: {err}", ctx.method, ctx.url));
//!     }
//! }
//! ```

use crate::ids::RequestId;
use crate::params::RequestArgs;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::error;

/// Debugging context of the request that failed.
#[derive(Debug, Clone, Serialize)]
pub struct RequestContext {
    pub request_id: RequestId,
    /// Path plus query string, as sent by the client.
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub query_string: String,
    /// Arguments gathered from query and body.
    pub data: RequestArgs,
}

/// Receives every server error.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, ctx: &RequestContext, err: &anyhow::Error);
}

/// Logs server errors with their request context at `error` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, ctx: &RequestContext, err: &anyhow::Error) {
        let context = serde_json::to_string(ctx).unwrap_or_default();
        error!(
            request_id = %ctx.request_id,
            method = %ctx.method,
            url = %ctx.url,
            error = %format!("{err:#}"),
            context = %context,
            "Unhandled server error"
        );
    }
}
