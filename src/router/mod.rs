//! # Router Module
//!
//! Regex-based path dispatch. The router keeps an ordered table of compiled
//! patterns, each bound to the name of the endpoint that serves it. An incoming
//! request path is tested against the patterns in registration order and the
//! first match wins.
//!
//! ## Pattern semantics
//!
//! Patterns are ordinary [`regex`] expressions anchored at the start of the
//! path only, so `/hotels` also matches `/hotels/1234`. Append `$` to require a
//! full-path match.
//!
//! Captured groups are handed to the endpoint as [`PathArgs`]:
//!
//! - named groups (`(?P<hotel_id>[^/]+)`) become [`PathArgs::Named`],
//! - otherwise unnamed groups become [`PathArgs::Positional`],
//! - a pattern without groups yields [`PathArgs::Empty`].
//!
//! ## Example
//!
//! ```rust
//! use jsonroute::router::{PathArgs, Router};
//!
//! let mut router = Router::new();
//! router.add_route(r"/hotels/(?P<hotel_id>[^/]+)/info$", "hotel_info").unwrap();
//! router.add_route(r"/restaurants/([^/]+)/info$", "restaurant_info").unwrap();
//!
//! let m = router.route("/hotels/1234/info").unwrap();
//! assert_eq!(m.handler_name.as_ref(), "hotel_info");
//! assert_eq!(m.path_args.get("hotel_id"), Some("1234"));
//!
//! let m = router.route("/restaurants/5678/info").unwrap();
//! assert!(matches!(m.path_args, PathArgs::Positional(_)));
//! assert_eq!(m.path_args.nth(0), Some("5678"));
//! ```

mod core;
#[cfg(test)]
mod tests;

pub use core::{ParamVec, PathArgs, RouteError, RouteMatch, Router, MAX_INLINE_PARAMS};
