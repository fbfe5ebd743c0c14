//! Router core module - hot path for request routing.

#![deny(clippy::inefficient_to_string)]
#![deny(clippy::format_push_string)]
#![deny(clippy::unnecessary_to_owned)]

use regex::Regex;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Maximum number of captured path arguments before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated storage for named path arguments.
///
/// Names are `Arc<str>` because they come from the route table, which is built
/// once at startup; cloning them per request is an atomic increment.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Errors raised while building the route table.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// The route pattern is not a valid regular expression.
    #[error("invalid route pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Arguments captured from the request path by the matching route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PathArgs {
    /// The pattern has no capture groups.
    #[default]
    Empty,
    /// The pattern has named groups; only groups that participated in the
    /// match are present.
    Named(ParamVec),
    /// The pattern has only unnamed groups; `None` marks a group that did not
    /// participate in the match.
    Positional(SmallVec<[Option<String>; MAX_INLINE_PARAMS]>),
}

impl PathArgs {
    /// Get a named argument.
    ///
    /// Uses "last write wins" semantics when a name appears more than once.
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        match self {
            PathArgs::Named(params) => params
                .iter()
                .rfind(|(k, _)| k.as_ref() == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    /// Get a positional argument by index.
    #[inline]
    #[must_use]
    pub fn nth(&self, index: usize) -> Option<&str> {
        match self {
            PathArgs::Positional(values) => values.get(index).and_then(|v| v.as_deref()),
            _ => None,
        }
    }

    /// Number of captured arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            PathArgs::Empty => 0,
            PathArgs::Named(params) => params.len(),
            PathArgs::Positional(values) => values.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert named arguments to a `HashMap`.
    /// Note: This allocates - use `get()` in hot paths instead
    #[must_use]
    pub fn to_map(&self) -> HashMap<String, String> {
        match self {
            PathArgs::Named(params) => params
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            _ => HashMap::new(),
        }
    }
}

impl Serialize for PathArgs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PathArgs::Empty => serializer.serialize_none(),
            PathArgs::Named(params) => {
                let mut map = serializer.serialize_map(Some(params.len()))?;
                for (k, v) in params {
                    map.serialize_entry(k.as_ref(), v)?;
                }
                map.end()
            }
            PathArgs::Positional(values) => {
                let mut seq = serializer.serialize_seq(Some(values.len()))?;
                for v in values {
                    seq.serialize_element(v)?;
                }
                seq.end()
            }
        }
    }
}

/// Result of successfully matching a request path to a route
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// Pattern source of the matched route, as registered
    pub pattern: Arc<str>,
    /// Name of the endpoint that should process this request
    pub handler_name: Arc<str>,
    /// Arguments captured from the path
    pub path_args: PathArgs,
}

#[derive(Clone)]
struct Route {
    pattern: Arc<str>,
    regex: Regex,
    handler_name: Arc<str>,
    /// Named capture groups, in group order. Empty means "use positional".
    group_names: Vec<Arc<str>>,
}

impl Route {
    fn captures(&self, path: &str) -> Option<PathArgs> {
        let caps = self.regex.captures(path)?;
        // Group 0 is the whole match; the anchor wrapper adds no capture group.
        let group_count = caps.len() - 1;
        if !self.group_names.is_empty() {
            let mut params = ParamVec::new();
            for name in &self.group_names {
                if let Some(val) = caps.name(name) {
                    params.push((Arc::clone(name), val.as_str().to_string()));
                }
            }
            Some(PathArgs::Named(params))
        } else if group_count > 0 {
            let values = (1..=group_count)
                .map(|i| caps.get(i).map(|m| m.as_str().to_string()))
                .collect();
            Some(PathArgs::Positional(values))
        } else {
            Some(PathArgs::Empty)
        }
    }
}

/// Ordered table of regex routes.
///
/// Patterns are tested in registration order and the first match wins.
/// Matching is O(n) in the number of routes, which is fine for the handful of
/// routes a JSON service typically declares.
#[derive(Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route pattern for the named endpoint.
    ///
    /// Registering a pattern that is already present replaces its endpoint but
    /// keeps the original position in the table.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::InvalidPattern`] if `pattern` does not compile.
    pub fn add_route(&mut self, pattern: &str, handler_name: &str) -> Result<(), RouteError> {
        let regex = Self::compile(pattern)?;
        let group_names: Vec<Arc<str>> = regex.capture_names().flatten().map(Arc::from).collect();
        let handler_name: Arc<str> = Arc::from(handler_name);

        if let Some(existing) = self
            .routes
            .iter_mut()
            .find(|r| r.pattern.as_ref() == pattern)
        {
            warn!(
                pattern = %pattern,
                old_handler = %existing.handler_name,
                new_handler = %handler_name,
                "Replaced existing route"
            );
            existing.handler_name = handler_name;
            return Ok(());
        }

        info!(
            pattern = %pattern,
            handler_name = %handler_name,
            named_groups = group_names.len(),
            position = self.routes.len(),
            "Route registered"
        );

        self.routes.push(Route {
            pattern: Arc::from(pattern),
            regex,
            handler_name,
            group_names,
        });
        Ok(())
    }

    /// Match a request path against the route table.
    ///
    /// # Returns
    ///
    /// * `Some(RouteMatch)` - the first route in registration order whose
    ///   pattern matches the start of `path`
    /// * `None` - if no route matches
    #[must_use]
    pub fn route(&self, path: &str) -> Option<RouteMatch> {
        let match_start = std::time::Instant::now();

        for route in &self.routes {
            if let Some(path_args) = route.captures(path) {
                debug!(
                    path = %path,
                    pattern = %route.pattern,
                    handler_name = %route.handler_name,
                    path_args = ?path_args,
                    duration_us = match_start.elapsed().as_micros(),
                    "Route matched"
                );
                return Some(RouteMatch {
                    pattern: Arc::clone(&route.pattern),
                    handler_name: Arc::clone(&route.handler_name),
                    path_args,
                });
            }
        }

        debug!(
            path = %path,
            routes_count = self.routes.len(),
            duration_us = match_start.elapsed().as_micros(),
            "No route matched"
        );
        None
    }

    /// Registered `(pattern, handler)` pairs in matching order.
    #[must_use]
    pub fn routes(&self) -> Vec<(String, String)> {
        self.routes
            .iter()
            .map(|r| (r.pattern.to_string(), r.handler_name.to_string()))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Anchor `pattern` at the start of the path and compile it.
    pub(crate) fn compile(pattern: &str) -> Result<Regex, RouteError> {
        let mut anchored = String::with_capacity(pattern.len() + 5);
        anchored.push_str("^(?:");
        anchored.push_str(pattern);
        anchored.push(')');
        Regex::new(&anchored).map_err(|source| RouteError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })
    }
}
