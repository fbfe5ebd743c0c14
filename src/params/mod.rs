//! # Parameter Module
//!
//! Declarative request-parameter parsing. Each endpoint declares a
//! [`ParamSet`]: an ordered list of named [`ParamSpec`]s that say where a value
//! is looked up, whether it is required, what its default is and how the raw
//! string is coerced. [`parse_args`] applies the set to a request and produces
//! [`ParsedArgs`], or a [`ParamErrors`] value listing every parameter that
//! failed. The server turns the latter into a single 400 response.
//!
//! ## Value sources
//!
//! Raw values are collected into [`RequestArgs`] from the query string, an
//! `application/x-www-form-urlencoded` body and the top-level members of a JSON
//! object body. A parameter that appears more than once (in one source or
//! across sources) is rejected with "Pass exactly one argument".
//!
//! JSON body members keep their parsed [`RawArg::json`] value: a JSON
//! parameter validates it as sent, every other kind coerces its text.
//!
//! ## Example
//!
//! ```rust
//! use jsonroute::params::{parse_args, ParamSet, ParamSpec, RequestArgs};
//! use std::collections::HashMap;
//!
//! let mut params = ParamSet::new();
//! params.insert("id", ParamSpec::string().required()).unwrap();
//! params.insert("limit", ParamSpec::bounded_int(Some(1), Some(100)).default(20)).unwrap();
//! params.insert("sort", ParamSpec::enumeration(["asc", "desc"])).unwrap();
//!
//! let args = RequestArgs::from_query("id=1234&sort=asc");
//! let parsed = parse_args(&params, &args, &HashMap::new()).unwrap();
//! assert_eq!(parsed.get_str("id"), Some("1234"));
//! assert_eq!(parsed.get_int("limit"), Some(20));
//!
//! let args = RequestArgs::from_query("sort=random");
//! let errors = parse_args(&params, &args, &HashMap::new()).unwrap_err();
//! assert_eq!(errors.len(), 2);
//! ```

mod args;
mod lang;
mod parse;
mod spec;

pub use args::{RawArg, RequestArgs};
pub use lang::{infer_language, parse_accept_language};
pub use parse::{parse_args, ArgValue, ParamError, ParamErrorKind, ParamErrors, ParsedArgs};
pub use spec::{
    json_array, JsonSchema, ParamKind, ParamSet, ParamSpec, ParamSpecError, NUMBER_TYPE,
    STRING_TYPE, UUID_TYPE,
};
