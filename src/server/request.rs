use crate::ids::{RequestId, REQUEST_ID_HEADER};
use crate::params::RequestArgs;
use may_minihttp::Request;
use std::collections::HashMap;
use std::io::Read;
use tracing::debug;

/// Transport-independent view of an HTTP request used by `AppService`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRequest {
    pub request_id: RequestId,
    /// HTTP method (GET, POST, etc.)
    pub method: String,
    /// Request path without query string, not percent-decoded
    pub path: String,
    /// Query string without the leading `?`
    pub raw_query: String,
    /// HTTP headers (lowercase keys)
    pub headers: HashMap<String, String>,
    /// Arguments from query string, form body and JSON body
    pub args: RequestArgs,
}

impl ParsedRequest {
    /// Build a request from its parts; used by `parse_request` and by tests
    /// that drive `AppService::handle` directly.
    ///
    /// `target` is the request target (`/path?query`). `body` is merged into
    /// the arguments according to the `content-type` header.
    #[must_use]
    pub fn new(method: &str, target: &str, headers: HashMap<String, String>, body: &[u8]) -> Self {
        let (path, raw_query) = match target.split_once('?') {
            Some((path, query)) => (path, query),
            None => (target, ""),
        };
        let mut args = RequestArgs::from_query(raw_query);
        merge_body(&mut args, &headers, body);

        let request_id =
            RequestId::from_header_or_new(headers.get(REQUEST_ID_HEADER).map(String::as_str));

        ParsedRequest {
            request_id,
            method: method.to_string(),
            path: if path.is_empty() { "/" } else { path }.to_string(),
            raw_query: raw_query.to_string(),
            headers,
            args,
        }
    }

    /// Path plus query string, as sent by the client.
    #[must_use]
    pub fn url(&self) -> String {
        if self.raw_query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.raw_query)
        }
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

fn merge_body(args: &mut RequestArgs, headers: &HashMap<String, String>, body: &[u8]) {
    if body.is_empty() {
        return;
    }
    let content_type = headers
        .get("content-type")
        .map(|ct| ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
        .unwrap_or_default();

    match content_type.as_str() {
        "application/x-www-form-urlencoded" => args.extend_urlencoded(body),
        "application/json" => match serde_json::from_slice::<serde_json::Value>(body) {
            Ok(json) => {
                debug!(
                    body_fields = json.as_object().map(|o| o.len()),
                    "JSON body parsed"
                );
                args.extend_json(&json);
            }
            Err(e) => debug!(error = %e, "JSON body parse failed, ignoring body"),
        },
        other => debug!(content_type = %other, size_bytes = body.len(), "Body not used for arguments"),
    }
}

/// Extract method, path, headers and arguments from a `may_minihttp::Request`.
pub fn parse_request(req: Request) -> ParsedRequest {
    let method = req.method().to_string();
    let target = req.path().to_string();

    let headers: HashMap<String, String> = req
        .headers()
        .iter()
        .map(|h| {
            (
                h.name.to_ascii_lowercase(),
                String::from_utf8_lossy(h.value).to_string(),
            )
        })
        .collect();

    debug!(
        header_count = headers.len(),
        header_names = ?headers.keys().take(20).collect::<Vec<_>>(),
        "Headers extracted"
    );

    let mut body = Vec::new();
    if let Err(e) = req.body().read_to_end(&mut body) {
        debug!(error = %e, "Failed to read request body");
        body.clear();
    }

    let parsed = ParsedRequest::new(&method, &target, headers, &body);
    debug!(
        request_id = %parsed.request_id,
        method = %parsed.method,
        path = %parsed.path,
        arg_keys = parsed.args.len(),
        body_size_bytes = body.len(),
        "HTTP request parsed"
    );
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::RawArg;

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_split_path_and_query() {
        let req = ParsedRequest::new("GET", "/p?x=1&y=2", HashMap::new(), b"");
        assert_eq!(req.path, "/p");
        assert_eq!(req.raw_query, "x=1&y=2");
        assert_eq!(req.args.get_one("x"), Some("1"));
        assert_eq!(req.url(), "/p?x=1&y=2");
    }

    #[test]
    fn test_form_body_merges_with_query() {
        let h = headers(&[("content-type", "application/x-www-form-urlencoded; charset=utf-8")]);
        let req = ParsedRequest::new("POST", "/p?a=1", h, b"b=2&a=3");
        assert_eq!(req.args.get_all("a"), Some(&[RawArg::text("1"), RawArg::text("3")][..]));
        assert_eq!(req.args.get_one("b"), Some("2"));
    }

    #[test]
    fn test_json_body_members_become_args() {
        let h = headers(&[("content-type", "application/json")]);
        let req = ParsedRequest::new("POST", "/p", h, br#"{"id": "x", "n": 3}"#);
        assert_eq!(req.args.get_one("id"), Some("x"));
        assert_eq!(req.args.get_one("n"), Some("3"));
        assert_eq!(req.args.get_all("n").unwrap()[0].json, Some(serde_json::json!(3)));
    }

    #[test]
    fn test_blank_values_match_across_sources() {
        let h = headers(&[("content-type", "application/json")]);
        let req = ParsedRequest::new("POST", "/p?a=", h, br#"{"b": ""}"#);
        assert_eq!(req.args.get_all("a"), Some(&[][..]));
        assert_eq!(req.args.get_all("b"), Some(&[][..]));
    }

    #[test]
    fn test_malformed_json_body_is_ignored() {
        let h = headers(&[("content-type", "application/json")]);
        let req = ParsedRequest::new("POST", "/p?q=1", h, b"{nope");
        assert_eq!(req.args.get_one("q"), Some("1"));
        assert!(!req.args.contains("nope"));
    }

    #[test]
    fn test_request_id_from_header() {
        let id = RequestId::new();
        let h = headers(&[(REQUEST_ID_HEADER, &id.to_string())]);
        let req = ParsedRequest::new("GET", "/", h, b"");
        assert_eq!(req.request_id, id);
    }
}
