use may_minihttp::Response;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use smallvec::SmallVec;

/// Query parameter naming the JSONP callback.
pub const CALLBACK_PARAM: &str = "callback";

#[allow(clippy::expect_used)]
static CALLBACK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[_a-zA-Z0-9.$]+$").expect("callback pattern is valid"));

/// Content types this crate sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Json,
    JavaScript,
    Html,
    Css,
    PlainText,
    Png,
    Svg,
    OctetStream,
}

impl ContentType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Json => "application/json; charset=utf-8",
            ContentType::JavaScript => "application/javascript; charset=utf-8",
            ContentType::Html => "text/html; charset=utf-8",
            ContentType::Css => "text/css; charset=utf-8",
            ContentType::PlainText => "text/plain; charset=utf-8",
            ContentType::Png => "image/png",
            ContentType::Svg => "image/svg+xml",
            ContentType::OctetStream => "application/octet-stream",
        }
    }

    // may_minihttp only accepts 'static header lines
    fn header_line(self) -> &'static str {
        match self {
            ContentType::Json => "Content-Type: application/json; charset=utf-8",
            ContentType::JavaScript => "Content-Type: application/javascript; charset=utf-8",
            ContentType::Html => "Content-Type: text/html; charset=utf-8",
            ContentType::Css => "Content-Type: text/css; charset=utf-8",
            ContentType::PlainText => "Content-Type: text/plain; charset=utf-8",
            ContentType::Png => "Content-Type: image/png",
            ContentType::Svg => "Content-Type: image/svg+xml",
            ContentType::OctetStream => "Content-Type: application/octet-stream",
        }
    }

    /// Guess from a file extension (case-insensitive).
    #[must_use]
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "json" => ContentType::Json,
            "js" => ContentType::JavaScript,
            "html" | "htm" => ContentType::Html,
            "css" => ContentType::Css,
            "txt" => ContentType::PlainText,
            "png" => ContentType::Png,
            "svg" => ContentType::Svg,
            _ => ContentType::OctetStream,
        }
    }
}

/// A fully encoded response, ready to be written to the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedResponse {
    pub status: u16,
    pub content_type: ContentType,
    /// Extra header lines, e.g. `Allow: GET`.
    pub headers: SmallVec<[&'static str; 2]>,
    pub body: Vec<u8>,
}

impl EncodedResponse {
    #[must_use]
    pub fn new(status: u16, content_type: ContentType, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type,
            headers: SmallVec::new(),
            body,
        }
    }

    #[must_use]
    pub fn with_header(mut self, line: &'static str) -> Self {
        self.headers.push(line);
        self
    }

    /// Body as text, for logging and tests.
    #[must_use]
    pub fn body_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Body parsed as JSON. `None` for JSONP or non-JSON bodies.
    #[must_use]
    pub fn body_json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

/// Hook that shapes every JSON body before it is serialized.
///
/// `message` is `None` for successful responses and the client-facing error
/// text (e.g. `"404 Not Found"`) for errors, in which case `body` is `null`.
pub trait ResponseEnvelope: Send + Sync {
    fn wrap(&self, body: Value, status: u16, message: Option<&str>) -> Value;
}

/// Default envelope: successes pass through untouched, errors become
/// `{"error": "<status> <message>"}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorEnvelope;

impl ResponseEnvelope for ErrorEnvelope {
    fn wrap(&self, body: Value, _status: u16, message: Option<&str>) -> Value {
        match message {
            Some(message) => json!({ "error": message }),
            None => body,
        }
    }
}

/// Wraps every body as `{"status": .., "message": .., "data": ..}`.
///
/// Useful for JSONP callers, which can't read the HTTP status.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusEnvelope;

impl ResponseEnvelope for StatusEnvelope {
    fn wrap(&self, body: Value, status: u16, message: Option<&str>) -> Value {
        json!({
            "status": status,
            "message": message,
            "data": body,
        })
    }
}

/// The JSONP callback was not a plain JavaScript identifier path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Invalid callback")]
pub struct InvalidCallback;

/// The JSONP callback requested in the query string, if any.
///
/// A request is JSONP only when `callback` is given exactly once in the
/// query. Body members named `callback` are ordinary arguments.
///
/// # Errors
///
/// [`InvalidCallback`] if the callback contains anything besides letters,
/// digits, `_`, `.` and `$`.
pub fn jsonp_callback(query: &str) -> Result<Option<String>, InvalidCallback> {
    let mut values = url::form_urlencoded::parse(query.as_bytes())
        .filter(|(k, _)| k == CALLBACK_PARAM)
        .map(|(_, v)| v);
    match (values.next(), values.next()) {
        (Some(cb), None) if cb.is_empty() => Ok(None),
        (Some(cb), None) if CALLBACK_RE.is_match(&cb) => Ok(Some(cb.into_owned())),
        (Some(_), None) => Err(InvalidCallback),
        _ => Ok(None),
    }
}

/// Serialize `body` as JSON, or as a JSONP script when `callback` is set.
///
/// Non-ASCII characters are written as UTF-8, not escaped. JSONP responses
/// always carry status 200 since script tags can't see the real one.
///
/// # Errors
///
/// Propagates serialization failures.
pub fn encode_json(
    body: &Value,
    status: u16,
    callback: Option<&str>,
) -> Result<EncodedResponse, serde_json::Error> {
    let json = serde_json::to_vec(body)?;
    Ok(match callback {
        Some(cb) => {
            let mut script = Vec::with_capacity(cb.len() + json.len() + 2);
            script.extend_from_slice(cb.as_bytes());
            script.push(b'(');
            script.extend_from_slice(&json);
            script.push(b')');
            EncodedResponse::new(200, ContentType::JavaScript, script)
        }
        None => EncodedResponse::new(status, ContentType::Json, json),
    })
}

/// Last-resort body if the envelope output can't be serialized.
pub(crate) fn fallback_server_error() -> EncodedResponse {
    EncodedResponse::new(
        500,
        ContentType::Json,
        br#"{"error":"500 Server-side error"}"#.to_vec(),
    )
}

pub(crate) fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        410 => "Gone",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        s if (400..500).contains(&s) => "Client Error",
        s if s >= 500 => "Server Error",
        _ => "OK",
    }
}

/// Write `resp` to a `may_minihttp` response.
pub fn write_response(res: &mut Response, resp: EncodedResponse) {
    res.status_code(usize::from(resp.status), status_reason(resp.status));
    res.header(resp.content_type.header_line());
    for line in resp.headers {
        res.header(line);
    }
    res.body_vec(resp.body);
}
