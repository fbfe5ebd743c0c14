use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;

#[allow(clippy::expect_used)]
static ACCEPT_LANGUAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)([a-z]{1,8}(?:-[a-z]{1,8})?)\s*(?:;\s*q\s*=\s*(1|0\.[0-9]+))?")
        .expect("accept-language pattern is valid")
});

/// Parse an `Accept-Language` header into `(locale, weight)` pairs ordered by
/// descending weight. Entries with equal weight keep their header order.
/// Wildcards are ignored and unparseable fragments are skipped.
#[must_use]
pub fn parse_accept_language(header: &str) -> Vec<(String, f32)> {
    let mut locales: Vec<(String, f32)> = ACCEPT_LANGUAGE_RE
        .captures_iter(header)
        .filter_map(|caps| {
            let locale = caps.get(1)?.as_str();
            if locale == "*" {
                return None;
            }
            let weight = match caps.get(2) {
                Some(q) => q.as_str().parse().ok()?,
                None => 1.0,
            };
            Some((locale.to_string(), weight))
        })
        .collect();
    locales.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    locales
}

/// The preferred locale of an `Accept-Language` header, if any.
#[must_use]
pub fn infer_language(header: Option<&str>) -> Option<String> {
    header
        .map(parse_accept_language)
        .and_then(|locales| locales.into_iter().next())
        .map(|(locale, _)| locale)
}
