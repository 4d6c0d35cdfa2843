//! HTTP helpers shared by the admin views.
//!
//! Redirect construction, ajax detection, query-string handling and the
//! origin-marker convention: when an admin request carries an origin key in
//! its query string, redirects produced by that request carry it forward.

use std::collections::HashMap;

use axum::http::header::{CONTENT_TYPE, LOCATION};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::error::{CmsError, CmsResult};

/// Decoded query-string parameters (last value wins for repeated keys).
pub type QueryParams = HashMap<String, String>;

/// Returns a `302 Found` redirect to `location`.
pub fn redirect(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => {
            let mut response = StatusCode::FOUND.into_response();
            response.headers_mut().insert(LOCATION, value);
            response
        }
        Err(_) => {
            tracing::error!(location, "invalid redirect location");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Returns `true` if the response is a redirect.
pub fn is_redirect(response: &Response) -> bool {
    response.status().is_redirection() && response.headers().contains_key(LOCATION)
}

/// Returns the `Location` header of a redirect.
pub fn location(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
}

/// Checks whether the request was made by `XMLHttpRequest`.
pub fn is_ajax(headers: &HeaderMap) -> bool {
    headers
        .get("x-requested-with")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "XMLHttpRequest")
}

/// Builds a response with an explicit content type.
pub fn with_content_type(content_type: &'static str, body: impl Into<String>) -> Response {
    let mut response = body.into().into_response();
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// Encodes key/value pairs as a query string.
///
/// # Examples
///
/// ```
/// use cms_core::http::encode_query;
///
/// assert_eq!(encode_query([("from", "sitemap"), ("q", "a b")]), "from=sitemap&q=a+b");
/// ```
pub fn encode_query<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

/// Parses a raw query string preserving order and repeated keys.
pub fn parse_query(query: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}

/// Parses a primary key taken from a URL path segment or form field.
///
/// A value that is not an integer cannot name an object, so it is reported
/// as [`CmsError::NotFound`].
pub fn parse_pk(raw: &str, verbose_name: &str) -> CmsResult<i64> {
    raw.trim().parse().map_err(|_| {
        CmsError::NotFound(format!("{verbose_name} object with primary key '{raw}' does not exist."))
    })
}

/// Carries the origin marker `key` from the request query into a redirect.
///
/// Non-redirect responses are returned unchanged.
pub fn patch_response_location(query: &QueryParams, key: &str, mut response: Response) -> Response {
    if !is_redirect(&response) {
        return response;
    }
    let Some(value) = query.get(key) else {
        return response;
    };
    let Some(current) = location(&response) else {
        return response;
    };
    let separator = if current.contains('?') { '&' } else { '?' };
    let patched = format!("{current}{separator}{}", encode_query([(key, value.as_str())]));
    if let Ok(header) = HeaderValue::from_str(&patched) {
        response.headers_mut().insert(LOCATION, header);
    }
    response
}
