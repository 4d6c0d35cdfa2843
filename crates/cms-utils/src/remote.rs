//! Fetching remote URLs.
//!
//! [`open`] sends form data either as a `POST` body or, when the method is
//! forced to [`Method::Get`], as a query string. Unsuccessful responses are
//! errors unless [`OpenOptions::require_success`] is turned off.

use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Errors raised by [`open`].
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The server answered with a non-success status.
    #[error("HTTP error {status_code}")]
    Http {
        /// The response status code.
        status_code: u16,
        /// The response body.
        body: String,
    },

    /// The URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The request could not be sent or its body not read.
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
}

impl RemoteError {
    /// The status code of an [`RemoteError::Http`] error.
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }
}

/// The HTTP method used to send data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Options for [`open`].
#[derive(Debug, Clone)]
pub struct OpenOptions {
    /// Forces a method. By default data is posted and a request without
    /// data is a `GET`.
    pub method: Option<Method>,
    /// Whether a non-2xx status is an error.
    pub require_success: bool,
    /// Request timeout.
    pub timeout: Duration,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            method: None,
            require_success: true,
            timeout: Duration::from_secs(30),
        }
    }
}

impl OpenOptions {
    /// Forces the request method.
    #[must_use]
    pub const fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Sets whether a non-2xx status is an error.
    #[must_use]
    pub const fn require_success(mut self, require: bool) -> Self {
        self.require_success = require;
        self
    }
}

/// A fetched response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    /// Whether the status is 2xx.
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Whether the body contains `text`.
    pub fn contains(&self, text: &str) -> bool {
        self.body.contains(text)
    }
}

/// Opens `url`, sending `data` as described by `options`.
///
/// # Examples
///
/// ```no_run
/// use cms_utils::remote::{self, Method, OpenOptions};
///
/// # async fn run() -> Result<(), remote::RemoteError> {
/// let page = remote::open(
///     "http://example.com/news/",
///     &[("page", "2")],
///     &OpenOptions::default().method(Method::Get),
/// )
/// .await?;
/// assert!(page.is_success());
/// # Ok(())
/// # }
/// ```
pub async fn open(url: &str, data: &[(&str, &str)], options: &OpenOptions) -> Result<Response, RemoteError> {
    let method = options
        .method
        .unwrap_or(if data.is_empty() { Method::Get } else { Method::Post });
    let mut url = Url::parse(url)?;
    let client = reqwest::Client::builder().timeout(options.timeout).build()?;

    let request = match method {
        Method::Get => {
            if !data.is_empty() {
                url.query_pairs_mut().extend_pairs(data);
            }
            client.get(url.clone())
        }
        Method::Post => client.post(url.clone()).form(data),
    };

    tracing::debug!(url = %url, ?method, "opening remote url");
    let response = request.send().await?;
    let status = response.status().as_u16();
    let body = response.text().await?;

    let response = Response { status, body };
    if options.require_success && !response.is_success() {
        tracing::warn!(url = %url, status, "remote request failed");
        return Err(RemoteError::Http {
            status_code: status,
            body: response.body,
        });
    }
    Ok(response)
}
