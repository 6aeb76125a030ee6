//! Minimal HTTP client with safe logging and flexible auth.
//!
//! - Request options: headers, `Auth`, query params, timeout
//! - Redacts authorization/cookie material and never logs secret values
//! - Non-2xx responses surface as [`HttpError::Status`] carrying the status
//!   code and the raw body text, so callers can react to specific statuses
//!
//! There is deliberately no retry loop here: a transient failure is
//! reported to the caller, not retried.
//!
//! Example (no_run):
//! ```rust
//! # async fn demo() -> Result<(), perch_http::HttpError> {
//! let client = perch_http::HttpClient::new("https://api.example.com")?;
//! let got: serde_json::Value = client
//!     .get_json("v1/items", perch_http::RequestOpts::default())
//!     .await?;
//! # Ok(()) }
//! ```

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Url};

pub use reqwest::header;
pub use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::borrow::Cow;
use std::time::Duration;
use thiserror::Error;

// ==============================
// Errors
// ==============================

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("decode error: {0}, body_snippet: {1}")]
    Decode(String, String),
    #[error("server returned {status}: {body}")]
    Status { status: StatusCode, body: String },
}

impl HttpError {
    /// HTTP status of the response, when the server answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// ==============================
// Auth & Request Options
// ==============================

/// Authentication strategies supported by the HTTP client helpers.
#[derive(Clone, Debug)]
pub enum Auth<'a> {
    /// Authorization: Bearer <token>
    Bearer(&'a str),
    /// Custom header (e.g. a guest token header)
    Header {
        name: HeaderName,
        value: HeaderValue,
    },
    None,
}

/// Per-request tuning knobs for the HTTP client.
#[derive(Clone, Debug, Default)]
pub struct RequestOpts<'a> {
    pub timeout: Option<Duration>,
    pub auth: Option<Auth<'a>>,
    pub headers: Option<HeaderMap>,
    pub query: Option<Vec<(&'a str, Cow<'a, str>)>>, // e.g. [("q", "term".into())]
    /// If true and `path` is an absolute URL, use it as-is (ignore base).
    pub allow_absolute: bool,
}

// ==============================
// Client
// ==============================

#[derive(Clone)]
pub struct HttpClient {
    base: Url,
    inner: Client,
    pub default_timeout: Duration,
}

impl HttpClient {
    /// Construct a client anchored to a base URL.
    ///
    /// ```no_run
    /// use perch_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://api.example.com")?;
    /// assert_eq!(client.default_timeout, Duration::from_secs(15));
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        let base = Url::parse(base).map_err(|e| HttpError::Url(e.to_string()))?;
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base,
            inner,
            default_timeout: Duration::from_secs(15),
        })
    }

    /// Override the default timeout returned by [`HttpClient::new`].
    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    /// GET and decode a JSON body.
    pub async fn get_json<T>(&self, path: &str, opts: RequestOpts<'_>) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        let bytes = self.request_bytes::<()>(Method::GET, path, None, opts).await?;
        decode_json(&bytes)
    }

    /// POST a JSON body and decode the JSON response.
    pub async fn post_json<B, T>(
        &self,
        path: &str,
        body: &B,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let bytes = self
            .request_bytes(Method::POST, path, Some(body), opts)
            .await?;
        decode_json(&bytes)
    }

    /// GET a plain text body (used for non-API pages).
    pub async fn get_text(&self, path: &str, opts: RequestOpts<'_>) -> Result<String, HttpError> {
        let bytes = self.request_bytes::<()>(Method::GET, path, None, opts).await?;
        String::from_utf8(bytes).map_err(|e| HttpError::Decode(e.to_string(), String::new()))
    }

    async fn request_bytes<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        opts: RequestOpts<'_>,
    ) -> Result<Vec<u8>, HttpError>
    where
        B: Serialize + ?Sized,
    {
        // Resolve URL (allow absolute URL when requested).
        let url = if opts.allow_absolute {
            Url::parse(path).or_else(|_| self.base.join(path))
        } else {
            self.base.join(path)
        }
        .map_err(|e| HttpError::Url(e.to_string()))?;

        let mut rb = self.inner.request(method.clone(), url.clone());

        let timeout = opts.timeout.unwrap_or(self.default_timeout);
        rb = rb.timeout(timeout);

        if let Some(q) = &opts.query {
            let pairs: Vec<(&str, &str)> = q.iter().map(|(k, v)| (*k, v.as_ref())).collect();
            rb = rb.query(&pairs);
        }

        if let Some(b) = body {
            rb = rb.json(b);
        }

        if let Some(hdrs) = &opts.headers {
            rb = rb.headers(hdrs.clone());
        }

        if let Some(auth) = &opts.auth {
            match auth {
                Auth::Bearer(tok) => {
                    let tok = sanitize_bearer(tok)?;
                    rb = rb.bearer_auth(tok);
                }
                Auth::Header { name, value } => {
                    rb = rb.header(name, value);
                }
                Auth::None => {}
            }
        }

        // ----- Safe request logging (pre-send) -----
        let auth_kind = match &opts.auth {
            Some(Auth::Bearer(_)) => "bearer",
            Some(Auth::Header { .. }) => "header",
            Some(Auth::None) | None => "none",
        };
        let query_keys: Vec<&str> = opts
            .query
            .as_ref()
            .map(|q| q.iter().map(|(k, _)| *k).collect())
            .unwrap_or_default();

        tracing::debug!(
            method=%method,
            host_path=%format!("{}{}", url.domain().unwrap_or("-"), url.path()),
            query=?query_keys,
            timeout_ms=timeout.as_millis() as u64,
            auth_kind,
            has_body=%body.is_some(),
            "http.request.start"
        );

        // ----- Send -----
        let t0 = std::time::Instant::now();
        let resp = rb
            .send()
            .await
            .map_err(|e| HttpError::Network(e.to_string()))?;
        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| HttpError::Network(e.to_string()))?;
        let dur_ms = t0.elapsed().as_millis() as u64;

        tracing::debug!(
            %status,
            duration_ms=dur_ms,
            body_len=bytes.len(),
            "http.response"
        );

        if status.is_success() {
            return Ok(bytes.to_vec());
        }

        let body_text = String::from_utf8_lossy(&bytes).to_string();
        tracing::warn!(
            %status,
            body_snippet=%snip_body(&bytes),
            "http.error"
        );
        Err(HttpError::Status {
            status,
            body: body_text,
        })
    }
}

// ==============================
// Helpers
// ==============================

fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, HttpError> {
    serde_json::from_slice::<T>(bytes).map_err(|e| {
        let snippet = snip_body(bytes);
        tracing::warn!(
            serde_err=%e.to_string(),
            body_snippet=%snippet,
            "http.response.decode_error"
        );
        HttpError::Decode(e.to_string(), snippet)
    })
}

fn snip_body(body: &[u8]) -> String {
    let mut snip = String::from_utf8_lossy(body).to_string();
    if snip.len() > 500 {
        snip.truncate(500);
        snip.push_str("...");
    }
    snip
}

fn sanitize_bearer(raw: &str) -> Result<String, HttpError> {
    let mut s = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string();
    s.retain(|ch| !ch.is_ascii_whitespace());

    // Validate header value upfront for clear errors
    HeaderValue::from_str(&format!("Bearer {}", s))
        .map_err(|e| HttpError::Build(format!("invalid Authorization header: {e}")))?;
    Ok(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_is_trimmed_and_dequoted() {
        assert_eq!(sanitize_bearer("  \"abc def\"  ").unwrap(), "abcdef");
    }

    #[test]
    fn bearer_rejects_control_bytes() {
        assert!(sanitize_bearer("ab\x01cd").is_err());
    }

    #[test]
    fn status_accessor_only_set_for_server_answers() {
        let err = HttpError::Status {
            status: StatusCode::UNAUTHORIZED,
            body: "{}".into(),
        };
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(HttpError::Network("reset".into()).status(), None);
    }

    #[test]
    fn long_bodies_are_snipped_for_logs() {
        let body = vec![b'x'; 600];
        let snip = snip_body(&body);
        assert!(snip.ends_with("..."));
        assert_eq!(snip.len(), 503);
    }
}
