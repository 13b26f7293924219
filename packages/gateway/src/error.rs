//! Error types for gateway calls.
//!
//! [`LocalError`] covers everything that fails on this side of the wire,
//! [`ServiceError`] an answer from the gateway with an error status.

use std::time::Duration;

use crate::constants::headers::RETRY_AFTER_MS;
use crate::headers::{get_header, Headers};

/// Boxed source error carried by transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures raised on the client side before or instead of a gateway answer.
///
/// None of these are retried by the pipeline. Configuration bugs (bad
/// endpoint, bad path, bad header) will fail the same way every time; the
/// transport class (see [`LocalError::is_transport`]) may succeed on a later
/// attempt if the caller chooses to retry.
#[derive(thiserror::Error, Debug)]
pub enum LocalError {
    #[error("Invalid endpoint: {message}")]
    InvalidEndpoint { message: String },

    #[error("Incorrect uri from request path {path:?}: {message}")]
    InvalidUri { path: String, message: String },

    #[error("Invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("HTTP client execution failed: {0}")]
    Transport(#[source] BoxError),

    #[error("Timed out after {waited:?} waiting for a pooled connection")]
    PoolTimeout { waited: Duration },

    #[error("Connection pool has been shut down")]
    PoolShutdown,

    #[error("Failed to get content from the http response: {0}")]
    ResponseBody(#[source] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid connection policy: {message}")]
    InvalidPolicy { message: String },
}

impl LocalError {
    /// True for I/O-level failures that say nothing about the request itself.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            LocalError::Transport(_) | LocalError::PoolTimeout { .. } | LocalError::ResponseBody(_)
        )
    }
}

/// A response from the gateway whose status is at or above the error threshold.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Gateway returned status {status}: {body}")]
pub struct ServiceError {
    /// HTTP status code
    pub status: u16,

    /// Response body decoded as UTF-8 (empty when there was no entity)
    pub body: String,

    /// Response headers
    pub headers: Headers,
}

impl ServiceError {
    /// Build an error from a classified response.
    pub fn new(status: u16, body: impl Into<String>, headers: Headers) -> Self {
        Self {
            status,
            body: body.into(),
            headers,
        }
    }

    /// Look up a response header, ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        get_header(&self.headers, name)
    }

    /// 404: the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// 409: a resource with the same id already exists.
    pub fn is_conflict(&self) -> bool {
        self.status == 409
    }

    /// 412: an `If-Match` condition did not hold.
    pub fn is_precondition_failed(&self) -> bool {
        self.status == 412
    }

    /// 429: the request rate is too large; see [`ServiceError::retry_after`].
    pub fn is_throttled(&self) -> bool {
        self.status == 429
    }

    /// Back-off the gateway asked for, if it sent `x-ms-retry-after-ms`.
    pub fn retry_after(&self) -> Option<Duration> {
        self.header(RETRY_AFTER_MS)?
            .trim()
            .parse::<u64>()
            .ok()
            .map(Duration::from_millis)
    }
}

/// Every way a gateway call can fail.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Local(#[from] LocalError),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl Error {
    /// Status code of a gateway error; `None` for local failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Service(e) => Some(e.status),
            Error::Local(_) => None,
        }
    }

    /// True when the gateway answered with an error status.
    pub fn is_service(&self) -> bool {
        matches!(self, Error::Service(_))
    }

    /// The gateway error, if this is one.
    pub fn as_service(&self) -> Option<&ServiceError> {
        match self {
            Error::Service(e) => Some(e),
            Error::Local(_) => None,
        }
    }
}
