//! HTTP execution abstraction.
//!
//! The proxy builds a fully resolved [`OutgoingRequest`] and hands it to a
//! [`Transport`]. [`ConnectionPool`](crate::pool::ConnectionPool) is the
//! production implementation; tests substitute a recording mock.

use std::fmt;
use std::io::Read;

use bytes::Bytes;
use url::Url;

use crate::error::LocalError;
use crate::headers::Headers;
use crate::request::Method;

/// A request ready to go on the wire.
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub method: Method,
    pub url: Url,
    /// Final header set, defaults already merged with overrides
    pub headers: Headers,
    pub body: Option<Bytes>,
}

/// Status line, headers and unread body of a response.
///
/// Whatever connection produced the response stays checked out until
/// `body` reaches end-of-stream or is dropped.
pub struct RawResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Box<dyn Read + Send>,
}

impl RawResponse {
    pub fn new(status: u16, headers: Headers, body: impl Read + Send + 'static) -> Self {
        Self {
            status,
            headers,
            body: Box::new(body),
        }
    }
}

impl fmt::Debug for RawResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Executes requests against the gateway.
///
/// Implementations must release any connection they took when `send`
/// returns an error.
pub trait Transport: Send + Sync {
    fn send(&self, request: OutgoingRequest) -> Result<RawResponse, LocalError>;

    /// Stop accepting new requests.
    fn shutdown(&self) {}
}

/// Recording transport for tests.
#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Canned response served by [`MockTransport`].
    #[derive(Debug, Clone)]
    pub struct MockResponse {
        pub status: u16,
        pub headers: Headers,
        pub body: Vec<u8>,
        /// Fail reading the body after handing out the bytes
        pub fail_body: bool,
    }

    impl MockResponse {
        pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
            Self {
                status,
                headers: Headers::new(),
                body: body.into(),
                fail_body: false,
            }
        }

        pub fn with_header(mut self, name: &str, value: &str) -> Self {
            self.headers.insert(name.to_string(), value.to_string());
            self
        }

        pub fn failing_body(mut self) -> Self {
            self.fail_body = true;
            self
        }
    }

    /// Body that counts itself as an open connection until dropped.
    struct TrackedBody {
        data: io::Cursor<Vec<u8>>,
        fail: bool,
        open: Arc<AtomicUsize>,
    }

    impl Read for TrackedBody {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.data.read(buf)?;
            if n == 0 && self.fail {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
            }
            Ok(n)
        }
    }

    impl Drop for TrackedBody {
        fn drop(&mut self) {
            self.open.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[derive(Clone, Default)]
    pub struct MockTransport {
        responses: Arc<Mutex<HashMap<String, MockResponse>>>,
        default_response: Arc<Mutex<Option<MockResponse>>>,
        recorded_requests: Arc<Mutex<Vec<OutgoingRequest>>>,
        error_message: Arc<Mutex<Option<String>>>,
        open_bodies: Arc<AtomicUsize>,
        shut_down: Arc<Mutex<bool>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Serve `response` for requests to `path`.
        pub fn with_response(self, path: impl Into<String>, response: MockResponse) -> Self {
            self.responses.lock().unwrap().insert(path.into(), response);
            self
        }

        pub fn with_default_response(self, response: MockResponse) -> Self {
            *self.default_response.lock().unwrap() = Some(response);
            self
        }

        /// Fail every send with a transport error.
        pub fn fail_with(self, message: impl Into<String>) -> Self {
            *self.error_message.lock().unwrap() = Some(message.into());
            self
        }

        pub fn recorded_requests(&self) -> Vec<OutgoingRequest> {
            self.recorded_requests.lock().unwrap().clone()
        }

        pub fn last_request(&self) -> OutgoingRequest {
            self.recorded_requests
                .lock()
                .unwrap()
                .last()
                .cloned()
                .expect("no request recorded")
        }

        /// Response bodies handed out and not yet dropped.
        pub fn open_bodies(&self) -> usize {
            self.open_bodies.load(Ordering::SeqCst)
        }

        pub fn is_shut_down(&self) -> bool {
            *self.shut_down.lock().unwrap()
        }
    }

    impl Transport for MockTransport {
        fn send(&self, request: OutgoingRequest) -> Result<RawResponse, LocalError> {
            let path = request.url.path().to_string();
            self.recorded_requests.lock().unwrap().push(request);

            if let Some(message) = self.error_message.lock().unwrap().clone() {
                return Err(LocalError::Transport(message.into()));
            }

            let response = self
                .responses
                .lock()
                .unwrap()
                .get(&path)
                .cloned()
                .or_else(|| self.default_response.lock().unwrap().clone())
                .unwrap_or_else(|| MockResponse::new(404, r#"{"code":"NotFound"}"#));

            self.open_bodies.fetch_add(1, Ordering::SeqCst);
            let body = TrackedBody {
                data: io::Cursor::new(response.body),
                fail: response.fail_body,
                open: self.open_bodies.clone(),
            };
            Ok(RawResponse::new(response.status, response.headers, body))
        }

        fn shutdown(&self) {
            *self.shut_down.lock().unwrap() = true;
        }
    }
}
