//! Turning raw gateway responses into results.

use std::fmt;
use std::io::{self, Read};

use serde::de::DeserializeOwned;

use crate::error::{Error, LocalError, ServiceError};
use crate::headers::Headers;
use crate::transport::RawResponse;

/// A successful gateway response.
///
/// The body has not been read yet. The connection that carried it stays
/// checked out of the pool until the body is read to the end or the
/// response is dropped.
pub struct ServiceResponse {
    status: u16,
    headers: Headers,
    body: Box<dyn Read + Send>,
}

impl ServiceResponse {
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Look up a response header, ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn into_body(self) -> Box<dyn Read + Send> {
        self.body
    }

    pub fn bytes(mut self) -> Result<Vec<u8>, LocalError> {
        let mut buf = Vec::new();
        self.body
            .read_to_end(&mut buf)
            .map_err(LocalError::ResponseBody)?;
        Ok(buf)
    }

    pub fn text(self) -> Result<String, LocalError> {
        let bytes = self.bytes()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn json<T: DeserializeOwned>(self) -> Result<T, LocalError> {
        let bytes = self.bytes()?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Drain and drop the body so its connection goes back to the pool now.
    pub(crate) fn release_connection(&mut self) -> io::Result<u64> {
        let drained = io::copy(&mut self.body, &mut io::sink());
        self.body = Box::new(io::empty());
        drained
    }
}

impl Read for ServiceResponse {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.body.read(buf)
    }
}

impl fmt::Debug for ServiceResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Split a raw response into success or gateway error by status code.
///
/// Below `threshold` the response is returned untouched with its body
/// unread. At or above it the whole body is read and decoded as UTF-8 (bad
/// sequences are replaced) into a [`ServiceError`]; a failure while reading
/// that body is a local error, not a gateway one.
pub fn classify(raw: RawResponse, threshold: u16) -> Result<ServiceResponse, Error> {
    let RawResponse {
        status,
        headers,
        mut body,
    } = raw;

    if status < threshold {
        return Ok(ServiceResponse {
            status,
            headers,
            body,
        });
    }

    let mut bytes = Vec::new();
    body.read_to_end(&mut bytes)
        .map_err(LocalError::ResponseBody)?;
    drop(body);

    let text = String::from_utf8_lossy(&bytes).into_owned();
    Err(ServiceError::new(status, text, headers).into())
}
