//! The gateway proxy: turns operations into HTTPS calls and classifies
//! what comes back.

use std::sync::Arc;

use url::Url;

use crate::auth::{Credentials, RequestAuthenticator, SignatureProvider};
use crate::config::{ConsistencyLevel, GatewayConfig};
use crate::constants::{self, headers};
use crate::error::{Error, LocalError};
use crate::headers::{merge_headers, set_header, Headers};
use crate::pool::ConnectionPool;
use crate::request::{OperationType, ServiceRequest};
use crate::response::{classify, ServiceResponse};
use crate::transport::{OutgoingRequest, Transport};

/// The gateway's host and port. Requests always go over HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
    base: Url,
}

impl Endpoint {
    /// Endpoint for `host:port`; fails if they do not form a valid URL.
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, LocalError> {
        let host = host.into();
        let base = Url::parse(&format!("https://{}:{}/", host, port)).map_err(|e| {
            LocalError::InvalidEndpoint {
                message: format!("{}:{}: {}", host, port, e),
            }
        })?;
        Ok(Self { host, port, base })
    }

    /// Take host and port from `url`; a missing port means the scheme default.
    pub fn from_url(url: &Url) -> Result<Self, LocalError> {
        let host = url.host_str().ok_or_else(|| LocalError::InvalidEndpoint {
            message: format!("{} has no host", url),
        })?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| LocalError::InvalidEndpoint {
                message: format!("{} has no port", url),
            })?;
        Self::new(host, port)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `https://{host}:{port}{path}`, never with a query string.
    pub fn url_for(&self, path: &str) -> Result<Url, LocalError> {
        if !path.is_empty() && !path.starts_with('/') {
            return Err(LocalError::InvalidUri {
                path: path.to_string(),
                message: "relative path in absolute URI".to_string(),
            });
        }
        let mut url = self.base.clone();
        url.set_path(path);
        Ok(url)
    }
}

/// Sends document database operations to a single gateway endpoint.
///
/// One proxy owns one connection pool and can be shared between threads;
/// every call is independent and blocks until its response status is known
/// (or the request timeout passes).
///
/// ```ignore
/// let proxy = GatewayProxy::new(
///     GatewayConfig::new(Url::parse("https://db.example.com")?).with_master_key(key),
///     Arc::new(MySigner),
/// )?;
///
/// let request = ServiceRequest::new(ResourceType::Document, "coll-rid", "/dbs/d1/colls/c1/docs")
///     .with_body(r#"{"id":"1"}"#);
/// let created = proxy.create(request)?.text()?;
/// ```
pub struct GatewayProxy {
    endpoint: Endpoint,
    default_headers: Headers,
    authenticator: RequestAuthenticator,
    transport: Arc<dyn Transport>,
    error_status_threshold: u16,
}

impl GatewayProxy {
    /// Create a proxy backed by a [`ConnectionPool`] sized from the config.
    pub fn new(config: GatewayConfig, signer: Arc<dyn SignatureProvider>) -> Result<Self, Error> {
        let pool = ConnectionPool::new(config.connection_policy.clone())?;
        Self::with_transport(config, signer, Arc::new(pool))
    }

    /// Create a proxy that sends through a custom transport.
    pub fn with_transport(
        config: GatewayConfig,
        signer: Arc<dyn SignatureProvider>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, Error> {
        let endpoint = Endpoint::from_url(&config.endpoint)?;
        let credentials = Credentials::from_parts(config.master_key, config.resource_tokens);

        tracing::debug!(
            host = endpoint.host(),
            port = endpoint.port(),
            credentials = ?credentials,
            "created gateway proxy"
        );

        Ok(Self {
            endpoint,
            default_headers: default_headers(config.consistency_level),
            authenticator: RequestAuthenticator::new(credentials, signer),
            transport,
            error_status_threshold: config.error_status_threshold,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn default_headers(&self) -> &Headers {
        &self.default_headers
    }

    /// POST a new resource.
    pub fn create(&self, request: ServiceRequest) -> Result<ServiceResponse, Error> {
        self.dispatch(OperationType::Create, request)
    }

    /// GET a single resource.
    pub fn read(&self, request: ServiceRequest) -> Result<ServiceResponse, Error> {
        self.dispatch(OperationType::Read, request)
    }

    /// PUT a replacement for an existing resource.
    pub fn replace(&self, request: ServiceRequest) -> Result<ServiceResponse, Error> {
        self.dispatch(OperationType::Replace, request)
    }

    /// DELETE a resource. The connection is released before this returns.
    pub fn delete(&self, request: ServiceRequest) -> Result<ServiceResponse, Error> {
        self.dispatch(OperationType::Delete, request)
    }

    /// POST to run a stored procedure.
    pub fn execute(&self, request: ServiceRequest) -> Result<ServiceResponse, Error> {
        self.dispatch(OperationType::Execute, request)
    }

    /// GET a feed of resources under the path.
    pub fn read_feed(&self, request: ServiceRequest) -> Result<ServiceResponse, Error> {
        self.dispatch(OperationType::ReadFeed, request)
    }

    /// POST a SQL query; the body is sent as `application/sql`.
    pub fn query(&self, request: ServiceRequest) -> Result<ServiceResponse, Error> {
        self.dispatch(OperationType::Query, request)
    }

    /// Run one operation: authenticate, build the HTTPS request, send it
    /// and classify the response. Nothing is retried.
    pub fn dispatch(
        &self,
        operation: OperationType,
        mut request: ServiceRequest,
    ) -> Result<ServiceResponse, Error> {
        let method = operation.method();

        for (name, value) in operation.extra_headers() {
            set_header(&mut request.headers, *name, *value);
        }
        self.authenticator.decorate(&mut request, method);
        let headers = merge_headers(&self.default_headers, &request.headers);

        let url = self.endpoint.url_for(&request.path)?;
        let body = if method.sends_body() {
            request.body
        } else {
            None
        };

        tracing::debug!(
            operation = ?operation,
            method = %method,
            path = %request.path,
            "dispatching gateway request"
        );

        let raw = self
            .transport
            .send(OutgoingRequest {
                method,
                url,
                headers,
                body,
            })
            .map_err(|e| {
                tracing::warn!(error = %e, path = %request.path, "gateway request failed");
                e
            })?;

        let mut response = classify(raw, self.error_status_threshold).map_err(|e| {
            tracing::debug!(status = ?e.status(), path = %request.path, "gateway returned error");
            e
        })?;

        if !method.reads_body() {
            if let Err(e) = response.release_connection() {
                tracing::debug!(error = %e, "discarding unread response body failed");
            }
        }

        Ok(response)
    }

    /// Stop accepting calls on the underlying transport.
    pub fn shutdown(&self) {
        self.transport.shutdown();
    }
}

fn default_headers(consistency_level: Option<ConsistencyLevel>) -> Headers {
    let mut defaults = Headers::new();
    defaults.insert(headers::CACHE_CONTROL.to_string(), "no-cache".to_string());
    defaults.insert(
        headers::VERSION.to_string(),
        constants::CURRENT_VERSION.to_string(),
    );
    defaults.insert(
        headers::USER_AGENT.to_string(),
        constants::USER_AGENT.to_string(),
    );
    if let Some(level) = consistency_level {
        defaults.insert(headers::CONSISTENCY_LEVEL.to_string(), level.to_string());
    }
    defaults
}
