//! # docdb-gateway
//!
//! Gateway request pipeline for a document database client.
//!
//! A [`GatewayProxy`] turns abstract operations (create, read, replace,
//! delete, execute, read-feed, query) into authenticated HTTPS calls against
//! one gateway endpoint, sent through a shared, bounded [`ConnectionPool`],
//! and turns each response into either a [`ServiceResponse`] or an
//! [`Error`].
//!
//! ## Pipeline
//!
//! 1. Operation-specific headers are forced (queries are marked and sent as
//!    `application/sql`).
//! 2. [`RequestAuthenticator`] stamps `x-ms-date` (master key only), the
//!    URL-encoded `authorization` value from a [`SignatureProvider`], and
//!    defaults `Content-Type` / `Accept` to JSON when absent.
//! 3. The proxy's default headers are merged under the call's headers
//!    ([`merge_headers`]); the call wins on collisions.
//! 4. The request goes out as `https://{host}:{port}{path}` through the
//!    [`Transport`].
//! 5. [`classify`] turns status codes at or above the error threshold into
//!    [`ServiceError`]s carrying status, body and headers.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use docdb_gateway::{GatewayConfig, GatewayProxy, ResourceType, ServiceRequest};
//!
//! let config = GatewayConfig::new("https://db.example.com".parse()?)
//!     .with_master_key(master_key);
//! let proxy = GatewayProxy::new(config, Arc::new(MasterKeySigner))?;
//!
//! let request = ServiceRequest::new(ResourceType::Document, "coll-rid", "/dbs/d1/colls/c1/docs")
//!     .with_body(r#"{"id":"1"}"#);
//!
//! match proxy.create(request) {
//!     Ok(response) => println!("{}", response.text()?),
//!     Err(e) if e.status() == Some(409) => println!("already exists"),
//!     Err(e) => return Err(e.into()),
//! }
//! ```

pub mod auth;
pub mod config;
pub mod constants;
pub mod error;
pub mod headers;
pub mod pool;
pub mod request;
pub mod response;
pub mod transport;

mod proxy;

pub use auth::{Credentials, RequestAuthenticator, SignatureProvider};
pub use config::{ConnectionPolicy, ConsistencyLevel, GatewayConfig};
pub use error::{Error, LocalError, ServiceError};
pub use headers::{contains_header, get_header, merge_headers, set_header, Headers};
pub use pool::{ConnectionPool, Lease};
pub use proxy::{Endpoint, GatewayProxy};
pub use request::{Method, OperationType, ResourceType, ServiceRequest};
pub use response::{classify, ServiceResponse};
pub use transport::{OutgoingRequest, RawResponse, Transport};
