//! Operations, resource kinds and the per-call request they travel in.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::constants::{headers, media_types};
use crate::headers::{set_header, Headers};

/// HTTP method used against the gateway
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    GET,
    POST,
    PUT,
    DELETE,
}

impl Method {
    /// Upper-case verb as sent on the request line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
        }
    }

    /// Whether the request carries the caller's body.
    pub fn sends_body(&self) -> bool {
        matches!(self, Method::POST | Method::PUT)
    }

    /// Whether a successful response is expected to carry an entity the
    /// caller will read. DELETE responses are released as soon as they are
    /// classified.
    pub fn reads_body(&self) -> bool {
        !matches!(self, Method::DELETE)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for http::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::GET => http::Method::GET,
            Method::POST => http::Method::POST,
            Method::PUT => http::Method::PUT,
            Method::DELETE => http::Method::DELETE,
        }
    }
}

/// The abstract operations a caller can ask the gateway for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Create,
    Read,
    Replace,
    Delete,
    Execute,
    ReadFeed,
    Query,
}

impl OperationType {
    pub const ALL: [OperationType; 7] = [
        OperationType::Create,
        OperationType::Read,
        OperationType::Replace,
        OperationType::Delete,
        OperationType::Execute,
        OperationType::ReadFeed,
        OperationType::Query,
    ];

    /// HTTP verb the gateway expects for this operation.
    pub fn method(&self) -> Method {
        match self {
            OperationType::Create | OperationType::Execute | OperationType::Query => Method::POST,
            OperationType::Read | OperationType::ReadFeed => Method::GET,
            OperationType::Replace => Method::PUT,
            OperationType::Delete => Method::DELETE,
        }
    }

    /// Headers forced onto the request before authentication and defaulting.
    pub fn extra_headers(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            OperationType::Query => &[
                (headers::IS_QUERY, "true"),
                (headers::CONTENT_TYPE, media_types::SQL),
            ],
            _ => &[],
        }
    }
}

/// Kind of entity a request acts on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Database,
    DocumentCollection,
    Document,
    Attachment,
    User,
    Permission,
    StoredProcedure,
    Trigger,
    UserDefinedFunction,
    Conflict,
    Offer,
    Media,
}

impl ResourceType {
    /// Path segment naming this resource type in gateway URLs.
    pub fn path_segment(&self) -> &'static str {
        match self {
            ResourceType::Database => "dbs",
            ResourceType::DocumentCollection => "colls",
            ResourceType::Document => "docs",
            ResourceType::Attachment => "attachments",
            ResourceType::User => "users",
            ResourceType::Permission => "permissions",
            ResourceType::StoredProcedure => "sprocs",
            ResourceType::Trigger => "triggers",
            ResourceType::UserDefinedFunction => "udfs",
            ResourceType::Conflict => "conflicts",
            ResourceType::Offer => "offers",
            ResourceType::Media => "media",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

/// A single call to the gateway.
///
/// The request is owned by the call that builds it and is moved into the
/// pipeline, which adds authentication and default headers to `headers`
/// in place before sending.
#[derive(Debug, Clone)]
pub struct ServiceRequest {
    pub resource_type: ResourceType,

    /// Resource id (or owner id for feeds) used when signing
    pub resource_id: String,

    /// Absolute path on the gateway, e.g. `/dbs/d1/colls/c1/docs`
    pub path: String,

    /// Per-call headers; these override the proxy defaults
    pub headers: Headers,

    /// Opaque request entity, sent only with POST and PUT
    pub body: Option<Bytes>,
}

impl ServiceRequest {
    pub fn new(
        resource_type: ResourceType,
        resource_id: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            resource_type,
            resource_id: resource_id.into(),
            path: path.into(),
            headers: Headers::new(),
            body: None,
        }
    }

    /// Set a per-call header, replacing any spelling of the same name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        set_header(&mut self.headers, name, value);
        self
    }

    /// Attach an opaque body; ignored by verbs that send none.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Attach `body` serialized as JSON.
    pub fn with_json_body(mut self, body: &impl Serialize) -> Result<Self, serde_json::Error> {
        self.body = Some(Bytes::from(serde_json::to_vec(body)?));
        Ok(self)
    }
}
