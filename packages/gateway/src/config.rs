//! Proxy configuration.
//!
//! Everything here is fixed once a [`GatewayProxy`](crate::GatewayProxy) is
//! built. Configurations can be assembled with the `with_*` setters or
//! loaded from JSON, where durations are given in seconds (fractions
//! allowed):
//!
//! ```ignore
//! let config = GatewayConfig::from_json_str(r#"{
//!     "endpoint": "https://db.example.com:443/",
//!     "master_key": "c2VjcmV0",
//!     "consistency_level": "Session",
//!     "connection_policy": { "request_timeout": 30, "max_pool_size": 20 }
//! }"#)?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::MINIMUM_STATUS_CODE_AS_ERROR;
use crate::error::LocalError;

/// Consistency level requested for every call of a proxy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ConsistencyLevel {
    Strong,
    BoundedStaleness,
    Session,
    Eventual,
}

impl fmt::Display for ConsistencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConsistencyLevel::Strong => "Strong",
            ConsistencyLevel::BoundedStaleness => "BoundedStaleness",
            ConsistencyLevel::Session => "Session",
            ConsistencyLevel::Eventual => "Eventual",
        };
        f.write_str(name)
    }
}

/// Sizing and timeouts of the connection pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionPolicy {
    /// Connect timeout and overall per-request timeout
    #[serde(with = "seconds")]
    pub request_timeout: Duration,

    /// Maximum concurrent connections, in total and per host
    pub max_pool_size: usize,

    /// Idle connections older than this are closed
    #[serde(with = "seconds")]
    pub idle_connection_timeout: Duration,
}

impl Default for ConnectionPolicy {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            max_pool_size: 100,
            idle_connection_timeout: Duration::from_secs(60),
        }
    }
}

impl ConnectionPolicy {
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_pool_size(mut self, size: usize) -> Self {
        self.max_pool_size = size;
        self
    }

    pub fn with_idle_connection_timeout(mut self, timeout: Duration) -> Self {
        self.idle_connection_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), LocalError> {
        if self.max_pool_size == 0 {
            return Err(LocalError::InvalidPolicy {
                message: "max_pool_size must be at least 1".to_string(),
            });
        }
        if self.request_timeout.is_zero() {
            return Err(LocalError::InvalidPolicy {
                message: "request_timeout must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Everything needed to build a [`GatewayProxy`](crate::GatewayProxy).
#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway endpoint; only its host and port are used
    pub endpoint: Url,

    #[serde(default)]
    pub connection_policy: ConnectionPolicy,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consistency_level: Option<ConsistencyLevel>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_key: Option<String>,

    /// Resource id to resource token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_tokens: Option<HashMap<String, String>>,

    /// Responses with a status at or above this are errors
    #[serde(default = "default_error_status_threshold")]
    pub error_status_threshold: u16,
}

fn default_error_status_threshold() -> u16 {
    MINIMUM_STATUS_CODE_AS_ERROR
}

impl GatewayConfig {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            connection_policy: ConnectionPolicy::default(),
            consistency_level: None,
            master_key: None,
            resource_tokens: None,
            error_status_threshold: MINIMUM_STATUS_CODE_AS_ERROR,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, LocalError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_connection_policy(mut self, policy: ConnectionPolicy) -> Self {
        self.connection_policy = policy;
        self
    }

    pub fn with_consistency_level(mut self, level: ConsistencyLevel) -> Self {
        self.consistency_level = Some(level);
        self
    }

    pub fn with_master_key(mut self, key: impl Into<String>) -> Self {
        self.master_key = Some(key.into());
        self
    }

    pub fn with_resource_tokens(mut self, tokens: HashMap<String, String>) -> Self {
        self.resource_tokens = Some(tokens);
        self
    }

    pub fn with_error_status_threshold(mut self, threshold: u16) -> Self {
        self.error_status_threshold = threshold;
        self
    }
}

// Secrets stay out of logs.
impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("connection_policy", &self.connection_policy)
            .field("consistency_level", &self.consistency_level)
            .field("master_key", &self.master_key.as_ref().map(|_| "<redacted>"))
            .field(
                "resource_tokens",
                &self.resource_tokens.as_ref().map(|t| t.len()),
            )
            .field("error_status_threshold", &self.error_status_threshold)
            .finish()
    }
}

mod seconds {
    use std::time::Duration;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    // Whole seconds stay integers; anything finer is written as a fraction
    // so it survives a reload.
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        if value.subsec_nanos() == 0 {
            serializer.serialize_u64(value.as_secs())
        } else {
            serializer.serialize_f64(value.as_secs_f64())
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs)
            .map_err(|e| D::Error::custom(format!("invalid duration {}: {}", secs, e)))
    }
}
