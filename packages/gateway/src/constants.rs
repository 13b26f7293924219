//! Wire-level names and values of the gateway protocol.

/// Header names used on gateway requests and responses.
///
/// Keys are matched case-sensitively when the pipeline merges and defaults
/// headers, so callers should use these constants rather than their own
/// spellings.
pub mod headers {
    pub const CACHE_CONTROL: &str = "Cache-Control";
    pub const USER_AGENT: &str = "User-Agent";
    pub const CONTENT_TYPE: &str = "Content-Type";
    pub const ACCEPT: &str = "Accept";
    pub const AUTHORIZATION: &str = "authorization";
    pub const X_DATE: &str = "x-ms-date";
    pub const VERSION: &str = "x-ms-version";
    pub const CONSISTENCY_LEVEL: &str = "x-ms-consistency-level";
    pub const IS_QUERY: &str = "x-ms-documentdb-isquery";
    pub const RETRY_AFTER_MS: &str = "x-ms-retry-after-ms";
}

/// Media types understood by the gateway.
pub mod media_types {
    pub const JSON: &str = "application/json";
    pub const SQL: &str = "application/sql";
}

/// Protocol version sent with every request.
pub const CURRENT_VERSION: &str = "2014-08-21";

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("docdb-gateway-rs/", env!("CARGO_PKG_VERSION"));

/// Lowest status code the gateway treats as an error.
pub const MINIMUM_STATUS_CODE_AS_ERROR: u16 = 400;

/// Format of the `x-ms-date` header (RFC 1123, always GMT).
pub const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";
