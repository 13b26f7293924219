//! Request authentication.
//!
//! The signature algorithms themselves live behind [`SignatureProvider`];
//! this module decides which one applies, stamps the date the master-key
//! signature covers, and fills in the content negotiation defaults.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::constants::{headers, media_types, DATE_FORMAT};
use crate::headers::{contains_header, set_header, Headers};
use crate::request::{Method, ResourceType, ServiceRequest};

/// Computes authorization signatures for gateway requests.
pub trait SignatureProvider: Send + Sync {
    /// Sign a request with the account master key.
    ///
    /// `headers` already contains the `x-ms-date` value for this call.
    fn key_signature(
        &self,
        method: Method,
        resource_id: &str,
        resource_type: ResourceType,
        headers: &Headers,
        master_key: &str,
    ) -> String;

    /// Pick the authorization token for `path` out of a resource token set.
    fn resource_token_signature(
        &self,
        resource_tokens: &HashMap<String, String>,
        path: &str,
        resource_id: &str,
    ) -> String;
}

/// How a proxy authorizes its calls. A proxy holds exactly one of these.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum Credentials {
    #[default]
    Anonymous,
    MasterKey(String),
    /// Resource id to resource token
    ResourceTokens(HashMap<String, String>),
}

impl Credentials {
    /// Pick the credential strategy from optional configuration values.
    ///
    /// A master key takes precedence when both are present.
    pub fn from_parts(
        master_key: Option<String>,
        resource_tokens: Option<HashMap<String, String>>,
    ) -> Self {
        match (master_key, resource_tokens) {
            (Some(key), tokens) => {
                if tokens.is_some() {
                    tracing::warn!("both master key and resource tokens configured; using master key");
                }
                Credentials::MasterKey(key)
            }
            (None, Some(tokens)) => Credentials::ResourceTokens(tokens),
            (None, None) => Credentials::Anonymous,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Credentials::Anonymous)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Anonymous => f.write_str("Anonymous"),
            Credentials::MasterKey(_) => f.write_str("MasterKey(<redacted>)"),
            Credentials::ResourceTokens(tokens) => {
                write!(f, "ResourceTokens({} tokens)", tokens.len())
            }
        }
    }
}

/// Stamps date, authorization and content negotiation headers on requests.
pub struct RequestAuthenticator {
    credentials: Credentials,
    signer: Arc<dyn SignatureProvider>,
}

impl RequestAuthenticator {
    pub fn new(credentials: Credentials, signer: Arc<dyn SignatureProvider>) -> Self {
        Self {
            credentials,
            signer,
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Add authentication and default headers to `request` for `method`.
    pub fn decorate(&self, request: &mut ServiceRequest, method: Method) {
        self.decorate_at(request, method, Utc::now());
    }

    // The steps run in this order: the signature must cover the date, and
    // the content defaults must never replace a caller's value.
    fn decorate_at(&self, request: &mut ServiceRequest, method: Method, now: DateTime<Utc>) {
        if let Credentials::MasterKey(_) = &self.credentials {
            set_header(&mut request.headers, headers::X_DATE, format_date(now));
        }

        if let Some(signature) = self.signature(request, method) {
            set_header(
                &mut request.headers,
                headers::AUTHORIZATION,
                url_encode(&signature),
            );
        }

        if method.sends_body() && !contains_header(&request.headers, headers::CONTENT_TYPE) {
            request.headers.insert(
                headers::CONTENT_TYPE.to_string(),
                media_types::JSON.to_string(),
            );
        }

        if !contains_header(&request.headers, headers::ACCEPT) {
            request
                .headers
                .insert(headers::ACCEPT.to_string(), media_types::JSON.to_string());
        }
    }

    fn signature(&self, request: &ServiceRequest, method: Method) -> Option<String> {
        match &self.credentials {
            Credentials::MasterKey(key) => Some(self.signer.key_signature(
                method,
                &request.resource_id,
                request.resource_type,
                &request.headers,
                key,
            )),
            Credentials::ResourceTokens(tokens) => Some(self.signer.resource_token_signature(
                tokens,
                &request.path,
                &request.resource_id,
            )),
            Credentials::Anonymous => None,
        }
    }
}

/// Format a timestamp the way the `x-ms-date` header expects.
pub fn format_date(time: DateTime<Utc>) -> String {
    time.format(DATE_FORMAT).to_string()
}

fn url_encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDateTime, TimeZone};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Key {
            method: Method,
            resource_id: String,
            resource_type: ResourceType,
            headers: Headers,
            key: String,
        },
        Token {
            path: String,
            resource_id: String,
        },
    }

    #[derive(Default)]
    struct RecordingSigner {
        calls: Mutex<Vec<Call>>,
    }

    impl RecordingSigner {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl SignatureProvider for RecordingSigner {
        fn key_signature(
            &self,
            method: Method,
            resource_id: &str,
            resource_type: ResourceType,
            headers: &Headers,
            master_key: &str,
        ) -> String {
            self.calls.lock().unwrap().push(Call::Key {
                method,
                resource_id: resource_id.to_string(),
                resource_type,
                headers: headers.clone(),
                key: master_key.to_string(),
            });
            "type=master&ver=1.0&sig=ab+c/d=".to_string()
        }

        fn resource_token_signature(
            &self,
            resource_tokens: &HashMap<String, String>,
            path: &str,
            resource_id: &str,
        ) -> String {
            self.calls.lock().unwrap().push(Call::Token {
                path: path.to_string(),
                resource_id: resource_id.to_string(),
            });
            resource_tokens.get(resource_id).cloned().unwrap_or_default()
        }
    }

    fn authenticator(credentials: Credentials) -> (RequestAuthenticator, Arc<RecordingSigner>) {
        let signer = Arc::new(RecordingSigner::default());
        (
            RequestAuthenticator::new(credentials, signer.clone()),
            signer,
        )
    }

    fn document_request() -> ServiceRequest {
        ServiceRequest::new(ResourceType::Document, "rid-1", "/dbs/d1/colls/c1/docs")
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap()
    }

    #[test]
    fn date_format_is_rfc1123_gmt() {
        assert_eq!(format_date(fixed_time()), "Tue, 05 Mar 2024 07:08:09 GMT");
    }

    #[test]
    fn master_key_sets_date_and_encoded_signature() {
        let (auth, _signer) = authenticator(Credentials::MasterKey("key".to_string()));
        let mut request = document_request();

        auth.decorate_at(&mut request, Method::GET, fixed_time());

        assert_eq!(
            request.headers.get("x-ms-date"),
            Some(&"Tue, 05 Mar 2024 07:08:09 GMT".to_string())
        );
        assert_eq!(
            request.headers.get("authorization"),
            Some(&"type%3Dmaster%26ver%3D1.0%26sig%3Dab%2Bc%2Fd%3D".to_string())
        );
    }

    #[test]
    fn key_signature_sees_date_and_call_identity() {
        let (auth, signer) = authenticator(Credentials::MasterKey("key".to_string()));
        let mut request = document_request().with_header("x-ms-session-token", "0:1");

        auth.decorate_at(&mut request, Method::PUT, fixed_time());

        let calls = signer.calls();
        assert_eq!(calls.len(), 1);
        match &calls[0] {
            Call::Key {
                method,
                resource_id,
                resource_type,
                headers,
                key,
            } => {
                assert_eq!(*method, Method::PUT);
                assert_eq!(resource_id, "rid-1");
                assert_eq!(*resource_type, ResourceType::Document);
                assert_eq!(key, "key");
                assert_eq!(
                    headers.get("x-ms-date"),
                    Some(&"Tue, 05 Mar 2024 07:08:09 GMT".to_string())
                );
                assert_eq!(headers.get("x-ms-session-token"), Some(&"0:1".to_string()));
                // Content defaults come after signing.
                assert!(!headers.contains_key("Content-Type"));
            }
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[test]
    fn resource_tokens_use_token_signature_without_date() {
        let mut tokens = HashMap::new();
        tokens.insert("rid-1".to_string(), "type=resource&sig=x y".to_string());
        let (auth, signer) = authenticator(Credentials::ResourceTokens(tokens));
        let mut request = document_request();

        auth.decorate(&mut request, Method::GET);

        assert_eq!(
            signer.calls(),
            vec![Call::Token {
                path: "/dbs/d1/colls/c1/docs".to_string(),
                resource_id: "rid-1".to_string(),
            }]
        );
        assert!(!request.headers.contains_key("x-ms-date"));
        assert_eq!(
            request.headers.get("authorization"),
            Some(&"type%3Dresource%26sig%3Dx+y".to_string())
        );
    }

    #[test]
    fn anonymous_adds_no_date_or_authorization() {
        let (auth, signer) = authenticator(Credentials::Anonymous);
        let mut request = document_request();

        auth.decorate(&mut request, Method::POST);

        assert!(signer.calls().is_empty());
        assert!(!request.headers.contains_key("x-ms-date"));
        assert!(!request.headers.contains_key("authorization"));
        assert_eq!(
            request.headers.get("Content-Type"),
            Some(&"application/json".to_string())
        );
        assert_eq!(
            request.headers.get("Accept"),
            Some(&"application/json".to_string())
        );
    }

    #[test]
    fn content_type_only_defaulted_for_body_methods() {
        let (auth, _) = authenticator(Credentials::Anonymous);

        for method in [Method::GET, Method::DELETE] {
            let mut request = document_request();
            auth.decorate(&mut request, method);
            assert!(!request.headers.contains_key("Content-Type"), "{}", method);
            assert!(request.headers.contains_key("Accept"));
        }

        for method in [Method::POST, Method::PUT] {
            let mut request = document_request();
            auth.decorate(&mut request, method);
            assert_eq!(
                request.headers.get("Content-Type"),
                Some(&"application/json".to_string())
            );
        }
    }

    #[test]
    fn defaults_never_override_caller_values() {
        let (auth, _) = authenticator(Credentials::Anonymous);
        let mut request = document_request()
            .with_header("Content-Type", "application/sql")
            .with_header("Accept", "text/plain");

        auth.decorate(&mut request, Method::POST);

        assert_eq!(
            request.headers.get("Content-Type"),
            Some(&"application/sql".to_string())
        );
        assert_eq!(request.headers.get("Accept"), Some(&"text/plain".to_string()));
    }

    #[test]
    fn lowercase_caller_values_are_not_shadowed() {
        let (auth, _) = authenticator(Credentials::Anonymous);
        let mut request = document_request()
            .with_header("content-type", "text/plain")
            .with_header("ACCEPT", "application/xml");

        auth.decorate(&mut request, Method::POST);

        assert_eq!(request.headers.len(), 2);
        assert_eq!(
            request.headers.get("content-type"),
            Some(&"text/plain".to_string())
        );
        assert!(!request.headers.contains_key("Content-Type"));
        assert_eq!(
            request.headers.get("ACCEPT"),
            Some(&"application/xml".to_string())
        );
        assert!(!request.headers.contains_key("Accept"));
    }

    #[test]
    fn stamped_date_replaces_caller_spelling() {
        let (auth, _) = authenticator(Credentials::MasterKey("key".to_string()));
        let mut request = document_request().with_header("X-MS-Date", "yesterday");

        auth.decorate_at(&mut request, Method::GET, fixed_time());

        assert!(!request.headers.contains_key("X-MS-Date"));
        assert_eq!(
            request.headers.get("x-ms-date"),
            Some(&"Tue, 05 Mar 2024 07:08:09 GMT".to_string())
        );
    }

    #[test]
    fn live_date_parses_back() {
        let (auth, _) = authenticator(Credentials::MasterKey("key".to_string()));
        let mut request = document_request();

        auth.decorate(&mut request, Method::GET);

        let date = request.headers.get("x-ms-date").unwrap();
        assert!(date.ends_with(" GMT"));
        assert!(NaiveDateTime::parse_from_str(date, DATE_FORMAT).is_ok());
    }

    #[test]
    fn master_key_wins_over_resource_tokens() {
        let mut tokens = HashMap::new();
        tokens.insert("rid-1".to_string(), "token".to_string());

        let credentials = Credentials::from_parts(Some("key".to_string()), Some(tokens.clone()));
        assert_eq!(credentials, Credentials::MasterKey("key".to_string()));

        assert_eq!(
            Credentials::from_parts(None, Some(tokens.clone())),
            Credentials::ResourceTokens(tokens)
        );
        assert!(Credentials::from_parts(None, None).is_anonymous());
    }

    #[test]
    fn credentials_debug_redacts_key() {
        let debug = format!("{:?}", Credentials::MasterKey("hunter2".to_string()));
        assert!(!debug.contains("hunter2"));
    }
}
