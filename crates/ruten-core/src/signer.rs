//! # Request Signer
//!
//! Pure HMAC-SHA256 signing for partner API requests.
//!
//! ## Signed String
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    What Gets Signed                                     │
//! │                                                                         │
//! │  salt ‖ pathWithQuery ‖ body ‖ timestamp     (no separators)           │
//! │                                                                         │
//! │  salt           "pepper"                                               │
//! │  pathWithQuery  "/api/v1/product/list?page=1&page_size=30"             │
//! │  body           ""            (GET / DELETE without body / multipart)  │
//! │  timestamp      "1700000000"  (seconds since epoch)                    │
//! │                                                                         │
//! │  signature = lowercase_hex(HMAC_SHA256(secret, signed string))         │
//! │                                                                         │
//! │  The SAME canonical query string is appended to the URL that goes      │
//! │  on the wire. Any divergence makes the remote answer 400/401.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Canonical Query
//! - Pairs keep insertion order (no sorting)
//! - Keys and values are percent-encoded (RFC 3986 unreserved set)
//! - Repeated keys are allowed: `order_ids=1&order_ids=2`
//! - An empty query adds nothing, not even the `?`

use hmac::Mac;

use crate::credential::Credential;

/// Header carrying the identity key.
pub const HEADER_KEY: &str = "X-RT-Key";

/// Header carrying the signing timestamp.
pub const HEADER_TIMESTAMP: &str = "X-RT-Timestamp";

/// Header carrying the hex signature.
pub const HEADER_AUTHORIZATION: &str = "X-RT-Authorization";

/// Content type of JSON requests.
pub const CONTENT_TYPE_JSON: &str = "application/json";

// =============================================================================
// HTTP Method
// =============================================================================

/// HTTP methods used by the partner API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    /// Returns the method name in upper case.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Query Parameters
// =============================================================================

/// Ordered query parameters with repeatable keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Creates an empty parameter list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a pair, keeping any existing pairs with the same key.
    pub fn push(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.pairs.push((key.into(), value.to_string()));
        self
    }

    /// Appends a pair only when `value` is present.
    pub fn push_opt(self, key: impl Into<String>, value: Option<impl ToString>) -> Self {
        match value {
            Some(v) => self.push(key, v),
            None => self,
        }
    }

    /// Returns true when no pairs are present.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Returns the raw (unencoded) pairs.
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Returns the canonical `k=v&k=v` encoding, or `""` when empty.
    ///
    /// ## Example
    /// ```rust
    /// use ruten_core::signer::QueryParams;
    ///
    /// let q = QueryParams::new().push("page", 1).push("q", "a b&c");
    /// assert_eq!(q.canonical(), "page=1&q=a%20b%26c");
    /// ```
    pub fn canonical(&self) -> String {
        self.pairs
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Joins a path and its canonical query.
///
/// ## Example
/// ```rust
/// use ruten_core::signer::{path_with_query, QueryParams};
///
/// assert_eq!(path_with_query("/a", &QueryParams::new()), "/a");
/// assert_eq!(path_with_query("/a", &QueryParams::new().push("x", 1)), "/a?x=1");
/// ```
pub fn path_with_query(path: &str, query: &QueryParams) -> String {
    if query.is_empty() {
        path.to_string()
    } else {
        format!("{}?{}", path, query.canonical())
    }
}

// =============================================================================
// Signing
// =============================================================================

/// A computed signature and the timestamp it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Lowercase hex HMAC-SHA256.
    pub value: String,

    /// Seconds since epoch, as signed.
    pub timestamp: i64,
}

/// Signs one request.
///
/// `timestamp` defaults to the current time; tests pass a fixed value.
///
/// ## Example
/// ```rust
/// use ruten_core::signer::{sign, QueryParams};
/// use ruten_core::Credential;
///
/// let cred = Credential::new("key", "secret", "salt").unwrap();
/// let a = sign("/api/v1/product/list", &QueryParams::new(), "", &cred, Some(1_700_000_000));
/// let b = sign("/api/v1/product/list", &QueryParams::new(), "", &cred, Some(1_700_000_000));
/// assert_eq!(a, b);
/// assert_eq!(a.value.len(), 64);
/// ```
pub fn sign(
    path: &str,
    query: &QueryParams,
    body: &str,
    credential: &Credential,
    timestamp: Option<i64>,
) -> Signature {
    let timestamp = timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp());
    let target = path_with_query(path, query);

    let mut mac = credential.keyed_mac();
    mac.update(credential.salt_key().as_bytes());
    mac.update(target.as_bytes());
    mac.update(body.as_bytes());
    mac.update(timestamp.to_string().as_bytes());

    Signature {
        value: hex::encode(mac.finalize().into_bytes()),
        timestamp,
    }
}

/// A fully signed request, ready to hand to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub method: Method,
    pub path: String,
    pub canonical_query: String,
    pub body: String,
    pub timestamp: i64,
    pub signature: String,
}

impl SignedRequest {
    /// Signs `method path?query body` with `credential`.
    pub fn new(
        method: Method,
        path: impl Into<String>,
        query: &QueryParams,
        body: impl Into<String>,
        credential: &Credential,
        timestamp: Option<i64>,
    ) -> Self {
        let path = path.into();
        let body = body.into();
        let signature = sign(&path, query, &body, credential, timestamp);

        SignedRequest {
            method,
            canonical_query: query.canonical(),
            path,
            body,
            timestamp: signature.timestamp,
            signature: signature.value,
        }
    }

    /// The exact path and query that were signed and must be requested.
    pub fn path_with_query(&self) -> String {
        if self.canonical_query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.canonical_query)
        }
    }

    /// Builds the header set for this request.
    ///
    /// `content_type` is `None` for multipart uploads, where the HTTP client
    /// generates the boundary-carrying header itself.
    pub fn headers(
        &self,
        credential: &Credential,
        host: &str,
        content_type: Option<&str>,
    ) -> Vec<(&'static str, String)> {
        let mut headers = vec![("Host", host.to_string())];
        if let Some(ct) = content_type {
            headers.push(("Content-Type", ct.to_string()));
        }
        headers.push((HEADER_KEY, credential.api_key().to_string()));
        headers.push((HEADER_TIMESTAMP, self.timestamp.to_string()));
        headers.push((HEADER_AUTHORIZATION, self.signature.clone()));
        headers
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use hmac::Mac;

    const TS: i64 = 1_700_000_000;

    fn cred() -> Credential {
        Credential::new("identity-key", "signing-secret", "salty").unwrap()
    }

    /// Reference computation written out longhand.
    fn reference(secret: &str, message: &str) -> String {
        let mut mac = crate::credential::HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(message.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_signature_matches_reference_concatenation() {
        let query = QueryParams::new().push("page", 1).push("page_size", 30);
        let sig = sign("/api/v1/product/list", &query, "", &cred(), Some(TS));

        let expected = reference(
            "signing-secret",
            "salty/api/v1/product/list?page=1&page_size=301700000000",
        );
        assert_eq!(sig.value, expected);
        assert_eq!(sig.timestamp, TS);
    }

    #[test]
    fn test_signature_is_lowercase_hex() {
        let sig = sign("/p", &QueryParams::new(), "", &cred(), Some(TS));
        assert_eq!(sig.value.len(), 64);
        assert!(sig
            .value
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_signature_deterministic() {
        let q = QueryParams::new().push("a", "1");
        let first = sign("/p", &q, "{\"x\":1}", &cred(), Some(TS));
        let second = sign("/p", &q, "{\"x\":1}", &cred(), Some(TS));
        assert_eq!(first, second);
    }

    #[test]
    fn test_each_input_changes_signature() {
        let base_q = QueryParams::new().push("a", "1");
        let base = sign("/p", &base_q, "body", &cred(), Some(TS)).value;

        let other_path = sign("/q", &base_q, "body", &cred(), Some(TS)).value;
        let other_query = sign("/p", &QueryParams::new().push("a", "2"), "body", &cred(), Some(TS)).value;
        let other_body = sign("/p", &base_q, "body!", &cred(), Some(TS)).value;
        let other_ts = sign("/p", &base_q, "body", &cred(), Some(TS + 1)).value;
        let other_secret = sign(
            "/p",
            &base_q,
            "body",
            &Credential::new("identity-key", "other-secret", "salty").unwrap(),
            Some(TS),
        )
        .value;
        let other_salt = sign(
            "/p",
            &base_q,
            "body",
            &Credential::new("identity-key", "signing-secret", "pepper").unwrap(),
            Some(TS),
        )
        .value;

        let all = [
            &base,
            &other_path,
            &other_query,
            &other_body,
            &other_ts,
            &other_secret,
            &other_salt,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in all.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_identity_key_is_not_signed() {
        let a = sign("/p", &QueryParams::new(), "", &cred(), Some(TS));
        let other = Credential::new("different-id", "signing-secret", "salty").unwrap();
        let b = sign("/p", &QueryParams::new(), "", &other, Some(TS));
        assert_eq!(a.value, b.value);
    }

    #[test]
    fn test_canonical_query_keeps_order_and_repeats() {
        let q = QueryParams::new()
            .push("order_status", "All")
            .push("page", 2)
            .push("id", "1")
            .push("id", "2");
        assert_eq!(q.canonical(), "order_status=All&page=2&id=1&id=2");
    }

    #[test]
    fn test_canonical_query_percent_encodes() {
        let q = QueryParams::new().push("name", "露天 拍賣").push("k/v", "a+b");
        assert_eq!(
            q.canonical(),
            "name=%E9%9C%B2%E5%A4%A9%20%E6%8B%8D%E8%B3%A3&k%2Fv=a%2Bb"
        );
    }

    #[test]
    fn test_push_opt_skips_absent_values() {
        let q = QueryParams::new()
            .push_opt("start_date", Some("20240101"))
            .push_opt("end_date", None::<&str>);
        assert_eq!(q.canonical(), "start_date=20240101");
    }

    #[test]
    fn test_empty_query_adds_no_question_mark() {
        let signed = SignedRequest::new(
            Method::Get,
            "/api/v1/product/store_class/list",
            &QueryParams::new(),
            "",
            &cred(),
            Some(TS),
        );
        assert_eq!(signed.path_with_query(), "/api/v1/product/store_class/list");
        assert_eq!(
            signed.signature,
            reference("signing-secret", "salty/api/v1/product/store_class/list1700000000")
        );
    }

    #[test]
    fn test_signed_request_uses_same_string_for_url_and_signature() {
        let q = QueryParams::new().push("page", 1).push("q", "a b");
        let signed = SignedRequest::new(Method::Get, "/api/v1/product/list", &q, "", &cred(), Some(TS));
        assert_eq!(signed.path_with_query(), "/api/v1/product/list?page=1&q=a%20b");
        assert_eq!(
            signed.signature,
            sign("/api/v1/product/list", &q, "", &cred(), Some(TS)).value
        );
    }

    #[test]
    fn test_headers() {
        let signed = SignedRequest::new(Method::Post, "/p", &QueryParams::new(), "{}", &cred(), Some(TS));
        let headers = signed.headers(&cred(), "partner.ruten.com.tw", Some(CONTENT_TYPE_JSON));
        let get = |name: &str| {
            headers
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.clone())
        };

        assert_eq!(get("Host").as_deref(), Some("partner.ruten.com.tw"));
        assert_eq!(get("Content-Type").as_deref(), Some("application/json"));
        assert_eq!(get(HEADER_KEY).as_deref(), Some("identity-key"));
        assert_eq!(get(HEADER_TIMESTAMP).as_deref(), Some("1700000000"));
        assert_eq!(get(HEADER_AUTHORIZATION), Some(signed.signature.clone()));

        let multipart = signed.headers(&cred(), "h", None);
        assert!(multipart.iter().all(|(k, _)| *k != "Content-Type"));
    }

    #[test]
    fn test_default_timestamp_is_now() {
        let before = chrono::Utc::now().timestamp();
        let sig = sign("/p", &QueryParams::new(), "", &cred(), None);
        let after = chrono::Utc::now().timestamp();
        assert!(sig.timestamp >= before && sig.timestamp <= after);
    }
}
