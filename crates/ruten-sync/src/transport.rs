//! # Signed HTTP Transport
//!
//! Executes exactly one signed HTTP request per call and classifies the
//! outcome.
//!
//! ## Response Classification
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    One call, one outcome                                │
//! │                                                                         │
//! │  network failure (DNS, connect, timeout) ──────────► Transport          │
//! │                                                                         │
//! │  2xx ─┬─ empty body ───────────────────────────────► Ok(null)           │
//! │       ├─ not JSON ─────────────────────────────────► Transport          │
//! │       ├─ JSON, status "fail"/"error" or error_code ► RemoteApi          │
//! │       └─ JSON ─────────────────────────────────────► Ok(payload)        │
//! │                                                                         │
//! │  non-2xx ─┬─ JSON ─────────────────────────────────► RemoteApi          │
//! │           └─ anything else (proxy HTML page) ──────► Transport          │
//! │                                                      status + 512 chars │
//! │                                                                         │
//! │  Every outcome emits one CallRecord to the sink. Nothing is retried.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use reqwest::header::HeaderMap;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::RemoteSettings;
use crate::error::{ClientError, ClientResult};
use crate::sink::{CallOutcome, CallRecord, ObservabilitySink};
use ruten_core::signer::{Method, QueryParams, SignedRequest, CONTENT_TYPE_JSON};
use ruten_core::{ConfigurationError, Credential};

/// Longest response fragment kept in errors and call records.
pub const BODY_EXCERPT_CHARS: usize = 512;

/// Response headers that may carry a request correlation id, in order.
const CORRELATION_HEADERS: [&str; 3] = ["x-request-id", "x-rt-request-id", "x-correlation-id"];

// =============================================================================
// Transport
// =============================================================================

/// A signing HTTP transport bound to one credential and one base URL.
///
/// The timeout is fixed here and applies to every call.
pub struct Transport {
    http: reqwest::Client,
    base_url: Url,
    host: String,
    credential: Credential,
    sink: Arc<dyn ObservabilitySink>,
}

impl Transport {
    pub fn new(
        credential: Credential,
        settings: &RemoteSettings,
        sink: Arc<dyn ObservabilitySink>,
    ) -> ClientResult<Self> {
        let base_url = Url::parse(&settings.base_url).map_err(|e| {
            ConfigurationError::Invalid(format!("base_url '{}': {}", settings.base_url, e))
        })?;
        let host = host_header(&base_url).ok_or_else(|| {
            ConfigurationError::Invalid(format!("base_url has no host: {}", settings.base_url))
        })?;

        let http = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| ConfigurationError::Invalid(format!("HTTP client: {}", e)))?;

        Ok(Transport {
            http,
            base_url,
            host,
            credential,
            sink,
        })
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Sends a JSON (or bodyless) request. `Content-Type: application/json`
    /// goes on every call, GETs included.
    ///
    /// The body is serialized once; the signed bytes are the sent bytes.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        query: &QueryParams,
        body: Option<&Value>,
    ) -> ClientResult<Value> {
        let body_text = match body {
            Some(value) => serde_json::to_string(value)
                .map_err(|e| ClientError::InvalidRequest(format!("unserializable body: {}", e)))?,
            None => String::new(),
        };

        let signed = SignedRequest::new(method, path, query, body_text, &self.credential, None);
        let mut request = self
            .http
            .request(reqwest_method(method), self.url_for(&signed));
        let headers = signed.headers(&self.credential, &self.host, Some(CONTENT_TYPE_JSON));
        for (name, value) in headers {
            request = request.header(name, value);
        }
        if body.is_some() {
            request = request.body(signed.body.clone());
        }

        let request_body = body.map(|_| signed.body.clone());
        self.execute(method, path, request, request_body).await
    }

    /// Sends a multipart upload: text `fields` plus one part per file under
    /// `file_field`.
    ///
    /// Every file is checked and read before anything is signed or sent, so a
    /// missing file never produces a partial upload. The signed body is empty.
    pub async fn send_multipart(
        &self,
        path: &str,
        fields: &[(&str, String)],
        file_field: &str,
        files: &[PathBuf],
    ) -> ClientResult<Value> {
        let mut parts = Vec::with_capacity(files.len());
        for file in files {
            if tokio::fs::metadata(file).await.is_err() {
                return Err(ClientError::MissingFile { path: file.clone() });
            }
            let bytes = tokio::fs::read(file).await.map_err(|e| {
                ClientError::InvalidRequest(format!("cannot read {}: {}", file.display(), e))
            })?;
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload".to_string());
            parts.push(reqwest::multipart::Part::bytes(bytes).file_name(name));
        }

        let mut form = reqwest::multipart::Form::new();
        for (name, value) in fields {
            form = form.text(name.to_string(), value.clone());
        }
        for part in parts {
            form = form.part(file_field.to_string(), part);
        }

        let signed = SignedRequest::new(
            Method::Post,
            path,
            &QueryParams::new(),
            String::new(),
            &self.credential,
            None,
        );

        let mut request = self.http.post(self.url_for(&signed)).multipart(form);
        for (name, value) in signed.headers(&self.credential, &self.host, None) {
            request = request.header(name, value);
        }

        self.execute(Method::Post, path, request, None).await
    }

    fn url_for(&self, signed: &SignedRequest) -> String {
        format!(
            "{}{}",
            self.base_url.as_str().trim_end_matches('/'),
            signed.path_with_query()
        )
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        request: reqwest::RequestBuilder,
        request_body: Option<String>,
    ) -> ClientResult<Value> {
        debug!(method = %method, endpoint = %path, "Sending remote request");
        let started = Instant::now();

        let (status, correlation_id, result, excerpt) = match request.send().await {
            Err(e) => {
                let err = ClientError::Transport {
                    endpoint: path.to_string(),
                    status: e.status().map(|s| s.as_u16()),
                    message: describe_reqwest_error(&e),
                    correlation_id: None,
                };
                (None, None, Err(err), None)
            }
            Ok(response) => {
                let status = response.status();
                let correlation_id = correlation_id(response.headers());
                match response.text().await {
                    Ok(text) => {
                        let result = classify(
                            path,
                            status.as_u16(),
                            status.is_success(),
                            &text,
                            correlation_id.clone(),
                        );
                        (
                            Some(status.as_u16()),
                            correlation_id,
                            result,
                            Some(excerpt(&text)),
                        )
                    }
                    Err(e) => {
                        let err = ClientError::Transport {
                            endpoint: path.to_string(),
                            status: Some(status.as_u16()),
                            message: format!("failed to read response body: {}", e),
                            correlation_id: correlation_id.clone(),
                        };
                        (Some(status.as_u16()), correlation_id, Err(err), None)
                    }
                }
            }
        };

        let outcome = match &result {
            Ok(_) => CallOutcome::Success,
            Err(ClientError::RemoteApi { .. }) => CallOutcome::RemoteError,
            Err(_) => CallOutcome::TransportError,
        };

        self.sink
            .record(&CallRecord {
                method: method.as_str().to_string(),
                endpoint: path.to_string(),
                status,
                elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                correlation_id,
                outcome,
                request_body,
                response_excerpt: excerpt,
            })
            .await;

        result
    }
}

// =============================================================================
// Classification
// =============================================================================

/// Turns a received response into a payload or an error.
pub fn classify(
    endpoint: &str,
    status: u16,
    success: bool,
    body: &str,
    correlation_id: Option<String>,
) -> ClientResult<Value> {
    let trimmed = body.trim();

    if success {
        if trimmed.is_empty() {
            return Ok(Value::Null);
        }
        let payload: Value = serde_json::from_str(trimmed).map_err(|_| ClientError::Transport {
            endpoint: endpoint.to_string(),
            status: Some(status),
            message: format!("uninterpretable response: {}", excerpt(trimmed)),
            correlation_id: correlation_id.clone(),
        })?;

        if reports_failure(&payload) {
            return Err(ClientError::RemoteApi {
                endpoint: endpoint.to_string(),
                status,
                code: error_code(&payload),
                message: error_message(&payload)
                    .unwrap_or_else(|| "remote reported failure".to_string()),
            });
        }
        return Ok(payload);
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(payload) => Err(ClientError::RemoteApi {
            endpoint: endpoint.to_string(),
            status,
            code: error_code(&payload),
            message: error_message(&payload).unwrap_or_else(|| format!("HTTP {}", status)),
        }),
        Err(_) => Err(ClientError::Transport {
            endpoint: endpoint.to_string(),
            status: Some(status),
            message: format!("HTTP {}: {}", status, excerpt(trimmed)),
            correlation_id,
        }),
    }
}

/// A 2xx payload that nonetheless describes a failure.
fn reports_failure(payload: &Value) -> bool {
    let status_failed = payload
        .get("status")
        .and_then(Value::as_str)
        .map(|s| s.eq_ignore_ascii_case("fail") || s.eq_ignore_ascii_case("error"))
        .unwrap_or(false);

    let has_error_code = match payload.get("error_code") {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty() && s != "0",
        Some(Value::Number(n)) => n.as_i64() != Some(0),
        Some(_) => true,
    };

    status_failed || has_error_code
}

fn error_code(payload: &Value) -> Option<String> {
    let scalar = |v: &Value| match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    };

    payload
        .get("error_code")
        .and_then(scalar)
        .or_else(|| payload.get("code").and_then(scalar))
        .or_else(|| {
            payload
                .get("error")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
}

fn error_message(payload: &Value) -> Option<String> {
    ["message", "error_msg", "msg"]
        .iter()
        .filter_map(|key| payload.get(*key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn correlation_id(headers: &HeaderMap) -> Option<String> {
    CORRELATION_HEADERS
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok())
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_CHARS).collect()
}

/// `host[:port]` for the Host header; the port only when non-default.
fn host_header(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn describe_reqwest_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("request timed out: {}", err)
    } else if err.is_connect() {
        format!("connection failed: {}", err)
    } else {
        err.to_string()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use ruten_core::signer::{sign, HEADER_AUTHORIZATION, HEADER_KEY, HEADER_TIMESTAMP};
    use serde_json::json;
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn cred() -> Credential {
        Credential::new("identity-key", "signing-secret", "salty").unwrap()
    }

    fn transport(server: &MockServer, sink: Arc<MemorySink>) -> Transport {
        Transport::new(cred(), &RemoteSettings::with_base_url(server.uri()), sink).unwrap()
    }

    #[test]
    fn test_classify_success_and_empty() {
        assert_eq!(
            classify("/x", 200, true, r#"{"status":"success","data":[]}"#, None).unwrap(),
            json!({"status": "success", "data": []})
        );
        assert_eq!(classify("/x", 204, true, "  ", None).unwrap(), Value::Null);
    }

    #[test]
    fn test_classify_2xx_failure_payloads() {
        let err = classify(
            "/x",
            200,
            true,
            r#"{"status":"fail","error_code":"E100","error_msg":"bad item"}"#,
            None,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ClientError::RemoteApi {
                endpoint: "/x".to_string(),
                status: 200,
                code: Some("E100".to_string()),
                message: "bad item".to_string(),
            }
        );

        let err = classify("/x", 200, true, r#"{"error_code": 42, "msg": "nope"}"#, None).unwrap_err();
        assert_eq!(err.remote_code(), Some("42"));

        // A zero error code is not a failure.
        assert!(classify("/x", 200, true, r#"{"error_code": 0, "data": {}}"#, None).is_ok());
    }

    #[test]
    fn test_classify_2xx_non_json_is_transport() {
        let err = classify("/x", 200, true, "<html>ok</html>", None).unwrap_err();
        assert!(err.is_transport());
        assert!(err.to_string().contains("uninterpretable response"));
    }

    #[test]
    fn test_classify_error_status() {
        let err = classify("/x", 401, false, r#"{"error":"INVALID_SIGNATURE","message":"signature mismatch"}"#, None)
            .unwrap_err();
        assert_eq!(err.remote_code(), Some("INVALID_SIGNATURE"));
        assert_eq!(err.status(), Some(401));

        let page = "x".repeat(2000);
        let err = classify("/x", 502, false, &page, Some("cid".to_string())).unwrap_err();
        match err {
            ClientError::Transport {
                status,
                message,
                correlation_id,
                ..
            } => {
                assert_eq!(status, Some(502));
                assert!(message.len() <= BODY_EXCERPT_CHARS + 16);
                assert_eq!(correlation_id.as_deref(), Some("cid"));
            }
            other => panic!("expected transport error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_is_signed_over_path_and_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/product/list"))
            .and(query_param("page", "2"))
            .and(header(HEADER_KEY, "identity-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-request-id", "req-77")
                    .set_body_json(json!({"data": {"products": []}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let sink = Arc::new(MemorySink::new());
        let t = transport(&server, sink.clone());
        let query = QueryParams::new().push("page", 2).push("page_size", 30);
        let payload = t
            .send(Method::Get, "/api/v1/product/list", &query, None)
            .await
            .unwrap();
        assert_eq!(payload["data"]["products"], json!([]));

        let requests = server.received_requests().await.unwrap();
        let req = &requests[0];
        let ts: i64 = req.headers[HEADER_TIMESTAMP].to_str().unwrap().parse().unwrap();
        let expected = sign("/api/v1/product/list", &query, "", &cred(), Some(ts));
        assert_eq!(req.headers[HEADER_AUTHORIZATION].to_str().unwrap(), expected.value);
        assert_eq!(req.headers.get("content-type").unwrap(), "application/json");

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, CallOutcome::Success);
        assert_eq!(records[0].correlation_id.as_deref(), Some("req-77"));
        assert_eq!(records[0].status, Some(200));
    }

    #[tokio::test]
    async fn test_json_body_is_sent_as_signed() {
        let server = MockServer::start().await;
        let body = json!({"item_id": "A1", "stock": 5});
        let sent = serde_json::to_string(&body).unwrap();

        Mock::given(method("PUT"))
            .and(path("/api/v1/product/item/stock"))
            .and(body_string(sent.clone()))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
            .expect(1)
            .mount(&server)
            .await;

        let sink = Arc::new(MemorySink::new());
        let t = transport(&server, sink.clone());
        t.send(Method::Put, "/api/v1/product/item/stock", &QueryParams::new(), Some(&body))
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let ts: i64 = requests[0].headers[HEADER_TIMESTAMP].to_str().unwrap().parse().unwrap();
        let expected = sign("/api/v1/product/item/stock", &QueryParams::new(), &sent, &cred(), Some(ts));
        assert_eq!(
            requests[0].headers[HEADER_AUTHORIZATION].to_str().unwrap(),
            expected.value
        );
        assert_eq!(sink.records()[0].request_body.as_deref(), Some(sent.as_str()));
    }

    #[tokio::test]
    async fn test_remote_rejection_is_recorded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({"error_code": "AUTH_FAILED", "message": "invalid key"})),
            )
            .mount(&server)
            .await;

        let sink = Arc::new(MemorySink::new());
        let t = transport(&server, sink.clone());
        let err = t
            .send(Method::Get, "/api/v1/product/store_class/list", &QueryParams::new(), None)
            .await
            .unwrap_err();

        assert!(err.is_remote());
        assert_eq!(err.remote_code(), Some("AUTH_FAILED"));
        assert_eq!(sink.records()[0].outcome, CallOutcome::RemoteError);
    }

    #[tokio::test]
    async fn test_connection_failure_is_transport() {
        let server = MockServer::start().await;
        let uri = server.uri();
        drop(server);

        let sink = Arc::new(MemorySink::new());
        let t = Transport::new(cred(), &RemoteSettings::with_base_url(uri), sink.clone()).unwrap();
        let err = t
            .send(Method::Get, "/api/v1/product/list", &QueryParams::new(), None)
            .await
            .unwrap_err();

        assert!(err.is_transport());
        assert_eq!(err.status(), None);
        assert_eq!(sink.records()[0].outcome, CallOutcome::TransportError);
    }

    #[tokio::test]
    async fn test_multipart_missing_file_sends_nothing() {
        let server = MockServer::start().await;
        let sink = Arc::new(MemorySink::new());
        let t = transport(&server, sink.clone());

        let present = tempfile::NamedTempFile::new().unwrap();
        let missing = PathBuf::from("/no/such/image.jpg");
        let err = t
            .send_multipart(
                "/api/v1/product/item/image",
                &[("item_id", "A1".to_string())],
                "images",
                &[present.path().to_path_buf(), missing.clone()],
            )
            .await
            .unwrap_err();

        assert_eq!(err, ClientError::MissingFile { path: missing });
        assert!(server.received_requests().await.unwrap().is_empty());
        assert!(sink.records().is_empty());
    }

    #[test]
    fn test_bad_base_url_is_configuration_error() {
        let result = Transport::new(
            cred(),
            &RemoteSettings::with_base_url("not a url"),
            Arc::new(MemorySink::new()),
        );
        assert!(matches!(result, Err(ClientError::Configuration(_))));
    }

    #[test]
    fn test_host_header_keeps_non_default_port() {
        let url = Url::parse("http://127.0.0.1:8081").unwrap();
        assert_eq!(host_header(&url).as_deref(), Some("127.0.0.1:8081"));
        let url = Url::parse("https://partner.ruten.com.tw").unwrap();
        assert_eq!(host_header(&url).as_deref(), Some("partner.ruten.com.tw"));
    }
}
