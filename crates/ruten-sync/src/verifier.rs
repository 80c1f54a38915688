//! # Credential Verifier
//!
//! Checks a credential triple with one cheap read-only call (the category
//! list). Each verification builds its own client, so checking alternate
//! credentials never disturbs the default client or the environment.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::client::RutenClient;
use crate::config::RemoteSettings;
use crate::sink::ObservabilitySink;
use ruten_core::{ConfigurationError, Credential};

/// Result of a verification call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verification {
    pub valid: bool,
    pub message: String,
}

impl Verification {
    fn accepted() -> Self {
        Verification {
            valid: true,
            message: "Credentials are valid".to_string(),
        }
    }

    fn rejected(message: impl Into<String>) -> Self {
        Verification {
            valid: false,
            message: message.into(),
        }
    }
}

/// State of the default credential, as reported to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialStatus {
    pub has_credentials: bool,
    pub credentials_valid: bool,
    pub message: String,
    /// First eight characters of the identity key.
    pub api_key_preview: Option<String>,
}

/// Verifies `credential` against the marketplace.
///
/// A credential with a missing component never gets here: it fails at
/// [`Credential::new`].
pub async fn verify(
    credential: Credential,
    settings: &RemoteSettings,
    sink: Arc<dyn ObservabilitySink>,
) -> Verification {
    match RutenClient::new(credential, settings, sink) {
        Ok(client) => verify_with(&client).await,
        Err(e) => Verification::rejected(e.to_string()),
    }
}

/// Verifies the credential an existing client was built with.
pub async fn verify_with(client: &RutenClient) -> Verification {
    let preview = client.credential().api_key_preview();
    match client.list_categories().await {
        Ok(_) => {
            info!(api_key = %preview, "Credential accepted");
            Verification::accepted()
        }
        Err(e) => {
            info!(api_key = %preview, error = %e, "Credential rejected");
            Verification::rejected(e.to_string())
        }
    }
}

/// Reports whether a default credential exists and whether it is accepted.
pub async fn credential_status(
    client: Result<&RutenClient, &ConfigurationError>,
) -> CredentialStatus {
    match client {
        Err(missing) => CredentialStatus {
            has_credentials: false,
            credentials_valid: false,
            message: missing.to_string(),
            api_key_preview: None,
        },
        Ok(client) => {
            let verification = verify_with(client).await;
            CredentialStatus {
                has_credentials: true,
                credentials_valid: verification.valid,
                message: verification.message,
                api_key_preview: Some(client.credential().api_key_preview()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/product/store_class/list"))
            .and(header("X-RT-Key", "good-key-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"categories": []}})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/product/store_class/list"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({"error_code": "AUTH_FAILED", "message": "unknown key"})),
            )
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_accepted_and_rejected() {
        let server = server().await;
        let settings = RemoteSettings::with_base_url(server.uri());

        let good = Credential::new("good-key-123", "s", "salt").unwrap();
        let result = verify(good, &settings, Arc::new(MemorySink::new())).await;
        assert!(result.valid);

        let bad = Credential::new("other-key", "s", "salt").unwrap();
        let result = verify(bad, &settings, Arc::new(MemorySink::new())).await;
        assert!(!result.valid);
        assert!(result.message.contains("unknown key"));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_invalid() {
        let server = MockServer::start().await;
        let settings = RemoteSettings::with_base_url(server.uri());
        drop(server);

        let cred = Credential::new("good-key-123", "s", "salt").unwrap();
        let result = verify(cred, &settings, Arc::new(MemorySink::new())).await;
        assert!(!result.valid);
        assert!(!result.message.is_empty());
    }

    #[test]
    fn test_incomplete_credential_fails_at_construction() {
        assert!(Credential::new("key", "secret", "  ").is_err());
    }

    #[tokio::test]
    async fn test_status_reports_preview() {
        let server = server().await;
        let client = RutenClient::new(
            Credential::new("good-key-123", "s", "salt").unwrap(),
            &RemoteSettings::with_base_url(server.uri()),
            Arc::new(MemorySink::new()),
        )
        .unwrap();

        let status = credential_status(Ok(&client)).await;
        assert!(status.has_credentials);
        assert!(status.credentials_valid);
        assert_eq!(status.api_key_preview.as_deref(), Some("good-key..."));

        let missing = ConfigurationError::MissingCredential("RUTEN_API_KEY");
        let status = credential_status(Err(&missing)).await;
        assert!(!status.has_credentials);
        assert!(status.message.contains("RUTEN_API_KEY"));
    }
}
