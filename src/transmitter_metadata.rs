//! Discovery of a transmitter's SSF configuration metadata.

use crate::error::{ReceiverError, ReceiverResult};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use url::Url;

/// Whether a transmitter includes all known subjects in a stream's delivered
/// events by default, or none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DefaultSubjects {
    /// All subjects are included unless explicitly excluded.
    All,
    /// No subjects are included unless explicitly added.
    None,
}

/// A transmitter's well-known SSF configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransmitterMetadata {
    /// Transmitter issuer identifier, matched against a SET's `iss`.
    pub issuer: String,
    /// Endpoint for stream configuration operations.
    pub configuration_endpoint: Url,
    /// Delivery methods the transmitter supports (push and/or poll URNs).
    pub delivery_methods_supported: Vec<String>,
    /// JWKS endpoint for SET signature verification.
    #[serde(default)]
    pub jwks_uri: Option<Url>,
    /// Endpoint for stream status operations.
    #[serde(default)]
    pub status_endpoint: Option<Url>,
    /// Endpoint for adding a subject to a stream.
    #[serde(default)]
    pub add_subject_endpoint: Option<Url>,
    /// Endpoint for removing a subject from a stream.
    #[serde(default)]
    pub remove_subject_endpoint: Option<Url>,
    /// Endpoint for requesting verification events.
    #[serde(default)]
    pub verification_endpoint: Option<Url>,
    /// Subject member names a receiver must not ignore when constructing
    /// `sub_id`.
    #[serde(default)]
    pub critical_subject_members: Option<Vec<String>>,
    /// Authorization schemes the transmitter's endpoints accept.
    #[serde(default)]
    pub authorization_schemes: Option<Vec<String>>,
    /// Default subject inclusion policy for new streams.
    #[serde(default)]
    pub default_subjects: Option<DefaultSubjects>,
}

impl TransmitterMetadata {
    /// Validate required fields.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiverError::InvalidTransmitterMetadata`] if `issuer` is
    /// empty or `delivery_methods_supported` is empty.
    pub fn validate(&self) -> ReceiverResult<()> {
        if self.issuer.trim().is_empty() {
            return Err(ReceiverError::InvalidTransmitterMetadata("issuer is empty".to_string()));
        }
        if self.delivery_methods_supported.is_empty() {
            return Err(ReceiverError::InvalidTransmitterMetadata(
                "delivery_methods_supported is empty".to_string(),
            ));
        }
        Ok(())
    }

    /// True if `method` (a delivery method URN) is supported.
    #[must_use]
    pub fn supports_delivery_method(&self, method: &str) -> bool {
        self.delivery_methods_supported.iter().any(|m| m == method)
    }
}

/// Fetches and validates a transmitter's SSF metadata document.
pub struct MetadataClient {
    http_client: reqwest::Client,
}

impl MetadataClient {
    /// Build a client around `http_client`, or a default client if `None`.
    #[must_use]
    pub fn new(http_client: Option<reqwest::Client>) -> Self {
        Self { http_client: http_client.unwrap_or_default() }
    }

    /// Fetch and validate the transmitter metadata document at `metadata_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiverError::Transport`] on a network failure, or
    /// [`ReceiverError::InvalidTransmitterMetadata`] if the document is
    /// malformed or missing required fields.
    #[instrument(skip(self), fields(%metadata_url))]
    pub async fn discover(&self, metadata_url: &Url) -> ReceiverResult<TransmitterMetadata> {
        let response = self.http_client.get(metadata_url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ReceiverError::InvalidTransmitterMetadata(format!(
                "metadata endpoint returned HTTP {status}"
            )));
        }
        let metadata: TransmitterMetadata = response.json().await.map_err(|e| {
            ReceiverError::InvalidTransmitterMetadata(format!("failed to parse metadata document: {e}"))
        })?;
        metadata.validate()?;
        Ok(metadata)
    }
}

impl Default for MetadataClient {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_metadata(issuer: &str) -> serde_json::Value {
        serde_json::json!({
            "issuer": issuer,
            "configuration_endpoint": "https://transmitter.example/config",
            "delivery_methods_supported": ["urn:ietf:rfc:8936"],
        })
    }

    #[test]
    fn rejects_empty_issuer() {
        let metadata: TransmitterMetadata = serde_json::from_value(sample_metadata("")).unwrap();
        assert!(metadata.validate().is_err());
    }

    #[test]
    fn supports_delivery_method_checks_list() {
        let metadata: TransmitterMetadata =
            serde_json::from_value(sample_metadata("https://transmitter.example")).unwrap();
        assert!(metadata.supports_delivery_method("urn:ietf:rfc:8936"));
        assert!(!metadata.supports_delivery_method("urn:ietf:rfc:8935"));
    }

    #[tokio::test]
    async fn discover_fetches_and_validates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/sse-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_metadata(&server.uri())))
            .mount(&server)
            .await;

        let url: Url = format!("{}/.well-known/sse-configuration", server.uri()).parse().unwrap();
        let client = MetadataClient::default();
        let metadata = client.discover(&url).await.unwrap();
        assert_eq!(metadata.issuer, server.uri());
    }

    #[tokio::test]
    async fn discover_surfaces_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/sse-configuration"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let url: Url = format!("{}/.well-known/sse-configuration", server.uri()).parse().unwrap();
        let client = MetadataClient::default();
        assert!(client.discover(&url).await.is_err());
    }
}
