//! Creating or attaching to a transmitter-hosted stream.

use crate::authorizer::Authorizer;
use crate::error::{ReceiverError, ReceiverResult};
use crate::retry::{RetryConfig, RetryEngine};
use crate::set::Audience;
use crate::stream::ops::Stream;
use crate::stream::{Delivery, Endpoint, EndpointHeaders, StreamConfiguration};
use crate::transmitter_metadata::MetadataClient;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{instrument, warn};
use url::Url;

/// The transmitter endpoint and audience a [`StreamBuilder`] should target.
pub struct SetupContext {
    /// URL of the transmitter's `.well-known` SSF configuration document.
    pub metadata_url: Url,
    /// Receiver audience to request (becomes `aud` on the created/attached stream).
    pub audience: String,
}

/// Builds (or attaches to) a single SSF stream.
pub struct StreamBuilder {
    delivery_method: Option<DeliveryChoice>,
    event_types: Vec<String>,
    description: Option<String>,
    authorizer: Option<Arc<dyn Authorizer>>,
    retry_config: RetryConfig,
    check_existing: bool,
    http_client: Option<reqwest::Client>,
    endpoint_headers: EndpointHeaders,
}

enum DeliveryChoice {
    Push(Url),
    Poll,
}

impl Default for StreamBuilder {
    fn default() -> Self {
        Self {
            delivery_method: None,
            event_types: Vec::new(),
            description: None,
            authorizer: None,
            retry_config: RetryConfig::default(),
            check_existing: false,
            http_client: None,
            endpoint_headers: HashMap::new(),
        }
    }
}

impl StreamBuilder {
    /// Start a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request poll delivery.
    #[must_use]
    pub fn poll_delivery(mut self) -> Self {
        self.delivery_method = Some(DeliveryChoice::Poll);
        self
    }

    /// Request push delivery to `endpoint`.
    #[must_use]
    pub fn push_delivery(mut self, endpoint: Url) -> Self {
        self.delivery_method = Some(DeliveryChoice::Push(endpoint));
        self
    }

    /// Set the requested event types. Required, non-empty.
    #[must_use]
    pub fn event_types(mut self, event_types: Vec<String>) -> Self {
        self.event_types = event_types;
        self
    }

    /// Set a free-form description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the credential provider. Required.
    #[must_use]
    pub fn authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = Some(authorizer);
        self
    }

    /// Override the default retry policy.
    #[must_use]
    pub fn retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    /// If set, probe the configuration endpoint for an existing stream and
    /// attach to it instead of creating a new one.
    #[must_use]
    pub fn check_existing(mut self, check_existing: bool) -> Self {
        self.check_existing = check_existing;
        self
    }

    /// Override the transport.
    #[must_use]
    pub fn http_client(mut self, http_client: reqwest::Client) -> Self {
        self.http_client = Some(http_client);
        self
    }

    /// Add extra HTTP headers sent with requests to `endpoint`.
    #[must_use]
    pub fn endpoint_headers(mut self, endpoint: Endpoint, headers: Vec<(String, String)>) -> Self {
        self.endpoint_headers.insert(endpoint, headers);
        self
    }

    /// Create or attach to a stream against `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiverError::InvalidConfiguration`] if required builder
    /// fields are missing, [`ReceiverError::InvalidDeliveryMethod`] if the
    /// transmitter does not support the requested delivery method,
    /// [`ReceiverError::MultipleStreamsFound`] if `check_existing` finds more
    /// than one candidate, or [`ReceiverError::ConfigurationMismatch`] if an
    /// existing stream's delivery method or push endpoint disagrees with what
    /// was requested.
    #[instrument(skip(self, ctx))]
    pub async fn setup(self, ctx: &SetupContext) -> ReceiverResult<Stream> {
        let authorizer = self.authorizer.clone().ok_or_else(|| {
            ReceiverError::InvalidConfiguration("authorizer is required".to_string())
        })?;
        let delivery_choice = self
            .delivery_method
            .as_ref()
            .ok_or_else(|| ReceiverError::InvalidConfiguration("delivery method is required".to_string()))?;
        if self.event_types.is_empty() || self.event_types.iter().any(|e| e.trim().is_empty()) {
            return Err(ReceiverError::InvalidConfiguration(
                "event_types must be non-empty with no blank entries".to_string(),
            ));
        }

        let http_client = self.http_client.clone().unwrap_or_default();
        let metadata_client = MetadataClient::new(Some(http_client.clone()));
        let metadata = metadata_client.discover(&ctx.metadata_url).await?;

        let method_urn = match delivery_choice {
            DeliveryChoice::Push(_) => crate::stream::PUSH_METHOD_URN,
            DeliveryChoice::Poll => crate::stream::POLL_METHOD_URN,
        };
        if !metadata.supports_delivery_method(method_urn) {
            return Err(ReceiverError::InvalidDeliveryMethod);
        }

        let delivery = Delivery {
            method: method_urn.to_string(),
            endpoint_url: match delivery_choice {
                DeliveryChoice::Push(url) => Some(url.clone()),
                DeliveryChoice::Poll => None,
            },
        };

        let retry = RetryEngine::new(self.retry_config.clone());
        let headers = self.endpoint_headers.get(&Endpoint::Configuration).cloned().unwrap_or_default();

        let config = if self.check_existing {
            match fetch_existing(
                &http_client,
                &authorizer,
                &retry,
                &headers,
                &metadata.configuration_endpoint,
            )
            .await?
            {
                Some(existing) => reconcile(existing, &delivery, &self.event_types, self.description.as_deref())?,
                None => {
                    create(
                        &http_client,
                        &authorizer,
                        &retry,
                        &headers,
                        &metadata.configuration_endpoint,
                        &ctx.audience,
                        &delivery,
                        &self,
                    )
                    .await?
                }
            }
        } else {
            create(
                &http_client,
                &authorizer,
                &retry,
                &headers,
                &metadata.configuration_endpoint,
                &ctx.audience,
                &delivery,
                &self,
            )
            .await?
        };
        config.validate()?;

        Ok(Stream::new(config, metadata, http_client, authorizer, retry, self.endpoint_headers))
    }
}

#[derive(Serialize)]
struct CreateStreamRequest<'a> {
    aud: Audience,
    delivery: &'a Delivery,
    events_requested: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

/// Issues `request` through `authorizer` and `retry`, matching the
/// credential-attachment and retry behavior every [`Stream`] operation uses.
async fn send_authorized(
    http_client: &reqwest::Client,
    authorizer: &Arc<dyn Authorizer>,
    retry: &RetryEngine,
    headers: &[(String, String)],
    method: reqwest::Method,
    url: &Url,
    body: Option<&serde_json::Value>,
) -> ReceiverResult<reqwest::Response> {
    retry
        .execute_result(|| {
            let mut builder = http_client.request(method.clone(), url.clone());
            for (name, value) in headers {
                builder = builder.header(name, value);
            }
            if let Some(b) = body {
                builder = builder.json(b);
            }
            let authorizer = Arc::clone(authorizer);
            async move {
                let builder = authorizer.add_auth(builder).await.map_err(ReceiverError::AuthorizationFailed)?;
                builder.send().await.map_err(ReceiverError::Transport)
            }
        })
        .await
}

#[allow(clippy::too_many_arguments)]
async fn create(
    http_client: &reqwest::Client,
    authorizer: &Arc<dyn Authorizer>,
    retry: &RetryEngine,
    headers: &[(String, String)],
    configuration_endpoint: &Url,
    audience: &str,
    delivery: &Delivery,
    builder: &StreamBuilder,
) -> ReceiverResult<StreamConfiguration> {
    let body = serde_json::to_value(CreateStreamRequest {
        aud: Audience::from(audience),
        delivery,
        events_requested: &builder.event_types,
        description: builder.description.as_deref(),
    })?;
    let response = send_authorized(
        http_client,
        authorizer,
        retry,
        headers,
        reqwest::Method::POST,
        configuration_endpoint,
        Some(&body),
    )
    .await?;
    let status = response.status();
    if status.as_u16() != 201 {
        return Err(ReceiverError::UnexpectedStatus { operation: "create_stream", status: status.as_u16() });
    }
    let config: StreamConfiguration = response.json().await?;
    Ok(config)
}

async fn fetch_existing(
    http_client: &reqwest::Client,
    authorizer: &Arc<dyn Authorizer>,
    retry: &RetryEngine,
    headers: &[(String, String)],
    configuration_endpoint: &Url,
) -> ReceiverResult<Option<StreamConfiguration>> {
    let response = send_authorized(
        http_client,
        authorizer,
        retry,
        headers,
        reqwest::Method::GET,
        configuration_endpoint,
        None,
    )
    .await?;
    if response.status().as_u16() == 404 {
        return Ok(None);
    }
    if !response.status().is_success() {
        return Err(ReceiverError::UnexpectedStatus {
            operation: "check_existing",
            status: response.status().as_u16(),
        });
    }
    let body: serde_json::Value = response.json().await?;
    match body {
        serde_json::Value::Array(items) => match items.len() {
            0 => Ok(None),
            1 => Ok(Some(serde_json::from_value(items.into_iter().next().unwrap_or(serde_json::Value::Null))?)),
            _ => Err(ReceiverError::MultipleStreamsFound),
        },
        serde_json::Value::Null => Ok(None),
        single => Ok(Some(serde_json::from_value(single)?)),
    }
}

fn reconcile(
    existing: StreamConfiguration,
    desired_delivery: &Delivery,
    desired_events: &[String],
    desired_description: Option<&str>,
) -> ReceiverResult<StreamConfiguration> {
    if existing.delivery.method != desired_delivery.method {
        return Err(ReceiverError::ConfigurationMismatch(format!(
            "existing delivery method `{}` does not match requested `{}`",
            existing.delivery.method, desired_delivery.method
        )));
    }
    if desired_delivery.is_push() && existing.delivery.endpoint_url != desired_delivery.endpoint_url {
        return Err(ReceiverError::ConfigurationMismatch(
            "existing push endpoint does not match requested endpoint".to_string(),
        ));
    }
    if existing.events_requested.as_slice() != desired_events {
        warn!(stream_id = %existing.stream_id, "existing stream's events_requested differs from requested");
    }
    if existing.description.as_deref() != desired_description {
        warn!(stream_id = %existing.stream_id, "existing stream's description differs from requested");
    }
    Ok(existing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::StreamState;

    fn sample_config(method: &str) -> StreamConfiguration {
        StreamConfiguration {
            stream_id: "s-1".to_string(),
            iss: "https://issuer.example".to_string(),
            aud: Audience::from("https://receiver.example"),
            delivery: Delivery { method: method.to_string(), endpoint_url: None },
            events_supported: vec![],
            events_requested: vec!["urn:ietf:params:SSF:event-type:caep:session-revoked".to_string()],
            events_delivered: vec!["urn:ietf:params:SSF:event-type:caep:session-revoked".to_string()],
            min_verification_interval: None,
            description: Some("desc".to_string()),
        }
    }

    #[test]
    fn reconcile_accepts_matching_delivery() {
        let existing = sample_config(crate::stream::POLL_METHOD_URN);
        let desired = Delivery { method: crate::stream::POLL_METHOD_URN.to_string(), endpoint_url: None };
        let result = reconcile(existing, &desired, &[], Some("desc"));
        assert!(result.is_ok());
    }

    #[test]
    fn reconcile_rejects_delivery_method_mismatch() {
        let existing = sample_config(crate::stream::POLL_METHOD_URN);
        let desired = Delivery {
            method: crate::stream::PUSH_METHOD_URN.to_string(),
            endpoint_url: Some("https://receiver.example/push".parse().unwrap()),
        };
        assert!(reconcile(existing, &desired, &[], None).is_err());
    }

    #[test]
    fn reconcile_rejects_push_endpoint_mismatch() {
        let mut existing = sample_config(crate::stream::PUSH_METHOD_URN);
        existing.delivery.endpoint_url = Some("https://receiver.example/a".parse().unwrap());
        let desired = Delivery {
            method: crate::stream::PUSH_METHOD_URN.to_string(),
            endpoint_url: Some("https://receiver.example/b".parse().unwrap()),
        };
        assert!(reconcile(existing, &desired, &[], None).is_err());
    }

    #[test]
    fn reconcile_warns_but_succeeds_on_event_list_drift() {
        let existing = sample_config(crate::stream::POLL_METHOD_URN);
        let desired = Delivery { method: crate::stream::POLL_METHOD_URN.to_string(), endpoint_url: None };
        let result = reconcile(existing, &desired, &["urn:other".to_string()], Some("different"));
        assert!(result.is_ok());
    }

    #[test]
    fn stream_state_serializes_snake_case() {
        let json = serde_json::to_value(StreamState::Paused).unwrap();
        assert_eq!(json, "paused");
    }
}
