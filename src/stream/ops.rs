//! Per-stream operations: configuration, status, subjects, poll/acknowledge.

use crate::authorizer::Authorizer;
use crate::error::{ReceiverError, ReceiverResult};
use crate::retry::RetryEngine;
use crate::set::Audience;
use crate::stream::{Endpoint, EndpointHeaders, StreamConfiguration, StreamState, StreamStatus};
use crate::subject::Subject;
use crate::transmitter_metadata::TransmitterMetadata;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::instrument;
use url::Url;

/// Result of a [`Stream::poll`] call.
#[derive(Debug, Clone, Default)]
pub struct PollResult {
    /// Delivered SETs, keyed by `jti`.
    pub sets: HashMap<String, String>,
    /// Set if `auto_ack` was requested and the acknowledgment itself failed;
    /// the delivered SETs above are still returned (at-least-once delivery).
    pub ack_error: Option<ReceiverError>,
}

#[derive(Serialize)]
struct PollRequest<'a> {
    stream_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_events: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ack: Option<&'a [String]>,
    #[serde(rename = "returnImmediately")]
    return_immediately: bool,
}

#[derive(Deserialize)]
struct PollResponseBody {
    #[serde(default)]
    sets: HashMap<String, String>,
}

#[derive(Serialize)]
struct AckRequest<'a> {
    stream_id: &'a str,
    ack: &'a [String],
    #[serde(rename = "returnImmediately")]
    return_immediately: bool,
}

#[derive(Serialize)]
struct AddSubjectRequest<'a> {
    stream_id: &'a str,
    subject: &'a Subject,
    #[serde(skip_serializing_if = "Option::is_none")]
    verified: Option<bool>,
}

#[derive(Serialize)]
struct RemoveSubjectRequest<'a> {
    stream_id: &'a str,
    subject: &'a Subject,
}

#[derive(Serialize)]
struct UpdateStatusRequest<'a> {
    stream_id: &'a str,
    status: StreamState,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    stream_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a str>,
}

/// A live handle to a transmitter-hosted stream, created or attached via
/// [`crate::stream::StreamBuilder::setup`].
pub struct Stream {
    config: RwLock<StreamConfiguration>,
    metadata: TransmitterMetadata,
    http_client: reqwest::Client,
    authorizer: Arc<dyn Authorizer>,
    retry: RetryEngine,
    endpoint_headers: EndpointHeaders,
}

impl Stream {
    /// Builds a handle directly from an already-known configuration. Most
    /// callers should go through [`crate::stream::StreamBuilder::setup`]
    /// instead, which discovers and reconciles that configuration first.
    #[must_use]
    pub fn new(
        config: StreamConfiguration,
        metadata: TransmitterMetadata,
        http_client: reqwest::Client,
        authorizer: Arc<dyn Authorizer>,
        retry: RetryEngine,
        endpoint_headers: EndpointHeaders,
    ) -> Self {
        Self { config: RwLock::new(config), metadata, http_client, authorizer, retry, endpoint_headers }
    }

    /// The transmitter-assigned stream id.
    pub async fn stream_id(&self) -> String {
        self.config.read().await.stream_id.clone()
    }

    /// A snapshot of the locally cached configuration.
    pub async fn configuration(&self) -> StreamConfiguration {
        self.config.read().await.clone()
    }

    async fn send_json(
        &self,
        endpoint: Endpoint,
        method: reqwest::Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> ReceiverResult<reqwest::Response> {
        let headers = self.endpoint_headers.get(&endpoint).cloned().unwrap_or_default();
        let authorizer = Arc::clone(&self.authorizer);
        let client = self.http_client.clone();
        self.retry
            .execute_result(|| {
                let mut builder = client.request(method.clone(), url.clone());
                for (name, value) in &headers {
                    builder = builder.header(name, value);
                }
                if let Some(ref b) = body {
                    builder = builder.json(b);
                }
                let authorizer = Arc::clone(&authorizer);
                async move {
                    let builder =
                        authorizer.add_auth(builder).await.map_err(ReceiverError::AuthorizationFailed)?;
                    builder.send().await.map_err(ReceiverError::Transport)
                }
            })
            .await
    }

    /// `GET configuration_endpoint?stream_id=...`.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiverError::UnexpectedStatus`] on a non-200 response.
    #[instrument(skip(self))]
    pub async fn get_configuration(&self) -> ReceiverResult<StreamConfiguration> {
        let stream_id = self.stream_id().await;
        let mut url = self.metadata.configuration_endpoint.clone();
        url.query_pairs_mut().append_pair("stream_id", &stream_id);
        let response = self.send_json(Endpoint::Configuration, reqwest::Method::GET, url, None).await?;
        expect_status(&response, 200, "get_configuration")?;
        Ok(response.json().await?)
    }

    /// `PUT configuration_endpoint`; on success, replaces the locally cached
    /// configuration with the transmitter's response.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiverError::UnexpectedStatus`] on a non-200 response.
    #[instrument(skip(self, new_config))]
    pub async fn update_configuration(&self, new_config: &StreamConfiguration) -> ReceiverResult<StreamConfiguration> {
        let url = self.metadata.configuration_endpoint.clone();
        let body = serde_json::to_value(new_config)?;
        let response =
            self.send_json(Endpoint::Configuration, reqwest::Method::PUT, url, Some(body)).await?;
        expect_status(&response, 200, "update_configuration")?;
        let updated: StreamConfiguration = response.json().await?;
        *self.config.write().await = updated.clone();
        Ok(updated)
    }

    /// `GET status_endpoint?stream_id=...`.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiverError::InvalidStatus`] if the returned `stream_id`
    /// does not match the local one, or [`ReceiverError::UnexpectedStatus`]
    /// on a non-200 response.
    #[instrument(skip(self))]
    pub async fn get_status(&self) -> ReceiverResult<StreamStatus> {
        let Some(status_endpoint) = self.metadata.status_endpoint.clone() else {
            return Err(ReceiverError::OperationNotSupported);
        };
        let stream_id = self.stream_id().await;
        let mut url = status_endpoint;
        url.query_pairs_mut().append_pair("stream_id", &stream_id);
        let response = self.send_json(Endpoint::Status, reqwest::Method::GET, url, None).await?;
        expect_status(&response, 200, "get_status")?;
        let status: StreamStatus = response.json().await?;
        if status.stream_id != stream_id {
            return Err(ReceiverError::InvalidStatus(format!(
                "transmitter returned status for stream `{}`, expected `{stream_id}`",
                status.stream_id
            )));
        }
        Ok(status)
    }

    /// `POST status_endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiverError::UnexpectedStatus`] on a non-200 response.
    #[instrument(skip(self))]
    pub async fn update_status(&self, status: StreamState, reason: Option<&str>) -> ReceiverResult<()> {
        let Some(status_endpoint) = self.metadata.status_endpoint.clone() else {
            return Err(ReceiverError::OperationNotSupported);
        };
        let stream_id = self.stream_id().await;
        let body = serde_json::to_value(UpdateStatusRequest { stream_id: &stream_id, status, reason })?;
        let response =
            self.send_json(Endpoint::Status, reqwest::Method::POST, status_endpoint, Some(body)).await?;
        expect_status(&response, 200, "update_status")?;
        Ok(())
    }

    /// Sugar for `update_status(Enabled, None)`.
    pub async fn resume(&self) -> ReceiverResult<()> {
        self.update_status(StreamState::Enabled, None).await
    }

    /// Sugar for `update_status(Paused, reason)`.
    pub async fn pause(&self, reason: Option<&str>) -> ReceiverResult<()> {
        self.update_status(StreamState::Paused, reason).await
    }

    /// Sugar for `update_status(Disabled, reason)`.
    pub async fn disable(&self, reason: Option<&str>) -> ReceiverResult<()> {
        self.update_status(StreamState::Disabled, reason).await
    }

    /// `POST add_subject_endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiverError::OperationNotSupported`] if the transmitter
    /// does not advertise this endpoint, [`ReceiverError::InvalidSubject`] if
    /// `subject` fails validation, or [`ReceiverError::UnexpectedStatus`] on a
    /// non-200 response.
    #[instrument(skip(self, subject))]
    pub async fn add_subject(&self, subject: &Subject, verified: Option<bool>) -> ReceiverResult<()> {
        subject.validate().map_err(|e| ReceiverError::InvalidSubject(e.to_string()))?;
        let Some(endpoint) = self.metadata.add_subject_endpoint.clone() else {
            return Err(ReceiverError::OperationNotSupported);
        };
        let stream_id = self.stream_id().await;
        let body = serde_json::to_value(AddSubjectRequest { stream_id: &stream_id, subject, verified })?;
        let response = self.send_json(Endpoint::AddSubject, reqwest::Method::POST, endpoint, Some(body)).await?;
        expect_status(&response, 200, "add_subject")?;
        Ok(())
    }

    /// `POST remove_subject_endpoint`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Stream::add_subject`].
    #[instrument(skip(self, subject))]
    pub async fn remove_subject(&self, subject: &Subject) -> ReceiverResult<()> {
        subject.validate().map_err(|e| ReceiverError::InvalidSubject(e.to_string()))?;
        let Some(endpoint) = self.metadata.remove_subject_endpoint.clone() else {
            return Err(ReceiverError::OperationNotSupported);
        };
        let stream_id = self.stream_id().await;
        let body = serde_json::to_value(RemoveSubjectRequest { stream_id: &stream_id, subject })?;
        let response =
            self.send_json(Endpoint::RemoveSubject, reqwest::Method::POST, endpoint, Some(body)).await?;
        expect_status(&response, 200, "remove_subject")?;
        Ok(())
    }

    /// `POST verification_endpoint`, causing the transmitter to emit a
    /// verification event on this stream's delivery channel.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiverError::OperationNotSupported`] if the transmitter
    /// does not advertise this endpoint, or [`ReceiverError::UnexpectedStatus`]
    /// on a non-200 response.
    #[instrument(skip(self))]
    pub async fn verify(&self, state: Option<&str>) -> ReceiverResult<()> {
        let Some(endpoint) = self.metadata.verification_endpoint.clone() else {
            return Err(ReceiverError::OperationNotSupported);
        };
        let stream_id = self.stream_id().await;
        let body = serde_json::to_value(VerifyRequest { stream_id: &stream_id, state })?;
        let response = self.send_json(Endpoint::Verification, reqwest::Method::POST, endpoint, Some(body)).await?;
        expect_status(&response, 200, "verify")?;
        Ok(())
    }

    /// `DELETE configuration_endpoint?stream_id=...`; terminates the stream.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiverError::UnexpectedStatus`] on a non-204 response.
    #[instrument(skip(self))]
    pub async fn delete(&self) -> ReceiverResult<()> {
        let stream_id = self.stream_id().await;
        let mut url = self.metadata.configuration_endpoint.clone();
        url.query_pairs_mut().append_pair("stream_id", &stream_id);
        let response = self.send_json(Endpoint::Configuration, reqwest::Method::DELETE, url, None).await?;
        expect_status(&response, 204, "delete")?;
        Ok(())
    }

    fn require_poll_delivery(&self, config: &StreamConfiguration) -> ReceiverResult<()> {
        if config.delivery.is_poll() {
            Ok(())
        } else {
            Err(ReceiverError::OperationNotSupported)
        }
    }

    /// `POST delivery.endpoint_url` for a poll-delivery stream.
    ///
    /// If `auto_ack` is set and events are returned, immediately issues
    /// [`Stream::acknowledge`] for every returned `jti`. A failed
    /// acknowledgment is reported via [`PollResult::ack_error`] rather than
    /// discarding the already-received events (at-least-once semantics).
    ///
    /// # Errors
    ///
    /// Returns [`ReceiverError::OperationNotSupported`] if this stream uses
    /// push delivery, or [`ReceiverError::UnexpectedStatus`] on a non-200
    /// response.
    #[instrument(skip(self))]
    pub async fn poll(
        &self,
        max_events: Option<u32>,
        ack_jtis: Option<&[String]>,
        auto_ack: bool,
    ) -> ReceiverResult<PollResult> {
        let config = self.configuration().await;
        self.require_poll_delivery(&config)?;
        let Some(endpoint) = config.delivery.endpoint_url.clone() else {
            return Err(ReceiverError::OperationNotSupported);
        };
        let stream_id = config.stream_id.clone();
        let body = serde_json::to_value(PollRequest {
            stream_id: &stream_id,
            max_events,
            ack: ack_jtis,
            return_immediately: true,
        })?;
        let response = self.send_json(Endpoint::Poll, reqwest::Method::POST, endpoint, Some(body)).await?;
        expect_status(&response, 200, "poll")?;
        let parsed: PollResponseBody = response.json().await?;

        let mut result = PollResult { sets: parsed.sets, ack_error: None };
        if auto_ack && !result.sets.is_empty() {
            let jtis: Vec<String> = result.sets.keys().cloned().collect();
            if let Err(e) = self.acknowledge(&jtis).await {
                result.ack_error = Some(e);
            }
        }
        Ok(result)
    }

    /// `POST delivery.endpoint_url` with `ack: jtis` for a poll-delivery stream.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiverError::OperationNotSupported`] if this stream uses
    /// push delivery, or [`ReceiverError::UnexpectedStatus`] on a non-200
    /// response.
    #[instrument(skip(self, jtis))]
    pub async fn acknowledge(&self, jtis: &[String]) -> ReceiverResult<()> {
        let config = self.configuration().await;
        self.require_poll_delivery(&config)?;
        let Some(endpoint) = config.delivery.endpoint_url.clone() else {
            return Err(ReceiverError::OperationNotSupported);
        };
        let body = serde_json::to_value(AckRequest {
            stream_id: &config.stream_id,
            ack: jtis,
            return_immediately: true,
        })?;
        let response = self.send_json(Endpoint::Poll, reqwest::Method::POST, endpoint, Some(body)).await?;
        expect_status(&response, 200, "acknowledge")?;
        Ok(())
    }
}

fn expect_status(response: &reqwest::Response, expected: u16, operation: &'static str) -> ReceiverResult<()> {
    if response.status().as_u16() == expected {
        Ok(())
    } else {
        Err(ReceiverError::UnexpectedStatus { operation, status: response.status().as_u16() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorizer::StaticBearerAuthorizer;
    use crate::retry::RetryConfig;
    use crate::stream::{Delivery, POLL_METHOD_URN, PUSH_METHOD_URN};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_metadata(server: &MockServer) -> TransmitterMetadata {
        TransmitterMetadata {
            issuer: server.uri(),
            configuration_endpoint: format!("{}/config", server.uri()).parse().unwrap(),
            delivery_methods_supported: vec![POLL_METHOD_URN.to_string()],
            jwks_uri: None,
            status_endpoint: Some(format!("{}/status", server.uri()).parse().unwrap()),
            add_subject_endpoint: None,
            remove_subject_endpoint: None,
            verification_endpoint: None,
            critical_subject_members: None,
            authorization_schemes: None,
            default_subjects: None,
        }
    }

    fn sample_config(server: &MockServer) -> StreamConfiguration {
        StreamConfiguration {
            stream_id: "s-1".to_string(),
            iss: server.uri(),
            aud: Audience::from("https://receiver.example"),
            delivery: Delivery { method: POLL_METHOD_URN.to_string(), endpoint_url: Some(format!("{}/poll", server.uri()).parse().unwrap()) },
            events_supported: vec![],
            events_requested: vec![],
            events_delivered: vec!["urn:ietf:params:SSF:event-type:caep:session-revoked".to_string()],
            min_verification_interval: None,
            description: None,
        }
    }

    fn stream(server: &MockServer) -> Stream {
        Stream::new(
            sample_config(server),
            sample_metadata(server),
            reqwest::Client::new(),
            Arc::new(StaticBearerAuthorizer::new("token")),
            RetryEngine::new(RetryConfig::default().with_max_retries(0)),
            HashMap::new(),
        )
    }

    #[tokio::test]
    async fn poll_on_push_stream_is_not_supported() {
        let server = MockServer::start().await;
        let mut config = sample_config(&server);
        config.delivery = Delivery { method: PUSH_METHOD_URN.to_string(), endpoint_url: Some("https://push.example".parse().unwrap()) };
        let s = Stream::new(
            config,
            sample_metadata(&server),
            reqwest::Client::new(),
            Arc::new(StaticBearerAuthorizer::new("token")),
            RetryEngine::with_defaults(),
            HashMap::new(),
        );
        let result = s.poll(None, None, false).await;
        assert!(matches!(result, Err(ReceiverError::OperationNotSupported)));
    }

    #[tokio::test]
    async fn poll_returns_delivered_sets() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/poll"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sets": {"jti-1": "header.payload.sig"}
            })))
            .mount(&server)
            .await;

        let s = stream(&server);
        let result = s.poll(Some(10), None, false).await.unwrap();
        assert_eq!(result.sets.get("jti-1").unwrap(), "header.payload.sig");
        assert!(result.ack_error.is_none());
    }

    #[tokio::test]
    async fn poll_auto_acks_when_events_returned() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/poll"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sets": {"jti-1": "header.payload.sig"}
            })))
            .mount(&server)
            .await;

        let s = stream(&server);
        let result = s.poll(None, None, true).await.unwrap();
        assert_eq!(result.sets.len(), 1);
        assert!(result.ack_error.is_none());
    }

    #[tokio::test]
    async fn get_status_rejects_mismatched_stream_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "stream_id": "wrong-id",
                "status": "enabled"
            })))
            .mount(&server)
            .await;

        let s = stream(&server);
        let result = s.get_status().await;
        assert!(matches!(result, Err(ReceiverError::InvalidStatus(_))));
    }

    #[tokio::test]
    async fn update_configuration_replaces_local_config() {
        let server = MockServer::start().await;
        let mut updated = sample_config(&server);
        updated.description = Some("new description".to_string());
        Mock::given(method("PUT"))
            .and(path("/config"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&updated))
            .mount(&server)
            .await;

        let s = stream(&server);
        let result = s.update_configuration(&sample_config(&server)).await.unwrap();
        assert_eq!(result.description.as_deref(), Some("new description"));
        assert_eq!(s.configuration().await.description.as_deref(), Some("new description"));
    }

    #[tokio::test]
    async fn delete_requires_204() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/config"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let s = stream(&server);
        assert!(s.delete().await.is_ok());
    }
}
