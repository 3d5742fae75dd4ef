//! Stream lifecycle: creation/attachment, configuration, and delivery.

pub mod builder;
pub mod ops;

pub use builder::{SetupContext, StreamBuilder};
pub use ops::{PollResult, Stream};

use crate::error::{ReceiverError, ReceiverResult};
use crate::set::Audience;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;

/// SSF delivery method URNs (RFC 8935/8936).
pub const PUSH_METHOD_URN: &str = "urn:ietf:rfc:8935";

/// SSF delivery method URN for poll delivery.
pub const POLL_METHOD_URN: &str = "urn:ietf:rfc:8936";

/// An SSF stream's delivery method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMethod {
    /// The transmitter pushes SETs to a receiver-hosted endpoint.
    Push,
    /// The receiver polls the transmitter for SETs.
    Poll,
}

impl DeliveryMethod {
    /// The wire URN for this method.
    #[must_use]
    pub const fn urn(self) -> &'static str {
        match self {
            Self::Push => PUSH_METHOD_URN,
            Self::Poll => POLL_METHOD_URN,
        }
    }
}

/// How SETs are delivered for a stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Delivery {
    /// Delivery method URN.
    pub method: String,
    /// Push-delivery target; absent/ignored for poll streams.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<Url>,
}

impl Delivery {
    /// True if `method` names push delivery.
    #[must_use]
    pub fn is_push(&self) -> bool {
        self.method == PUSH_METHOD_URN
    }

    /// True if `method` names poll delivery.
    #[must_use]
    pub fn is_poll(&self) -> bool {
        self.method == POLL_METHOD_URN
    }
}

/// A transmitter's current configuration for one stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamConfiguration {
    /// Transmitter-assigned stream id.
    pub stream_id: String,
    /// Transmitter issuer.
    pub iss: String,
    /// Receiver audience(s).
    pub aud: Audience,
    /// Delivery method and (for push) target.
    pub delivery: Delivery,
    /// Event types the transmitter is capable of sending.
    #[serde(default)]
    pub events_supported: Vec<String>,
    /// Event types the receiver asked to receive.
    pub events_requested: Vec<String>,
    /// Event types the transmitter agreed to send. Must be non-empty.
    #[serde(default)]
    pub events_delivered: Vec<String>,
    /// Minimum seconds between verification requests, if the transmitter enforces one.
    #[serde(default)]
    pub min_verification_interval: Option<i64>,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
}

impl StreamConfiguration {
    /// Validate required invariants: non-empty `stream_id`/`iss`, and a
    /// non-empty `events_delivered`.
    pub fn validate(&self) -> ReceiverResult<()> {
        if self.stream_id.trim().is_empty() {
            return Err(ReceiverError::InvalidConfiguration("stream_id is empty".to_string()));
        }
        if self.iss.trim().is_empty() {
            return Err(ReceiverError::InvalidConfiguration("iss is empty".to_string()));
        }
        if self.events_delivered.is_empty() {
            return Err(ReceiverError::InvalidConfiguration("events_delivered is empty".to_string()));
        }
        Ok(())
    }
}

/// A stream's enablement state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    /// Events are being delivered.
    Enabled,
    /// Delivery is temporarily suspended.
    Paused,
    /// The stream is permanently inactive.
    Disabled,
}

/// A stream's reported status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamStatus {
    /// The stream this status describes.
    pub stream_id: String,
    /// Current enablement state.
    pub status: StreamState,
    /// Optional human-readable reason for the current state.
    #[serde(default)]
    pub reason: Option<String>,
}

/// A named per-endpoint set of additional HTTP headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Transmitter metadata discovery.
    Metadata,
    /// Stream configuration create/read/update/delete.
    Configuration,
    /// Stream status read/update.
    Status,
    /// Subject addition.
    AddSubject,
    /// Subject removal.
    RemoveSubject,
    /// Verification request.
    Verification,
    /// Poll/acknowledge delivery.
    Poll,
}

/// Per-endpoint extra HTTP headers, keyed by [`Endpoint`].
pub type EndpointHeaders = HashMap<Endpoint, Vec<(String, String)>>;
