//! Error types for the codec and receiver halves of the crate.
//!
//! Two closed taxonomies are kept deliberately separate: [`CodecError`] covers
//! everything about building, parsing and validating a SET in isolation;
//! [`ReceiverError`] covers the SSF transmitter/stream protocol, and wraps
//! [`CodecError`] whenever a receiver operation has to decode a SET or a JSON
//! body.

use thiserror::Error;

/// Errors produced while building, parsing or validating a SET, event, or
/// subject identifier.
#[derive(Error, Debug)]
pub enum CodecError {
    /// The compact JWS string did not have the expected `header.payload.signature` shape.
    #[error("invalid SET format: {0}")]
    InvalidFormat(String),

    /// A required field was absent.
    #[error("missing field `{field}`")]
    MissingField {
        /// Dotted path of the missing field, e.g. `events.credential-change.x509_issuer`.
        field: String,
    },

    /// A required field was present but carried no usable value (e.g. an
    /// empty string where one is required). Distinct from [`Self::MissingField`],
    /// which is for a field absent altogether.
    #[error("missing value for `{field}`")]
    MissingValue {
        /// Dotted path of the field with no usable value.
        field: String,
    },

    /// A field was present but failed validation.
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue {
        /// Dotted path of the offending field.
        field: String,
        /// Human-readable reason.
        reason: String,
    },

    /// The `events` claim referenced an event-type URI with no registered parser.
    #[error("unrecognized event type: {0}")]
    InvalidEventType(String),

    /// Signing failed.
    #[error("signing failed: {0}")]
    SigningFailed(String),

    /// Signature verification failed (bad signature, wrong key, or unsupported algorithm).
    #[error("signature verification failed: {0}")]
    VerificationFailed(String),

    /// The token could not be parsed: a malformed segment, or a signature
    /// that does not verify against the resolved key.
    #[error("parse error: {0}")]
    ParseError(String),

    /// No key source was configured for a verifying parse.
    #[error("no verification key configured")]
    NoKeyConfigured,

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Base64 decoding of a JWS segment failed.
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl CodecError {
    /// Build a [`CodecError::MissingField`].
    #[must_use]
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField { field: field.into() }
    }

    /// Build a [`CodecError::MissingValue`].
    #[must_use]
    pub fn missing_value(field: impl Into<String>) -> Self {
        Self::MissingValue { field: field.into() }
    }

    /// Build a [`CodecError::InvalidValue`].
    #[must_use]
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue { field: field.into(), reason: reason.into() }
    }

    /// True if this is an [`CodecError::InvalidEventType`].
    #[must_use]
    pub const fn is_invalid_event_type(&self) -> bool {
        matches!(self, Self::InvalidEventType(_))
    }

    /// True if this represents a signature or key problem rather than a shape problem.
    #[must_use]
    pub const fn is_verification_failure(&self) -> bool {
        matches!(self, Self::VerificationFailed(_) | Self::NoKeyConfigured)
    }

    /// True if this is a [`CodecError::ParseError`].
    #[must_use]
    pub const fn is_parse_error(&self) -> bool {
        matches!(self, Self::ParseError(_))
    }
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors produced by the SSF receiver: metadata discovery, stream lifecycle,
/// and poll/acknowledge.
#[derive(Error, Debug)]
pub enum ReceiverError {
    /// Transmitter metadata failed validation (missing issuer, no delivery methods, etc).
    #[error("invalid transmitter metadata: {0}")]
    InvalidTransmitterMetadata(String),

    /// The stream configuration supplied to the builder was incomplete or contradictory.
    #[error("invalid stream configuration: {0}")]
    InvalidConfiguration(String),

    /// The requested delivery method is not in the transmitter's supported set.
    #[error("delivery method not supported by transmitter")]
    InvalidDeliveryMethod,

    /// An operation referenced a stream id the transmitter does not recognize.
    #[error("stream not found: {0}")]
    StreamNotFound(String),

    /// `check_existing` found more than one candidate stream.
    #[error("multiple streams found while probing for an existing configuration")]
    MultipleStreamsFound,

    /// Setup was asked to create a new stream but one already exists for this
    /// `iss`/`aud` pair and the builder was not configured to attach to it.
    #[error("a stream already exists for this transmitter")]
    StreamAlreadyExists,

    /// Attaching to an existing stream whose delivery method or endpoint disagrees
    /// with what was requested.
    #[error("existing stream configuration conflicts with requested configuration: {0}")]
    ConfigurationMismatch(String),

    /// The authorizer failed to attach credentials, or the transmitter rejected them.
    #[error("authorization failed: {0}")]
    AuthorizationFailed(String),

    /// Poll or Acknowledge was called on a push-delivery stream, or vice versa.
    #[error("operation not supported for this stream's delivery method")]
    OperationNotSupported,

    /// `update_status`/`pause`/`resume`/`disable` used a status the transmitter rejected.
    #[error("invalid stream status: {0}")]
    InvalidStatus(String),

    /// A subject supplied to `add_subject`/`remove_subject` failed validation.
    #[error("invalid subject: {0}")]
    InvalidSubject(String),

    /// `verify` was called with an invalid verification state string.
    #[error("invalid verification state: {0}")]
    InvalidVerificationState(String),

    /// The retry engine exhausted its attempt budget.
    #[error("max retries exceeded after {attempts} attempts")]
    MaxRetriesExceeded {
        /// Total number of HTTP attempts made, including the first.
        attempts: u32,
    },

    /// The transmitter returned an HTTP status this operation did not expect.
    #[error("unexpected HTTP status {status} from {operation}")]
    UnexpectedStatus {
        /// The operation being performed, e.g. `"get_configuration"`.
        operation: &'static str,
        /// The status code returned.
        status: u16,
    },

    /// A SET could not be decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// A request or response body could not be (de)serialized as JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The underlying HTTP transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ReceiverError {
    /// True if this is [`ReceiverError::StreamNotFound`].
    #[must_use]
    pub const fn is_stream_not_found(&self) -> bool {
        matches!(self, Self::StreamNotFound(_))
    }

    /// True if this is [`ReceiverError::MaxRetriesExceeded`].
    #[must_use]
    pub const fn is_max_retries_exceeded(&self) -> bool {
        matches!(self, Self::MaxRetriesExceeded { .. })
    }

    /// True if this is [`ReceiverError::OperationNotSupported`].
    #[must_use]
    pub const fn is_operation_not_supported(&self) -> bool {
        matches!(self, Self::OperationNotSupported)
    }
}

/// Result alias for receiver operations.
pub type ReceiverResult<T> = Result<T, ReceiverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_message() {
        let err = CodecError::missing_field("events.session-revoked");
        assert_eq!(err.to_string(), "missing field `events.session-revoked`");
    }

    #[test]
    fn invalid_event_type_predicate() {
        assert!(CodecError::InvalidEventType("urn:unknown".into()).is_invalid_event_type());
        assert!(!CodecError::NoKeyConfigured.is_invalid_event_type());
    }

    #[test]
    fn receiver_predicates() {
        assert!(ReceiverError::StreamNotFound("s-1".into()).is_stream_not_found());
        assert!(ReceiverError::MaxRetriesExceeded { attempts: 4 }.is_max_retries_exceeded());
        assert!(ReceiverError::OperationNotSupported.is_operation_not_supported());
    }
}
