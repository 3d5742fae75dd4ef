//! CAEP/SSF event taxonomy and the process-wide event-type registry.
//!
//! A SET carries exactly one entry in its `events` claim: a mapping from an
//! event-type URI to that event's payload object. [`Event`] is the typed sum
//! over the event payloads this crate knows about; [`EventRegistry`] is the
//! open extension point callers use to teach the parser about additional
//! event types without forking this crate.

pub mod metadata;
pub mod variants;

pub use metadata::{EventMetadata, InitiatingEntity, ReasonMap};
pub use variants::{
    AssuranceLevel, AssuranceLevelChange, ChangeDirection, ComplianceStatus, CredentialChange,
    CredentialChangeType, CredentialType, DeviceComplianceChange, SessionRevoked, StreamEnablement,
    StreamUpdated, TokenClaimsChange, Verification,
};

use crate::error::{CodecError, CodecResult};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

/// Well-known event-type URIs.
pub mod uri {
    /// `session-revoked`.
    pub const SESSION_REVOKED: &str =
        "https://schemas.openid.net/secevent/caep/event-type/session-revoked";
    /// `credential-change`.
    pub const CREDENTIAL_CHANGE: &str =
        "https://schemas.openid.net/secevent/caep/event-type/credential-change";
    /// `assurance-level-change`.
    pub const ASSURANCE_LEVEL_CHANGE: &str =
        "https://schemas.openid.net/secevent/caep/event-type/assurance-level-change";
    /// `device-compliance-change`.
    pub const DEVICE_COMPLIANCE_CHANGE: &str =
        "https://schemas.openid.net/secevent/caep/event-type/device-compliance-change";
    /// `token-claims-change`.
    pub const TOKEN_CLAIMS_CHANGE: &str =
        "https://schemas.openid.net/secevent/caep/event-type/token-claims-change";
    /// `stream-updated`.
    pub const STREAM_UPDATED: &str = "https://schemas.openid.net/secevent/ssf/event-type/stream-updated";
    /// `verification`.
    pub const VERIFICATION: &str = "https://schemas.openid.net/secevent/ssf/event-type/verification";
}

/// An event-type URI. Wraps a plain string so it can be used as a `HashMap`
/// key and compared without allocating a new type for every call site.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventType(pub String);

impl EventType {
    /// Borrow the URI as `&str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EventType {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The typed sum of event payloads this crate ships with. `Unknown` carries
/// any event type registered by a caller via [`EventRegistry`] for which no
/// built-in variant exists, preserving the raw JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// `session-revoked`.
    SessionRevoked(SessionRevoked),
    /// `credential-change`.
    CredentialChange(CredentialChange),
    /// `assurance-level-change`.
    AssuranceLevelChange(AssuranceLevelChange),
    /// `device-compliance-change`.
    DeviceComplianceChange(DeviceComplianceChange),
    /// `token-claims-change`.
    TokenClaimsChange(TokenClaimsChange),
    /// `stream-updated`.
    StreamUpdated(StreamUpdated),
    /// `verification`.
    Verification(Verification),
    /// A caller-registered event type this crate has no typed variant for.
    Unknown(EventType, Value),
}

impl Event {
    /// The event-type URI of this event.
    #[must_use]
    pub fn event_type(&self) -> EventType {
        match self {
            Self::SessionRevoked(_) => EventType::from(uri::SESSION_REVOKED),
            Self::CredentialChange(_) => EventType::from(uri::CREDENTIAL_CHANGE),
            Self::AssuranceLevelChange(_) => EventType::from(uri::ASSURANCE_LEVEL_CHANGE),
            Self::DeviceComplianceChange(_) => EventType::from(uri::DEVICE_COMPLIANCE_CHANGE),
            Self::TokenClaimsChange(_) => EventType::from(uri::TOKEN_CLAIMS_CHANGE),
            Self::StreamUpdated(_) => EventType::from(uri::STREAM_UPDATED),
            Self::Verification(_) => EventType::from(uri::VERIFICATION),
            Self::Unknown(t, _) => t.clone(),
        }
    }

    /// Validate the event's payload-specific invariants (see each variant's
    /// `validate` method for the rule it enforces).
    pub fn validate(&self) -> CodecResult<()> {
        match self {
            Self::SessionRevoked(e) => e.validate(),
            Self::CredentialChange(e) => e.validate(),
            Self::AssuranceLevelChange(e) => e.validate(),
            Self::DeviceComplianceChange(e) => e.validate(),
            Self::TokenClaimsChange(e) => e.validate(),
            Self::StreamUpdated(e) => e.validate(),
            Self::Verification(e) => e.validate(),
            Self::Unknown(..) => Ok(()),
        }
    }

    /// Serialize the payload half of this event (everything that sits under
    /// the event-type-URI key, i.e. not including the key itself).
    pub fn to_payload(&self) -> CodecResult<Value> {
        Ok(match self {
            Self::SessionRevoked(e) => serde_json::to_value(e)?,
            Self::CredentialChange(e) => serde_json::to_value(e)?,
            Self::AssuranceLevelChange(e) => serde_json::to_value(e)?,
            Self::DeviceComplianceChange(e) => serde_json::to_value(e)?,
            Self::TokenClaimsChange(e) => serde_json::to_value(e)?,
            Self::StreamUpdated(e) => serde_json::to_value(e)?,
            Self::Verification(e) => serde_json::to_value(e)?,
            Self::Unknown(_, v) => v.clone(),
        })
    }
}

/// A parser for one event-type's payload. Implemented by the free functions
/// registered for the built-in types, and may be implemented by callers for
/// their own event types.
pub type EventParseFn = fn(&Value) -> CodecResult<Event>;

fn registry() -> &'static RwLock<HashMap<String, EventParseFn>> {
    static REGISTRY: OnceLock<RwLock<HashMap<String, EventParseFn>>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut map = HashMap::new();
        map.insert(uri::SESSION_REVOKED.to_string(), parse_session_revoked as EventParseFn);
        map.insert(uri::CREDENTIAL_CHANGE.to_string(), parse_credential_change as EventParseFn);
        map.insert(
            uri::ASSURANCE_LEVEL_CHANGE.to_string(),
            parse_assurance_level_change as EventParseFn,
        );
        map.insert(
            uri::DEVICE_COMPLIANCE_CHANGE.to_string(),
            parse_device_compliance_change as EventParseFn,
        );
        map.insert(uri::TOKEN_CLAIMS_CHANGE.to_string(), parse_token_claims_change as EventParseFn);
        map.insert(uri::STREAM_UPDATED.to_string(), parse_stream_updated as EventParseFn);
        map.insert(uri::VERIFICATION.to_string(), parse_verification as EventParseFn);
        RwLock::new(map)
    })
}

fn parse_session_revoked(v: &Value) -> CodecResult<Event> {
    Ok(Event::SessionRevoked(serde_json::from_value(v.clone())?))
}
fn parse_credential_change(v: &Value) -> CodecResult<Event> {
    Ok(Event::CredentialChange(serde_json::from_value(v.clone())?))
}
fn parse_assurance_level_change(v: &Value) -> CodecResult<Event> {
    Ok(Event::AssuranceLevelChange(serde_json::from_value(v.clone())?))
}
fn parse_device_compliance_change(v: &Value) -> CodecResult<Event> {
    Ok(Event::DeviceComplianceChange(serde_json::from_value(v.clone())?))
}
fn parse_token_claims_change(v: &Value) -> CodecResult<Event> {
    Ok(Event::TokenClaimsChange(serde_json::from_value(v.clone())?))
}
fn parse_stream_updated(v: &Value) -> CodecResult<Event> {
    Ok(Event::StreamUpdated(serde_json::from_value(v.clone())?))
}
fn parse_verification(v: &Value) -> CodecResult<Event> {
    Ok(Event::Verification(serde_json::from_value(v.clone())?))
}

/// The open extension point for the event-type registry.
///
/// All methods operate on a single process-wide table; there is no per-parser
/// instance state, mirroring the way `inventory`-style registries in this
/// codebase are shared globally rather than threaded through call sites.
pub struct EventRegistry;

impl EventRegistry {
    /// Register a parser for a custom event-type URI. Overwrites any previous
    /// registration for the same URI, including a built-in one.
    pub fn register(event_type: impl Into<String>, parser: EventParseFn) {
        #[allow(clippy::unwrap_used)]
        registry().write().unwrap().insert(event_type.into(), parser);
    }

    /// True if a parser is registered for `event_type`.
    #[must_use]
    pub fn is_registered(event_type: &str) -> bool {
        #[allow(clippy::unwrap_used)]
        registry().read().unwrap().contains_key(event_type)
    }

    /// Parse `payload` as the event type named by `event_type`, falling back
    /// to [`Event::Unknown`] only if the caller registered it that way —
    /// an unrecognized URI is always an error, never silently accepted.
    pub fn parse(event_type: &str, payload: &Value) -> CodecResult<Event> {
        #[allow(clippy::unwrap_used)]
        let parser = registry()
            .read()
            .unwrap()
            .get(event_type)
            .copied()
            .ok_or_else(|| CodecError::InvalidEventType(event_type.to_string()))?;
        let event = parser(payload)?;
        event.validate()?;
        Ok(event)
    }
}
