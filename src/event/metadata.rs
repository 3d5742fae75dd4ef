//! Shared CAEP event metadata: timestamp, initiator, and language-tagged reasons.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Who or what caused the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitiatingEntity {
    /// A human administrator.
    Admin,
    /// The subject themselves.
    User,
    /// An automated policy decision.
    Policy,
    /// The system itself (e.g. token expiry).
    System,
}

/// A mapping from BCP-47 language tag to a human-readable reason string,
/// matching the `reason_admin`/`reason_user` shape used throughout CAEP.
pub type ReasonMap = HashMap<String, String>;

/// Metadata carried by every CAEP event.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EventMetadata {
    /// When the underlying condition occurred (not when the SET was built).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_timestamp: Option<DateTime<Utc>>,

    /// Who/what initiated the event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initiating_entity: Option<InitiatingEntity>,

    /// Reason, admin-facing, keyed by language tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_admin: Option<ReasonMap>,

    /// Reason, user-facing, keyed by language tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_user: Option<ReasonMap>,
}

impl EventMetadata {
    /// Metadata with just a timestamp, defaulted to now.
    #[must_use]
    pub fn now() -> Self {
        Self { event_timestamp: Some(Utc::now()), ..Self::default() }
    }

    /// Attach an initiating entity.
    #[must_use]
    pub fn with_initiating_entity(mut self, entity: InitiatingEntity) -> Self {
        self.initiating_entity = Some(entity);
        self
    }

    /// Attach a single English admin-facing reason.
    #[must_use]
    pub fn with_admin_reason(mut self, reason: impl Into<String>) -> Self {
        let mut map = ReasonMap::new();
        map.insert("en".to_string(), reason.into());
        self.reason_admin = Some(map);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_chain_sets_fields() {
        let meta = EventMetadata::now()
            .with_initiating_entity(InitiatingEntity::Admin)
            .with_admin_reason("compromised credential");

        assert!(meta.event_timestamp.is_some());
        assert_eq!(meta.initiating_entity, Some(InitiatingEntity::Admin));
        assert_eq!(meta.reason_admin.unwrap().get("en").unwrap(), "compromised credential");
    }

    #[test]
    fn default_metadata_round_trips_as_empty_object() {
        let meta = EventMetadata::default();
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json, serde_json::json!({}));
    }
}
