//! The Security Event Token claims set (RFC 8417 §2) and its canonical
//! single-event encoding.

use crate::error::{CodecError, CodecResult};
use crate::event::{Event, EventRegistry};
use crate::subject::Subject;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// `aud` may be a single string or an array of strings; this normalizes both
/// shapes to a `Vec<String>` on read while still emitting a bare string on
/// write when there is exactly one audience (the more common wire shape).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Audience(pub Vec<String>);

impl Serialize for Audience {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0.as_slice() {
            [single] => serializer.serialize_str(single),
            many => many.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Audience {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            One(String),
            Many(Vec<String>),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::One(s) => Self(vec![s]),
            Raw::Many(v) => Self(v),
        })
    }
}

impl Audience {
    /// True if `expected` is one of the audience values.
    #[must_use]
    pub fn contains(&self, expected: &str) -> bool {
        self.0.iter().any(|a| a == expected)
    }
}

impl From<&str> for Audience {
    fn from(value: &str) -> Self {
        Self(vec![value.to_string()])
    }
}

/// The claims carried by a Security Event Token.
///
/// `events` is kept as the raw `{uri: payload}` map (its wire shape) rather
/// than as a typed [`Event`] so that `Set` can be deserialized before the
/// event registry is consulted; use [`Set::event`] / [`Set::set_event`] to
/// move between the raw map and a typed [`Event`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Set {
    /// Issuer.
    pub iss: String,
    /// Unique token id, used for acknowledgment.
    pub jti: String,
    /// Issued-at, Unix seconds.
    pub iat: i64,
    /// Intended audience(s).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
    /// Expiry, Unix seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// Not-before, Unix seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    /// Transaction id correlating related tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txn: Option<String>,
    /// The subject the event(s) concern.
    pub sub_id: Subject,
    /// `{event-type-uri: payload}`. Exactly one entry in the canonical
    /// single-event encoding this crate produces and expects.
    pub events: HashMap<String, Value>,
}

impl Set {
    /// Validate registered claims and the subject; does **not** validate the
    /// event payload (callers get that via [`Set::event`], which calls
    /// [`Event::validate`] as part of dispatch).
    pub fn validate(&self) -> CodecResult<()> {
        if self.iss.trim().is_empty() {
            return Err(CodecError::missing_field("iss"));
        }
        if self.jti.trim().is_empty() {
            return Err(CodecError::missing_field("jti"));
        }
        if self.events.is_empty() {
            return Err(CodecError::missing_field("events"));
        }
        if self.events.len() > 1 {
            return Err(CodecError::invalid_value("events", "multiple events not supported"));
        }
        self.sub_id.validate()
    }

    /// Decode the single `events` entry as a typed [`Event`] via the event
    /// registry, validating it in the process.
    pub fn event(&self) -> CodecResult<Event> {
        let (event_type, payload) = self
            .events
            .iter()
            .next()
            .ok_or_else(|| CodecError::missing_field("events"))?;
        EventRegistry::parse(event_type, payload)
    }

    /// Decode `events` as a multi-event SET, preserving the escape-hatch
    /// multi-entry encoding some transmitters still emit. Not used by
    /// [`Set::validate`] or the default parser/builder path.
    pub fn events_multi(&self) -> CodecResult<Vec<Event>> {
        self.events.iter().map(|(ty, payload)| EventRegistry::parse(ty, payload)).collect()
    }

    /// Replace `events` with the single-entry encoding of `event`.
    ///
    /// # Errors
    ///
    /// Returns an error if `event` fails its own validation, or if it cannot
    /// be serialized to JSON.
    pub fn set_event(&mut self, event: &Event) -> CodecResult<()> {
        event.validate()?;
        let mut map = HashMap::with_capacity(1);
        map.insert(event.event_type().to_string(), event.to_payload()?);
        self.events = map;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventMetadata, SessionRevoked};

    fn sample_set() -> Set {
        let mut set = Set {
            iss: "https://issuer.example".to_string(),
            jti: "01HXYZ".to_string(),
            iat: 1_700_000_000,
            aud: Some(Audience::from("https://receiver.example")),
            exp: None,
            nbf: None,
            txn: None,
            sub_id: Subject::Email { email: "u@x.io".to_string() },
            events: HashMap::new(),
        };
        set.set_event(&Event::SessionRevoked(SessionRevoked { metadata: EventMetadata::now() })).unwrap();
        set
    }

    #[test]
    fn single_audience_serializes_as_bare_string() {
        let set = sample_set();
        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(json["aud"], "https://receiver.example");
    }

    #[test]
    fn multi_audience_serializes_as_array() {
        let mut set = sample_set();
        set.aud = Some(Audience(vec!["a".to_string(), "b".to_string()]));
        let json = serde_json::to_value(&set).unwrap();
        assert!(json["aud"].is_array());
    }

    #[test]
    fn rejects_multiple_events() {
        let mut set = sample_set();
        set.events.insert("urn:example:second".to_string(), serde_json::json!({}));
        assert!(set.validate().is_err());
    }

    #[test]
    fn rejects_empty_issuer() {
        let mut set = sample_set();
        set.iss = String::new();
        assert!(set.validate().is_err());
    }

    #[test]
    fn event_round_trips_through_registry() {
        let set = sample_set();
        let event = set.event().unwrap();
        assert!(matches!(event, Event::SessionRevoked(_)));
    }
}
