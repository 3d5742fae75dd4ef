//! Typed CAEP/SSF event payloads.
//!
//! Each struct here is the payload half of an [`super::Event`] variant — the
//! fields that sit alongside `"metadata"` under the event-type-URI key in a
//! SET's `events` claim.

use super::metadata::EventMetadata;
use crate::error::{CodecError, CodecResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// `session-revoked`: no payload fields beyond metadata.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SessionRevoked {
    /// Common event metadata.
    #[serde(flatten)]
    pub metadata: EventMetadata,
}

impl SessionRevoked {
    /// Nothing to validate; present for symmetry with the other variants.
    pub fn validate(&self) -> CodecResult<()> {
        Ok(())
    }
}

/// Closed set of credential kinds CAEP recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialType {
    /// Password-based credential.
    Password,
    /// PIN.
    Pin,
    /// X.509 client certificate.
    X509,
    /// FIDO2/WebAuthn credential.
    Fido2Roaming,
    /// FIDO2/WebAuthn platform credential.
    Fido2Platform,
    /// FIDO U2F security key.
    FidoU2f,
    /// Verifiable credential.
    Verifiable,
    /// App-generated one-time password.
    App,
}

/// What happened to the credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialChangeType {
    /// A new credential was created.
    Create,
    /// A credential was revoked.
    Revoke,
    /// A credential was updated in place.
    Update,
    /// A credential was deleted.
    Delete,
}

/// `credential-change`: one of the subject's credentials was created, revoked,
/// updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CredentialChange {
    /// Kind of credential affected.
    pub credential_type: CredentialType,
    /// What happened to it.
    pub change_type: CredentialChangeType,
    /// Caller-supplied label for the credential, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
    /// X.509 issuer DN, required together with `x509_serial`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x509_issuer: Option<String>,
    /// X.509 serial number, required together with `x509_issuer`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x509_serial: Option<String>,
    /// Common event metadata.
    #[serde(flatten)]
    pub metadata: EventMetadata,
}

impl CredentialChange {
    /// `x509_issuer` and `x509_serial` must be supplied together or not at all.
    pub fn validate(&self) -> CodecResult<()> {
        if self.x509_issuer.is_some() != self.x509_serial.is_some() {
            return Err(CodecError::invalid_value(
                "credential-change",
                "both x509_issuer and x509_serial must be provided together",
            ));
        }
        Ok(())
    }
}

/// NIST authenticator assurance levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssuranceLevel {
    /// AAL1.
    NistAal1,
    /// AAL2.
    NistAal2,
    /// AAL3.
    NistAal3,
}

/// Direction of an assurance-level transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeDirection {
    /// The new level is stronger than the previous one.
    Increase,
    /// The new level is weaker than the previous one.
    Decrease,
}

/// `assurance-level-change`: the subject's authentication assurance level moved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssuranceLevelChange {
    /// Assurance level namespace, default `"nist-aal"`.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Level after the change.
    pub current_level: AssuranceLevel,
    /// Level before the change.
    pub previous_level: AssuranceLevel,
    /// Whether the level went up or down.
    pub change_direction: ChangeDirection,
    /// Common event metadata.
    #[serde(flatten)]
    pub metadata: EventMetadata,
}

fn default_namespace() -> String {
    "nist-aal".to_string()
}

impl AssuranceLevelChange {
    /// The two levels must differ.
    pub fn validate(&self) -> CodecResult<()> {
        if self.current_level == self.previous_level {
            return Err(CodecError::invalid_value(
                "assurance-level-change",
                "current and previous levels must be different",
            ));
        }
        Ok(())
    }
}

/// Device compliance state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComplianceStatus {
    /// The device satisfies policy.
    Compliant,
    /// The device does not satisfy policy.
    NotCompliant,
}

/// `device-compliance-change`: a managed device's policy compliance flipped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceComplianceChange {
    /// Status after the change.
    pub current_status: ComplianceStatus,
    /// Status before the change.
    pub previous_status: ComplianceStatus,
    /// Common event metadata.
    #[serde(flatten)]
    pub metadata: EventMetadata,
}

impl DeviceComplianceChange {
    /// `current_status` and `previous_status` must differ.
    pub fn validate(&self) -> CodecResult<()> {
        if self.current_status == self.previous_status {
            return Err(CodecError::invalid_value(
                "device-compliance-change",
                "current_status and previous_status must be different",
            ));
        }
        Ok(())
    }
}

/// `token-claims-change`: one or more claims of a previously issued token changed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenClaimsChange {
    /// Claim name to new value.
    pub claims: HashMap<String, Value>,
    /// Common event metadata.
    #[serde(flatten)]
    pub metadata: EventMetadata,
}

impl TokenClaimsChange {
    /// `claims` must not be empty.
    pub fn validate(&self) -> CodecResult<()> {
        if self.claims.is_empty() {
            return Err(CodecError::invalid_value("token-claims-change", "claims must not be empty"));
        }
        Ok(())
    }
}

/// Stream enablement states, re-used by both the `stream-updated` event and
/// the stream status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEnablement {
    /// Delivering events normally.
    Enabled,
    /// Temporarily suspended.
    Paused,
    /// Permanently stopped.
    Disabled,
}

/// `stream-updated`: the transmitter changed a stream's status out-of-band.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamUpdated {
    /// New status of the stream.
    pub status: StreamEnablement,
    /// Free-form reason for the change.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Common event metadata.
    #[serde(flatten)]
    pub metadata: EventMetadata,
}

impl StreamUpdated {
    /// Nothing beyond schema conformance to check.
    pub fn validate(&self) -> CodecResult<()> {
        Ok(())
    }
}

/// `verification`: a transmitter-initiated stream verification event.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Verification {
    /// Caller-supplied opaque state, echoed from the verification request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Common event metadata.
    #[serde(flatten)]
    pub metadata: EventMetadata,
}

impl Verification {
    /// Nothing beyond schema conformance to check.
    pub fn validate(&self) -> CodecResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_change_requires_both_x509_fields() {
        let event = CredentialChange {
            credential_type: CredentialType::X509,
            change_type: CredentialChangeType::Create,
            friendly_name: None,
            x509_issuer: Some("CN=Root".to_string()),
            x509_serial: None,
            metadata: EventMetadata::default(),
        };
        assert!(event.validate().is_err());
    }

    #[test]
    fn assurance_level_change_rejects_equal_levels() {
        let event = AssuranceLevelChange {
            namespace: default_namespace(),
            current_level: AssuranceLevel::NistAal2,
            previous_level: AssuranceLevel::NistAal2,
            change_direction: ChangeDirection::Increase,
            metadata: EventMetadata::default(),
        };
        assert!(event.validate().is_err());
    }

    #[test]
    fn assurance_level_change_rejects_mismatched_direction() {
        let event = AssuranceLevelChange {
            namespace: default_namespace(),
            current_level: AssuranceLevel::NistAal1,
            previous_level: AssuranceLevel::NistAal2,
            change_direction: ChangeDirection::Increase,
            metadata: EventMetadata::default(),
        };
        assert!(event.validate().is_err());
    }

    #[test]
    fn token_claims_change_rejects_empty_claims() {
        let event = TokenClaimsChange { claims: HashMap::new(), metadata: EventMetadata::default() };
        assert!(event.validate().is_err());
    }

    #[test]
    fn device_compliance_change_requires_distinct_statuses() {
        let event = DeviceComplianceChange {
            current_status: ComplianceStatus::Compliant,
            previous_status: ComplianceStatus::Compliant,
            metadata: EventMetadata::default(),
        };
        assert!(event.validate().is_err());
    }
}
