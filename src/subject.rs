//! Polymorphic subject identifiers per the OpenID Subject Identifiers spec.
//!
//! A [`Subject`] is tagged by its `format` field. `Complex` nests named
//! sub-subjects (user, device, session, …); `Aliases` lists equivalent
//! identifiers for the same subject. Both recurse into `Subject` itself.

use crate::error::{CodecError, CodecResult};
use serde::{Deserialize, Serialize};

/// A subject identifier, tagged by its `format` discriminator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum Subject {
    /// An account identified by URI (e.g. `acct:user@example.com`).
    Account {
        /// The account URI.
        uri: String,
    },
    /// An email address.
    Email {
        /// The address.
        email: String,
    },
    /// An E.164 phone number.
    PhoneNumber {
        /// The number.
        phone_number: String,
    },
    /// An opaque, transmitter-scoped identifier with no external meaning.
    Opaque {
        /// The identifier.
        id: String,
    },
    /// Issuer + subject pair, as used in OAuth2/OIDC tokens.
    IssSub {
        /// Token issuer.
        iss: String,
        /// Token subject.
        sub: String,
    },
    /// A W3C Decentralized Identifier.
    Did {
        /// The DID URL.
        url: String,
    },
    /// A generic URI-identified subject.
    Uri {
        /// The URI.
        uri: String,
    },
    /// A JWT identified by issuer and `jti`.
    JwtId {
        /// Token issuer.
        iss: String,
        /// Token `jti` claim.
        jti: String,
    },
    /// A SAML assertion identified by its issuer and assertion id.
    SamlAssertionId {
        /// Assertion issuer.
        issuer: String,
        /// Assertion id.
        assertion_id: String,
    },
    /// A list of subject identifiers that all refer to the same subject.
    Aliases {
        /// The equivalent identifiers.
        identifiers: Vec<Subject>,
    },
    /// A composite subject naming several related entities at once.
    Complex {
        /// The human user, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        user: Option<Box<Subject>>,
        /// The device, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        device: Option<Box<Subject>>,
        /// The session, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        session: Option<Box<Subject>>,
        /// The tenant, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        tenant: Option<Box<Subject>>,
        /// The application, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        application: Option<Box<Subject>>,
        /// The group, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        group: Option<Box<Subject>>,
        /// The organizational unit, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        org_unit: Option<Box<Subject>>,
    },
}

impl Subject {
    /// The `format` discriminator, as it appears on the wire.
    #[must_use]
    pub fn format(&self) -> &'static str {
        match self {
            Self::Account { .. } => "account",
            Self::Email { .. } => "email",
            Self::PhoneNumber { .. } => "phone_number",
            Self::Opaque { .. } => "opaque",
            Self::IssSub { .. } => "iss_sub",
            Self::Did { .. } => "did",
            Self::Uri { .. } => "uri",
            Self::JwtId { .. } => "jwt_id",
            Self::SamlAssertionId { .. } => "saml_assertion_id",
            Self::Aliases { .. } => "aliases",
            Self::Complex { .. } => "complex",
        }
    }

    /// Validate that every string field is non-empty and, for `Complex`, that
    /// at least one slot is populated; recurses into nested subjects.
    pub fn validate(&self) -> CodecResult<()> {
        let non_empty = |field: &str, value: &str| -> CodecResult<()> {
            if value.trim().is_empty() {
                return Err(CodecError::missing_value(field));
            }
            Ok(())
        };
        match self {
            Self::Account { uri } | Self::Uri { uri } => non_empty("uri", uri),
            Self::Email { email } => non_empty("email", email),
            Self::PhoneNumber { phone_number } => non_empty("phone_number", phone_number),
            Self::Opaque { id } => non_empty("id", id),
            Self::IssSub { iss, sub } => {
                non_empty("iss", iss)?;
                non_empty("sub", sub)
            }
            Self::Did { url } => non_empty("url", url),
            Self::JwtId { iss, jti } => {
                non_empty("iss", iss)?;
                non_empty("jti", jti)
            }
            Self::SamlAssertionId { issuer, assertion_id } => {
                non_empty("issuer", issuer)?;
                non_empty("assertion_id", assertion_id)
            }
            Self::Aliases { identifiers } => {
                if identifiers.is_empty() {
                    return Err(CodecError::invalid_value("aliases.identifiers", "must not be empty"));
                }
                identifiers.iter().try_for_each(Subject::validate)
            }
            Self::Complex { user, device, session, tenant, application, group, org_unit } => {
                let slots = [user, device, session, tenant, application, group, org_unit];
                if slots.iter().all(|s| s.is_none()) {
                    return Err(CodecError::invalid_value("complex", "at least one slot must be populated"));
                }
                slots.into_iter().flatten().try_for_each(|s| s.validate())
            }
        }
    }
}
