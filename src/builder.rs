//! Fluent construction of Security Event Tokens.

use crate::error::{CodecError, CodecResult};
use crate::event::Event;
use crate::jwt::{encode_signature, signing_input, Header, Signer};
use crate::set::{Audience, Set};
use crate::subject::Subject;
use base64::Engine as _;
use chrono::Utc;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// How to generate the `jti` claim when the caller does not supply one
/// explicitly via [`SetBuilder::jti`].
#[derive(Clone)]
pub enum JtiGenerator {
    /// A random UUID v4 (the default).
    Uuid,
    /// `{prefix}{counter:0width$}`, counter shared across clones of the same
    /// generator and incremented atomically.
    Sequential {
        /// Text prepended to every generated id.
        prefix: String,
        /// Zero-padded width of the counter portion.
        width: usize,
        counter: Arc<AtomicU64>,
    },
    /// `{unix_timestamp}-{random_suffix_len hex chars}`.
    TimestampSuffix {
        /// Length, in hex characters, of the random suffix.
        suffix_len: usize,
    },
    /// `len` random bytes, encoded per `encoding`.
    RandomBytes {
        /// Number of random bytes to generate.
        len: usize,
        /// Text encoding applied to the random bytes.
        encoding: RandomEncoding,
    },
}

/// Text encodings available to [`JtiGenerator::RandomBytes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RandomEncoding {
    /// Lowercase hex.
    Hex,
    /// Standard base64 with padding.
    Base64,
    /// URL-safe base64 without padding.
    Base64Url,
}

impl JtiGenerator {
    /// A sequential generator starting its counter at zero.
    #[must_use]
    pub fn sequential(prefix: impl Into<String>, width: usize) -> Self {
        Self::Sequential { prefix: prefix.into(), width, counter: Arc::new(AtomicU64::new(0)) }
    }

    /// Generate the next id.
    #[must_use]
    pub fn next(&self) -> String {
        match self {
            Self::Uuid => uuid::Uuid::new_v4().to_string(),
            Self::Sequential { prefix, width, counter } => {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                format!("{prefix}{n:0width$}")
            }
            Self::TimestampSuffix { suffix_len } => {
                let mut bytes = vec![0u8; suffix_len.div_ceil(2)];
                rand::thread_rng().fill_bytes(&mut bytes);
                let suffix = hex_encode(&bytes);
                format!("{}-{}", Utc::now().timestamp(), &suffix[..*suffix_len])
            }
            Self::RandomBytes { len, encoding } => {
                let mut bytes = vec![0u8; *len];
                rand::thread_rng().fill_bytes(&mut bytes);
                match encoding {
                    RandomEncoding::Hex => hex_encode(&bytes),
                    RandomEncoding::Base64 => base64::engine::general_purpose::STANDARD.encode(bytes),
                    RandomEncoding::Base64Url => {
                        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
                    }
                }
            }
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Builds a single-event [`Set`] and, optionally, signs it.
pub struct SetBuilder {
    issuer: Option<String>,
    audience: Option<Audience>,
    txn: Option<String>,
    subject: Option<Subject>,
    event: Option<Event>,
    kid: Option<String>,
    jti: Option<String>,
    jti_generator: JtiGenerator,
    expires_in: Option<chrono::Duration>,
    not_before_in: Option<chrono::Duration>,
}

impl Default for SetBuilder {
    fn default() -> Self {
        Self {
            issuer: None,
            audience: None,
            txn: None,
            subject: None,
            event: None,
            kid: None,
            jti: None,
            jti_generator: JtiGenerator::Uuid,
            expires_in: None,
            not_before_in: None,
        }
    }
}

impl SetBuilder {
    /// Start a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the issuer (`iss`). Required.
    #[must_use]
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Set the audience (`aud`).
    #[must_use]
    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(Audience::from(audience.into().as_str()));
        self
    }

    /// Set the transaction id (`txn`).
    #[must_use]
    pub fn transaction_id(mut self, txn: impl Into<String>) -> Self {
        self.txn = Some(txn.into());
        self
    }

    /// Set the subject (`sub_id`). Required.
    #[must_use]
    pub fn subject(mut self, subject: Subject) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Set the event. Required.
    #[must_use]
    pub fn event(mut self, event: Event) -> Self {
        self.event = Some(event);
        self
    }

    /// Set the header `kid`.
    #[must_use]
    pub fn kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = Some(kid.into());
        self
    }

    /// Set an explicit `jti`, overriding the generator.
    #[must_use]
    pub fn jti(mut self, jti: impl Into<String>) -> Self {
        self.jti = Some(jti.into());
        self
    }

    /// Replace the default UUID v4 `jti` generator.
    #[must_use]
    pub fn jti_generator(mut self, generator: JtiGenerator) -> Self {
        self.jti_generator = generator;
        self
    }

    /// Set `exp` to `now + duration`.
    #[must_use]
    pub fn expires_in(mut self, duration: chrono::Duration) -> Self {
        self.expires_in = Some(duration);
        self
    }

    /// Set `nbf` to `now + duration` (pass a negative duration for "now minus").
    #[must_use]
    pub fn not_before_in(mut self, duration: chrono::Duration) -> Self {
        self.not_before_in = Some(duration);
        self
    }

    fn assemble(&self) -> CodecResult<Set> {
        let iss = self.issuer.clone().ok_or_else(|| CodecError::missing_field("iss"))?;
        let subject = self.subject.clone().ok_or_else(|| CodecError::missing_field("sub_id"))?;
        let event = self.event.clone().ok_or_else(|| CodecError::missing_field("events"))?;
        let now = Utc::now();

        let mut events = HashMap::with_capacity(1);
        event.validate()?;
        events.insert(event.event_type().to_string(), event.to_payload()?);

        let set = Set {
            iss,
            jti: self.jti.clone().unwrap_or_else(|| self.jti_generator.next()),
            iat: now.timestamp(),
            aud: self.audience.clone(),
            exp: self.expires_in.map(|d| (now + d).timestamp()),
            nbf: self.not_before_in.map(|d| (now + d).timestamp()),
            txn: self.txn.clone(),
            sub_id: subject,
            events,
        };
        set.validate()?;
        Ok(set)
    }

    /// Build and sign the token with `signer`.
    ///
    /// # Errors
    ///
    /// Returns an error if required fields are missing, the event/subject
    /// fails validation, or signing fails.
    pub fn build_signed(&self, signer: &dyn Signer) -> CodecResult<String> {
        let set = self.assemble()?;
        let header = Header::new(signer.algorithm().as_str(), self.kid.clone());
        let header_json = serde_json::to_vec(&header)?;
        let payload_json = serde_json::to_vec(&set)?;
        let input = signing_input(&header_json, &payload_json);
        let signature = signer.sign(input.as_bytes())?;
        Ok(format!("{input}.{}", encode_signature(&signature)))
    }

    /// Build an **unsigned** token (`alg=none`, trailing dot, empty signature).
    ///
    /// This path exists for local testing of the event/subject taxonomy and
    /// must never be accepted by a verifying parser: `alg=none` is always
    /// rejected by [`crate::parser::Parser::parse_verify`].
    ///
    /// # Errors
    ///
    /// Returns an error if required fields are missing or fail validation.
    pub fn build_unsigned(&self) -> CodecResult<String> {
        let set = self.assemble()?;
        let header = Header::new("none", self.kid.clone());
        let header_json = serde_json::to_vec(&header)?;
        let payload_json = serde_json::to_vec(&set)?;
        Ok(format!("{}.", signing_input(&header_json, &payload_json)))
    }
}
