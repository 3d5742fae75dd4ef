//! Decoding and verifying compact Security Event Tokens.

use crate::error::{CodecError, CodecResult};
use crate::jwks::JwksResolver;
use crate::jwt::signer::verify as verify_signature;
use crate::jwt::{decode_segment, split_compact, Header, SignatureAlgorithm};
use crate::set::Set;
use chrono::Utc;
use std::collections::HashSet;

/// Configuration for [`Parser::parse_verify`].
pub struct VerifyOptions<'a> {
    /// Expected `iss`, checked exactly if set.
    pub issuer: Option<&'a str>,
    /// Expected `aud`; the claim must contain this value if set.
    pub audience: Option<&'a str>,
    /// Allowed signature algorithms. `alg=none` is never accepted, regardless
    /// of this set's contents.
    pub allowed_algorithms: HashSet<SignatureAlgorithm>,
    /// Permitted clock skew, in seconds, applied to `exp`/`nbf`/`iat` checks.
    pub clock_skew_seconds: i64,
}

impl Default for VerifyOptions<'_> {
    fn default() -> Self {
        Self {
            issuer: None,
            audience: None,
            allowed_algorithms: HashSet::from([SignatureAlgorithm::Rs256, SignatureAlgorithm::Es256]),
            clock_skew_seconds: 0,
        }
    }
}

/// Parses and, where a key source is configured, verifies compact SETs.
pub struct Parser {
    jwks: Option<JwksResolver>,
}

impl Parser {
    /// A parser with no key source; only [`Parser::parse_no_verify`] will work.
    #[must_use]
    pub fn new() -> Self {
        Self { jwks: None }
    }

    /// A parser that verifies signatures using `jwks` (explicit key, inline
    /// JWKS, or a lazily-fetched JWKS URL — see [`crate::jwks::KeySource`]).
    #[must_use]
    pub fn with_jwks(jwks: JwksResolver) -> Self {
        Self { jwks: Some(jwks) }
    }

    /// Decode a compact SET without checking its signature or registered
    /// claims. Intended for development/debugging; never use the result of
    /// this method to make an authorization decision.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not well-formed compact JWS, its
    /// payload is not a valid [`Set`], or the event/subject fail validation.
    pub fn parse_no_verify(&self, token: &str) -> CodecResult<Set> {
        let (_, payload_b64, _) = split_compact(token)?;
        let payload_json = decode_segment(payload_b64)?;
        let set: Set = serde_json::from_slice(&payload_json)?;
        set.validate()?;
        set.event()?;
        Ok(set)
    }

    /// Decode and fully verify a compact SET: signature, `alg`, `iss`, `aud`,
    /// and time-based claims.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::NoKeyConfigured`] if this parser has no JWKS
    /// resolver. Returns [`CodecError::InvalidFormat`] for `alg=none` or an
    /// unrecognized algorithm. Returns [`CodecError::VerificationFailed`] for
    /// a disallowed algorithm, issuer/audience mismatch, or an
    /// expired/not-yet-valid/future-dated token. Returns
    /// [`CodecError::ParseError`] for a signature that fails verification.
    pub async fn parse_verify(&self, token: &str, opts: &VerifyOptions<'_>) -> CodecResult<Set> {
        let resolver = self.jwks.as_ref().ok_or(CodecError::NoKeyConfigured)?;

        let (header_b64, payload_b64, sig_b64) = split_compact(token)?;
        let header_json = decode_segment(header_b64)?;
        let header: Header = serde_json::from_slice(&header_json)?;

        let Some(alg) = SignatureAlgorithm::parse(&header.alg) else {
            return Err(CodecError::InvalidFormat(format!(
                "algorithm `{}` is not accepted (alg=none is never accepted)",
                header.alg
            )));
        };
        if !opts.allowed_algorithms.contains(&alg) {
            return Err(CodecError::VerificationFailed(format!("algorithm `{}` is not allowed", header.alg)));
        }

        let (key, key_alg) = resolver.resolve(&header).await?;
        if key_alg != alg {
            return Err(CodecError::VerificationFailed(
                "key's algorithm does not match the header's alg".to_string(),
            ));
        }

        let signing_input = format!("{header_b64}.{payload_b64}");
        let signature = decode_segment(sig_b64)?;
        verify_signature(signing_input.as_bytes(), &signature, &key, alg)?;

        let payload_json = decode_segment(payload_b64)?;
        let set: Set = serde_json::from_slice(&payload_json)?;
        set.validate()?;
        set.event()?;

        check_registered_claims(&set, opts)?;

        Ok(set)
    }

    /// Decode a SET's `events` claim as a multi-entry map, bypassing the
    /// single-event policy enforced by [`Set::validate`]. Exists for
    /// transmitters that still emit multiple events per SET; not reachable
    /// through [`Parser::parse_no_verify`]/[`Parser::parse_verify`].
    ///
    /// # Errors
    ///
    /// Returns an error if the token is malformed or any event fails to parse.
    pub fn parse_multi_event(&self, token: &str) -> CodecResult<(Set, Vec<crate::event::Event>)> {
        let (_, payload_b64, _) = split_compact(token)?;
        let payload_json = decode_segment(payload_b64)?;
        let set: Set = serde_json::from_slice(&payload_json)?;
        let events = set.events_multi()?;
        Ok((set, events))
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

fn check_registered_claims(set: &Set, opts: &VerifyOptions<'_>) -> CodecResult<()> {
    if let Some(expected_issuer) = opts.issuer {
        if set.iss != expected_issuer {
            return Err(CodecError::VerificationFailed(format!(
                "issuer mismatch: expected `{expected_issuer}`, got `{}`",
                set.iss
            )));
        }
    }
    if let Some(expected_audience) = opts.audience {
        let ok = set.aud.as_ref().is_some_and(|aud| aud.contains(expected_audience));
        if !ok {
            return Err(CodecError::VerificationFailed(format!(
                "audience does not contain `{expected_audience}`"
            )));
        }
    }
    let now = Utc::now().timestamp();
    let skew = opts.clock_skew_seconds;
    if let Some(exp) = set.exp {
        if now > exp + skew {
            return Err(CodecError::VerificationFailed("token has expired".to_string()));
        }
    }
    if let Some(nbf) = set.nbf {
        if now < nbf - skew {
            return Err(CodecError::VerificationFailed("token is not yet valid".to_string()));
        }
    }
    if set.iat > now + skew {
        return Err(CodecError::VerificationFailed("iat is in the future".to_string()));
    }
    Ok(())
}
