//! JWKS fetch, parse, and per-`kid` key resolution.
//!
//! Resolution order (see [`KeySource`]): an explicit key set on the parser,
//! an inline JWKS document, or a JWKS URL fetched lazily on first use. Once
//! fetched, a JWKS is cached for the resolver's lifetime — there is no
//! implicit re-fetch on an unrecognized `kid` (see `DESIGN.md` for the
//! rationale).

use crate::error::{CodecError, CodecResult};
use crate::jwt::{Header, SignatureAlgorithm};
use jsonwebtoken::DecodingKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{instrument, warn};
use url::Url;

/// A single JSON Web Key, RFC 7517.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type: `"RSA"` or `"EC"`. Anything else is skipped.
    pub kty: String,
    /// Key id; a key without one is skipped (cannot be selected by `kid`).
    #[serde(default)]
    pub kid: Option<String>,
    /// Declared algorithm, if present; otherwise inferred from `kty`/`crv`.
    #[serde(default)]
    pub alg: Option<String>,
    /// RSA modulus, base64url.
    #[serde(default)]
    pub n: Option<String>,
    /// RSA public exponent, base64url.
    #[serde(default)]
    pub e: Option<String>,
    /// EC x coordinate, base64url.
    #[serde(default)]
    pub x: Option<String>,
    /// EC y coordinate, base64url.
    #[serde(default)]
    pub y: Option<String>,
    /// EC curve name, e.g. `"P-256"`.
    #[serde(default)]
    pub crv: Option<String>,
}

/// A JSON Web Key Set, RFC 7517.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Jwks {
    /// The keys in this set.
    pub keys: Vec<Jwk>,
}

/// A resolved verification key together with the algorithm it is valid for.
type ResolvedKey = (DecodingKey, SignatureAlgorithm);

fn jwk_to_resolved(jwk: &Jwk) -> Option<ResolvedKey> {
    match jwk.kty.as_str() {
        "RSA" => {
            let n = jwk.n.as_deref()?;
            let e = jwk.e.as_deref()?;
            let key = DecodingKey::from_rsa_components(n, e).ok()?;
            Some((key, SignatureAlgorithm::Rs256))
        }
        "EC" => {
            let x = jwk.x.as_deref()?;
            let y = jwk.y.as_deref()?;
            let crv = jwk.crv.as_deref().unwrap_or("P-256");
            if crv != "P-256" {
                warn!(kid = ?jwk.kid, curve = crv, "unsupported EC curve, skipping key");
                return None;
            }
            let key = DecodingKey::from_ec_components(x, y).ok()?;
            Some((key, SignatureAlgorithm::Es256))
        }
        other => {
            warn!(kty = other, "unsupported key type, skipping key");
            None
        }
    }
}

fn index_jwks(jwks: &Jwks) -> HashMap<String, ResolvedKey> {
    let mut map = HashMap::new();
    for jwk in &jwks.keys {
        let Some(kid) = jwk.kid.clone() else {
            warn!("JWK has no kid, skipping");
            continue;
        };
        if let Some(resolved) = jwk_to_resolved(jwk) {
            map.insert(kid, resolved);
        }
    }
    map
}

/// Where a [`JwksResolver`] gets its verification keys from.
pub enum KeySource {
    /// A single explicit key, used regardless of the header's `kid`.
    Explicit(ResolvedKey),
    /// A JWKS document supplied up front.
    Inline(Jwks),
    /// A JWKS document fetched lazily (and cached) from this URL.
    Url(Url),
}

/// Resolves the verification key for a parsed JWS header.
pub struct JwksResolver {
    source: KeySource,
    http_client: reqwest::Client,
    cache: RwLock<Option<HashMap<String, ResolvedKey>>>,
}

impl JwksResolver {
    /// Build a resolver around an explicit key.
    #[must_use]
    pub fn from_explicit_key(key: DecodingKey, algorithm: SignatureAlgorithm) -> Self {
        Self {
            source: KeySource::Explicit((key, algorithm)),
            http_client: reqwest::Client::new(),
            cache: RwLock::new(None),
        }
    }

    /// Build a resolver around an inline JWKS document.
    #[must_use]
    pub fn from_inline_jwks(jwks: Jwks) -> Self {
        Self { source: KeySource::Inline(jwks), http_client: reqwest::Client::new(), cache: RwLock::new(None) }
    }

    /// Build a resolver that fetches its JWKS lazily from `url`, using
    /// `http_client` (or a default client if `None`).
    #[must_use]
    pub fn from_jwks_url(url: Url, http_client: Option<reqwest::Client>) -> Self {
        Self {
            source: KeySource::Url(url),
            http_client: http_client.unwrap_or_default(),
            cache: RwLock::new(None),
        }
    }

    /// Resolve the verification key for `header`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::VerificationFailed`] if the JWKS cannot be
    /// fetched/parsed, if `header.kid` does not match any cached key, or if
    /// `header` has no `kid` and more than one key is available.
    #[instrument(skip(self, header), fields(kid = ?header.kid))]
    pub async fn resolve(&self, header: &Header) -> CodecResult<ResolvedKey> {
        match &self.source {
            KeySource::Explicit(resolved) => Ok(resolved.clone()),
            KeySource::Inline(jwks) => {
                self.ensure_cached_from(jwks).await;
                self.lookup(header).await
            }
            KeySource::Url(url) => {
                self.ensure_fetched(url).await?;
                self.lookup(header).await
            }
        }
    }

    async fn ensure_cached_from(&self, jwks: &Jwks) {
        let mut cache = self.cache.write().await;
        if cache.is_none() {
            *cache = Some(index_jwks(jwks));
        }
    }

    async fn ensure_fetched(&self, url: &Url) -> CodecResult<()> {
        if self.cache.read().await.is_some() {
            return Ok(());
        }
        let mut cache = self.cache.write().await;
        if cache.is_some() {
            return Ok(());
        }
        let jwks: Jwks = self
            .http_client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| CodecError::VerificationFailed(format!("JWKS fetch failed: {e}")))?
            .json()
            .await
            .map_err(|e| CodecError::VerificationFailed(format!("JWKS parse failed: {e}")))?;
        *cache = Some(index_jwks(&jwks));
        Ok(())
    }

    async fn lookup(&self, header: &Header) -> CodecResult<ResolvedKey> {
        let cache = self.cache.read().await;
        #[allow(clippy::unwrap_used)]
        let keys = cache.as_ref().unwrap();
        match &header.kid {
            Some(kid) => keys
                .get(kid)
                .cloned()
                .ok_or_else(|| CodecError::VerificationFailed(format!("no key for kid `{kid}`"))),
            None => match keys.len() {
                1 => Ok(keys.values().next().cloned().unwrap_or_else(|| unreachable!())),
                0 => Err(CodecError::VerificationFailed("JWKS has no usable keys".to_string())),
                _ => Err(CodecError::VerificationFailed(
                    "header has no kid and more than one key is available".to_string(),
                )),
            },
        }
    }
}
