//! Pluggable detached-signature signing.
//!
//! [`Signer`] is deliberately narrow: given the unsigned `header.payload`
//! bytes, return the raw signature bytes. This crate builds the compact JWS
//! itself rather than handing the whole token to `jsonwebtoken::encode`, so
//! that the `alg=none` unsigned path (which `jsonwebtoken` cannot produce —
//! its `Algorithm` enum has no `None` variant) is just "skip the signer".

use crate::error::{CodecError, CodecResult};
use base64::Engine as _;
use jsonwebtoken::{crypto, Algorithm, EncodingKey};

/// The signature algorithms this crate signs and verifies by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    /// RSASSA-PKCS1-v1_5 with SHA-256.
    Rs256,
    /// ECDSA using P-256 and SHA-256.
    Es256,
}

impl SignatureAlgorithm {
    /// The JOSE `alg` name for this algorithm.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rs256 => "RS256",
            Self::Es256 => "ES256",
        }
    }

    pub(crate) const fn as_jsonwebtoken(self) -> Algorithm {
        match self {
            Self::Rs256 => Algorithm::RS256,
            Self::Es256 => Algorithm::ES256,
        }
    }

    /// Parse a JOSE `alg` name. Returns `None` for `"none"` and anything this
    /// crate does not sign/verify by default.
    #[must_use]
    pub fn parse(alg: &str) -> Option<Self> {
        match alg {
            "RS256" => Some(Self::Rs256),
            "ES256" => Some(Self::Es256),
            _ => None,
        }
    }
}

/// Produces a detached signature over an unsigned `header.payload` byte
/// string. Implementations are expected to be cheap to call repeatedly and
/// safe to share across tasks.
pub trait Signer: Send + Sync {
    /// The algorithm this signer produces signatures for; becomes the JWS
    /// header's `alg`.
    fn algorithm(&self) -> SignatureAlgorithm;

    /// Sign `unsigned` (the base64url-encoded `header.payload`) and return
    /// the raw (not base64-encoded) signature bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::SigningFailed`] if the underlying cryptographic
    /// operation fails.
    fn sign(&self, unsigned: &[u8]) -> CodecResult<Vec<u8>>;
}

/// RS256 signer backed by an RSA private key.
pub struct Rs256Signer {
    key: EncodingKey,
}

impl Rs256Signer {
    /// Load an RSA private key from PKCS#1 or PKCS#8 PEM.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::SigningFailed`] if the PEM cannot be parsed as
    /// an RSA key.
    pub fn from_pem(pem: &[u8]) -> CodecResult<Self> {
        let key = EncodingKey::from_rsa_pem(pem).map_err(|e| CodecError::SigningFailed(e.to_string()))?;
        Ok(Self { key })
    }
}

impl Signer for Rs256Signer {
    fn algorithm(&self) -> SignatureAlgorithm {
        SignatureAlgorithm::Rs256
    }

    fn sign(&self, unsigned: &[u8]) -> CodecResult<Vec<u8>> {
        sign_with(unsigned, &self.key, SignatureAlgorithm::Rs256)
    }
}

/// ES256 signer backed by an ECDSA P-256 private key.
pub struct Es256Signer {
    key: EncodingKey,
}

impl Es256Signer {
    /// Load an EC private key from SEC1 or PKCS#8 PEM.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::SigningFailed`] if the PEM cannot be parsed as
    /// an EC key.
    pub fn from_pem(pem: &[u8]) -> CodecResult<Self> {
        let key = EncodingKey::from_ec_pem(pem).map_err(|e| CodecError::SigningFailed(e.to_string()))?;
        Ok(Self { key })
    }
}

impl Signer for Es256Signer {
    fn algorithm(&self) -> SignatureAlgorithm {
        SignatureAlgorithm::Es256
    }

    fn sign(&self, unsigned: &[u8]) -> CodecResult<Vec<u8>> {
        sign_with(unsigned, &self.key, SignatureAlgorithm::Es256)
    }
}

fn sign_with(unsigned: &[u8], key: &EncodingKey, alg: SignatureAlgorithm) -> CodecResult<Vec<u8>> {
    let b64_sig = crypto::sign(unsigned, key, alg.as_jsonwebtoken())
        .map_err(|e| CodecError::SigningFailed(e.to_string()))?;
    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(b64_sig)
        .map_err(CodecError::Base64)
}

/// Verify a detached signature produced by a [`Signer`] of the matching
/// algorithm.
///
/// # Errors
///
/// Returns [`CodecError::ParseError`] if the signature does not verify
/// against `key` under `alg`.
pub(crate) fn verify(
    unsigned: &[u8],
    signature: &[u8],
    key: &jsonwebtoken::DecodingKey,
    alg: SignatureAlgorithm,
) -> CodecResult<()> {
    let b64_sig = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(signature);
    let ok = crypto::verify(&b64_sig, unsigned, key, alg.as_jsonwebtoken())
        .map_err(|e| CodecError::ParseError(e.to_string()))?;
    if ok {
        Ok(())
    } else {
        Err(CodecError::ParseError("signature mismatch".to_string()))
    }
}


#[cfg(test)]
mod tests {
    use super::test_keys::{ec_pem_pair, rsa_pem_pair};
    use super::*;
    use jsonwebtoken::DecodingKey;

    #[test]
    fn rs256_signs_and_verifies() {
        let (private_pem, public_pem) = rsa_pem_pair();
        let signer = Rs256Signer::from_pem(private_pem.as_bytes()).unwrap();
        let sig = signer.sign(b"header.payload").unwrap();
        assert_eq!(signer.algorithm(), SignatureAlgorithm::Rs256);

        let decoding_key = DecodingKey::from_rsa_pem(public_pem.as_bytes()).unwrap();
        verify(b"header.payload", &sig, &decoding_key, SignatureAlgorithm::Rs256).unwrap();
    }

    #[test]
    fn es256_signs_and_verifies() {
        let (private_pem, public_pem) = ec_pem_pair();
        let signer = Es256Signer::from_pem(private_pem.as_bytes()).unwrap();
        let sig = signer.sign(b"header.payload").unwrap();
        assert_eq!(signer.algorithm(), SignatureAlgorithm::Es256);

        let decoding_key = DecodingKey::from_ec_pem(public_pem.as_bytes()).unwrap();
        verify(b"header.payload", &sig, &decoding_key, SignatureAlgorithm::Es256).unwrap();
    }

    #[test]
    fn tampered_signature_fails_verification() {
        let (private_pem, public_pem) = rsa_pem_pair();
        let signer = Rs256Signer::from_pem(private_pem.as_bytes()).unwrap();
        let mut sig = signer.sign(b"header.payload").unwrap();
        sig[0] ^= 0xFF;

        let decoding_key = DecodingKey::from_rsa_pem(public_pem.as_bytes()).unwrap();
        assert!(verify(b"header.payload", &sig, &decoding_key, SignatureAlgorithm::Rs256).is_err());
    }

    #[test]
    fn parse_rejects_none_and_unknown_algorithms() {
        assert_eq!(SignatureAlgorithm::parse("RS256"), Some(SignatureAlgorithm::Rs256));
        assert_eq!(SignatureAlgorithm::parse("none"), None);
        assert_eq!(SignatureAlgorithm::parse("HS256"), None);
    }
}
