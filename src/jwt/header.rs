//! JWS header shape used by Security Event Tokens.

use serde::{Deserialize, Serialize};

/// RFC 8417 §2.3 requires `typ` to be `secevent+jwt`.
pub const SET_TYP: &str = "secevent+jwt";

/// A JWS header. `alg` is kept as a raw string (rather than
/// [`jsonwebtoken::Algorithm`]) so that `"none"` — which `jsonwebtoken`'s enum
/// cannot represent — round-trips for the explicitly unsafe unsigned path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Header {
    /// Signature algorithm, e.g. `"RS256"`, `"ES256"`, or `"none"`.
    pub alg: String,
    /// Always `"secevent+jwt"` for a SET.
    pub typ: String,
    /// Key id hinting which JWK was used to sign this token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

impl Header {
    /// Build a header for the given algorithm name, with `typ` fixed to
    /// `secevent+jwt`.
    #[must_use]
    pub fn new(alg: impl Into<String>, kid: Option<String>) -> Self {
        Self { alg: alg.into(), typ: SET_TYP.to_string(), kid }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omits_kid_when_absent() {
        let header = Header::new("RS256", None);
        let json = serde_json::to_value(&header).unwrap();
        assert!(!json.as_object().unwrap().contains_key("kid"));
        assert_eq!(json["typ"], "secevent+jwt");
    }

    #[test]
    fn includes_kid_when_present() {
        let header = Header::new("ES256", Some("k1".to_string()));
        let json = serde_json::to_value(&header).unwrap();
        assert_eq!(json["kid"], "k1");
    }
}
