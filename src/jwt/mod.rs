//! Compact JWS construction primitives shared by the builder and parser.

pub mod header;
pub mod signer;

pub use header::{Header, SET_TYP};
pub use signer::{Es256Signer, Rs256Signer, SignatureAlgorithm, Signer};

use crate::error::{CodecError, CodecResult};
use base64::Engine as _;

fn b64_encode(bytes: &[u8]) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn b64_decode(s: &str) -> CodecResult<Vec<u8>> {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(s).map_err(CodecError::Base64)
}

/// Split a compact JWS into its three base64url segments, erroring if the
/// shape is not exactly `header.payload.signature` (the signature segment may
/// be empty, as in the `alg=none` case).
pub(crate) fn split_compact(token: &str) -> CodecResult<(&str, &str, &str)> {
    let mut parts = token.split('.');
    let (Some(header), Some(payload), Some(signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(CodecError::InvalidFormat(
            "expected exactly three dot-separated segments".to_string(),
        ));
    };
    Ok((header, payload, signature))
}

/// Assemble and base64url-encode the `header.payload` signing input.
pub(crate) fn signing_input(header_json: &[u8], payload_json: &[u8]) -> String {
    format!("{}.{}", b64_encode(header_json), b64_encode(payload_json))
}

/// Decode a base64url header segment into its raw JSON bytes.
pub(crate) fn decode_segment(segment: &str) -> CodecResult<Vec<u8>> {
    b64_decode(segment)
}

/// Base64url-encode signature bytes for the final compact-JWS segment.
pub(crate) fn encode_signature(signature: &[u8]) -> String {
    b64_encode(signature)
}
