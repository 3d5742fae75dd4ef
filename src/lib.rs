//! SET codec and SSF receiver client for the OpenID Shared Signals Framework.
//!
//! This crate provides:
//! - A typed CAEP/SSF event taxonomy with a process-wide parser registry
//!   (`event`)
//! - Polymorphic subject identifiers (`subject`)
//! - Security Event Token construction, signing, and `alg=none` unsigned
//!   building for local testing (`set`, `builder`, `jwt`)
//! - Compact JWS decoding and verification against a resolved JWKS key
//!   (`parser`, `jwks`)
//! - An SSF receiver: transmitter metadata discovery, stream creation/attach,
//!   and the full stream operation surface (`transmitter_metadata`, `stream`)
//! - The ambient stack backing all of the above: error taxonomies, retry with
//!   backoff, and HTTP client configuration (`error`, `retry`, `http`)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod authorizer;
pub mod builder;
pub mod error;
pub mod event;
pub mod http;
pub mod jwks;
pub mod jwt;
pub mod parser;
pub mod retry;
pub mod set;
pub mod stream;
pub mod subject;
pub mod transmitter_metadata;

pub use builder::{JtiGenerator, SetBuilder};
pub use error::{CodecError, CodecResult, ReceiverError, ReceiverResult};
pub use event::{Event, EventRegistry, EventType};
pub use jwks::{Jwks, JwksResolver};
pub use jwt::{Es256Signer, Rs256Signer, Signer};
pub use parser::{Parser, VerifyOptions};
pub use set::Set;
pub use stream::{Stream, StreamBuilder};
pub use subject::Subject;
pub use transmitter_metadata::{MetadataClient, TransmitterMetadata};
