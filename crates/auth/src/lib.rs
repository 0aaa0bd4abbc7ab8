//! `warden-auth` — pure authentication/authorization domain (zero-trust).
//!
//! This crate is intentionally decoupled from HTTP and storage: codecs are
//! pure functions over strings and clocks, policy evaluation is a pure set
//! intersection. IO-bound orchestration lives in `warden-infra`.

pub mod claims;
pub mod codec;
pub mod identity;
pub mod policy;
pub mod roles;

pub use claims::{AccessClaims, RefreshClaims};
pub use codec::opaque::OpaqueCodec;
pub use codec::signed::{SignedCodec, SignedCodecConfig};
pub use codec::TokenKind;
pub use identity::{Credentials, UserIdentity};
pub use policy::{PolicyConfig, RoutePolicy, ANY_ROLES, PASSTHROUGH};
pub use roles::Role;
