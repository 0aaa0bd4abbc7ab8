//! Token codecs: pure encode/decode/sign/verify for one backend each.
//!
//! Two closed variants exist. The opaque backend mints random strings whose
//! validity lives entirely in the store; the signed backend mints JWTs whose
//! validity is proven by signature and claims alone.

pub mod opaque;
pub mod signed;

use serde::{Deserialize, Serialize};

/// Discriminator for the two token backends.
///
/// Verification fans across kinds in this declaration order (opaque first),
/// so a syntactically-opaque value is never handed to the signed codec.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Opaque,
    Signed,
}

impl TokenKind {
    pub const ALL: [TokenKind; 2] = [TokenKind::Opaque, TokenKind::Signed];

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Opaque => "opaque",
            TokenKind::Signed => "signed",
        }
    }
}

impl core::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for TokenKind {
    type Err = warden_core::AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "opaque" => Ok(TokenKind::Opaque),
            "signed" => Ok(TokenKind::Signed),
            other => Err(warden_core::AuthError::invalid_token(format!(
                "unknown token kind: {other}"
            ))),
        }
    }
}

/// A freshly minted access/refresh pair, prior to persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedPair {
    pub access_token: String,
    pub refresh_token: String,
}
