//! Opaque-random token backend.
//!
//! Tokens are fixed-length alphanumeric strings drawn from the OS CSPRNG.
//! There is no cryptographic binding between an access token and its refresh
//! token; the stored pair in the token record is the only link. Uniqueness
//! across live tokens is the store's job (collision retry on insert).

use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;

use super::IssuedPair;

/// Extra characters on the refresh token, to keep the two value spaces
/// disjoint and lower collision odds on the longer-lived value.
pub const REFRESH_EXTRA_LEN: usize = 4;

/// Codec for opaque (store-backed) tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpaqueCodec {
    access_len: usize,
}

impl OpaqueCodec {
    pub const DEFAULT_ACCESS_LEN: usize = 30;

    pub fn new(access_len: usize) -> Self {
        Self { access_len }
    }

    pub fn access_len(&self) -> usize {
        self.access_len
    }

    pub fn refresh_len(&self) -> usize {
        self.access_len + REFRESH_EXTRA_LEN
    }

    /// Mint a new access/refresh pair.
    pub fn issue(&self) -> IssuedPair {
        IssuedPair {
            access_token: generate(self.access_len),
            refresh_token: generate(self.refresh_len()),
        }
    }

    /// Syntactic filter only: exact access-token length and charset.
    ///
    /// Passing this proves nothing about validity; the store lookup does.
    pub fn is_well_formed(&self, token: &str) -> bool {
        token.len() == self.access_len && token.bytes().all(|b| b.is_ascii_alphanumeric())
    }
}

impl Default for OpaqueCodec {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ACCESS_LEN)
    }
}

fn generate(len: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_pair_has_expected_lengths() {
        let codec = OpaqueCodec::default();
        let pair = codec.issue();
        assert_eq!(pair.access_token.len(), 30);
        assert_eq!(pair.refresh_token.len(), 34);
    }

    #[test]
    fn issued_tokens_are_alphanumeric() {
        let pair = OpaqueCodec::default().issue();
        assert!(pair.access_token.bytes().all(|b| b.is_ascii_alphanumeric()));
        assert!(pair.refresh_token.bytes().all(|b| b.is_ascii_alphanumeric()));
    }

    #[test]
    fn well_formed_checks_length_and_charset() {
        let codec = OpaqueCodec::default();
        let pair = codec.issue();
        assert!(codec.is_well_formed(&pair.access_token));

        // refresh token is longer, so it is not a well-formed access token
        assert!(!codec.is_well_formed(&pair.refresh_token));
        assert!(!codec.is_well_formed(&pair.access_token[1..]));
        assert!(!codec.is_well_formed(&format!("{}!", &pair.access_token[1..])));
    }

    #[test]
    fn consecutive_issues_differ() {
        let codec = OpaqueCodec::default();
        let a = codec.issue();
        let b = codec.issue();
        assert_ne!(a.access_token, b.access_token);
        assert_ne!(a.refresh_token, b.refresh_token);
    }

    mod props {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn any_configured_length_produces_well_formed_tokens(len in 8usize..64) {
                let codec = OpaqueCodec::new(len);
                let pair = codec.issue();
                prop_assert!(codec.is_well_formed(&pair.access_token));
                prop_assert_eq!(pair.refresh_token.len(), len + REFRESH_EXTRA_LEN);
            }
        }
    }
}
