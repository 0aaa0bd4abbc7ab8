//! User identity and the salted-password black box.
//!
//! The hash construction (double SHA-256 folded through PBKDF2-HMAC-SHA256)
//! is treated as an opaque scheme: callers only ever see
//! [`UserIdentity::verify_password`] and [`create_salted_password`].

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use warden_core::{AuthError, AuthResult, UserId};

use crate::Role;

const PBKDF2_ROUNDS: u32 = 1000;
const SALT_LEN: usize = 20;

const USERNAME_LEN: std::ops::RangeInclusive<usize> = 2..=40;
const PASSWORD_LEN: std::ops::RangeInclusive<usize> = 8..=40;

/// An authenticated (or authenticatable) user identity.
///
/// # Invariants
/// - `username` and `email` are globally unique (enforced by the store).
/// - Suspended users never authenticate successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub password_salt: String,
    pub suspended: bool,
    pub roles: Vec<Role>,
}

impl UserIdentity {
    /// Build an identity from plaintext credentials (registration path).
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: &str,
        roles: Vec<Role>,
    ) -> Self {
        let (salt, hash) = create_salted_password(password);
        Self {
            id: UserId::new(),
            username: username.into(),
            email: email.into(),
            password_hash: hash,
            password_salt: salt,
            suspended: false,
            roles,
        }
    }

    /// Constant-shape password check against the stored salt+hash.
    ///
    /// Returns `false` on any salt decoding problem rather than erroring:
    /// a corrupt record must read as "wrong password", never as a crash.
    pub fn verify_password(&self, password: &str) -> bool {
        let Ok(salt) = hex::decode(&self.password_salt) else {
            return false;
        };
        hash_password(password, &salt) == self.password_hash
    }
}

/// Plaintext credentials as submitted by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Shape validation, performed before any store lookup.
    ///
    /// Length bounds match the account schema; anything outside them can be
    /// rejected without touching the credential store.
    pub fn validate(&self) -> AuthResult<()> {
        if !USERNAME_LEN.contains(&self.username.chars().count()) {
            return Err(AuthError::malformed_credentials(format!(
                "username length must be between {} and {}",
                USERNAME_LEN.start(),
                USERNAME_LEN.end()
            )));
        }
        if !PASSWORD_LEN.contains(&self.password.chars().count()) {
            return Err(AuthError::malformed_credentials(format!(
                "password length must be between {} and {}",
                PASSWORD_LEN.start(),
                PASSWORD_LEN.end()
            )));
        }
        Ok(())
    }
}

/// Create a fresh random salt and the matching password hash.
///
/// Returns `(salt_hex, hash_hex)`.
pub fn create_salted_password(password: &str) -> (String, String) {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    (hex::encode(salt), hash_password(password, &salt))
}

fn hash_password(password: &str, salt: &[u8]) -> String {
    let digest = Sha256::digest(password.as_bytes());
    let folded = Sha256::digest(digest);

    let mut key = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(&folded, salt, PBKDF2_ROUNDS, &mut key);
    hex::encode(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_roundtrip() {
        let user = UserIdentity::new("alice", "alice@example.com", "supersecret", vec![]);
        assert!(user.verify_password("supersecret"));
        assert!(!user.verify_password("supersecreT"));
        assert!(!user.verify_password(""));
    }

    #[test]
    fn salts_are_unique_per_user() {
        let a = UserIdentity::new("a1", "a1@example.com", "supersecret", vec![]);
        let b = UserIdentity::new("b1", "b1@example.com", "supersecret", vec![]);
        assert_ne!(a.password_salt, b.password_salt);
        assert_ne!(a.password_hash, b.password_hash);
    }

    #[test]
    fn corrupt_salt_reads_as_wrong_password() {
        let mut user = UserIdentity::new("carol", "carol@example.com", "supersecret", vec![]);
        user.password_salt = "not-hex".to_string();
        assert!(!user.verify_password("supersecret"));
    }

    #[test]
    fn short_password_is_malformed() {
        let creds = Credentials::new("alice", "short");
        let err = creds.validate().unwrap_err();
        assert!(matches!(err, AuthError::CredentialsMalformed(_)));
    }

    #[test]
    fn blank_username_is_malformed() {
        let creds = Credentials::new("", "supersecret");
        assert!(creds.validate().is_err());
    }

    #[test]
    fn valid_credentials_pass_shape_check() {
        let creds = Credentials::new("rijalul.ghad", "supersecret");
        assert!(creds.validate().is_ok());
    }

    mod props {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn in_range_credentials_always_validate(
                username in "[a-z.]{2,40}",
                password in "[a-zA-Z0-9]{8,40}",
            ) {
                prop_assert!(Credentials::new(username, password).validate().is_ok());
            }

            #[test]
            fn over_length_passwords_never_validate(password in "[a-z]{41,80}") {
                prop_assert!(Credentials::new("alice", password).validate().is_err());
            }
        }
    }
}
