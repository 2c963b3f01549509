//! Login token generation and hashing.
//!
//! Raw tokens are 32 bytes of OS randomness, hex-encoded for the delivery
//! URL. Only an Argon2id hash is ever stored, so a leaked token store
//! resists offline brute force for the lifetime of a pending token. The
//! work factor is tunable per deployment.

use crate::error::AuthError;
use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::{Algorithm, Argon2, Params, Version};
use serde::Deserialize;

/// Number of random bytes in a raw login token.
///
/// 32 bytes is 256 bits of entropy; guessing is not the attack the hash
/// defends against, but the margin costs nothing.
pub const LOGIN_TOKEN_BYTES: usize = 32;

/// Argon2id work factor.
///
/// Defaults match the argon2 crate's recommended parameters. Deployments
/// expecting long-lived pending tokens should raise the memory cost.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HashCost {
    /// Memory cost in KiB.
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,

    /// Number of iterations.
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    /// Degree of parallelism.
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

fn default_memory_kib() -> u32 {
    19456
}

fn default_iterations() -> u32 {
    2
}

fn default_parallelism() -> u32 {
    1
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

impl HashCost {
    /// A deliberately cheap cost for tests.
    #[must_use]
    pub fn insecure_for_tests() -> Self {
        Self {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }

    fn instance(&self) -> Result<Argon2<'static>, AuthError> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|e| AuthError::Hash {
                details: e.to_string(),
            })?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Generates a raw login token: hex-encoded OS randomness.
#[must_use]
pub fn generate_login_token() -> String {
    use rand::RngCore;

    let mut bytes = [0u8; LOGIN_TOKEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Hashes a raw login token with Argon2id at the given cost.
///
/// Failure is fatal to the enclosing operation; a login must never be
/// persisted with a token that was silently left unhashed.
pub fn hash_login_token(token: &str, cost: &HashCost) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = cost
        .instance()?
        .hash_password(token.as_bytes(), &salt)
        .map_err(|e| AuthError::Hash {
            details: e.to_string(),
        })?;
    Ok(hash.to_string())
}

/// Verifies a raw token against a stored hash.
///
/// The hash string carries its own parameters and salt, so verification
/// needs no cost argument. Malformed hashes verify false rather than
/// erroring; the caller cannot do anything smarter with them.
#[must_use]
pub fn verify_login_token(token: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(token.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn cost() -> HashCost {
        HashCost::insecure_for_tests()
    }

    #[test]
    fn generated_tokens_are_hex_of_expected_length() {
        let token = generate_login_token();
        assert_eq!(token.len(), LOGIN_TOKEN_BYTES * 2);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_tokens_are_unique() {
        let tokens: HashSet<_> = (0..100).map(|_| generate_login_token()).collect();
        assert_eq!(tokens.len(), 100);
    }

    #[test]
    fn hash_produces_phc_format() {
        let hash = hash_login_token("token", &cost()).expect("hash");
        assert!(hash.starts_with("$argon2id$"));
    }

    #[test]
    fn same_token_hashes_differently_each_time() {
        let first = hash_login_token("token", &cost()).expect("hash");
        let second = hash_login_token("token", &cost()).expect("hash");
        assert_ne!(first, second);
    }

    #[test]
    fn correct_token_verifies() {
        let token = generate_login_token();
        let hash = hash_login_token(&token, &cost()).expect("hash");
        assert!(verify_login_token(&token, &hash));
    }

    #[test]
    fn wrong_token_fails_verification() {
        let hash = hash_login_token("correct", &cost()).expect("hash");
        assert!(!verify_login_token("wrong", &hash));
    }

    #[test]
    fn malformed_hash_fails_verification() {
        assert!(!verify_login_token("any", "not a phc string"));
    }

    #[test]
    fn verification_reads_cost_from_the_hash() {
        // A hash produced at one cost verifies under the default verifier.
        let token = generate_login_token();
        let hash = hash_login_token(&token, &cost()).expect("hash");
        assert!(verify_login_token(&token, &hash));
        assert!(verify_login_token(&token, &hash));
    }

    #[test]
    fn invalid_cost_parameters_are_an_error() {
        let bad = HashCost {
            memory_kib: 0,
            iterations: 0,
            parallelism: 0,
        };
        let err = hash_login_token("token", &bad).expect_err("must fail");
        assert!(matches!(err, AuthError::Hash { .. }));
    }
}
