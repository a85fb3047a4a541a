// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Password hashing with PBKDF2-HMAC-SHA256.
//!
//! Hashes are stored as `pbkdf2_sha256$<iterations>$<salt>$<base64 hash>`,
//! so the iteration count can be raised without invalidating old hashes.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use std::num::NonZeroU32;

const ALGORITHM_TAG: &str = "pbkdf2_sha256";
const HASH_LEN: usize = 32;
const SALT_LEN: usize = 12;

/// Password hashing service.
#[derive(Clone)]
pub struct PasswordHasher {
    iterations: NonZeroU32,
    rng: SystemRandom,
}

impl PasswordHasher {
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: NonZeroU32::new(iterations).unwrap_or(NonZeroU32::MIN),
            rng: SystemRandom::new(),
        }
    }

    /// Hash a password with a fresh random salt.
    pub fn hash(&self, password: &str) -> anyhow::Result<String> {
        let mut salt_bytes = [0u8; SALT_LEN];
        self.rng
            .fill(&mut salt_bytes)
            .map_err(|_| anyhow::anyhow!("system random source failed"))?;
        let salt = hex::encode(salt_bytes);

        let mut out = [0u8; HASH_LEN];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            self.iterations,
            salt.as_bytes(),
            password.as_bytes(),
            &mut out,
        );

        Ok(format!(
            "{}${}${}${}",
            ALGORITHM_TAG,
            self.iterations,
            salt,
            BASE64.encode(out)
        ))
    }

    /// Check a password against a stored hash. Malformed hashes never match.
    pub fn verify(&self, password: &str, encoded: &str) -> bool {
        let mut parts = encoded.splitn(4, '$');
        let (Some(tag), Some(iterations), Some(salt), Some(hash)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return false;
        };
        if tag != ALGORITHM_TAG {
            return false;
        }
        let Some(iterations) = iterations.parse::<u32>().ok().and_then(NonZeroU32::new) else {
            return false;
        };
        let Ok(expected) = BASE64.decode(hash) else {
            return false;
        };

        pbkdf2::verify(
            pbkdf2::PBKDF2_HMAC_SHA256,
            iterations,
            salt.as_bytes(),
            password.as_bytes(),
            &expected,
        )
        .is_ok()
    }

    /// Hash on the blocking pool.
    pub async fn hash_blocking(&self, password: String) -> anyhow::Result<String> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password)).await?
    }

    /// Verify on the blocking pool.
    pub async fn verify_blocking(&self, password: String, encoded: String) -> bool {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &encoded))
            .await
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hasher = PasswordHasher::new(1_000);
        let encoded = hasher.hash("correct horse").unwrap();

        assert!(encoded.starts_with("pbkdf2_sha256$1000$"));
        assert!(hasher.verify("correct horse", &encoded));
        assert!(!hasher.verify("battery staple", &encoded));
    }

    #[test]
    fn test_salts_differ() {
        let hasher = PasswordHasher::new(1_000);
        assert_ne!(hasher.hash("same").unwrap(), hasher.hash("same").unwrap());
    }

    #[test]
    fn test_verify_uses_stored_iterations() {
        let old = PasswordHasher::new(500).hash("secret1").unwrap();
        assert!(PasswordHasher::new(2_000).verify("secret1", &old));
    }

    #[test]
    fn test_malformed_hash_never_matches() {
        let hasher = PasswordHasher::new(1_000);
        assert!(!hasher.verify("x", ""));
        assert!(!hasher.verify("x", "md5$1$salt$hash"));
        assert!(!hasher.verify("x", "pbkdf2_sha256$zero$salt$hash"));
        assert!(!hasher.verify("x", "pbkdf2_sha256$1000$salt$!!!"));
    }
}
