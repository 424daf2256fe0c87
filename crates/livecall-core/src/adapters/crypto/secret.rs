//! Secret hashing adapters.
//!
//! Argon2id (PHC string format) is the default. The salted SHA-256 variant
//! exists for fast test setups and is selected through `security.hasher`.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::application::ports::SecretHasher;
use crate::config::HasherKind;
use crate::domain::account::SecretHash;
use crate::domain::error::{MarketError, MarketResult};

pub fn hasher_for(kind: HasherKind) -> Box<dyn SecretHasher> {
    match kind {
        HasherKind::Argon2 => Box::new(Argon2SecretHasher),
        HasherKind::Sha256 => Box::new(Sha256SecretHasher),
    }
}

pub struct Argon2SecretHasher;

impl SecretHasher for Argon2SecretHasher {
    fn hash(&self, secret: &str) -> MarketResult<SecretHash> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| MarketError::storage(format!("argon2: {e}")))?;
        Ok(SecretHash(hash.to_string()))
    }

    fn verify(&self, secret: &str, hash: &SecretHash) -> bool {
        let Ok(parsed) = PasswordHash::new(&hash.0) else {
            return false;
        };
        Argon2::default()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok()
    }
}

const SHA256_PREFIX: &str = "sha256";

/// `sha256$<salt hex>$<digest hex>`, digest = SHA256(salt || secret).
pub struct Sha256SecretHasher;

impl Sha256SecretHasher {
    fn digest(salt: &[u8], secret: &str) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(salt);
        hasher.update(secret.as_bytes());
        hasher.finalize().into()
    }
}

impl SecretHasher for Sha256SecretHasher {
    fn hash(&self, secret: &str) -> MarketResult<SecretHash> {
        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        let digest = Self::digest(&salt, secret);
        Ok(SecretHash(format!(
            "{SHA256_PREFIX}${}${}",
            hex::encode(salt),
            hex::encode(digest)
        )))
    }

    fn verify(&self, secret: &str, hash: &SecretHash) -> bool {
        let mut parts = hash.0.split('$');
        let (Some(SHA256_PREFIX), Some(salt), Some(digest), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return false;
        };
        let (Ok(salt), Ok(expected)) = (hex::decode(salt), hex::decode(digest)) else {
            return false;
        };
        Self::digest(&salt, secret).as_slice() == expected.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(hasher: &dyn SecretHasher) {
        let hash = hasher.hash("hunter2").unwrap();
        assert!(!hash.0.contains("hunter2"));
        assert!(hasher.verify("hunter2", &hash));
        assert!(!hasher.verify("hunter3", &hash));
        assert!(!hasher.verify("", &hash));
    }

    #[test]
    fn argon2_verifies_only_the_original_secret() {
        check(&Argon2SecretHasher);
    }

    #[test]
    fn sha256_verifies_only_the_original_secret() {
        check(&Sha256SecretHasher);
    }

    #[test]
    fn same_secret_hashes_differently() {
        let hasher = Sha256SecretHasher;
        let a = hasher.hash("pw").unwrap();
        let b = hasher.hash("pw").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_hashes_never_verify() {
        let bad = SecretHash("not-a-hash".into());
        assert!(!Argon2SecretHasher.verify("pw", &bad));
        assert!(!Sha256SecretHasher.verify("pw", &bad));
        assert!(!Sha256SecretHasher.verify("pw", &SecretHash("sha256$zz$zz".into())));
    }

    #[test]
    fn hashers_do_not_accept_each_other() {
        let sha = Sha256SecretHasher.hash("pw").unwrap();
        assert!(!Argon2SecretHasher.verify("pw", &sha));
    }
}
