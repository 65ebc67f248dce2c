use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApiAuthError {
    #[error("missing api key")]
    Missing,
    #[error("invalid api key")]
    Invalid,
}

/// The single administrative key guarding write endpoints.
///
/// Only the SHA-256 of the configured key is kept; presented tokens are
/// hashed and compared in constant time.
#[derive(Clone)]
pub struct StaticApiKey {
    hashed: Vec<u8>,
}

impl StaticApiKey {
    pub fn new(key: &str) -> Self {
        Self {
            hashed: hash_secret(key),
        }
    }

    pub fn authenticate(&self, token: Option<&str>) -> Result<(), ApiAuthError> {
        let token = token
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(ApiAuthError::Missing)?;

        let hashed_input = hash_secret(token);
        if self.hashed.ct_eq(&hashed_input).unwrap_u8() == 0 {
            return Err(ApiAuthError::Invalid);
        }
        Ok(())
    }
}

impl std::fmt::Debug for StaticApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticApiKey(..)")
    }
}

fn hash_secret(secret: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}
