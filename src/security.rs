use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::AuthConfig;
use crate::error::{AppError, AppResult};

/// Token claims: the subject is the username the token was issued for.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: u64,
}

/// Credential service: password digests via Argon2, bearer tokens via
/// HS256-signed claims with a configured expiry.
#[derive(Clone)]
pub struct Security {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expire_seconds: u64,
}

impl Security {
    pub fn new(config: &AuthConfig) -> Self {
        Security {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            expire_seconds: config.jwt_expire_seconds,
        }
    }

    pub fn issue_token(&self, username: &str) -> AppResult<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| AppError::Internal(format!("clock error: {}", e)))?
            .as_secs();

        let claims = Claims {
            sub: username.to_string(),
            exp: now + self.expire_seconds,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("failed to sign token: {}", e)))
    }

    pub fn verify_token(&self, token: &str) -> AppResult<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))
    }
}

/// Argon2 is memory-hard on purpose; both hashing and verification run on
/// the blocking pool so they never stall the request executor.
pub async fn hash_password(password: String) -> AppResult<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Internal(format!("failed to hash password: {}", e)))
    })
    .await
    .map_err(|e| AppError::Internal(format!("hashing task failed: {}", e)))?
}

pub async fn verify_password(password: String, digest: String) -> AppResult<bool> {
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&digest)
            .map_err(|e| AppError::Internal(format!("malformed password digest: {}", e)))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .map_err(|e| AppError::Internal(format!("verification task failed: {}", e)))?
}
