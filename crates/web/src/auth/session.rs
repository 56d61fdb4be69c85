//! Signed session tokens

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use testdeck_common::User;
use tracing::debug;

/// Claims carried by a session token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User id
    pub sub: String,
    pub email: String,
    pub roles: Vec<String>,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 keys and lifetime for session tokens
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
}

impl SessionKeys {
    pub fn new(secret: &[u8], ttl_secs: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX),
        }
    }

    /// Keys from a random secret; tokens do not survive a restart.
    pub fn ephemeral(ttl_secs: u64) -> Self {
        let secret = hex::encode(rand::random::<[u8; 32]>());
        Self::new(secret.as_bytes(), ttl_secs)
    }

    pub fn issue(&self, user: &User) -> Result<(String, SessionClaims), jsonwebtoken::errors::Error> {
        let now = chrono::Utc::now().timestamp();
        let claims = SessionClaims {
            sub: user.id.clone(),
            email: user.email.clone(),
            roles: user.roles.clone(),
            iat: now,
            exp: now.saturating_add(self.ttl_secs),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        debug!("Issued session for {}", user.email);
        Ok((token, claims))
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        decode::<SessionClaims>(token, &self.decoding, &validation).map(|data| data.claims)
    }
}
