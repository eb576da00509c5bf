//! Identity Provider seam: turns a bearer credential into `{user_id,
//! username}`. User registration, password hashing, and login HTTP
//! endpoints are out of scope (an external collaborator issues the JWT);
//! this module only verifies it.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    username: String,
    exp: usize,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("auth-failed")]
    AuthFailed,
}

/// Verifies bearer credentials against a shared HMAC secret. Matches the
/// `sub`/`exp` claim shape an external login endpoint would issue.
#[derive(Clone)]
pub struct IdentityProvider {
    decoding_key: DecodingKey,
    encoding_key: EncodingKey,
    validation: Validation,
}

impl IdentityProvider {
    pub fn new(jwt_secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            encoding_key: EncodingKey::from_secret(jwt_secret.as_bytes()),
            validation: Validation::default(),
        }
    }

    /// Strips a leading `"Bearer "` prefix if present, then verifies the
    /// token's signature and expiry.
    pub fn authenticate(&self, credential: &str) -> Result<Identity, IdentityError> {
        let token = credential.strip_prefix("Bearer ").unwrap_or(credential);
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| IdentityError::AuthFailed)?;
        Ok(Identity {
            user_id: data.claims.sub,
            username: data.claims.username,
        })
    }

    /// Issues a token for the given identity. Used by tests and by any
    /// external login flow that shares this provider's secret.
    pub fn issue(&self, user_id: &str, username: &str, ttl: chrono::Duration) -> String {
        let claims = Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            exp: (chrono::Utc::now() + ttl).timestamp() as usize,
        };
        encode(&Header::default(), &claims, &self.encoding_key).expect("HMAC signing never fails")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_freshly_issued_token() {
        let provider = IdentityProvider::new("test-secret");
        let token = provider.issue("user-1", "alice", chrono::Duration::hours(1));
        let identity = provider.authenticate(&format!("Bearer {token}")).unwrap();
        assert_eq!(identity.user_id, "user-1");
        assert_eq!(identity.username, "alice");
    }

    #[test]
    fn rejects_a_token_signed_with_a_different_secret() {
        let issuer = IdentityProvider::new("secret-a");
        let verifier = IdentityProvider::new("secret-b");
        let token = issuer.issue("user-1", "alice", chrono::Duration::hours(1));
        assert!(matches!(verifier.authenticate(&token), Err(IdentityError::AuthFailed)));
    }

    #[test]
    fn rejects_an_expired_token() {
        let provider = IdentityProvider::new("test-secret");
        let token = provider.issue("user-1", "alice", chrono::Duration::seconds(-1));
        assert!(matches!(provider.authenticate(&token), Err(IdentityError::AuthFailed)));
    }
}
