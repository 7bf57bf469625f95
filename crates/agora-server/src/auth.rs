use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub(crate) enum AuthError {
    #[error("Invalid token")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("Subject is not a user id")]
    InvalidSubject(#[from] uuid::Error),
}

#[derive(Serialize, Deserialize, Debug)]
pub(crate) struct UserToken {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct VerifiedUser {
    pub id: Uuid,
    pub email: Option<String>,
}

pub(crate) struct InnerAuthConfig {
    decoding_key: DecodingKey,
    validation: Validation,
}

#[derive(Clone)]
pub(crate) struct AuthConfig(Arc<InnerAuthConfig>);

impl AuthConfig {
    pub(crate) fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self(Arc::new(InnerAuthConfig {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }))
    }

    /// Verifies signature and expiry and returns the user the token was issued for.
    pub(crate) fn validate_jwt(&self, token: &str) -> Result<VerifiedUser, AuthError> {
        let token = decode::<UserToken>(token, &self.0.decoding_key, &self.0.validation)?;
        let id = Uuid::parse_str(&token.claims.sub)?;
        Ok(VerifiedUser {
            id,
            email: token.claims.email,
        })
    }
}

#[cfg(test)]
pub(crate) fn issue_token(secret: &str, sub: &str, email: Option<&str>, exp: i64) -> String {
    use jsonwebtoken::{EncodingKey, Header, encode};
    encode(
        &Header::new(Algorithm::HS256),
        &UserToken {
            sub: sub.to_owned(),
            email: email.map(ToOwned::to_owned),
            exp,
        },
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

#[cfg(test)]
pub(crate) fn valid_until() -> i64 {
    i64::try_from(jsonwebtoken::get_current_timestamp()).unwrap() + 3600
}
