use std::fmt::Display;

use chrono::{Months, Utc};
use jsonwebtoken::{
    decode, encode, errors::Error as JwtError, Algorithm, DecodingKey, EncodingKey, Header,
    Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::PrimaryKey;

/// The identity a session credential is issued for
#[derive(Debug, Clone)]
pub struct Subject {
    pub user_id: PrimaryKey,
    pub email: String,
}

/// The claims carried by a session credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// The user id
    pub sub: String,
    pub email: String,
    /// Issued at, as a unix timestamp
    pub iat: i64,
    /// Expires at, as a unix timestamp
    pub exp: i64,
}

/// A signed, stateless session credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Could not sign credential: {0}")]
    Signing(JwtError),
    #[error("Invalid credential: {0}")]
    Invalid(JwtError),
    #[error("Credential expiry is out of range")]
    ExpiryOutOfRange,
}

/// Issues and validates session credentials
pub trait CredentialService: Send + Sync {
    fn issue(&self, subject: &Subject) -> Result<SessionToken, CredentialError>;
    fn validate(&self, token: &str) -> Result<Claims, CredentialError>;
}

/// Session credentials as HS256 JSON web tokens signed with a shared secret
pub struct JwtCredentials {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtCredentials {
    const ALGORITHM: Algorithm = Algorithm::HS256;
    const SESSION_DURATION_IN_MONTHS: u32 = 12;

    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Self::ALGORITHM);
        validation.validate_exp = true;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

impl CredentialService for JwtCredentials {
    fn issue(&self, subject: &Subject) -> Result<SessionToken, CredentialError> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_months(Months::new(Self::SESSION_DURATION_IN_MONTHS))
            .ok_or(CredentialError::ExpiryOutOfRange)?;

        let claims = Claims {
            sub: subject.user_id.clone(),
            email: subject.email.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        encode(&Header::new(Self::ALGORITHM), &claims, &self.encoding_key)
            .map(SessionToken)
            .map_err(CredentialError::Signing)
    }

    fn validate(&self, token: &str) -> Result<Claims, CredentialError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(CredentialError::Invalid)
    }
}
