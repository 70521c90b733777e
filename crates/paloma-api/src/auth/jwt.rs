//! JWT token generation and validation
//!
//! Implements HMAC-SHA256 signed access and refresh tokens. The signing key is
//! loaded once from configuration when the [`TokenSigner`] is built and is
//! read-only afterwards.

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use paloma_core::{AuthConfig, ConfigError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// What a token may be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenUse {
    Access,
    Refresh,
}

/// JWT Claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Token issuer
    pub iss: String,
    /// Subject - user ID
    pub sub: String,
    /// JWT ID - makes every issued token distinct
    pub jti: String,
    /// Issued at timestamp (Unix epoch)
    pub iat: i64,
    /// Expiration timestamp (Unix epoch)
    pub exp: i64,
    /// Access or refresh
    pub token_use: TokenUse,
}

/// JWT token generation and validation errors
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode JWT: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid token format")]
    InvalidToken,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token is not valid for this use")]
    WrongTokenUse,
}

/// A freshly signed token and when it stops being valid
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies signed tokens with one process-wide key
#[derive(Clone)]
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenSigner {
    pub fn new(secret: &[u8], issuer: impl Into<String>, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: issuer.into(),
            access_ttl,
            refresh_ttl,
        }
    }

    /// Build from configuration, failing when the secret is missing or too
    /// short, or when a lifetime does not fit in a [`Duration`]
    pub fn from_config(config: &AuthConfig) -> Result<Self, ConfigError> {
        let secret = config.signing_secret()?;
        let access_ttl = ttl(
            "JWT_ACCESS_EXPIRATION_SECS",
            config.access_token_ttl_secs,
            Duration::try_seconds,
        )?;
        let refresh_ttl = ttl(
            "JWT_REFRESH_EXPIRATION_DAYS",
            config.refresh_token_ttl_days,
            Duration::try_days,
        )?;
        Ok(Self::new(
            secret.as_bytes(),
            config.issuer.clone(),
            access_ttl,
            refresh_ttl,
        ))
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Sign a short-lived access token for `user_id`
    pub fn issue_access_token(&self, user_id: Uuid) -> Result<IssuedToken, JwtError> {
        self.issue(user_id, TokenUse::Access, self.access_ttl)
    }

    /// Sign a refresh token for `user_id`
    pub fn issue_refresh_token(&self, user_id: Uuid) -> Result<IssuedToken, JwtError> {
        self.issue(user_id, TokenUse::Refresh, self.refresh_ttl)
    }

    fn issue(&self, user_id: Uuid, token_use: TokenUse, ttl: Duration) -> Result<IssuedToken, JwtError> {
        let now = Utc::now().timestamp();
        let exp = now + ttl.num_seconds();

        let claims = Claims {
            iss: self.issuer.clone(),
            sub: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp,
            token_use,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        let expires_at = Utc
            .timestamp_opt(exp, 0)
            .single()
            .ok_or(JwtError::InvalidToken)?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Verify an access token and return the user it was issued to
    pub fn verify(&self, token: &str) -> Result<Uuid, JwtError> {
        self.verify_for(token, TokenUse::Access)
    }

    /// Verify a refresh token and return the user it was issued to
    pub fn verify_refresh(&self, token: &str) -> Result<Uuid, JwtError> {
        self.verify_for(token, TokenUse::Refresh)
    }

    fn verify_for(&self, token: &str, expected: TokenUse) -> Result<Uuid, JwtError> {
        let claims = self.decode_claims(token)?;
        if claims.token_use != expected {
            return Err(JwtError::WrongTokenUse);
        }
        Uuid::parse_str(&claims.sub).map_err(|_| JwtError::InvalidToken)
    }

    /// Check signature, issuer and expiry and return the claims
    pub fn decode_claims(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::ExpiredToken,
                ErrorKind::InvalidSignature => JwtError::InvalidSignature,
                _ => JwtError::InvalidToken,
            }
        })?;

        Ok(token_data.claims)
    }
}

fn ttl(
    key: &str,
    value: u64,
    to_duration: fn(i64) -> Option<Duration>,
) -> Result<Duration, ConfigError> {
    i64::try_from(value)
        .ok()
        .and_then(to_duration)
        .filter(|d| *d > Duration::zero())
        .ok_or_else(|| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret-key-with-at-least-32-bytes!!";

    fn signer() -> TokenSigner {
        TokenSigner::new(SECRET, "paloma-test", Duration::minutes(15), Duration::days(7))
    }

    #[test]
    fn test_issue_and_verify_access_token() {
        let signer = signer();
        let user_id = Uuid::new_v4();

        let issued = signer.issue_access_token(user_id).unwrap();
        assert!(!issued.token.is_empty());
        assert_eq!(signer.verify(&issued.token).unwrap(), user_id);

        let ttl = issued.expires_at - Utc::now();
        assert!(ttl <= Duration::minutes(15));
        assert!(ttl > Duration::minutes(14));
    }

    #[test]
    fn test_tokens_are_unique() {
        let signer = signer();
        let user_id = Uuid::new_v4();
        let a = signer.issue_refresh_token(user_id).unwrap();
        let b = signer.issue_refresh_token(user_id).unwrap();
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn test_refresh_token_is_not_an_access_token() {
        let signer = signer();
        let user_id = Uuid::new_v4();

        let refresh = signer.issue_refresh_token(user_id).unwrap();
        assert!(matches!(signer.verify(&refresh.token), Err(JwtError::WrongTokenUse)));
        assert_eq!(signer.verify_refresh(&refresh.token).unwrap(), user_id);

        let access = signer.issue_access_token(user_id).unwrap();
        assert!(matches!(
            signer.verify_refresh(&access.token),
            Err(JwtError::WrongTokenUse)
        ));
    }

    #[test]
    fn test_invalid_token() {
        let result = signer().verify("invalid.token.here");
        assert!(matches!(result, Err(JwtError::InvalidToken)));
    }

    #[test]
    fn test_wrong_secret() {
        let issued = signer().issue_access_token(Uuid::new_v4()).unwrap();
        let other = TokenSigner::new(
            b"another-secret-key-with-at-least-32-bytes",
            "paloma-test",
            Duration::minutes(15),
            Duration::days(7),
        );
        assert!(matches!(
            other.verify(&issued.token),
            Err(JwtError::InvalidSignature)
        ));
    }

    #[test]
    fn test_wrong_issuer() {
        let issued = signer().issue_access_token(Uuid::new_v4()).unwrap();
        let other = TokenSigner::new(SECRET, "someone-else", Duration::minutes(15), Duration::days(7));
        assert!(other.verify(&issued.token).is_err());
    }

    fn token_expiring_at(exp: i64) -> String {
        let claims = Claims {
            iss: "paloma-test".to_string(),
            sub: Uuid::new_v4().to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: exp - 900,
            exp,
            token_use: TokenUse::Access,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap()
    }

    #[test]
    fn test_expired_token() {
        let token = token_expiring_at(Utc::now().timestamp() - 3600);
        assert!(matches!(signer().verify(&token), Err(JwtError::ExpiredToken)));
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now().timestamp();
        assert!(matches!(
            signer().verify(&token_expiring_at(now - 1)),
            Err(JwtError::ExpiredToken)
        ));
        assert!(signer().verify(&token_expiring_at(now + 2)).is_ok());

        // Valid through the expiry second itself; rejected once the clock passes it
        let token = token_expiring_at(now);
        let result = signer().verify(&token);
        if Utc::now().timestamp() == now {
            assert!(result.is_ok());
        } else {
            assert!(matches!(result, Err(JwtError::ExpiredToken)));
        }
    }

    #[test]
    fn test_from_config_requires_secret() {
        let mut config = AuthConfig::default();
        assert!(TokenSigner::from_config(&config).is_err());

        config.jwt_secret = Some(String::from_utf8(SECRET.to_vec()).unwrap());
        let signer = TokenSigner::from_config(&config).unwrap();
        assert_eq!(signer.access_ttl(), Duration::minutes(15));
        assert_eq!(signer.refresh_ttl(), Duration::days(7));
    }

    #[test]
    fn test_from_config_rejects_out_of_range_ttls() {
        let mut config = AuthConfig::default();
        config.jwt_secret = Some(String::from_utf8(SECRET.to_vec()).unwrap());

        config.access_token_ttl_secs = u64::MAX;
        assert!(matches!(
            TokenSigner::from_config(&config),
            Err(ConfigError::InvalidValue { key, .. }) if key == "JWT_ACCESS_EXPIRATION_SECS"
        ));

        config.access_token_ttl_secs = 900;
        config.refresh_token_ttl_days = 200_000_000_000;
        assert!(matches!(
            TokenSigner::from_config(&config),
            Err(ConfigError::InvalidValue { key, .. }) if key == "JWT_REFRESH_EXPIRATION_DAYS"
        ));
    }
}
