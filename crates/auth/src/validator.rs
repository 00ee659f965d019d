//! Bearer token verification.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};

use crate::claims::{JwtClaims, TokenValidationError, validate_claims};

/// Verifies a raw bearer token and yields its claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError>;
}

/// HMAC-SHA256 signed tokens with a shared secret.
pub struct Hs256JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: Vec<u8>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Time checks are done by `validate_claims` against the caller's clock.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            key: DecodingKey::from_secret(&secret),
            validation,
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError> {
        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.key, &self.validation)
            .map_err(|e| TokenValidationError::Malformed(e.to_string()))?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use jsonwebtoken::{EncodingKey, Header};

    fn mint(secret: &str, claims: &JwtClaims) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn accepts_token_signed_with_same_secret() {
        let now = Utc::now();
        let claims = JwtClaims::new("reader@example.com", now, now + Duration::minutes(5));
        let token = mint("s3cret", &claims);

        let validator = Hs256JwtValidator::new(b"s3cret".to_vec());
        let decoded = validator.validate(&token, now).unwrap();
        assert_eq!(decoded.email(), "reader@example.com");
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let now = Utc::now();
        let claims = JwtClaims::new("reader@example.com", now, now + Duration::minutes(5));
        let token = mint("other", &claims);

        let validator = Hs256JwtValidator::new(b"s3cret".to_vec());
        let err = validator.validate(&token, now).unwrap_err();
        assert!(matches!(err, TokenValidationError::Malformed(_)));
    }

    #[test]
    fn rejects_expired_token() {
        let now = Utc::now();
        let claims = JwtClaims::new(
            "reader@example.com",
            now - Duration::hours(2),
            now - Duration::hours(1),
        );
        let token = mint("s3cret", &claims);

        let validator = Hs256JwtValidator::new(b"s3cret".to_vec());
        assert_eq!(
            validator.validate(&token, now),
            Err(TokenValidationError::Expired)
        );
    }

    #[test]
    fn rejects_garbage() {
        let validator = Hs256JwtValidator::new(b"s3cret".to_vec());
        assert!(validator.validate("not.a.jwt", Utc::now()).is_err());
    }
}
