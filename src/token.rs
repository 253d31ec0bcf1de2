//! Session token issuance and verification (HS256 JWT).

use crate::config::AuthConfig;
use crate::error::ApiError;
use crate::models::TokenClaims;
use crate::store::parse_user_id;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

/// A freshly minted token and the instant it stops being valid
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies session tokens with the process-wide secret
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    lifetime: Duration,
    issuer: String,
    audience: String,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Result<Self, ApiError> {
        let lifetime = Duration::try_seconds(config.token_expiration).ok_or_else(|| {
            ApiError::Config(format!(
                "JWT_EXPIRATION out of range: {}",
                config.token_expiration
            ))
        })?;

        let mut validation = Validation::default();
        validation.set_issuer(&[&config.jwt_issuer]);
        validation.set_audience(&[&config.jwt_audience]);
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        // the token dies together with its cookie
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            lifetime,
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
        })
    }

    /// Issue a token for a user
    pub fn issue(&self, user_id: Uuid) -> Result<IssuedToken, ApiError> {
        self.issue_at(user_id, Utc::now())
    }

    fn issue_at(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<IssuedToken, ApiError> {
        let expires_at = now.checked_add_signed(self.lifetime).ok_or_else(|| {
            tracing::error!(lifetime = %self.lifetime, "Session token expiry overflows");
            ApiError::Internal("session token expiry out of range".into())
        })?;

        let claims = TokenClaims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to sign session token: {:?}", e);
            ApiError::Internal(e.to_string())
        })?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Verify a token and return the user it was issued for.
    ///
    /// Bad signature, expiry, wrong issuer/audience and a malformed subject
    /// all come back as the same `InvalidToken`.
    pub fn verify(&self, token: &str) -> Result<Uuid, ApiError> {
        let token_data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)?;

        parse_user_id(&token_data.claims.sub).map_err(|e| {
            tracing::debug!("Token subject rejected: {}", e);
            ApiError::InvalidToken
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_auth_config;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&test_auth_config()).unwrap()
    }

    #[test]
    fn issue_then_verify() {
        let issuer = issuer();
        let user_id = Uuid::new_v4();

        let issued = issuer.issue(user_id).unwrap();
        assert_eq!(issuer.verify(&issued.token).unwrap(), user_id);

        let remaining = issued.expires_at - Utc::now();
        assert!(remaining > Duration::days(29));
        assert!(remaining <= Duration::days(30));
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let issuer = issuer();
        let issued = issuer.issue(Uuid::new_v4()).unwrap();

        let (unsigned, signature) = issued.token.rsplit_once('.').unwrap();
        let first = signature.chars().next().unwrap();
        let swapped = if first == 'A' { 'B' } else { 'A' };
        let tampered = format!("{unsigned}.{swapped}{}", &signature[1..]);

        assert!(matches!(issuer.verify(&tampered), Err(ApiError::InvalidToken)));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let issuer = issuer();
        let victim = issuer.issue(Uuid::new_v4()).unwrap();
        let attacker = issuer.issue(Uuid::new_v4()).unwrap();

        // attacker's payload with the victim's signature
        let v: Vec<&str> = victim.token.split('.').collect();
        let a: Vec<&str> = attacker.token.split('.').collect();
        let forged = format!("{}.{}.{}", v[0], a[1], v[2]);

        assert!(matches!(issuer.verify(&forged), Err(ApiError::InvalidToken)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let issuer = issuer();
        let long_ago = Utc::now() - Duration::days(31);
        let issued = issuer.issue_at(Uuid::new_v4(), long_ago).unwrap();

        assert!(matches!(issuer.verify(&issued.token), Err(ApiError::InvalidToken)));
    }

    #[test]
    fn token_is_dead_right_after_expiry() {
        let issuer = issuer();
        let lifetime = Duration::seconds(test_auth_config().token_expiration);
        let just_expired = Utc::now() - lifetime - Duration::seconds(2);
        let issued = issuer.issue_at(Uuid::new_v4(), just_expired).unwrap();

        assert!(matches!(issuer.verify(&issued.token), Err(ApiError::InvalidToken)));
    }

    #[test]
    fn huge_lifetime_is_an_error_not_a_panic() {
        let result = TokenIssuer::new(&AuthConfig {
            token_expiration: i64::MAX,
            ..test_auth_config()
        });
        assert!(matches!(result, Err(ApiError::Config(_))));

        let issuer = TokenIssuer::new(&AuthConfig {
            token_expiration: 10_000_000_000_000,
            ..test_auth_config()
        })
        .unwrap();
        assert!(matches!(
            issuer.issue(Uuid::new_v4()),
            Err(ApiError::Internal(_))
        ));
    }

    #[test]
    fn other_secret_is_rejected() {
        let issued = issuer().issue(Uuid::new_v4()).unwrap();
        let rotated = TokenIssuer::new(&AuthConfig {
            jwt_secret: "b".repeat(32),
            ..test_auth_config()
        })
        .unwrap();

        assert!(matches!(rotated.verify(&issued.token), Err(ApiError::InvalidToken)));
    }

    #[test]
    fn garbage_is_rejected() {
        let issuer = issuer();
        assert!(matches!(issuer.verify(""), Err(ApiError::InvalidToken)));
        assert!(matches!(issuer.verify("a.b.c"), Err(ApiError::InvalidToken)));
    }

    #[test]
    fn non_uuid_subject_is_rejected() {
        let config = test_auth_config();
        let issuer = TokenIssuer::new(&config).unwrap();
        let claims = TokenClaims {
            sub: "507f1f77bcf86cd799439011".into(),
            iat: Utc::now().timestamp(),
            exp: (Utc::now() + Duration::hours(1)).timestamp(),
            iss: config.jwt_issuer.clone(),
            aud: config.jwt_audience.clone(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .unwrap();

        assert!(matches!(issuer.verify(&token), Err(ApiError::InvalidToken)));
    }
}
