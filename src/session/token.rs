use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use thiserror::Error;
use tracing::{debug, error, instrument};

use super::types::TokenClaims;
use crate::record_id::RecordId;
use crate::shared::AppError;

/// Why a bearer token was rejected
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token has expired")]
    Expired,

    #[error("Malformed token")]
    Malformed,
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        AppError::Unauthorized(e.to_string())
    }
}

/// A freshly signed token together with its expiration instant
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and validates HS256 bearer tokens
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub const ALGORITHM: Algorithm = Algorithm::HS256;

    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Self::ALGORITHM);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Signs a token for `subject`, bound to the record `user_id`, that
    /// expires `ttl` from now
    #[instrument(skip(self, subject), fields(user_id = %user_id))]
    pub fn issue(&self, subject: &str, user_id: &RecordId) -> Result<IssuedToken, AppError> {
        self.issue_at(subject, user_id, Utc::now())
    }

    /// Signs a token as if it had been issued at `issued_at`
    pub(crate) fn issue_at(
        &self,
        subject: &str,
        user_id: &RecordId,
        issued_at: DateTime<Utc>,
    ) -> Result<IssuedToken, AppError> {
        let expires_at = issued_at.checked_add_signed(self.ttl).ok_or_else(|| {
            error!(ttl_hours = self.ttl.num_hours(), "Token expiry out of range");
            AppError::Internal
        })?;

        debug!(
            ttl_hours = self.ttl.num_hours(),
            exp_timestamp = expires_at.timestamp(),
            "Creating JWT token with expiration"
        );

        let claims = TokenClaims {
            sub: subject.to_string(),
            uid: user_id.clone(),
            exp: expires_at.timestamp() as usize,
            iat: issued_at.timestamp() as usize,
        };

        let token = encode(&Header::new(Self::ALGORITHM), &claims, &self.encoding_key).map_err(
            |e| {
                error!(error = %e, "Failed to encode JWT token");
                AppError::Internal
            },
        )?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Verifies signature and expiry, returning the embedded claims
    #[instrument(skip(self, token))]
    pub fn validate(&self, token: &str) -> Result<TokenClaims, TokenError> {
        decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| {
                debug!(exp = data.claims.exp, "JWT token decoded successfully");
                data.claims
            })
            .map_err(|e| {
                debug!(error = %e, "Failed to decode JWT token");
                match e.kind() {
                    ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                        TokenError::InvalidSignature
                    }
                    ErrorKind::ExpiredSignature => TokenError::Expired,
                    _ => TokenError::Malformed,
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::test_utils::{test_token_service, TEST_SECRET};
    use rstest::rstest;

    fn user_id() -> RecordId {
        "65f1a2b3c4d5e6f708192a3b".parse().unwrap()
    }

    fn flip_signature_char(token: &str) -> String {
        let (signed_part, signature) = token.rsplit_once('.').unwrap();
        let mut chars: Vec<char> = signature.chars().collect();
        chars[0] = if chars[0] == 'A' { 'B' } else { 'A' };
        format!("{}.{}", signed_part, chars.into_iter().collect::<String>())
    }

    #[test]
    fn test_issue_and_validate_token() {
        let service = test_token_service();
        let issued = service.issue("+1000", &user_id()).unwrap();

        assert!(!issued.token.is_empty());
        assert_eq!(issued.token.matches('.').count(), 2);

        let claims = service.validate(&issued.token).unwrap();
        assert_eq!(claims.sub, "+1000");
        assert_eq!(claims.uid, user_id());
        assert_eq!(claims.exp, issued.expires_at.timestamp() as usize);
    }

    #[test]
    fn test_expiry_is_24_hours_after_issue() {
        let service = test_token_service();
        let issued_at = Utc::now();
        let issued = service.issue_at("+1000", &user_id(), issued_at).unwrap();

        let claims = service.validate(&issued.token).unwrap();
        assert_eq!(claims.exp - claims.iat, 24 * 60 * 60);
    }

    #[test]
    fn test_expired_token() {
        let service = test_token_service();
        let issued = service
            .issue_at("+1000", &user_id(), Utc::now() - Duration::hours(25))
            .unwrap();

        assert_eq!(service.validate(&issued.token), Err(TokenError::Expired));
    }

    #[test]
    fn test_token_near_expiry_still_valid() {
        let service = test_token_service();
        let issued = service
            .issue_at("+1000", &user_id(), Utc::now() - Duration::hours(23))
            .unwrap();

        assert!(service.validate(&issued.token).is_ok());
    }

    #[test]
    fn test_expiry_out_of_range_is_an_error() {
        let service = TokenService::new(TEST_SECRET, Duration::days(36_500));
        let result = service.issue_at("+1000", &user_id(), DateTime::<Utc>::MAX_UTC);

        assert!(matches!(result, Err(AppError::Internal)));
    }

    #[test]
    fn test_tampered_signature() {
        let service = test_token_service();
        let issued = service.issue("+1000", &user_id()).unwrap();
        let tampered = flip_signature_char(&issued.token);

        assert_eq!(
            service.validate(&tampered),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn test_token_with_different_secret() {
        let other = TokenService::new("some-other-secret", Duration::hours(24));
        let issued = other.issue("+1000", &user_id()).unwrap();

        assert_eq!(
            test_token_service().validate(&issued.token),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn test_other_hmac_algorithm_rejected() {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: "+1000".to_string(),
            uid: user_id(),
            exp: (now + Duration::hours(1)).timestamp() as usize,
            iat: now.timestamp() as usize,
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .unwrap();

        assert_eq!(
            test_token_service().validate(&token),
            Err(TokenError::InvalidSignature)
        );
    }

    #[rstest]
    #[case("garbage")]
    #[case("")]
    #[case("a.b.c")]
    #[case("invalid.token.here")]
    fn test_malformed_token(#[case] token: &str) {
        assert_eq!(
            test_token_service().validate(token),
            Err(TokenError::Malformed)
        );
    }

    #[test]
    fn test_token_error_maps_to_unauthorized() {
        let app_error: AppError = TokenError::Expired.into();
        assert!(matches!(app_error, AppError::Unauthorized(msg) if msg == "Token has expired"));
    }
}
