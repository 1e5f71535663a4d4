use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::config::JwtConfig;

/// Declared purpose of a signed token. Every consuming flow states the kind
/// it accepts; the issuer itself never decides which endpoint a token fits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TokenKind {
    Access,
    Refresh,
    Reset,
    MagicLink,
    Verify,
}

/// JWT payload. `jti` makes every issued token unique even when two tokens
/// for the same subject are minted within the same second; refresh rotation
/// relies on this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub jti: Uuid,
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
    pub kind: TokenKind,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("malformed token")]
    Malformed,
    #[error("token purpose mismatch: expected {expected:?}, got {actual:?}")]
    PurposeMismatch {
        expected: TokenKind,
        actual: TokenKind,
    },
    #[error("token signing failed")]
    SigningFailed,
}

/// Holds signing and verification keys plus the per-purpose TTL policy.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
    short_ttl: Duration,
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: Duration::minutes(cfg.access_ttl_minutes),
            refresh_ttl: Duration::minutes(cfg.refresh_ttl_minutes),
            short_ttl: Duration::minutes(cfg.short_ttl_minutes),
        }
    }

    fn ttl_for(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
            TokenKind::Reset | TokenKind::MagicLink | TokenKind::Verify => self.short_ttl,
        }
    }

    fn sign_with_ttl(
        &self,
        sub: Uuid,
        email: Option<&str>,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            sub,
            email: email.map(str::to_owned),
            jti: Uuid::new_v4(),
            iat: now.unix_timestamp() as usize,
            exp: (now + ttl).unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|_| TokenError::SigningFailed)?;
        debug!(user_id = %sub, kind = ?kind, "token signed");
        Ok(token)
    }

    /// Issues a token of `kind` with its configured TTL.
    pub fn issue(
        &self,
        sub: Uuid,
        email: Option<&str>,
        kind: TokenKind,
    ) -> Result<String, TokenError> {
        self.sign_with_ttl(sub, email, kind, self.ttl_for(kind))
    }

    /// Checks signature, expiry, issuer and audience. Purpose is NOT checked
    /// here; callers that accept a specific kind use [`JwtKeys::verify_kind`].
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data =
            decode::<Claims>(token, &self.decoding, &validation).map_err(map_jwt_error)?;
        debug!(user_id = %data.claims.sub, kind = ?data.claims.kind, "token verified");
        Ok(data.claims)
    }

    /// Verifies the token and enforces that its purpose tag is `expected`.
    pub fn verify_kind(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let claims = self.verify(token)?;
        if claims.kind != expected {
            return Err(TokenError::PurposeMismatch {
                expected,
                actual: claims.kind,
            });
        }
        Ok(claims)
    }
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> TokenError {
    use jsonwebtoken::errors::ErrorKind;
    match err.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature
        | ErrorKind::ImmatureSignature
        | ErrorKind::InvalidIssuer
        | ErrorKind::InvalidAudience => TokenError::InvalidSignature,
        _ => TokenError::Malformed,
    }
}
