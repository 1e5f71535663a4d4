use thiserror::Error;

use crate::store::StoreError;
use crate::token::TokenError;

/// Cause attached to an [`AuthError::Unauthorized`] rejection.
///
/// Login-path causes all render as deliberately generic messages; they stay
/// distinct here so flows and tests can branch on the exact condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnauthorizedReason {
    InvalidCredentials,
    EmailNotVerified,
    AccountLocked,
    PasswordIncorrect,
    InvalidRefreshToken,
}

impl UnauthorizedReason {
    pub fn message(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "Invalid credentials",
            Self::EmailNotVerified => "Please verify your email address",
            Self::AccountLocked => "Account is locked",
            Self::PasswordIncorrect => "Current password is incorrect",
            Self::InvalidRefreshToken => "Invalid refresh token",
        }
    }
}

/// Error taxonomy of the authentication core.
///
/// `Store` failures are infrastructure and propagate unmodified; everything
/// else is a flow outcome the caller maps onto its transport (HTTP status,
/// CLI message, ...).
#[derive(Debug, Error)]
pub enum AuthError {
    /// The email address is already registered.
    #[error("Email already registered")]
    Conflict,

    #[error("{}", .0.message())]
    Unauthorized(UnauthorizedReason),

    /// Unknown user id on an authenticated operation.
    #[error("User not found")]
    NotFound,

    /// Invalid or expired one-time code or token content.
    #[error("{0}")]
    BadRequest(String),

    /// Input validation failure; messages are field-specific on purpose so
    /// registration forms can guide correction.
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Hashing or signing fault. Not expected in normal operation.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        Self::Internal(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_messages_stay_generic_for_login() {
        assert_eq!(
            AuthError::Unauthorized(UnauthorizedReason::InvalidCredentials).to_string(),
            "Invalid credentials"
        );
        assert_eq!(
            AuthError::Unauthorized(UnauthorizedReason::AccountLocked).to_string(),
            "Account is locked"
        );
    }

    #[test]
    fn store_error_is_transparent() {
        let err: AuthError = StoreError("connection refused".into()).into();
        assert_eq!(err.to_string(), "store unavailable: connection refused");
    }
}
