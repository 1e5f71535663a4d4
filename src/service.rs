use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{AuthError, UnauthorizedReason};
use crate::identity::{ExternalProfile, IdentityResolver};
use crate::lockout::LockoutPolicy;
use crate::notify::{Mail, Notifier};
use crate::password::{hash_password, verify_password};
use crate::store::UserStore;
use crate::token::{JwtKeys, TokenKind};
use crate::user::{NewUser, User};
use crate::validate::{check_password_rules, is_valid_email, normalize_email};

const VERIFICATION_CODE_TTL_MINUTES: i64 = 15;

// Flow messages. Enumeration-sensitive flows must return the same message
// whether or not the email is registered.
const MSG_REGISTERED: &str = "Registration successful";
const MSG_REGISTERED_VERIFY: &str =
    "Registration successful. Please check your email for the verification code.";
const MSG_MAGIC_LINK_SENT: &str = "If an account exists, a magic link has been sent";
const MSG_RESET_SENT: &str = "If an account exists, a password reset link has been sent";
const MSG_VERIFICATION_RESENT: &str =
    "If your email is registered and not verified, you will receive a new verification code.";
const MSG_EMAIL_VERIFIED: &str = "Email verified successfully";
const MSG_PASSWORD_RESET: &str = "Password reset successfully";
const MSG_PASSWORD_CHANGED: &str = "Password changed successfully";
const MSG_INVALID_RESET_TOKEN: &str = "Invalid or expired reset token";
const MSG_INVALID_MAGIC_LINK: &str = "Invalid or expired magic link";
const MSG_INVALID_VERIFICATION_CODE: &str = "Invalid or expired verification code";

/// Registration input. `confirm_password` must match `password`.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Session token pair returned by login-like flows.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Authentication strategies the orchestrator dispatches on. Each variant
/// runs a different verification pipeline but converges on the same session
/// token pair.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    Password { email: String, password: String },
    External(ExternalProfile),
    MagicLink { token: String },
}

/// Generic success message returned by message-only flows.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FlowMessage {
    pub message: String,
}

impl FlowMessage {
    fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// Authentication orchestrator: coordinates hasher, token issuer, lockout
/// tracker and identity resolver for each flow, persisting through the
/// [`UserStore`] and messaging through the [`Notifier`].
pub struct AuthService {
    store: Arc<dyn UserStore>,
    notifier: Arc<dyn Notifier>,
    resolver: IdentityResolver,
    keys: JwtKeys,
    lockout: LockoutPolicy,
    require_email_verification: bool,
}

impl AuthService {
    pub fn new(
        config: &AuthConfig,
        store: Arc<dyn UserStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            resolver: IdentityResolver::new(store.clone()),
            keys: JwtKeys::new(&config.jwt),
            lockout: LockoutPolicy::new(&config.security),
            require_email_verification: config.security.require_email_verification,
            store,
            notifier,
        }
    }

    /// Creates a password account. Does not log the user in.
    #[instrument(skip(self, req), fields(email = %req.email))]
    pub async fn register(&self, req: RegisterRequest) -> Result<FlowMessage, AuthError> {
        let email = normalize_email(&req.email);
        if !is_valid_email(&email) {
            return Err(AuthError::Validation(
                "Please provide a valid email address".into(),
            ));
        }
        check_password_rules(&req.password)?;
        if req.confirm_password != req.password {
            return Err(AuthError::Validation("Passwords do not match".into()));
        }
        if self.store.find_by_email(&email).await?.is_some() {
            warn!("registration with taken email");
            return Err(AuthError::Conflict);
        }

        let password_hash = hash_password(&req.password)?;
        let full_name = format!("{} {}", req.first_name.trim(), req.last_name.trim())
            .trim()
            .to_string();
        let mut new_user = NewUser {
            email,
            password_hash: Some(password_hash),
            full_name,
            email_verified: !self.require_email_verification,
            ..Default::default()
        };

        let (code, message) = if self.require_email_verification {
            let code = generate_verification_code();
            new_user.verification_code = Some(code.clone());
            new_user.verification_code_expires_at = Some(
                OffsetDateTime::now_utc() + Duration::minutes(VERIFICATION_CODE_TTL_MINUTES),
            );
            (Some(code), MSG_REGISTERED_VERIFY)
        } else {
            (None, MSG_REGISTERED)
        };

        let user = self.store.create(new_user).await?;
        if let Some(code) = code {
            self.enqueue(&user.email, Mail::VerificationCode { code }).await;
        }
        info!(user_id = %user.id, "user registered");
        Ok(FlowMessage::new(message))
    }

    /// Password check with lockout semantics. Returns the authenticated user;
    /// callers wanting a session go through [`AuthService::password_login`].
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn validate_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let email = normalize_email(email);
        let Some(mut user) = self.store.find_by_email(&email).await? else {
            warn!("login with unknown email");
            return Err(AuthError::Unauthorized(
                UnauthorizedReason::InvalidCredentials,
            ));
        };
        if !user.email_verified {
            warn!(user_id = %user.id, "login before email verification");
            return Err(AuthError::Unauthorized(UnauthorizedReason::EmailNotVerified));
        }
        if self.lockout.is_locked(&user) {
            warn!(user_id = %user.id, "login while account locked");
            return Err(AuthError::Unauthorized(UnauthorizedReason::AccountLocked));
        }

        // Accounts created through an external identity or magic link carry
        // no password hash and always fail the password path.
        let ok = match user.password_hash.as_deref() {
            Some(hash) => verify_password(password, hash)?,
            None => false,
        };

        if !ok {
            let locked_now = self.lockout.record_failure(&mut user);
            self.store.save(&user).await?;
            warn!(user_id = %user.id, attempts = user.login_attempts, "invalid password");
            let reason = if locked_now {
                UnauthorizedReason::AccountLocked
            } else {
                UnauthorizedReason::InvalidCredentials
            };
            return Err(AuthError::Unauthorized(reason));
        }

        self.lockout.record_success(&mut user);
        self.store.save(&user).await?;
        Ok(user)
    }

    /// Issues an access+refresh pair and binds the refresh generation to the
    /// user record by storing a hash of the refresh token.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn login(&self, mut user: User) -> Result<TokenPair, AuthError> {
        let access_token = self.keys.issue(user.id, Some(&user.email), TokenKind::Access)?;
        let refresh_token = self
            .keys
            .issue(user.id, Some(&user.email), TokenKind::Refresh)?;
        user.refresh_token_hash = Some(hash_password(&refresh_token)?);
        self.store.save(&user).await?;
        info!(user_id = %user.id, "session issued");
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Single entry point over the supported strategies.
    pub async fn authenticate(&self, method: AuthMethod) -> Result<TokenPair, AuthError> {
        match method {
            AuthMethod::Password { email, password } => {
                self.password_login(&email, &password).await
            }
            AuthMethod::External(profile) => self.external_login(&profile).await,
            AuthMethod::MagicLink { token } => self.magic_link_callback(&token).await,
        }
    }

    /// Password login: credential validation then session issuance.
    pub async fn password_login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<TokenPair, AuthError> {
        let user = self.validate_credentials(email, password).await?;
        self.login(user).await
    }

    /// Rotates the refresh pair. The presented token must carry the Refresh
    /// purpose, name this user, and match the stored hash; the old token is
    /// invalid the moment the rotation is persisted.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh_token(
        &self,
        user_id: Uuid,
        refresh_token: &str,
    ) -> Result<TokenPair, AuthError> {
        let rejected = || AuthError::Unauthorized(UnauthorizedReason::InvalidRefreshToken);

        let claims = self
            .keys
            .verify_kind(refresh_token, TokenKind::Refresh)
            .map_err(|e| {
                warn!(%user_id, error = %e, "refresh token rejected");
                rejected()
            })?;
        if claims.sub != user_id {
            warn!(%user_id, "refresh token subject mismatch");
            return Err(rejected());
        }
        let Some(user) = self.store.find_by_id(user_id).await? else {
            return Err(rejected());
        };
        let Some(stored_hash) = user.refresh_token_hash.clone() else {
            return Err(rejected());
        };
        if !verify_password(refresh_token, &stored_hash)? {
            warn!(user_id = %user.id, "refresh token does not match stored generation");
            return Err(rejected());
        }
        self.login(user).await
    }

    /// External-identity login: resolve or link the profile, then issue a
    /// session. The profile is trusted as pre-verified.
    pub async fn external_login(&self, profile: &ExternalProfile) -> Result<TokenPair, AuthError> {
        let user = self.resolver.resolve_external(profile).await?;
        self.login(user).await
    }

    /// Always answers with the same message; whether the email is registered
    /// is never observable from the response.
    #[instrument(skip(self, email))]
    pub async fn send_magic_link(&self, email: &str) -> Result<FlowMessage, AuthError> {
        let email = normalize_email(email);
        if let Some(mut user) = self.store.find_by_email(&email).await? {
            let token = self
                .keys
                .issue(user.id, Some(&user.email), TokenKind::MagicLink)?;
            user.magic_link_token = Some(token.clone());
            self.store.save(&user).await?;
            self.enqueue(&user.email, Mail::MagicLink { token }).await;
        }
        Ok(FlowMessage::new(MSG_MAGIC_LINK_SENT))
    }

    /// Consumes a magic-link token: purpose must be MagicLink; the account is
    /// resolved or created from the token's email claim.
    #[instrument(skip(self, token))]
    pub async fn magic_link_callback(&self, token: &str) -> Result<TokenPair, AuthError> {
        let claims = self
            .keys
            .verify_kind(token, TokenKind::MagicLink)
            .map_err(|e| {
                warn!(error = %e, "magic link rejected");
                AuthError::BadRequest(MSG_INVALID_MAGIC_LINK.into())
            })?;
        let Some(email) = claims.email else {
            return Err(AuthError::BadRequest(MSG_INVALID_MAGIC_LINK.into()));
        };
        let mut user = self.resolver.resolve_or_create_by_email(&email).await?;
        user.magic_link_token = None;
        self.login(user).await
    }

    /// Same enumeration-resistant pattern as the magic link.
    #[instrument(skip(self, email))]
    pub async fn forgot_password(&self, email: &str) -> Result<FlowMessage, AuthError> {
        let email = normalize_email(email);
        if let Some(mut user) = self.store.find_by_email(&email).await? {
            let token = self.keys.issue(user.id, None, TokenKind::Reset)?;
            user.reset_token = Some(token.clone());
            self.store.save(&user).await?;
            self.enqueue(&user.email, Mail::PasswordReset { token }).await;
        }
        Ok(FlowMessage::new(MSG_RESET_SENT))
    }

    /// Signature validity alone is not enough: the token must also match the
    /// one stored on the user record, and the field is cleared on success so
    /// a reset token works exactly once.
    #[instrument(skip(self, token, new_password))]
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<FlowMessage, AuthError> {
        check_password_rules(new_password)?;
        let claims = self.keys.verify_kind(token, TokenKind::Reset).map_err(|e| {
            warn!(error = %e, "reset token rejected");
            AuthError::BadRequest(MSG_INVALID_RESET_TOKEN.into())
        })?;
        let Some(mut user) = self.store.find_by_id(claims.sub).await? else {
            return Err(AuthError::BadRequest(MSG_INVALID_RESET_TOKEN.into()));
        };
        if user.reset_token.as_deref() != Some(token) {
            warn!(user_id = %user.id, "reset token does not match stored token");
            return Err(AuthError::BadRequest(MSG_INVALID_RESET_TOKEN.into()));
        }
        user.password_hash = Some(hash_password(new_password)?);
        user.reset_token = None;
        self.store.save(&user).await?;
        info!(user_id = %user.id, "password reset");
        Ok(FlowMessage::new(MSG_PASSWORD_RESET))
    }

    /// Re-keys the password credential. Existing sessions stay valid; this
    /// flow does not rotate access or refresh tokens.
    #[instrument(skip(self, current_password, new_password))]
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<FlowMessage, AuthError> {
        let Some(mut user) = self.store.find_by_id(user_id).await? else {
            return Err(AuthError::NotFound);
        };
        let ok = match user.password_hash.as_deref() {
            Some(hash) => verify_password(current_password, hash)?,
            None => false,
        };
        if !ok {
            warn!(user_id = %user.id, "change password with wrong current password");
            return Err(AuthError::Unauthorized(
                UnauthorizedReason::PasswordIncorrect,
            ));
        }
        check_password_rules(new_password)?;
        user.password_hash = Some(hash_password(new_password)?);
        self.store.save(&user).await?;
        info!(user_id = %user.id, "password changed");
        Ok(FlowMessage::new(MSG_PASSWORD_CHANGED))
    }

    /// Flips the verified flag when the code matches and has not expired;
    /// the code is single-use and cleared on success.
    #[instrument(skip(self, code))]
    pub async fn verify_email(&self, code: &str) -> Result<FlowMessage, AuthError> {
        let Some(mut user) = self.store.find_by_verification_code(code).await? else {
            return Err(AuthError::BadRequest(MSG_INVALID_VERIFICATION_CODE.into()));
        };
        let expired = user
            .verification_code_expires_at
            .map_or(true, |at| at <= OffsetDateTime::now_utc());
        if expired {
            warn!(user_id = %user.id, "expired verification code presented");
            return Err(AuthError::BadRequest(MSG_INVALID_VERIFICATION_CODE.into()));
        }
        user.email_verified = true;
        user.verification_code = None;
        user.verification_code_expires_at = None;
        self.store.save(&user).await?;
        info!(user_id = %user.id, "email verified");
        Ok(FlowMessage::new(MSG_EMAIL_VERIFIED))
    }

    /// Enumeration-resistant: the response is identical whether the email is
    /// unknown or the account is already verified.
    #[instrument(skip(self, email))]
    pub async fn resend_verification_code(&self, email: &str) -> Result<FlowMessage, AuthError> {
        let email = normalize_email(email);
        if let Some(mut user) = self.store.find_by_email(&email).await? {
            if !user.email_verified {
                let code = generate_verification_code();
                user.verification_code = Some(code.clone());
                user.verification_code_expires_at = Some(
                    OffsetDateTime::now_utc() + Duration::minutes(VERIFICATION_CODE_TTL_MINUTES),
                );
                self.store.save(&user).await?;
                self.enqueue(&user.email, Mail::VerificationCode { code }).await;
            }
        }
        Ok(FlowMessage::new(MSG_VERIFICATION_RESENT))
    }

    /// Hard delete; irreversible and terminal.
    #[instrument(skip(self))]
    pub async fn delete_account(&self, user_id: Uuid) -> Result<(), AuthError> {
        let Some(user) = self.store.find_by_id(user_id).await? else {
            return Err(AuthError::NotFound);
        };
        self.store.delete(user.id).await?;
        info!(user_id = %user.id, "account deleted");
        Ok(())
    }

    /// Notification failures are logged and never abort the flow that
    /// triggered them.
    async fn enqueue(&self, to: &str, mail: Mail) {
        if let Err(e) = self.notifier.send(to, mail).await {
            warn!(%to, error = %e, "notification enqueue failed");
        }
    }
}

/// 4 random decimal digits. Collisions are acceptable given the short TTL
/// and a single active code per user.
fn generate_verification_code() -> String {
    rand::thread_rng().gen_range(1000..10000).to_string()
}
