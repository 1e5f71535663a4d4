use std::sync::Arc;

use tracing::{info, instrument};

use crate::error::AuthError;
use crate::store::UserStore;
use crate::user::{NewUser, User};
use crate::validate::normalize_email;

/// Profile handed over by an external identity provider. Trust boundary:
/// the provider has already verified the email address.
#[derive(Debug, Clone)]
pub struct ExternalProfile {
    pub external_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar_url: Option<String>,
}

/// Maps external or alternate identity proofs onto a local user record,
/// creating or linking as needed. Writes at most one user record per call
/// and never sets a password hash.
pub struct IdentityResolver {
    store: Arc<dyn UserStore>,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Lookup by external id, then by email (linking the external identity
    /// onto the existing account), then create a passwordless account.
    #[instrument(skip(self, profile), fields(external_id = %profile.external_id))]
    pub async fn resolve_external(&self, profile: &ExternalProfile) -> Result<User, AuthError> {
        if let Some(user) = self.store.find_by_external_id(&profile.external_id).await? {
            return Ok(user);
        }

        let email = normalize_email(&profile.email);
        if let Some(mut user) = self.store.find_by_email(&email).await? {
            user.external_id = Some(profile.external_id.clone());
            user.email_verified = true;
            self.store.save(&user).await?;
            info!(user_id = %user.id, "linked external identity to existing account");
            return Ok(user);
        }

        let full_name = format!("{} {}", profile.first_name, profile.last_name)
            .trim()
            .to_string();
        let user = self
            .store
            .create(NewUser {
                email,
                full_name,
                email_verified: true,
                external_id: Some(profile.external_id.clone()),
                avatar_url: profile.avatar_url.clone(),
                ..Default::default()
            })
            .await?;
        info!(user_id = %user.id, "created account from external identity");
        Ok(user)
    }

    /// Lookup by email, else create a pre-verified passwordless account.
    /// Used by the magic-link callback.
    #[instrument(skip(self, email))]
    pub async fn resolve_or_create_by_email(&self, email: &str) -> Result<User, AuthError> {
        let email = normalize_email(email);
        if let Some(user) = self.store.find_by_email(&email).await? {
            return Ok(user);
        }
        let user = self
            .store
            .create(NewUser {
                email,
                email_verified: true,
                ..Default::default()
            })
            .await?;
        info!(user_id = %user.id, "created account on first magic-link use");
        Ok(user)
    }
}
