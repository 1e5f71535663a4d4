use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// User account as persisted by a [`UserStore`](crate::store::UserStore).
///
/// Secret-bearing fields are never serialized. A usable account carries a
/// password hash, an external identity, or is a passwordless magic-link
/// account; `password_hash` is `None` for the latter two.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(default, skip_serializing)]
    pub password_hash: Option<String>,
    pub full_name: String,
    pub email_verified: bool,
    /// Subject id assigned by an external identity provider.
    pub external_id: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing)]
    pub verification_code: Option<String>,
    pub verification_code_expires_at: Option<OffsetDateTime>,
    #[serde(default, skip_serializing)]
    pub reset_token: Option<String>,
    #[serde(default, skip_serializing)]
    pub magic_link_token: Option<String>,
    #[serde(default, skip_serializing)]
    pub refresh_token_hash: Option<String>,
    pub login_attempts: u32,
    pub locked_until: Option<OffsetDateTime>,
    pub last_login_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

/// Fields a caller supplies when creating an account; the store assigns
/// `id` and `created_at`.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub password_hash: Option<String>,
    pub full_name: String,
    pub email_verified: bool,
    pub external_id: Option<String>,
    pub avatar_url: Option<String>,
    pub verification_code: Option<String>,
    pub verification_code_expires_at: Option<OffsetDateTime>,
}

impl User {
    pub fn from_new(new: NewUser) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: new.email,
            password_hash: new.password_hash,
            full_name: new.full_name,
            email_verified: new.email_verified,
            external_id: new.external_id,
            avatar_url: new.avatar_url,
            verification_code: new.verification_code,
            verification_code_expires_at: new.verification_code_expires_at,
            reset_token: None,
            magic_link_token: None,
            refresh_token_hash: None,
            login_attempts: 0,
            locked_until: None,
            last_login_at: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}
