//! Multi-strategy authentication core: password login with account lockout,
//! email verification codes, password reset, magic-link login and external
//! identity linking, all converging on a single user identity and a signed
//! access/refresh token session model.
//!
//! Persistence and mail delivery stay behind the [`UserStore`] and
//! [`Notifier`] seams; an HTTP layer mounts [`AuthService`] behind its
//! handlers and maps [`AuthError`] onto its own status codes.

pub mod config;
pub mod error;
pub mod identity;
pub mod lockout;
pub mod notify;
pub mod password;
pub mod service;
pub mod store;
pub mod token;
pub mod user;
pub mod validate;

pub use config::{AuthConfig, JwtConfig, SecurityConfig};
pub use error::{AuthError, UnauthorizedReason};
pub use identity::{ExternalProfile, IdentityResolver};
pub use lockout::LockoutPolicy;
pub use notify::{Mail, Notifier, NotifyError, NullNotifier, RetryNotifier};
pub use service::{AuthMethod, AuthService, FlowMessage, RegisterRequest, TokenPair};
pub use store::{MemoryUserStore, StoreError, UserStore};
pub use token::{Claims, JwtKeys, TokenError, TokenKind};
pub use user::{NewUser, User};
