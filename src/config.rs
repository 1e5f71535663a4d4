use serde::Deserialize;

/// Signing configuration for the token issuer.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
    /// TTL for reset, magic-link and verification tokens.
    pub short_ttl_minutes: i64,
}

/// Lockout and verification policy knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub max_login_attempts: u32,
    pub lock_duration_minutes: i64,
    /// When true, registration creates an unverified account and sends a
    /// 4-digit verification code; when false, accounts are pre-verified.
    pub require_email_verification: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_login_attempts: 5,
            lock_duration_minutes: 15,
            require_email_verification: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt: JwtConfig,
    pub security: SecurityConfig,
}

impl AuthConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "authgate".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "authgate-users".into()),
            access_ttl_minutes: std::env::var("JWT_ACCESS_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
            refresh_ttl_minutes: std::env::var("JWT_REFRESH_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 7),
            short_ttl_minutes: std::env::var("JWT_SHORT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(15),
        };
        let security = SecurityConfig {
            max_login_attempts: std::env::var("AUTH_MAX_LOGIN_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(5),
            lock_duration_minutes: std::env::var("AUTH_LOCK_DURATION_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(15),
            require_email_verification: std::env::var("AUTH_REQUIRE_EMAIL_VERIFICATION")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        };
        Ok(Self { jwt, security })
    }

    /// Fixed configuration for tests; never reads the environment.
    pub fn fake() -> Self {
        Self {
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                access_ttl_minutes: 60,
                refresh_ttl_minutes: 60 * 24 * 7,
                short_ttl_minutes: 15,
            },
            security: SecurityConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn security_defaults() {
        let sec = SecurityConfig::default();
        assert_eq!(sec.max_login_attempts, 5);
        assert_eq!(sec.lock_duration_minutes, 15);
        assert!(!sec.require_email_verification);
    }

    #[test]
    fn fake_config_ttls() {
        let cfg = AuthConfig::fake();
        assert_eq!(cfg.jwt.access_ttl_minutes, 60);
        assert_eq!(cfg.jwt.refresh_ttl_minutes, 60 * 24 * 7);
        assert_eq!(cfg.jwt.short_ttl_minutes, 15);
    }
}
