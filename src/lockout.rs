use time::{Duration, OffsetDateTime};

use crate::config::SecurityConfig;
use crate::user::User;

/// Failed-attempt counting and time-boxed lock state.
///
/// Pure state transforms on the user aggregate; persisting the mutated user
/// is the caller's job. Lost updates under concurrent failures are tolerated:
/// the lockout is a throttle, not the sole security control.
#[derive(Debug, Clone, Copy)]
pub struct LockoutPolicy {
    pub max_attempts: u32,
    pub lock_duration: Duration,
}

impl LockoutPolicy {
    pub fn new(security: &SecurityConfig) -> Self {
        Self {
            max_attempts: security.max_login_attempts,
            lock_duration: Duration::minutes(security.lock_duration_minutes),
        }
    }

    /// A lock expires by time passing alone; no unlock mutation is required.
    pub fn is_locked(&self, user: &User) -> bool {
        user.locked_until
            .map_or(false, |until| until > OffsetDateTime::now_utc())
    }

    /// Records a failed attempt. Returns true when this attempt crossed the
    /// threshold and locked the account.
    pub fn record_failure(&self, user: &mut User) -> bool {
        let now = OffsetDateTime::now_utc();
        // A lock that has already expired means the counter belongs to a
        // previous window; start counting fresh.
        if let Some(until) = user.locked_until {
            if until <= now {
                user.login_attempts = 0;
                user.locked_until = None;
            }
        }
        user.login_attempts += 1;
        if user.login_attempts >= self.max_attempts {
            user.locked_until = Some(now + self.lock_duration);
            true
        } else {
            false
        }
    }

    /// Clears counters and stamps the login time after a successful attempt.
    pub fn record_success(&self, user: &mut User) {
        user.login_attempts = 0;
        user.locked_until = None;
        user.last_login_at = Some(OffsetDateTime::now_utc());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::NewUser;

    fn policy() -> LockoutPolicy {
        LockoutPolicy::new(&SecurityConfig::default())
    }

    fn user() -> User {
        User::from_new(NewUser {
            email: "a@b.com".into(),
            ..Default::default()
        })
    }

    #[test]
    fn locks_at_fifth_failure() {
        let policy = policy();
        let mut user = user();
        for _ in 0..4 {
            assert!(!policy.record_failure(&mut user));
            assert!(!policy.is_locked(&user));
        }
        assert!(policy.record_failure(&mut user));
        assert_eq!(user.login_attempts, 5);
        assert!(policy.is_locked(&user));
    }

    #[test]
    fn lock_expires_by_time_alone() {
        let policy = policy();
        let mut user = user();
        user.login_attempts = 5;
        user.locked_until = Some(OffsetDateTime::now_utc() - Duration::seconds(1));
        assert!(!policy.is_locked(&user));
    }

    #[test]
    fn stale_counter_resets_on_failure_after_expiry() {
        let policy = policy();
        let mut user = user();
        user.login_attempts = 5;
        user.locked_until = Some(OffsetDateTime::now_utc() - Duration::minutes(1));
        let locked = policy.record_failure(&mut user);
        assert!(!locked);
        assert_eq!(user.login_attempts, 1);
        assert!(user.locked_until.is_none());
    }

    #[test]
    fn success_clears_counters_and_stamps_login() {
        let policy = policy();
        let mut user = user();
        user.login_attempts = 3;
        user.locked_until = Some(OffsetDateTime::now_utc() - Duration::minutes(1));
        policy.record_success(&mut user);
        assert_eq!(user.login_attempts, 0);
        assert!(user.locked_until.is_none());
        assert!(user.last_login_at.is_some());
    }
}
