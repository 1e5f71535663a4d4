use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

/// Mail templates the authentication flows can trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mail {
    MagicLink { token: String },
    PasswordReset { token: String },
    VerificationCode { code: String },
}

impl Mail {
    /// Template name for logging; never exposes the payload.
    pub fn kind(&self) -> &'static str {
        match self {
            Mail::MagicLink { .. } => "magic-link",
            Mail::PasswordReset { .. } => "password-reset",
            Mail::VerificationCode { .. } => "verification-code",
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Outbound mail seam. Delivery is fire-and-forget from the flows'
/// perspective; none of them block on delivery success.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, mail: Mail) -> Result<(), NotifyError>;
}

/// Drops every mail. For tests and deployments without an outbound channel.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn send(&self, to: &str, mail: Mail) -> Result<(), NotifyError> {
        debug!(%to, kind = mail.kind(), "mail dropped by null notifier");
        Ok(())
    }
}

/// Fire-and-forget wrapper: hands the mail to a background task that retries
/// with exponential backoff, then gives up with a warning. The triggering
/// flow never observes a delivery failure.
pub struct RetryNotifier {
    inner: Arc<dyn Notifier>,
    attempts: u32,
    base_delay: Duration,
}

impl RetryNotifier {
    pub fn new(inner: Arc<dyn Notifier>) -> Self {
        Self {
            inner,
            attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

#[async_trait]
impl Notifier for RetryNotifier {
    async fn send(&self, to: &str, mail: Mail) -> Result<(), NotifyError> {
        let inner = Arc::clone(&self.inner);
        let to = to.to_string();
        let attempts = self.attempts;
        let mut delay = self.base_delay;
        tokio::spawn(async move {
            for attempt in 1..=attempts {
                match inner.send(&to, mail.clone()).await {
                    Ok(()) => {
                        debug!(%to, kind = mail.kind(), attempt, "mail delivered");
                        return;
                    }
                    Err(e) if attempt < attempts => {
                        warn!(%to, kind = mail.kind(), attempt, error = %e, "mail send failed, retrying");
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    }
                    Err(e) => {
                        warn!(%to, kind = mail.kind(), error = %e, "mail send failed after retries");
                    }
                }
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyNotifier {
        calls: AtomicU32,
        fail_first: u32,
    }

    #[async_trait]
    impl Notifier for FlakyNotifier {
        async fn send(&self, _to: &str, _mail: Mail) -> Result<(), NotifyError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.fail_first {
                Err(NotifyError("smtp unreachable".into()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retry_notifier_retries_then_delivers() {
        let flaky = Arc::new(FlakyNotifier {
            calls: AtomicU32::new(0),
            fail_first: 2,
        });
        let notifier = RetryNotifier::new(flaky.clone() as Arc<dyn Notifier>);
        notifier
            .send("a@b.com", Mail::VerificationCode { code: "1234".into() })
            .await
            .unwrap();
        // Paused clock auto-advances through the backoff sleeps.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_notifier_gives_up_after_attempts() {
        let flaky = Arc::new(FlakyNotifier {
            calls: AtomicU32::new(0),
            fail_first: 10,
        });
        let notifier = RetryNotifier::new(flaky.clone() as Arc<dyn Notifier>);
        // Exhaustion is logged, never surfaced.
        notifier
            .send("a@b.com", Mail::MagicLink { token: "t".into() })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }
}
