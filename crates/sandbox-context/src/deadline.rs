use std::time::{Duration, Instant};

/// An opaque value that becomes "expired" at `context.timeout` and is
/// propagated through every suspension point (pool acquire, connector I/O,
/// the sandbox child wait). Cloning a token shares the same deadline.
#[derive(Debug, Clone, Copy)]
pub struct DeadlineToken {
    deadline: Instant,
}

impl DeadlineToken {
    #[must_use]
    pub fn from_timeout(timeout: Duration) -> Self {
        Self { deadline: Instant::now() + timeout }
    }

    #[must_use]
    pub fn with_grace(self, grace: Duration) -> Self {
        Self { deadline: self.deadline + grace }
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_not_expired() {
        let token = DeadlineToken::from_timeout(Duration::from_secs(5));
        assert!(!token.is_expired());
        assert!(token.remaining() <= Duration::from_secs(5));
    }

    #[test]
    fn zero_timeout_expires_immediately() {
        let token = DeadlineToken::from_timeout(Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(1));
        assert!(token.is_expired());
    }

    #[test]
    fn grace_extends_the_deadline() {
        let base = DeadlineToken::from_timeout(Duration::from_millis(0));
        let extended = base.with_grace(Duration::from_secs(10));
        assert!(!extended.is_expired());
    }
}
