use std::time::Duration;

use tokio::time::Instant;

/// Absolute point in time bounding a blocking operation.
///
/// Computed once at the top-level call and passed down unchanged so nested
/// operations share the caller's overall bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline(Instant);

impl Deadline {
    pub fn after(duration: Duration) -> Self {
        Self(Instant::now() + duration)
    }

    pub fn instant(&self) -> Instant {
        self.0
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.0
    }

    /// Time left, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn expires_after_duration() {
        let deadline = Deadline::after(Duration::from_secs(5));
        assert!(!deadline.is_expired());
        assert_eq!(deadline.remaining(), Duration::from_secs(5));

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(deadline.is_expired());
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_duration_is_already_expired() {
        assert!(Deadline::after(Duration::ZERO).is_expired());
    }
}
