use std::time::Duration;
use tokio::time::Instant;

/// Default debounce window for view refreshes
pub const REFRESH_TIMEOUT: Duration = Duration::from_millis(200);

/// Outcome of a refresh request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    /// The caller must refresh right away
    Now,
    /// A refresh is due at the given instant unless rescheduled
    Deferred(Instant),
}

/// Coalesces bursts of refresh requests into a single refresh.
///
/// The scheduler owns one deadline. Every request cancels it; a deferred
/// request then arms a new one `delay` from now. The owner polls
/// [`fire_if_due`](Self::fire_if_due) (or sleeps until
/// [`deadline`](Self::deadline)) to learn when the deferred refresh is due.
/// Time comes from the tokio clock, so tests can pause and advance it.
#[derive(Debug)]
pub struct RefreshScheduler {
    delay: Duration,
    deadline: Option<Instant>,
}

impl RefreshScheduler {
    pub fn new(delay: Duration) -> Self {
        Self { delay, deadline: None }
    }

    pub fn request_refresh(&mut self, immediate: bool) -> Refresh {
        self.deadline = None;

        if immediate {
            return Refresh::Now;
        }

        let deadline = Instant::now() + self.delay;
        self.deadline = Some(deadline);
        Refresh::Deferred(deadline)
    }

    /// Disarm the deadline if it has passed. Returns whether it fired.
    pub fn fire_if_due(&mut self) -> bool {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }
}

impl Default for RefreshScheduler {
    fn default() -> Self {
        Self::new(REFRESH_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn test_deferred_refresh_fires_after_delay() {
        let mut scheduler = RefreshScheduler::default();
        assert!(matches!(scheduler.request_refresh(false), Refresh::Deferred(_)));

        advance(Duration::from_millis(199)).await;
        assert!(!scheduler.fire_if_due());

        advance(Duration::from_millis(1)).await;
        assert!(scheduler.fire_if_due());
        assert!(!scheduler.is_pending());
        assert!(!scheduler.fire_if_due());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_request_restarts_window() {
        let mut scheduler = RefreshScheduler::new(Duration::from_millis(100));
        scheduler.request_refresh(false);

        advance(Duration::from_millis(80)).await;
        scheduler.request_refresh(false);

        advance(Duration::from_millis(80)).await;
        assert!(!scheduler.fire_if_due());

        advance(Duration::from_millis(20)).await;
        assert!(scheduler.fire_if_due());
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_request_cancels_pending() {
        let mut scheduler = RefreshScheduler::default();
        scheduler.request_refresh(false);

        assert_eq!(scheduler.request_refresh(true), Refresh::Now);
        assert!(!scheduler.is_pending());

        advance(Duration::from_secs(1)).await;
        assert!(!scheduler.fire_if_due());
    }
}
