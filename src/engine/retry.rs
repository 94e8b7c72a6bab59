//! Failure bookkeeping against `rollbackRetriesLimit`

/// Failed attempts of a resource and the configured limit
///
/// Failures are only counted when a limit is configured. While
/// `0 < failed < limit` the resource keeps being reported as out of date so
/// the failing action is retried; once the limit is reached the count
/// freezes and the action is no longer attempted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    pub failed: i32,
    pub limit: Option<i32>,
}

impl RetryState {
    #[must_use]
    pub fn new(failed: i32, limit: Option<i32>) -> Self {
        Self { failed, limit }
    }

    /// A limit is configured and at least one attempt failed
    #[must_use]
    pub fn should_retry(&self) -> bool {
        self.limit.is_some() && self.failed != 0
    }

    #[must_use]
    pub fn limit_reached(&self) -> bool {
        self.limit.is_some_and(|limit| self.failed >= limit)
    }

    /// Pending retries force the resource out of date
    #[must_use]
    pub fn blocks_up_to_date(&self) -> bool {
        self.should_retry() && !self.limit_reached()
    }

    /// Up-to-date verdict after retry gating
    #[must_use]
    pub fn gate(&self, synced: bool) -> bool {
        synced && !self.blocks_up_to_date()
    }

    pub fn record_failure(&mut self) {
        if self.limit.is_some() && !self.limit_reached() {
            self.failed += 1;
        }
    }

    pub fn record_success(&mut self) {
        self.failed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_limit_never_counts() {
        let mut state = RetryState::new(0, None);
        state.record_failure();
        state.record_failure();
        assert_eq!(state.failed, 0);
        assert!(!state.should_retry());
        assert!(state.gate(true));
        assert!(!state.gate(false));
    }

    #[test]
    fn test_pending_retries_block_up_to_date() {
        let mut state = RetryState::new(0, Some(3));
        state.record_failure();
        assert_eq!(state.failed, 1);
        assert!(state.blocks_up_to_date());
        assert!(!state.gate(true));
    }

    #[test]
    fn test_limit_reached_stops_forcing_updates() {
        let mut state = RetryState::new(0, Some(3));
        for _ in 0..5 {
            state.record_failure();
        }
        assert_eq!(state.failed, 3);
        assert!(state.limit_reached());
        assert!(!state.blocks_up_to_date());
        assert!(state.gate(true));
        // The underlying check still decides
        assert!(!state.gate(false));
    }

    #[test]
    fn test_success_resets() {
        let mut state = RetryState::new(2, Some(3));
        state.record_success();
        assert_eq!(state.failed, 0);
        assert!(!state.blocks_up_to_date());
    }
}
