//! Consecutive-error budget.

/// Bounded-retry policy: an adapter whose consecutive failed polls reach
/// `max` is removed. There is no backoff, and any successful poll resets
/// the count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorBudget {
    max: u32,
}

impl ErrorBudget {
    /// Create a budget allowing `max` consecutive failures.
    #[must_use]
    pub fn new(max: u32) -> Self {
        Self { max }
    }

    /// Consecutive failures that trigger removal.
    #[must_use]
    pub fn max(self) -> u32 {
        self.max
    }

    /// Check if `consecutive_errors` has used up the budget.
    #[must_use]
    pub fn is_exhausted(self, consecutive_errors: u32) -> bool {
        consecutive_errors >= self.max
    }

    /// Failures still tolerated before removal.
    #[must_use]
    pub fn remaining(self, consecutive_errors: u32) -> u32 {
        self.max.saturating_sub(consecutive_errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_at_max() {
        let budget = ErrorBudget::new(3);

        assert!(!budget.is_exhausted(0));
        assert!(!budget.is_exhausted(2));
        assert!(budget.is_exhausted(3));
        assert!(budget.is_exhausted(4));
    }

    #[test]
    fn remaining_saturates() {
        let budget = ErrorBudget::new(3);

        assert_eq!(budget.remaining(1), 2);
        assert_eq!(budget.remaining(5), 0);
    }
}
