use std::sync::atomic::{AtomicBool, Ordering};

use tracing::Level;

/// Log level for a failure that may repeat: `WARN` the first time, `DEBUG`
/// for every consecutive repeat until [`clear`](RepeatedError::clear).
#[derive(Debug, Default)]
pub(crate) struct RepeatedError {
    failing: AtomicBool,
}

impl RepeatedError {
    pub(crate) fn record(&self) -> Level {
        if self.failing.swap(true, Ordering::SeqCst) {
            Level::DEBUG
        } else {
            Level::WARN
        }
    }

    pub(crate) fn clear(&self) {
        self.failing.store(false, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub(crate) fn is_failing(&self) -> bool {
        self.failing.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warns_once_until_cleared() {
        let throttle = RepeatedError::default();
        assert_eq!(throttle.record(), Level::WARN);
        assert_eq!(throttle.record(), Level::DEBUG);
        assert_eq!(throttle.record(), Level::DEBUG);

        throttle.clear();
        assert!(!throttle.is_failing());
        assert_eq!(throttle.record(), Level::WARN);
    }
}
